//! Materialized query results.
//!
//! A `Snapshot` is immutable once built and cheap to clone; engines build one per fetch
//! or per committed transaction and hand it to the monitor, which swaps it in whole.

use crate::definition::QueryDefinition;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use hashbrown::HashMap;
use vigil_core::{Error, IndexPath, Record, RecordId, Result, Value};

/// One section of a snapshot.
///
/// A section is identified by its key value. The name is the key rendered for
/// display, so keys of different kinds may share a name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    key: Value,
    name: String,
    index_title: Option<String>,
    records: Vec<RecordId>,
}

impl Section {
    /// Builds a section keyed by its name.
    pub fn new(name: impl Into<String>, index_title: Option<String>, records: Vec<RecordId>) -> Self {
        let name = name.into();
        Self::keyed(Value::String(name.clone()), name, index_title, records)
    }

    pub fn keyed(key: Value, name: impl Into<String>, index_title: Option<String>, records: Vec<RecordId>) -> Self {
        Self {
            key,
            name: name.into(),
            index_title,
            records,
        }
    }

    /// Section label. Unsectioned queries use the empty name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity of the section within a snapshot.
    #[inline]
    pub fn key(&self) -> &Value {
        &self.key
    }

    #[inline]
    pub fn index_title(&self) -> Option<&str> {
        self.index_title.as_deref()
    }

    #[inline]
    pub fn records(&self) -> &[RecordId] {
        &self.records
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn get(&self, item: usize) -> Option<RecordId> {
        self.records.get(item).copied()
    }
}

#[derive(Debug)]
struct SnapshotInner {
    sections: Vec<Section>,
    /// Flat index of the first record of each section.
    offsets: Vec<usize>,
    count: usize,
    positions: HashMap<RecordId, IndexPath>,
}

/// An ordered, sectioned list of record ids.
#[derive(Clone, Debug)]
pub struct Snapshot {
    inner: Arc<SnapshotInner>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::from_parts(Vec::new(), Vec::new(), 0, HashMap::new())
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner.sections == other.inner.sections
    }
}

impl Eq for Snapshot {}

impl Snapshot {
    /// Builds a snapshot from sections. Fails if any record appears twice.
    pub fn new(sections: Vec<Section>) -> Result<Self> {
        let mut offsets = Vec::with_capacity(sections.len());
        let mut positions = HashMap::new();
        let mut count = 0;
        for (s, section) in sections.iter().enumerate() {
            offsets.push(count);
            for (item, id) in section.records.iter().enumerate() {
                if positions.insert(*id, IndexPath::new(s, item)).is_some() {
                    return Err(Error::DuplicateRecord(*id));
                }
            }
            count += section.records.len();
        }
        Ok(Self::from_parts(sections, offsets, count, positions))
    }

    /// Builds a snapshot from records already sorted by `query.compare_records`.
    ///
    /// Consecutive records with equal section keys share a section. An unsectioned
    /// query always yields exactly one section, even when it is empty.
    pub fn from_sorted<'a, I>(query: &QueryDefinition, records: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let Some(section_by) = query.sectioning() else {
            let ids = records.into_iter().map(Record::id).collect();
            return Self::new(alloc::vec![Section::new("", None, ids)]);
        };

        let rule = section_by.index_title();
        let mut sections: Vec<Section> = Vec::new();
        for record in records {
            let key = section_by.key_for(record);
            match sections.last_mut() {
                Some(current) if current.key == *key => current.records.push(record.id()),
                _ => {
                    let label = key.to_string();
                    let title = rule.title_for(&label);
                    sections.push(Section::keyed(key.clone(), label, title, alloc::vec![record.id()]));
                }
            }
        }
        Self::new(sections)
    }

    fn from_parts(
        sections: Vec<Section>,
        offsets: Vec<usize>,
        count: usize,
        positions: HashMap<RecordId, IndexPath>,
    ) -> Self {
        Self {
            inner: Arc::new(SnapshotInner {
                sections,
                offsets,
                count,
                positions,
            }),
        }
    }

    /// Total number of records.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.count == 0
    }

    #[inline]
    pub fn section_count(&self) -> usize {
        self.inner.sections.len()
    }

    #[inline]
    pub fn sections(&self) -> &[Section] {
        &self.inner.sections
    }

    #[inline]
    pub fn section(&self, index: usize) -> Option<&Section> {
        self.inner.sections.get(index)
    }

    /// Returns the record at a flat index across all sections.
    pub fn record_at(&self, flat: usize) -> Option<RecordId> {
        if flat >= self.inner.count {
            return None;
        }
        // offsets[0] == 0 whenever count > 0, so the partition point is at least 1
        let section = self.inner.offsets.partition_point(|&start| start <= flat) - 1;
        self.inner.sections[section].get(flat - self.inner.offsets[section])
    }

    /// Returns the record at a path, checking the section bound before the item bound.
    pub fn record_at_path(&self, path: IndexPath) -> Option<RecordId> {
        self.inner.sections.get(path.section)?.get(path.item)
    }

    pub fn path_of(&self, id: RecordId) -> Option<IndexPath> {
        self.inner.positions.get(&id).copied()
    }

    /// Returns the flat index of a record.
    pub fn index_of(&self, id: RecordId) -> Option<usize> {
        let path = self.path_of(id)?;
        Some(self.inner.offsets[path.section] + path.item)
    }

    #[inline]
    pub fn contains(&self, id: RecordId) -> bool {
        self.inner.positions.contains_key(&id)
    }

    /// Iterates over every record, section by section.
    pub fn iter(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.inner.sections.iter().flat_map(|s| s.records.iter().copied())
    }

    /// Returns the distinct index titles in section order.
    pub fn section_index_titles(&self) -> Vec<&str> {
        let mut titles: Vec<&str> = Vec::new();
        for title in self.inner.sections.iter().filter_map(Section::index_title) {
            if !titles.contains(&title) {
                titles.push(title);
            }
        }
        titles
    }

    /// Resolves an index title to the first section carrying it.
    ///
    /// When no section carries `title`, `index` is used as a position into
    /// `section_index_titles()` instead.
    pub fn target_section_for_index_title(&self, title: &str, index: usize) -> Option<usize> {
        let find = |t: &str| self.inner.sections.iter().position(|s| s.index_title() == Some(t));
        find(title).or_else(|| {
            let titles = self.section_index_titles();
            titles.get(index).and_then(|t| find(*t))
        })
    }
}
