//! Query definitions and refetch mutations.
//!
//! A `QueryDefinition` is fixed for the lifetime of a monitor session except through a
//! refetch, which applies a `QueryMutation`: every field the mutation names is replaced,
//! every other field keeps its previous value.

use crate::ordering::{compare_by, SortDescriptor};
use crate::predicate::Predicate;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cmp::Ordering;
use vigil_core::{Record, StoreId, Value};

/// Default number of records an engine should materialize per batch.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// How a section label is turned into a section index title.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum IndexTitle {
    /// The section name itself.
    #[default]
    SectionName,
    /// The first character of the section name, uppercased.
    FirstLetter,
    /// Sections get no index title.
    Hidden,
}

impl IndexTitle {
    /// Returns the index title for a section name.
    pub fn title_for(self, section_name: &str) -> Option<String> {
        match self {
            IndexTitle::SectionName => Some(section_name.to_string()),
            IndexTitle::FirstLetter => section_name
                .chars()
                .next()
                .map(|c| c.to_uppercase().collect()),
            IndexTitle::Hidden => None,
        }
    }
}

/// Groups records into sections by the value of one field.
///
/// Sections are ordered by that field's value before any other ordering applies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionBy {
    key: String,
    ascending: bool,
    index_title: IndexTitle,
}

impl SectionBy {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ascending: true,
            index_title: IndexTitle::default(),
        }
    }

    /// Orders sections by descending key value.
    pub fn descending(mut self) -> Self {
        self.ascending = false;
        self
    }

    pub fn with_index_title(mut self, rule: IndexTitle) -> Self {
        self.index_title = rule;
        self
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[inline]
    pub fn is_ascending(&self) -> bool {
        self.ascending
    }

    #[inline]
    pub fn index_title(&self) -> IndexTitle {
        self.index_title
    }

    /// Returns the section key of a record. Missing fields key the null section.
    #[inline]
    pub fn key_for<'r>(&self, record: &'r Record) -> &'r Value {
        record.get_or_null(&self.key)
    }

    fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let ord = a.get_or_null(&self.key).cmp(b.get_or_null(&self.key));
        if self.ascending {
            ord
        } else {
            ord.reverse()
        }
    }
}

/// Immutable description of what a monitor observes.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryDefinition {
    entity: String,
    predicate: Predicate,
    ordering: Vec<SortDescriptor>,
    section_by: Option<SectionBy>,
    /// `None` means every attached store.
    stores: Option<Vec<StoreId>>,
    batch_size: usize,
    /// 0 means unlimited.
    fetch_limit: usize,
    fetch_offset: usize,
}

impl QueryDefinition {
    /// Creates a query over every record of `entity`.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            predicate: Predicate::True,
            ordering: Vec::new(),
            section_by: None,
            stores: None,
            batch_size: DEFAULT_BATCH_SIZE,
            fetch_limit: 0,
            fetch_offset: 0,
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    /// Appends a sort descriptor.
    pub fn order_by(mut self, descriptor: SortDescriptor) -> Self {
        self.ordering.push(descriptor);
        self
    }

    pub fn section_by(mut self, section_by: SectionBy) -> Self {
        self.section_by = Some(section_by);
        self
    }

    /// Restricts the query to the given stores.
    pub fn from_stores(mut self, stores: impl IntoIterator<Item = StoreId>) -> Self {
        self.stores = Some(stores.into_iter().collect());
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.fetch_limit = limit;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.fetch_offset = offset;
        self
    }

    #[inline]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    #[inline]
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    #[inline]
    pub fn ordering(&self) -> &[SortDescriptor] {
        &self.ordering
    }

    #[inline]
    pub fn sectioning(&self) -> Option<&SectionBy> {
        self.section_by.as_ref()
    }

    #[inline]
    pub fn stores(&self) -> Option<&[StoreId]> {
        self.stores.as_deref()
    }

    #[inline]
    pub fn get_batch_size(&self) -> usize {
        self.batch_size
    }

    #[inline]
    pub fn fetch_limit(&self) -> usize {
        self.fetch_limit
    }

    #[inline]
    pub fn fetch_offset(&self) -> usize {
        self.fetch_offset
    }

    /// Returns true if records in `store` can match this query.
    pub fn admits_store(&self, store: StoreId) -> bool {
        match &self.stores {
            Some(stores) => stores.contains(&store),
            None => true,
        }
    }

    /// Returns true if `record` belongs in this query's result, ignoring the window.
    pub fn matches(&self, record: &Record) -> bool {
        record.entity() == self.entity
            && self.admits_store(record.id().store())
            && self.predicate.eval(record)
    }

    /// Total order used to lay out results: section key, then the ordering, then
    /// record identity so that equal keys never reorder between fetches.
    pub fn compare_records(&self, a: &Record, b: &Record) -> Ordering {
        if let Some(section_by) = &self.section_by {
            let ord = section_by.compare(a, b);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        compare_by(&self.ordering, a, b).then_with(|| a.id().cmp(&b.id()))
    }

    /// Returns a copy with `mutation` applied.
    pub fn mutated(&self, mutation: &QueryMutation) -> Self {
        let mut next = self.clone();
        mutation.apply(&mut next);
        next
    }
}

/// A partial replacement of a `QueryDefinition`, applied by a refetch.
///
/// `QueryMutation::default()` changes nothing; a refetch with it simply re-runs the
/// current query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryMutation {
    entity: Option<String>,
    predicate: Option<Predicate>,
    ordering: Option<Vec<SortDescriptor>>,
    section_by: Option<Option<SectionBy>>,
    stores: Option<Option<Vec<StoreId>>>,
    batch_size: Option<usize>,
    fetch_limit: Option<usize>,
    fetch_offset: Option<usize>,
}

impl QueryMutation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Replaces the whole ordering.
    pub fn order_by(mut self, ordering: impl IntoIterator<Item = SortDescriptor>) -> Self {
        self.ordering = Some(ordering.into_iter().collect());
        self
    }

    /// Replaces the sectioning; `None` removes it.
    pub fn section_by(mut self, section_by: Option<SectionBy>) -> Self {
        self.section_by = Some(section_by);
        self
    }

    /// Replaces the store restriction; `None` means every attached store.
    pub fn from_stores(mut self, stores: Option<Vec<StoreId>>) -> Self {
        self.stores = Some(stores);
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.fetch_limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.fetch_offset = Some(offset);
        self
    }

    /// Returns true if applying this mutation changes nothing.
    pub fn is_unchanged(&self) -> bool {
        *self == Self::default()
    }

    /// Applies the named fields to `query`.
    pub fn apply(&self, query: &mut QueryDefinition) {
        if let Some(entity) = &self.entity {
            query.entity = entity.clone();
        }
        if let Some(predicate) = &self.predicate {
            query.predicate = predicate.clone();
        }
        if let Some(ordering) = &self.ordering {
            query.ordering = ordering.clone();
        }
        if let Some(section_by) = &self.section_by {
            query.section_by = section_by.clone();
        }
        if let Some(stores) = &self.stores {
            query.stores = stores.clone();
        }
        if let Some(batch_size) = self.batch_size {
            query.batch_size = batch_size;
        }
        if let Some(limit) = self.fetch_limit {
            query.fetch_limit = limit;
        }
        if let Some(offset) = self.fetch_offset {
            query.fetch_offset = offset;
        }
    }
}
