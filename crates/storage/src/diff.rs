//! Structural diff between two snapshots of the same query.
//!
//! Events come out grouped in this order: section deletions, section insertions, row
//! deletions, row insertions, moves, updates. Deletions and updates carry paths into
//! the old snapshot; insertions carry paths into the new one; moves carry both.
//!
//! A record present in both snapshots is reported only if it was updated by the
//! transaction. It is a move when it changed section or changed place relative to
//! records that were not updated, and an update otherwise.

use hashbrown::{HashMap, HashSet};
use std::collections::BTreeSet;
use vigil_core::{IndexPath, RecordId, Value};
use vigil_query::{ChangeEvent, Section, Snapshot};

struct Survivor {
    id: RecordId,
    from: IndexPath,
    to: IndexPath,
    new_flat: usize,
    stable: bool,
}

/// Computes the events that turn `old` into `new`.
pub fn diff(old: &Snapshot, new: &Snapshot, updated: &HashSet<RecordId>) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    diff_sections(old, new, &mut events);

    let mut survivors = Vec::new();
    for (s, section) in old.sections().iter().enumerate() {
        for (item, &id) in section.records().iter().enumerate() {
            let from = IndexPath::new(s, item);
            match (new.path_of(id), new.index_of(id)) {
                (Some(to), Some(new_flat)) => survivors.push(Survivor {
                    id,
                    from,
                    to,
                    new_flat,
                    stable: !updated.contains(&id),
                }),
                _ => events.push(ChangeEvent::RowDeleted { record: id, from }),
            }
        }
    }
    for (s, section) in new.sections().iter().enumerate() {
        for (item, &id) in section.records().iter().enumerate() {
            if !old.contains(id) {
                events.push(ChangeEvent::RowInserted {
                    record: id,
                    to: IndexPath::new(s, item),
                });
            }
        }
    }

    let moved = find_moves(old, new, &survivors);
    let mut moves: Vec<&Survivor> = survivors.iter().filter(|s| moved.contains(&s.id)).collect();
    moves.sort_by_key(|s| s.to);
    events.extend(moves.into_iter().map(|s| ChangeEvent::RowMoved {
        record: s.id,
        from: s.from,
        to: s.to,
    }));
    events.extend(
        survivors
            .iter()
            .filter(|s| !s.stable && !moved.contains(&s.id))
            .map(|s| ChangeEvent::RowUpdated {
                record: s.id,
                at: s.from,
            }),
    );

    tracing::trace!(events = events.len(), updated = updated.len(), "computed snapshot diff");
    events
}

fn diff_sections(old: &Snapshot, new: &Snapshot, events: &mut Vec<ChangeEvent>) {
    let old_keys: BTreeSet<&Value> = old.sections().iter().map(Section::key).collect();
    let new_keys: BTreeSet<&Value> = new.sections().iter().map(Section::key).collect();

    for (from, section) in old.sections().iter().enumerate() {
        if !new_keys.contains(section.key()) {
            events.push(ChangeEvent::SectionDeleted {
                section: section.clone(),
                from,
            });
        }
    }
    for (to, section) in new.sections().iter().enumerate() {
        if !old_keys.contains(section.key()) {
            events.push(ChangeEvent::SectionInserted {
                section: section.clone(),
                to,
            });
        }
    }
}

/// Returns the updated survivors that must be reported as moves.
///
/// `survivors` is in old flat order. Records that were not updated keep their relative
/// order, so they anchor everything else.
fn find_moves(old: &Snapshot, new: &Snapshot, survivors: &[Survivor]) -> HashSet<RecordId> {
    let mut moved = HashSet::new();

    let mut old_rank = HashMap::with_capacity(survivors.len());
    let mut rank = 0;
    for s in survivors {
        old_rank.insert(s.id, rank);
        rank += usize::from(s.stable);
    }

    let mut by_new: Vec<&Survivor> = survivors.iter().collect();
    by_new.sort_by_key(|s| s.new_flat);
    let mut new_rank = HashMap::with_capacity(survivors.len());
    rank = 0;
    for s in &by_new {
        new_rank.insert(s.id, rank);
        rank += usize::from(s.stable);
    }

    // Updated records that stayed between the same anchors, grouped by anchor gap.
    let mut gaps: HashMap<usize, Vec<&Survivor>> = HashMap::new();
    for s in survivors.iter().filter(|s| !s.stable) {
        let same_section = section_key(old, s.from) == section_key(new, s.to);
        if same_section && old_rank[&s.id] == new_rank[&s.id] {
            gaps.entry(old_rank[&s.id]).or_default().push(s);
        } else {
            moved.insert(s.id);
        }
    }

    // Within a gap, keep the longest run whose order is unchanged.
    for members in gaps.values() {
        let order: Vec<usize> = members.iter().map(|s| s.new_flat).collect();
        for (s, keep) in members.iter().zip(longest_increasing(&order)) {
            if !keep {
                moved.insert(s.id);
            }
        }
    }
    moved
}

fn section_key(snapshot: &Snapshot, path: IndexPath) -> Option<&Value> {
    snapshot.section(path.section).map(Section::key)
}

/// Marks one longest strictly increasing subsequence of `values`.
fn longest_increasing(values: &[usize]) -> Vec<bool> {
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; values.len()];
    for (i, &v) in values.iter().enumerate() {
        let pos = tails.partition_point(|&t| values[t] < v);
        if pos > 0 {
            prev[i] = Some(tails[pos - 1]);
        }
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
    }

    let mut keep = vec![false; values.len()];
    let mut cur = tails.last().copied();
    while let Some(i) = cur {
        keep[i] = true;
        cur = prev[i];
    }
    keep
}
