//! Query execution over the store cache.

use crate::cache::StoreCache;
use hashbrown::HashSet;
use vigil_core::{Error, Record, Result, StoreId};
use vigil_query::{QueryDefinition, Snapshot};

/// Checks that a query can be executed at all.
pub fn validate(query: &QueryDefinition) -> Result<()> {
    if query.entity().is_empty() {
        return Err(Error::invalid_query("entity kind must not be empty"));
    }
    if query.get_batch_size() == 0 {
        return Err(Error::invalid_query("batch size must be positive"));
    }
    Ok(())
}

/// Executes a query: filter, sort, window, then group into sections.
///
/// `batch_size` is accepted but not used; every matching record is materialized.
pub fn execute(cache: &StoreCache, query: &QueryDefinition) -> Result<Snapshot> {
    validate(query)?;

    let mut matching: Vec<&Record> = cache.records().filter(|r| query.matches(r)).collect();
    matching.sort_by(|a, b| query.compare_records(a, b));

    let limit = match query.fetch_limit() {
        0 => usize::MAX,
        n => n,
    };
    let window = matching.into_iter().skip(query.fetch_offset()).take(limit);
    Snapshot::from_sorted(query, window)
}

/// Returns the attached stores the query can read from.
pub fn affected_stores(cache: &StoreCache, query: &QueryDefinition) -> HashSet<StoreId> {
    cache
        .store_ids()
        .into_iter()
        .filter(|&id| query.admits_store(id))
        .collect()
}
