//! Engines that keep the task store consistent.
//!
//! # Responsibility
//! - `cascade`: hard-delete tasks, lists and accounts with every dependent row.
//! - `soft_delete`: tombstone tasks and purge local-only tombstones.
//! - `reconcile`: mirror an authoritative remote list snapshot.
//! - `cleanup`: release external resources, then purge.
//!
//! # Invariants
//! - Storage failures abort the current atomic unit and reach the caller
//!   unchanged; only external-resource release is best-effort.
//! - Engines are constructed explicitly from a connection and config; there
//!   is no global registry.

pub mod cascade;
pub mod cleanup;
pub mod reconcile;
pub mod soft_delete;

use crate::model::task::TaskId;
use std::collections::BTreeSet;

/// Sorted, de-duplicated ids split into chunks of at most `chunk_size`.
pub(crate) fn chunked_ids(ids: &[TaskId], chunk_size: usize) -> Vec<Vec<TaskId>> {
    let unique: Vec<TaskId> = ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
    unique
        .chunks(chunk_size.max(1))
        .map(<[TaskId]>::to_vec)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::chunked_ids;

    #[test]
    fn chunks_cover_every_unique_id() {
        let ids: Vec<i64> = (1..=1_001).chain([5, 5, 7]).collect();
        let chunks = chunked_ids(&ids, 500);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 500);
        assert_eq!(chunks[2], vec![1_001]);
        assert_eq!(chunks.iter().map(Vec::len).sum::<usize>(), 1_001);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunked_ids(&[], 500).is_empty());
    }
}
