//! In-batch deduplication
//!
//! Records sharing an identity collapse into one. The survivor sits at the
//! position of the first occurrence and carries the values of the last
//! one. If two occurrences disagree on a required field the identity is
//! dropped from the batch entirely and reported as a conflict.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::hash::Hash;

/// Outcome of deduplicating one batch
#[derive(Debug, Clone)]
pub(crate) struct Deduped<T> {
    pub records: Vec<T>,

    /// Occurrences merged into an earlier record
    pub duplicates: usize,

    /// `(identity, reason)` for every identity dropped as conflicting
    pub conflicts: Vec<(String, String)>,
}

/// Deduplicates `batch` by `key`
///
/// `conflict` compares an earlier and a later occurrence and returns a
/// reason if their required fields differ.
pub(crate) fn dedup_by<T, K>(
    batch: &[T],
    key: impl Fn(&T) -> K,
    conflict: impl Fn(&T, &T) -> Option<String>,
) -> Deduped<T>
where
    T: Clone,
    K: Hash + Eq + Display,
{
    let mut positions: HashMap<K, usize> = HashMap::with_capacity(batch.len());
    let mut records: Vec<T> = Vec::with_capacity(batch.len());
    let mut conflicted: HashSet<usize> = HashSet::new();
    let mut conflicts = Vec::new();
    let mut duplicates = 0;

    for record in batch {
        match positions.entry(key(record)) {
            Entry::Vacant(slot) => {
                slot.insert(records.len());
                records.push(record.clone());
            }
            Entry::Occupied(slot) => {
                duplicates += 1;
                let idx = *slot.get();
                if conflicted.contains(&idx) {
                    continue;
                }
                match conflict(&records[idx], record) {
                    Some(reason) => {
                        conflicted.insert(idx);
                        conflicts.push((slot.key().to_string(), reason));
                    }
                    None => records[idx] = record.clone(),
                }
            }
        }
    }

    let records = records
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| !conflicted.contains(idx))
        .map(|(_, record)| record)
        .collect();

    Deduped {
        records,
        duplicates,
        conflicts,
    }
}

/// Reports a differing `name` between two occurrences
pub(crate) fn name_conflict(earlier: &str, later: &str) -> Option<String> {
    (earlier != later).then(|| format!("name '{}' vs '{}'", earlier, later))
}
