//! Bounded, deduplicated per-address history.
//!
//! Histories are most-recent-first. A fetch returns the provider's newest
//! window in the same order, so new records are placed relative to the
//! known records around them in the fetched window.

use std::collections::{HashMap, HashSet};

use crate::TransactionRecord;

/// Merges `fetched` into `existing` and truncates the result to `bound`.
///
/// - records of `fetched` already present in `existing` (by id) are skipped,
///   as are repeats within `fetched` itself;
/// - new records seen before any known record are prepended, in fetched
///   order;
/// - new records seen after a known record are inserted directly before the
///   next known record that follows them in `fetched`, or appended when no
///   known record follows;
/// - known records keep their relative order.
///
/// Only the first `bound` records of `existing` take part. Records that the
/// bound evicts land at the tail again on the next merge of the same window,
/// so merging the same `fetched` twice leaves the history unchanged after
/// the first application.
pub fn merge(
    existing: &[TransactionRecord],
    fetched: &[TransactionRecord],
    bound: usize,
) -> Vec<TransactionRecord> {
    let existing = &existing[..existing.len().min(bound)];
    let known: HashSet<&str> = existing.iter().map(|record| record.id.as_str()).collect();
    let mut seen: HashSet<&str> = known.clone();

    let mut leading = Vec::new();
    let mut pending = Vec::new();
    let mut before: HashMap<&str, Vec<&TransactionRecord>> = HashMap::new();
    let mut anchored = false;

    for record in fetched {
        let id = record.id.as_str();
        if known.contains(id) {
            if !pending.is_empty() {
                before.entry(id).or_default().append(&mut pending);
            }
            anchored = true;
            continue;
        }
        if !seen.insert(id) {
            continue;
        }
        if anchored {
            pending.push(record);
        } else {
            leading.push(record);
        }
    }

    let mut merged = Vec::with_capacity((existing.len() + seen.len() - known.len()).min(bound));
    merged.extend(leading.into_iter().cloned());
    for record in existing {
        if let Some(inserted) = before.remove(record.id.as_str()) {
            merged.extend(inserted.into_iter().cloned());
        }
        merged.push(record.clone());
    }
    merged.extend(pending.into_iter().cloned());
    merged.truncate(bound);
    merged
}

/// Number of distinct ids in `fetched` that `existing` does not hold.
pub fn count_new(existing: &[TransactionRecord], fetched: &[TransactionRecord]) -> usize {
    let mut seen: HashSet<&str> = existing.iter().map(|record| record.id.as_str()).collect();
    fetched
        .iter()
        .filter(|record| seen.insert(record.id.as_str()))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Outcome;

    fn record(id: &str) -> TransactionRecord {
        TransactionRecord::new(id, None, Vec::new(), Outcome::Success)
    }

    fn records(ids: &[&str]) -> Vec<TransactionRecord> {
        ids.iter().copied().map(record).collect()
    }

    fn ids(history: &[TransactionRecord]) -> Vec<&str> {
        history.iter().map(|record| record.id.as_str()).collect()
    }

    #[test]
    fn merging_into_empty_history_keeps_fetched_order() {
        let merged = merge(&[], &records(&["c", "b", "a"]), 10);
        assert_eq!(ids(&merged), vec!["c", "b", "a"]);
    }

    #[test]
    fn newer_records_are_prepended() {
        let existing = records(&["c", "b", "a"]);
        let merged = merge(&existing, &records(&["e", "d", "c", "b"]), 10);
        assert_eq!(ids(&merged), vec!["e", "d", "c", "b", "a"]);
    }

    #[test]
    fn records_after_a_known_one_are_inserted_behind_it() {
        let existing = records(&["d", "a"]);
        let merged = merge(&existing, &records(&["d", "c", "b", "a"]), 10);
        assert_eq!(ids(&merged), vec!["d", "c", "b", "a"]);
    }

    #[test]
    fn duplicates_are_never_repeated() {
        let existing = records(&["b", "a"]);
        let merged = merge(&existing, &records(&["c", "c", "b", "a", "a"]), 10);
        assert_eq!(ids(&merged), vec!["c", "b", "a"]);
        assert_eq!(count_new(&existing, &records(&["c", "c", "b"])), 1);
    }

    #[test]
    fn known_records_keep_their_order_even_if_fetched_differently() {
        let existing = records(&["b", "a"]);
        let merged = merge(&existing, &records(&["a", "b"]), 10);
        assert_eq!(ids(&merged), vec!["b", "a"]);
    }

    #[test]
    fn result_is_truncated_to_the_bound() {
        let existing = records(&["c", "b", "a"]);
        let merged = merge(&existing, &records(&["e", "d"]), 3);
        assert_eq!(ids(&merged), vec!["e", "d", "c"]);
    }

    #[test]
    fn merge_is_idempotent() {
        let existing = records(&["c", "a"]);
        let fetched = records(&["d", "c", "b", "a"]);

        let once = merge(&existing, &fetched, 10);
        let twice = merge(&once, &fetched, 10);

        assert_eq!(once, twice);
        assert_eq!(count_new(&once, &fetched), 0);
    }

    #[test]
    fn records_past_the_last_known_one_go_to_the_tail() {
        let existing = records(&["d", "b"]);
        let merged = merge(&existing, &records(&["b", "a"]), 10);
        assert_eq!(ids(&merged), vec!["d", "b", "a"]);
    }

    #[test]
    fn merge_is_idempotent_when_the_bound_evicts_records() {
        let existing = records(&["c", "b", "a"]);
        let fetched = records(&["d", "a"]);

        let once = merge(&existing, &fetched, 3);
        let twice = merge(&once, &fetched, 3);

        assert_eq!(ids(&once), vec!["d", "c", "b"]);
        assert_eq!(once, twice);
        assert_eq!(count_new(&once, &twice), 0);
    }

    #[test]
    fn evicted_middle_records_stay_evicted() {
        let existing = records(&["e", "c", "a"]);
        let fetched = records(&["e", "d", "c", "b", "a"]);

        let once = merge(&existing, &fetched, 4);
        let twice = merge(&once, &fetched, 4);

        assert_eq!(ids(&once), vec!["e", "d", "c", "b"]);
        assert_eq!(once, twice);
    }

    #[test]
    fn only_the_bounded_prefix_of_existing_is_kept() {
        let existing = records(&["c", "b", "a"]);
        let merged = merge(&existing, &records(&["a", "z"]), 2);
        assert_eq!(merge(&merged, &records(&["a", "z"]), 2), merged);
    }

    #[test]
    fn empty_fetch_leaves_history_unchanged() {
        let existing = records(&["b", "a"]);
        assert_eq!(merge(&existing, &[], 10), existing);
    }
}
