//! Read Filtering
//!
//! Projects a partition snapshot against the attempt ids the reader declares
//! valid (derived from job-level commit knowledge the server does not have).
//! The server already purges superseded attempts on advancement; this second
//! check means a record only surfaces when both sides agree, so a purge that
//! has not run yet can never leak stale data to a reader that knows better.

use std::collections::HashSet;

use super::types::AttemptRecord;

/// Returns the subsequence of `records` whose attempt id is in `expected`,
/// in original order.
///
/// An empty `expected` set is an explicit exclusion and yields an empty
/// result, not "all attempts".
pub fn visible_records(records: &[AttemptRecord], expected: &HashSet<u64>) -> Vec<AttemptRecord> {
    if expected.is_empty() {
        return Vec::new();
    }
    records
        .iter()
        .filter(|r| expected.contains(&r.attempt_id))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(attempt_id: u64, sequence: u64) -> AttemptRecord {
        AttemptRecord {
            map_id: 0,
            attempt_id,
            sequence,
            key: None,
            value: None,
        }
    }

    #[test]
    fn test_filter_keeps_expected_attempts_in_order() {
        let records = vec![record(0, 0), record(1, 0), record(0, 1), record(1, 1)];
        let expected = HashSet::from([1]);

        let visible = visible_records(&records, &expected);
        assert_eq!(visible.len(), 2);
        assert!(visible.iter().all(|r| r.attempt_id == 1));
        assert_eq!(visible[0].sequence, 0);
        assert_eq!(visible[1].sequence, 1);
    }

    #[test]
    fn test_empty_expected_set_yields_nothing() {
        let records = vec![record(0, 0)];
        assert!(visible_records(&records, &HashSet::new()).is_empty());
    }

    #[test]
    fn test_filter_on_empty_records() {
        assert!(visible_records(&[], &HashSet::from([0, 1])).is_empty());
    }
}
