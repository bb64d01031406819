//! Partition Buffers
//!
//! Ordered, append-only storage for one partition's attempt-tagged records.
//! Insertion order is arrival order and is what readers get back. The buffer
//! only ever shrinks through `purge_except`, which removes records of
//! superseded attempts outright rather than hiding them.

use super::types::AttemptRecord;

#[derive(Debug, Default)]
pub struct PartitionBuffer {
    records: Vec<AttemptRecord>,
    closed: bool,
}

impl PartitionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record, preserving arrival order.
    pub fn append(&mut self, record: AttemptRecord) {
        self.records.push(record);
    }

    /// Removes every record of `map_id` whose attempt id differs from
    /// `keep_attempt_id`.
    ///
    /// Called under the advancing map task's lock when its authoritative
    /// attempt advances. Other map tasks share the partition under their own
    /// attempts; their records stay. Also reopens the partition: the
    /// surviving attempt has not finished its upload yet. Idempotent on a
    /// buffer already pure for `map_id`.
    pub fn purge_except(&mut self, map_id: u32, keep_attempt_id: u64) {
        self.records
            .retain(|r| r.map_id != map_id || r.attempt_id == keep_attempt_id);
        self.closed = false;
    }

    /// Marks the partition closed under its current authoritative attempt.
    pub fn mark_closed(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Copies out the current record sequence and the closed flag.
    ///
    /// Record payloads are `Bytes`, so the copy is cheap; readers work on the
    /// snapshot without holding the buffer entry any longer than this call.
    pub fn snapshot(&self) -> (Vec<AttemptRecord>, bool) {
        (self.records.clone(), self.closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn record(map_id: u32, attempt_id: u64, sequence: u64, key: &str) -> AttemptRecord {
        AttemptRecord {
            map_id,
            attempt_id,
            sequence,
            key: Some(Bytes::copy_from_slice(key.as_bytes())),
            value: None,
        }
    }

    #[test]
    fn test_append_preserves_order() {
        let mut buffer = PartitionBuffer::new();
        buffer.append(record(0, 0, 0, "a"));
        buffer.append(record(0, 0, 1, "b"));
        buffer.append(record(0, 0, 2, "c"));

        let (records, _) = buffer.snapshot();
        let keys: Vec<_> = records.iter().map(|r| r.key.clone().unwrap()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_purge_except_drops_other_attempts_and_reopens() {
        let mut buffer = PartitionBuffer::new();
        buffer.append(record(0, 0, 0, "old"));
        buffer.append(record(0, 1, 0, "new"));
        buffer.mark_closed();

        buffer.purge_except(0, 1);

        let (records, closed) = buffer.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].attempt_id, 1);
        assert!(!closed, "advancement reopens the partition");
    }

    #[test]
    fn test_purge_except_spares_other_map_tasks() {
        let mut buffer = PartitionBuffer::new();
        buffer.append(record(2, 0, 0, "map2_old"));
        buffer.append(record(3, 0, 0, "map3_live"));

        // Map 2 advances to attempt 1; map 3 still writes under attempt 0.
        buffer.purge_except(2, 1);

        let (records, _) = buffer.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].map_id, 3);
        assert_eq!(records[0].attempt_id, 0);
    }

    #[test]
    fn test_purge_except_is_idempotent() {
        let mut buffer = PartitionBuffer::new();
        buffer.append(record(0, 2, 0, "kept"));
        buffer.purge_except(0, 2);
        buffer.purge_except(0, 2);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_mark_closed() {
        let mut buffer = PartitionBuffer::new();
        assert!(!buffer.is_closed());
        buffer.mark_closed();
        assert!(buffer.is_closed());
    }
}
