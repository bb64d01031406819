//! Attempt Fencing
//!
//! Per logical map task, exactly one attempt id may write at a time, and the
//! authoritative id never decreases. Every decision here compares attempt ids,
//! never arrival order, so the fence stays correct when a stale attempt's
//! packets are reordered ahead of the current attempt's on the wire.
//!
//! This is a pure state machine. The registry wraps each `MapTaskState` in its
//! own mutex and holds that lock across the whole decide-and-mutate sequence.

use std::collections::HashSet;

/// Lifecycle state of one logical map task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// No attempt has begun an upload or written a record yet.
    Unset,
    /// `attempt_id` is authoritative and its upload is in flight.
    Active { attempt_id: u64 },
    /// `attempt_id` is authoritative and has finished its upload. A strictly
    /// newer attempt may still supersede it and discard its output.
    Closed { attempt_id: u64 },
}

/// Result of a `begin_attempt` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Begin {
    /// The attempt is now (or already was) authoritative. Idempotent re-begin
    /// of the current attempt lands here too.
    Started,
    /// The attempt advanced over `previous`. The caller must purge every
    /// listed partition of records not tagged with the new attempt before
    /// releasing the map-task lock.
    Superseded { previous: u64, partitions: Vec<u32> },
    /// The attempt id is lower than the current authority. All of its
    /// subsequent writes must be dropped silently.
    Stale { current: u64 },
}

/// Fencing state for one logical map task.
#[derive(Debug)]
pub struct MapTaskState {
    state: TaskState,
    /// Partitions the authoritative attempt has appended to. Reset on
    /// advancement; consumed by `end_attempt` to close the right partitions.
    touched: HashSet<u32>,
    /// Next record sequence number within the authoritative attempt.
    next_sequence: u64,
}

impl MapTaskState {
    pub fn new() -> Self {
        Self {
            state: TaskState::Unset,
            touched: HashSet::new(),
            next_sequence: 0,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn authoritative_attempt(&self) -> Option<u64> {
        match self.state {
            TaskState::Unset => None,
            TaskState::Active { attempt_id } | TaskState::Closed { attempt_id } => Some(attempt_id),
        }
    }

    /// Begins (or re-begins) an upload attempt.
    pub fn begin_attempt(&mut self, attempt_id: u64) -> Begin {
        match self.state {
            TaskState::Unset => {
                self.state = TaskState::Active { attempt_id };
                Begin::Started
            }
            TaskState::Active { attempt_id: current } | TaskState::Closed { attempt_id: current } => {
                if attempt_id > current {
                    // Advancement: the old attempt's output must disappear.
                    let partitions = self.touched.drain().collect();
                    self.state = TaskState::Active { attempt_id };
                    self.next_sequence = 0;
                    Begin::Superseded {
                        previous: current,
                        partitions,
                    }
                } else if attempt_id == current {
                    // Re-issuing the same begin is a legitimate writer retry.
                    Begin::Started
                } else {
                    Begin::Stale { current }
                }
            }
        }
    }

    /// Authorizes a single record write from `attempt_id` into `partition`.
    ///
    /// Returns the record's sequence number if the attempt is authoritative.
    /// A first write with no prior `begin_attempt` implicitly begins that
    /// attempt. Stale attempts get `None` and the record is never stored.
    pub fn authorize_write(&mut self, attempt_id: u64, partition: u32) -> Option<u64> {
        let authoritative = match self.state {
            TaskState::Unset => {
                self.state = TaskState::Active { attempt_id };
                true
            }
            TaskState::Active { attempt_id: current } | TaskState::Closed { attempt_id: current } => {
                current == attempt_id
            }
        };

        if !authoritative {
            return None;
        }

        self.touched.insert(partition);
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        Some(sequence)
    }

    /// Finishes an upload attempt.
    ///
    /// Returns the partitions to mark closed if `attempt_id` is authoritative;
    /// `None` if it is stale. Completing an upload whose data was already
    /// discarded must not error, so the stale case is a plain no-op.
    pub fn end_attempt(&mut self, attempt_id: u64) -> Option<Vec<u32>> {
        match self.state {
            TaskState::Unset => None,
            TaskState::Active { attempt_id: current } | TaskState::Closed { attempt_id: current } => {
                if current != attempt_id {
                    return None;
                }
                self.state = TaskState::Closed { attempt_id };
                Some(self.touched.iter().copied().collect())
            }
        }
    }
}

impl Default for MapTaskState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_fencing() {
        let mut task = MapTaskState::new();

        // Authoritative attempt equals the max id seen so far, in any order.
        for (attempt, expected) in [(2u64, 2u64), (1, 2), (3, 3), (3, 3), (0, 3)] {
            let _ = task.begin_attempt(attempt);
            assert_eq!(task.authoritative_attempt(), Some(expected));
        }
    }

    #[test]
    fn test_begin_same_attempt_is_idempotent() {
        let mut task = MapTaskState::new();
        assert_eq!(task.begin_attempt(5), Begin::Started);
        assert_eq!(task.begin_attempt(5), Begin::Started);
        assert_eq!(task.authoritative_attempt(), Some(5));
    }

    #[test]
    fn test_advancement_reports_touched_partitions() {
        let mut task = MapTaskState::new();
        let _ = task.begin_attempt(0);
        task.authorize_write(0, 3).unwrap();
        task.authorize_write(0, 7).unwrap();

        match task.begin_attempt(1) {
            Begin::Superseded {
                previous,
                mut partitions,
            } => {
                partitions.sort();
                assert_eq!(previous, 0);
                assert_eq!(partitions, vec![3, 7]);
            }
            other => panic!("expected Superseded, got {:?}", other),
        }
    }

    #[test]
    fn test_stale_begin_rejected() {
        let mut task = MapTaskState::new();
        let _ = task.begin_attempt(1);
        assert_eq!(task.begin_attempt(0), Begin::Stale { current: 1 });
        assert_eq!(task.authoritative_attempt(), Some(1));
    }

    #[test]
    fn test_first_write_implicitly_begins_attempt() {
        let mut task = MapTaskState::new();
        assert_eq!(task.authorize_write(4, 0), Some(0));
        assert_eq!(task.authoritative_attempt(), Some(4));
    }

    #[test]
    fn test_sequence_numbers_restart_on_advancement() {
        let mut task = MapTaskState::new();
        assert_eq!(task.authorize_write(0, 1), Some(0));
        assert_eq!(task.authorize_write(0, 1), Some(1));
        let _ = task.begin_attempt(1);
        assert_eq!(task.authorize_write(1, 1), Some(0));
    }

    #[test]
    fn test_stale_end_attempt_is_noop() {
        let mut task = MapTaskState::new();
        let _ = task.begin_attempt(1);
        task.authorize_write(1, 9).unwrap();
        assert_eq!(task.end_attempt(0), None);
        assert_eq!(task.end_attempt(1), Some(vec![9]));
    }

    #[test]
    fn test_newer_attempt_supersedes_closed_task() {
        let mut task = MapTaskState::new();
        let _ = task.begin_attempt(0);
        task.authorize_write(0, 2).unwrap();
        task.end_attempt(0).unwrap();

        // A retry after a completed upload still wins if its id is higher.
        match task.begin_attempt(1) {
            Begin::Superseded { previous, partitions } => {
                assert_eq!(previous, 0);
                assert_eq!(partitions, vec![2]);
            }
            other => panic!("expected Superseded, got {:?}", other),
        }
        assert_eq!(task.state(), TaskState::Active { attempt_id: 1 });
    }
}
