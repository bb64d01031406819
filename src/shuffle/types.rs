use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Identity of one shuffle within one application.
///
/// All map tasks writing a shuffle and all reducers reading it use the same
/// `(app_id, shuffle_id)` pair. This is the key under which the registry keeps
/// per-shuffle state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AppShuffleId {
    pub app_id: String,
    pub shuffle_id: u32,
}

impl AppShuffleId {
    pub fn new(app_id: impl Into<String>, shuffle_id: u32) -> Self {
        Self {
            app_id: app_id.into(),
            shuffle_id,
        }
    }
}

impl std::fmt::Display for AppShuffleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.app_id, self.shuffle_id)
    }
}

/// A single buffered key/value record, tagged with the map task and attempt
/// that wrote it.
///
/// Attempt ids are only meaningful per map task, and partitions are shared
/// across map tasks, so purging on attempt advancement needs both tags to
/// target exactly the superseded writer's records. `key`/`value` are optional
/// byte sequences: `None` (the writer sent a null) is distinct from `Some` of
/// an empty buffer, and both must survive the whole pipeline unchanged.
/// `sequence` is assigned in arrival order within the writing attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttemptRecord {
    pub map_id: u32,
    pub attempt_id: u64,
    pub sequence: u64,
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
}

/// Outcome of a fencing decision on the write path.
///
/// `Rejected` is not an error: the transport completes the request normally
/// and the write simply has no observable effect. Modeling the decision as a
/// value keeps it testable in isolation from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Accepted,
    Rejected,
}

impl WriteOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, WriteOutcome::Accepted)
    }
}

/// Helper to get the current system time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}
