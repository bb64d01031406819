//! Shuffle Engine Module
//!
//! Implements the attempt-fencing and partition-buffering core of the server.
//!
//! ## Core Concepts
//! - **Attempts**: A logical map task may run several numbered attempts
//!   (retries, speculative copies). At most one attempt is authoritative per
//!   task at any time, and the authoritative id only ever increases.
//! - **Fencing**: `MapTaskState` decides, per logical map task, whether a
//!   write is accepted or silently dropped. Stale attempts never surface data.
//! - **Buffering**: `PartitionBuffer` keeps attempt-tagged records per
//!   partition in arrival order. Superseded records are purged, not hidden.
//! - **Close signal**: `CloseTracker` lets readers wait with a bounded timeout
//!   until the partitions they need have been closed by their writer.
//! - **Access**: `AppShuffleRegistry` composes the above per (app, shuffle)
//!   and exposes the operation surface the transport layer calls into.

pub mod buffer;
pub mod close;
pub mod fence;
pub mod filter;
pub mod registry;
pub mod types;
