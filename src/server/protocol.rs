//! Shuffle Network Protocol
//!
//! Defines the API endpoints and Data Transfer Objects (DTOs) the transport
//! layer accepts from map-task writers and reduce-task readers.
//!
//! Record keys and values are optional byte sequences: JSON `null` means the
//! writer sent a null, which stays distinct from an empty byte array all the
//! way through the engine and back out.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// --- API Endpoints ---

/// Announces an upload attempt for one logical map task.
pub const ENDPOINT_UPLOAD_START: &str = "/shuffle/upload/start";
/// Streams one key/value record into a partition.
pub const ENDPOINT_UPLOAD_RECORD: &str = "/shuffle/upload/record";
/// Marks an upload attempt finished, closing the partitions it touched.
pub const ENDPOINT_UPLOAD_FINISH: &str = "/shuffle/upload/finish";
/// Reads one partition's visible records.
pub const ENDPOINT_READ_PARTITION: &str = "/shuffle/read";
/// Immediate partitions-closed query.
pub const ENDPOINT_SHUFFLE_CLOSED: &str = "/shuffle/closed";
/// Bounded wait until the named partitions are closed.
pub const ENDPOINT_WAIT_CLOSED: &str = "/shuffle/wait_closed";
/// Tears down all state for a finished shuffle.
pub const ENDPOINT_REMOVE_SHUFFLE: &str = "/shuffle/remove";
/// Server-wide counters.
pub const ENDPOINT_STATS: &str = "/shuffle/stats";

// --- Data Transfer Objects ---

#[derive(Debug, Serialize, Deserialize)]
pub struct StartUploadRequest {
    pub app_id: String,
    pub shuffle_id: u32,
    pub map_id: u32,
    pub attempt_id: u64,
    /// Upstream task count announced by the writer. A hint for bookkeeping,
    /// not an input to the fencing decision.
    pub num_maps: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartUploadResponse {
    /// False when the attempt is stale. The writer may keep sending; its
    /// records will be dropped silently.
    pub accepted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WriteRecordRequest {
    pub app_id: String,
    pub shuffle_id: u32,
    pub map_id: u32,
    pub attempt_id: u64,
    pub partition_id: u32,
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
}

/// Acknowledgment for a record write. Always succeeds at this layer; whether
/// the record was kept or fenced out is not reported back.
#[derive(Debug, Serialize, Deserialize)]
pub struct WriteRecordResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FinishUploadRequest {
    pub app_id: String,
    pub shuffle_id: u32,
    pub map_id: u32,
    pub attempt_id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FinishUploadResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadPartitionRequest {
    pub app_id: String,
    pub shuffle_id: u32,
    pub partition_id: u32,
    /// Attempt ids the reader considers valid, from job-level commit
    /// knowledge. An empty set reads nothing.
    pub expected_attempt_ids: HashSet<u64>,
}

/// One visible record, in original send order.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecordPayload {
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadPartitionResponse {
    pub partition_id: u32,
    pub records: Vec<RecordPayload>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShuffleClosedRequest {
    pub app_id: String,
    pub shuffle_id: u32,
    pub partition_ids: Vec<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShuffleClosedResponse {
    pub closed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WaitClosedRequest {
    pub app_id: String,
    pub shuffle_id: u32,
    pub partition_ids: Vec<u32>,
    pub timeout_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemoveShuffleRequest {
    pub app_id: String,
    pub shuffle_id: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemoveShuffleResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShuffleStatsResponse {
    pub server_id: String,
    pub shuffles: usize,
    pub map_tasks: usize,
    pub buffered_records: usize,
    pub closed_partitions: usize,
}
