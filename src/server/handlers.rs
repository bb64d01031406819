use axum::{Json, extract::Extension, http::StatusCode};
use std::sync::Arc;
use std::time::Duration;

use super::ServerId;
use super::protocol::{
    FinishUploadRequest, FinishUploadResponse, ReadPartitionRequest, ReadPartitionResponse,
    RecordPayload, RemoveShuffleRequest, RemoveShuffleResponse, ShuffleClosedRequest,
    ShuffleClosedResponse, ShuffleStatsResponse, StartUploadRequest, StartUploadResponse,
    WaitClosedRequest, WriteRecordRequest, WriteRecordResponse,
};
use crate::shuffle::registry::AppShuffleRegistry;

pub async fn handle_start_upload(
    Extension(registry): Extension<Arc<AppShuffleRegistry>>,
    Json(req): Json<StartUploadRequest>,
) -> (StatusCode, Json<StartUploadResponse>) {
    let outcome = registry.begin_attempt(
        &req.app_id,
        req.shuffle_id,
        req.map_id,
        req.attempt_id,
        req.num_maps,
    );

    // A stale begin is not a transport error; the writer learns it was
    // superseded and may simply stop sending.
    (
        StatusCode::OK,
        Json(StartUploadResponse {
            accepted: outcome.is_accepted(),
        }),
    )
}

pub async fn handle_write_record(
    Extension(registry): Extension<Arc<AppShuffleRegistry>>,
    Json(req): Json<WriteRecordRequest>,
) -> (StatusCode, Json<WriteRecordResponse>) {
    let _ = registry.write_record(
        &req.app_id,
        req.shuffle_id,
        req.map_id,
        req.attempt_id,
        req.partition_id,
        req.key,
        req.value,
    );

    // Silent-drop semantics: the write path completes normally whether or not
    // the record was kept.
    (StatusCode::OK, Json(WriteRecordResponse { success: true }))
}

pub async fn handle_finish_upload(
    Extension(registry): Extension<Arc<AppShuffleRegistry>>,
    Json(req): Json<FinishUploadRequest>,
) -> (StatusCode, Json<FinishUploadResponse>) {
    registry.end_attempt(&req.app_id, req.shuffle_id, req.map_id, req.attempt_id);

    (StatusCode::OK, Json(FinishUploadResponse { success: true }))
}

pub async fn handle_read_partition(
    Extension(registry): Extension<Arc<AppShuffleRegistry>>,
    Json(req): Json<ReadPartitionRequest>,
) -> (StatusCode, Json<ReadPartitionResponse>) {
    let records = registry.read_partition(
        &req.app_id,
        req.shuffle_id,
        req.partition_id,
        &req.expected_attempt_ids,
    );

    tracing::debug!(
        "Read partition {} of shuffle {}/{}: {} visible record(s)",
        req.partition_id,
        req.app_id,
        req.shuffle_id,
        records.len()
    );

    let records = records
        .into_iter()
        .map(|record| RecordPayload {
            key: record.key,
            value: record.value,
        })
        .collect();

    (
        StatusCode::OK,
        Json(ReadPartitionResponse {
            partition_id: req.partition_id,
            records,
        }),
    )
}

pub async fn handle_shuffle_closed(
    Extension(registry): Extension<Arc<AppShuffleRegistry>>,
    Json(req): Json<ShuffleClosedRequest>,
) -> (StatusCode, Json<ShuffleClosedResponse>) {
    let closed = registry.is_shuffle_closed(&req.app_id, req.shuffle_id, &req.partition_ids);

    (StatusCode::OK, Json(ShuffleClosedResponse { closed }))
}

pub async fn handle_wait_closed(
    Extension(registry): Extension<Arc<AppShuffleRegistry>>,
    Json(req): Json<WaitClosedRequest>,
) -> (StatusCode, Json<ShuffleClosedResponse>) {
    let closed = registry
        .wait_shuffle_closed(
            &req.app_id,
            req.shuffle_id,
            &req.partition_ids,
            Duration::from_millis(req.timeout_ms),
        )
        .await;

    // Timing out is an expected outcome the reader handles by retrying.
    (StatusCode::OK, Json(ShuffleClosedResponse { closed }))
}

pub async fn handle_remove_shuffle(
    Extension(registry): Extension<Arc<AppShuffleRegistry>>,
    Json(req): Json<RemoveShuffleRequest>,
) -> (StatusCode, Json<RemoveShuffleResponse>) {
    registry.remove_shuffle(&req.app_id, req.shuffle_id);

    (StatusCode::OK, Json(RemoveShuffleResponse { success: true }))
}

pub async fn handle_stats(
    Extension(registry): Extension<Arc<AppShuffleRegistry>>,
    Extension(server_id): Extension<ServerId>,
) -> (StatusCode, Json<ShuffleStatsResponse>) {
    let stats = registry.stats();

    (
        StatusCode::OK,
        Json(ShuffleStatsResponse {
            server_id: server_id.0,
            shuffles: stats.shuffles,
            map_tasks: stats.map_tasks,
            buffered_records: stats.buffered_records,
            closed_partitions: stats.closed_partitions,
        }),
    )
}
