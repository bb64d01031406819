//! Shuffle State Registry
//!
//! Composes the fencing state machines, partition buffers, and close tracking
//! for every live (app, shuffle) pair, and exposes the operation surface the
//! transport layer calls into.
//!
//! ## Locking
//! All mutation for one logical map task (fence check plus buffer mutation)
//! goes through that task's own mutex, held across the whole decide-and-mutate
//! sequence. Different map tasks never contend with each other. Purging on
//! attempt advancement runs under the same lock, so a late append from a
//! superseded attempt can never land after the purge. Partition buffers live
//! in a `DashMap`; the entry guard serializes buffer mutation across map tasks
//! sharing a partition, and readers only ever copy a snapshot out under it.
//! Nothing acquires a map-task mutex while holding a partition entry, so the
//! two levels cannot deadlock.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;

use super::buffer::PartitionBuffer;
use super::close::CloseTracker;
use super::fence::{Begin, MapTaskState};
use super::filter::visible_records;
use super::types::{AppShuffleId, AttemptRecord, WriteOutcome, now_ms};

/// In-memory state for one (app, shuffle) pair.
pub struct AppShuffle {
    id: AppShuffleId,
    /// Fencing state per logical map task. Each map task has its own lock.
    map_tasks: DashMap<u32, Arc<Mutex<MapTaskState>>>,
    /// Buffered records per partition.
    partitions: DashMap<u32, PartitionBuffer>,
    /// Wakeups for readers waiting on partition closes.
    tracker: CloseTracker,
    /// Upstream task count announced at upload start. Informational only,
    /// never an input to fencing or purge decisions.
    num_maps_hint: AtomicU32,
    created_at: u64,
}

impl AppShuffle {
    fn new(id: AppShuffleId) -> Self {
        Self {
            id,
            map_tasks: DashMap::new(),
            partitions: DashMap::new(),
            tracker: CloseTracker::new(),
            num_maps_hint: AtomicU32::new(0),
            created_at: now_ms(),
        }
    }

    pub fn id(&self) -> &AppShuffleId {
        &self.id
    }

    pub fn num_maps_hint(&self) -> u32 {
        self.num_maps_hint.load(Ordering::Relaxed)
    }

    /// Fetches the map task's lock handle, creating the task on first use.
    fn map_task(&self, map_id: u32) -> Arc<Mutex<MapTaskState>> {
        self.map_tasks
            .entry(map_id)
            .or_insert_with(|| Arc::new(Mutex::new(MapTaskState::new())))
            .clone()
    }

    /// Begins an upload attempt for one logical map task.
    pub fn begin_attempt(&self, map_id: u32, attempt_id: u64, num_maps: u32) -> WriteOutcome {
        if num_maps > 0 {
            self.num_maps_hint.store(num_maps, Ordering::Relaxed);
        }

        let task = self.map_task(map_id);
        let mut state = task.lock().expect("map task lock poisoned");

        match state.begin_attempt(attempt_id) {
            Begin::Started => {
                tracing::debug!(
                    "Shuffle {}: map {} attempt {} started upload",
                    self.id,
                    map_id,
                    attempt_id
                );
                WriteOutcome::Accepted
            }
            Begin::Superseded {
                previous,
                partitions,
            } => {
                // Purge under the map-task lock so no append tagged with the
                // old attempt can interleave with the advancement. Other map
                // tasks sharing these partitions keep their records.
                for partition_id in &partitions {
                    if let Some(mut buffer) = self.partitions.get_mut(partition_id) {
                        buffer.purge_except(map_id, attempt_id);
                    }
                }
                tracing::info!(
                    "Shuffle {}: map {} attempt {} superseded attempt {}, purged {} partition(s)",
                    self.id,
                    map_id,
                    attempt_id,
                    previous,
                    partitions.len()
                );
                WriteOutcome::Accepted
            }
            Begin::Stale { current } => {
                tracing::debug!(
                    "Shuffle {}: rejected stale attempt {} for map {} (current: {})",
                    self.id,
                    attempt_id,
                    map_id,
                    current
                );
                WriteOutcome::Rejected
            }
        }
    }

    /// Buffers one record if the writing attempt is authoritative.
    pub fn write_record(
        &self,
        map_id: u32,
        attempt_id: u64,
        partition_id: u32,
        key: Option<bytes::Bytes>,
        value: Option<bytes::Bytes>,
    ) -> WriteOutcome {
        let task = self.map_task(map_id);
        let mut state = task.lock().expect("map task lock poisoned");

        match state.authorize_write(attempt_id, partition_id) {
            Some(sequence) => {
                let record = AttemptRecord {
                    map_id,
                    attempt_id,
                    sequence,
                    key,
                    value,
                };
                self.partitions
                    .entry(partition_id)
                    .or_default()
                    .append(record);
                WriteOutcome::Accepted
            }
            None => {
                tracing::trace!(
                    "Shuffle {}: dropped record from stale attempt {} for map {}",
                    self.id,
                    attempt_id,
                    map_id
                );
                WriteOutcome::Rejected
            }
        }
    }

    /// Finishes an upload attempt, closing every partition it touched.
    ///
    /// Returns whether the attempt was authoritative; a stale finish is a
    /// silent no-op either way.
    pub fn end_attempt(&self, map_id: u32, attempt_id: u64) -> bool {
        let task = self.map_task(map_id);
        let closed_partitions = {
            let mut state = task.lock().expect("map task lock poisoned");
            let Some(partitions) = state.end_attempt(attempt_id) else {
                tracing::debug!(
                    "Shuffle {}: ignored stale finish from attempt {} for map {}",
                    self.id,
                    attempt_id,
                    map_id
                );
                return false;
            };
            // Still under the map-task lock: a concurrent advancement must not
            // see these closes land after its purge reopened the partitions.
            for partition_id in &partitions {
                self.partitions
                    .entry(*partition_id)
                    .or_default()
                    .mark_closed();
            }
            partitions
        };

        tracing::info!(
            "Shuffle {}: map {} attempt {} finished upload, closed {} partition(s)",
            self.id,
            map_id,
            attempt_id,
            closed_partitions.len()
        );
        self.tracker.notify_closed();
        true
    }

    /// Returns the visible records of one partition, in arrival order.
    pub fn read_partition(&self, partition_id: u32, expected: &HashSet<u64>) -> Vec<AttemptRecord> {
        let records = match self.partitions.get(&partition_id) {
            Some(buffer) => {
                let (records, _closed) = buffer.snapshot();
                records
            }
            // Never-written partition: absence of data is a normal state.
            None => return Vec::new(),
        };
        visible_records(&records, expected)
    }

    /// True iff every named partition is closed under its current attempt.
    pub fn partitions_closed(&self, partition_ids: &[u32]) -> bool {
        partition_ids.iter().all(|partition_id| {
            self.partitions
                .get(partition_id)
                .map(|buffer| buffer.is_closed())
                .unwrap_or(false)
        })
    }

    /// Waits until the named partitions are all closed or `timeout` elapses.
    pub async fn wait_partitions_closed(&self, partition_ids: &[u32], timeout: Duration) -> bool {
        self.tracker
            .wait_until(timeout, || self.partitions_closed(partition_ids))
            .await
    }

    pub fn map_task_count(&self) -> usize {
        self.map_tasks.len()
    }

    pub fn buffered_record_count(&self) -> usize {
        self.partitions.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn closed_partition_count(&self) -> usize {
        self.partitions
            .iter()
            .filter(|entry| entry.value().is_closed())
            .count()
    }
}

/// Aggregate counters across all live shuffles, for the stats surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryStats {
    pub shuffles: usize,
    pub map_tasks: usize,
    pub buffered_records: usize,
    pub closed_partitions: usize,
}

/// Cap on retained teardown tombstones. Once reached, the oldest half is
/// evicted; recent teardowns must keep absorbing late writers.
const MAX_RETIRED_SHUFFLES: usize = 10_000;

/// Registry of all live shuffles on this server.
///
/// Owned by the server process and passed by handle to every request handler;
/// there is no ambient global state.
pub struct AppShuffleRegistry {
    shuffles: DashMap<AppShuffleId, Arc<AppShuffle>>,
    /// Tombstones for torn-down shuffles, so in-flight writers racing a
    /// teardown degrade to silent drops instead of resurrecting state.
    /// Values are retirement sequence numbers, oldest first under eviction.
    retired: DashMap<AppShuffleId, u64>,
    retired_seq: AtomicU64,
}

impl AppShuffleRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            shuffles: DashMap::new(),
            retired: DashMap::new(),
            retired_seq: AtomicU64::new(0),
        })
    }

    /// Fetches live state for a shuffle, creating it on first activity.
    /// Returns `None` for a torn-down shuffle.
    fn get_or_create(&self, id: &AppShuffleId) -> Option<Arc<AppShuffle>> {
        if self.retired.contains_key(id) {
            return None;
        }
        let shuffle = self
            .shuffles
            .entry(id.clone())
            .or_insert_with(|| Arc::new(AppShuffle::new(id.clone())))
            .clone();
        // A teardown may have raced the creation above; honor the tombstone.
        if self.retired.contains_key(id) {
            self.shuffles.remove(id);
            return None;
        }
        Some(shuffle)
    }

    fn get(&self, app_id: &str, shuffle_id: u32) -> Option<Arc<AppShuffle>> {
        self.shuffles
            .get(&AppShuffleId::new(app_id, shuffle_id))
            .map(|entry| entry.clone())
    }

    /// Begins an upload attempt. `num_maps` is the upstream task count the
    /// writer announces; it is retained as a hint only.
    pub fn begin_attempt(
        &self,
        app_id: &str,
        shuffle_id: u32,
        map_id: u32,
        attempt_id: u64,
        num_maps: u32,
    ) -> WriteOutcome {
        let id = AppShuffleId::new(app_id, shuffle_id);
        match self.get_or_create(&id) {
            Some(shuffle) => shuffle.begin_attempt(map_id, attempt_id, num_maps),
            None => {
                tracing::debug!("Dropped upload start for retired shuffle {}", id);
                WriteOutcome::Rejected
            }
        }
    }

    /// Buffers one record. Always succeeds from the caller's point of view;
    /// the outcome reports whether the record was actually kept.
    pub fn write_record(
        &self,
        app_id: &str,
        shuffle_id: u32,
        map_id: u32,
        attempt_id: u64,
        partition_id: u32,
        key: Option<bytes::Bytes>,
        value: Option<bytes::Bytes>,
    ) -> WriteOutcome {
        let id = AppShuffleId::new(app_id, shuffle_id);
        match self.get_or_create(&id) {
            Some(shuffle) => shuffle.write_record(map_id, attempt_id, partition_id, key, value),
            None => {
                tracing::trace!("Dropped record for retired shuffle {}", id);
                WriteOutcome::Rejected
            }
        }
    }

    /// Finishes an upload attempt. Stale or unknown attempts are a no-op.
    pub fn end_attempt(&self, app_id: &str, shuffle_id: u32, map_id: u32, attempt_id: u64) {
        if let Some(shuffle) = self.get(app_id, shuffle_id) {
            shuffle.end_attempt(map_id, attempt_id);
        }
    }

    /// Reads one partition, filtered by the caller's expected attempt set.
    pub fn read_partition(
        &self,
        app_id: &str,
        shuffle_id: u32,
        partition_id: u32,
        expected: &HashSet<u64>,
    ) -> Vec<AttemptRecord> {
        match self.get(app_id, shuffle_id) {
            Some(shuffle) => shuffle.read_partition(partition_id, expected),
            None => Vec::new(),
        }
    }

    /// True iff every named partition of the shuffle is closed.
    pub fn is_shuffle_closed(&self, app_id: &str, shuffle_id: u32, partition_ids: &[u32]) -> bool {
        match self.get(app_id, shuffle_id) {
            Some(shuffle) => shuffle.partitions_closed(partition_ids),
            None => false,
        }
    }

    /// Waits until the named partitions are closed or the timeout elapses.
    ///
    /// A reader may call this before any writer has reached the server, so an
    /// unknown shuffle is created and waited on rather than failed.
    pub async fn wait_shuffle_closed(
        &self,
        app_id: &str,
        shuffle_id: u32,
        partition_ids: &[u32],
        timeout: Duration,
    ) -> bool {
        let id = AppShuffleId::new(app_id, shuffle_id);
        match self.get_or_create(&id) {
            Some(shuffle) => shuffle.wait_partitions_closed(partition_ids, timeout).await,
            None => false,
        }
    }

    /// Tears down a shuffle once the consuming job is done.
    ///
    /// Late writers observe the tombstone and drop silently; waiters already
    /// suspended run out their timeout normally.
    pub fn remove_shuffle(&self, app_id: &str, shuffle_id: u32) {
        let id = AppShuffleId::new(app_id, shuffle_id);

        if self.retired.len() >= MAX_RETIRED_SHUFFLES {
            let mut tombstones: Vec<(AppShuffleId, u64)> = self
                .retired
                .iter()
                .map(|entry| (entry.key().clone(), *entry.value()))
                .collect();
            tombstones.sort_by_key(|(_, retired_seq)| *retired_seq);
            let evict = tombstones.len() / 2;
            for (old_id, _) in tombstones.into_iter().take(evict) {
                self.retired.remove(&old_id);
            }
        }
        let seq = self.retired_seq.fetch_add(1, Ordering::Relaxed);
        self.retired.insert(id.clone(), seq);

        if let Some((_, shuffle)) = self.shuffles.remove(&id) {
            tracing::info!(
                "Removed shuffle {} after {} ms ({} map task(s), {} buffered record(s))",
                id,
                now_ms().saturating_sub(shuffle.created_at),
                shuffle.map_task_count(),
                shuffle.buffered_record_count()
            );
        }
    }

    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats {
            shuffles: self.shuffles.len(),
            ..RegistryStats::default()
        };
        for entry in self.shuffles.iter() {
            let shuffle = entry.value();
            stats.map_tasks += shuffle.map_task_count();
            stats.buffered_records += shuffle.buffered_record_count();
            stats.closed_partitions += shuffle.closed_partition_count();
        }
        stats
    }
}
