//! Per-topic state: name, config, state machine, partition table, the UA
//! partition, and the set of consumer-desired-but-not-yet-present
//! partitions.
//!
//! Metadata ingestion reshapes the partition table here, and
//! producer/consumer paths route messages against what it holds. Locking
//! follows the global order (client -> topic -> partition): every method
//! here that touches a [`PartitionHandle`] has already taken
//! `self.inner`'s write or read lock first.

pub mod partition;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

use crate::broker::BrokerId;
use crate::config::{ClientRole, TopicConfig};
use crate::error::{ErrorCode, MetadataError};
use crate::lock_order::{Level, Tracked};
use crate::message::{DeliveryReportSink, Message};
use crate::partitioner::PartitionerTopic;

pub use partition::{LeaderUpdate, PartitionFlags, PartitionHandle, UA};

/// A topic's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicState {
    /// No metadata seen yet, or metadata has gone stale.
    Unknown,
    /// Metadata confirms at least one partition.
    Exists,
    /// Metadata confirms the topic does not exist.
    NotExists,
}

/// One partition entry in an incoming metadata snapshot.
#[derive(Debug, Clone, Copy)]
pub struct PartitionMeta {
    pub id: i32,
    /// Broker node id, or `-1` if no leader is currently known.
    pub leader_id: i32,
}

/// A per-topic metadata snapshot as reported by the broker.
#[derive(Debug, Clone)]
pub struct MetadataSnapshot {
    pub topic_name: Arc<str>,
    pub error: MetadataError,
    pub partitions: Vec<PartitionMeta>,
}

struct TopicInner {
    state: TopicState,
    partitions: Vec<Arc<PartitionHandle>>,
    desired: HashMap<i32, Arc<PartitionHandle>>,
    ts_metadata: u64,
}

/// Per-topic state, shared via `Arc` between the registry and every
/// caller holding a reference. All mutable fields live behind `inner`;
/// `ua` is created at construction and lives exactly as long as the
/// handle, so it never needs the write lock to reach.
pub struct TopicHandle {
    name: Arc<str>,
    config: TopicConfig,
    role: ClientRole,
    inner: RwLock<TopicInner>,
    ua: Arc<PartitionHandle>,
}

impl std::fmt::Debug for TopicHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.read_inner();
        f.debug_struct("TopicHandle")
            .field("name", &self.name)
            .field("state", &inner.state)
            .field("partition_cnt", &inner.partitions.len())
            .field("ts_metadata", &inner.ts_metadata)
            .finish_non_exhaustive()
    }
}

/// Result of applying one metadata snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Number of observable changes (resize and/or leader rebindings).
    pub updates: u32,
    /// Whether the caller should schedule an async leader-metadata query
    /// (some referenced partition id fell outside the current table).
    pub query_leader: bool,
}

impl TopicHandle {
    pub fn new(name: Arc<str>, config: TopicConfig, role: ClientRole) -> Self {
        let ua = Arc::new(PartitionHandle::new(UA));
        let desired = config
            .desired_partitions
            .iter()
            .map(|&id| (id, Arc::new(PartitionHandle::new_desired(id))))
            .map(|(id, handle)| {
                handle.set_unknown(true);
                (id, handle)
            })
            .collect();

        Self {
            name,
            config,
            role,
            inner: RwLock::new(TopicInner {
                state: TopicState::Unknown,
                partitions: Vec::new(),
                desired,
                ts_metadata: 0,
            }),
            ua,
        }
    }

    fn read_inner(&self) -> Tracked<RwLockReadGuard<'_, TopicInner>> {
        Tracked::new(self.inner.read(), Level::Topic)
    }

    fn write_inner(&self) -> Tracked<RwLockWriteGuard<'_, TopicInner>> {
        Tracked::new(self.inner.write(), Level::Topic)
    }

    pub fn role(&self) -> ClientRole {
        self.role
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &TopicConfig {
        &self.config
    }

    /// The opaque value the application attached via
    /// [`TopicConfig::opaque`], if any.
    pub fn opaque(&self) -> Option<&Arc<dyn std::any::Any + Send + Sync>> {
        self.config.opaque.as_ref()
    }

    pub fn state(&self) -> TopicState {
        self.read_inner().state
    }

    pub fn partition_count(&self) -> i32 {
        self.read_inner().partitions.len() as i32
    }

    pub fn partition_ids(&self) -> Vec<i32> {
        (0..self.partition_count()).collect()
    }

    pub fn ts_metadata(&self) -> u64 {
        self.read_inner().ts_metadata
    }

    pub fn ua(&self) -> &Arc<PartitionHandle> {
        &self.ua
    }

    pub fn leader_id(&self, partition_id: i32) -> Option<BrokerId> {
        if partition_id == UA {
            return None;
        }
        let inner = self.read_inner();
        inner
            .partitions
            .get(usize::try_from(partition_id).ok()?)
            .and_then(|p| p.leader())
    }

    /// True iff a partition with this id exists in the table and has a
    /// leader right now.
    pub fn partition_available(&self, partition_id: i32) -> bool {
        if partition_id == UA || partition_id < 0 {
            return false;
        }
        let inner = self.read_inner();
        inner
            .partitions
            .get(partition_id as usize)
            .is_some_and(|p| p.is_available())
    }

    pub fn desired_partition_ids(&self) -> Vec<i32> {
        self.read_inner().desired.keys().copied().collect()
    }

    /// Adds `partition_id` to the desired set if it is not already
    /// present in the dense table or the desired set.
    pub fn desire(&self, partition_id: i32) {
        let mut inner = self.write_inner();
        if (partition_id as usize) < inner.partitions.len() {
            inner.partitions[partition_id as usize].set_desired(true);
            return;
        }
        inner.desired.entry(partition_id).or_insert_with(|| {
            let handle = Arc::new(PartitionHandle::new_desired(partition_id));
            handle.set_unknown(true);
            handle
        });
    }

    pub fn undesire(&self, partition_id: i32) {
        let mut inner = self.write_inner();
        if let Some(p) = inner.partitions.get(partition_id as usize) {
            p.set_desired(false);
            return;
        }
        inner.desired.remove(&partition_id);
    }

    /// Applies one metadata snapshot. `resolved` must already contain one
    /// entry per `snapshot.partitions`, in the same order, with broker
    /// ids resolved to live [`BrokerId`]s (or `None` if the broker is
    /// unknown or the snapshot reported no leader). Blacklist, transient,
    /// not-locally-tracked and terminating checks all happen before this
    /// is called (they don't require the topic lock).
    pub fn apply_metadata(
        &self,
        error: MetadataError,
        resolved: &[(i32, Option<BrokerId>)],
        now: u64,
        dr_sink: &dyn DeliveryReportSink,
    ) -> IngestOutcome {
        let mut inner = self.write_inner();
        inner.ts_metadata = now.max(inner.ts_metadata);
        let old_state = inner.state;

        let incoming_cnt = resolved.len();
        if matches!(
            error,
            MetadataError::UnknownTopicOrPartition | MetadataError::Unknown
        ) {
            inner.state = TopicState::NotExists;
        } else if incoming_cnt > 0 {
            inner.state = TopicState::Exists;
        }

        let mut updates = 0u32;
        let mut query_leader = false;

        // Invariant: `state == NotExists` implies `partition_cnt == 0`.
        // Resize to the reported count on an ordinary snapshot; resize to
        // zero unconditionally once the topic is confirmed gone, even
        // though the snapshot itself carried an error rather than an
        // empty partition list.
        let target_cnt = if inner.state == TopicState::NotExists {
            0
        } else if error.is_no_error() {
            incoming_cnt as i32
        } else {
            inner.partitions.len() as i32
        };
        if self.resize_locked(&mut inner, target_cnt, dr_sink) {
            updates += 1;
        }

        for &(id, broker) in resolved {
            match Self::leader_update_locked(&mut inner, id, broker) {
                TableLeaderUpdate::PartitionNotFound => {
                    query_leader = true;
                    warn!(topic = %self.name, partition = id, "metadata referenced unknown partition");
                }
                TableLeaderUpdate::Changed => updates += 1,
                TableLeaderUpdate::Unknown | TableLeaderUpdate::NoChange => {}
            }
        }

        if !error.is_no_error() && !inner.partitions.is_empty() {
            for partition in &inner.partitions {
                partition.delegate_leader(None);
            }
        }

        if old_state != inner.state {
            info!(topic = %self.name, from = ?old_state, to = ?inner.state, "topic state changed");
        }

        if updates > 0 || inner.state == TopicState::NotExists {
            self.ua_reassign_locked(&mut inner, dr_sink);
        }

        if old_state != inner.state && inner.state == TopicState::NotExists {
            self.propagate_not_exists_locked(&mut inner, dr_sink);
        }

        IngestOutcome {
            updates,
            query_leader,
        }
    }

    /// The broker answered but didn't mention this topic at all: treated
    /// identically to an explicit `UnknownTopicOrPartition`. Deliberate --
    /// callers can't and shouldn't distinguish the two afterwards.
    pub fn metadata_none(&self, now: u64, dr_sink: &dyn DeliveryReportSink) {
        let mut inner = self.write_inner();
        inner.ts_metadata = now.max(inner.ts_metadata);
        let old_state = inner.state;
        inner.state = TopicState::NotExists;
        self.resize_locked(&mut inner, 0, dr_sink);
        self.ua_reassign_locked(&mut inner, dr_sink);
        if old_state != TopicState::NotExists {
            self.propagate_not_exists_locked(&mut inner, dr_sink);
        }
    }

    /// Transitions to `Unknown` if metadata is stale, ages out timed-out
    /// messages, and (if the table is currently empty) appends `self`'s
    /// name to `to_query` so the caller can schedule a leader query after
    /// releasing every topic lock in the scan (see [`crate::scanner`]).
    pub fn scan(
        &self,
        now: Instant,
        now_micros: u64,
        refresh_interval: Option<Duration>,
        to_query: &mut Vec<Arc<str>>,
        dr_sink: &dyn DeliveryReportSink,
    ) -> u32 {
        {
            let mut inner = self.write_inner();
            if inner.state != TopicState::Unknown {
                if let Some(refresh_interval) = refresh_interval {
                    let stale_after = 3 * refresh_interval.as_micros() as u64;
                    if now_micros > inner.ts_metadata.saturating_add(stale_after) {
                        info!(topic = %self.name, "metadata stale, reverting to unknown");
                        inner.state = TopicState::Unknown;
                    }
                }
            }
        }

        let inner = self.read_inner();
        if inner.partitions.is_empty() {
            to_query.push(Arc::clone(&self.name));
        }

        let mut ua_timed_out = VecDeque::new();
        self.ua.age_scan(now, &mut ua_timed_out);

        let mut per_partition_timed_out = Vec::new();
        for partition in &inner.partitions {
            let mut timed_out = VecDeque::new();
            partition.age_scan(now, &mut timed_out);
            if !timed_out.is_empty() {
                per_partition_timed_out.push((partition.id, timed_out));
            }
        }
        drop(inner);

        let mut count = ua_timed_out.len() as u32;
        dr_sink.report_all(&self.name, UA, ua_timed_out, ErrorCode::MessageTimedOut);
        for (partition_id, timed_out) in per_partition_timed_out {
            count += timed_out.len() as u32;
            dr_sink.report_all(&self.name, partition_id, timed_out, ErrorCode::MessageTimedOut);
        }
        count
    }

    /// Drains every parked message (in `ua` and in the dense table) with
    /// `UnknownPartition`. Used both for ordinary topic teardown and for
    /// client-wide termination, since there is nowhere else for a parked
    /// message to go once its topic is going away.
    pub fn drain(&self, dr_sink: &dyn DeliveryReportSink) {
        let inner = self.read_inner();
        dr_sink.report_all(&self.name, UA, self.ua.purge(), ErrorCode::UnknownPartition);
        for partition in &inner.partitions {
            dr_sink.report_all(
                &self.name,
                partition.id,
                partition.purge(),
                ErrorCode::UnknownPartition,
            );
        }
    }

    #[cfg(test)]
    pub(crate) fn force_ts_metadata(&self, ts: u64) {
        self.write_inner().ts_metadata = ts;
    }

    #[cfg(test)]
    pub(crate) fn force_state(&self, state: TopicState) {
        self.write_inner().state = state;
    }

    /// Grows or shrinks the dense partition table to `n` entries. Returns
    /// whether anything actually changed.
    fn resize_locked(
        &self,
        inner: &mut TopicInner,
        n: i32,
        dr_sink: &dyn DeliveryReportSink,
    ) -> bool {
        let n = n.max(0) as usize;
        let old_cnt = inner.partitions.len();
        if n == old_cnt {
            return false;
        }

        let mut new_partitions = Vec::with_capacity(n);
        for i in 0..n {
            if i < old_cnt {
                new_partitions.push(Arc::clone(&inner.partitions[i]));
            } else if let Some(handle) = inner.desired.remove(&(i as i32)) {
                handle.set_unknown(false);
                new_partitions.push(handle);
            } else {
                new_partitions.push(Arc::new(PartitionHandle::new(i as i32)));
            }
        }

        for partition in inner.desired.values() {
            dr_sink.report_partition_error(&self.name, partition.id, ErrorCode::UnknownPartition);
        }

        for j in n..old_cnt {
            let partition = &inner.partitions[j];
            partition.delegate_leader(None);

            if !partition.is_empty() {
                partition.move_messages_into(&self.ua);
            }

            if partition.flags().desired {
                partition.set_unknown(true);
                inner.desired.insert(partition.id, Arc::clone(partition));
                dr_sink.report_partition_error(&self.name, partition.id, ErrorCode::UnknownPartition);
            }
        }

        inner.partitions = new_partitions;
        true
    }

    fn leader_update_locked(
        inner: &mut TopicInner,
        partition_id: i32,
        broker: Option<BrokerId>,
    ) -> TableLeaderUpdate {
        let Some(partition) = inner.partitions.get(partition_id as usize) else {
            return TableLeaderUpdate::PartitionNotFound;
        };

        match partition.delegate_leader(broker) {
            LeaderUpdate::Changed => TableLeaderUpdate::Changed,
            LeaderUpdate::NoChange => TableLeaderUpdate::NoChange,
            LeaderUpdate::Unknown => TableLeaderUpdate::Unknown,
        }
    }

    /// Producer-role UA reassignment: routes every message parked in
    /// `ua` through the topic's partitioner, or reports it as failed.
    /// No-op for consumers, which never produce into `ua`.
    fn ua_reassign_locked(&self, inner: &mut TopicInner, dr_sink: &dyn DeliveryReportSink) {
        if self.role != ClientRole::Producer {
            return;
        }

        let staged = self.ua.purge();
        if staged.is_empty() {
            return;
        }

        let view = TopicSnapshotView {
            partitions: &inner.partitions,
        };

        let mut failed = VecDeque::new();
        for message in staged {
            let forced = message.forced_partition_id;
            if forced != UA
                && forced as usize >= inner.partitions.len()
                && inner.state != TopicState::Unknown
            {
                failed.push_back(message);
                continue;
            }

            let target = if forced != UA {
                Ok(forced)
            } else {
                self.config
                    .partitioner
                    .partition(&view, message.key.as_deref())
                    .map_err(|_| ())
            };

            match target {
                Ok(id) if (id as usize) < inner.partitions.len() => {
                    inner.partitions[id as usize].enqueue(message);
                }
                _ => failed.push_back(message),
            }
        }

        if !failed.is_empty() {
            let error = if inner.state == TopicState::NotExists {
                ErrorCode::UnknownTopic
            } else {
                ErrorCode::UnknownPartition
            };
            dr_sink.report_all(&self.name, UA, failed, error);
        }
    }

    /// Consumer-role NotExists propagation: every desired partition is
    /// told the topic is gone. No-op for producers, which don't carry a
    /// desired-partition set.
    fn propagate_not_exists_locked(&self, inner: &mut TopicInner, dr_sink: &dyn DeliveryReportSink) {
        if self.role != ClientRole::Consumer {
            return;
        }
        for partition in inner.desired.values() {
            dr_sink.report_partition_error(&self.name, partition.id, ErrorCode::UnknownTopic);
        }
    }
}

/// Local result of a per-partition leader update at table scope -- adds
/// "this id isn't in the table at all" on top of the per-partition
/// [`LeaderUpdate`] outcomes. Only a genuinely absent id should trigger a
/// leader query, not a partition merely losing its current leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableLeaderUpdate {
    PartitionNotFound,
    Unknown,
    NoChange,
    Changed,
}

struct TopicSnapshotView<'a> {
    partitions: &'a [Arc<PartitionHandle>],
}

impl PartitionerTopic for TopicSnapshotView<'_> {
    fn partition_count(&self) -> i32 {
        self.partitions.len() as i32
    }

    fn is_available(&self, partition_id: i32) -> bool {
        self.partitions
            .get(partition_id as usize)
            .is_some_and(|p| p.is_available())
    }

    fn available_partitions(&self) -> Vec<i32> {
        self.partitions
            .iter()
            .filter(|p| p.is_available())
            .map(|p| p.id)
            .collect()
    }
}

impl PartitionerTopic for TopicHandle {
    fn partition_count(&self) -> i32 {
        self.partition_count()
    }

    fn is_available(&self, partition_id: i32) -> bool {
        self.partition_available(partition_id)
    }

    fn available_partitions(&self) -> Vec<i32> {
        let inner = self.read_inner();
        inner
            .partitions
            .iter()
            .filter(|p| p.is_available())
            .map(|p| p.id)
            .collect()
    }
}
