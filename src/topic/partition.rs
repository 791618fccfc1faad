//! A single partition's leader binding and message queues.
//!
//! Owned jointly by the [`super::TopicHandle`] that holds it (in
//! `partitions`, `ua`, or `desired`) and by whichever async operation is
//! in flight against it; reached through an `Arc` so a partition never
//! needs to refer back to its topic -- this `PartitionHandle` simply
//! doesn't hold a reference to its topic at all. Operations that need
//! topic context receive it as a parameter instead.

use std::collections::VecDeque;
use std::time::Instant;

use parking_lot::{Mutex, MutexGuard};

use crate::broker::BrokerId;
use crate::lock_order::{Level, Tracked};
use crate::message::Message;

/// Sentinel id for the "unassigned" partition that holds messages queued
/// before routing is possible.
pub const UA: i32 = -1;

#[derive(Debug, Default, Clone, Copy)]
pub struct PartitionFlags {
    /// Set while a consumer has asked for this partition by id.
    pub desired: bool,
    /// Set while the partition sits in `desired` because it isn't
    /// currently present in the dense partition table.
    pub unknown: bool,
}

#[derive(Default)]
struct PartitionInner {
    leader: Option<BrokerId>,
    flags: PartitionFlags,
    msgq: VecDeque<Message>,
    xmit_msgq: VecDeque<Message>,
}

/// One partition's leader binding and queues, guarded by its own lock.
/// Taken only after the owning topic's lock, per the global lock order
/// (client -> topic -> partition).
#[derive(Debug)]
pub struct PartitionHandle {
    pub id: i32,
    inner: Mutex<PartitionInner>,
}

impl std::fmt::Debug for PartitionInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionInner")
            .field("leader", &self.leader)
            .field("flags", &self.flags)
            .field("msgq_len", &self.msgq.len())
            .field("xmit_msgq_len", &self.xmit_msgq.len())
            .finish()
    }
}

/// Outcome of binding a partition to a (possibly absent) leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderUpdate {
    /// The partition had a leader and now has none.
    Unknown,
    NoChange,
    Changed,
}

impl PartitionHandle {
    pub fn new(id: i32) -> Self {
        Self {
            id,
            inner: Mutex::new(PartitionInner::default()),
        }
    }

    fn lock(&self) -> Tracked<MutexGuard<'_, PartitionInner>> {
        Tracked::new(self.inner.lock(), Level::Partition)
    }

    pub fn new_desired(id: i32) -> Self {
        let handle = Self::new(id);
        handle.lock().flags.desired = true;
        handle
    }

    pub fn leader(&self) -> Option<BrokerId> {
        self.lock().leader
    }

    pub fn is_available(&self) -> bool {
        self.leader().is_some()
    }

    pub fn flags(&self) -> PartitionFlags {
        self.lock().flags
    }

    pub fn set_unknown(&self, unknown: bool) {
        self.lock().flags.unknown = unknown;
    }

    pub fn set_desired(&self, desired: bool) {
        self.lock().flags.desired = desired;
    }

    /// Binds (or clears) this partition's leader. Returns whether the
    /// binding actually changed -- the ingestor uses this to count
    /// observable updates and the resize/shrink path uses it to decide
    /// whether a query needs rescheduling.
    pub fn delegate_leader(&self, leader: Option<BrokerId>) -> LeaderUpdate {
        let mut inner = self.lock();
        match (inner.leader, leader) {
            (None, None) => LeaderUpdate::NoChange,
            (Some(_), None) => {
                inner.leader = None;
                LeaderUpdate::Unknown
            }
            (old, new) if old == new => LeaderUpdate::NoChange,
            _ => {
                inner.leader = leader;
                LeaderUpdate::Changed
            }
        }
    }

    pub fn enqueue(&self, message: Message) {
        self.lock().msgq.push_back(message);
    }

    pub fn enqueue_xmit(&self, message: Message) {
        self.lock().xmit_msgq.push_back(message);
    }

    pub fn len(&self) -> usize {
        let inner = self.lock();
        inner.msgq.len() + inner.xmit_msgq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Moves every message out of both queues into `dst`'s `msgq`,
    /// preserving order: `xmit_msgq` first (closer to being sent), then
    /// `msgq`.
    pub fn move_messages_into(&self, dst: &PartitionHandle) {
        let mut src = self.lock();
        let mut dst_inner = dst.lock();
        dst_inner.msgq.extend(src.xmit_msgq.drain(..));
        dst_inner.msgq.extend(src.msgq.drain(..));
    }

    /// Drains both queues, in FIFO order (xmit first), for callers that
    /// are about to report them as failed rather than move them.
    pub fn purge(&self) -> VecDeque<Message> {
        let mut inner = self.lock();
        let mut drained: VecDeque<Message> = inner.xmit_msgq.drain(..).collect();
        drained.extend(inner.msgq.drain(..));
        drained
    }

    /// Moves every message older than `now` out of both queues and into
    /// `out`, preserving relative order within this partition.
    pub fn age_scan(&self, now: Instant, out: &mut VecDeque<Message>) {
        let mut inner = self.lock();
        Self::age_scan_queue(&mut inner.xmit_msgq, now, out);
        Self::age_scan_queue(&mut inner.msgq, now, out);
    }

    fn age_scan_queue(queue: &mut VecDeque<Message>, now: Instant, out: &mut VecDeque<Message>) {
        let mut remaining = VecDeque::with_capacity(queue.len());
        for message in queue.drain(..) {
            if message.is_timed_out(now) {
                out.push_back(message);
            } else {
                remaining.push_back(message);
            }
        }
        *queue = remaining;
    }
}
