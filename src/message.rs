//! Messages in flight between the application and a partition.
//!
//! This module only carries what the topic/partition core needs to move,
//! age, and report on messages. Encoding, compression, and the actual wire
//! send live in the (out of scope) produce pipeline.

use std::fmt;
use std::time::Instant;

use crate::error::ErrorCode;

/// Sentinel partition id meaning "not yet routed".
pub const UNASSIGNED_PARTITION: i32 = -1;

/// A message queued for (or already routed to) a partition.
pub struct Message {
    pub key: Option<Vec<u8>>,
    pub payload: Option<Vec<u8>>,

    /// Partition the application asked for explicitly, or
    /// [`UNASSIGNED_PARTITION`] to let the partitioner decide.
    pub forced_partition_id: i32,

    /// When this message was handed to the core.
    pub enqueued_at: Instant,

    /// When this message should be considered timed out if still
    /// unsent.
    pub deadline: Instant,
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("key_len", &self.key.as_ref().map(Vec::len))
            .field("payload_len", &self.payload.as_ref().map(Vec::len))
            .field("forced_partition_id", &self.forced_partition_id)
            .finish()
    }
}

impl Message {
    pub fn new(key: Option<Vec<u8>>, payload: Option<Vec<u8>>, deadline: Instant) -> Self {
        Self {
            key,
            payload,
            forced_partition_id: UNASSIGNED_PARTITION,
            enqueued_at: Instant::now(),
            deadline,
        }
    }

    pub fn with_forced_partition(mut self, partition_id: i32) -> Self {
        self.forced_partition_id = partition_id;
        self
    }

    pub fn is_timed_out(&self, now: Instant) -> bool {
        now > self.deadline
    }
}

/// Sink the application provides to receive terminal message status.
///
/// Partitions (and the UA/scan paths that move messages out of a
/// partition) call into this whenever a message reaches a terminal,
/// non-delivered state. Successful delivery is reported by the (out of
/// scope) produce pipeline; this core only ever reports failures.
pub trait DeliveryReportSink: Send + Sync + fmt::Debug {
    fn report(&self, topic: &str, partition_id: i32, message: Message, error: ErrorCode);

    /// Convenience for reporting an entire queue at once with the same
    /// error, preserving order.
    fn report_all(
        &self,
        topic: &str,
        partition_id: i32,
        messages: std::collections::VecDeque<Message>,
        error: ErrorCode,
    ) {
        for message in messages {
            self.report(topic, partition_id, message, error);
        }
    }

    /// A per-partition error not tied to any particular message -- used
    /// when a consumer's desired partition is (still, or newly) absent
    /// from the table. Distinct from [`Self::report`]/[`Self::report_all`],
    /// which always carry an actual [`Message`]. Default is a no-op so
    /// sinks that only care about message outcomes don't have to
    /// implement it.
    fn report_partition_error(&self, _topic: &str, _partition_id: i32, _error: ErrorCode) {}
}

/// A [`DeliveryReportSink`] that drops every report. Useful for tests and
/// for fire-and-forget producers that don't care about failures.
#[derive(Debug, Default)]
pub struct NullDeliveryReportSink;

impl DeliveryReportSink for NullDeliveryReportSink {
    fn report(&self, _topic: &str, _partition_id: i32, _message: Message, _error: ErrorCode) {}
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub reports: Mutex<Vec<(String, i32, ErrorCode)>>,
        pub partition_errors: Mutex<Vec<(String, i32, ErrorCode)>>,
    }

    impl DeliveryReportSink for RecordingSink {
        fn report(&self, topic: &str, partition_id: i32, _message: Message, error: ErrorCode) {
            self.reports
                .lock()
                .push((topic.to_string(), partition_id, error));
        }

        fn report_partition_error(&self, topic: &str, partition_id: i32, error: ErrorCode) {
            self.partition_errors
                .lock()
                .push((topic.to_string(), partition_id, error));
        }
    }
}
