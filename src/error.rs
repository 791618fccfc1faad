//! Error types surfaced by the topic-metadata and partition-routing core.
//!
//! [`Error`] covers calls that fail synchronously (topic creation with a
//! bad name, an ingest that can't proceed). [`ErrorCode`] is the small,
//! `Copy` status attached to a message or a consumer subscription after
//! the fact, delivered asynchronously via [`crate::message::DeliveryReportSink`]
//! or a partition's error queue. The two are kept separate rather than
//! unified into one enum: a call returning `Err` and a message being
//! reported as failed are different things happening on different
//! threads, and collapsing them made call sites ambiguous about which one
//! they were looking at.

use thiserror::Error;

/// Synchronous failure of a core operation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid topic name ({len} bytes, must be 1..=512)")]
    InvalidArg { len: usize },

    #[error("client is terminating")]
    Terminating,

    #[error("topic '{0}' is blacklisted")]
    Blacklisted(String),

    #[error("topic '{0}' is not locally tracked")]
    TopicNotTracked(String),

    #[error("metadata snapshot ignored (transient leader-not-available with no partitions)")]
    Transient,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Terminal status attached to a message or a consumer's desired-partition
/// entry. `Copy` because it's cheap to carry alongside a moved message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCode {
    /// Topic confirmed absent from the cluster.
    UnknownTopic,

    /// Partition id no longer present in the table, or a forced id was
    /// out of range.
    UnknownPartition,

    /// Message exceeded its deadline before it could be sent.
    MessageTimedOut,
}

/// Error codes as reported by the broker in a metadata response. This is
/// a small, intentionally incomplete mirror of the wire protocol's error
/// codes -- only the ones the ingestor branches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum MetadataError {
    NoError,
    LeaderNotAvailable,
    UnknownTopicOrPartition,
    /// Generic auto-create failure: the broker tried and failed to
    /// auto-create the topic.
    Unknown,
    Other(i16),
}

impl MetadataError {
    pub fn is_no_error(&self) -> bool {
        matches!(self, MetadataError::NoError)
    }
}
