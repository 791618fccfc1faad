//! Topic-metadata and partition-routing core for a partitioned-log
//! message broker client.
//!
//! This crate owns the part of a Kafka-shaped client that sits between
//! asynchronous metadata updates arriving from broker connections and the
//! producer/consumer paths above them: the registry of topic handles, the
//! per-topic partition table, ingestion of metadata snapshots that
//! reshape that table, routing of outbound messages to partitions
//! (including the unassigned-partition holding area), and the periodic
//! scan that ages out messages and refreshes stale metadata.
//!
//! Out of scope, by design: the wire protocol codec, broker connection
//! management, and the produce/fetch request pipelines. [`Client`]
//! exposes the seams those layers plug into ([`Client::apply_metadata`],
//! [`Client::scan`], [`LeaderQueryReceiver`]) without implementing them.
//!
//! [`Client`]: client::Client

pub mod broker;
pub mod client;
pub mod config;
pub mod error;
mod lock_order;
pub mod message;
pub mod partitioner;
pub mod registry;
pub mod scanner;
#[cfg(test)]
mod test_support;
pub mod topic;

pub use broker::{Broker, BrokerId, BrokerPool};
pub use client::{Client, LeaderQueryReceiver};
pub use config::{ClientConfig, ClientRole, CompressionCodec, TopicBlacklist, TopicConfig};
pub use error::{Error, ErrorCode, MetadataError, Result};
pub use message::{DeliveryReportSink, Message, NullDeliveryReportSink};
pub use partitioner::{
    ConsistentRandomPartitioner, FixedPartitioner, NoPartitionAvailable, Partitioner,
    PartitionerTopic,
};
pub use registry::{Existing, TopicRegistry};
pub use scanner::ScanOutcome;
pub use topic::{
    IngestOutcome, MetadataSnapshot, PartitionHandle, PartitionMeta, TopicHandle, TopicState, UA,
};
