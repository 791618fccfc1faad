//! Pluggable message-to-partition routing.
//!
//! Mirrors the `Partitioner` trait found in the wider Kafka-client
//! ecosystem (forced partition, then key hash, then round robin) but
//! narrowed to the contract this core actually needs: a read-only view of
//! a topic's assignable partitions, in, a partition id or "none
//! available" out.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use rand::Rng;

/// Read-only view of a topic a [`Partitioner`] needs: how many partitions
/// exist, and which ones currently have a leader ("available").
pub trait PartitionerTopic {
    fn partition_count(&self) -> i32;
    fn is_available(&self, partition_id: i32) -> bool;
    fn available_partitions(&self) -> Vec<i32>;
}

/// No partition could be chosen (e.g. the topic has no partitions with a
/// leader right now).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoPartitionAvailable;

impl fmt::Display for NoPartitionAvailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no partition available")
    }
}

impl std::error::Error for NoPartitionAvailable {}

/// Maps a message key to a partition id. Stateless from the core's
/// perspective -- only the return value matters.
pub trait Partitioner: Send + Sync + fmt::Debug {
    fn partition(
        &self,
        topic: &dyn PartitionerTopic,
        key: Option<&[u8]>,
    ) -> Result<i32, NoPartitionAvailable>;
}

/// Default strategy: consistent hash of the key when present, otherwise
/// uniform random across the partitions that currently have a leader.
#[derive(Debug, Default)]
pub struct ConsistentRandomPartitioner;

impl ConsistentRandomPartitioner {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Partitioner for ConsistentRandomPartitioner {
    fn partition(
        &self,
        topic: &dyn PartitionerTopic,
        key: Option<&[u8]>,
    ) -> Result<i32, NoPartitionAvailable> {
        let available = topic.available_partitions();
        if available.is_empty() {
            return Err(NoPartitionAvailable);
        }

        let index = match key {
            Some(key) => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                (hasher.finish() as usize) % available.len()
            }
            None => {
                if available.len() == 1 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..available.len())
                }
            }
        };

        Ok(available[index])
    }
}

/// Always routes to the same partition, regardless of key. Useful for
/// tests and for single-partition topics.
#[derive(Debug)]
pub struct FixedPartitioner(pub i32);

impl Partitioner for FixedPartitioner {
    fn partition(
        &self,
        topic: &dyn PartitionerTopic,
        _key: Option<&[u8]>,
    ) -> Result<i32, NoPartitionAvailable> {
        if topic.is_available(self.0) {
            Ok(self.0)
        } else {
            Err(NoPartitionAvailable)
        }
    }
}
