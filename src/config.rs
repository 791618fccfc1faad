//! Client- and topic-level configuration.
//!
//! Builder style mirrors `rskafka`'s `ClientBuilder`: plain fields, `fn
//! foo(mut self, ...) -> Self` setters, `Debug` hand-rolled where a field
//! can't derive it (the partitioner trait object).

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::partitioner::{ConsistentRandomPartitioner, Partitioner};

/// Whether this client instance is producing or consuming. UA routing
/// only runs for producers; desired-partition propagation only runs for
/// consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientRole {
    Producer,
    Consumer,
}

/// Sentinel compression setting carried in [`TopicConfig`]. No codec is
/// implemented here -- actual (de)compression belongs to the produce/fetch
/// pipeline, which is out of scope for this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionCodec {
    /// Use the client-wide default.
    #[default]
    Inherit,
    None,
    Gzip,
    Snappy,
    Lz4,
    Zstd,
}

/// Per-topic configuration. Copied into the [`crate::topic::TopicHandle`]
/// at construction and immutable thereafter (explicit reconfiguration is
/// out of scope).
#[derive(Clone)]
pub struct TopicConfig {
    pub partitioner: Arc<dyn Partitioner>,
    pub compression: CompressionCodec,
    pub opaque: Option<Arc<dyn Any + Send + Sync>>,
    /// Consumer-side only: partitions to subscribe to by id regardless of
    /// whether they currently exist.
    pub desired_partitions: Vec<i32>,
}

impl fmt::Debug for TopicConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicConfig")
            .field("compression", &self.compression)
            .field("desired_partitions", &self.desired_partitions)
            .finish_non_exhaustive()
    }
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            partitioner: Arc::new(ConsistentRandomPartitioner::new()),
            compression: CompressionCodec::default(),
            opaque: None,
            desired_partitions: Vec::new(),
        }
    }
}

impl TopicConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn partitioner(mut self, partitioner: Arc<dyn Partitioner>) -> Self {
        self.partitioner = partitioner;
        self
    }

    pub fn compression(mut self, compression: CompressionCodec) -> Self {
        self.compression = compression;
        self
    }

    pub fn opaque(mut self, opaque: Arc<dyn Any + Send + Sync>) -> Self {
        self.opaque = Some(opaque);
        self
    }

    pub fn desired_partitions(mut self, ids: impl IntoIterator<Item = i32>) -> Self {
        self.desired_partitions = ids.into_iter().collect();
        self
    }
}

/// A small blacklist matcher: each pattern is a literal topic name or a
/// `*`-glob over it (the only wildcard form librdkafka-family clients
/// commonly expose for `topic.blacklist`). No regex dependency is pulled
/// in for this -- the matching is a handful of lines.
#[derive(Debug, Clone, Default)]
pub struct TopicBlacklist {
    patterns: Vec<String>,
}

impl TopicBlacklist {
    pub fn new(patterns: impl IntoIterator<Item = String>) -> Self {
        Self {
            patterns: patterns.into_iter().collect(),
        }
    }

    pub fn matches(&self, topic_name: &str) -> bool {
        self.patterns
            .iter()
            .any(|pattern| glob_match(pattern, topic_name))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn glob_match(pattern: &str, text: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == text,
        Some((prefix, suffix)) => {
            text.len() >= prefix.len() + suffix.len()
                && text.starts_with(prefix)
                && text.ends_with(suffix)
        }
    }
}

/// Client-wide configuration.
#[derive(Clone)]
pub struct ClientConfig {
    pub role: ClientRole,
    pub metadata_refresh_interval: Duration,
    pub topic_blacklist: TopicBlacklist,
    pub default_topic_config: TopicConfig,
    /// Broker-side effect only: whether the broker is allowed to
    /// auto-create topics this client references but that don't exist
    /// yet. Carried here purely so callers can pass it through to the
    /// (out of scope) metadata request.
    pub auto_create_topics: bool,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("role", &self.role)
            .field("metadata_refresh_interval", &self.metadata_refresh_interval)
            .field("topic_blacklist", &self.topic_blacklist)
            .field("auto_create_topics", &self.auto_create_topics)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    pub fn new(role: ClientRole) -> Self {
        Self {
            role,
            metadata_refresh_interval: Duration::from_secs(300),
            topic_blacklist: TopicBlacklist::default(),
            default_topic_config: TopicConfig::default(),
            auto_create_topics: true,
        }
    }

    pub fn metadata_refresh_interval(mut self, interval: Duration) -> Self {
        self.metadata_refresh_interval = interval;
        self
    }

    pub fn topic_blacklist(mut self, blacklist: TopicBlacklist) -> Self {
        self.topic_blacklist = blacklist;
        self
    }

    pub fn default_topic_config(mut self, config: TopicConfig) -> Self {
        self.default_topic_config = config;
        self
    }

    pub fn auto_create_topics(mut self, enabled: bool) -> Self {
        self.auto_create_topics = enabled;
        self
    }
}
