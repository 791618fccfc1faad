//! The context object every core operation is performed against.
//!
//! [`Client`] owns the topic registry, the broker pool, the role, the
//! default config, and the termination flag, and every
//! producer/consumer/scanner call goes through it explicitly rather than
//! through a process-wide singleton.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tracing::debug;

use crate::broker::{Broker, BrokerId, BrokerPool};
use crate::config::{ClientConfig, TopicConfig};
use crate::error::{Error, MetadataError};
use crate::message::{DeliveryReportSink, NullDeliveryReportSink};
use crate::registry::{Existing, TopicRegistry};
use crate::scanner::{self, ScanOutcome};
use crate::topic::{IngestOutcome, MetadataSnapshot, TopicHandle};

/// Microseconds since the Unix epoch. Used only for `ts_metadata`
/// comparisons; wall-clock drift is not a concern here since staleness is
/// judged relative to the last snapshot, not to an absolute deadline.
pub fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}

/// Receives topic names the core has asked to have their leader metadata
/// refreshed. The (out of scope) broker layer drains this and issues the
/// actual metadata request.
pub struct LeaderQueryReceiver(pub mpsc::UnboundedReceiver<Arc<str>>);

impl LeaderQueryReceiver {
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        self.0.recv().await
    }
}

pub struct Client {
    config: ClientConfig,
    registry: TopicRegistry,
    brokers: BrokerPool,
    terminating: AtomicBool,
    leader_query_tx: mpsc::UnboundedSender<Arc<str>>,
    dr_sink: Arc<dyn DeliveryReportSink>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("topics", &self.registry.len())
            .field("terminating", &self.terminating.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn new(config: ClientConfig) -> (Self, LeaderQueryReceiver) {
        Self::with_delivery_sink(config, Arc::new(NullDeliveryReportSink))
    }

    pub fn with_delivery_sink(
        config: ClientConfig,
        dr_sink: Arc<dyn DeliveryReportSink>,
    ) -> (Self, LeaderQueryReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = Self {
            config,
            registry: TopicRegistry::new(),
            brokers: BrokerPool::new(),
            terminating: AtomicBool::new(false),
            leader_query_tx: tx,
            dr_sink,
        };
        (client, LeaderQueryReceiver(rx))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn brokers(&self) -> &BrokerPool {
        &self.brokers
    }

    pub fn is_terminating(&self) -> bool {
        self.terminating.load(Ordering::Acquire)
    }

    /// Creates (or returns the existing) topic handle the application can
    /// hold on to. `config` is ignored if the topic is already tracked.
    pub fn topic_new(
        &self,
        name: &str,
        config: Option<TopicConfig>,
    ) -> Result<Arc<TopicHandle>, Error> {
        let config = config.or_else(|| Some(self.config.default_topic_config.clone()));
        let (handle, existing) = self.registry.create(name, config, self.config.role)?;
        if existing == Existing::No {
            debug!(topic = name, "new topic handle created");
        }
        Ok(handle)
    }

    /// Releases the application's reference to `handle` and removes it
    /// from the registry if nothing else is holding it, draining any
    /// parked messages first.
    pub fn topic_destroy(&self, handle: Arc<TopicHandle>) {
        let name = handle.name().to_string();
        handle.drain(self.dr_sink.as_ref());
        drop(handle);
        self.registry.remove_if_unreferenced(&name);
    }

    pub fn topic_name<'a>(&self, handle: &'a TopicHandle) -> &'a str {
        handle.name()
    }

    pub fn topic_opaque<'a>(
        &self,
        handle: &'a TopicHandle,
    ) -> Option<&'a Arc<dyn std::any::Any + Send + Sync>> {
        handle.opaque()
    }

    pub fn topic_available(&self, topic_name: &str, partition_id: i32) -> bool {
        self.registry
            .find(topic_name.as_bytes())
            .is_some_and(|t| t.partition_available(partition_id))
    }

    /// Applies one metadata snapshot end to end: blacklist and transient
    /// checks, broker resolution under the broker-pool lock, the
    /// terminating check, then the topic-locked ingest itself.
    pub fn apply_metadata(&self, snapshot: MetadataSnapshot) -> Result<IngestOutcome, Error> {
        if self.config.topic_blacklist.matches(&snapshot.topic_name) {
            return Err(Error::Blacklisted(snapshot.topic_name.to_string()));
        }

        if matches!(snapshot.error, MetadataError::LeaderNotAvailable) && snapshot.partitions.is_empty()
        {
            return Err(Error::Transient);
        }

        let Some(topic) = self.registry.find(snapshot.topic_name.as_bytes()) else {
            return Err(Error::TopicNotTracked(snapshot.topic_name.to_string()));
        };

        let resolved: Vec<(i32, Option<BrokerId>)> = snapshot
            .partitions
            .iter()
            .map(|p| {
                let broker = if p.leader_id < 0 {
                    None
                } else {
                    self.brokers.get(p.leader_id).map(|b: Broker| b.id)
                };
                (p.id, broker)
            })
            .collect();

        if self.is_terminating() {
            return Err(Error::Terminating);
        }

        let outcome = topic.apply_metadata(
            snapshot.error,
            &resolved,
            now_micros(),
            self.dr_sink.as_ref(),
        );

        if outcome.query_leader {
            let _ = self.leader_query_tx.send(Arc::clone(&snapshot.topic_name));
        }

        Ok(outcome)
    }

    /// The broker answered but never mentioned this topic.
    pub fn metadata_none(&self, topic_name: &str) {
        if self.is_terminating() {
            return;
        }
        if let Some(topic) = self.registry.find(topic_name.as_bytes()) {
            topic.metadata_none(now_micros(), self.dr_sink.as_ref());
        }
    }

    /// Runs one periodic scan pass and fires any resulting leader
    /// queries after every topic lock has been released.
    pub fn scan(&self, now: Instant) -> ScanOutcome {
        let refresh_interval = Some(self.config.metadata_refresh_interval).filter(|d| !d.is_zero());
        let outcome = scanner::scan_all(
            &self.registry,
            refresh_interval,
            now,
            now_micros(),
            self.dr_sink.as_ref(),
        );
        for name in &outcome.needs_leader_query {
            let _ = self.leader_query_tx.send(Arc::clone(name));
        }
        outcome
    }

    /// Marks the client as terminating and drains every tracked topic.
    /// Pending messages are reported as `UnknownPartition`/`UnknownTopic`
    /// per topic, same as ordinary topic teardown.
    pub fn terminate(&self) {
        self.terminating.store(true, Ordering::Release);
        for topic in self.registry.list() {
            topic.drain(self.dr_sink.as_ref());
        }
    }

    pub fn update_brokers(&self, brokers: impl IntoIterator<Item = Broker>) {
        self.brokers.update(brokers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientRole;
    use crate::topic::PartitionMeta;

    fn snapshot(name: &str, error: MetadataError, partitions: Vec<PartitionMeta>) -> MetadataSnapshot {
        MetadataSnapshot {
            topic_name: Arc::from(name),
            error,
            partitions,
        }
    }

    #[test]
    fn apply_metadata_rejects_untracked_topic() {
        let (client, _rx) = Client::new(ClientConfig::new(ClientRole::Producer));
        let result = client.apply_metadata(snapshot("orders", MetadataError::NoError, vec![]));
        assert!(matches!(result, Err(Error::TopicNotTracked(_))));
    }

    #[test]
    fn apply_metadata_grows_partition_table_and_binds_leaders() {
        let (client, _rx) = Client::new(ClientConfig::new(ClientRole::Producer));
        client.update_brokers([
            Broker { id: 1, host: "a".into(), port: 9092 },
            Broker { id: 2, host: "b".into(), port: 9092 },
        ]);
        let topic = client.topic_new("orders", None).unwrap();

        let outcome = client
            .apply_metadata(snapshot(
                "orders",
                MetadataError::NoError,
                vec![
                    PartitionMeta { id: 0, leader_id: 1 },
                    PartitionMeta { id: 1, leader_id: 1 },
                    PartitionMeta { id: 2, leader_id: 2 },
                ],
            ))
            .unwrap();

        assert!(outcome.updates > 0);
        assert_eq!(topic.partition_count(), 3);
        assert_eq!(topic.leader_id(0), Some(1));
        assert_eq!(topic.leader_id(2), Some(2));
    }

    #[test]
    fn blacklisted_topic_is_rejected_before_lookup() {
        let config = ClientConfig::new(ClientRole::Producer)
            .topic_blacklist(crate::config::TopicBlacklist::new(["__*".to_string()]));
        let (client, _rx) = Client::new(config);
        let result =
            client.apply_metadata(snapshot("__consumer_offsets", MetadataError::NoError, vec![]));
        assert!(matches!(result, Err(Error::Blacklisted(_))));
    }

    #[test]
    fn transient_leader_not_available_with_no_partitions_is_ignored() {
        let (client, _rx) = Client::new(ClientConfig::new(ClientRole::Producer));
        client.topic_new("orders", None).unwrap();
        let result = client.apply_metadata(snapshot(
            "orders",
            MetadataError::LeaderNotAvailable,
            vec![],
        ));
        assert!(matches!(result, Err(Error::Transient)));
    }

    #[test]
    fn terminating_client_rejects_metadata() {
        let (client, _rx) = Client::new(ClientConfig::new(ClientRole::Producer));
        client.topic_new("orders", None).unwrap();
        client.terminate();
        let result = client.apply_metadata(snapshot("orders", MetadataError::NoError, vec![]));
        assert!(matches!(result, Err(Error::Terminating)));
    }
}
