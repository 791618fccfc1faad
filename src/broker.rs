//! The client-level broker registry.
//!
//! Generalized from `rskafka`'s `connection::topology::BrokerTopology`:
//! same `RwLock<HashMap<id, Broker>>` shape and the same
//! insert-or-replace-and-log `update` loop, with the protocol-specific
//! `MetadataResponseBroker` conversion dropped since no wire format is
//! defined at this layer.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::info;

use crate::lock_order::{Level, Tracked};

/// Broker node id, as assigned by the cluster.
pub type BrokerId = i32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broker {
    pub id: BrokerId,
    pub host: String,
    pub port: u16,
}

impl Display for Broker {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Registry of brokers known to the client, keyed by node id.
///
/// This is the "broker pool index" the client-level lock guards (see the
/// data model's Client Instance). Partition leaders are stored as
/// [`BrokerId`]s rather than live connections -- connection management is
/// out of scope for this core.
#[derive(Debug, Default)]
pub struct BrokerPool {
    brokers: RwLock<HashMap<BrokerId, Broker>>,
}

impl BrokerPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Tracked<RwLockReadGuard<'_, HashMap<BrokerId, Broker>>> {
        Tracked::new(self.brokers.read(), Level::Client)
    }

    fn write(&self) -> Tracked<RwLockWriteGuard<'_, HashMap<BrokerId, Broker>>> {
        Tracked::new(self.brokers.write(), Level::Client)
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Looks up a broker by id. This is the read performed under the
    /// client lock before any topic lock is taken (see the global lock
    /// order).
    pub fn get(&self, id: BrokerId) -> Option<Broker> {
        self.read().get(&id).cloned()
    }

    pub fn contains(&self, id: BrokerId) -> bool {
        self.read().contains_key(&id)
    }

    pub fn list(&self) -> Vec<Broker> {
        self.read().values().cloned().collect()
    }

    /// Inserts or replaces entries, logging on both new brokers and host
    /// changes for an existing id.
    pub fn update(&self, brokers: impl IntoIterator<Item = Broker>) {
        let mut guard = self.write();
        for broker in brokers {
            match guard.entry(broker.id) {
                Entry::Occupied(mut o) => {
                    let current = o.get_mut();
                    if current.host != broker.host || current.port != broker.port {
                        info!(
                            broker = broker.id,
                            current = %current,
                            new = %broker,
                            "Broker update",
                        );
                        *current = broker;
                    }
                }
                Entry::Vacant(v) => {
                    info!(broker = broker.id, new = %broker, "New broker");
                    v.insert(broker);
                }
            }
        }
    }

    pub fn remove(&self, id: BrokerId) -> Option<Broker> {
        self.write().remove(&id)
    }
}
