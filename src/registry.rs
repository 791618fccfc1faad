//! The topic registry: the sole place name -> handle identity is
//! established. Every other subsystem receives handles, never names.
//!
//! Grounded on the `ferrite` `TopicRegistry` (find-or-insert `create`,
//! `RwLock<HashMap<...>>`) crossed with `rskafka`'s `parking_lot` +
//! `tracing` locking idiom used throughout `connection::topology`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

use crate::config::{ClientRole, TopicConfig};
use crate::error::Error;
use crate::lock_order::{Level, Tracked};
use crate::topic::TopicHandle;

const MAX_TOPIC_NAME_LEN: usize = 512;

#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: RwLock<HashMap<Arc<str>, Arc<TopicHandle>>>,
    count: AtomicUsize,
}

/// Outcome of [`TopicRegistry::create`]: whether the returned handle was
/// already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existing {
    Yes,
    No,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Tracked<RwLockReadGuard<'_, HashMap<Arc<str>, Arc<TopicHandle>>>> {
        Tracked::new(self.topics.read(), Level::Client)
    }

    fn write(&self) -> Tracked<RwLockWriteGuard<'_, HashMap<Arc<str>, Arc<TopicHandle>>>> {
        Tracked::new(self.topics.write(), Level::Client)
    }

    /// Byte-exact lookup by name.
    pub fn find(&self, name: &[u8]) -> Option<Arc<TopicHandle>> {
        let topics = self.read();
        topics
            .iter()
            .find(|(k, _)| k.as_bytes() == name)
            .map(|(_, v)| Arc::clone(v))
    }

    /// Lookup against the on-wire, length-prefixed form: a big-endian
    /// `u16` length followed by that many bytes of topic name (the
    /// classic Kafka protocol `STRING` encoding).
    pub fn find_by_protocol_string(&self, buf: &[u8]) -> Option<Arc<TopicHandle>> {
        if buf.len() < 2 {
            return None;
        }
        let len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
        let name = buf.get(2..2 + len)?;
        self.find(name)
    }

    /// Finds or creates the topic handle for `name`. If a handle already
    /// exists, `config` (and `role`) are discarded and the existing handle
    /// is returned.
    pub fn create(
        &self,
        name: &str,
        config: Option<TopicConfig>,
        role: ClientRole,
    ) -> Result<(Arc<TopicHandle>, Existing), Error> {
        if name.is_empty() || name.len() > MAX_TOPIC_NAME_LEN {
            return Err(Error::InvalidArg { len: name.len() });
        }

        let mut topics = self.write();
        if let Some(existing) = topics.get(name) {
            debug!(topic = name, "topic already registered, reusing handle");
            return Ok((Arc::clone(existing), Existing::Yes));
        }

        let name: Arc<str> = Arc::from(name);
        let handle = Arc::new(TopicHandle::new(
            Arc::clone(&name),
            config.unwrap_or_default(),
            role,
        ));
        topics.insert(Arc::clone(&name), Arc::clone(&handle));
        self.count.fetch_add(1, Ordering::Relaxed);
        info!(topic = %name, "topic registered");

        Ok((handle, Existing::No))
    }

    /// Removes `handle` from the registry if the registry holds the only
    /// remaining strong reference (i.e. the application has released its
    /// own reference). This is the Rust analogue of "destruction occurs
    /// when refcount reaches zero": the registry's own `Arc` is the
    /// baseline reference, so `strong_count == 1` means nobody else is
    /// holding the handle.
    pub fn remove_if_unreferenced(&self, name: &str) -> bool {
        let mut topics = self.write();
        let Some(stored) = topics.get(name) else {
            return false;
        };

        if Arc::strong_count(stored) > 1 {
            return false;
        }

        topics.remove(name);
        self.count.fetch_sub(1, Ordering::Relaxed);
        info!(topic = name, "topic unregistered");
        true
    }

    pub fn list(&self) -> Vec<Arc<TopicHandle>> {
        self.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rejects_empty_name() {
        let registry = TopicRegistry::new();
        assert!(matches!(
            registry.create("", None, ClientRole::Producer),
            Err(Error::InvalidArg { len: 0 })
        ));
    }

    #[test]
    fn create_rejects_oversized_name() {
        let registry = TopicRegistry::new();
        let name = "a".repeat(MAX_TOPIC_NAME_LEN + 1);
        assert!(registry.create(&name, None, ClientRole::Producer).is_err());
    }

    #[test]
    fn create_twice_returns_same_handle_and_drops_config() {
        let registry = TopicRegistry::new();
        let (first, existing) = registry.create("orders", None, ClientRole::Producer).unwrap();
        assert_eq!(existing, Existing::No);

        let custom_config = TopicConfig::new().compression(crate::config::CompressionCodec::Gzip);
        let (second, existing) = registry.create("orders", Some(custom_config), ClientRole::Producer).unwrap();
        assert_eq!(existing, Existing::Yes);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn find_is_byte_exact() {
        let registry = TopicRegistry::new();
        registry.create("orders", None, ClientRole::Producer).unwrap();
        assert!(registry.find(b"orders").is_some());
        assert!(registry.find(b"Orders").is_none());
    }

    #[test]
    fn find_by_protocol_string_decodes_length_prefix() {
        let registry = TopicRegistry::new();
        registry.create("orders", None, ClientRole::Producer).unwrap();

        let mut buf = vec![0u8, 6];
        buf.extend_from_slice(b"orders");
        assert!(registry.find_by_protocol_string(&buf).is_some());
    }

    #[test]
    fn remove_only_when_unreferenced() {
        let registry = TopicRegistry::new();
        let (handle, _) = registry.create("orders", None, ClientRole::Producer).unwrap();
        assert!(!registry.remove_if_unreferenced("orders"));
        drop(handle);
        assert!(registry.remove_if_unreferenced("orders"));
        assert!(registry.find(b"orders").is_none());
    }
}
