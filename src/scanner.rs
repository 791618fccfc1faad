//! The periodic scan: ages out timed-out messages, reverts stale topics
//! to `Unknown`, and collects partition-less topics that need a fresh
//! leader query.
//!
//! Each topic's lock is taken and released independently; instead of
//! triggering a leader query mid-loop (which would mean re-entering a
//! topic's lock from inside an async call), [`scan_all`] collects the
//! names that need one and returns them, so the caller can fire every
//! query once every topic lock has been released.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::registry::TopicRegistry;
use crate::topic::TopicHandle;

/// Outcome of one scan pass.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub timed_out: u32,
    pub needs_leader_query: Vec<Arc<str>>,
}

pub fn scan_all(
    registry: &TopicRegistry,
    refresh_interval: Option<Duration>,
    now: Instant,
    now_micros: u64,
    dr_sink: &dyn crate::message::DeliveryReportSink,
) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();

    for topic in registry.list() {
        outcome.timed_out += scan_one(&topic, refresh_interval, now, now_micros, dr_sink, &mut outcome.needs_leader_query);
    }

    outcome
}

fn scan_one(
    topic: &TopicHandle,
    refresh_interval: Option<Duration>,
    now: Instant,
    now_micros: u64,
    dr_sink: &dyn crate::message::DeliveryReportSink,
    to_query: &mut Vec<Arc<str>>,
) -> u32 {
    topic.scan(now, now_micros, refresh_interval, to_query, dr_sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientRole, TopicConfig};
    use crate::error::ErrorCode;
    use crate::message::test_util::RecordingSink;
    use crate::message::Message;
    use std::time::Duration as StdDuration;

    #[test]
    fn stale_topic_reverts_to_unknown_and_queues_nothing_else() {
        crate::test_support::init();
        let registry = TopicRegistry::new();
        let (topic, _) = registry
            .create("orders", Some(TopicConfig::new()), ClientRole::Producer)
            .unwrap();
        topic.force_state(crate::topic::TopicState::Exists);
        topic.force_ts_metadata(0);

        let sink = RecordingSink::default();
        let outcome = scan_all(
            &registry,
            Some(StdDuration::from_millis(1)),
            Instant::now(),
            4_000,
            &sink,
        );

        assert_eq!(topic.state(), crate::topic::TopicState::Unknown);
        assert_eq!(outcome.timed_out, 0);
    }

    #[test]
    fn empty_topic_is_queued_for_leader_query() {
        let registry = TopicRegistry::new();
        registry
            .create("orders", Some(TopicConfig::new()), ClientRole::Producer)
            .unwrap();

        let sink = RecordingSink::default();
        let outcome = scan_all(&registry, None, Instant::now(), 0, &sink);
        assert_eq!(outcome.needs_leader_query, vec![Arc::from("orders")]);
    }

    #[test]
    fn timed_out_messages_are_reported() {
        let registry = TopicRegistry::new();
        let (topic, _) = registry
            .create("orders", Some(TopicConfig::new()), ClientRole::Producer)
            .unwrap();
        let now = Instant::now();
        topic
            .ua()
            .enqueue(Message::new(None, None, now - StdDuration::from_secs(1)));

        let sink = RecordingSink::default();
        let outcome = scan_all(&registry, None, now, 0, &sink);

        assert_eq!(outcome.timed_out, 1);
        let reports = sink.reports.lock();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].2, ErrorCode::MessageTimedOut);
    }
}
