//! In-process control channel backed by a `tokio::sync::broadcast` channel.
//!
//! [`ControlBus`] fans every hook change record out to all subscribed
//! workers. It is designed to be shared via `Arc<ControlBus>` across the
//! application; the main message channel is a separate, partitioned channel
//! and never flows through the bus.

use tokio::sync::broadcast;

use intake_core::control::ControlRecord;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// Broadcast control channel for hook change records.
///
/// Wraps a [`broadcast::Sender`] so that any number of workers can
/// independently receive every published [`ControlRecord`]. Workers that
/// fall behind observe `RecvError::Lagged` and can recover with a full
/// republish.
pub struct ControlBus {
    sender: broadcast::Sender<ControlRecord>,
}

impl ControlBus {
    /// Create a bus with a specific channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a record to all current subscribers.
    ///
    /// If there are no active subscribers the record is silently dropped;
    /// workers joining later recover via the registry's republish-all.
    pub fn publish(&self, record: ControlRecord) {
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(record);
    }

    /// Subscribe to all records published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<ControlRecord> {
        self.sender.subscribe()
    }
}

impl Default for ControlBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use intake_core::control::Operation;
    use intake_core::hook::{Hook, HookBody};
    use uuid::Uuid;

    fn record() -> ControlRecord {
        let hook = Hook {
            hook_id: Uuid::from_u128(1),
            hook_name: "normalize-policy".to_string(),
            message_type: "policy_created".to_string(),
            source_system: None,
            body: HookBody::Script("message".to_string()),
            enabled: true,
            priority: 10,
            updated_at: Utc::now(),
        };
        ControlRecord::from_hook(&hook, Operation::Insert)
    }

    #[tokio::test]
    async fn every_subscriber_receives_every_record() {
        let bus = ControlBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(record());

        let r1 = rx1.recv().await.expect("subscriber 1 should receive");
        let r2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(r1.hook_id, r2.hook_id);
        assert_eq!(r1.operation, Operation::Insert);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = ControlBus::default();
        bus.publish(record());
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_records() {
        let bus = ControlBus::default();
        bus.publish(record());
        let mut rx = bus.subscribe();
        bus.publish(record());
        // Only the record published after subscribing arrives.
        assert!(rx.recv().await.is_ok());
        assert!(rx.try_recv().is_err());
    }
}
