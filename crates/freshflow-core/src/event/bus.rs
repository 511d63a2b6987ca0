//! Per-workflow event bus with bounded listener mailboxes.
//!
//! Every subscriber gets its own bounded `mpsc` mailbox. Publishing never
//! waits: each mailbox is fed with `try_send`, and a mailbox that is full or
//! closed is considered dead and removed. All access to the subscriber
//! directory goes through one mutex that is never held across an await.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use freshflow_types::event::WorkflowEvent;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Mailbox capacity used by [`EventBus::default`].
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

struct Subscriber {
    id: Uuid,
    sender: mpsc::Sender<WorkflowEvent>,
}

/// Fan-out of lifecycle events to live listeners, keyed by workflow ID.
pub struct EventBus {
    subscribers: Mutex<HashMap<String, Vec<Subscriber>>>,
    mailbox_capacity: usize,
}

impl EventBus {
    /// Create a bus whose mailboxes each buffer `mailbox_capacity` events.
    pub fn new(mailbox_capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            mailbox_capacity: mailbox_capacity.max(1),
        }
    }

    fn directory(&self) -> MutexGuard<'_, HashMap<String, Vec<Subscriber>>> {
        // The directory holds no invariants a panicking holder could break.
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new mailbox for `workflow_id` and return it.
    pub fn subscribe(&self, workflow_id: &str) -> Mailbox {
        let (sender, receiver) = mpsc::channel(self.mailbox_capacity);
        let id = Uuid::now_v7();

        self.directory()
            .entry(workflow_id.to_string())
            .or_default()
            .push(Subscriber { id, sender });

        debug!(workflow_id, mailbox_id = %id, "subscriber added");
        Mailbox {
            id,
            workflow_id: workflow_id.to_string(),
            receiver,
        }
    }

    /// Remove one mailbox. Removing the last mailbox for a workflow drops
    /// the workflow's entry.
    ///
    /// Returns `true` if the mailbox was registered.
    pub fn unsubscribe(&self, workflow_id: &str, mailbox_id: Uuid) -> bool {
        let mut directory = self.directory();
        let Some(subscribers) = directory.get_mut(workflow_id) else {
            return false;
        };

        let before = subscribers.len();
        subscribers.retain(|s| s.id != mailbox_id);
        let removed = subscribers.len() != before;
        if subscribers.is_empty() {
            directory.remove(workflow_id);
        }

        if removed {
            debug!(workflow_id, %mailbox_id, "subscriber removed");
        }
        removed
    }

    /// Deliver `event` to every live mailbox for `workflow_id`.
    ///
    /// Stamps a timestamp if the event has none. With no subscribers this is
    /// a no-op. Never fails and never blocks.
    pub fn publish(&self, workflow_id: &str, mut event: WorkflowEvent) {
        if event.timestamp.is_none() {
            event.timestamp = Some(Utc::now());
        }

        let mut directory = self.directory();
        let Some(subscribers) = directory.get_mut(workflow_id) else {
            return;
        };

        let before = subscribers.len();
        subscribers.retain(|s| match s.sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(workflow_id, mailbox_id = %s.id, "mailbox full, dropping subscriber");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(workflow_id, mailbox_id = %s.id, "mailbox closed, dropping subscriber");
                false
            }
        });

        let delivered = subscribers.len();
        if delivered < before {
            warn!(workflow_id, removed = before - delivered, "removed dead mailboxes");
        }
        if subscribers.is_empty() {
            directory.remove(workflow_id);
        }

        debug!(workflow_id, delivered, event_type = event.event_type.as_str(), "published event");
    }

    /// Number of live mailboxes for `workflow_id`.
    pub fn subscriber_count(&self, workflow_id: &str) -> usize {
        self.directory().get(workflow_id).map_or(0, Vec::len)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_MAILBOX_CAPACITY)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("workflows", &self.directory().len())
            .field("mailbox_capacity", &self.mailbox_capacity)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Mailbox
// ---------------------------------------------------------------------------

/// Result of a bounded wait on a mailbox.
#[derive(Debug, Clone, PartialEq)]
pub enum MailboxPoll {
    Event(WorkflowEvent),
    /// Nothing arrived before the timeout.
    Empty,
    /// The bus dropped this mailbox.
    Closed,
}

/// The receiving end of one subscription.
#[derive(Debug)]
pub struct Mailbox {
    id: Uuid,
    workflow_id: String,
    receiver: mpsc::Receiver<WorkflowEvent>,
}

impl Mailbox {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    /// Wait for the next event. `None` once the bus has dropped the mailbox
    /// and every buffered event has been read.
    pub async fn recv(&mut self) -> Option<WorkflowEvent> {
        self.receiver.recv().await
    }

    /// Take a buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<WorkflowEvent> {
        self.receiver.try_recv().ok()
    }

    /// Wait at most `timeout` for the next event.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> MailboxPoll {
        match tokio::time::timeout(timeout, self.receiver.recv()).await {
            Ok(Some(event)) => MailboxPoll::Event(event),
            Ok(None) => MailboxPoll::Closed,
            Err(_) => MailboxPoll::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freshflow_types::state::{ModuleStatus, WorkflowRunStatus};

    fn event(module: &str) -> WorkflowEvent {
        WorkflowEvent::module_update("wf", module, ModuleStatus::InProgress, None)
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let bus = EventBus::default();
        bus.publish("wf", event("a"));
        assert_eq!(bus.subscriber_count("wf"), 0);
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber_with_timestamp() {
        let bus = EventBus::default();
        let mut first = bus.subscribe("wf");
        let mut second = bus.subscribe("wf");
        assert_eq!(bus.subscriber_count("wf"), 2);

        bus.publish("wf", event("a"));

        let a = first.recv().await.unwrap();
        let b = second.recv().await.unwrap();
        assert_eq!(a.module_id.as_deref(), Some("a"));
        assert!(a.timestamp.is_some());
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_existing_timestamp_is_kept() {
        let bus = EventBus::default();
        let mut mailbox = bus.subscribe("wf");
        let mut e = WorkflowEvent::workflow_update("wf", WorkflowRunStatus::Completed, None, None);
        let stamp = Utc::now() - chrono::Duration::hours(1);
        e.timestamp = Some(stamp);

        bus.publish("wf", e);
        assert_eq!(mailbox.try_recv().unwrap().timestamp, Some(stamp));
    }

    #[tokio::test]
    async fn test_unsubscribed_mailbox_stops_receiving() {
        let bus = EventBus::default();
        let mut stays = bus.subscribe("wf");
        let mut leaves = bus.subscribe("wf");

        assert!(bus.unsubscribe("wf", leaves.id()));
        bus.publish("wf", event("b"));

        assert_eq!(stays.try_recv().unwrap().module_id.as_deref(), Some("b"));
        assert!(leaves.try_recv().is_none());
        assert_eq!(leaves.recv().await, None);
        assert_eq!(bus.subscriber_count("wf"), 1);
    }

    #[test]
    fn test_last_unsubscribe_drops_entry() {
        let bus = EventBus::default();
        let mailbox = bus.subscribe("wf");
        assert!(bus.unsubscribe("wf", mailbox.id()));
        assert!(!bus.unsubscribe("wf", mailbox.id()));
        assert_eq!(bus.subscriber_count("wf"), 0);
        assert!(format!("{bus:?}").contains("workflows: 0"));
    }

    #[test]
    fn test_full_mailbox_is_dropped() {
        let bus = EventBus::new(1);
        let mut slow = bus.subscribe("wf");
        let mut fast = bus.subscribe("wf");

        bus.publish("wf", event("1"));
        assert!(fast.try_recv().is_some());
        bus.publish("wf", event("2"));

        // `slow` never drained, so the second publish found it full.
        assert_eq!(bus.subscriber_count("wf"), 1);
        assert_eq!(fast.try_recv().unwrap().module_id.as_deref(), Some("2"));
        assert_eq!(slow.try_recv().unwrap().module_id.as_deref(), Some("1"));
        assert!(slow.try_recv().is_none());
    }

    #[test]
    fn test_closed_mailbox_is_dropped() {
        let bus = EventBus::default();
        let gone = bus.subscribe("wf");
        drop(gone);
        bus.publish("wf", event("a"));
        assert_eq!(bus.subscriber_count("wf"), 0);
    }

    #[test]
    fn test_workflows_are_isolated() {
        let bus = EventBus::default();
        let mut one = bus.subscribe("wf-1");
        let mut two = bus.subscribe("wf-2");
        bus.publish("wf-1", event("a"));
        assert!(one.try_recv().is_some());
        assert!(two.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_recv_timeout() {
        let bus = EventBus::default();
        let mut mailbox = bus.subscribe("wf");
        assert_eq!(
            mailbox.recv_timeout(Duration::from_millis(10)).await,
            MailboxPoll::Empty
        );

        bus.publish("wf", event("a"));
        assert!(matches!(
            mailbox.recv_timeout(Duration::from_millis(10)).await,
            MailboxPoll::Event(_)
        ));

        bus.unsubscribe("wf", mailbox.id());
        assert_eq!(
            mailbox.recv_timeout(Duration::from_millis(10)).await,
            MailboxPoll::Closed
        );
    }

    #[tokio::test]
    async fn test_concurrent_publishers() {
        let bus = std::sync::Arc::new(EventBus::default());
        let mut mailbox = bus.subscribe("wf");

        let mut handles = Vec::new();
        for i in 0..8 {
            let bus = bus.clone();
            handles.push(tokio::spawn(async move {
                for j in 0..10 {
                    bus.publish("wf", event(&format!("{i}-{j}")));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut received = 0;
        while mailbox.try_recv().is_some() {
            received += 1;
        }
        assert_eq!(received, 80);
    }
}
