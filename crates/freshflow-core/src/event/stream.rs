//! Live-listener stream over an event bus subscription.

use std::sync::Arc;
use std::time::Duration;

use freshflow_types::event::WorkflowEvent;
use futures_util::Stream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::bus::{EventBus, MailboxPoll};

/// Unsubscribes when the stream is dropped, whichever way it ends.
struct Subscription {
    bus: Arc<EventBus>,
    workflow_id: String,
    mailbox_id: Uuid,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.workflow_id, self.mailbox_id);
    }
}

/// Subscribe to `workflow_id` and yield its events until `cancel` fires or
/// the bus drops the mailbox.
///
/// The mailbox is polled with `poll_interval` as timeout so cancellation is
/// noticed even when no events arrive. The subscription is registered
/// immediately, before the stream is first polled.
pub fn event_stream(
    bus: Arc<EventBus>,
    workflow_id: &str,
    cancel: CancellationToken,
    poll_interval: Duration,
) -> impl Stream<Item = WorkflowEvent> + Send + 'static {
    let mut mailbox = bus.subscribe(workflow_id);
    let subscription = Subscription {
        bus,
        workflow_id: workflow_id.to_string(),
        mailbox_id: mailbox.id(),
    };

    async_stream::stream! {
        loop {
            if cancel.is_cancelled() {
                tracing::debug!(workflow_id = %subscription.workflow_id, "listener cancelled");
                break;
            }
            match mailbox.recv_timeout(poll_interval).await {
                MailboxPoll::Event(event) => yield event,
                MailboxPoll::Empty => continue,
                MailboxPoll::Closed => break,
            }
        }
    }
}
