//! Workflow lifecycle event fan-out.
//!
//! `EventBus` delivers `WorkflowEvent`s to per-workflow listener mailboxes;
//! `event_stream` turns a subscription into a cancellable stream for live
//! listeners.

pub mod bus;
pub mod stream;

pub use bus::{EventBus, Mailbox, MailboxPoll};
pub use stream::event_stream;
