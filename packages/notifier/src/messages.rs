//! Message types for the notifier actor.

use queue_core::JobEvent;
use ractor::RpcReplyPort;
use tokio::sync::mpsc;

/// Identifier handed out to each subscriber.
pub type SubscriberId = u64;

/// Sending half registered for one subscriber.
#[derive(Debug)]
pub enum EventSender {
    /// A full buffer loses the event for this subscriber only.
    Bounded(mpsc::Sender<JobEvent>),
    /// Every event is queued until read.
    Lossless(mpsc::UnboundedSender<JobEvent>),
}

/// Messages for the [`NotifierActor`](crate::NotifierActor).
#[derive(Debug)]
pub enum NotifierMessage {
    /// Register a subscriber channel. Replies with its id once registered.
    Subscribe {
        sender: EventSender,
        reply: RpcReplyPort<SubscriberId>,
    },

    /// Remove a subscriber. Unknown ids are ignored.
    Unsubscribe { id: SubscriberId },

    /// Fan an event out to every live subscriber.
    Publish { event: JobEvent },

    /// Number of registered subscribers.
    SubscriberCount { reply: RpcReplyPort<usize> },

    /// Drop all subscribers and stop.
    Shutdown,
}
