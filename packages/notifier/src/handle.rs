//! Cloneable front door to the notifier actor.

use queue_core::JobEvent;
use ractor::{Actor, ActorRef};
use tokio::sync::mpsc;

use crate::messages::{EventSender, NotifierMessage, SubscriberId};
use crate::notifier_actor::NotifierActor;

/// Per-subscriber buffer used when none is configured.
pub const DEFAULT_BUFFER: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("failed to spawn notifier: {0}")]
    Spawn(#[from] ractor::SpawnErr),

    #[error("notifier unavailable: {0}")]
    Unavailable(String),
}

/// Handle used by producers to publish and by consumers to subscribe.
#[derive(Debug, Clone)]
pub struct Notifier {
    actor: ActorRef<NotifierMessage>,
    buffer: usize,
}

impl Notifier {
    /// Register a new subscriber with a bounded buffer.
    ///
    /// The subscriber is live once this returns: every event published
    /// afterwards is offered to it. If it falls a full buffer behind, newer
    /// events are dropped for it until it catches up.
    pub async fn subscribe(&self) -> Result<Subscription, NotifierError> {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let id = self.register(EventSender::Bounded(sender)).await?;
        Ok(Subscription {
            id,
            receiver: EventReceiver::Bounded(receiver),
        })
    }

    /// Register a subscriber that never loses events.
    ///
    /// For consumers whose work must happen once per event however far
    /// behind they fall. Memory grows with the backlog.
    pub async fn subscribe_lossless(&self) -> Result<Subscription, NotifierError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.register(EventSender::Lossless(sender)).await?;
        Ok(Subscription {
            id,
            receiver: EventReceiver::Lossless(receiver),
        })
    }

    async fn register(&self, sender: EventSender) -> Result<SubscriberId, NotifierError> {
        let (tx, rx) = ractor::concurrency::oneshot();

        self.actor
            .send_message(NotifierMessage::Subscribe {
                sender,
                reply: tx.into(),
            })
            .map_err(|e| NotifierError::Unavailable(e.to_string()))?;

        rx.await
            .map_err(|e| NotifierError::Unavailable(e.to_string()))
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        let _ = self.actor.send_message(NotifierMessage::Unsubscribe { id });
    }

    /// Offer an event to all subscribers.
    ///
    /// Never blocks and never fails the caller. Delivery problems are logged.
    pub fn publish(&self, event: JobEvent) {
        if let Err(e) = self.actor.send_message(NotifierMessage::Publish { event }) {
            tracing::warn!("Dropped {}: {}", event.description(), e);
        }
    }

    pub async fn subscriber_count(&self) -> Result<usize, NotifierError> {
        let (tx, rx) = ractor::concurrency::oneshot();
        self.actor
            .send_message(NotifierMessage::SubscriberCount { reply: tx.into() })
            .map_err(|e| NotifierError::Unavailable(e.to_string()))?;
        rx.await
            .map_err(|e| NotifierError::Unavailable(e.to_string()))
    }

    /// Stop the actor. Open subscriptions end after draining what they hold.
    pub fn shutdown(&self) {
        let _ = self.actor.send_message(NotifierMessage::Shutdown);
    }
}

#[derive(Debug)]
enum EventReceiver {
    Bounded(mpsc::Receiver<JobEvent>),
    Lossless(mpsc::UnboundedReceiver<JobEvent>),
}

/// Receiving end of one subscriber.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: EventReceiver,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next event, or `None` once the notifier has shut down or dropped
    /// this subscriber.
    pub async fn recv(&mut self) -> Option<JobEvent> {
        match &mut self.receiver {
            EventReceiver::Bounded(rx) => rx.recv().await,
            EventReceiver::Lossless(rx) => rx.recv().await,
        }
    }

    /// Next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<JobEvent> {
        match &mut self.receiver {
            EventReceiver::Bounded(rx) => rx.try_recv().ok(),
            EventReceiver::Lossless(rx) => rx.try_recv().ok(),
        }
    }
}

/// Spawn the notifier actor.
///
/// `buffer` bounds each subscriber's queue (zero falls back to
/// [`DEFAULT_BUFFER`]). The actor is unnamed so several notifiers can
/// coexist in one process.
pub async fn start_notifier(
    buffer: usize,
) -> Result<(Notifier, tokio::task::JoinHandle<()>), NotifierError> {
    let buffer = if buffer == 0 { DEFAULT_BUFFER } else { buffer };
    let (actor, handle) = Actor::spawn(None, NotifierActor, ()).await?;

    Ok((Notifier { actor, buffer }, handle))
}
