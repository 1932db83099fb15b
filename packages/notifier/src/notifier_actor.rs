//! Actor owning the subscriber registry.

use std::collections::HashMap;

use queue_core::JobEvent;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::mpsc::error::TrySendError;

use crate::messages::{EventSender, NotifierMessage, SubscriberId};

/// State for the notifier actor.
#[derive(Default)]
pub struct NotifierState {
    subscribers: HashMap<SubscriberId, EventSender>,
    next_id: SubscriberId,
}

impl NotifierState {
    fn register(&mut self, sender: EventSender) -> SubscriberId {
        self.next_id += 1;
        self.subscribers.insert(self.next_id, sender);
        self.next_id
    }

    /// Deliver `event` to every subscriber without waiting on any of them.
    ///
    /// Closed channels are pruned. A full bounded channel loses this event only.
    fn fan_out(&mut self, event: JobEvent) {
        self.subscribers.retain(|id, sender| match sender {
            EventSender::Bounded(tx) => match tx.try_send(event) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        "Subscriber {} is lagging, dropped {}",
                        id,
                        event.description()
                    );
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!("Subscriber {} disconnected", id);
                    false
                }
            },
            EventSender::Lossless(tx) => {
                let open = tx.send(event).is_ok();
                if !open {
                    tracing::debug!("Subscriber {} disconnected", id);
                }
                open
            }
        });
    }
}

/// Actor that fans job events out to subscribers.
///
/// All registry mutations and deliveries go through the actor mailbox, so
/// subscribing, unsubscribing and publishing never race each other.
pub struct NotifierActor;

impl Actor for NotifierActor {
    type Msg = NotifierMessage;
    type State = NotifierState;
    type Arguments = ();

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        _args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting change notifier");
        Ok(NotifierState::default())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            NotifierMessage::Subscribe { sender, reply } => {
                let id = state.register(sender);
                tracing::debug!("Subscriber {} registered", id);
                let _ = reply.send(id);
            }

            NotifierMessage::Unsubscribe { id } => {
                if state.subscribers.remove(&id).is_some() {
                    tracing::debug!("Subscriber {} unregistered", id);
                }
            }

            NotifierMessage::Publish { event } => {
                state.fan_out(event);
            }

            NotifierMessage::SubscriberCount { reply } => {
                let _ = reply.send(state.subscribers.len());
            }

            NotifierMessage::Shutdown => {
                tracing::info!(
                    "Shutting down change notifier ({} subscribers)",
                    state.subscribers.len()
                );
                state.subscribers.clear();
                myself.stop(None);
            }
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        // Dropping the senders ends every subscriber stream.
        state.subscribers.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use queue_core::{JobId, JobStatus};
    use tokio::sync::mpsc;

    use super::*;

    fn claimed(id: u64) -> JobEvent {
        JobEvent::StatusChanged {
            job_id: JobId(id),
            status: JobStatus::Working,
        }
    }

    #[test]
    fn fan_out_prunes_closed_subscribers() {
        let mut state = NotifierState::default();
        let (live_tx, mut live_rx) = mpsc::channel(4);
        let (dead_tx, dead_rx) = mpsc::channel(4);
        state.register(EventSender::Bounded(live_tx));
        state.register(EventSender::Bounded(dead_tx));
        drop(dead_rx);

        state.fan_out(claimed(1));

        assert_eq!(state.subscribers.len(), 1);
        assert_eq!(live_rx.try_recv().ok(), Some(claimed(1)));
    }

    #[test]
    fn full_subscriber_only_loses_the_overflowing_event() {
        let mut state = NotifierState::default();
        let (slow_tx, mut slow_rx) = mpsc::channel(1);
        let (fast_tx, mut fast_rx) = mpsc::unbounded_channel();
        state.register(EventSender::Bounded(slow_tx));
        state.register(EventSender::Lossless(fast_tx));

        state.fan_out(claimed(1));
        state.fan_out(claimed(2));

        assert_eq!(state.subscribers.len(), 2);
        assert_eq!(slow_rx.try_recv().ok(), Some(claimed(1)));
        assert!(slow_rx.try_recv().is_err());
        assert_eq!(fast_rx.try_recv().ok(), Some(claimed(1)));
        assert_eq!(fast_rx.try_recv().ok(), Some(claimed(2)));
    }

    #[test]
    fn lossless_subscribers_keep_every_event() {
        let mut state = NotifierState::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.register(EventSender::Lossless(tx));

        for id in 1..=500 {
            state.fan_out(claimed(id));
        }

        for id in 1..=500 {
            assert_eq!(rx.try_recv().ok(), Some(claimed(id)));
        }

        drop(rx);
        state.fan_out(claimed(501));
        assert!(state.subscribers.is_empty());
    }

    #[test]
    fn ids_are_unique_per_registration() {
        let mut state = NotifierState::default();
        let (tx, _rx) = mpsc::channel(1);
        let a = state.register(EventSender::Bounded(tx.clone()));
        let b = state.register(EventSender::Bounded(tx));
        assert_ne!(a, b);
    }
}
