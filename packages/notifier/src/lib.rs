//! Change notification for the render queue.
//!
//! A single Ractor actor owns the subscriber registry. Producers publish
//! [`JobEvent`](queue_core::JobEvent)s through a cloneable [`Notifier`]
//! handle and each subscriber reads from its own channel. Bounded
//! subscribers that fall behind only ever lose their own events; lossless
//! subscribers keep everything.
//!
//! # Usage
//!
//! ```ignore
//! use notifier::start_notifier;
//!
//! let (notifier, handle) = start_notifier(1024).await?;
//! let mut sub = notifier.subscribe().await?;
//! notifier.publish(event);
//! let received = sub.recv().await;
//! ```

mod handle;
mod messages;
mod notifier_actor;

pub use handle::{DEFAULT_BUFFER, Notifier, NotifierError, Subscription, start_notifier};
pub use messages::{EventSender, NotifierMessage, SubscriberId};
pub use notifier_actor::{NotifierActor, NotifierState};
