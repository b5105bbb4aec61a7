//! Notification fan-out hub.
//!
//! Producers publish a [`Notification`] to an [`Audience`]; the [`Hub`] writes
//! it once to every matching live connection through that connection's
//! [`PushSink`].

pub mod event;
pub mod hub;
pub mod sink;

pub use event::Notification;
pub use hub::{Audience, Hub, HubClosed, Subscriber};
pub use sink::{ChannelSink, PushSink, SinkClosed};
