//! NATS backend for eventbus.
//!
//! Topics map to NATS subjects and channels to queue groups. Message
//! metadata travels in the `Eventbus-Msg-Id`, `Eventbus-Timestamp` and
//! `Eventbus-Attempts` headers.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod connection;
mod error;
mod subscription;

/// Header names and conversion of message metadata.
pub mod headers;

pub use connection::{NatsConnection, NatsConnector};
pub use error::Error;
pub use subscription::{NatsSubscriber, NatsSubscription};
