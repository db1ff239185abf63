//! In-memory bus backend for eventbus.
//!
//! [`MemoryBus`] stands in for a fleet of nodes and seekers inside one
//! process, with switches to make individual nodes misbehave.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod bus;
mod connection;
mod error;
mod subscription;

pub use bus::MemoryBus;
pub use connection::MemoryConnection;
pub use error::Error;
pub use subscription::MemorySubscription;
