use eventbus::{ConnectionError, SubscriptionError};
use thiserror::Error;

/// Errors raised by the NATS backend.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection was stopped.
    #[error("connection to {0} is closed")]
    Closed(String),

    /// Dialing a server failed.
    #[error("connect to {address} failed")]
    Connect {
        /// Server address.
        address: String,
        /// Client cause.
        #[source]
        source: async_nats::ConnectError,
    },

    /// Client lost its connection.
    #[error("{0} is not connected")]
    Disconnected(String),

    /// Round-trip to a server failed.
    #[error("flush to {address} failed")]
    Flush {
        /// Server address.
        address: String,
        /// Client cause.
        #[source]
        source: async_nats::client::FlushError,
    },

    /// The seeker HTTP client could not be built.
    #[error(transparent)]
    HttpClient(#[from] eventbus::HttpError),

    /// Publishing failed.
    #[error("publish to {address} failed")]
    Publish {
        /// Server address.
        address: String,
        /// Client cause.
        #[source]
        source: async_nats::PublishError,
    },

    /// Queue subscription failed.
    #[error("subscribe at {address} failed")]
    Subscribe {
        /// Server address.
        address: String,
        /// Client cause.
        #[source]
        source: async_nats::SubscribeError,
    },
}

impl ConnectionError for Error {}

impl SubscriptionError for Error {}
