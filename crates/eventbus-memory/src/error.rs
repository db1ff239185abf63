use eventbus::{ConnectionError, SubscriptionError};
use thiserror::Error;

/// Errors raised by the in-memory bus.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Error {
    /// Connection to a closed connection.
    #[error("connection to {0} is closed")]
    Closed(String),

    /// Nothing to subscribe to after resolving endpoints.
    #[error("no nodes to subscribe to")]
    NoNodes,

    /// Node refused the connection.
    #[error("connection to {0} refused")]
    Refused(String),

    /// Node rejected a publish.
    #[error("{0} rejected the publish")]
    Rejected(String),

    /// No node registered at this address.
    #[error("no node at {0}")]
    UnknownNode(String),

    /// Node did not answer a ping.
    #[error("{0} did not answer ping")]
    Unresponsive(String),
}

impl ConnectionError for Error {}

impl SubscriptionError for Error {}
