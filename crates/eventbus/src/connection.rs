use crate::log::LogHandle;

use std::error::Error;
use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;

/// Marker trait for connection errors
pub trait ConnectionError: Error + Send + Sync + 'static {}

/// Options used when dialing a node.
#[derive(Clone, Debug)]
pub struct ConnectionOptions {
    /// Identifier sent to the node.
    pub client_id: String,

    /// Logger for the connection.
    pub log: LogHandle,
}

/// Dials publish connections to bus nodes.
#[async_trait]
pub trait Connector
where
    Self: Clone + Debug + Send + Sync + 'static,
{
    /// The error type for the connector.
    type Error: ConnectionError;

    /// The connection type produced.
    type Connection: Connection<Error = Self::Error>;

    /// Builds a connection to `address`.
    async fn connect(
        &self,
        address: &str,
        options: &ConnectionOptions,
    ) -> Result<Self::Connection, Self::Error>;
}

/// A publish connection to one bus node.
#[async_trait]
pub trait Connection
where
    Self: Debug + Send + Sync + 'static,
{
    /// The error type for the connection.
    type Error: ConnectionError;

    /// The node address.
    fn address(&self) -> &str;

    /// Round-trips to the node to prove it is alive.
    async fn ping(&self) -> Result<(), Self::Error>;

    /// Publishes `body` to `topic`, returning once the node accepted it.
    async fn publish(&self, topic: &str, body: Bytes) -> Result<(), Self::Error>;

    /// Replaces the connection's logger.
    fn set_logger(&self, log: LogHandle);

    /// Closes the connection. Safe to call more than once.
    async fn stop(&self);
}
