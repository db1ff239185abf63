use crate::error::Error;
use crate::headers;

use async_nats::connection::State;
use async_nats::{Client, ConnectOptions};
use async_trait::async_trait;
use bytes::Bytes;
use eventbus::{Connection, ConnectionOptions, Connector, LogHandle};
use parking_lot::RwLock;

/// Dials NATS servers for publishing. Topics map to subjects.
#[derive(Clone, Copy, Debug, Default)]
pub struct NatsConnector;

/// A publish connection to one NATS server.
#[derive(Debug)]
pub struct NatsConnection {
    address: String,
    client: RwLock<Option<Client>>,
    log: RwLock<LogHandle>,
}

pub(crate) async fn dial(address: &str, client_id: &str) -> Result<Client, Error> {
    ConnectOptions::new()
        .name(client_id)
        .connect(address)
        .await
        .map_err(|source| Error::Connect {
            address: address.to_string(),
            source,
        })
}

impl NatsConnection {
    fn client(&self) -> Result<Client, Error> {
        self.client
            .read()
            .clone()
            .ok_or_else(|| Error::Closed(self.address.clone()))
    }

    async fn flush(&self, client: &Client) -> Result<(), Error> {
        client.flush().await.map_err(|source| Error::Flush {
            address: self.address.clone(),
            source,
        })
    }
}

#[async_trait]
impl Connector for NatsConnector {
    type Error = Error;
    type Connection = NatsConnection;

    async fn connect(
        &self,
        address: &str,
        options: &ConnectionOptions,
    ) -> Result<NatsConnection, Error> {
        let client = dial(address, &options.client_id).await?;

        Ok(NatsConnection {
            address: address.to_string(),
            client: RwLock::new(Some(client)),
            log: RwLock::new(options.log.clone()),
        })
    }
}

#[async_trait]
impl Connection for NatsConnection {
    type Error = Error;

    fn address(&self) -> &str {
        &self.address
    }

    async fn ping(&self) -> Result<(), Error> {
        let client = self.client()?;
        self.flush(&client).await?;
        if !matches!(client.connection_state(), State::Connected) {
            return Err(Error::Disconnected(self.address.clone()));
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, body: Bytes) -> Result<(), Error> {
        let client = self.client()?;
        client
            .publish_with_headers(topic.to_string(), headers::outgoing(), body)
            .await
            .map_err(|source| Error::Publish {
                address: self.address.clone(),
                source,
            })?;
        self.flush(&client).await
    }

    fn set_logger(&self, log: LogHandle) {
        *self.log.write() = log;
    }

    async fn stop(&self) {
        let client = self.client.write().take();
        // pending publishes go out before the client is dropped
        if let Some(client) = client {
            if let Err(e) = self.flush(&client).await {
                self.log.read().warn(format_args!("{e}"));
            }
        }
    }
}
