use crate::bus::MemoryBus;
use crate::error::Error;

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use eventbus::{Connection, ConnectionOptions, Connector, LogHandle};
use parking_lot::RwLock;

/// A publish connection to a node on a [`MemoryBus`].
#[derive(Debug)]
pub struct MemoryConnection {
    address: String,
    bus: MemoryBus,
    closed: AtomicBool,
    log: RwLock<LogHandle>,
}

impl MemoryConnection {
    fn ensure_open(&self) -> Result<(), Error> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed(self.address.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl Connector for MemoryBus {
    type Error = Error;
    type Connection = MemoryConnection;

    async fn connect(
        &self,
        address: &str,
        options: &ConnectionOptions,
    ) -> Result<MemoryConnection, Error> {
        self.check_connect(address)?;
        options
            .log
            .debug(format_args!("{} connected to {address}", options.client_id));

        Ok(MemoryConnection {
            address: address.to_string(),
            bus: self.clone(),
            closed: AtomicBool::new(false),
            log: RwLock::new(options.log.clone()),
        })
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    type Error = Error;

    fn address(&self) -> &str {
        &self.address
    }

    async fn ping(&self) -> Result<(), Error> {
        self.ensure_open()?;
        self.bus.check_ping(&self.address)
    }

    async fn publish(&self, topic: &str, body: Bytes) -> Result<(), Error> {
        self.ensure_open()?;
        self.bus.publish(&self.address, topic, body)
    }

    fn set_logger(&self, log: LogHandle) {
        *self.log.write() = log;
    }

    async fn stop(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.log
                .read()
                .debug(format_args!("closed connection to {}", self.address));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ConnectionOptions {
        ConnectionOptions {
            client_id: "test".to_string(),
            log: LogHandle::noop(),
        }
    }

    #[tokio::test]
    async fn test_publish_records_message() {
        let bus = MemoryBus::new();
        bus.add_node("n1:4150");
        let connection = bus.connect("n1:4150", &options()).await.unwrap();

        connection.ping().await.unwrap();
        connection.publish("orders", Bytes::from("x")).await.unwrap();

        assert_eq!(
            bus.published("n1:4150"),
            vec![("orders".to_string(), Bytes::from("x"))]
        );
    }

    #[tokio::test]
    async fn test_stopped_connection_refuses_work() {
        let bus = MemoryBus::new();
        bus.add_node("n1:4150");
        let connection = bus.connect("n1:4150", &options()).await.unwrap();

        connection.stop().await;
        connection.stop().await;

        assert_eq!(
            connection.publish("orders", Bytes::from("x")).await,
            Err(Error::Closed("n1:4150".to_string()))
        );
        assert!(connection.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_connect_failures() {
        let bus = MemoryBus::new();
        bus.fail_connect("n1:4150", true);

        assert_eq!(
            bus.connect("n1:4150", &options()).await.unwrap_err(),
            Error::Refused("n1:4150".to_string())
        );
        assert_eq!(
            bus.connect("n2:4150", &options()).await.unwrap_err(),
            Error::UnknownNode("n2:4150".to_string())
        );
    }
}
