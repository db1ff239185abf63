use crate::config::Config;
use crate::connection::{Connection, ConnectionOptions, Connector};
use crate::error::{BoxError, ConfigError, Error};
use crate::log::LogHandle;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;

/// Publishes to a set of bus nodes, rotating round-robin with failover.
///
/// Every call to [`Producer::publish`] claims the next rotation slot and then
/// tries at most one attempt per live connection, starting at that slot, until
/// one succeeds. The rotation advances exactly once per call whatever the
/// outcome, so successive calls spread evenly across nodes. The cursor is
/// atomic and `publish` may be called from many tasks at once.
#[derive(Debug)]
pub struct Producer<C>
where
    C: Connection,
{
    closed: AtomicBool,
    connections: Vec<C>,
    cursor: AtomicUsize,
    log: RwLock<LogHandle>,
}

impl<C> Producer<C>
where
    C: Connection,
{
    /// Connects to every node in `config`, logging through `tracing` at
    /// `config.log_level`.
    ///
    /// # Errors
    ///
    /// See [`Producer::with_logger`].
    pub async fn new<K>(config: &Config, connector: &K) -> Result<Self, Error>
    where
        K: Connector<Connection = C>,
    {
        Self::with_logger(config, connector, LogHandle::tracing(config.log_level)).await
    }

    /// Connects to every node in `config`, skipping nodes that cannot be
    /// dialed or do not answer a ping.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NoNodes`] without nodes, [`Error::NoAvailableNode`] when
    /// every node was skipped.
    pub async fn with_logger<K>(config: &Config, connector: &K, log: LogHandle) -> Result<Self, Error>
    where
        K: Connector<Connection = C>,
    {
        if config.nodes.is_empty() {
            log.error(format_args!("{}", ConfigError::NoNodes));
            return Err(ConfigError::NoNodes.into());
        }
        config.validate()?;

        let options = ConnectionOptions {
            client_id: config.effective_client_id(),
            log: log.clone(),
        };

        let mut connections = Vec::with_capacity(config.nodes.len());
        let mut last_error: Option<BoxError> = None;

        for node in &config.nodes {
            let connection = match connector.connect(node, &options).await {
                Ok(connection) => connection,
                Err(e) => {
                    log.error(format_args!("new producer for node({node}) failed: {e}"));
                    last_error = Some(Box::new(e));
                    continue;
                }
            };

            if let Err(e) = connection.ping().await {
                log.error(format_args!("ping node({node}) failed: {e}"));
                connection.stop().await;
                last_error = Some(Box::new(e));
                continue;
            }

            log.debug(format_args!("connected to node({node})"));
            connections.push(connection);
        }

        if connections.is_empty() {
            return Err(Error::NoAvailableNode { source: last_error });
        }

        log.info(format_args!(
            "producer ready with {} of {} node(s)",
            connections.len(),
            config.nodes.len()
        ));

        Ok(Self::from_connections(connections, log))
    }

    /// Wraps already-established connections. `connections` must not be empty.
    fn from_connections(connections: Vec<C>, log: LogHandle) -> Self {
        Self {
            closed: AtomicBool::new(false),
            connections,
            cursor: AtomicUsize::new(0),
            log: RwLock::new(log),
        }
    }

    /// Publishes `body` to `topic` on the next node in rotation, failing over
    /// to the others in order.
    ///
    /// # Errors
    ///
    /// [`ConfigError::EmptyTopic`], [`Error::Closed`], or the
    /// [`Error::Publish`] of the last node tried when every node failed.
    pub async fn publish(&self, topic: &str, body: impl Into<Bytes>) -> Result<(), Error> {
        if topic.is_empty() {
            return Err(ConfigError::EmptyTopic.into());
        }
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }

        let body = body.into();
        let count = self.connections.len();
        let start = self.advance();
        let mut last_error = None;

        for offset in 0..count {
            let connection = &self.connections[(start + offset) % count];
            match connection.publish(topic, body.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    let address = connection.address().to_string();
                    self.log().error(format_args!(
                        "publish to node({address}) on topic({topic}) failed: {e}"
                    ));
                    last_error = Some(Error::Publish {
                        address,
                        source: Box::new(e),
                    });
                }
            }
        }

        Err(last_error.unwrap_or(Error::NoAvailableNode { source: None }))
    }

    /// Claims the current rotation slot and moves the cursor to the next one.
    fn advance(&self) -> usize {
        let count = self.connections.len();
        match self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cursor| {
                Some((cursor + 1) % count)
            }) {
            Ok(previous) | Err(previous) => previous,
        }
    }

    /// Index of the connection the next publish starts at.
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// Addresses of the live connections, in rotation order.
    pub fn nodes(&self) -> Vec<&str> {
        self.connections.iter().map(Connection::address).collect()
    }

    /// Replaces the logger of the producer and of every connection.
    pub fn set_logger(&self, log: LogHandle) {
        for connection in &self.connections {
            connection.set_logger(log.clone());
        }
        *self.log.write() = log;
    }

    fn log(&self) -> LogHandle {
        self.log.read().clone()
    }

    /// Stops every connection. Later publishes fail with [`Error::Closed`].
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for connection in &self.connections {
            connection.stop().await;
        }
        self.log().info(format_args!("producer closed"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::connection::ConnectionError;
    use crate::log::{LogLevel, Logger};

    use std::collections::HashSet;
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("node {0} refused")]
    struct TestError(String);

    impl ConnectionError for TestError {}

    /// Shared record of which node each publish attempt hit.
    type Attempts = Arc<Mutex<Vec<String>>>;

    #[derive(Debug)]
    struct TestConnection {
        address: String,
        attempts: Attempts,
        failing: bool,
        log: RwLock<LogHandle>,
        stopped: AtomicBool,
    }

    #[async_trait]
    impl Connection for TestConnection {
        type Error = TestError;

        fn address(&self) -> &str {
            &self.address
        }

        async fn ping(&self) -> Result<(), Self::Error> {
            if self.address.starts_with("silent") {
                return Err(TestError(self.address.clone()));
            }
            Ok(())
        }

        async fn publish(&self, _topic: &str, _body: Bytes) -> Result<(), Self::Error> {
            self.attempts.lock().push(self.address.clone());
            if self.failing {
                return Err(TestError(self.address.clone()));
            }
            Ok(())
        }

        fn set_logger(&self, log: LogHandle) {
            *self.log.write() = log;
        }

        async fn stop(&self) {
            self.log.read().debug(format_args!("stopping {}", self.address));
            self.stopped.store(true, Ordering::Release);
        }
    }

    #[derive(Clone, Debug, Default)]
    struct TestConnector {
        attempts: Attempts,
        failing: Arc<Mutex<HashSet<String>>>,
    }

    impl TestConnector {
        fn failing(self, address: &str) -> Self {
            self.failing.lock().insert(address.to_string());
            self
        }

        fn attempts(&self) -> Vec<String> {
            self.attempts.lock().clone()
        }

        fn clear(&self) {
            self.attempts.lock().clear();
        }
    }

    #[async_trait]
    impl Connector for TestConnector {
        type Error = TestError;
        type Connection = TestConnection;

        async fn connect(
            &self,
            address: &str,
            _options: &ConnectionOptions,
        ) -> Result<Self::Connection, Self::Error> {
            if address.starts_with("dead") {
                return Err(TestError(address.to_string()));
            }
            Ok(TestConnection {
                address: address.to_string(),
                attempts: self.attempts.clone(),
                failing: self.failing.lock().contains(address),
                log: RwLock::new(LogHandle::noop()),
                stopped: AtomicBool::new(false),
            })
        }
    }

    #[derive(Debug, Default)]
    struct RecordingLogger {
        records: Mutex<Vec<(LogLevel, String)>>,
    }

    impl Logger for RecordingLogger {
        fn log(&self, level: LogLevel, message: &str) {
            self.records.lock().push((level, message.to_string()));
        }
    }

    fn config(nodes: &[&str]) -> Config {
        Config::default().with_nodes(nodes.iter().copied())
    }

    async fn producer(connector: &TestConnector, nodes: &[&str]) -> Producer<TestConnection> {
        Producer::with_logger(&config(nodes), connector, LogHandle::noop())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_successful_publishes_rotate_cyclically() {
        let connector = TestConnector::default();
        let producer = producer(&connector, &["a", "b", "c"]).await;

        for _ in 0..7 {
            producer.publish("orders", "x").await.unwrap();
        }

        assert_eq!(
            connector.attempts(),
            vec!["a", "b", "c", "a", "b", "c", "a"]
        );
        assert_eq!(producer.cursor(), 1);
    }

    #[tokio::test]
    async fn test_failed_node_is_skipped_once() {
        let connector = TestConnector::default().failing("b");
        let producer = producer(&connector, &["a", "b", "c"]).await;

        producer.publish("orders", "x").await.unwrap();
        connector.clear();

        producer.publish("orders", "x").await.unwrap();

        assert_eq!(connector.attempts(), vec!["b", "c"]);
        assert_eq!(producer.cursor(), 2);
    }

    #[tokio::test]
    async fn test_all_failing_returns_last_error() {
        let connector = TestConnector::default()
            .failing("a")
            .failing("b")
            .failing("c");
        let producer = producer(&connector, &["a", "b", "c"]).await;
        producer.publish("orders", "x").await.unwrap_err();
        connector.clear();

        let err = producer.publish("orders", "x").await.unwrap_err();

        assert_eq!(connector.attempts(), vec!["b", "c", "a"]);
        assert!(matches!(err, Error::Publish { ref address, .. } if address == "a"));
        assert_eq!(producer.cursor(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_nodes_are_skipped_at_construction() {
        let connector = TestConnector::default();
        let producer = producer(&connector, &["dead-1", "a", "silent-1", "b"]).await;

        assert_eq!(producer.nodes(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_no_reachable_node_fails_construction() {
        let connector = TestConnector::default();

        let err = Producer::with_logger(&config(&["dead-1", "silent-1"]), &connector, LogHandle::noop())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NoAvailableNode { source: Some(_) }));
    }

    #[tokio::test]
    async fn test_nodes_are_required() {
        let connector = TestConnector::default();
        let config = Config::default().with_seekers(["s:4161"]);

        let err = Producer::with_logger(&config, &connector, LogHandle::noop())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Config(ConfigError::NoNodes)));
    }

    #[tokio::test]
    async fn test_empty_topic_is_rejected() {
        let connector = TestConnector::default();
        let producer = producer(&connector, &["a"]).await;

        let err = producer.publish("", "x").await.unwrap_err();

        assert!(matches!(err, Error::Config(ConfigError::EmptyTopic)));
        assert!(connector.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let connector = TestConnector::default();
        let producer = producer(&connector, &["a", "b"]).await;

        producer.close().await;
        producer.close().await;

        assert!(producer
            .connections
            .iter()
            .all(|connection| connection.stopped.load(Ordering::Acquire)));
        assert!(matches!(producer.publish("orders", "x").await, Err(Error::Closed)));
    }

    #[tokio::test]
    async fn test_set_logger_reaches_every_connection() {
        let connector = TestConnector::default();
        let producer = producer(&connector, &["a", "b"]).await;
        let logger = Arc::new(RecordingLogger::default());

        producer.set_logger(LogHandle::new(logger.clone(), LogLevel::Debug));
        producer.close().await;

        let records = logger.records.lock().clone();
        assert_eq!(
            records,
            vec![
                (LogLevel::Debug, "stopping a".to_string()),
                (LogLevel::Debug, "stopping b".to_string()),
                (LogLevel::Info, "producer closed".to_string()),
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_publishers_share_rotation() {
        const TASKS: usize = 8;
        const CALLS: usize = 30;

        let connector = TestConnector::default();
        let producer = Arc::new(producer(&connector, &["a", "b", "c"]).await);

        let tasks: Vec<_> = (0..TASKS)
            .map(|_| {
                let producer = producer.clone();
                tokio::spawn(async move {
                    for _ in 0..CALLS {
                        producer.publish("orders", "x").await.unwrap();
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let attempts = connector.attempts();
        assert_eq!(attempts.len(), TASKS * CALLS);
        for node in ["a", "b", "c"] {
            let hits = attempts.iter().filter(|hit| *hit == node).count();
            assert_eq!(hits, TASKS * CALLS / 3);
        }
        assert_eq!(producer.cursor(), 0);
    }
}
