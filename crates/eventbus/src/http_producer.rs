use crate::config::Config;
use crate::error::{ConfigError, Error};
use crate::http::HttpPoster;
use crate::log::LogHandle;

use bytes::Bytes;
use parking_lot::RwLock;

/// Connectionless publisher over the node HTTP API.
///
/// Each publish walks `config.nodes` from the first entry (no rotation) and
/// stops at the first node that accepts the event.
#[derive(Debug)]
pub struct HttpProducer {
    log: RwLock<LogHandle>,
    nodes: Vec<String>,
    poster: HttpPoster,
}

impl HttpProducer {
    /// Creates a publisher for the nodes in `config`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NoNodes`] or [`ConfigError::EmptyEndpoint`], or
    /// [`crate::HttpError::Client`] when the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, Error> {
        if config.nodes.is_empty() {
            return Err(ConfigError::NoNodes.into());
        }
        config.validate()?;

        Ok(Self {
            log: RwLock::new(LogHandle::tracing(config.log_level)),
            nodes: config.nodes.clone(),
            poster: HttpPoster::new(config.http_timeout)?,
        })
    }

    /// Posts `body` to the first node that accepts it and returns that node's
    /// response body.
    ///
    /// # Errors
    ///
    /// The last node's [`Error::Http`] when every node failed.
    pub async fn publish(&self, body: impl Into<Bytes>) -> Result<Bytes, Error> {
        let log = self.log.read().clone();
        self.poster.publish_first(&self.nodes, body.into(), &log).await
    }

    /// Replaces the logger.
    pub fn set_logger(&self, log: LogHandle) {
        *self.log.write() = log;
    }

    /// Nothing to release; kept for symmetry with [`crate::Producer`].
    pub const fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::post;
    use tokio::net::TcpListener;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        address.to_string()
    }

    async fn counting_node(status: StatusCode, reply: &'static str) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let address = serve(Router::new().route(
            "/v1/event",
            post(move |body: axum::body::Bytes| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(&body[..], b"payload");
                    (status, reply)
                }
            }),
        ))
        .await;
        (address, hits)
    }

    #[tokio::test]
    async fn test_bad_node_falls_through_to_good_node() {
        let (bad, bad_hits) = counting_node(StatusCode::SERVICE_UNAVAILABLE, "busy").await;
        let (good, good_hits) = counting_node(StatusCode::OK, "accepted").await;
        let producer = HttpProducer::new(&Config::default().with_nodes([bad, good])).unwrap();
        producer.set_logger(LogHandle::noop());

        let response = producer.publish("payload").await.unwrap();

        assert_eq!(response, Bytes::from("accepted"));
        assert_eq!(bad_hits.load(Ordering::SeqCst), 1);
        assert_eq!(good_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_always_starts_from_first_node() {
        let (first, first_hits) = counting_node(StatusCode::OK, "one").await;
        let (second, second_hits) = counting_node(StatusCode::OK, "two").await;
        let producer = HttpProducer::new(&Config::default().with_nodes([first, second])).unwrap();

        for _ in 0..3 {
            assert_eq!(producer.publish("payload").await.unwrap(), Bytes::from("one"));
        }

        assert_eq!(first_hits.load(Ordering::SeqCst), 3);
        assert_eq!(second_hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unreachable_nodes_return_last_error() {
        let (failing, _) = counting_node(StatusCode::INTERNAL_SERVER_ERROR, "nope").await;
        let producer =
            HttpProducer::new(&Config::default().with_nodes(["127.0.0.1:1".to_string(), failing]))
                .unwrap();
        producer.set_logger(LogHandle::noop());

        let err = producer.publish("payload").await.unwrap_err();

        assert!(matches!(
            err,
            Error::Http(crate::error::HttpError::Status { ref body, .. }) if body == &Bytes::from("nope")
        ));
    }

    #[test]
    fn test_nodes_are_required() {
        let err = HttpProducer::new(&Config::default().with_seekers(["s:4161"])).unwrap_err();

        assert!(matches!(err, Error::Config(ConfigError::NoNodes)));
    }
}
