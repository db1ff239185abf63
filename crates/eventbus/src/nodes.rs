use crate::error::{DiscoveryError, HttpError};
use crate::log::LogHandle;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Node listing returned by a seeker.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct NodesInfo {
    /// Nodes known to the seeker.
    #[serde(default)]
    pub producers: Vec<NodeInfo>,
}

impl NodesInfo {
    /// Data-plane addresses of every listed node.
    #[must_use]
    pub fn tcp_addresses(&self) -> Vec<String> {
        self.producers.iter().map(NodeInfo::tcp_address).collect()
    }
}

/// A single bus node as described by a seeker.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct NodeInfo {
    /// Address the seeker saw the node connect from.
    #[serde(default)]
    pub remote_address: String,

    /// Node hostname.
    #[serde(default, rename = "hostname")]
    pub host_name: String,

    /// Address the node advertises to clients.
    #[serde(default)]
    pub broadcast_address: String,

    /// Data-plane port.
    #[serde(default)]
    pub tcp_port: u16,

    /// HTTP port.
    #[serde(default)]
    pub http_port: u16,

    /// Node version string.
    #[serde(default)]
    pub version: String,

    /// Topics the node carries.
    #[serde(default)]
    pub topics: Vec<String>,
}

impl NodeInfo {
    /// `broadcast_address:tcp_port`.
    #[must_use]
    pub fn tcp_address(&self) -> String {
        format!("{}:{}", self.broadcast_address, self.tcp_port)
    }

    /// `broadcast_address:http_port`.
    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.broadcast_address, self.http_port)
    }
}

/// Looks up the nodes a seeker knows about.
#[async_trait]
pub trait NodeResolver: Send + Sync + 'static {
    /// Fetches the node listing of `seeker`.
    async fn resolve(&self, seeker: &str) -> Result<NodesInfo, DiscoveryError>;
}

/// Resolver that queries `GET http://<seeker>/nodes`.
#[derive(Clone, Debug)]
pub struct HttpNodeResolver {
    client: Client,
    log: LogHandle,
}

impl HttpNodeResolver {
    /// Creates a resolver whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// [`HttpError::Client`] when the TLS backend cannot be initialised.
    pub fn new(timeout: Duration, log: LogHandle) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(HttpError::Client)?;
        Ok(Self::with_client(client, log))
    }

    /// Creates a resolver on top of an existing HTTP client.
    #[must_use]
    pub const fn with_client(client: Client, log: LogHandle) -> Self {
        Self { client, log }
    }

    async fn fetch(&self, seeker: &str) -> Result<NodesInfo, DiscoveryError> {
        let url = format!("http://{seeker}/nodes");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| DiscoveryError::Request {
                seeker: seeker.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Status {
                seeker: seeker.to_string(),
                status,
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| DiscoveryError::Request {
                seeker: seeker.to_string(),
                source,
            })?;

        serde_json::from_slice(&body).map_err(|source| DiscoveryError::Decode {
            seeker: seeker.to_string(),
            source,
        })
    }
}

#[async_trait]
impl NodeResolver for HttpNodeResolver {
    async fn resolve(&self, seeker: &str) -> Result<NodesInfo, DiscoveryError> {
        let result = self.fetch(seeker).await;
        match &result {
            Ok(nodes) => self.log.debug(format_args!(
                "seeker({seeker}) lists {} node(s)",
                nodes.producers.len()
            )),
            Err(e) => self.log.error(format_args!("{e}")),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use tokio::net::TcpListener;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        address.to_string()
    }

    fn resolver() -> HttpNodeResolver {
        HttpNodeResolver::new(Duration::from_secs(2), LogHandle::noop()).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_decodes_listing() {
        let seeker = serve(Router::new().route(
            "/nodes",
            get(|| async {
                r#"{"producers":[
                    {"remote_address":"10.0.0.1:51000","hostname":"bus-1","broadcast_address":"bus-1.local","tcp_port":4150,"http_port":4151,"version":"1.2.1","topics":["orders"]},
                    {"remote_address":"10.0.0.2:51000","hostname":"bus-2","broadcast_address":"bus-2.local","tcp_port":4150,"http_port":4151,"version":"1.2.1","topics":[]}
                ]}"#
            }),
        ))
        .await;

        let nodes = resolver().resolve(&seeker).await.unwrap();

        assert_eq!(nodes.producers.len(), 2);
        assert_eq!(nodes.producers[0].host_name, "bus-1");
        assert_eq!(nodes.producers[0].topics, vec!["orders".to_string()]);
        assert_eq!(
            nodes.tcp_addresses(),
            vec!["bus-1.local:4150".to_string(), "bus-2.local:4150".to_string()]
        );
        assert_eq!(nodes.producers[1].http_address(), "bus-2.local:4151");
    }

    #[tokio::test]
    async fn test_resolve_rejects_bad_json() {
        let seeker = serve(Router::new().route("/nodes", get(|| async { "not json" }))).await;

        let err = resolver().resolve(&seeker).await.unwrap_err();

        assert!(matches!(err, DiscoveryError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_resolve_reports_status() {
        let seeker = serve(Router::new().route(
            "/nodes",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        ))
        .await;

        let err = resolver().resolve(&seeker).await.unwrap_err();

        assert!(matches!(
            err,
            DiscoveryError::Status { status, .. } if status == reqwest::StatusCode::INTERNAL_SERVER_ERROR
        ));
    }

    #[tokio::test]
    async fn test_resolve_honours_timeout() {
        let seeker = serve(Router::new().route(
            "/nodes",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                r#"{"producers":[]}"#
            }),
        ))
        .await;
        let resolver = HttpNodeResolver::new(Duration::from_millis(100), LogHandle::noop()).unwrap();

        let started = std::time::Instant::now();
        let err = resolver.resolve(&seeker).await.unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(matches!(err, DiscoveryError::Request { ref source, .. } if source.is_timeout()));
    }

    #[tokio::test]
    async fn test_resolve_unreachable_seeker() {
        let err = resolver().resolve("127.0.0.1:1").await.unwrap_err();

        assert!(matches!(err, DiscoveryError::Request { .. }));
    }
}
