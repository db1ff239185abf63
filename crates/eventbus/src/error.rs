use bytes::Bytes;
use reqwest::StatusCode;
use thiserror::Error;

/// Boxed backend error carried as a source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by producers, consumers and HTTP publishers.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration or arguments.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A seeker could not be queried.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// Connecting to a single node failed.
    #[error("connect to eventbus node({address}) failed: {source}")]
    Connection {
        /// Node address.
        address: String,
        /// Backend cause.
        source: BoxError,
    },

    /// No node could be reached.
    #[error("no eventbus node available")]
    NoAvailableNode {
        /// The last failure observed, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// Publishing to a node failed.
    #[error("publish to eventbus node({address}) failed: {source}")]
    Publish {
        /// Node address.
        address: String,
        /// Backend cause.
        source: BoxError,
    },

    /// The subscription could not be set up.
    #[error("subscribe via {endpoints:?} failed: {source}")]
    Subscription {
        /// Seeker or node addresses the subscription targeted.
        endpoints: Vec<String>,
        /// Backend cause.
        source: BoxError,
    },

    /// An HTTP publish failed.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The message stream has already been handed out.
    #[error("message stream already taken")]
    StreamTaken,

    /// The producer or consumer has been closed.
    #[error("closed")]
    Closed,
}

/// Configuration problems, always fatal at construction.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Topic was empty.
    #[error("topic must not be empty")]
    EmptyTopic,

    /// Neither nodes nor seekers were configured.
    #[error("eventbus seekers and nodes can not be empty at the same time")]
    NoEndpoints,

    /// No node addresses were configured.
    #[error("at least one eventbus node must be set")]
    NoNodes,

    /// An address in the node or seeker list was empty.
    #[error("eventbus endpoint addresses must not be empty")]
    EmptyEndpoint,

    /// Seeker polling was configured with a zero interval.
    #[error("seeker poll interval must be greater than zero")]
    ZeroPollInterval,
}

/// Failures querying a seeker for its node listing.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The request did not complete.
    #[error("request to seeker({seeker}) failed: {source}")]
    Request {
        /// Seeker address.
        seeker: String,
        /// Transport cause.
        source: reqwest::Error,
    },

    /// The seeker answered with a non-success status.
    #[error("seeker({seeker}) responded with status {status}")]
    Status {
        /// Seeker address.
        seeker: String,
        /// Returned status.
        status: StatusCode,
    },

    /// The listing could not be decoded.
    #[error("invalid node listing from seeker({seeker}): {source}")]
    Decode {
        /// Seeker address.
        seeker: String,
        /// JSON cause.
        source: serde_json::Error,
    },

    /// The seeker is not known to the resolver.
    #[error("unknown seeker({0})")]
    UnknownSeeker(String),
}

/// Failures of the HTTP paths: client setup and single publish attempts.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The HTTP client could not be built.
    #[error("building HTTP client failed: {0}")]
    Client(#[source] reqwest::Error),

    /// The request did not complete.
    #[error("request to {url} failed: {source}")]
    Request {
        /// Request URL.
        url: String,
        /// Transport cause.
        source: reqwest::Error,
    },

    /// The node answered with a non-success status.
    #[error("{url} responded with status {status}")]
    Status {
        /// Request URL.
        url: String,
        /// Returned status.
        status: StatusCode,
        /// Returned body.
        body: Bytes,
    },
}
