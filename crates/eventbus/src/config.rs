use crate::error::ConfigError;
use crate::log::LogLevel;

use std::time::Duration;

/// Default [`Config::max_attempts`].
pub const DEFAULT_MAX_ATTEMPTS: u16 = 5;

/// Default [`Config::max_in_flight`].
pub const DEFAULT_MAX_IN_FLIGHT: usize = 1;

/// Default [`Config::seeker_poll_interval`].
pub const DEFAULT_SEEKER_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Default [`Config::http_timeout`].
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Client options shared by producers and consumers.
///
/// ```
/// use eventbus::Config;
///
/// let config = Config::default()
///     .with_seekers(["192.168.110.10:4161"])
///     .with_max_in_flight(100);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// Bus node addresses (`host:port`). Required by producers; consumers
    /// fall back to them when no seekers are set.
    pub nodes: Vec<String>,

    /// Seeker (discovery service) addresses. Consumers prefer these over
    /// `nodes` when both are set.
    pub seekers: Vec<String>,

    /// Attempts after which a delivery is given up. `0` keeps the default.
    pub max_attempts: u16,

    /// Identifier sent to the bus for this client.
    pub client_id: String,

    /// Floor for the planned number of in-flight messages.
    pub max_in_flight: usize,

    /// Level for the default logger of components built from this config.
    pub log_level: LogLevel,

    /// How often subscriptions re-poll seekers for new nodes.
    pub seeker_poll_interval: Duration,

    /// Timeout for discovery and HTTP publish requests.
    pub http_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            seekers: Vec::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            client_id: default_client_id(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            log_level: LogLevel::default(),
            seeker_poll_interval: DEFAULT_SEEKER_POLL_INTERVAL,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl Config {
    /// Sets the node addresses.
    #[must_use]
    pub fn with_nodes<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nodes = nodes.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the seeker addresses.
    #[must_use]
    pub fn with_seekers<I, S>(mut self, seekers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.seekers = seekers.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the maximum delivery attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u16) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the in-flight floor.
    #[must_use]
    pub const fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    /// Sets the client identifier.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Sets the default log level.
    #[must_use]
    pub const fn with_log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = log_level;
        self
    }

    /// Sets the seeker poll interval.
    #[must_use]
    pub const fn with_seeker_poll_interval(mut self, interval: Duration) -> Self {
        self.seeker_poll_interval = interval;
        self
    }

    /// Sets the HTTP request timeout.
    #[must_use]
    pub const fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Checks that at least one endpoint is set and none is empty. With seekers
    /// configured the poll interval must also be non-zero.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NoEndpoints`], [`ConfigError::EmptyEndpoint`] or
    /// [`ConfigError::ZeroPollInterval`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nodes.is_empty() && self.seekers.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }
        if self
            .nodes
            .iter()
            .chain(&self.seekers)
            .any(|address| address.trim().is_empty())
        {
            return Err(ConfigError::EmptyEndpoint);
        }
        if !self.seekers.is_empty() && self.seeker_poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    /// `max_attempts`, or the default when it is zero.
    #[must_use]
    pub const fn effective_max_attempts(&self) -> u16 {
        if self.max_attempts > 0 {
            self.max_attempts
        } else {
            DEFAULT_MAX_ATTEMPTS
        }
    }

    /// `client_id`, or the short hostname when it is empty.
    #[must_use]
    pub fn effective_client_id(&self) -> String {
        if self.client_id.is_empty() {
            default_client_id()
        } else {
            self.client_id.clone()
        }
    }
}

/// The short hostname (everything before the first dot).
#[must_use]
pub fn default_client_id() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|hostname| hostname.into_string().ok())
        .and_then(|hostname| hostname.split('.').next().map(str::to_string))
        .filter(|hostname| !hostname.is_empty())
        .unwrap_or_else(|| "eventbus".to_string())
}
