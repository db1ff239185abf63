use crate::config::DEFAULT_HTTP_TIMEOUT;
use crate::error::{ConfigError, Error};
use crate::http::HttpPoster;
use crate::log::LogHandle;

use bytes::Bytes;

/// Bare HTTP publisher built straight from a list of node addresses.
///
/// ```
/// use eventbus::Client;
///
/// let client = Client::new(["192.168.100.1:8091", "192.168.100.2:8091"]).unwrap();
/// assert_eq!(client.addresses().len(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    addresses: Vec<String>,
    log: LogHandle,
    poster: HttpPoster,
}

impl Client {
    /// Creates a client for `addresses`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NoNodes`] when `addresses` is empty,
    /// [`crate::HttpError::Client`] when the HTTP client cannot be built.
    pub fn new<I, S>(addresses: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let addresses: Vec<String> = addresses.into_iter().map(Into::into).collect();
        if addresses.is_empty() {
            return Err(ConfigError::NoNodes.into());
        }

        Ok(Self {
            addresses,
            log: LogHandle::default(),
            poster: HttpPoster::new(DEFAULT_HTTP_TIMEOUT)?,
        })
    }

    /// Uses `log` for failed attempts.
    #[must_use]
    pub fn with_logger(mut self, log: LogHandle) -> Self {
        self.log = log;
        self
    }

    /// Configured addresses.
    #[must_use]
    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    /// Posts `body` to the first address that accepts it.
    ///
    /// # Errors
    ///
    /// The last address's [`Error::Http`] when every address failed.
    pub async fn publish(&self, body: impl Into<Bytes>) -> Result<Bytes, Error> {
        self.poster
            .publish_first(&self.addresses, body.into(), &self.log)
            .await
    }
}
