use crate::config::Config;
use crate::error::ConfigError;
use crate::handler::Handler;
use crate::log::LogHandle;

use std::error::Error;
use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

/// Marker trait for subscription errors
pub trait SubscriptionError: Error + Send + Sync + 'static {}

/// Where a subscription should look for messages.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Endpoints {
    /// Discover nodes through these seekers.
    Seekers(Vec<String>),

    /// Attach to these nodes directly.
    Nodes(Vec<String>),
}

impl Endpoints {
    /// Seekers when any are configured, otherwise nodes.
    ///
    /// # Errors
    ///
    /// Whatever [`Config::validate`] reports.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        if config.seekers.is_empty() {
            Ok(Self::Nodes(config.nodes.clone()))
        } else {
            Ok(Self::Seekers(config.seekers.clone()))
        }
    }

    /// The listed addresses.
    #[must_use]
    pub fn addresses(&self) -> &[String] {
        match self {
            Self::Seekers(addresses) | Self::Nodes(addresses) => addresses,
        }
    }
}

/// Options handed to a [`Subscriber`].
#[derive(Clone, Debug)]
pub struct SubscriptionOptions {
    /// Topic to consume.
    pub topic: String,

    /// Channel within the topic.
    pub channel: String,

    /// Deliveries allowed in flight at once (at least one).
    pub max_in_flight: usize,

    /// Attempts after which a delivery is dropped; zero disables the check.
    pub max_attempts: u16,

    /// Identifier sent to the bus.
    pub client_id: String,

    /// How often to re-poll seekers.
    pub seeker_poll_interval: Duration,

    /// Timeout for seeker lookups.
    pub http_timeout: Duration,

    /// Logger for the subscription.
    pub log: LogHandle,
}

/// Starts subscriptions that push deliveries into a [`Handler`].
#[async_trait]
pub trait Subscriber
where
    Self: Clone + Debug + Send + Sync + 'static,
{
    /// The error type for the subscriber.
    type Error: SubscriptionError;

    /// The running subscription type.
    type Subscription: Subscription;

    /// Attaches to `endpoints` and starts calling `handler` for each message.
    async fn subscribe(
        &self,
        endpoints: Endpoints,
        options: SubscriptionOptions,
        handler: Handler,
    ) -> Result<Self::Subscription, Self::Error>;
}

/// A running subscription.
#[async_trait]
pub trait Subscription
where
    Self: Debug + Send + Sync + 'static,
{
    /// Replaces the subscription's logger.
    fn set_logger(&self, log: LogHandle);

    /// Stops delivery and waits until every in-flight delivery has returned.
    /// Safe to call more than once.
    async fn stop(&self);
}
