use crate::config::Config;
use crate::error::{ConfigError, Error};
use crate::handler::{Handler, MessageStream};
use crate::log::LogHandle;
use crate::nodes::{HttpNodeResolver, NodeResolver};
use crate::planner::ConcurrencyPlanner;
use crate::subscription::{Endpoints, Subscriber, Subscription, SubscriptionOptions};

use std::sync::atomic::{AtomicBool, Ordering};

use uuid::Uuid;

/// Suffix of auto-generated channel names.
pub const EPHEMERAL_SUFFIX: &str = "#ephemeral";

/// Consumes a topic/channel from the bus as a single message stream.
///
/// When seekers are configured the consumer discovers nodes through them and
/// sizes its in-flight window from the discovered fleet; otherwise it attaches
/// to the configured nodes directly.
#[derive(Debug)]
pub struct Consumer<S>
where
    S: Subscriber,
{
    channel: String,
    closed: AtomicBool,
    handler: Handler,
    in_flight: usize,
    subscription: S::Subscription,
    topic: String,
}

impl<S> Consumer<S>
where
    S: Subscriber,
{
    /// Subscribes to `topic`/`channel`, querying seekers over HTTP and logging
    /// through `tracing` at `config.log_level`.
    ///
    /// An empty `channel` is replaced with `<uuid>#ephemeral`.
    ///
    /// # Errors
    ///
    /// See [`Consumer::with_resolver`].
    pub async fn new(
        topic: &str,
        channel: &str,
        config: &Config,
        subscriber: &S,
    ) -> Result<Self, Error> {
        let log = LogHandle::tracing(config.log_level);
        let resolver = HttpNodeResolver::new(config.http_timeout, log.clone())?;
        Self::with_resolver(topic, channel, config, subscriber, resolver, log).await
    }

    /// Subscribes using `resolver` to size the in-flight window.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an empty topic or missing endpoints,
    /// [`Error::Subscription`] when the subscriber fails.
    pub async fn with_resolver<R>(
        topic: &str,
        channel: &str,
        config: &Config,
        subscriber: &S,
        resolver: R,
        log: LogHandle,
    ) -> Result<Self, Error>
    where
        R: NodeResolver,
    {
        if topic.is_empty() {
            log.error(format_args!("{}", ConfigError::EmptyTopic));
            return Err(ConfigError::EmptyTopic.into());
        }

        let channel = if channel.is_empty() {
            let generated = ephemeral_channel();
            log.info(format_args!(
                "channel name is empty, using the generated name: {generated}"
            ));
            generated
        } else {
            channel.to_string()
        };

        let endpoints = Endpoints::from_config(config).inspect_err(|e| {
            log.error(format_args!("{e}"));
        })?;

        let in_flight = ConcurrencyPlanner::new(resolver, log.clone())
            .plan(config)
            .await;
        log.info(format_args!("evaluated max in flight: {in_flight}"));

        let handler = Handler::new(in_flight);
        let options = SubscriptionOptions {
            topic: topic.to_string(),
            channel: channel.clone(),
            max_in_flight: in_flight.max(1),
            max_attempts: config.effective_max_attempts(),
            client_id: config.effective_client_id(),
            seeker_poll_interval: config.seeker_poll_interval,
            http_timeout: config.http_timeout,
            log: log.clone(),
        };

        let subscription = subscriber
            .subscribe(endpoints.clone(), options, handler.clone())
            .await
            .map_err(|e| {
                log.error(format_args!("subscribe via {endpoints:?} failed: {e}"));
                Error::Subscription {
                    endpoints: endpoints.addresses().to_vec(),
                    source: Box::new(e),
                }
            })?;

        Ok(Self {
            channel,
            closed: AtomicBool::new(false),
            handler,
            in_flight,
            subscription,
            topic: topic.to_string(),
        })
    }

    /// Takes the message stream. It ends once the consumer is closed.
    ///
    /// # Errors
    ///
    /// [`Error::StreamTaken`] if called more than once.
    pub fn consume(&self) -> Result<MessageStream, Error> {
        self.handler.stream().ok_or(Error::StreamTaken)
    }

    /// Stops the subscription, waits for in-flight deliveries, then ends the
    /// stream. Later calls return immediately.
    ///
    /// If [`Consumer::consume`] was never called, undelivered messages are
    /// dropped rather than held for a reader that will not come.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.handler.discard_stream();
        self.subscription.stop().await;
        self.handler.close();
    }

    /// Replaces the subscription's logger.
    pub fn set_logger(&self, log: LogHandle) {
        self.subscription.set_logger(log);
    }

    /// Planned in-flight window.
    pub const fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Consumed topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Channel name (generated when none was given).
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

fn ephemeral_channel() -> String {
    format!("{}{EPHEMERAL_SUFFIX}", Uuid::new_v4())
}
