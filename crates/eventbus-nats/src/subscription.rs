use crate::connection::dial;
use crate::error::Error;
use crate::headers;

use std::collections::HashMap;
use std::sync::Arc;

use async_nats::Client;
use async_trait::async_trait;
use eventbus::{
    DeliveryPool, Endpoints, Handler, HttpNodeResolver, LogHandle, NodeResolver, Subscriber,
    Subscription, SubscriptionOptions,
};
use futures::StreamExt;
use futures::future::join_all;
use parking_lot::Mutex;

/// Starts queue subscriptions on NATS servers.
///
/// The topic is the subject and the channel is the queue group, so members of
/// one channel share the messages while each channel gets its own copy. With
/// seekers configured, nodes are discovered over HTTP and re-polled every
/// `seeker_poll_interval`; newly listed nodes are attached as they appear.
#[derive(Clone, Copy, Debug, Default)]
pub struct NatsSubscriber;

#[derive(Debug)]
struct Inner {
    clients: Mutex<HashMap<String, Client>>,
    options: SubscriptionOptions,
    pool: DeliveryPool,
}

/// A running NATS subscription, one queue subscriber per server.
#[derive(Clone, Debug)]
pub struct NatsSubscription {
    inner: Arc<Inner>,
}

impl NatsSubscription {
    /// Servers this subscription is attached to.
    #[must_use]
    pub fn nodes(&self) -> Vec<String> {
        let mut nodes: Vec<String> = self.inner.clients.lock().keys().cloned().collect();
        nodes.sort();
        nodes
    }

    async fn attach(&self, address: &str) -> Result<(), Error> {
        if self.inner.clients.lock().contains_key(address) {
            return Ok(());
        }

        let options = &self.inner.options;
        let client = dial(address, &options.client_id).await?;
        let mut subscriber = client
            .queue_subscribe(options.topic.clone(), options.channel.clone())
            .await
            .map_err(|source| Error::Subscribe {
                address: address.to_string(),
                source,
            })?;
        self.inner
            .clients
            .lock()
            .insert(address.to_string(), client);

        let pool = self.inner.pool.clone();
        let shutdown = pool.shutdown_token();
        let owned = address.to_string();
        self.inner.pool.spawn(async move {
            loop {
                let message = tokio::select! {
                    biased;
                    () = shutdown.cancelled() => break,
                    message = subscriber.next() => match message {
                        Some(message) => message,
                        None => break,
                    },
                };

                let delivery = headers::incoming(message.headers.as_ref(), message.payload);
                if !pool.deliver(delivery).await {
                    break;
                }
            }

            if let Err(e) = subscriber.unsubscribe().await {
                pool.log()
                    .debug(format_args!("unsubscribe from {owned} failed: {e}"));
            }
        });

        self.inner.options.log.debug(format_args!(
            "attached to {}/{} at {address}",
            self.inner.options.topic, self.inner.options.channel
        ));
        Ok(())
    }

    /// Resolves every seeker and attaches to the nodes not yet attached.
    async fn discover(&self, resolver: &HttpNodeResolver, seekers: &[String]) {
        let log = self.inner.pool.log();
        let listings = join_all(seekers.iter().map(|seeker| resolver.resolve(seeker))).await;

        for listing in listings.into_iter().flatten() {
            for address in listing.tcp_addresses() {
                if let Err(e) = self.attach(&address).await {
                    log.error(format_args!("{e}"));
                }
            }
        }
    }

    fn poll_seekers(&self, resolver: HttpNodeResolver, seekers: Vec<String>) {
        let subscription = self.clone();
        let shutdown = self.inner.pool.shutdown_token();
        let period = self.inner.options.seeker_poll_interval;
        if period.is_zero() {
            self.inner
                .options
                .log
                .warn(format_args!("seeker poll interval is zero, re-polling disabled"));
            return;
        }

        self.inner.pool.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // first tick fires immediately and discovery already ran
            ticker.tick().await;
            loop {
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => subscription.discover(&resolver, &seekers).await,
                }
            }
        });
    }
}

#[async_trait]
impl Subscriber for NatsSubscriber {
    type Error = Error;
    type Subscription = NatsSubscription;

    async fn subscribe(
        &self,
        endpoints: Endpoints,
        options: SubscriptionOptions,
        handler: Handler,
    ) -> Result<NatsSubscription, Error> {
        let log = options.log.clone();
        let subscription = NatsSubscription {
            inner: Arc::new(Inner {
                clients: Mutex::new(HashMap::new()),
                pool: DeliveryPool::new(handler, &options),
                options,
            }),
        };

        match endpoints {
            Endpoints::Nodes(nodes) => {
                for address in &nodes {
                    if let Err(e) = subscription.attach(address).await {
                        log.error(format_args!("{e}"));
                        subscription.stop().await;
                        return Err(e);
                    }
                }
            }
            Endpoints::Seekers(seekers) => {
                let resolver =
                    HttpNodeResolver::new(subscription.inner.options.http_timeout, log.clone())
                        .inspect_err(|e| log.error(format_args!("{e}")))?;
                subscription.discover(&resolver, &seekers).await;
                if subscription.inner.clients.lock().is_empty() {
                    log.warn(format_args!(
                        "no nodes found via {seekers:?} yet, waiting for the next poll"
                    ));
                }
                subscription.poll_seekers(resolver, seekers);
            }
        }

        log.info(format_args!(
            "subscribed to {}/{} on {:?}",
            subscription.inner.options.topic,
            subscription.inner.options.channel,
            subscription.nodes()
        ));
        Ok(subscription)
    }
}

#[async_trait]
impl Subscription for NatsSubscription {
    fn set_logger(&self, log: LogHandle) {
        self.inner.pool.set_logger(log);
    }

    async fn stop(&self) {
        self.inner.pool.shutdown().await;
        self.inner.clients.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    #[tokio::test]
    async fn test_zero_poll_interval_skips_repolling() {
        let options = SubscriptionOptions {
            topic: "orders".to_string(),
            channel: "billing".to_string(),
            max_in_flight: 1,
            max_attempts: 5,
            client_id: "test".to_string(),
            seeker_poll_interval: Duration::ZERO,
            http_timeout: Duration::from_millis(200),
            log: LogHandle::noop(),
        };
        let endpoints = Endpoints::Seekers(vec!["127.0.0.1:1".to_string()]);

        let subscription = NatsSubscriber
            .subscribe(endpoints, options, Handler::new(1))
            .await
            .unwrap();

        assert!(subscription.nodes().is_empty());
        tokio::time::timeout(Duration::from_secs(3), subscription.stop())
            .await
            .unwrap();
    }
}
