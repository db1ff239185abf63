use crate::bus::MemoryBus;
use crate::error::Error;

use async_trait::async_trait;
use eventbus::{
    DeliveryPool, DiscoveryError, Endpoints, Handler, LogHandle, NodeResolver, NodesInfo,
    Subscriber, Subscription, SubscriptionOptions,
};
use tokio::sync::mpsc;

/// A running subscription on a [`MemoryBus`], one member per node.
#[derive(Debug)]
pub struct MemorySubscription {
    bus: MemoryBus,
    channel: String,
    members: Vec<(String, u64)>,
    pool: DeliveryPool,
    topic: String,
}

impl MemorySubscription {
    /// Nodes this subscription is attached to.
    #[must_use]
    pub fn nodes(&self) -> Vec<&str> {
        self.members.iter().map(|(address, _)| address.as_str()).collect()
    }

    fn leave_all(&self) {
        for (address, id) in &self.members {
            self.bus.leave(address, &self.topic, &self.channel, *id);
        }
    }

    fn attach(&mut self, address: &str) -> Result<(), Error> {
        let (inbox, mut deliveries) = mpsc::unbounded_channel();
        let id = self.bus.join(address, &self.topic, &self.channel, inbox)?;
        self.members.push((address.to_string(), id));

        let pool = self.pool.clone();
        let shutdown = self.pool.shutdown_token();
        self.pool.spawn(async move {
            loop {
                let delivery = tokio::select! {
                    biased;
                    () = shutdown.cancelled() => break,
                    delivery = deliveries.recv() => match delivery {
                        Some(delivery) => delivery,
                        None => break,
                    },
                };
                if !pool.deliver(delivery).await {
                    break;
                }
            }
        });
        Ok(())
    }
}

#[async_trait]
impl Subscriber for MemoryBus {
    type Error = Error;
    type Subscription = MemorySubscription;

    async fn subscribe(
        &self,
        endpoints: Endpoints,
        options: SubscriptionOptions,
        handler: Handler,
    ) -> Result<MemorySubscription, Error> {
        let log = options.log.clone();
        let mut subscription = MemorySubscription {
            bus: self.clone(),
            channel: options.channel.clone(),
            members: Vec::new(),
            pool: DeliveryPool::new(handler, &options),
            topic: options.topic.clone(),
        };

        match endpoints {
            Endpoints::Nodes(nodes) => {
                for address in &nodes {
                    if let Err(e) = subscription.attach(address) {
                        log.error(format_args!("{e}"));
                        subscription.stop().await;
                        return Err(e);
                    }
                }
            }
            Endpoints::Seekers(seekers) => {
                for seeker in &seekers {
                    let Some(info) = self.seeker(seeker) else {
                        log.error(format_args!("{}", DiscoveryError::UnknownSeeker(seeker.clone())));
                        continue;
                    };
                    for address in info.tcp_addresses() {
                        if let Err(e) = subscription.attach(&address) {
                            log.warn(format_args!("skipping {address} from {seeker}: {e}"));
                        }
                    }
                }
            }
        }

        if subscription.members.is_empty() {
            subscription.stop().await;
            return Err(Error::NoNodes);
        }

        log.info(format_args!(
            "subscribed to {}/{} on {:?}",
            subscription.topic,
            subscription.channel,
            subscription.nodes()
        ));
        Ok(subscription)
    }
}

#[async_trait]
impl Subscription for MemorySubscription {
    fn set_logger(&self, log: LogHandle) {
        self.pool.set_logger(log);
    }

    async fn stop(&self) {
        self.leave_all();
        self.pool.shutdown().await;
    }
}

#[async_trait]
impl NodeResolver for MemoryBus {
    async fn resolve(&self, seeker: &str) -> Result<NodesInfo, DiscoveryError> {
        self.seeker(seeker)
            .ok_or_else(|| DiscoveryError::UnknownSeeker(seeker.to_string()))
    }
}
