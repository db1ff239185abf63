use crate::handler::Handler;
use crate::log::LogHandle;
use crate::message::Delivery;
use crate::subscription::SubscriptionOptions;

use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Worker pool a subscription backend runs its deliveries on.
///
/// At most `max_in_flight` handler calls run at once; [`DeliveryPool::deliver`]
/// waits for a free slot. Backends spawn their reader loops with
/// [`DeliveryPool::spawn`] so that [`DeliveryPool::shutdown`] waits for them too.
#[derive(Clone, Debug)]
pub struct DeliveryPool {
    handler: Handler,
    log: Arc<RwLock<LogHandle>>,
    max_attempts: u16,
    permits: Arc<Semaphore>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl DeliveryPool {
    /// Creates a pool feeding `handler`.
    #[must_use]
    pub fn new(handler: Handler, options: &SubscriptionOptions) -> Self {
        Self {
            handler,
            log: Arc::new(RwLock::new(options.log.clone())),
            max_attempts: options.max_attempts,
            permits: Arc::new(Semaphore::new(options.max_in_flight.max(1))),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Current logger.
    #[must_use]
    pub fn log(&self) -> LogHandle {
        self.log.read().clone()
    }

    /// Replaces the logger.
    pub fn set_logger(&self, log: LogHandle) {
        *self.log.write() = log;
    }

    /// Token cancelled when the pool shuts down.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Whether [`DeliveryPool::shutdown`] has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Runs `task` on the pool; shutdown waits for it.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(task);
    }

    /// Waits for an in-flight slot and hands `delivery` to the handler on its
    /// own task. Returns `false` once the pool is shutting down.
    pub async fn deliver(&self, delivery: Delivery) -> bool {
        if self.max_attempts > 0 && delivery.attempts > self.max_attempts {
            self.log().warn(format_args!(
                "giving up on message {} after {} attempts",
                delivery.id, delivery.attempts
            ));
            return true;
        }

        let permit = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => return false,
            permit = self.permits.clone().acquire_owned() => permit,
        };
        let Ok(permit) = permit else {
            return false;
        };

        let handler = self.handler.clone();
        let log = self.log();
        self.tracker.spawn(async move {
            let _permit = permit;
            let id = delivery.id;
            if let Err(e) = handler.on_delivery(delivery).await {
                log.warn(format_args!("message {id} not delivered: {e}"));
            }
        });
        true
    }

    /// Stops accepting deliveries and waits for every spawned task to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use bytes::Bytes;
    use tokio::time::timeout;

    fn options(max_in_flight: usize, max_attempts: u16) -> SubscriptionOptions {
        SubscriptionOptions {
            topic: "orders".to_string(),
            channel: "billing".to_string(),
            max_in_flight,
            max_attempts,
            client_id: "test".to_string(),
            seeker_poll_interval: Duration::from_secs(60),
            http_timeout: Duration::from_secs(1),
            log: LogHandle::noop(),
        }
    }

    #[tokio::test]
    async fn test_in_flight_window_limits_deliveries() {
        let handler = Handler::new(1);
        let mut stream = handler.stream().unwrap();
        let pool = DeliveryPool::new(handler, &options(1, 0));

        // first fills the channel, second holds the only permit
        assert!(pool.deliver(Delivery::new("a")).await);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(pool.deliver(Delivery::new("b")).await);

        let third = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.deliver(Delivery::new("c")).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!third.is_finished());

        for expected in ["a", "b", "c"] {
            let message = timeout(Duration::from_secs(1), stream.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(message.body(), &Bytes::from(expected));
        }
        assert!(third.await.unwrap());
    }

    #[tokio::test]
    async fn test_exhausted_attempts_are_skipped() {
        let handler = Handler::new(4);
        let mut stream = handler.stream().unwrap();
        let pool = DeliveryPool::new(handler, &options(4, 2));

        let mut retried = Delivery::new("stale");
        retried.attempts = 3;
        assert!(pool.deliver(retried).await);
        assert!(pool.deliver(Delivery::new("fresh")).await);

        let message = timeout(Duration::from_secs(1), stream.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.body(), &Bytes::from("fresh"));
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_spawned_tasks() {
        let handler = Handler::new(1);
        let pool = DeliveryPool::new(handler, &options(1, 0));
        let token = pool.shutdown_token();

        pool.spawn(async move {
            token.cancelled().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
        });

        timeout(Duration::from_secs(1), pool.shutdown()).await.unwrap();
        assert!(pool.is_shutdown());
        assert!(!pool.deliver(Delivery::new("late")).await);
    }
}
