use crate::error::Error;
use crate::message::{Delivery, Message};

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Bridges pushed deliveries onto a single bounded message stream.
///
/// Subscription backends call [`Handler::on_delivery`] once per inbound
/// message, concurrently up to the in-flight window. Each call awaits room in
/// the channel, so a slow reader backpressures the subscription rather than
/// losing messages. With more than one delivery in flight the stream order may
/// differ from the publish order.
#[derive(Clone, Debug)]
pub struct Handler {
    capacity: usize,
    receiver: Arc<Mutex<Option<mpsc::Receiver<Message>>>>,
    sender: Arc<Mutex<Option<mpsc::Sender<Message>>>>,
}

impl Handler {
    /// Creates a handler whose channel holds `in_flight` messages (at least one).
    #[must_use]
    pub fn new(in_flight: usize) -> Self {
        let capacity = in_flight.max(1);
        let (sender, receiver) = mpsc::channel(capacity);

        Self {
            capacity,
            receiver: Arc::new(Mutex::new(Some(receiver))),
            sender: Arc::new(Mutex::new(Some(sender))),
        }
    }

    /// Channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Adapts `delivery` into a [`Message`] and waits until the channel accepts it.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] once the handler is closed or the stream was dropped.
    pub async fn on_delivery(&self, delivery: Delivery) -> Result<(), Error> {
        // Clone out so the lock is not held across the await. The channel only
        // closes after every in-flight clone is gone.
        let sender = self.sender.lock().clone().ok_or(Error::Closed)?;

        sender
            .send(Message::from(delivery))
            .await
            .map_err(|_| Error::Closed)
    }

    /// Takes the read side of the channel. Returns `None` after the first call.
    #[must_use]
    pub fn stream(&self) -> Option<MessageStream> {
        self.receiver.lock().take().map(MessageStream::new)
    }

    /// Drops the read side if it was never taken, so pending and later
    /// deliveries fail with [`Error::Closed`] instead of waiting for a reader.
    pub fn discard_stream(&self) {
        self.receiver.lock().take();
    }

    /// Drops the handler's sender so readers see end-of-stream once in-flight
    /// deliveries have returned.
    pub fn close(&self) {
        self.sender.lock().take();
    }

    /// Whether [`Handler::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }
}

/// Pull side of a consumer: yields messages until the consumer is closed.
#[derive(Debug)]
pub struct MessageStream {
    inner: ReceiverStream<Message>,
}

impl MessageStream {
    fn new(receiver: mpsc::Receiver<Message>) -> Self {
        Self {
            inner: ReceiverStream::new(receiver),
        }
    }

    /// Waits for the next message; `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<Message> {
        self.inner.next().await
    }
}

impl Stream for MessageStream {
    type Item = Message;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
