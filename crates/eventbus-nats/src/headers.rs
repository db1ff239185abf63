use async_nats::HeaderMap;
use bytes::Bytes;
use eventbus::{Delivery, MessageId, now_nanos};

/// Message id header.
pub const MESSAGE_ID: &str = "Eventbus-Msg-Id";

/// Producer timestamp header, nanoseconds since the Unix epoch.
pub const TIMESTAMP: &str = "Eventbus-Timestamp";

/// Delivery attempt header.
pub const ATTEMPTS: &str = "Eventbus-Attempts";

/// Headers stamped on a freshly published message.
pub fn outgoing() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(MESSAGE_ID, MessageId::generate().to_string().as_str());
    headers.insert(TIMESTAMP, now_nanos().to_string().as_str());
    headers.insert(ATTEMPTS, "1");
    headers
}

/// Rebuilds a delivery from a received payload. Missing or malformed headers
/// fall back to a fresh id, the receive time and a first attempt.
pub fn incoming(headers: Option<&HeaderMap>, payload: Bytes) -> Delivery {
    let value = |name: &str| {
        headers
            .and_then(|headers| headers.get(name))
            .map(|value| value.as_str().to_string())
    };

    let mut delivery = Delivery::new(payload);
    if let Some(id) = value(MESSAGE_ID).and_then(|id| MessageId::try_from(id.as_bytes()).ok()) {
        delivery.id = id;
    }
    if let Some(timestamp) = value(TIMESTAMP).and_then(|ts| ts.parse().ok()) {
        delivery.timestamp = timestamp;
    }
    if let Some(attempts) = value(ATTEMPTS).and_then(|n| n.parse().ok()) {
        delivery.attempts = attempts;
    }
    delivery
}
