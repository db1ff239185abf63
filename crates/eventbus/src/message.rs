use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

/// Length in bytes of a [`MessageId`].
pub const MESSAGE_ID_LENGTH: usize = 16;

/// Fixed-length opaque message identifier.
///
/// Identifiers minted by [`MessageId::generate`] are ASCII hex and display as
/// is; any other byte content displays as lower-case hex.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct MessageId([u8; MESSAGE_ID_LENGTH]);

impl MessageId {
    /// Wraps raw identifier bytes.
    #[must_use]
    pub const fn new(bytes: [u8; MESSAGE_ID_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Mints a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; MESSAGE_ID_LENGTH];
        let simple = Uuid::new_v4().simple().to_string();
        bytes.copy_from_slice(&simple.as_bytes()[..MESSAGE_ID_LENGTH]);
        Self(bytes)
    }

    /// The raw identifier bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; MESSAGE_ID_LENGTH] {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.iter().all(u8::is_ascii_graphic) {
            // all-graphic ASCII is valid UTF-8
            f.write_str(std::str::from_utf8(&self.0).map_err(|_| fmt::Error)?)
        } else {
            self.0.iter().try_for_each(|byte| write!(f, "{byte:02x}"))
        }
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({self})")
    }
}

/// Error returned when bytes of the wrong length are turned into a [`MessageId`].
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
#[error("message id must be {MESSAGE_ID_LENGTH} bytes, got {0}")]
pub struct InvalidMessageId(pub usize);

impl TryFrom<&[u8]> for MessageId {
    type Error = InvalidMessageId;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; MESSAGE_ID_LENGTH]>::try_from(bytes)
            .map(Self)
            .map_err(|_| InvalidMessageId(bytes.len()))
    }
}

/// A raw delivery pushed by a subscription backend.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Delivery {
    /// Message identifier.
    pub id: MessageId,
    /// Message payload.
    pub body: Bytes,
    /// Producer-assigned timestamp, nanoseconds since the Unix epoch.
    pub timestamp: i64,
    /// Delivery attempts so far, starting at 1.
    pub attempts: u16,
}

impl Delivery {
    /// A first-attempt delivery with a fresh id, stamped now.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            id: MessageId::generate(),
            body: body.into(),
            timestamp: now_nanos(),
            attempts: 1,
        }
    }
}

/// A message read off a consumer's stream.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    id: String,
    body: Bytes,
    timestamp: i64,
    attempts: u16,
}

impl Message {
    /// Display form of the message id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Message payload.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Producer-assigned timestamp, nanoseconds since the Unix epoch.
    #[must_use]
    pub const fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Delivery attempts so far.
    #[must_use]
    pub const fn attempts(&self) -> u16 {
        self.attempts
    }

    /// Consumes the message, returning its payload.
    #[must_use]
    pub fn into_body(self) -> Bytes {
        self.body
    }
}

impl From<Delivery> for Message {
    fn from(delivery: Delivery) -> Self {
        Self {
            id: delivery.id.to_string(),
            body: delivery.body,
            timestamp: delivery.timestamp,
            attempts: delivery.attempts,
        }
    }
}

/// Current wall-clock time in nanoseconds since the Unix epoch.
#[must_use]
pub fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_displays_as_ascii() {
        let id = MessageId::generate();
        let rendered = id.to_string();

        assert_eq!(rendered.len(), MESSAGE_ID_LENGTH);
        assert!(rendered.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(rendered.as_bytes(), id.as_bytes());
    }

    #[test]
    fn test_binary_id_displays_as_hex() {
        let mut bytes = [0u8; MESSAGE_ID_LENGTH];
        bytes[0] = 0xab;
        bytes[15] = 0x01;

        assert_eq!(
            MessageId::new(bytes).to_string(),
            "ab000000000000000000000000000001"
        );
    }

    #[test]
    fn test_id_from_slice() {
        let id = MessageId::try_from(&b"0123456789abcdef"[..]).unwrap();
        assert_eq!(id.to_string(), "0123456789abcdef");

        assert_eq!(
            MessageId::try_from(&b"short"[..]).unwrap_err(),
            InvalidMessageId(5)
        );
    }

    #[test]
    fn test_message_from_delivery() {
        let delivery = Delivery {
            id: MessageId::new(*b"0000000000000042"),
            body: Bytes::from("hello"),
            timestamp: 1_700_000_000_000_000_000,
            attempts: 3,
        };

        let message = Message::from(delivery);

        assert_eq!(message.id(), "0000000000000042");
        assert_eq!(message.body(), &Bytes::from("hello"));
        assert_eq!(message.timestamp(), 1_700_000_000_000_000_000);
        assert_eq!(message.attempts(), 3);
    }

    #[test]
    fn test_new_delivery_is_first_attempt() {
        let delivery = Delivery::new("payload");

        assert_eq!(delivery.attempts, 1);
        assert!(delivery.timestamp > 0);
    }
}
