//! TCP message envelope
//!
//! Wraps the two-part `[topic][frame]` message for a byte stream:
//!
//! ```text
//! ┌────────────────┬──────────────────┬───────────────┬─────────┬─────────────┐
//! │ body_len (u32) │ sent_at_us (u64) │ topic_len(u16)│ topic   │ frame bytes │
//! │ big-endian     │ big-endian       │ big-endian    │ UTF-8   │             │
//! └────────────────┴──────────────────┴───────────────┴─────────┴─────────────┘
//! ```
//!
//! `body_len` counts everything after itself. A bad length desynchronises the
//! stream, so the connection is dropped; a bad topic only discards the message.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use contracts::{TopicKey, WireMessage};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Fixed body header: sent_at (8) + topic_len (2)
pub const BODY_HEADER_LEN: usize = 10;

/// Envelope errors
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection ended after {got} of 4 length bytes")]
    TruncatedPrefix { got: usize },

    #[error("invalid body length {len} (max {max})")]
    BadLength { len: usize, max: usize },

    #[error("topic length {topic_len} overruns body of {body_len} bytes")]
    TopicOverrun { topic_len: usize, body_len: usize },

    #[error("topic of {0} bytes exceeds u16 range")]
    TopicTooLong(usize),

    #[error("topic is not valid UTF-8")]
    InvalidTopic,
}

impl EnvelopeError {
    /// Whether the byte stream is still aligned on a message boundary
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidTopic)
    }
}

/// Encode one message, reusing `buf`'s allocation
pub fn encode(message: &WireMessage, buf: &mut BytesMut) -> Result<Bytes, EnvelopeError> {
    let topic = message.topic.as_bytes();
    let topic_len = u16::try_from(topic.len()).map_err(|_| EnvelopeError::TopicTooLong(topic.len()))?;
    let body_len = BODY_HEADER_LEN + topic.len() + message.frame.len();
    let body_len_u32 = u32::try_from(body_len).map_err(|_| EnvelopeError::BadLength {
        len: body_len,
        max: u32::MAX as usize,
    })?;

    buf.clear();
    buf.reserve(4 + body_len);
    buf.put_u32(body_len_u32);
    buf.put_u64(message.sent_at_micros);
    buf.put_u16(topic_len);
    buf.put_slice(topic);
    buf.put_slice(&message.frame);
    Ok(buf.split().freeze())
}

/// Read one message
///
/// Returns `Ok(None)` on a clean EOF at a message boundary.
pub async fn read_message<R>(
    reader: &mut R,
    max_body: usize,
) -> Result<Option<WireMessage>, EnvelopeError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 4];
    let mut got = 0;
    while got < prefix.len() {
        match reader.read(&mut prefix[got..]).await? {
            0 if got == 0 => return Ok(None),
            0 => return Err(EnvelopeError::TruncatedPrefix { got }),
            n => got += n,
        }
    }
    let body_len = u32::from_be_bytes(prefix) as usize;
    if body_len < BODY_HEADER_LEN || body_len > max_body {
        return Err(EnvelopeError::BadLength {
            len: body_len,
            max: max_body,
        });
    }

    let mut body = BytesMut::zeroed(body_len);
    reader.read_exact(&mut body).await?;
    decode_body(body.freeze()).map(Some)
}

/// Split a complete body into its parts
pub fn decode_body(mut body: Bytes) -> Result<WireMessage, EnvelopeError> {
    let body_len = body.len();
    if body_len < BODY_HEADER_LEN {
        return Err(EnvelopeError::BadLength {
            len: body_len,
            max: body_len,
        });
    }
    let sent_at_micros = body.get_u64();
    let topic_len = body.get_u16() as usize;
    if topic_len > body.remaining() {
        return Err(EnvelopeError::TopicOverrun {
            topic_len,
            body_len,
        });
    }

    let topic_bytes = body.split_to(topic_len);
    let topic = std::str::from_utf8(&topic_bytes).map_err(|_| EnvelopeError::InvalidTopic)?;

    Ok(WireMessage {
        topic: TopicKey::from(topic),
        frame: body,
        sent_at_micros,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(topic: &str, frame: &'static [u8]) -> WireMessage {
        WireMessage {
            topic: topic.into(),
            frame: Bytes::from_static(frame),
            sent_at_micros: 42,
        }
    }

    #[tokio::test]
    async fn test_stream_of_messages() {
        let mut buf = BytesMut::new();
        let mut wire = Vec::new();
        wire.extend_from_slice(&encode(&message("left", b"abc"), &mut buf).unwrap());
        wire.extend_from_slice(&encode(&message("", b"xyz"), &mut buf).unwrap());

        let mut reader = &wire[..];
        let first = read_message(&mut reader, 1024).await.unwrap().unwrap();
        assert_eq!(first.topic, "left");
        assert_eq!(&first.frame[..], b"abc");
        assert_eq!(first.sent_at_micros, 42);

        let second = read_message(&mut reader, 1024).await.unwrap().unwrap();
        assert!(second.topic.is_anonymous());

        assert!(read_message(&mut reader, 1024).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_partial_length_prefix_is_truncation() {
        let mut buf = BytesMut::new();
        let mut wire = encode(&message("left", b"abc"), &mut buf).unwrap().to_vec();
        wire.extend_from_slice(&[0, 0]);

        let mut reader = &wire[..];
        assert!(read_message(&mut reader, 1024).await.unwrap().is_some());
        let err = read_message(&mut reader, 1024).await.unwrap_err();
        assert!(matches!(err, EnvelopeError::TruncatedPrefix { got: 2 }));
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let mut buf = BytesMut::new();
        let wire = encode(&message("cam0", b"0123456789"), &mut buf).unwrap();
        let mut reader = &wire[..];
        let err = read_message(&mut reader, 8).await.unwrap_err();
        assert!(matches!(err, EnvelopeError::BadLength { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_invalid_topic_is_recoverable() {
        let mut body = BytesMut::new();
        body.put_u64(0);
        body.put_u16(2);
        body.put_slice(&[0xff, 0xfe]);
        body.put_slice(b"frame");
        let err = decode_body(body.freeze()).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_topic_overrun() {
        let mut body = BytesMut::new();
        body.put_u64(0);
        body.put_u16(50);
        body.put_slice(b"short");
        assert!(matches!(
            decode_body(body.freeze()).unwrap_err(),
            EnvelopeError::TopicOverrun { .. }
        ));
    }
}
