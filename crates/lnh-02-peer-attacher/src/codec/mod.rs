//! # Message Codec
//!
//! Encodes [`Message`]s into length-prefixed frames and back.
//!
//! ## Frame Layout
//!
//! ```text
//! ┌──────────────────────┬───────────────────────────────┐
//! │ length (u32, BE)     │ bincode(Message), length bytes │
//! └──────────────────────┴───────────────────────────────┘
//! ```
//!
//! Every codec registers its counters in the registry it is built with, so
//! two codecs sharing one registry collide. Each attachment therefore gets a
//! private [`Registry`].

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::domain::{Message, Op};

/// Largest frame body accepted or produced: 2 MiB.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 2 * 1024 * 1024;

/// Length of the frame header.
pub const FRAME_HEADER_LEN: usize = 4;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("message of {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },

    #[error("message size limit of {0} bytes does not fit the u32 length prefix")]
    LimitTooLarge(usize),

    #[error("serialization failed: {0}")]
    Serialize(String),

    #[error("malformed message: {0}")]
    Deserialize(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Counters kept by a codec.
struct CodecMetrics {
    encoded: IntCounterVec,
    decoded: IntCounterVec,
    encode_failures: IntCounter,
    decode_failures: IntCounter,
}

impl CodecMetrics {
    fn register(registry: &Registry, namespace: &str) -> Result<Self, prometheus::Error> {
        let encoded = IntCounterVec::new(
            Opts::new("codec_encoded_total", "Messages encoded, by op").namespace(namespace),
            &["op"],
        )?;
        let decoded = IntCounterVec::new(
            Opts::new("codec_decoded_total", "Messages decoded, by op").namespace(namespace),
            &["op"],
        )?;
        let encode_failures = IntCounter::with_opts(
            Opts::new("codec_encode_failures_total", "Messages that failed to encode")
                .namespace(namespace),
        )?;
        let decode_failures = IntCounter::with_opts(
            Opts::new("codec_decode_failures_total", "Frames that failed to decode")
                .namespace(namespace),
        )?;

        registry.register(Box::new(encoded.clone()))?;
        registry.register(Box::new(decoded.clone()))?;
        registry.register(Box::new(encode_failures.clone()))?;
        registry.register(Box::new(decode_failures.clone()))?;

        Ok(Self {
            encoded,
            decoded,
            encode_failures,
            decode_failures,
        })
    }
}

/// Builds, encodes and decodes session messages.
pub struct MessageCodec {
    max_message_size: usize,
    metrics: CodecMetrics,
}

impl MessageCodec {
    /// Create a codec whose metrics live in `registry` under `namespace`.
    ///
    /// `max_message_size` must be representable in the frame header.
    pub fn new(
        registry: &Registry,
        namespace: &str,
        max_message_size: usize,
    ) -> Result<Self, CodecError> {
        if u32::try_from(max_message_size).is_err() {
            return Err(CodecError::LimitTooLarge(max_message_size));
        }
        let metrics = CodecMetrics::register(registry, namespace)?;
        Ok(Self {
            max_message_size,
            metrics,
        })
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Serialize `message` into a frame body.
    pub fn encode(&self, message: &Message) -> Result<Vec<u8>, CodecError> {
        let op = message.op();
        let body = bincode::serialize(message).map_err(|e| {
            self.metrics.encode_failures.inc();
            CodecError::Serialize(e.to_string())
        })?;
        if body.len() > self.max_message_size {
            self.metrics.encode_failures.inc();
            return Err(CodecError::TooLarge {
                size: body.len(),
                limit: self.max_message_size,
            });
        }
        self.metrics.encoded.with_label_values(&[op.as_str()]).inc();
        Ok(body)
    }

    /// Deserialize a frame body.
    pub fn decode(&self, body: &[u8]) -> Result<Message, CodecError> {
        if body.len() > self.max_message_size {
            self.metrics.decode_failures.inc();
            return Err(CodecError::TooLarge {
                size: body.len(),
                limit: self.max_message_size,
            });
        }
        let message: Message = bincode::deserialize(body).map_err(|e| {
            self.metrics.decode_failures.inc();
            CodecError::Deserialize(e.to_string())
        })?;
        self.metrics
            .decoded
            .with_label_values(&[message.op().as_str()])
            .inc();
        Ok(message)
    }

    /// Write an already-encoded body as one frame.
    pub async fn write_frame<W>(&self, writer: &mut W, body: &[u8]) -> Result<(), CodecError>
    where
        W: AsyncWrite + Unpin,
    {
        if body.len() > self.max_message_size {
            return Err(CodecError::TooLarge {
                size: body.len(),
                limit: self.max_message_size,
            });
        }
        let len = u32::try_from(body.len()).map_err(|_| CodecError::TooLarge {
            size: body.len(),
            limit: self.max_message_size,
        })?;
        writer.write_all(&len.to_be_bytes()).await?;
        writer.write_all(body).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read one frame and decode it. Returns the message and its body size.
    ///
    /// An oversized length prefix is rejected before any body is read.
    pub async fn read_frame<R>(&self, reader: &mut R) -> Result<(Message, usize), CodecError>
    where
        R: AsyncRead + Unpin,
    {
        let mut header = [0u8; FRAME_HEADER_LEN];
        reader.read_exact(&mut header).await?;
        let len = u32::from_be_bytes(header) as usize;
        if len > self.max_message_size {
            self.metrics.decode_failures.inc();
            return Err(CodecError::TooLarge {
                size: len,
                limit: self.max_message_size,
            });
        }

        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).await?;
        let message = self.decode(&body)?;
        Ok((message, len))
    }

    /// Number of messages of `op` encoded so far.
    pub fn encoded_count(&self, op: Op) -> u64 {
        self.metrics.encoded.with_label_values(&[op.as_str()]).get()
    }

    /// Number of messages of `op` decoded so far.
    pub fn decoded_count(&self, op: Op) -> u64 {
        self.metrics.decoded.with_label_values(&[op.as_str()]).get()
    }
}

impl std::fmt::Debug for MessageCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageCodec")
            .field("max_message_size", &self.max_message_size)
            .finish_non_exhaustive()
    }
}
