//! Layered error definitions
//!
//! Categorized by source: config / transport / encode / decode

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Transport Errors =====
    /// Bind/connect failure, surfaced to the constructor caller
    #[error("transport unavailable at '{endpoint}': {message}")]
    TransportUnavailable { endpoint: String, message: String },

    /// Transport was closed (locally or by the peer)
    #[error("transport '{name}' closed")]
    TransportClosed { name: String },

    /// A single send failed; the caller absorbs this
    #[error("transport '{name}' send error: {message}")]
    TransportSend { name: String, message: String },

    // ===== Frame Errors =====
    /// Array could not be encoded
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Frame bytes could not be decoded
    #[error(transparent)]
    Decode(#[from] DecodeError),

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create transport unavailable error
    pub fn transport_unavailable(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransportUnavailable {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Create transport closed error
    pub fn transport_closed(name: impl Into<String>) -> Self {
        Self::TransportClosed { name: name.into() }
    }

    /// Create transport send error
    pub fn transport_send(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransportSend {
            name: name.into(),
            message: message.into(),
        }
    }

    /// True if the transport will never yield or accept data again
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::TransportClosed { .. })
    }
}

/// Errors building or encoding an array. Fatal to a single publish call only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// Shape has no dimensions at all
    #[error("shape has no dimensions")]
    EmptyShape,

    /// Rank above the codec maximum
    #[error("rank {rank} out of range 1..={max}")]
    RankOutOfRange { rank: usize, max: usize },

    /// A dimension is zero
    #[error("dimension {axis} is zero")]
    ZeroDimension { axis: usize },

    /// Element count overflows the address space
    #[error("element count overflows for dims {dims:?}")]
    ShapeOverflow { dims: Vec<u32> },

    /// Payload length does not match `product(dims) * width`
    #[error("payload is {actual} bytes, shape requires {expected}")]
    PayloadLength { expected: usize, actual: usize },

    /// Element kind name not recognised
    #[error("unsupported element kind '{0}'")]
    UnsupportedElementKind(String),

    /// Frame kind differs from the stream's configured kind
    #[error("element kind mismatch: stream carries {expected}, array is {actual}")]
    ElementKindMismatch {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Errors decoding a frame. Non-fatal: the frame is dropped and the loop continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Fewer bytes than the header declares
    #[error("truncated frame: need {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// Rank above maximum, zero rank/dimension, or overflowing shape
    #[error("dimension overflow: {reason}")]
    DimensionOverflow { reason: String },

    /// More bytes than the header declares
    #[error("trailing bytes: frame declares {expected} bytes, got {actual}")]
    TrailingBytes { expected: usize, actual: usize },

    /// Topic part is not valid UTF-8
    #[error("invalid topic bytes")]
    InvalidTopic,
}

impl DecodeError {
    pub fn dimension_overflow(reason: impl Into<String>) -> Self {
        Self::DimensionOverflow {
            reason: reason.into(),
        }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Truncated { .. } => "truncated",
            Self::DimensionOverflow { .. } => "dimension_overflow",
            Self::TrailingBytes { .. } => "trailing_bytes",
            Self::InvalidTopic => "invalid_topic",
        }
    }
}
