//! Error types for encoding and decoding wire values.

use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while encoding or decoding descriptors, patches and events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Value could not be serialized to JSON
    #[error("JSON encoding failed: {0}")]
    JsonEncode(String),

    /// Input was not a valid JSON document for the requested type
    #[error("JSON decoding failed: {0}")]
    JsonDecode(String),

    /// Value could not be serialized to CBOR
    #[error("CBOR encoding failed: {0}")]
    CborEncode(String),

    /// Input was not a valid CBOR document for the requested type
    #[error("CBOR decoding failed: {0}")]
    CborDecode(String),

    /// Encoded input exceeds [`crate::codec::MAX_PAYLOAD_SIZE`]
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Size of the rejected input in bytes
        size: usize,
        /// Maximum accepted size in bytes
        max: usize,
    },
}
