//! JSON and CBOR codecs for wire values.
//!
//! JSON is the inspector-facing format. CBOR is the compact form used when a
//! bridge ships descriptor trees or patch streams over a byte transport. Both
//! decoders reject inputs above [`MAX_PAYLOAD_SIZE`] before parsing.

use serde::{Serialize, de::DeserializeOwned};

use crate::errors::{ProtocolError, Result};

/// Maximum accepted encoded size (16 MB).
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

fn check_size(size: usize) -> Result<()> {
    if size > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge { size, max: MAX_PAYLOAD_SIZE });
    }
    Ok(())
}

/// Encode a value as JSON text.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| ProtocolError::JsonEncode(e.to_string()))
}

/// Decode a value from JSON text.
pub fn from_json<T: DeserializeOwned>(input: &str) -> Result<T> {
    check_size(input.len())?;
    serde_json::from_str(input).map_err(|e| ProtocolError::JsonDecode(e.to_string()))
}

/// Encode a value as CBOR.
pub fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)
        .map_err(|e| ProtocolError::CborEncode(format!("{e:?}")))?;
    Ok(buf)
}

/// Decode a value from CBOR.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    check_size(bytes.len())?;
    ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(format!("{e:?}")))
}
