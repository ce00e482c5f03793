use tracing::trace;

use crate::error::{Error, Result};
use crate::format::{Metadata, Method, LENGTH_PREFIX_SIZE};

/// A parsed container: metadata plus a view of the payload bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Container<'a> {
    pub metadata: Metadata,
    pub payload: &'a [u8],
    /// Byte length of the JSON metadata block.
    pub metadata_len: usize,
}

impl Container<'_> {
    /// Total container size in bytes.
    pub fn total_len(&self) -> usize {
        LENGTH_PREFIX_SIZE + self.metadata_len + self.payload.len()
    }
}

/// Parse a container produced by [`crate::writer::serialize`].
///
/// # Parse sequence
/// 1. Read the 4-byte big-endian metadata length.
/// 2. Parse that many bytes as JSON. The `method` string is resolved first so
///    an unknown method is reported as such and not as generic corruption.
/// 3. Everything after the metadata block is the payload.
/// 4. Verify `payload_checksum` when present.
pub fn deserialize(data: &[u8]) -> Result<Container<'_>> {
    if data.len() < LENGTH_PREFIX_SIZE {
        return Err(Error::corrupt(format!(
            "container is {} bytes, shorter than the {LENGTH_PREFIX_SIZE}-byte length prefix",
            data.len()
        )));
    }
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    prefix.copy_from_slice(&data[..LENGTH_PREFIX_SIZE]);
    let metadata_len = u32::from_be_bytes(prefix) as usize;

    let body = &data[LENGTH_PREFIX_SIZE..];
    if metadata_len > body.len() {
        return Err(Error::corrupt(format!(
            "declared metadata length {metadata_len} exceeds the {} bytes available",
            body.len()
        )));
    }
    let (json, payload) = body.split_at(metadata_len);

    // ── Metadata ────────────────────────────────────────────────────────────
    let value: serde_json::Value = serde_json::from_slice(json)
        .map_err(|e| Error::corrupt_with("metadata is not valid JSON", e))?;
    let method = value
        .get("method")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| Error::corrupt("metadata has no 'method' string"))?;
    // Only canonical names are valid tags; aliases are a CLI convenience.
    if !Method::ALL.iter().any(|m| m.name() == method) {
        return Err(Error::UnsupportedMethod(method.to_string()));
    }

    let metadata: Metadata = serde_json::from_value(value)
        .map_err(|e| Error::corrupt_with("metadata fields are malformed", e))?;
    metadata.shape()?;
    metadata.verify_checksum(payload)?;

    trace!(
        method = %metadata.method(),
        metadata_len,
        payload_len = payload.len(),
        "container parsed"
    );
    Ok(Container {
        metadata,
        payload,
        metadata_len,
    })
}
