use tracing::trace;

use crate::error::{Error, Result};
use crate::format::{Metadata, LENGTH_PREFIX_SIZE};

/// Serialize `(metadata, payload)` into one self-describing container.
///
/// # Layout
/// ```text
/// [u32 BE: metadata length][metadata: UTF-8 JSON][payload bytes]
/// ```
/// The payload is appended untouched; the container never rewrites it.
pub fn serialize(metadata: &Metadata, payload: &[u8]) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(metadata)
        .map_err(|e| Error::corrupt_with("metadata could not be serialized", e))?;
    let len = u32::try_from(json.len()).map_err(|_| {
        Error::corrupt(format!("metadata block of {} bytes exceeds u32 length prefix", json.len()))
    })?;

    let mut out = Vec::with_capacity(LENGTH_PREFIX_SIZE + json.len() + payload.len());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&json);
    out.extend_from_slice(payload);

    trace!(
        method = %metadata.method(),
        metadata_len = json.len(),
        payload_len = payload.len(),
        "container serialized"
    );
    Ok(out)
}
