use serde::Serialize;

use crate::error::{Error, Result};
use crate::format::{Metadata, Method};
use crate::image::{Image, ImageShape};
use crate::metrics;

/// Core compression abstraction.
///
/// Each `Codec` implementation:
/// - Is identified by a stable [`Method`] written into container metadata.
/// - Produces a payload plus metadata that together, and with nothing else,
///   reconstruct the image. Reconstruction reads every parameter from the
///   metadata, never from `self`.
/// - Never changes shape or dtype. Lossless methods round-trip bit-exactly;
///   lossy methods differ only as their own docs describe.
/// - Remembers the statistics of its last `compress` call and nothing else.
pub trait Codec: Send + Sync {
    /// Stable method stored in container metadata.
    fn method(&self) -> Method;

    /// Human-readable codec name for CLI display.
    fn name(&self) -> &'static str {
        self.method().name()
    }

    /// Compress one image into `(payload, metadata)`.
    fn compress(&mut self, image: &Image) -> Result<(Vec<u8>, Metadata)>;

    /// Rebuild the image from a payload and the metadata `compress` returned.
    fn reconstruct(&self, payload: &[u8], metadata: &Metadata) -> Result<Image>;

    /// Statistics of the most recent `compress` call.
    fn stats(&self) -> Option<&CodecStats>;
}

/// Measurements taken during a compress call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodecStats {
    pub method: Method,
    pub pixels: usize,
    pub original_bytes: usize,
    pub compressed_bytes: usize,
    /// Shannon entropy of the input, bits per symbol.
    pub entropy: f64,
    /// `original_bytes / compressed_bytes`.
    pub compression_ratio: f64,
    pub bits_per_pixel: f64,
    pub detail: StatsDetail,
}

impl CodecStats {
    /// Fill the method-independent fields from the input and payload size.
    pub fn measure(method: Method, image: &Image, compressed_bytes: usize, detail: StatsDetail) -> Self {
        let original_bytes = image.byte_size();
        Self {
            method,
            pixels: image.len(),
            original_bytes,
            compressed_bytes,
            entropy: metrics::entropy(image.pixels()),
            compression_ratio: metrics::compression_ratio(original_bytes, compressed_bytes),
            bits_per_pixel: metrics::bits_per_pixel(compressed_bytes as u64 * 8, image.len()),
            detail,
        }
    }
}

/// Method-specific figures reported alongside [`CodecStats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatsDetail {
    None,
    RunLength {
        pairs: usize,
    },
    Differential {
        /// Entropy of the delta stream, bits per symbol.
        differential_entropy: f64,
        entropy_reduction_percent: f64,
        max_difference: u16,
        bits_per_symbol: u8,
    },
    Huffman {
        symbols: usize,
        average_code_length: f64,
        /// Entropy as a percentage of the average code length.
        coding_efficiency_percent: f64,
    },
    Sparse {
        stride: usize,
        samples: usize,
        /// Retained fraction of all elements.
        sparsity: f64,
    },
    Block {
        block_size: usize,
        quality: f64,
        blocks: usize,
        retained_coefficients: usize,
    },
}

// ── Shape helpers ───────────────────────────────────────────────────────────

/// Record the geometry of `image` before a codec flattens it.
#[inline]
pub fn capture_shape(image: &Image) -> ImageShape {
    image.shape()
}

/// Re-attach `shape` to a flat reconstructed buffer.
///
/// The element count must match exactly; a short or long buffer is a codec or
/// metadata inconsistency and is never padded or truncated to fit.
pub fn restore_shape(pixels: Vec<u8>, shape: ImageShape) -> Result<Image> {
    if pixels.len() != shape.len() {
        return Err(Error::shape_mismatch(shape.len(), pixels.len()));
    }
    Image::new(shape, pixels)
}

/// Reserve an output buffer of `len` pixels.
///
/// Reconstructors size their output from the shape recorded in metadata, which
/// is untrusted; a request the allocator refuses is reported as corruption.
pub fn alloc_pixels(len: usize) -> Result<Vec<u8>> {
    let mut pixels = Vec::new();
    pixels
        .try_reserve_exact(len)
        .map_err(|e| Error::corrupt_with(format!("cannot allocate {len} pixels for the declared shape"), e))?;
    Ok(pixels)
}

/// Split an interleaved image into one row-major plane per channel.
pub fn split_planes(image: &Image) -> Vec<Vec<u8>> {
    let channels = image.channels();
    if channels == 1 {
        return vec![image.pixels().to_vec()];
    }
    let mut planes = vec![Vec::with_capacity(image.shape().plane_len()); channels];
    for px in image.pixels().chunks_exact(channels) {
        for (plane, &v) in planes.iter_mut().zip(px) {
            plane.push(v);
        }
    }
    planes
}

/// Interleave per-channel planes back into one buffer of `shape`.
pub fn merge_planes(planes: &[Vec<u8>], shape: ImageShape) -> Result<Image> {
    if planes.len() != shape.channels {
        return Err(Error::shape_mismatch(shape.channels, planes.len()));
    }
    let plane_len = shape.plane_len();
    if let Some(bad) = planes.iter().find(|p| p.len() != plane_len) {
        return Err(Error::shape_mismatch(plane_len, bad.len()));
    }
    let mut pixels = alloc_pixels(shape.len())?;
    if shape.channels == 1 {
        pixels.extend_from_slice(&planes[0]);
        return restore_shape(pixels, shape);
    }
    for i in 0..plane_len {
        for plane in planes {
            pixels.push(plane[i]);
        }
    }
    restore_shape(pixels, shape)
}
