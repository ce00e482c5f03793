//! Block DCT codec.
//!
//! Each channel plane is padded to a whole number of `N×N` blocks by edge
//! replication, transformed with an orthonormal 2-D DCT-II, quantized and
//! serialized as LEB128 varints.
//!
//! # Quantization
//! ```text
//! step(i, j) = 1/(4N) + (1 - quality) · 16 · (1 + i + j)
//! keep(i, j) = i + j ≤ round(quality · (2N - 2))
//! ```
//! At quality 1.0 nothing is discarded and the step is small enough that
//! every pixel rounds back to its original value.
//!
//! # Block layout
//! ```text
//! [uleb: retained count in zigzag order][sleb × count]
//! ```
//! Trailing zero coefficients are not stored. Blocks follow raster order
//! within a plane; planes follow channel order.

use std::f64::consts::PI;

use infocodec_core::codec::{alloc_pixels, capture_shape, merge_planes, split_planes, Codec, CodecStats, StatsDetail};
use infocodec_core::format::{
    CoefficientScan, Metadata, Method, MethodParams, DEFAULT_BLOCK_SIZE, DEFAULT_QUALITY, MAX_BLOCK_SIZE,
    MIN_BLOCK_SIZE,
};
use infocodec_core::{Error, Image, ImageShape, Result};
use tracing::debug;

use crate::varint::{write_uleb, zigzag_encode, VarintReader};

#[derive(Debug, Clone)]
pub struct DctCodec {
    block_size: usize,
    quality: f64,
    stats: Option<CodecStats>,
}

impl Default for DctCodec {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            quality: DEFAULT_QUALITY,
            stats: None,
        }
    }
}

fn validate(block_size: usize, quality: f64) -> Result<()> {
    if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size) {
        return Err(Error::invalid_parameter(
            "block_size",
            format!("{block_size} is outside {MIN_BLOCK_SIZE}..={MAX_BLOCK_SIZE}"),
        ));
    }
    if !(0.0..=1.0).contains(&quality) {
        return Err(Error::invalid_parameter(
            "quality",
            format!("{quality} is outside [0, 1]"),
        ));
    }
    Ok(())
}

impl DctCodec {
    pub fn new(block_size: usize, quality: f64) -> Result<Self> {
        validate(block_size, quality)?;
        Ok(Self {
            block_size,
            quality,
            stats: None,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn quality(&self) -> f64 {
        self.quality
    }
}

// ── Transform ───────────────────────────────────────────────────────────────

/// Precomputed orthonormal DCT-II basis and zigzag order for one block size.
struct BlockTransform {
    n: usize,
    /// `basis[k * n + x] = α(k) · cos(π (2x + 1) k / 2N)`
    basis: Vec<f64>,
    zigzag: Vec<(usize, usize)>,
    scratch: Vec<f64>,
}

impl BlockTransform {
    fn new(n: usize) -> Self {
        let mut basis = vec![0.0; n * n];
        for k in 0..n {
            let alpha = if k == 0 {
                (1.0 / n as f64).sqrt()
            } else {
                (2.0 / n as f64).sqrt()
            };
            for x in 0..n {
                basis[k * n + x] = alpha * (PI * (2 * x + 1) as f64 * k as f64 / (2 * n) as f64).cos();
            }
        }
        Self {
            n,
            basis,
            zigzag: zigzag_order(n),
            scratch: vec![0.0; n * n],
        }
    }

    /// Spatial block → coefficients, both row-major `n × n`.
    fn forward(&mut self, block: &[f64], coeffs: &mut [f64]) {
        let n = self.n;
        // Rows: t[x][v] = Σ_y B[v][y] · f[x][y]
        for x in 0..n {
            for v in 0..n {
                self.scratch[x * n + v] = (0..n).map(|y| self.basis[v * n + y] * block[x * n + y]).sum();
            }
        }
        // Columns: F[u][v] = Σ_x B[u][x] · t[x][v]
        for u in 0..n {
            for v in 0..n {
                coeffs[u * n + v] = (0..n).map(|x| self.basis[u * n + x] * self.scratch[x * n + v]).sum();
            }
        }
    }

    /// Coefficients → spatial block.
    fn inverse(&mut self, coeffs: &[f64], block: &mut [f64]) {
        let n = self.n;
        // t[u][y] = Σ_v B[v][y] · F[u][v]
        for u in 0..n {
            for y in 0..n {
                self.scratch[u * n + y] = (0..n).map(|v| self.basis[v * n + y] * coeffs[u * n + v]).sum();
            }
        }
        // f[x][y] = Σ_u B[u][x] · t[u][y]
        for x in 0..n {
            for y in 0..n {
                block[x * n + y] = (0..n).map(|u| self.basis[u * n + x] * self.scratch[u * n + y]).sum();
            }
        }
    }
}

/// JPEG-style zigzag over anti-diagonals, starting at DC.
pub fn zigzag_order(n: usize) -> Vec<(usize, usize)> {
    let mut order = Vec::with_capacity(n * n);
    for s in 0..(2 * n - 1) {
        let lo = s.saturating_sub(n - 1);
        let hi = s.min(n - 1);
        if s % 2 == 0 {
            for i in (lo..=hi).rev() {
                order.push((i, s - i));
            }
        } else {
            for i in lo..=hi {
                order.push((i, s - i));
            }
        }
    }
    order
}

#[inline]
fn quant_step(n: usize, quality: f64, i: usize, j: usize) -> f64 {
    1.0 / (4.0 * n as f64) + (1.0 - quality) * 16.0 * (1 + i + j) as f64
}

#[inline]
fn frequency_cutoff(n: usize, quality: f64) -> usize {
    (quality * (2 * n - 2) as f64).round() as usize
}

/// Derived block-grid geometry for one plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Grid {
    padded: [usize; 2],
    padding: [usize; 2],
    blocks: [usize; 2],
}

impl Grid {
    fn for_shape(shape: ImageShape, n: usize) -> Self {
        let ph = shape.height.div_ceil(n) * n;
        let pw = shape.width.div_ceil(n) * n;
        Self {
            padded: [ph, pw],
            padding: [ph - shape.height, pw - shape.width],
            blocks: [ph / n, pw / n],
        }
    }

    fn block_count(&self) -> usize {
        self.blocks[0] * self.blocks[1]
    }
}

// ── Codec ───────────────────────────────────────────────────────────────────

impl Codec for DctCodec {
    fn method(&self) -> Method {
        Method::Dct
    }

    fn compress(&mut self, image: &Image) -> Result<(Vec<u8>, Metadata)> {
        let (n, quality) = (self.block_size, self.quality);
        let shape = capture_shape(image);
        let (height, width) = (shape.height, shape.width);
        let grid = Grid::for_shape(shape, n);
        let cutoff = frequency_cutoff(n, quality);

        let mut transform = BlockTransform::new(n);
        let mut block = vec![0.0; n * n];
        let mut coeffs = vec![0.0; n * n];
        let mut scanned = vec![0i64; n * n];
        let mut payload = Vec::new();
        let mut retained_total = 0usize;

        for plane in split_planes(image) {
            for br in 0..grid.blocks[0] {
                for bc in 0..grid.blocks[1] {
                    for x in 0..n {
                        let row = (br * n + x).min(height - 1);
                        for y in 0..n {
                            let col = (bc * n + y).min(width - 1);
                            block[x * n + y] = plane[row * width + col] as f64;
                        }
                    }
                    transform.forward(&block, &mut coeffs);

                    for (k, &(i, j)) in transform.zigzag.iter().enumerate() {
                        scanned[k] = if i + j <= cutoff {
                            (coeffs[i * n + j] / quant_step(n, quality, i, j)).round() as i64
                        } else {
                            0
                        };
                    }
                    let retained = scanned.iter().rposition(|&q| q != 0).map_or(0, |p| p + 1);
                    write_uleb(retained as u64, &mut payload);
                    for &q in &scanned[..retained] {
                        write_uleb(zigzag_encode(q), &mut payload);
                    }
                    retained_total += retained;
                }
            }
        }

        let blocks = grid.block_count() * shape.channels;
        let metadata = Metadata::new(
            shape,
            MethodParams::Dct {
                block_size: n,
                quality,
                padded_shape: grid.padded,
                padding: grid.padding,
                blocks: grid.blocks,
                scan: CoefficientScan::Zigzag,
            },
        )
        .with_checksum(&payload);
        self.stats = Some(CodecStats::measure(
            Method::Dct,
            image,
            payload.len(),
            StatsDetail::Block {
                block_size: n,
                quality,
                blocks,
                retained_coefficients: retained_total,
            },
        ));
        debug!(block_size = n, quality, blocks, retained_total, bytes = payload.len(), "dct compress");
        Ok((payload, metadata))
    }

    fn reconstruct(&self, payload: &[u8], metadata: &Metadata) -> Result<Image> {
        let MethodParams::Dct {
            block_size: n,
            quality,
            padded_shape,
            padding,
            blocks,
            scan: CoefficientScan::Zigzag,
        } = metadata.params
        else {
            return Err(Error::corrupt(format!(
                "metadata is for method '{}', not 'dct'",
                metadata.method()
            )));
        };
        validate(n, quality).map_err(|e| Error::corrupt_with("dct parameters out of range", e))?;
        let shape = metadata.shape()?;
        let grid = Grid::for_shape(shape, n);
        if grid.padded != padded_shape || grid.padding != padding || grid.blocks != blocks {
            return Err(Error::corrupt(format!(
                "dct geometry {padded_shape:?}/{padding:?}/{blocks:?} does not match shape {:?} with block size {n}",
                shape.dims()
            )));
        }

        // Every block carries at least its one-byte coefficient count.
        let min_payload = grid.block_count().saturating_mul(shape.channels);
        if payload.len() < min_payload {
            return Err(Error::decode(
                "dct",
                format!(
                    "{} payload bytes cannot hold {min_payload} blocks",
                    payload.len()
                ),
            ));
        }

        let (height, width) = (shape.height, shape.width);
        let mut transform = BlockTransform::new(n);
        let mut coeffs = vec![0.0; n * n];
        let mut block = vec![0.0; n * n];
        let mut reader = VarintReader::new(payload);
        let fail = |msg: &str| Error::decode("dct", msg.to_string());

        let mut planes = Vec::with_capacity(shape.channels);
        for _ in 0..shape.channels {
            let mut plane = alloc_pixels(shape.plane_len())?;
            plane.resize(shape.plane_len(), 0);
            for br in 0..grid.blocks[0] {
                for bc in 0..grid.blocks[1] {
                    let retained = reader.read_uleb().map_err(fail)? as usize;
                    if retained > n * n {
                        return Err(Error::decode(
                            "dct",
                            format!("block ({br}, {bc}) claims {retained} coefficients, maximum is {}", n * n),
                        ));
                    }
                    coeffs.fill(0.0);
                    for &(i, j) in &transform.zigzag[..retained] {
                        let q = reader.read_sleb().map_err(fail)?;
                        coeffs[i * n + j] = q as f64 * quant_step(n, quality, i, j);
                    }
                    transform.inverse(&coeffs, &mut block);

                    for x in 0..n {
                        let row = br * n + x;
                        if row >= height {
                            break;
                        }
                        for y in 0..n {
                            let col = bc * n + y;
                            if col >= width {
                                break;
                            }
                            plane[row * width + col] = block[x * n + y].round().clamp(0.0, 255.0) as u8;
                        }
                    }
                }
            }
            planes.push(plane);
        }
        if reader.remaining() > 0 {
            return Err(Error::decode(
                "dct",
                format!("{} trailing bytes after the last block", reader.remaining()),
            ));
        }
        merge_planes(&planes, shape)
    }

    fn stats(&self) -> Option<&CodecStats> {
        self.stats.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_validation() {
        assert!(DctCodec::new(8, 0.5).is_ok());
        assert!(DctCodec::new(1, 0.5).is_err());
        assert!(DctCodec::new(33, 0.5).is_err());
        assert!(DctCodec::new(8, 1.5).is_err());
        assert!(DctCodec::new(8, -0.1).is_err());
        assert!(matches!(DctCodec::new(8, f64::NAN), Err(Error::InvalidParameter { .. })));
    }

    #[test]
    fn test_zigzag_order_4x4() {
        let order = zigzag_order(4);
        assert_eq!(&order[..6], &[(0, 0), (0, 1), (1, 0), (2, 0), (1, 1), (0, 2)]);
        assert_eq!(order.len(), 16);
        assert_eq!(order[15], (3, 3));
    }

    #[test]
    fn test_transform_roundtrip() {
        let mut t = BlockTransform::new(8);
        let block: Vec<f64> = (0..64).map(|i| ((i * 37) % 256) as f64).collect();
        let mut coeffs = vec![0.0; 64];
        let mut back = vec![0.0; 64];
        t.forward(&block, &mut coeffs);
        // DC of an orthonormal 2-D DCT is N · mean.
        let mean = block.iter().sum::<f64>() / 64.0;
        assert!((coeffs[0] - 8.0 * mean).abs() < 1e-9);
        t.inverse(&coeffs, &mut back);
        for (a, b) in block.iter().zip(&back) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_full_quality_is_exact_on_odd_shape() {
        let img = Image::from_fn(11, 13, |r, c| ((r * 31 + c * 17) % 256) as u8).unwrap();
        let mut codec = DctCodec::new(8, 1.0).unwrap();
        let (payload, meta) = codec.compress(&img).unwrap();
        match meta.params {
            MethodParams::Dct { padded_shape, padding, blocks, .. } => {
                assert_eq!(padded_shape, [16, 16]);
                assert_eq!(padding, [5, 3]);
                assert_eq!(blocks, [2, 2]);
            }
            ref other => panic!("unexpected params {other:?}"),
        }
        let out = codec.reconstruct(&payload, &meta).unwrap();
        for (a, b) in img.pixels().iter().zip(out.pixels()) {
            assert!((*a as i32 - *b as i32).abs() <= 1);
        }
    }

    #[test]
    fn test_zero_quality_keeps_only_dc() {
        let img = Image::from_fn(8, 8, |r, c| ((r + c) * 10) as u8).unwrap();
        let mut codec = DctCodec::new(8, 0.0).unwrap();
        let (payload, meta) = codec.compress(&img).unwrap();
        let out = codec.reconstruct(&payload, &meta).unwrap();
        let first = out.pixels()[0];
        assert!(out.pixels().iter().all(|&p| p == first));
        assert_eq!(codec.stats().unwrap().detail, StatsDetail::Block {
            block_size: 8,
            quality: 0.0,
            blocks: 1,
            retained_coefficients: 1,
        });
    }

    #[test]
    fn test_stream_errors() {
        let img = Image::from_fn(8, 8, |r, c| (r * 8 + c) as u8).unwrap();
        let mut codec = DctCodec::new(8, 0.9).unwrap();
        let (payload, meta) = codec.compress(&img).unwrap();

        let truncated = codec.reconstruct(&payload[..payload.len() - 1], &meta).unwrap_err();
        assert!(matches!(truncated, Error::Decode { .. }));

        let mut trailing = payload.clone();
        trailing.push(0);
        assert!(matches!(codec.reconstruct(&trailing, &meta), Err(Error::Decode { .. })));

        let mut too_many = Vec::new();
        write_uleb(65, &mut too_many);
        assert!(matches!(codec.reconstruct(&too_many, &meta), Err(Error::Decode { .. })));
    }
}
