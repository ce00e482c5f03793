//! Information-theoretic and perceptual quality metrics.
//!
//! Everything here is a pure function of its inputs. Images compared by a
//! metric must share a shape; otherwise the metric returns
//! [`Error::DimensionMismatch`].

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use serde::Serialize;

use crate::codec::split_planes;
use crate::error::{Error, Result};
use crate::image::Image;

/// Peak value of an 8-bit sample.
pub const MAX_VALUE: f64 = 255.0;

/// Edge of the square SSIM window.
pub const SSIM_WINDOW: usize = 7;

const SSIM_K1: f64 = 0.01;
const SSIM_K2: f64 = 0.03;

// ── Entropy ────────────────────────────────────────────────────────────────

/// Byte histogram.
pub fn histogram(data: &[u8]) -> [u64; 256] {
    let mut counts = [0u64; 256];
    for &b in data {
        counts[b as usize] += 1;
    }
    counts
}

fn entropy_from_counts(counts: impl Iterator<Item = u64>, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    let h: f64 = counts
        .filter(|&c| c > 0)
        .map(|c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum();
    // A single symbol sums to -0.0.
    h.max(0.0)
}

/// Shannon entropy of a byte buffer in bits per symbol, in `[0, 8]`.
pub fn entropy(data: &[u8]) -> f64 {
    entropy_from_counts(histogram(data).into_iter(), data.len() as u64)
}

/// Shannon entropy of an arbitrary symbol stream (e.g. signed deltas).
pub fn symbol_entropy<T, I>(symbols: I) -> f64
where
    T: Eq + Hash,
    I: IntoIterator<Item = T>,
{
    let mut counts: HashMap<T, u64> = HashMap::new();
    let mut total = 0u64;
    for s in symbols {
        *counts.entry(s).or_insert(0) += 1;
        total += 1;
    }
    entropy_from_counts(counts.into_values(), total)
}

// ── Fidelity ───────────────────────────────────────────────────────────────

fn ensure_same_shape(a: &Image, b: &Image) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(Error::DimensionMismatch {
            left: a.shape().dims(),
            right: b.shape().dims(),
        });
    }
    Ok(())
}

/// Mean squared error.
pub fn mse(original: &Image, reconstructed: &Image) -> Result<f64> {
    ensure_same_shape(original, reconstructed)?;
    let sum: f64 = original
        .pixels()
        .iter()
        .zip(reconstructed.pixels())
        .map(|(&a, &b)| {
            let d = a as f64 - b as f64;
            d * d
        })
        .sum();
    Ok(sum / original.len() as f64)
}

/// Peak signal-to-noise ratio in dB; `f64::INFINITY` for identical images.
pub fn psnr(original: &Image, reconstructed: &Image) -> Result<f64> {
    let mse = mse(original, reconstructed)?;
    if mse == 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(10.0 * (MAX_VALUE * MAX_VALUE / mse).log10())
}

/// Structural similarity index in `[0, 1]`.
///
/// Uniform `SSIM_WINDOW`×`SSIM_WINDOW` windows slide with stride 1 over every
/// position where they fit entirely inside the image; the score is the mean of
/// the per-window values. An image smaller than the window along an axis uses
/// the full extent of that axis. Color images average their channel scores.
/// Slightly negative structural correlation is clamped to 0.
pub fn ssim(original: &Image, reconstructed: &Image) -> Result<f64> {
    ensure_same_shape(original, reconstructed)?;
    let (height, width) = (original.height(), original.width());
    let a_planes = split_planes(original);
    let b_planes = split_planes(reconstructed);

    let total: f64 = a_planes
        .iter()
        .zip(&b_planes)
        .map(|(a, b)| plane_ssim(a, b, height, width))
        .sum();
    Ok((total / a_planes.len() as f64).clamp(0.0, 1.0))
}

/// Summed-area tables of `a`, `b`, `a²`, `b²`, `ab` for one plane pair.
struct WindowSums {
    stride: usize,
    a: Vec<f64>,
    b: Vec<f64>,
    aa: Vec<f64>,
    bb: Vec<f64>,
    ab: Vec<f64>,
}

impl WindowSums {
    fn new(a: &[u8], b: &[u8], height: usize, width: usize) -> Self {
        let stride = width + 1;
        let size = (height + 1) * stride;
        let mut sums = Self {
            stride,
            a: vec![0.0; size],
            b: vec![0.0; size],
            aa: vec![0.0; size],
            bb: vec![0.0; size],
            ab: vec![0.0; size],
        };
        for row in 0..height {
            for col in 0..width {
                let x = a[row * width + col] as f64;
                let y = b[row * width + col] as f64;
                let here = (row + 1) * stride + col + 1;
                let up = row * stride + col + 1;
                let left = (row + 1) * stride + col;
                let diag = row * stride + col;
                for (table, v) in [
                    (&mut sums.a, x),
                    (&mut sums.b, y),
                    (&mut sums.aa, x * x),
                    (&mut sums.bb, y * y),
                    (&mut sums.ab, x * y),
                ] {
                    table[here] = v + table[up] + table[left] - table[diag];
                }
            }
        }
        sums
    }

    #[inline]
    fn window(&self, table: &[f64], r0: usize, c0: usize, r1: usize, c1: usize) -> f64 {
        let s = self.stride;
        table[r1 * s + c1] - table[r0 * s + c1] - table[r1 * s + c0] + table[r0 * s + c0]
    }
}

fn plane_ssim(a: &[u8], b: &[u8], height: usize, width: usize) -> f64 {
    let win_h = SSIM_WINDOW.min(height);
    let win_w = SSIM_WINDOW.min(width);
    let n = (win_h * win_w) as f64;
    let c1 = (SSIM_K1 * MAX_VALUE).powi(2);
    let c2 = (SSIM_K2 * MAX_VALUE).powi(2);
    let sums = WindowSums::new(a, b, height, width);

    let mut total = 0.0;
    let mut windows = 0usize;
    for r0 in 0..=height - win_h {
        for c0 in 0..=width - win_w {
            let (r1, c1w) = (r0 + win_h, c0 + win_w);
            let mu_a = sums.window(&sums.a, r0, c0, r1, c1w) / n;
            let mu_b = sums.window(&sums.b, r0, c0, r1, c1w) / n;
            let var_a = sums.window(&sums.aa, r0, c0, r1, c1w) / n - mu_a * mu_a;
            let var_b = sums.window(&sums.bb, r0, c0, r1, c1w) / n - mu_b * mu_b;
            let cov = sums.window(&sums.ab, r0, c0, r1, c1w) / n - mu_a * mu_b;

            let num = (2.0 * mu_a * mu_b + c1) * (2.0 * cov + c2);
            let den = (mu_a * mu_a + mu_b * mu_b + c1) * (var_a + var_b + c2);
            total += num / den;
            windows += 1;
        }
    }
    total / windows as f64
}

// ── Size ───────────────────────────────────────────────────────────────────

/// `original / compressed`; infinite for an empty payload.
pub fn compression_ratio(original_bytes: usize, compressed_bytes: usize) -> f64 {
    if compressed_bytes == 0 {
        return f64::INFINITY;
    }
    original_bytes as f64 / compressed_bytes as f64
}

/// Percentage of space saved; negative when the payload expanded.
pub fn space_saved_percent(original_bytes: usize, compressed_bytes: usize) -> f64 {
    if original_bytes == 0 {
        return 0.0;
    }
    (original_bytes as f64 - compressed_bytes as f64) / original_bytes as f64 * 100.0
}

pub fn bits_per_pixel(total_bits: u64, pixels: usize) -> f64 {
    if pixels == 0 {
        return 0.0;
    }
    total_bits as f64 / pixels as f64
}

// ── Distribution ───────────────────────────────────────────────────────────

/// Summary statistics of a byte buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionStats {
    pub min: u8,
    pub max: u8,
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub unique_values: usize,
    pub entropy: f64,
}

impl DistributionStats {
    pub fn of(data: &[u8]) -> Self {
        let counts = histogram(data);
        let n = data.len() as u64;
        if n == 0 {
            return Self {
                min: 0,
                max: 0,
                mean: 0.0,
                median: 0.0,
                std_dev: 0.0,
                unique_values: 0,
                entropy: 0.0,
            };
        }

        let present = || counts.iter().enumerate().filter(|&(_, &c)| c > 0);
        let min = present().next().map_or(0, |(v, _)| v as u8);
        let max = present().last().map_or(0, |(v, _)| v as u8);
        let unique_values = present().count();

        let sum: f64 = present().map(|(v, &c)| v as f64 * c as f64).sum();
        let mean = sum / n as f64;
        let var: f64 = present()
            .map(|(v, &c)| {
                let d = v as f64 - mean;
                d * d * c as f64
            })
            .sum::<f64>()
            / n as f64;

        Self {
            min,
            max,
            mean,
            median: median_from_counts(&counts, n),
            std_dev: var.sqrt(),
            unique_values,
            entropy: entropy_from_counts(counts.into_iter(), n),
        }
    }
}

/// Median from a histogram; averages the two middle values for even counts.
fn median_from_counts(counts: &[u64; 256], n: u64) -> f64 {
    let nth = |k: u64| -> f64 {
        let mut seen = 0u64;
        for (v, &c) in counts.iter().enumerate() {
            seen += c;
            if seen > k {
                return v as f64;
            }
        }
        255.0
    };
    if n % 2 == 1 {
        nth(n / 2)
    } else {
        (nth(n / 2 - 1) + nth(n / 2)) / 2.0
    }
}

// ── Report ─────────────────────────────────────────────────────────────────

/// Full comparison of an original against its reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub original_entropy: f64,
    pub reconstructed_entropy: f64,
    pub entropy_reduction_percent: f64,

    pub psnr_db: f64,
    pub ssim: f64,
    pub mse: f64,

    pub original_bytes: usize,
    pub compressed_bytes: usize,
    pub compression_ratio: f64,
    pub space_saved_percent: f64,
    pub bits_per_pixel: f64,

    /// Entropy bound: `entropy × pixels`.
    pub theoretical_min_bits: f64,
    /// Entropy bound as a percentage of the bits actually spent.
    pub efficiency_percent: f64,

    pub pixels: usize,
}

impl QualityReport {
    pub fn compute(
        original: &Image,
        reconstructed: &Image,
        original_bytes: usize,
        compressed_bytes: usize,
    ) -> Result<Self> {
        let original_entropy = entropy(original.pixels());
        let reconstructed_entropy = entropy(reconstructed.pixels());
        let pixels = original.len();
        let compressed_bits = compressed_bytes as u64 * 8;
        let theoretical_min_bits = original_entropy * pixels as f64;

        Ok(Self {
            original_entropy,
            reconstructed_entropy,
            entropy_reduction_percent: if original_entropy > 0.0 {
                (original_entropy - reconstructed_entropy) / original_entropy * 100.0
            } else {
                0.0
            },
            psnr_db: psnr(original, reconstructed)?,
            ssim: ssim(original, reconstructed)?,
            mse: mse(original, reconstructed)?,
            original_bytes,
            compressed_bytes,
            compression_ratio: compression_ratio(original_bytes, compressed_bytes),
            space_saved_percent: space_saved_percent(original_bytes, compressed_bytes),
            bits_per_pixel: bits_per_pixel(compressed_bits, pixels),
            theoretical_min_bits,
            efficiency_percent: if compressed_bits > 0 {
                theoretical_min_bits / compressed_bits as f64 * 100.0
            } else {
                0.0
            },
            pixels,
        })
    }
}

impl fmt::Display for QualityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        let thin = "-".repeat(60);
        writeln!(f, "{rule}")?;
        writeln!(f, "COMPRESSION & QUALITY ANALYSIS")?;
        writeln!(f, "{rule}")?;

        writeln!(f, "\nINFORMATION THEORY")?;
        writeln!(f, "{thin}")?;
        writeln!(f, "  original entropy      : {:.3} bits/symbol", self.original_entropy)?;
        writeln!(f, "  reconstructed entropy : {:.3} bits/symbol", self.reconstructed_entropy)?;
        writeln!(f, "  entropy reduction     : {:.1}%", self.entropy_reduction_percent)?;

        writeln!(f, "\nQUALITY")?;
        writeln!(f, "{thin}")?;
        if self.psnr_db.is_infinite() {
            writeln!(f, "  psnr                  : inf (identical)")?;
        } else {
            writeln!(f, "  psnr                  : {:.2} dB", self.psnr_db)?;
        }
        writeln!(f, "  ssim                  : {:.4}", self.ssim)?;
        writeln!(f, "  mse                   : {:.2}", self.mse)?;

        writeln!(f, "\nCOMPRESSION")?;
        writeln!(f, "{thin}")?;
        writeln!(f, "  original size         : {} bytes", self.original_bytes)?;
        writeln!(f, "  compressed size       : {} bytes", self.compressed_bytes)?;
        writeln!(f, "  ratio                 : {:.2}x", self.compression_ratio)?;
        writeln!(f, "  space saved           : {:.1}%", self.space_saved_percent)?;
        writeln!(f, "  bits per pixel        : {:.2}", self.bits_per_pixel)?;

        writeln!(f, "\nEFFICIENCY")?;
        writeln!(f, "{thin}")?;
        writeln!(f, "  theoretical minimum   : {:.0} bits", self.theoretical_min_bits)?;
        writeln!(f, "  efficiency            : {:.1}%", self.efficiency_percent)?;
        write!(f, "{rule}")
    }
}
