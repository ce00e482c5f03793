//! Deterministic synthetic images for demos, benchmarks and tests.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::image::Image;

/// Edge of the constant squares in [`TestPattern::Blocks`].
pub const PATTERN_BLOCK: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestPattern {
    /// Diagonal ramp from 0 at the top-left to 255 at the bottom-right.
    Gradient,
    /// 8×8 squares of random constant level.
    Blocks,
    /// Uniform random levels.
    Noise,
    /// Alternating 0/255 pixels.
    Checkerboard,
}

impl TestPattern {
    pub const ALL: [TestPattern; 4] = [
        TestPattern::Gradient,
        TestPattern::Blocks,
        TestPattern::Noise,
        TestPattern::Checkerboard,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TestPattern::Gradient => "gradient",
            TestPattern::Blocks => "blocks",
            TestPattern::Noise => "noise",
            TestPattern::Checkerboard => "checkerboard",
        }
    }

    /// Render a `height × width` grayscale image. `seed` only affects the
    /// random patterns.
    pub fn generate(self, height: usize, width: usize, seed: u64) -> Result<Image> {
        let mut rng = Lcg::new(seed);
        match self {
            TestPattern::Gradient => {
                let ramp = |i: usize, n: usize| {
                    if n > 1 {
                        255.0 * i as f64 / (n - 1) as f64
                    } else {
                        0.0
                    }
                };
                Image::from_fn(height, width, |r, c| {
                    ((ramp(c, width) + ramp(r, height)) / 2.0) as u8
                })
            }
            TestPattern::Blocks => {
                let cols = width.div_ceil(PATTERN_BLOCK);
                let rows = height.div_ceil(PATTERN_BLOCK);
                let levels: Vec<u8> = (0..rows * cols).map(|_| rng.next_byte()).collect();
                Image::from_fn(height, width, |r, c| {
                    levels[(r / PATTERN_BLOCK) * cols + c / PATTERN_BLOCK]
                })
            }
            TestPattern::Noise => Image::from_fn(height, width, |_, _| rng.next_byte()),
            TestPattern::Checkerboard => {
                Image::from_fn(height, width, |r, c| if (r + c) % 2 == 0 { 255 } else { 0 })
            }
        }
    }
}

impl fmt::Display for TestPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TestPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TestPattern::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::invalid_parameter("pattern", format!("unknown pattern '{s}'")))
    }
}

/// 64-bit linear congruential generator (Knuth MMIX constants).
#[derive(Debug, Clone)]
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }

    /// High byte of the next state; the low bits of an LCG are weak.
    pub fn next_byte(&mut self) -> u8 {
        (self.next_u64() >> 56) as u8
    }
}
