use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{Error, Result};
use crate::image::{ImageShape, DTYPE_U8};

/// Size of the big-endian metadata length prefix that opens every container.
pub const LENGTH_PREFIX_SIZE: usize = 4;

// ── Codec defaults ──────────────────────────────────────────────────────────

/// Default sampling stride for the sparse codec.
pub const DEFAULT_SAMPLING_STRIDE: usize = 4;

/// Default block edge for the DCT codec.
pub const DEFAULT_BLOCK_SIZE: usize = 8;

/// Smallest and largest accepted DCT block edge.
pub const MIN_BLOCK_SIZE: usize = 2;
pub const MAX_BLOCK_SIZE: usize = 32;

/// Default DCT quality factor.
pub const DEFAULT_QUALITY: f64 = 0.8;

/// Longest run a single RLE pair can describe.
pub const MAX_RUN_LENGTH: usize = 255;

// ── Methods ────────────────────────────────────────────────────────────────

/// The closed set of compression methods.
///
/// The string names are what appears in the `method` field of container
/// metadata and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Naive,
    Rle,
    Differential,
    Huffman,
    Sparse,
    Dct,
}

impl Method {
    /// Every method, in benchmark order.
    pub const ALL: [Method; 6] = [
        Method::Naive,
        Method::Rle,
        Method::Differential,
        Method::Huffman,
        Method::Sparse,
        Method::Dct,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Method::Naive => "naive",
            Method::Rle => "rle",
            Method::Differential => "differential",
            Method::Huffman => "huffman",
            Method::Sparse => "sparse",
            Method::Dct => "dct",
        }
    }

    /// Whether `reconstruct(compress(x)) == x` for every input.
    pub fn is_lossless(self) -> bool {
        !matches!(self, Method::Sparse | Method::Dct)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "naive" | "direct" | "raw" => Ok(Method::Naive),
            "rle" | "run_length" | "run-length" => Ok(Method::Rle),
            "differential" | "delta" => Ok(Method::Differential),
            "huffman" => Ok(Method::Huffman),
            "sparse" => Ok(Method::Sparse),
            "dct" | "block_transform" => Ok(Method::Dct),
            _ => Err(Error::UnsupportedMethod(s.to_string())),
        }
    }
}

// ── Huffman codebook ────────────────────────────────────────────────────────

/// Symbol → bit string table carried in Huffman metadata.
///
/// On the wire the symbol keys are decimal strings (`{"0": "10", "255": "0"}`)
/// so the JSON stays valid for any consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Codebook(pub BTreeMap<u8, String>);

impl Codebook {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, symbol: u8) -> Option<&str> {
        self.0.get(&symbol).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &str)> {
        self.0.iter().map(|(&s, c)| (s, c.as_str()))
    }
}

impl Serialize for Codebook {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let keyed: BTreeMap<String, &String> =
            self.0.iter().map(|(s, c)| (s.to_string(), c)).collect();
        keyed.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Codebook {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let keyed = BTreeMap::<String, String>::deserialize(deserializer)?;
        let mut book = BTreeMap::new();
        for (key, code) in keyed {
            let symbol = key.parse::<u8>().map_err(|_| {
                serde::de::Error::custom(format!("codebook symbol '{key}' is not a byte value"))
            })?;
            book.insert(symbol, code);
        }
        Ok(Codebook(book))
    }
}

// ── Method parameters ───────────────────────────────────────────────────────

/// Order in which DCT coefficients of a block are serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoefficientScan {
    Zigzag,
}

/// Method-specific metadata. The `method` key selects the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum MethodParams {
    Naive,
    Rle {
        pairs: usize,
    },
    Differential {
        max_diff: u16,
        bits_per_symbol: u8,
    },
    Huffman {
        codebook: Codebook,
        bit_count: u64,
    },
    Sparse {
        stride: usize,
        sample_count: usize,
    },
    Dct {
        block_size: usize,
        quality: f64,
        /// `[height, width]` of each plane after padding.
        padded_shape: [usize; 2],
        /// `[bottom, right]` rows/columns of edge replication.
        padding: [usize; 2],
        /// `[rows, cols]` of the per-plane block grid.
        blocks: [usize; 2],
        scan: CoefficientScan,
    },
}

impl MethodParams {
    pub fn method(&self) -> Method {
        match self {
            MethodParams::Naive => Method::Naive,
            MethodParams::Rle { .. } => Method::Rle,
            MethodParams::Differential { .. } => Method::Differential,
            MethodParams::Huffman { .. } => Method::Huffman,
            MethodParams::Sparse { .. } => Method::Sparse,
            MethodParams::Dct { .. } => Method::Dct,
        }
    }
}

// ── Metadata ───────────────────────────────────────────────────────────────

/// Everything a reconstructor needs besides the payload bytes.
///
/// Serialized as one flat JSON object:
/// `{"original_shape":[h,w],"original_dtype":"uint8","method":"rle","pairs":17}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub original_shape: Vec<usize>,
    pub original_dtype: String,
    #[serde(flatten)]
    pub params: MethodParams,
    /// xxh3-64 of the payload this metadata was produced with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_checksum: Option<u64>,
}

impl Metadata {
    pub fn new(shape: ImageShape, params: MethodParams) -> Self {
        Self {
            original_shape: shape.dims(),
            original_dtype: DTYPE_U8.to_string(),
            params,
            payload_checksum: None,
        }
    }

    /// Attach the checksum of `payload`.
    pub fn with_checksum(mut self, payload: &[u8]) -> Self {
        self.payload_checksum = Some(xxh3_64(payload));
        self
    }

    #[inline]
    pub fn method(&self) -> Method {
        self.params.method()
    }

    /// Parse and validate the recorded shape and dtype.
    pub fn shape(&self) -> Result<ImageShape> {
        if self.original_dtype != DTYPE_U8 {
            return Err(Error::corrupt(format!(
                "unsupported dtype '{}' (only {} is supported)",
                self.original_dtype, DTYPE_U8
            )));
        }
        ImageShape::from_dims(&self.original_shape)
            .map_err(|e| Error::corrupt_with("invalid original_shape", e))
    }

    /// Check `payload` against the recorded checksum, if any.
    pub fn verify_checksum(&self, payload: &[u8]) -> Result<()> {
        if let Some(expected) = self.payload_checksum {
            let actual = xxh3_64(payload);
            if actual != expected {
                return Err(Error::corrupt(format!(
                    "payload checksum mismatch: expected {expected:016x}, got {actual:016x}"
                )));
            }
        }
        Ok(())
    }

    /// Reject metadata produced for a different method than `expected`.
    pub fn expect_method(&self, expected: Method) -> Result<()> {
        let actual = self.method();
        if actual != expected {
            return Err(Error::corrupt(format!(
                "metadata is for method '{actual}', not '{expected}'"
            )));
        }
        Ok(())
    }
}
