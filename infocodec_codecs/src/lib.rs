mod dct;
mod differential;
mod huffman;
mod naive;
mod rle;
mod sparse;
pub mod varint;

pub use dct::{zigzag_order, DctCodec};
pub use differential::{bits_per_symbol, DifferentialCodec};
pub use huffman::{canonical_codes, code_lengths, HuffmanCodec};
pub use naive::NaiveCodec;
pub use rle::RleCodec;
pub use sparse::{grid_samples, SparseCodec};

use std::str::FromStr;

use infocodec_core::codec::{Codec, CodecStats};
use infocodec_core::format::{Metadata, Method};
use infocodec_core::select::{AutoSelector, Selection};
use infocodec_core::{deserialize, serialize, Image, Result};
use tracing::debug;

/// One of the bundled codecs, chosen at run time.
#[derive(Debug, Clone)]
pub enum AnyCodec {
    Naive(NaiveCodec),
    Rle(RleCodec),
    Differential(DifferentialCodec),
    Huffman(HuffmanCodec),
    Sparse(SparseCodec),
    Dct(DctCodec),
}

impl AnyCodec {
    /// The codec for `method`, with default parameters.
    pub fn with_defaults(method: Method) -> Self {
        match method {
            Method::Naive => AnyCodec::Naive(NaiveCodec::default()),
            Method::Rle => AnyCodec::Rle(RleCodec::default()),
            Method::Differential => AnyCodec::Differential(DifferentialCodec::default()),
            Method::Huffman => AnyCodec::Huffman(HuffmanCodec::default()),
            Method::Sparse => AnyCodec::Sparse(SparseCodec::default()),
            Method::Dct => AnyCodec::Dct(DctCodec::default()),
        }
    }

    fn inner(&self) -> &dyn Codec {
        match self {
            AnyCodec::Naive(c) => c,
            AnyCodec::Rle(c) => c,
            AnyCodec::Differential(c) => c,
            AnyCodec::Huffman(c) => c,
            AnyCodec::Sparse(c) => c,
            AnyCodec::Dct(c) => c,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Codec {
        match self {
            AnyCodec::Naive(c) => c,
            AnyCodec::Rle(c) => c,
            AnyCodec::Differential(c) => c,
            AnyCodec::Huffman(c) => c,
            AnyCodec::Sparse(c) => c,
            AnyCodec::Dct(c) => c,
        }
    }
}

impl From<SparseCodec> for AnyCodec {
    fn from(codec: SparseCodec) -> Self {
        AnyCodec::Sparse(codec)
    }
}

impl From<DctCodec> for AnyCodec {
    fn from(codec: DctCodec) -> Self {
        AnyCodec::Dct(codec)
    }
}

impl Codec for AnyCodec {
    fn method(&self) -> Method {
        self.inner().method()
    }

    fn compress(&mut self, image: &Image) -> Result<(Vec<u8>, Metadata)> {
        self.inner_mut().compress(image)
    }

    fn reconstruct(&self, payload: &[u8], metadata: &Metadata) -> Result<Image> {
        self.inner().reconstruct(payload, metadata)
    }

    fn stats(&self) -> Option<&CodecStats> {
        self.inner().stats()
    }
}

/// Resolve a codec from its method name or alias (case-insensitive).
///
/// Unknown names fail with `UnsupportedMethod`.
pub fn codec_by_name(name: &str) -> Result<AnyCodec> {
    Method::from_str(name).map(AnyCodec::with_defaults)
}

/// Every bundled codec with default parameters, in benchmark order.
pub fn all_codecs() -> Vec<AnyCodec> {
    Method::ALL.into_iter().map(AnyCodec::with_defaults).collect()
}

/// Rebuild an image from a payload using the codec its metadata names.
///
/// Every parameter comes from `metadata`; the defaults of the dispatched codec
/// are never consulted.
pub fn reconstruct(payload: &[u8], metadata: &Metadata) -> Result<Image> {
    AnyCodec::with_defaults(metadata.method()).reconstruct(payload, metadata)
}

/// Compress `image` with `codec` and frame the result as a container.
pub fn encode(image: &Image, codec: &mut dyn Codec) -> Result<Vec<u8>> {
    let (payload, metadata) = codec.compress(image)?;
    serialize(&metadata, &payload)
}

/// Let `selector` pick the method, then encode with that codec's defaults.
pub fn encode_auto(image: &Image, selector: &AutoSelector) -> Result<(Vec<u8>, Selection)> {
    let selection = selector.select(image);
    let mut codec = AnyCodec::with_defaults(selection.method);
    let container = encode(image, &mut codec)?;
    Ok((container, selection))
}

/// Parse a container and reconstruct the image it holds.
pub fn decode(container: &[u8]) -> Result<Image> {
    let parsed = deserialize(container)?;
    debug!(
        method = %parsed.metadata.method(),
        payload_len = parsed.payload.len(),
        "decoding container"
    );
    reconstruct(parsed.payload, &parsed.metadata)
}
