use infocodec_core::codec::{capture_shape, restore_shape, Codec, CodecStats, StatsDetail};
use infocodec_core::format::{Metadata, Method, MethodParams};
use infocodec_core::{Image, Result};
use tracing::debug;

/// No-op codec: stores the raster verbatim.
///
/// Useful as the ratio-1.0 baseline in benchmarks and for checking the
/// container round trip independently of any real coding.
#[derive(Debug, Default, Clone)]
pub struct NaiveCodec {
    stats: Option<CodecStats>,
}

impl Codec for NaiveCodec {
    fn method(&self) -> Method {
        Method::Naive
    }

    fn compress(&mut self, image: &Image) -> Result<(Vec<u8>, Metadata)> {
        let payload = image.pixels().to_vec();
        let metadata = Metadata::new(capture_shape(image), MethodParams::Naive).with_checksum(&payload);
        self.stats = Some(CodecStats::measure(Method::Naive, image, payload.len(), StatsDetail::None));
        debug!(bytes = payload.len(), "naive compress");
        Ok((payload, metadata))
    }

    fn reconstruct(&self, payload: &[u8], metadata: &Metadata) -> Result<Image> {
        metadata.expect_method(Method::Naive)?;
        restore_shape(payload.to_vec(), metadata.shape()?)
    }

    fn stats(&self) -> Option<&CodecStats> {
        self.stats.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infocodec_core::Error;

    #[test]
    fn test_identity_and_unit_ratio() {
        let img = Image::rgb(2, 2, (0..12).collect()).unwrap();
        let mut codec = NaiveCodec::default();
        let (payload, meta) = codec.compress(&img).unwrap();
        assert_eq!(payload, img.pixels());
        assert_eq!(codec.stats().unwrap().compression_ratio, 1.0);
        assert_eq!(codec.reconstruct(&payload, &meta).unwrap(), img);
    }

    #[test]
    fn test_short_payload_is_shape_mismatch() {
        let img = Image::gray(2, 2, vec![1, 2, 3, 4]).unwrap();
        let mut codec = NaiveCodec::default();
        let (payload, meta) = codec.compress(&img).unwrap();
        let err = codec.reconstruct(&payload[..3], &meta).unwrap_err();
        assert!(matches!(err, Error::ReconstructionShapeMismatch { expected: 4, actual: 3 }));
    }
}
