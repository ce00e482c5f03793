use infocodec_core::codec::{capture_shape, restore_shape, Codec, CodecStats, StatsDetail};
use infocodec_core::format::{Metadata, Method, MethodParams};
use infocodec_core::metrics::{entropy, symbol_entropy};
use infocodec_core::{Error, Image, Result};
use tracing::debug;

/// Delta codec over the flattened raster.
///
/// The first value is stored literally, every following value as its
/// difference from the previous one. Each symbol is a little-endian `i16`,
/// so the payload is always twice the pixel count; the gain shows up in the
/// entropy of the delta stream, which the stats report.
#[derive(Debug, Default, Clone)]
pub struct DifferentialCodec {
    stats: Option<CodecStats>,
}

/// Bits for a sign plus a magnitude up to `max_diff`.
pub fn bits_per_symbol(max_diff: u16) -> u8 {
    if max_diff == 0 {
        return 1;
    }
    (u16::BITS - max_diff.leading_zeros()) as u8 + 1
}

fn deltas(data: &[u8]) -> Vec<i16> {
    let mut out = Vec::with_capacity(data.len());
    let mut prev = 0i16;
    for (i, &b) in data.iter().enumerate() {
        let v = b as i16;
        out.push(if i == 0 { v } else { v - prev });
        prev = v;
    }
    out
}

impl Codec for DifferentialCodec {
    fn method(&self) -> Method {
        Method::Differential
    }

    fn compress(&mut self, image: &Image) -> Result<(Vec<u8>, Metadata)> {
        let symbols = deltas(image.pixels());
        let max_diff = symbols
            .iter()
            .skip(1)
            .map(|d| d.unsigned_abs())
            .max()
            .unwrap_or(0);
        let bits = bits_per_symbol(max_diff);

        let mut payload = Vec::with_capacity(symbols.len() * 2);
        for d in &symbols {
            payload.extend_from_slice(&d.to_le_bytes());
        }

        let original_entropy = entropy(image.pixels());
        let differential_entropy = symbol_entropy(symbols.iter().copied());
        let entropy_reduction_percent = if original_entropy > 0.0 {
            (original_entropy - differential_entropy) / original_entropy * 100.0
        } else {
            0.0
        };

        let metadata = Metadata::new(
            capture_shape(image),
            MethodParams::Differential {
                max_diff,
                bits_per_symbol: bits,
            },
        )
        .with_checksum(&payload);
        self.stats = Some(CodecStats::measure(
            Method::Differential,
            image,
            payload.len(),
            StatsDetail::Differential {
                differential_entropy,
                entropy_reduction_percent,
                max_difference: max_diff,
                bits_per_symbol: bits,
            },
        ));
        debug!(
            original_entropy,
            differential_entropy,
            max_diff,
            "differential compress"
        );
        Ok((payload, metadata))
    }

    fn reconstruct(&self, payload: &[u8], metadata: &Metadata) -> Result<Image> {
        metadata.expect_method(Method::Differential)?;
        let shape = metadata.shape()?;
        if payload.len() % 2 != 0 {
            return Err(Error::decode(
                "differential",
                format!("payload length {} is not a whole number of i16 symbols", payload.len()),
            ));
        }
        let count = payload.len() / 2;
        if count != shape.len() {
            return Err(Error::shape_mismatch(shape.len(), count));
        }

        let mut pixels = Vec::with_capacity(count);
        let mut running = 0i32;
        for (i, sym) in payload.chunks_exact(2).enumerate() {
            let d = i16::from_le_bytes([sym[0], sym[1]]) as i32;
            running = if i == 0 { d } else { running + d };
            let value = u8::try_from(running).map_err(|_| {
                Error::decode(
                    "differential",
                    format!("value {running} at position {i} is outside 0..=255"),
                )
            })?;
            pixels.push(value);
        }
        restore_shape(pixels, shape)
    }

    fn stats(&self) -> Option<&CodecStats> {
        self.stats.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infocodec_core::ImageShape;

    #[test]
    fn test_bits_per_symbol() {
        assert_eq!(bits_per_symbol(0), 1);
        assert_eq!(bits_per_symbol(1), 2);
        assert_eq!(bits_per_symbol(3), 3);
        assert_eq!(bits_per_symbol(4), 4);
        assert_eq!(bits_per_symbol(255), 9);
    }

    #[test]
    fn test_payload_layout() {
        let img = Image::gray(1, 3, vec![10, 12, 9]).unwrap();
        let mut codec = DifferentialCodec::default();
        let (payload, meta) = codec.compress(&img).unwrap();
        assert_eq!(payload, vec![10, 0, 2, 0, 0xFD, 0xFF]);
        assert_eq!(
            meta.params,
            MethodParams::Differential {
                max_diff: 3,
                bits_per_symbol: 3
            }
        );
        assert_eq!(codec.reconstruct(&payload, &meta).unwrap(), img);
    }

    #[test]
    fn test_out_of_range_running_value() {
        let meta = Metadata::new(
            ImageShape::gray(1, 2),
            MethodParams::Differential {
                max_diff: 10,
                bits_per_symbol: 5,
            },
        );
        // 250 then +10 overflows a byte.
        let mut payload = 250i16.to_le_bytes().to_vec();
        payload.extend_from_slice(&10i16.to_le_bytes());
        let err = DifferentialCodec::default().reconstruct(&payload, &meta).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }
}
