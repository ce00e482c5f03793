use infocodec_core::codec::{capture_shape, restore_shape, Codec, CodecStats, StatsDetail};
use infocodec_core::format::{Metadata, Method, MethodParams, MAX_RUN_LENGTH};
use infocodec_core::{Error, Image, Result};
use tracing::debug;

/// Run-length codec over the flattened raster.
///
/// Payload is a sequence of `(value, count)` byte pairs with `1 ≤ count ≤ 255`;
/// longer runs are split into several pairs. Data without repeats doubles in
/// size.
#[derive(Debug, Default, Clone)]
pub struct RleCodec {
    stats: Option<CodecStats>,
}

fn encode_runs(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut iter = data.iter().copied();
    let Some(mut current) = iter.next() else {
        return out;
    };
    let mut count = 1usize;
    for b in iter {
        if b == current && count < MAX_RUN_LENGTH {
            count += 1;
        } else {
            out.push(current);
            out.push(count as u8);
            current = b;
            count = 1;
        }
    }
    out.push(current);
    out.push(count as u8);
    out
}

impl Codec for RleCodec {
    fn method(&self) -> Method {
        Method::Rle
    }

    fn compress(&mut self, image: &Image) -> Result<(Vec<u8>, Metadata)> {
        let payload = encode_runs(image.pixels());
        let pairs = payload.len() / 2;
        let metadata =
            Metadata::new(capture_shape(image), MethodParams::Rle { pairs }).with_checksum(&payload);
        self.stats = Some(CodecStats::measure(
            Method::Rle,
            image,
            payload.len(),
            StatsDetail::RunLength { pairs },
        ));
        debug!(pairs, bytes = payload.len(), "rle compress");
        Ok((payload, metadata))
    }

    fn reconstruct(&self, payload: &[u8], metadata: &Metadata) -> Result<Image> {
        let MethodParams::Rle { pairs } = metadata.params else {
            return Err(Error::corrupt(format!(
                "metadata is for method '{}', not 'rle'",
                metadata.method()
            )));
        };
        let shape = metadata.shape()?;
        if payload.len() % 2 != 0 {
            return Err(Error::decode(
                "rle",
                format!("payload length {} is not a whole number of pairs", payload.len()),
            ));
        }
        if payload.len() / 2 != pairs {
            return Err(Error::corrupt(format!(
                "metadata records {pairs} pairs, payload holds {}",
                payload.len() / 2
            )));
        }

        let mut total = 0usize;
        for (i, pair) in payload.chunks_exact(2).enumerate() {
            if pair[1] == 0 {
                return Err(Error::decode("rle", format!("pair {i} has a zero run length")));
            }
            total += pair[1] as usize;
        }
        if total != shape.len() {
            return Err(Error::shape_mismatch(shape.len(), total));
        }

        let mut pixels = Vec::with_capacity(total);
        for pair in payload.chunks_exact(2) {
            pixels.extend(std::iter::repeat(pair[0]).take(pair[1] as usize));
        }
        restore_shape(pixels, shape)
    }

    fn stats(&self) -> Option<&CodecStats> {
        self.stats.as_ref()
    }
}
