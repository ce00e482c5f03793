use infocodec_core::codec::{alloc_pixels, capture_shape, merge_planes, split_planes, Codec, CodecStats, StatsDetail};
use infocodec_core::format::{Metadata, Method, MethodParams, DEFAULT_SAMPLING_STRIDE};
use infocodec_core::{Error, Image, ImageShape, Result};
use tracing::debug;

/// Lossy grid-sampling codec.
///
/// Keeps the pixels whose row and column are both multiples of `stride`, in
/// raster order with channels interleaved. Reconstruction interpolates
/// bilinearly between the four surrounding grid samples; pixels past the last
/// grid row or column replicate it. Grid positions come back exactly.
#[derive(Debug, Clone)]
pub struct SparseCodec {
    stride: usize,
    stats: Option<CodecStats>,
}

impl Default for SparseCodec {
    fn default() -> Self {
        Self {
            stride: DEFAULT_SAMPLING_STRIDE,
            stats: None,
        }
    }
}

impl SparseCodec {
    pub fn new(stride: usize) -> Result<Self> {
        if stride == 0 {
            return Err(Error::invalid_parameter("stride", "must be at least 1"));
        }
        Ok(Self { stride, stats: None })
    }

    pub fn stride(&self) -> usize {
        self.stride
    }
}

/// Sample-grid extent along one axis.
#[inline]
fn grid_len(extent: usize, stride: usize) -> usize {
    extent.div_ceil(stride)
}

/// Fill one `height × width` plane from its `grid_h × grid_w` samples.
fn interpolate_plane(samples: &[u8], height: usize, width: usize, stride: usize) -> Result<Vec<u8>> {
    let grid_h = grid_len(height, stride);
    let grid_w = grid_len(width, stride);
    let at = |gy: usize, gx: usize| samples[gy * grid_w + gx] as f64;

    let mut plane = alloc_pixels(height * width)?;
    for row in 0..height {
        let gy0 = row / stride;
        let gy1 = (gy0 + 1).min(grid_h - 1);
        let fy = (row % stride) as f64 / stride as f64;
        for col in 0..width {
            let gx0 = col / stride;
            let gx1 = (gx0 + 1).min(grid_w - 1);
            let fx = (col % stride) as f64 / stride as f64;

            let top = at(gy0, gx0) * (1.0 - fx) + at(gy0, gx1) * fx;
            let bottom = at(gy1, gx0) * (1.0 - fx) + at(gy1, gx1) * fx;
            let v = top * (1.0 - fy) + bottom * fy;
            plane.push(v.round().clamp(0.0, 255.0) as u8);
        }
    }
    Ok(plane)
}

fn expected_samples(shape: ImageShape, stride: usize) -> usize {
    grid_len(shape.height, stride) * grid_len(shape.width, stride) * shape.channels
}

impl Codec for SparseCodec {
    fn method(&self) -> Method {
        Method::Sparse
    }

    fn compress(&mut self, image: &Image) -> Result<(Vec<u8>, Metadata)> {
        let stride = self.stride;
        let shape = capture_shape(image);
        let mut payload = Vec::with_capacity(expected_samples(shape, stride));
        for row in (0..image.height()).step_by(stride) {
            for col in (0..image.width()).step_by(stride) {
                for ch in 0..image.channels() {
                    payload.push(image.get(row, col, ch));
                }
            }
        }

        let sample_count = payload.len();
        let metadata = Metadata::new(shape, MethodParams::Sparse { stride, sample_count })
            .with_checksum(&payload);
        self.stats = Some(CodecStats::measure(
            Method::Sparse,
            image,
            payload.len(),
            StatsDetail::Sparse {
                stride,
                samples: sample_count,
                sparsity: sample_count as f64 / image.len() as f64,
            },
        ));
        debug!(stride, sample_count, "sparse compress");
        Ok((payload, metadata))
    }

    fn reconstruct(&self, payload: &[u8], metadata: &Metadata) -> Result<Image> {
        let MethodParams::Sparse { stride, sample_count } = metadata.params else {
            return Err(Error::corrupt(format!(
                "metadata is for method '{}', not 'sparse'",
                metadata.method()
            )));
        };
        if stride == 0 {
            return Err(Error::corrupt("sparse stride is zero"));
        }
        let shape = metadata.shape()?;
        let expected = expected_samples(shape, stride);
        if sample_count != expected {
            return Err(Error::corrupt(format!(
                "metadata records {sample_count} samples, stride {stride} implies {expected}"
            )));
        }
        if payload.len() != expected {
            return Err(Error::shape_mismatch(expected, payload.len()));
        }

        let channels = shape.channels;
        let planes = (0..channels)
            .map(|ch| {
                let samples: Vec<u8> = payload.iter().skip(ch).step_by(channels).copied().collect();
                interpolate_plane(&samples, shape.height, shape.width, stride)
            })
            .collect::<Result<Vec<_>>>()?;
        merge_planes(&planes, shape)
    }

    fn stats(&self) -> Option<&CodecStats> {
        self.stats.as_ref()
    }
}

/// Grid positions of `image`, per channel plane, for checks and diagnostics.
pub fn grid_samples(image: &Image, stride: usize) -> Vec<Vec<u8>> {
    let width = image.width();
    split_planes(image)
        .into_iter()
        .map(|plane| {
            (0..image.height())
                .step_by(stride.max(1))
                .flat_map(|r| {
                    let row = &plane[r * width..(r + 1) * width];
                    row.iter().step_by(stride.max(1)).copied().collect::<Vec<_>>()
                })
                .collect()
        })
        .collect()
}
