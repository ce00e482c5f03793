use crate::error::{Error, Result};

/// The only element type the engine handles.
pub const DTYPE_U8: &str = "uint8";

/// Geometry of an 8-bit image buffer.
///
/// `channel_axis` remembers whether the caller supplied a 3-D `H×W×C` array
/// or a plain 2-D `H×W` one, so a single-channel image shaped `[h, w, 1]`
/// comes back as `[h, w, 1]` and not `[h, w]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub channel_axis: bool,
}

impl ImageShape {
    /// A 2-D grayscale shape.
    pub fn gray(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            channels: 1,
            channel_axis: false,
        }
    }

    /// A 3-D `H×W×3` shape.
    pub fn rgb(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            channels: 3,
            channel_axis: true,
        }
    }

    /// Parse the `original_shape` sequence stored in metadata.
    pub fn from_dims(dims: &[usize]) -> Result<Self> {
        let shape = match *dims {
            [height, width] => Self::gray(height, width),
            [height, width, channels] => Self {
                height,
                width,
                channels,
                channel_axis: true,
            },
            _ => {
                return Err(Error::InvalidImage(format!(
                    "expected a 2-D or 3-D shape, got {} dimensions",
                    dims.len()
                )))
            }
        };
        shape.validate()?;
        Ok(shape)
    }

    /// The shape as a dimension list, matching what was captured.
    pub fn dims(&self) -> Vec<usize> {
        if self.channel_axis {
            vec![self.height, self.width, self.channels]
        } else {
            vec![self.height, self.width]
        }
    }

    /// Pixels per channel plane.
    #[inline]
    pub fn plane_len(&self) -> usize {
        self.height * self.width
    }

    /// Total element count (product of all dimensions).
    #[inline]
    pub fn len(&self) -> usize {
        self.plane_len() * self.channels
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn validate(&self) -> Result<()> {
        if self.height == 0 || self.width == 0 {
            return Err(Error::InvalidImage(format!(
                "zero-sized dimension in {:?}",
                self.dims()
            )));
        }
        if self.channels != 1 && self.channels != 3 {
            return Err(Error::InvalidImage(format!(
                "channel count must be 1 or 3, got {}",
                self.channels
            )));
        }
        if self
            .height
            .checked_mul(self.width)
            .and_then(|p| p.checked_mul(self.channels))
            .is_none()
        {
            return Err(Error::InvalidImage(format!(
                "element count of {:?} overflows",
                self.dims()
            )));
        }
        Ok(())
    }
}

/// An owned 8-bit image: row-major, channels interleaved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    shape: ImageShape,
    pixels: Vec<u8>,
}

impl Image {
    /// Wrap `pixels` with `shape`, checking that the element count matches.
    pub fn new(shape: ImageShape, pixels: Vec<u8>) -> Result<Self> {
        shape.validate()?;
        if pixels.len() != shape.len() {
            return Err(Error::InvalidImage(format!(
                "shape {:?} needs {} bytes, buffer has {}",
                shape.dims(),
                shape.len(),
                pixels.len()
            )));
        }
        Ok(Self { shape, pixels })
    }

    /// Build a 2-D grayscale image.
    pub fn gray(height: usize, width: usize, pixels: Vec<u8>) -> Result<Self> {
        Self::new(ImageShape::gray(height, width), pixels)
    }

    /// Build an `H×W×3` image from interleaved RGB bytes.
    pub fn rgb(height: usize, width: usize, pixels: Vec<u8>) -> Result<Self> {
        Self::new(ImageShape::rgb(height, width), pixels)
    }

    /// Build a grayscale image by evaluating `f(row, col)` at every pixel.
    pub fn from_fn(height: usize, width: usize, mut f: impl FnMut(usize, usize) -> u8) -> Result<Self> {
        let shape = ImageShape::gray(height, width);
        shape.validate()?;
        let mut pixels = Vec::with_capacity(shape.len());
        for row in 0..height {
            for col in 0..width {
                pixels.push(f(row, col));
            }
        }
        Self::new(shape, pixels)
    }

    #[inline]
    pub fn shape(&self) -> ImageShape {
        self.shape
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.shape.height
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.shape.width
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.shape.channels
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Element count.
    #[inline]
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Size of the raw buffer in bytes (one byte per element).
    #[inline]
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }

    /// Value at `(row, col, channel)`.
    #[inline]
    pub fn get(&self, row: usize, col: usize, channel: usize) -> u8 {
        self.pixels[(row * self.shape.width + col) * self.shape.channels + channel]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_dims_keep_channel_axis() {
        assert_eq!(ImageShape::gray(2, 3).dims(), vec![2, 3]);
        assert_eq!(ImageShape::from_dims(&[2, 3, 1]).unwrap().dims(), vec![2, 3, 1]);
        assert_eq!(ImageShape::rgb(2, 3).len(), 18);
    }

    #[test]
    fn test_invalid_shapes() {
        assert!(ImageShape::from_dims(&[0, 3]).is_err());
        assert!(ImageShape::from_dims(&[2, 3, 2]).is_err());
        assert!(ImageShape::from_dims(&[5]).is_err());
        assert!(ImageShape::from_dims(&[usize::MAX, 3]).is_err());
        assert!(Image::gray(2, 2, vec![0; 3]).is_err());
        assert!(Image::from_fn(usize::MAX, 2, |_, _| 0).is_err());
    }

    #[test]
    fn test_get_indexes_interleaved() {
        let img = Image::rgb(1, 2, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(img.get(0, 1, 2), 6);
        assert_eq!(img.byte_size(), 6);
    }
}
