pub mod codec;
pub mod error;
pub mod format;
pub mod image;
pub mod metrics;
pub mod pattern;
pub mod reader;
pub mod select;
pub mod writer;

pub use codec::{alloc_pixels, capture_shape, merge_planes, restore_shape, split_planes, Codec, CodecStats, StatsDetail};
pub use error::{Error, Result};
pub use format::{Codebook, CoefficientScan, Metadata, Method, MethodParams};
pub use image::{Image, ImageShape};
pub use metrics::{DistributionStats, QualityReport};
pub use pattern::TestPattern;
pub use reader::{deserialize, Container};
pub use select::{AutoSelector, Criterion, Selection, SelectionRule, SelectionRules};
pub use writer::serialize;
