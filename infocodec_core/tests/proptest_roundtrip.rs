//! Property-based tests for the codec engine.
//!
//! These tests verify that properties hold across arbitrary images:
//! - Every lossless codec reproduces its input bit-exactly through a container
//! - DCT at quality 1.0 stays within one level of the input
//! - Every codec preserves shape
//! - Containers reproduce arbitrary metadata and payloads exactly
//! - Arbitrary bytes never panic the container parser
use std::collections::BTreeMap;

use proptest::prelude::*;

use infocodec_codecs::{decode, encode, AnyCodec, DctCodec};
use infocodec_core::format::{Codebook, CoefficientScan};
use infocodec_core::metrics::{entropy, psnr, ssim};
use infocodec_core::{deserialize, serialize, Image, ImageShape, Metadata, Method, MethodParams};

/// Strategy for small images: 1–24 rows and columns, gray or RGB.
fn image_strategy() -> impl Strategy<Value = Image> {
    (1usize..24, 1usize..24, prop_oneof![Just(1usize), Just(3)]).prop_flat_map(|(h, w, c)| {
        prop::collection::vec(any::<u8>(), h * w * c).prop_map(move |pixels| {
            if c == 1 {
                Image::gray(h, w, pixels).unwrap()
            } else {
                Image::rgb(h, w, pixels).unwrap()
            }
        })
    })
}

/// Low-cardinality images, where run-length and Huffman do real work.
fn runny_image_strategy() -> impl Strategy<Value = Image> {
    (1usize..40, 1usize..40).prop_flat_map(|(h, w)| {
        prop::collection::vec(prop_oneof![Just(0u8), Just(128), Just(255)], h * w)
            .prop_map(move |pixels| Image::gray(h, w, pixels).unwrap())
    })
}

/// Valid shapes, 2-D gray or 3-D with one or three channels.
fn shape_strategy() -> impl Strategy<Value = ImageShape> {
    prop_oneof![
        (1usize..4096, 1usize..4096).prop_map(|(h, w)| ImageShape::gray(h, w)),
        (1usize..4096, 1usize..4096, prop_oneof![Just(1usize), Just(3)])
            .prop_map(|(h, w, c)| ImageShape::from_dims(&[h, w, c]).unwrap()),
    ]
}

fn codebook_strategy() -> impl Strategy<Value = Codebook> {
    prop::collection::btree_map(any::<u8>(), "[01]{1,24}", 1..40)
        .prop_map(|book: BTreeMap<u8, String>| Codebook(book))
}

/// Every method's parameters, with arbitrary field values.
fn params_strategy() -> impl Strategy<Value = MethodParams> {
    prop_oneof![
        Just(MethodParams::Naive),
        any::<usize>().prop_map(|pairs| MethodParams::Rle { pairs }),
        (any::<u16>(), any::<u8>()).prop_map(|(max_diff, bits_per_symbol)| MethodParams::Differential {
            max_diff,
            bits_per_symbol,
        }),
        (codebook_strategy(), any::<u64>())
            .prop_map(|(codebook, bit_count)| MethodParams::Huffman { codebook, bit_count }),
        (1usize..1024, any::<usize>())
            .prop_map(|(stride, sample_count)| MethodParams::Sparse { stride, sample_count }),
        (2usize..=32, 0.0f64..=1.0, any::<[usize; 2]>(), any::<[usize; 2]>(), any::<[usize; 2]>()).prop_map(
            |(block_size, quality, padded_shape, padding, blocks)| MethodParams::Dct {
                block_size,
                quality,
                padded_shape,
                padding,
                blocks,
                scan: CoefficientScan::Zigzag,
            }
        ),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        max_shrink_iters: 200,
        ..ProptestConfig::default()
    })]

    /// Property: lossless methods round-trip exactly.
    #[test]
    fn prop_lossless_roundtrip(image in image_strategy()) {
        for method in Method::ALL.into_iter().filter(|m| m.is_lossless()) {
            let mut codec = AnyCodec::with_defaults(method);
            let container = encode(&image, &mut codec).unwrap();
            prop_assert_eq!(&decode(&container).unwrap(), &image, "method {}", method);
        }
    }

    #[test]
    fn prop_lossless_roundtrip_low_cardinality(image in runny_image_strategy()) {
        for method in Method::ALL.into_iter().filter(|m| m.is_lossless()) {
            let mut codec = AnyCodec::with_defaults(method);
            let container = encode(&image, &mut codec).unwrap();
            prop_assert_eq!(&decode(&container).unwrap(), &image, "method {}", method);
        }
    }

    /// Property: lossy methods never change shape.
    #[test]
    fn prop_lossy_preserves_shape(image in image_strategy()) {
        for method in [Method::Sparse, Method::Dct] {
            let mut codec = AnyCodec::with_defaults(method);
            let container = encode(&image, &mut codec).unwrap();
            prop_assert_eq!(decode(&container).unwrap().shape(), image.shape());
        }
    }

    #[test]
    fn prop_dct_full_quality_within_one_level(
        image in image_strategy(),
        block in prop_oneof![Just(2usize), Just(4), Just(8), Just(16)],
    ) {
        let mut codec: AnyCodec = DctCodec::new(block, 1.0).unwrap().into();
        let out = decode(&encode(&image, &mut codec).unwrap()).unwrap();
        for (a, b) in image.pixels().iter().zip(out.pixels()) {
            prop_assert!((*a as i32 - *b as i32).abs() <= 1);
        }
    }

    /// Property: metrics stay in range.
    #[test]
    fn prop_metric_bounds(a in image_strategy()) {
        let h = entropy(a.pixels());
        prop_assert!((0.0..=8.0).contains(&h));
        prop_assert_eq!(psnr(&a, &a).unwrap(), f64::INFINITY);

        let inverted = Image::new(a.shape(), a.pixels().iter().map(|p| 255 - p).collect()).unwrap();
        let s = ssim(&a, &inverted).unwrap();
        prop_assert!((0.0..=1.0).contains(&s));
    }

    /// Property: deserialize(serialize(m, p)) == (m, p).
    #[test]
    fn prop_container_roundtrip(
        shape in shape_strategy(),
        params in params_strategy(),
        payload in prop::collection::vec(any::<u8>(), 0..512),
        checksum in any::<bool>(),
    ) {
        let mut metadata = Metadata::new(shape, params);
        if checksum {
            metadata = metadata.with_checksum(&payload);
        }
        let blob = serialize(&metadata, &payload).unwrap();
        let container = deserialize(&blob).unwrap();
        prop_assert_eq!(&container.metadata, &metadata);
        prop_assert_eq!(container.payload, payload.as_slice());
        prop_assert_eq!(container.total_len(), blob.len());
    }

    /// Property: the parser rejects or accepts, but never panics.
    #[test]
    fn prop_container_parser_total(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = deserialize(&bytes);
        let _ = decode(&bytes);
    }
}
