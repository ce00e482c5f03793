/// Integration tests: every codec through the container and back.
///
/// Test sequence for each case:
///  1. Build a deterministic image (LCG noise, ramps, blocks, or a fixed pattern)
///  2. Compress it with a bundled codec and frame it as a container
///  3. Decode the container with no knowledge of the codec that produced it
///  4. Assert shape, exactness (lossless) or fidelity (lossy), and error kinds
use infocodec_codecs::{decode, encode, AnyCodec, DctCodec, RleCodec, SparseCodec};
use infocodec_core::metrics::{entropy, psnr, symbol_entropy};
use infocodec_core::{
    deserialize, serialize, AutoSelector, Codec, Error, Image, ImageShape, Method, MethodParams,
    StatsDetail, TestPattern,
};

/// Generate `len` deterministic bytes using a simple LCG.
fn pseudo_random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = seed;
    (0..len)
        .map(|_| {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (rng >> 56) as u8
        })
        .collect()
}

fn noise(height: usize, width: usize, seed: u64) -> Image {
    Image::gray(height, width, pseudo_random_bytes(height * width, seed)).unwrap()
}

fn rgb_noise(height: usize, width: usize, seed: u64) -> Image {
    Image::rgb(height, width, pseudo_random_bytes(height * width * 3, seed)).unwrap()
}

/// Smooth, non-linear surface.
fn wave(height: usize, width: usize) -> Image {
    Image::from_fn(height, width, |r, c| {
        (128.0 + 100.0 * (r as f64 / 5.0).sin() * (c as f64 / 7.0).cos()).round() as u8
    })
    .unwrap()
}

fn lossless_methods() -> impl Iterator<Item = Method> {
    Method::ALL.into_iter().filter(|m| m.is_lossless())
}

fn roundtrip(image: &Image, codec: &mut AnyCodec) -> Image {
    let container = encode(image, codec).unwrap();
    decode(&container).unwrap()
}

// ── lossless round trips ─────────────────────────────────────────────────

#[test]
fn test_lossless_roundtrip_patterns() {
    for pattern in TestPattern::ALL {
        let image = pattern.generate(33, 47, 5).unwrap();
        for method in lossless_methods() {
            let mut codec = AnyCodec::with_defaults(method);
            assert_eq!(roundtrip(&image, &mut codec), image, "{method} on {pattern}");
        }
    }
}

#[test]
fn test_lossless_roundtrip_rgb_noise() {
    let image = rgb_noise(20, 17, 11);
    for method in lossless_methods() {
        let mut codec = AnyCodec::with_defaults(method);
        assert_eq!(roundtrip(&image, &mut codec), image, "{method} on rgb noise");
    }
}

#[test]
fn test_single_pixel_images() {
    let image = Image::gray(1, 1, vec![200]).unwrap();
    for method in Method::ALL {
        let mut codec = AnyCodec::with_defaults(method);
        let out = roundtrip(&image, &mut codec);
        assert_eq!(out.shape(), image.shape(), "{method}");
        if method.is_lossless() {
            assert_eq!(out, image, "{method}");
        }
    }
}

#[test]
fn test_explicit_single_channel_axis_preserved() {
    let shape = ImageShape::from_dims(&[4, 5, 1]).unwrap();
    let image = Image::new(shape, pseudo_random_bytes(20, 3)).unwrap();
    for method in Method::ALL {
        let mut codec = AnyCodec::with_defaults(method);
        let out = roundtrip(&image, &mut codec);
        assert_eq!(out.shape().dims(), vec![4, 5, 1], "{method}");
    }
}

// ── run-length ───────────────────────────────────────────────────────────

#[test]
fn test_rle_uniform_image_compresses_100x() {
    let image = Image::gray(64, 64, vec![7; 4096]).unwrap();
    let mut codec = RleCodec::default();
    let (payload, _) = codec.compress(&image).unwrap();
    // 16 full runs of 255 plus one of 16.
    assert_eq!(payload.len(), 34);
    assert!(codec.stats().unwrap().compression_ratio >= 100.0);
}

#[test]
fn test_rle_expands_data_without_repeats() {
    let image = Image::from_fn(64, 64, |r, c| ((r * 64 + c) % 256) as u8).unwrap();
    let mut codec = RleCodec::default();
    let (payload, _) = codec.compress(&image).unwrap();
    assert_eq!(payload.len(), 2 * image.len());
    assert!(codec.stats().unwrap().compression_ratio <= 0.5);
}

// ── differential ─────────────────────────────────────────────────────────

#[test]
fn test_gradient_delta_entropy_is_low() {
    let image = Image::from_fn(64, 64, |r, c| ((r * 64 + c) % 256) as u8).unwrap();
    let mut codec = AnyCodec::with_defaults(Method::Differential);
    codec.compress(&image).unwrap();
    let stats = codec.stats().unwrap();
    match stats.detail {
        StatsDetail::Differential {
            differential_entropy,
            entropy_reduction_percent,
            max_difference,
            ..
        } => {
            assert!(differential_entropy < 1.0, "{differential_entropy}");
            assert!(entropy_reduction_percent > 80.0);
            assert_eq!(max_difference, 255);
        }
        ref other => panic!("unexpected detail {other:?}"),
    }
    assert!(stats.entropy > 7.9);
}

#[test]
fn test_symbol_entropy_matches_byte_entropy() {
    let data = pseudo_random_bytes(2048, 9);
    let generic = symbol_entropy(data.iter().copied());
    assert!((generic - entropy(&data)).abs() < 1e-9);
}

// ── auto-selector ────────────────────────────────────────────────────────

#[test]
fn test_selector_few_unique_values_choose_rle() {
    let image = Image::from_fn(64, 64, |r, c| ((r * 3 + c) % 10) as u8 * 25).unwrap();
    let selection = AutoSelector::default().select(&image);
    assert_eq!(selection.method, Method::Rle);
    assert_eq!(selection.profile.unique_values, 10);
}

#[test]
fn test_selector_low_entropy_chooses_differential() {
    // 200 distinct values: four dominant ones share the image evenly and
    // 196 appear once each, which puts the entropy just above 2 bits.
    let dominant = [0u8, 64, 128, 192];
    let singletons: Vec<u8> = (1..=255u8).filter(|v| v % 64 != 0).take(196).collect();
    let mut pixels = singletons.clone();
    pixels.extend((0..256 * 256 - singletons.len()).map(|i| dominant[i % 4]));
    let image = Image::gray(256, 256, pixels).unwrap();
    let selection = AutoSelector::default().select(&image);
    assert_eq!(selection.profile.unique_values, 200);
    assert!(
        (1.95..2.1).contains(&selection.profile.entropy),
        "entropy {}",
        selection.profile.entropy
    );
    assert_eq!(selection.method, Method::Differential);
    assert_eq!(selection.rule, Some(1));
}

#[test]
fn test_selector_narrow_spread_chooses_differential() {
    let image = Image::from_fn(64, 64, |r, c| (100 + (r * 64 + c) % 64) as u8).unwrap();
    let selection = AutoSelector::default().select(&image);
    assert!(selection.profile.entropy >= 3.0);
    assert!(selection.profile.std_dev < 30.0);
    assert_eq!(selection.method, Method::Differential);
    assert_eq!(selection.rule, Some(2));
}

#[test]
fn test_selector_noise_falls_back_to_huffman() {
    let selection = AutoSelector::default().select(&noise(64, 64, 1));
    assert_eq!(selection.method, Method::Huffman);
    assert_eq!(selection.rule, None);
}

// ── lossy codecs ─────────────────────────────────────────────────────────

#[test]
fn test_dct_full_quality_within_one_level() {
    let image = noise(70, 70, 21);
    let mut codec: AnyCodec = DctCodec::new(8, 1.0).unwrap().into();
    let out = roundtrip(&image, &mut codec);
    assert_eq!(out.shape(), image.shape());
    for (a, b) in image.pixels().iter().zip(out.pixels()) {
        assert!((*a as i32 - *b as i32).abs() <= 1, "{a} vs {b}");
    }
}

#[test]
fn test_dct_low_quality_degrades_but_keeps_shape() {
    let image = wave(70, 70);
    let mut high: AnyCodec = DctCodec::new(8, 1.0).unwrap().into();
    let mut low: AnyCodec = DctCodec::new(8, 0.1).unwrap().into();
    let out_high = roundtrip(&image, &mut high);
    let out_low = roundtrip(&image, &mut low);
    assert_eq!(out_low.shape(), image.shape());

    let p_high = psnr(&image, &out_high).unwrap();
    let p_low = psnr(&image, &out_low).unwrap();
    assert!(p_low < p_high, "{p_low} !< {p_high}");
    assert!(high.stats().unwrap().compressed_bytes > low.stats().unwrap().compressed_bytes);
}

#[test]
fn test_dct_rgb_planes() {
    let image = rgb_noise(19, 23, 4);
    let mut codec: AnyCodec = DctCodec::new(4, 1.0).unwrap().into();
    let out = roundtrip(&image, &mut codec);
    assert_eq!(out.shape(), image.shape());
    assert!(psnr(&image, &out).unwrap() > 45.0);
}

#[test]
fn test_sparse_psnr_improves_with_density() {
    let image = wave(64, 64);
    let mut fine: AnyCodec = SparseCodec::new(2).unwrap().into();
    let mut coarse: AnyCodec = SparseCodec::new(8).unwrap().into();
    let p_fine = psnr(&image, &roundtrip(&image, &mut fine)).unwrap();
    let p_coarse = psnr(&image, &roundtrip(&image, &mut coarse)).unwrap();
    assert!(p_fine > p_coarse, "{p_fine} !> {p_coarse}");

    let mut stride_one: AnyCodec = SparseCodec::new(1).unwrap().into();
    assert_eq!(roundtrip(&image, &mut stride_one), image);
}

// ── container ────────────────────────────────────────────────────────────

#[test]
fn test_container_metadata_is_flat_json() {
    let image = TestPattern::Blocks.generate(16, 16, 2).unwrap();
    let mut codec = AnyCodec::with_defaults(Method::Huffman);
    let container = encode(&image, &mut codec).unwrap();

    let len = u32::from_be_bytes(container[..4].try_into().unwrap()) as usize;
    let json: serde_json::Value = serde_json::from_slice(&container[4..4 + len]).unwrap();
    assert_eq!(json["method"], "huffman");
    assert_eq!(json["original_shape"], serde_json::json!([16, 16]));
    assert_eq!(json["original_dtype"], "uint8");
    let book = json["codebook"].as_object().unwrap();
    assert!(book.keys().all(|k| k.parse::<u8>().is_ok()));
    assert!(book.values().all(|v| v.as_str().unwrap().chars().all(|c| c == '0' || c == '1')));
}

#[test]
fn test_container_roundtrip_is_exact() {
    let image = wave(9, 9);
    let mut codec: AnyCodec = DctCodec::new(4, 0.5).unwrap().into();
    let (payload, metadata) = codec.compress(&image).unwrap();
    let blob = serialize(&metadata, &payload).unwrap();
    let parsed = deserialize(&blob).unwrap();
    assert_eq!(parsed.metadata, metadata);
    assert_eq!(parsed.payload, payload.as_slice());
    assert!(matches!(parsed.metadata.params, MethodParams::Dct { block_size: 4, .. }));
}

#[test]
fn test_container_errors() {
    let image = noise(8, 8, 6);
    let mut codec = AnyCodec::with_defaults(Method::Rle);
    let container = encode(&image, &mut codec).unwrap();

    // Truncated inside the metadata block.
    assert!(matches!(decode(&container[..10]), Err(Error::ContainerCorrupt { .. })));
    // Too short for the prefix.
    assert!(matches!(decode(&container[..3]), Err(Error::ContainerCorrupt { .. })));
    // Payload tampered with.
    let mut tampered = container.clone();
    let last = tampered.len() - 1;
    tampered[last] ^= 0x01;
    assert!(matches!(decode(&tampered), Err(Error::ContainerCorrupt { .. })));
}

/// Frame a hand-written metadata block and payload as a container.
fn framed(json: &str, payload: &[u8]) -> Vec<u8> {
    let mut blob = (json.len() as u32).to_be_bytes().to_vec();
    blob.extend_from_slice(json.as_bytes());
    blob.extend_from_slice(payload);
    blob
}

const HUGE_SHAPE: &str = r#""original_shape":[1073741824,1073741824],"original_dtype":"uint8""#;

#[test]
#[cfg(target_pointer_width = "64")]
fn test_huffman_huge_declared_shape_is_rejected() {
    let blob = framed(
        &format!(r#"{{{HUGE_SHAPE},"method":"huffman","codebook":{{"0":"0"}},"bit_count":1}}"#),
        &[0],
    );
    assert!(matches!(decode(&blob), Err(Error::Decode { method: "huffman", .. })));
}

#[test]
#[cfg(target_pointer_width = "64")]
fn test_dct_huge_declared_shape_is_rejected() {
    let blob = framed(
        &format!(
            r#"{{{HUGE_SHAPE},"method":"dct","block_size":8,"quality":0.5,"padded_shape":[1073741824,1073741824],"padding":[0,0],"blocks":[134217728,134217728],"scan":"zigzag"}}"#
        ),
        &[0],
    );
    assert!(matches!(decode(&blob), Err(Error::Decode { method: "dct", .. })));
}

#[test]
#[cfg(target_pointer_width = "64")]
fn test_sparse_huge_declared_shape_is_rejected() {
    // One sample legitimately covers the whole image at this stride; the
    // output buffer itself cannot be allocated.
    let blob = framed(
        &format!(r#"{{{HUGE_SHAPE},"method":"sparse","stride":4294967296,"sample_count":1}}"#),
        &[7],
    );
    assert!(matches!(decode(&blob), Err(Error::ContainerCorrupt { .. })));
}

#[test]
fn test_dct_payload_shorter_than_block_count() {
    let image = wave(16, 16);
    let mut codec: AnyCodec = DctCodec::new(8, 0.5).unwrap().into();
    let (payload, mut metadata) = codec.compress(&image).unwrap();
    metadata.payload_checksum = None;
    // Four blocks need at least four bytes.
    let blob = serialize(&metadata, &payload[..3]).unwrap();
    assert!(matches!(decode(&blob), Err(Error::Decode { method: "dct", .. })));
}

#[test]
fn test_unknown_method_in_container() {
    let json = br#"{"original_shape":[2,2],"original_dtype":"uint8","method":"fractal"}"#;
    let mut blob = (json.len() as u32).to_be_bytes().to_vec();
    blob.extend_from_slice(json);
    blob.extend_from_slice(&[0, 0, 0, 0]);
    assert!(matches!(decode(&blob), Err(Error::UnsupportedMethod(_))));
}

#[test]
fn test_payload_without_checksum_still_decodes() {
    let image = noise(4, 4, 8);
    let mut codec = AnyCodec::with_defaults(Method::Huffman);
    let (payload, mut metadata) = codec.compress(&image).unwrap();
    metadata.payload_checksum = None;
    let blob = serialize(&metadata, &payload).unwrap();
    assert_eq!(decode(&blob).unwrap(), image);
}

#[test]
fn test_metadata_method_mismatch_is_rejected() {
    let image = noise(4, 4, 12);
    let mut rle = AnyCodec::with_defaults(Method::Rle);
    let (payload, metadata) = rle.compress(&image).unwrap();
    let naive = AnyCodec::with_defaults(Method::Naive);
    assert!(matches!(
        naive.reconstruct(&payload, &metadata),
        Err(Error::ContainerCorrupt { .. })
    ));
}
