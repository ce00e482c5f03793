use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use flate2::write::GzEncoder;
use flate2::Compression as GzCompression;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use infocodec_codecs::{decode, AnyCodec, DctCodec, SparseCodec};
use infocodec_core::format::{DEFAULT_BLOCK_SIZE, DEFAULT_QUALITY, DEFAULT_SAMPLING_STRIDE};
use infocodec_core::metrics::QualityReport;
use infocodec_core::{deserialize, serialize, AutoSelector, Codec, Image, ImageShape, Method};

/// Extension given to containers when no output path is supplied.
const CONTAINER_EXT: &str = "icf";

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "infocodec",
    about = "Information-theoretic image codecs: encode, decode, inspect, benchmark and analyze",
    version
)]
struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress an image into a container
    Encode {
        /// Source image (PNG, JPEG, BMP, TIFF, GIF, WebP)
        input: PathBuf,
        /// Destination container (default: input with .icf extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Method name, alias, or "auto" to pick from image statistics
        #[arg(short, long, default_value = "auto")]
        method: String,
        /// DCT quality in [0, 1]
        #[arg(short, long)]
        quality: Option<f64>,
        /// DCT block edge (2–32)
        #[arg(long)]
        block_size: Option<usize>,
        /// Sparse sampling stride (≥ 1)
        #[arg(long)]
        stride: Option<usize>,
        /// Also write the metadata as pretty JSON next to the container
        #[arg(long)]
        metadata: bool,
    },
    /// Reconstruct an image from a container
    Decode {
        /// Source container
        input: PathBuf,
        /// Destination image (default: input with .png extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print container metadata and sizes
    Inspect {
        /// Container to inspect
        file: PathBuf,
    },
    /// Run every method (in parallel) against one image
    Benchmark {
        /// Source image
        input: PathBuf,
        /// Comma-separated method list, or "all"
        #[arg(short, long, default_value = "all")]
        methods: String,
        /// Report format
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Table)]
        format: ReportFormat,
        /// Directory to write each container and the JSON results into
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Compare an original image against a container's reconstruction
    Analyze {
        /// Original image
        original: PathBuf,
        /// Container produced from it
        container: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Table,
    Json,
    Markdown,
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn fmt_db(psnr: f64) -> String {
    if psnr.is_infinite() {
        "inf".to_string()
    } else {
        format!("{psnr:.2}")
    }
}

/// Load an image file. Grayscale stays 2-D; anything with color becomes RGB.
fn load_image(path: &Path) -> anyhow::Result<Image> {
    let decoded = image::open(path).with_context(|| format!("opening image {:?}", path))?;
    let img = if decoded.color().has_color() {
        let rgb = decoded.to_rgb8();
        let (w, h) = rgb.dimensions();
        Image::rgb(h as usize, w as usize, rgb.into_raw())?
    } else {
        let luma = decoded.to_luma8();
        let (w, h) = luma.dimensions();
        Image::gray(h as usize, w as usize, luma.into_raw())?
    };
    debug!(path = ?path, shape = ?img.shape().dims(), "image loaded");
    Ok(img)
}

fn save_image(img: &Image, path: &Path) -> anyhow::Result<()> {
    let (w, h) = (img.width() as u32, img.height() as u32);
    let pixels = img.pixels().to_vec();
    let saved = match img.channels() {
        1 => image::GrayImage::from_raw(w, h, pixels)
            .context("buffer does not fit a grayscale image")?
            .save(path),
        _ => image::RgbImage::from_raw(w, h, pixels)
            .context("buffer does not fit an RGB image")?
            .save(path),
    };
    saved.with_context(|| format!("writing image {:?}", path))
}

/// Build the codec for `method`, applying any parameter overrides.
fn build_codec(
    method: Method,
    quality: Option<f64>,
    block_size: Option<usize>,
    stride: Option<usize>,
) -> anyhow::Result<AnyCodec> {
    Ok(match method {
        Method::Sparse => SparseCodec::new(stride.unwrap_or(DEFAULT_SAMPLING_STRIDE))?.into(),
        Method::Dct => DctCodec::new(
            block_size.unwrap_or(DEFAULT_BLOCK_SIZE),
            quality.unwrap_or(DEFAULT_QUALITY),
        )?
        .into(),
        other => AnyCodec::with_defaults(other),
    })
}

fn parse_methods(list: &str) -> anyhow::Result<Vec<Method>> {
    if list.trim().eq_ignore_ascii_case("all") {
        return Ok(Method::ALL.to_vec());
    }
    list.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<Method>().map_err(anyhow::Error::from))
        .collect()
}

// ── Subcommand implementations ─────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn run_encode(
    input: PathBuf,
    output: Option<PathBuf>,
    method: &str,
    quality: Option<f64>,
    block_size: Option<usize>,
    stride: Option<usize>,
    write_metadata: bool,
) -> anyhow::Result<()> {
    let image = load_image(&input)?;
    let output = output.unwrap_or_else(|| input.with_extension(CONTAINER_EXT));

    let method = if method.eq_ignore_ascii_case("auto") {
        let selection = AutoSelector::default().select(&image);
        info!(
            method = %selection.method,
            unique = selection.profile.unique_values,
            entropy = selection.profile.entropy,
            std_dev = selection.profile.std_dev,
            rule = ?selection.rule,
            "auto-selected method"
        );
        selection.method
    } else {
        method.parse::<Method>()?
    };
    let mut codec = build_codec(method, quality, block_size, stride)?;

    let t0 = Instant::now();
    let (payload, metadata) = codec.compress(&image)?;
    let container = serialize(&metadata, &payload)?;
    let elapsed = t0.elapsed();

    std::fs::write(&output, &container)
        .with_context(|| format!("writing container {:?}", output))?;
    if write_metadata {
        let sidecar = output.with_extension("json");
        let json = serde_json::to_string_pretty(&metadata)?;
        std::fs::write(&sidecar, json).with_context(|| format!("writing metadata {:?}", sidecar))?;
        eprintln!("  metadata    : {:?}", sidecar);
    }

    eprintln!("  method      : {}", codec.name());
    eprintln!("  shape       : {:?}", image.shape().dims());
    eprintln!("  raw size    : {}", human_bytes(image.byte_size() as u64));
    eprintln!("  container   : {}", human_bytes(container.len() as u64));
    if let Some(stats) = codec.stats() {
        eprintln!("  entropy     : {:.3} bits/symbol", stats.entropy);
        eprintln!("  ratio       : {:.2}x (payload)", stats.compression_ratio);
        eprintln!("  bits/pixel  : {:.3}", stats.bits_per_pixel);
    }
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    eprintln!("  written to  : {:?}", output);
    Ok(())
}

fn run_decode(input: PathBuf, output: Option<PathBuf>) -> anyhow::Result<()> {
    let bytes = std::fs::read(&input).with_context(|| format!("reading container {:?}", input))?;
    let output = output.unwrap_or_else(|| input.with_extension("png"));

    let t0 = Instant::now();
    let image = decode(&bytes)?;
    let elapsed = t0.elapsed();
    save_image(&image, &output)?;

    eprintln!("  shape       : {:?}", image.shape().dims());
    eprintln!("  raw size    : {}", human_bytes(image.byte_size() as u64));
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    eprintln!("  written to  : {:?}", output);
    Ok(())
}

fn run_inspect(file: PathBuf) -> anyhow::Result<()> {
    let bytes = std::fs::read(&file).with_context(|| format!("reading container {:?}", file))?;
    let container = deserialize(&bytes)?;
    let shape: ImageShape = container.metadata.shape()?;

    println!("=== Container: {:?} ===", file);
    println!();
    println!("  method         : {}", container.metadata.method());
    println!("  lossless       : {}", container.metadata.method().is_lossless());
    println!("  shape          : {:?}", shape.dims());
    println!("  dtype          : {}", container.metadata.original_dtype);
    println!("  raw size       : {}", human_bytes(shape.len() as u64));
    println!("  metadata       : {}", human_bytes(container.metadata_len as u64));
    println!("  payload        : {}", human_bytes(container.payload.len() as u64));
    println!("  container      : {}", human_bytes(container.total_len() as u64));
    println!(
        "  ratio          : {:.2}x",
        shape.len() as f64 / container.total_len() as f64
    );
    match container.metadata.payload_checksum {
        Some(sum) => println!("  checksum       : {sum:016x} (verified)"),
        None => println!("  checksum       : none"),
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&container.metadata.params)?);
    Ok(())
}

/// One benchmark row: a bundled method or a reference general-purpose coder.
#[derive(Debug, Serialize)]
struct BenchRow {
    name: String,
    lossless: bool,
    compressed_bytes: usize,
    compression_ratio: f64,
    bits_per_pixel: f64,
    psnr_db: f64,
    ssim: f64,
    encode_ms: f64,
    decode_ms: f64,
}

fn bench_method(image: &Image, method: Method) -> anyhow::Result<(BenchRow, Vec<u8>)> {
    let mut codec = AnyCodec::with_defaults(method);
    let t0 = Instant::now();
    let (payload, metadata) = codec.compress(image)?;
    let container = serialize(&metadata, &payload)?;
    let encode_ms = t0.elapsed().as_secs_f64() * 1000.0;

    let t1 = Instant::now();
    let reconstructed = decode(&container)?;
    let decode_ms = t1.elapsed().as_secs_f64() * 1000.0;

    let report = QualityReport::compute(image, &reconstructed, image.byte_size(), container.len())?;
    debug!(%method, bytes = container.len(), psnr = report.psnr_db, "benchmarked");
    Ok((
        BenchRow {
            name: method.to_string(),
            lossless: method.is_lossless(),
            compressed_bytes: container.len(),
            compression_ratio: report.compression_ratio,
            bits_per_pixel: report.bits_per_pixel,
            psnr_db: report.psnr_db,
            ssim: report.ssim,
            encode_ms,
            decode_ms,
        },
        container,
    ))
}

/// General-purpose coders over the raw pixel bytes, for comparison.
fn bench_reference(image: &Image, name: &str) -> anyhow::Result<BenchRow> {
    let raw = image.pixels();
    let t0 = Instant::now();
    let compressed = match name {
        "zstd" => zstd::bulk::compress(raw, 3)?,
        "gzip" => {
            let mut enc = GzEncoder::new(Vec::new(), GzCompression::default());
            enc.write_all(raw)?;
            enc.finish()?
        }
        _ => lz4_flex::compress_prepend_size(raw),
    };
    let encode_ms = t0.elapsed().as_secs_f64() * 1000.0;

    let t1 = Instant::now();
    let restored = match name {
        "zstd" => zstd::decode_all(compressed.as_slice())?,
        "gzip" => {
            use std::io::Read;
            let mut out = Vec::with_capacity(raw.len());
            flate2::read::GzDecoder::new(compressed.as_slice()).read_to_end(&mut out)?;
            out
        }
        _ => lz4_flex::decompress_size_prepended(&compressed)?,
    };
    let decode_ms = t1.elapsed().as_secs_f64() * 1000.0;
    anyhow::ensure!(restored == raw, "{name} reference round trip differs");

    Ok(BenchRow {
        name: format!("{name} (ref)"),
        lossless: true,
        compressed_bytes: compressed.len(),
        compression_ratio: raw.len() as f64 / compressed.len().max(1) as f64,
        bits_per_pixel: compressed.len() as f64 * 8.0 / raw.len() as f64,
        psnr_db: f64::INFINITY,
        ssim: 1.0,
        encode_ms,
        decode_ms,
    })
}

fn print_table(rows: &[BenchRow], markdown: bool) {
    if markdown {
        println!("| Method | Lossless | Size | Ratio | BPP | PSNR (dB) | SSIM | Encode (ms) | Decode (ms) |");
        println!("|---|---|---:|---:|---:|---:|---:|---:|---:|");
        for r in rows {
            println!(
                "| {} | {} | {} | {:.2} | {:.3} | {} | {:.4} | {:.2} | {:.2} |",
                r.name,
                if r.lossless { "yes" } else { "no" },
                r.compressed_bytes,
                r.compression_ratio,
                r.bits_per_pixel,
                fmt_db(r.psnr_db),
                r.ssim,
                r.encode_ms,
                r.decode_ms
            );
        }
        return;
    }
    println!(
        "  {:<14} {:>12}  {:>8}  {:>7}  {:>9}  {:>7}  {:>10}  {:>10}",
        "Method", "Size", "Ratio", "BPP", "PSNR", "SSIM", "Encode", "Decode"
    );
    println!("  {}", "─".repeat(90));
    for r in rows {
        println!(
            "  {:<14} {:>12}  {:>7.2}x  {:>7.3}  {:>9}  {:>7.4}  {:>8.2}ms  {:>8.2}ms",
            r.name,
            human_bytes(r.compressed_bytes as u64),
            r.compression_ratio,
            r.bits_per_pixel,
            fmt_db(r.psnr_db),
            r.ssim,
            r.encode_ms,
            r.decode_ms
        );
    }
}

fn run_benchmark(
    input: PathBuf,
    methods: &str,
    format: ReportFormat,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let image = load_image(&input)?;
    let methods = parse_methods(methods)?;
    anyhow::ensure!(!methods.is_empty(), "no methods selected");
    info!(count = methods.len(), shape = ?image.shape().dims(), "benchmarking");

    let results: Vec<(BenchRow, Vec<u8>)> = methods
        .par_iter()
        .map(|&m| bench_method(&image, m).with_context(|| format!("benchmarking {m}")))
        .collect::<anyhow::Result<_>>()?;
    let references: Vec<BenchRow> = ["zstd", "gzip", "lz4"]
        .par_iter()
        .map(|name| bench_reference(&image, name))
        .collect::<anyhow::Result<_>>()?;

    if let Some(dir) = &output {
        std::fs::create_dir_all(dir).with_context(|| format!("creating directory {:?}", dir))?;
        for (row, container) in &results {
            let path = dir.join(format!("{}.{CONTAINER_EXT}", row.name));
            std::fs::write(&path, container).with_context(|| format!("writing {:?}", path))?;
        }
    }

    let mut rows: Vec<BenchRow> = results.into_iter().map(|(row, _)| row).collect();
    rows.extend(references);

    if let Some(dir) = &output {
        let path = dir.join("benchmark.json");
        std::fs::write(&path, serde_json::to_string_pretty(&rows)?)
            .with_context(|| format!("writing {:?}", path))?;
        eprintln!("  results written to {:?}", dir);
    }

    match format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        ReportFormat::Markdown => print_table(&rows, true),
        ReportFormat::Table => {
            println!();
            println!("=== Benchmark: {:?} ({}) ===", input, human_bytes(image.byte_size() as u64));
            println!();
            print_table(&rows, false);
            if let Some(best) = rows
                .iter()
                .filter(|r| r.lossless && !r.name.ends_with("(ref)"))
                .max_by(|a, b| a.compression_ratio.total_cmp(&b.compression_ratio))
            {
                println!();
                println!("  best lossless : {} ({:.2}x)", best.name, best.compression_ratio);
            }
        }
    }
    Ok(())
}

fn run_analyze(original: PathBuf, container: PathBuf, json: bool) -> anyhow::Result<()> {
    let image = load_image(&original)?;
    let bytes =
        std::fs::read(&container).with_context(|| format!("reading container {:?}", container))?;
    let reconstructed = decode(&bytes)?;
    let report = QualityReport::compute(&image, &reconstructed, image.byte_size(), bytes.len())?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Encode {
            input,
            output,
            method,
            quality,
            block_size,
            stride,
            metadata,
        } => run_encode(input, output, &method, quality, block_size, stride, metadata),
        Commands::Decode { input, output } => run_decode(input, output),
        Commands::Inspect { file } => run_inspect(file),
        Commands::Benchmark {
            input,
            methods,
            format,
            output,
        } => run_benchmark(input, &methods, format, output),
        Commands::Analyze {
            original,
            container,
            json,
        } => run_analyze(original, container, json),
    };

    if let Err(err) = &result {
        if let Some(engine) = err.downcast_ref::<infocodec_core::Error>() {
            error!(category = engine.category(), "{engine}");
        }
    }
    result
}
