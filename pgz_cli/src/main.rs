use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use pgz_codecs::codec_by_name;
use pgz_core::format::DEFAULT_CHUNK_SIZE;
use pgz_core::plan::spans_from_header;
use pgz_core::policy::DEFAULT_FAN_OUT;
use pgz_core::{read_header, Compressor, Decompressor, FanOutPolicy, FixedBlockSize, Session, SessionOptions};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "pgz",
    about = "Parallel block compression: split a file into blocks and compress them concurrently",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file into a PGZ block container
    Compress {
        /// Source file to compress
        input: PathBuf,
        /// Destination container
        output: PathBuf,
        /// Number of equal blocks to split the source into (plus a tail block)
        #[arg(short, long, default_value_t = DEFAULT_FAN_OUT, conflicts_with = "block_size")]
        threads: u64,
        /// Fixed raw bytes per block, instead of splitting by --threads
        #[arg(short, long)]
        block_size: Option<u64>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Restore the original file from a PGZ block container
    Decompress {
        /// Source container
        input: PathBuf,
        /// Destination file
        output: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Print the container header: block count, offsets and sizes
    Inspect {
        /// Container to inspect
        file: PathBuf,
        /// Print per-block details
        #[arg(long)]
        blocks: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Codec to use: gzip | zstd | lz4 | passthrough (must match on decompress)
    #[arg(short, long, default_value = "gzip")]
    codec: String,
    /// Compression level (gzip 0–9, zstd 1–22)
    #[arg(short, long)]
    level: Option<i32>,
    /// Maximum concurrently running block workers (default: CPU count)
    #[arg(short, long)]
    workers: Option<usize>,
    /// Copy buffer size in bytes
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,
    /// Directory for per-block scratch files (default: system temp dir)
    #[arg(long)]
    temp_dir: Option<PathBuf>,
}

impl RunArgs {
    fn options(&self) -> SessionOptions {
        let mut options = SessionOptions {
            chunk_size: self.chunk_size,
            ..SessionOptions::default()
        };
        if let Some(workers) = self.workers {
            options.workers = workers;
        }
        if let Some(dir) = &self.temp_dir {
            options.scratch_dir = dir.clone();
        }
        options
    }
}

// ── Helpers ────────────────────────────────────────────────────────────────

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

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_compress(
    input: PathBuf,
    output: PathBuf,
    threads: u64,
    block_size: Option<u64>,
    run: RunArgs,
) -> anyhow::Result<()> {
    let codec = codec_by_name(&run.codec, run.level)?;
    let compressor = Compressor::new(&input, &output, codec)
        .with_context(|| format!("preparing to compress {:?}", input))?
        .with_options(run.options())
        .on_completed(|elapsed| println!("Compression completed in {} ms", elapsed.as_millis()));
    let mut compressor = match block_size {
        Some(size) => compressor.with_policy(FixedBlockSize::new(size)?),
        None => compressor.with_policy(FanOutPolicy::new(threads)?),
    };

    compressor
        .run()
        .with_context(|| format!("compressing {:?} into {:?}", input, output))?;

    let raw_size = std::fs::metadata(&input)?.len();
    let header = read_header(&output)?;
    let container_size = header.container_len();
    eprintln!("  codec       : {}", run.codec);
    eprintln!("  blocks      : {}", header.block_count());
    eprintln!("  raw size    : {}", human_bytes(raw_size));
    eprintln!("  compressed  : {}", human_bytes(container_size));
    if container_size > 0 {
        eprintln!("  ratio       : {:.2}x", raw_size as f64 / container_size as f64);
    }
    Ok(())
}

fn run_decompress(input: PathBuf, output: PathBuf, run: RunArgs) -> anyhow::Result<()> {
    let codec = codec_by_name(&run.codec, run.level)?;
    let mut decompressor = Decompressor::new(&input, &output, codec)
        .with_context(|| format!("preparing to decompress {:?}", input))?
        .with_options(run.options())
        .on_completed(|elapsed| println!("Decompression completed in {} ms", elapsed.as_millis()));

    decompressor
        .run()
        .with_context(|| format!("decompressing {:?} into {:?}", input, output))?;

    eprintln!("  raw size    : {}", human_bytes(std::fs::metadata(&output)?.len()));
    Ok(())
}

fn run_inspect(file: PathBuf, show_blocks: bool) -> anyhow::Result<()> {
    let header = read_header(&file).with_context(|| format!("reading header of {:?}", file))?;

    println!("=== PGZ container: {:?} ===", file);
    println!();
    println!("  block count    : {}", header.block_count());
    println!("  header         : {}", human_bytes(header.encoded_len()));
    println!("  payload        : {}", human_bytes(header.payload_len()));
    println!("  file on disk   : {}", human_bytes(header.container_len()));

    if show_blocks {
        println!();
        println!("  {:>8}  {:>14}  {:>14}", "block", "file offset", "compressed");
        println!("  {}", "-".repeat(40));
        for span in spans_from_header(&header) {
            println!(
                "  {:>8}  {:>14}  {:>14}",
                span.sequence,
                span.start_offset,
                human_bytes(span.len)
            );
        }
    }

    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Compress {
            input,
            output,
            threads,
            block_size,
            run,
        } => {
            info!(mode = "compress", "starting");
            run_compress(input, output, threads, block_size, run)
        }
        Commands::Decompress { input, output, run } => {
            info!(mode = "decompress", "starting");
            run_decompress(input, output, run)
        }
        Commands::Inspect { file, blocks } => run_inspect(file, blocks),
    }
}
