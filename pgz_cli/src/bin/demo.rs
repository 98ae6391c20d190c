//! PGZ demo
//!
//! Generates a synthetic access-log file, compresses it once as a single
//! gzip stream and once with the parallel block compressor, then restores
//! the container and checks it byte-for-byte against the source.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{ensure, Result};
use flate2::write::GzEncoder;
use flate2::Compression as GzCompression;

use pgz_codecs::GzipCodec;
use pgz_core::{read_header, Compressor, Decompressor, Session};

// ── constants ──────────────────────────────────────────────────────────────

const DEFAULT_RAW_MB: u64 = 64;

const IPS: &[&str] = &[
    "203.0.113.42", "198.51.100.77", "192.0.2.15", "10.10.10.88",
    "172.16.254.1", "203.0.113.99", "198.51.100.3", "192.0.2.200",
];
const METHODS: &[&str] = &["GET", "GET", "GET", "POST", "PUT", "DELETE"];
const PATHS: &[&str] = &[
    "/api/v1/catalog/items?page={page}",
    "/api/v1/orders/{id}/status",
    "/api/v1/users/{id}/profile",
    "/api/v1/cart/items",
    "/static/assets/bundle.js",
    "/health",
];
const STATUSES: &[(u16, u32)] = &[(200, 4821), (200, 1204), (201, 312), (404, 95), (304, 0), (500, 512)];

// ── data generator ──────────────────────────────────────────────────────────

/// Deterministic access-log line for entry `i`.
fn generate_log_line(i: u64) -> Vec<u8> {
    let ip = IPS[(i as usize * 7 + 3) % IPS.len()];
    let method = METHODS[(i as usize * 3 + 1) % METHODS.len()];
    let path = PATHS[(i as usize * 11 + 5) % PATHS.len()]
        .replace("{page}", &((i % 200) + 1).to_string())
        .replace("{id}", &(i * 13 % 9_999_999).to_string());
    let (status, size) = STATUSES[(i as usize * 5 + 2) % STATUSES.len()];
    let ts = 1_740_268_800u64 + (i * 7) % (86400 * 30);
    let (h, m, s) = ((ts / 3600) % 24, (ts / 60) % 60, ts % 60);

    format!("{ip} - - [{h:02}:{m:02}:{s:02}] \"{method} {path} HTTP/1.1\" {status} {size}\n").into_bytes()
}

fn write_corpus(path: &Path, target_bytes: u64) -> Result<u64> {
    let mut out = BufWriter::new(File::create(path)?);
    let mut total = 0u64;
    let mut i = 0u64;
    while total < target_bytes {
        let line = generate_log_line(i);
        total += line.len() as u64;
        out.write_all(&line)?;
        i += 1;
    }
    out.flush()?;
    Ok(total)
}

// ── helpers ─────────────────────────────────────────────────────────────────

fn human_bytes(n: u64) -> String {
    const U: &[&str] = &["B", "KB", "MB", "GB"];
    let mut v = n as f64;
    let mut u = 0;
    while v >= 1024.0 && u < U.len() - 1 { v /= 1024.0; u += 1; }
    if u == 0 { format!("{n} B") } else { format!("{v:.2} {}", U[u]) }
}

fn speedup(slow: Duration, fast: Duration) -> f64 {
    slow.as_secs_f64() / fast.as_secs_f64().max(1e-9)
}

/// Single-stream gzip of the whole file, the baseline the block compressor beats.
fn gzip_single_stream(src: &Path, dst: &Path) -> Result<Duration> {
    let t0 = Instant::now();
    let mut input = BufReader::new(File::open(src)?);
    let mut enc = GzEncoder::new(BufWriter::new(File::create(dst)?), GzCompression::default());
    std::io::copy(&mut input, &mut enc)?;
    enc.finish()?.flush()?;
    Ok(t0.elapsed())
}

fn same_contents(a: &Path, b: &Path) -> Result<bool> {
    let mut a = BufReader::new(File::open(a)?);
    let mut b = BufReader::new(File::open(b)?);
    let (mut buf_a, mut buf_b) = (vec![0u8; 65536], vec![0u8; 65536]);
    loop {
        let n = a.read(&mut buf_a)?;
        if n == 0 {
            return Ok(b.read(&mut buf_b)? == 0);
        }
        b.read_exact(&mut buf_b[..n])?;
        if buf_a[..n] != buf_b[..n] {
            return Ok(false);
        }
    }
}

// ── demo runner ─────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let raw_mb = std::env::args()
        .nth(1)
        .map(|arg| arg.parse::<u64>())
        .transpose()?
        .unwrap_or(DEFAULT_RAW_MB);

    let out_dir = std::env::temp_dir().join("pgz_demo");
    std::fs::create_dir_all(&out_dir)?;
    let corpus = out_dir.join("corpus.log");
    let single = out_dir.join("corpus.log.gz");
    let packed = out_dir.join("corpus.pgz");
    let restored = out_dir.join("corpus.restored.log");

    println!("generating ~{raw_mb} MB of access-log data ...");
    let raw = write_corpus(&corpus, raw_mb * 1024 * 1024)?;

    let single_time = gzip_single_stream(&corpus, &single)?;
    let single_size = std::fs::metadata(&single)?.len();

    let codec = Arc::new(GzipCodec::default());
    let parallel_time = Compressor::new(&corpus, &packed, codec.clone())?.run()?;
    let packed_size = read_header(&packed)?.container_len();

    let restore_time = Decompressor::new(&packed, &restored, codec)?.run()?;
    ensure!(same_contents(&corpus, &restored)?, "restored file differs from the source");

    println!();
    println!("  raw size           : {}", human_bytes(raw));
    println!("  single-stream gzip : {} in {:.2?}", human_bytes(single_size), single_time);
    println!("  parallel blocks    : {} in {:.2?}", human_bytes(packed_size), parallel_time);
    println!("  speedup            : {:.2}x", speedup(single_time, parallel_time));
    println!("  restore            : {:.2?} (verified byte-exact)", restore_time);
    Ok(())
}
