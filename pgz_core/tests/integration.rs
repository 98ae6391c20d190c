/// Integration tests: compress real files through the parallel sessions,
/// then check the container layout and the restored bytes.
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use pgz_codecs::{GzipCodec, Lz4Codec, PassThroughCodec, ZstdCodec};
use pgz_core::{
    read_header, BlockEncoder, Codec, Compressor, Decompressor, FixedBlockSize, PgzError, Session,
    SessionOptions,
};
use tempfile::TempDir;

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

/// Generate `len` highly compressible bytes (repeating pattern).
fn compressible_bytes(len: usize) -> Vec<u8> {
    let pattern = b"the quick brown fox jumps over the lazy dog. ";
    (0..len).map(|i| pattern[i % pattern.len()]).collect()
}

// ── helpers ───────────────────────────────────────────────────────────────

/// Working directory with a separate scratch dir, so leftovers can be counted.
struct Workspace {
    root: TempDir,
    scratch: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            root: TempDir::new().unwrap(),
            scratch: TempDir::new().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    fn write(&self, name: &str, data: &[u8]) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, data).unwrap();
        path
    }

    fn options(&self) -> SessionOptions {
        SessionOptions {
            workers: 4,
            // Small chunks exercise the copy loops on modest inputs.
            chunk_size: 1000,
            scratch_dir: self.scratch.path().to_path_buf(),
        }
    }

    fn scratch_leftovers(&self) -> usize {
        fs::read_dir(self.scratch.path()).unwrap().count()
    }

    fn compress(&self, src: &Path, dst: &Path, codec: Arc<dyn Codec>, block_size: u64) {
        let mut c = Compressor::new(src, dst, codec)
            .unwrap()
            .with_policy(FixedBlockSize::new(block_size).unwrap())
            .with_options(self.options());
        c.run().unwrap();
    }

    fn decompress(&self, src: &Path, dst: &Path, codec: Arc<dyn Codec>) {
        let mut d = Decompressor::new(src, dst, codec).unwrap().with_options(self.options());
        d.run().unwrap();
    }

    fn roundtrip(&self, data: &[u8], codec: Arc<dyn Codec>, block_size: u64) -> Vec<u8> {
        let src = self.write("source.bin", data);
        let packed = self.path("source.pgz");
        let restored = self.path("restored.bin");
        self.compress(&src, &packed, codec.clone(), block_size);
        self.decompress(&packed, &restored, codec);
        fs::read(restored).unwrap()
    }
}

fn gzip() -> Arc<dyn Codec> {
    Arc::new(GzipCodec::default())
}

// ── tests ──────────────────────────────────────────────────────────────────

#[test]
fn test_roundtrip_every_codec() {
    let data = compressible_bytes(50_000);
    let codecs: Vec<Arc<dyn Codec>> = vec![
        gzip(),
        Arc::new(ZstdCodec::default()),
        Arc::new(Lz4Codec),
        Arc::new(PassThroughCodec),
    ];
    for codec in codecs {
        let ws = Workspace::new();
        let name = codec.name();
        assert_eq!(ws.roundtrip(&data, codec, 7_000), data, "{name} round-trip should be byte-exact");
    }
}

#[test]
fn test_roundtrip_incompressible_data() {
    let ws = Workspace::new();
    let data = pseudo_random_bytes(123_457, 0xDEAD_BEEF);
    assert_eq!(ws.roundtrip(&data, gzip(), 10_000), data);
}

#[test]
fn test_empty_source_makes_one_empty_block() {
    let ws = Workspace::new();
    let src = ws.write("empty.bin", &[]);
    let packed = ws.path("empty.pgz");
    ws.compress(&src, &packed, Arc::new(PassThroughCodec), 64);

    let header = read_header(&packed).unwrap();
    assert_eq!(header.sizes, vec![0]);
    assert_eq!(fs::metadata(&packed).unwrap().len(), 4 + 8);

    let restored = ws.path("empty.out");
    ws.decompress(&packed, &restored, Arc::new(PassThroughCodec));
    assert_eq!(fs::metadata(&restored).unwrap().len(), 0);

    // A real codec still encodes the empty block into a valid stream.
    assert_eq!(ws.roundtrip(&[], gzip(), 64), Vec::<u8>::new());
}

#[test]
fn test_exact_multiple_adds_empty_tail_block() {
    let ws = Workspace::new();
    let block_size = 4096;
    let src = ws.write("four.bin", &compressible_bytes(4 * block_size as usize));
    let packed = ws.path("four.pgz");
    ws.compress(&src, &packed, Arc::new(PassThroughCodec), block_size);

    let header = read_header(&packed).unwrap();
    assert_eq!(header.sizes, vec![block_size, block_size, block_size, block_size, 0]);
}

#[test]
fn test_one_byte_tail_block_roundtrips() {
    let ws = Workspace::new();
    let block_size = 5000u64;
    let data = pseudo_random_bytes(block_size as usize + 1, 7);
    let src = ws.write("tail.bin", &data);
    let packed = ws.path("tail.pgz");
    ws.compress(&src, &packed, gzip(), block_size);
    assert_eq!(read_header(&packed).unwrap().block_count(), 2);

    let restored = ws.path("tail.out");
    ws.decompress(&packed, &restored, gzip());
    assert_eq!(fs::read(restored).unwrap(), data);
}

#[test]
fn test_header_matches_container_length() {
    let ws = Workspace::new();
    let src = ws.write("doc.txt", &compressible_bytes(200_000));
    let packed = ws.path("doc.pgz");
    ws.compress(&src, &packed, gzip(), 30_000);

    let header = read_header(&packed).unwrap();
    assert_eq!(header.block_count(), 7);
    assert_eq!(header.container_len(), fs::metadata(&packed).unwrap().len());
    assert!(header.payload_len() < 200_000, "compressible input should shrink");
}

#[test]
fn test_default_policy_bounds_fan_out() {
    let ws = Workspace::new();
    let src = ws.write("default.bin", &compressible_bytes(1_000_003));
    let packed = ws.path("default.pgz");
    let mut c = Compressor::new(&src, &packed, gzip()).unwrap().with_options(ws.options());
    c.run().unwrap();

    let count = read_header(&packed).unwrap().block_count();
    assert!((1..=5).contains(&count), "fan-out of 4 gives at most 5 blocks, got {count}");
}

/// Wraps gzip and stalls each new encoder less than the one before, so the
/// earliest blocks finish last.
struct SlowStartCodec {
    calls: AtomicU64,
}

impl Codec for SlowStartCodec {
    fn name(&self) -> &'static str {
        "slow-gzip"
    }

    fn encoder<'a>(&self, sink: Box<dyn Write + 'a>) -> io::Result<Box<dyn BlockEncoder + 'a>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(60u64.saturating_sub(n * 15)));
        GzipCodec::default().encoder(sink)
    }

    fn decoder<'a>(&self, source: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>> {
        GzipCodec::default().decoder(source)
    }
}

#[test]
fn test_output_independent_of_completion_order() {
    let ws = Workspace::new();
    let data = pseudo_random_bytes(40_000, 99);
    let src = ws.write("order.bin", &data);

    let fast = ws.path("fast.pgz");
    ws.compress(&src, &fast, gzip(), 5_000);

    let slow = ws.path("slow.pgz");
    let slow_codec = Arc::new(SlowStartCodec {
        calls: AtomicU64::new(0),
    });
    ws.compress(&src, &slow, slow_codec, 5_000);

    assert_eq!(fs::read(&fast).unwrap(), fs::read(&slow).unwrap());
}

#[test]
fn test_decompression_is_idempotent() {
    let ws = Workspace::new();
    let src = ws.write("idem.bin", &compressible_bytes(77_777));
    let packed = ws.path("idem.pgz");
    ws.compress(&src, &packed, gzip(), 10_000);

    let first = ws.path("first.out");
    let second = ws.path("second.out");
    ws.decompress(&packed, &first, gzip());
    ws.decompress(&packed, &second, gzip());
    assert_eq!(fs::read(first).unwrap(), fs::read(second).unwrap());
}

#[test]
fn test_truncated_container_is_malformed() {
    let ws = Workspace::new();
    let src = ws.write("trunc.bin", &compressible_bytes(10_000));
    let packed = ws.path("trunc.pgz");
    ws.compress(&src, &packed, gzip(), 1_000);

    let bytes = fs::read(&packed).unwrap();
    fs::write(&packed, &bytes[..2]).unwrap();

    let restored = ws.path("trunc.out");
    let mut d = Decompressor::new(&packed, &restored, gzip())
        .unwrap()
        .with_options(ws.options());
    let err = d.run().unwrap_err();
    assert!(matches!(err, PgzError::MalformedContainer(_)), "got: {err}");
    assert!(!restored.exists(), "nothing should be written for a malformed container");
    assert_eq!(ws.scratch_leftovers(), 0);
}

#[test]
fn test_scratch_files_removed_after_success() {
    let ws = Workspace::new();
    let src = ws.write("clean.bin", &compressible_bytes(30_000));
    let packed = ws.path("clean.pgz");
    let restored = ws.path("clean.out");

    let mut c = Compressor::new(&src, &packed, gzip())
        .unwrap()
        .with_policy(FixedBlockSize::new(4_000).unwrap())
        .with_options(ws.options());
    c.run().unwrap();
    assert_eq!(ws.scratch_leftovers(), 8, "one scratch file per block until disposal");
    assert_eq!(c.dispose(), 0);
    assert_eq!(ws.scratch_leftovers(), 0);

    {
        let mut d = Decompressor::new(&packed, &restored, gzip())
            .unwrap()
            .with_options(ws.options());
        d.run().unwrap();
        assert_eq!(ws.scratch_leftovers(), 16, "two scratch files per block until disposal");
    }
    assert_eq!(ws.scratch_leftovers(), 0, "dropping the session disposes it");
}

/// Gzip that refuses to open any encoder after the first `healthy` ones.
struct FailingCodec {
    healthy: u64,
    calls: AtomicU64,
}

impl Codec for FailingCodec {
    fn name(&self) -> &'static str {
        "failing-gzip"
    }

    fn encoder<'a>(&self, sink: Box<dyn Write + 'a>) -> io::Result<Box<dyn BlockEncoder + 'a>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.healthy {
            return Err(io::Error::other("encoder unavailable"));
        }
        GzipCodec::default().encoder(sink)
    }

    fn decoder<'a>(&self, source: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>> {
        GzipCodec::default().decoder(source)
    }
}

#[test]
fn test_scratch_files_removed_after_failure() {
    let ws = Workspace::new();
    let src = ws.write("fail.bin", &compressible_bytes(30_000));
    let packed = ws.path("fail.pgz");
    let codec = Arc::new(FailingCodec {
        healthy: 3,
        calls: AtomicU64::new(0),
    });

    let mut c = Compressor::new(&src, &packed, codec)
        .unwrap()
        .with_policy(FixedBlockSize::new(2_000).unwrap())
        .with_options(ws.options());
    let err = c.run().unwrap_err();
    assert!(matches!(err, PgzError::Io { ref source, .. } if source.to_string() == "encoder unavailable"), "got: {err}");
    assert!(ws.scratch_leftovers() > 0, "blocks that ran keep their files until disposal");

    drop(c);
    assert_eq!(ws.scratch_leftovers(), 0);
}

#[test]
fn test_unusable_destination_is_a_configuration_error() {
    let ws = Workspace::new();
    let src = ws.write("dest.bin", b"data");

    let in_missing_dir = Compressor::new(&src, ws.path("missing-dir").join("out.pgz"), gzip());
    assert!(matches!(in_missing_dir, Err(PgzError::Configuration(ref msg)) if msg.contains("does not exist")));

    let is_dir = Compressor::new(&src, ws.scratch.path(), gzip());
    assert!(matches!(is_dir, Err(PgzError::Configuration(ref msg)) if msg.contains("is a directory")));

    let packed = ws.path("dest.pgz");
    ws.compress(&src, &packed, gzip(), 64);
    let restore_into_dir = Decompressor::new(&packed, ws.root.path(), gzip());
    assert!(matches!(restore_into_dir, Err(PgzError::Configuration(_))));
    assert_eq!(ws.scratch_leftovers(), 0);
}

#[test]
fn test_block_count_overflow_is_rejected_before_planning() {
    let ws = Workspace::new();
    let src = ws.path("sparse.bin");
    // Sparse: no data blocks are written.
    fs::File::create(&src).unwrap().set_len(3 << 30).unwrap();
    let packed = ws.path("sparse.pgz");

    let mut c = Compressor::new(&src, &packed, gzip())
        .unwrap()
        .with_policy(FixedBlockSize::new(1).unwrap())
        .with_options(ws.options());
    let err = c.run().unwrap_err();
    assert!(matches!(err, PgzError::Configuration(ref msg) if msg.contains("block count limit")), "got: {err}");
    assert!(!packed.exists());
    assert_eq!(ws.scratch_leftovers(), 0);
}

#[test]
fn test_failed_decompression_skips_scratch_for_unstarted_blocks() {
    let ws = Workspace::new();
    // One undecodable block followed by many empty ones.
    let empty_blocks = 1_000;
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&(empty_blocks as i32 + 1).to_le_bytes());
    bytes.extend_from_slice(&3i64.to_le_bytes());
    for _ in 0..empty_blocks {
        bytes.extend_from_slice(&0i64.to_le_bytes());
    }
    bytes.extend_from_slice(b"xyz");
    let packed = ws.write("hollow.pgz", &bytes);

    let mut options = ws.options();
    options.workers = 1;
    let mut d = Decompressor::new(&packed, ws.path("hollow.out"), gzip())
        .unwrap()
        .with_options(options);
    let err = d.run().unwrap_err();
    assert!(matches!(err, PgzError::Io { .. }), "got: {err}");
    assert_eq!(ws.scratch_leftovers(), 2, "only the failed block allocated scratch files");

    assert_eq!(d.dispose(), 0);
    assert_eq!(ws.scratch_leftovers(), 0);
}

#[test]
fn test_completion_hook_fires_once_with_duration() {
    let ws = Workspace::new();
    let src = ws.write("hook.bin", &compressible_bytes(10_000));
    let packed = ws.path("hook.pgz");

    let seen: Arc<Mutex<Vec<Duration>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let mut c = Compressor::new(&src, &packed, gzip())
        .unwrap()
        .with_options(ws.options())
        .on_completed(move |elapsed| sink.lock().unwrap().push(elapsed));
    let elapsed = c.run().unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![elapsed]);
}

#[test]
fn test_configuration_errors_surface_before_work() {
    let ws = Workspace::new();
    let src = ws.write("cfg.bin", b"data");

    let missing = Compressor::new(ws.path("nope.bin"), ws.path("out.pgz"), gzip());
    assert!(matches!(missing, Err(PgzError::Configuration(_))));

    let same = Compressor::new(&src, &src, gzip());
    assert!(matches!(same, Err(PgzError::Configuration(_))));

    let mut options = ws.options();
    options.workers = 0;
    let mut c = Compressor::new(&src, ws.path("out.pgz"), gzip())
        .unwrap()
        .with_options(options);
    assert!(matches!(c.run(), Err(PgzError::Configuration(_))));
    assert!(!ws.path("out.pgz").exists());
}

#[test]
fn test_wrong_codec_fails_decompression() {
    let ws = Workspace::new();
    let src = ws.write("mix.bin", &compressible_bytes(20_000));
    let packed = ws.path("mix.pgz");
    ws.compress(&src, &packed, Arc::new(ZstdCodec::default()), 5_000);

    let mut d = Decompressor::new(&packed, ws.path("mix.out"), gzip())
        .unwrap()
        .with_options(ws.options());
    assert!(matches!(d.run(), Err(PgzError::Io { .. })));
    drop(d);
    assert_eq!(ws.scratch_leftovers(), 0);
}
