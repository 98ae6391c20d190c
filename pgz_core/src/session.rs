use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::codec::Codec;
use crate::coordinator;
use crate::error::{IoResultExt, PgzError, Result};
use crate::format::DEFAULT_CHUNK_SIZE;
use crate::pipeline::run_pipeline;
use crate::plan::{self, CompressBlock, DecompressBlock};
use crate::policy::{BlockSizePolicy, FanOutPolicy};
use crate::scratch::Scratch;
use crate::worker;

type CompletionHook = Box<dyn FnOnce(Duration) + Send>;

/// Tuning knobs shared by both session kinds.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Upper bound on concurrently running block workers.
    pub workers: usize,
    /// Size of the copy buffer used by workers and the coordinator.
    pub chunk_size: usize,
    /// Directory that receives the per-block scratch files.
    pub scratch_dir: PathBuf,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            scratch_dir: std::env::temp_dir(),
        }
    }
}

impl SessionOptions {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(PgzError::Configuration("worker count must be positive".into()));
        }
        if self.chunk_size == 0 {
            return Err(PgzError::Configuration("chunk size must be positive".into()));
        }
        if !self.scratch_dir.is_dir() {
            return Err(PgzError::Configuration(format!(
                "scratch directory {} does not exist",
                self.scratch_dir.display()
            )));
        }
        Ok(())
    }
}

/// A single compression or decompression run over one source file.
///
/// `run` performs the operation and returns its wall-clock duration.
/// `dispose` deletes every scratch file the run created; it also happens
/// automatically when the session is dropped.
pub trait Session {
    fn run(&mut self) -> Result<Duration>;

    /// Delete all scratch files. Returns how many deletions failed.
    fn dispose(&mut self) -> usize;
}

// ── Compressor ─────────────────────────────────────────────────────────────

/// Compresses a file into a block container on several threads.
pub struct Compressor {
    source: PathBuf,
    destination: PathBuf,
    codec: Arc<dyn Codec>,
    policy: Box<dyn BlockSizePolicy>,
    options: SessionOptions,
    scratch: Scratch,
    on_completed: Option<CompletionHook>,
}

impl Compressor {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>, codec: Arc<dyn Codec>) -> Result<Self> {
        let (source, destination) = check_paths(source.into(), destination.into())?;
        let options = SessionOptions::default();
        Ok(Self {
            source,
            destination,
            codec,
            policy: Box::new(FanOutPolicy::default()),
            scratch: Scratch::new(&options.scratch_dir),
            options,
            on_completed: None,
        })
    }

    pub fn with_policy(mut self, policy: impl BlockSizePolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.scratch.release();
        self.scratch = Scratch::new(&options.scratch_dir);
        self.options = options;
        self
    }

    /// Register a callback fired once, after a successful `run`, with the elapsed time.
    pub fn on_completed(mut self, hook: impl FnOnce(Duration) + Send + 'static) -> Self {
        self.on_completed = Some(Box::new(hook));
        self
    }
}

impl Session for Compressor {
    fn run(&mut self) -> Result<Duration> {
        self.options.validate()?;
        let started = Instant::now();

        let source_len = fs::metadata(&self.source).at(&self.source)?.len();
        let block_size = self.policy.block_size(source_len);
        if block_size == 0 {
            return Err(PgzError::Configuration("block size policy returned 0".into()));
        }
        let spans = plan::plan_compression(source_len, block_size)?;

        info!(
            source = %self.source.display(),
            destination = %self.destination.display(),
            codec = self.codec.name(),
            bytes = source_len,
            block_size,
            blocks = spans.len(),
            "compressing"
        );

        let source = self.source.as_path();
        let destination = self.destination.as_path();
        let codec = self.codec.as_ref();
        let scratch = &self.scratch;
        let chunk_size = self.options.chunk_size;
        let header = run_pipeline(
            &spans,
            self.options.workers,
            |&span| {
                let block = CompressBlock {
                    span,
                    encoded: scratch.allocate()?,
                };
                let encoded_len = worker::compress_block(source, &block, codec, chunk_size)?;
                Ok((block, encoded_len))
            },
            |awaiters| coordinator::write_container(destination, awaiters, chunk_size),
        )?;

        let elapsed = started.elapsed();
        info!(
            blocks = header.block_count(),
            container_bytes = header.container_len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "compression finished"
        );
        if let Some(hook) = self.on_completed.take() {
            hook(elapsed);
        }
        Ok(elapsed)
    }

    fn dispose(&mut self) -> usize {
        self.scratch.release()
    }
}

// ── Decompressor ───────────────────────────────────────────────────────────

/// Restores the original file from a block container on several threads.
pub struct Decompressor {
    source: PathBuf,
    destination: PathBuf,
    codec: Arc<dyn Codec>,
    options: SessionOptions,
    scratch: Scratch,
    on_completed: Option<CompletionHook>,
}

impl Decompressor {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>, codec: Arc<dyn Codec>) -> Result<Self> {
        let (source, destination) = check_paths(source.into(), destination.into())?;
        let options = SessionOptions::default();
        Ok(Self {
            source,
            destination,
            codec,
            scratch: Scratch::new(&options.scratch_dir),
            options,
            on_completed: None,
        })
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.scratch.release();
        self.scratch = Scratch::new(&options.scratch_dir);
        self.options = options;
        self
    }

    /// Register a callback fired once, after a successful `run`, with the elapsed time.
    pub fn on_completed(mut self, hook: impl FnOnce(Duration) + Send + 'static) -> Self {
        self.on_completed = Some(Box::new(hook));
        self
    }
}

impl Session for Decompressor {
    fn run(&mut self) -> Result<Duration> {
        self.options.validate()?;
        let started = Instant::now();

        // Header problems surface here, before any scratch file or thread exists.
        let (header, spans) = plan::plan_decompression(&self.source)?;

        info!(
            source = %self.source.display(),
            destination = %self.destination.display(),
            codec = self.codec.name(),
            container_bytes = header.container_len(),
            blocks = header.block_count(),
            "decompressing"
        );

        let source = self.source.as_path();
        let destination = self.destination.as_path();
        let codec = self.codec.as_ref();
        let scratch = &self.scratch;
        let chunk_size = self.options.chunk_size;
        let restored = run_pipeline(
            &spans,
            self.options.workers,
            |&span| {
                let block = DecompressBlock {
                    span,
                    extracted: scratch.allocate()?,
                    decoded: scratch.allocate()?,
                };
                let decoded_len = worker::decompress_block(source, &block, codec, chunk_size)?;
                Ok((block, decoded_len))
            },
            |awaiters| coordinator::write_plain(destination, awaiters, chunk_size),
        )?;

        let elapsed = started.elapsed();
        info!(
            bytes = restored,
            elapsed_ms = elapsed.as_millis() as u64,
            "decompression finished"
        );
        if let Some(hook) = self.on_completed.take() {
            hook(elapsed);
        }
        Ok(elapsed)
    }

    fn dispose(&mut self) -> usize {
        self.scratch.release()
    }
}

/// Reject a missing source, or a destination that is empty, is a directory,
/// sits in a directory that does not exist, or is the source itself.
fn check_paths(source: PathBuf, destination: PathBuf) -> Result<(PathBuf, PathBuf)> {
    if source.as_os_str().is_empty() {
        return Err(PgzError::Configuration("source path is empty".into()));
    }
    if destination.as_os_str().is_empty() {
        return Err(PgzError::Configuration("destination path is empty".into()));
    }
    if !source.is_file() {
        return Err(PgzError::Configuration(format!(
            "source {} is not a readable file",
            source.display()
        )));
    }
    if destination.is_dir() {
        return Err(PgzError::Configuration(format!(
            "destination {} is a directory",
            destination.display()
        )));
    }
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.is_dir() {
            return Err(PgzError::Configuration(format!(
                "destination directory {} does not exist",
                parent.display()
            )));
        }
    }
    if same_file(&source, &destination) {
        return Err(PgzError::Configuration(format!(
            "destination {} is the source file",
            destination.display()
        )));
    }
    Ok((source, destination))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
