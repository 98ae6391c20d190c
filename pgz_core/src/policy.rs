use crate::error::{PgzError, Result};

/// Default fan-out of [`FanOutPolicy`].
pub const DEFAULT_FAN_OUT: u64 = 4;

/// Decides how many source bytes one compression block covers.
///
/// Implementations must return a strictly positive size for every input,
/// including `source_len == 0`; a zero block size would never finish
/// partitioning.
pub trait BlockSizePolicy: Send + Sync {
    fn block_size(&self, source_len: u64) -> u64;
}

/// Splits the source into `threads` equal blocks plus a remainder block.
///
/// `source_len / threads + 1` bounds the plan to at most `threads` full
/// blocks and one tail, whatever the file size.
#[derive(Debug, Clone, Copy)]
pub struct FanOutPolicy {
    threads: u64,
}

impl FanOutPolicy {
    pub fn new(threads: u64) -> Result<Self> {
        if threads == 0 {
            return Err(PgzError::Configuration("fan-out thread count must be positive".into()));
        }
        Ok(Self { threads })
    }

    pub fn threads(&self) -> u64 {
        self.threads
    }
}

impl Default for FanOutPolicy {
    fn default() -> Self {
        Self {
            threads: DEFAULT_FAN_OUT,
        }
    }
}

impl BlockSizePolicy for FanOutPolicy {
    fn block_size(&self, source_len: u64) -> u64 {
        source_len / self.threads + 1
    }
}

/// Same block size regardless of the source length.
#[derive(Debug, Clone, Copy)]
pub struct FixedBlockSize(u64);

impl FixedBlockSize {
    pub fn new(size: u64) -> Result<Self> {
        if size == 0 {
            return Err(PgzError::Configuration("block size must be positive".into()));
        }
        Ok(Self(size))
    }
}

impl BlockSizePolicy for FixedBlockSize {
    fn block_size(&self, _source_len: u64) -> u64 {
        self.0
    }
}
