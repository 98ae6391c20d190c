use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PgzError {
    /// Invalid paths, block sizes or session options. Raised before any work starts.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The container header is inconsistent with itself or with the file length.
    #[error("malformed container: {0}")]
    MalformedContainer(String),

    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A block was abandoned because an earlier failure cancelled the run.
    #[error("block {sequence} was abandoned before it completed")]
    Cancelled { sequence: u64 },

    #[error("{0} thread panicked")]
    Panicked(&'static str),
}

pub type Result<T> = std::result::Result<T, PgzError>;

/// Attaches the offending path to a raw `io::Error`.
pub(crate) trait IoResultExt<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|source| PgzError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
