use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tempfile::{Builder, TempPath};
use tracing::{debug, warn};

use crate::error::{IoResultExt, Result};

const SCRATCH_PREFIX: &str = ".pgz-";
const SCRATCH_SUFFIX: &str = ".blk";

/// Registry of the private temporary files used by one session.
///
/// Workers allocate a block's files when they pick the block up, so a
/// block that is never started never touches the disk. The files are owned
/// here rather than by the worker that writes them. [`Scratch::release`]
/// (or dropping the registry) deletes all of them; a failed deletion is
/// logged and the remaining files are still attempted.
#[derive(Debug)]
pub struct Scratch {
    dir: PathBuf,
    files: Mutex<Vec<TempPath>>,
}

impl Scratch {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: Mutex::new(Vec::new()),
        }
    }

    fn files(&self) -> MutexGuard<'_, Vec<TempPath>> {
        self.files.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create an empty private file and return its path.
    pub fn allocate(&self) -> Result<PathBuf> {
        let file = Builder::new()
            .prefix(SCRATCH_PREFIX)
            .suffix(SCRATCH_SUFFIX)
            .tempfile_in(&self.dir)
            .at(&self.dir)?;
        let temp = file.into_temp_path();
        let path = temp.to_path_buf();
        self.files().push(temp);
        Ok(path)
    }

    /// Number of files currently held.
    pub fn len(&self) -> usize {
        self.files().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files().is_empty()
    }

    /// Delete every held file. Returns how many deletions failed.
    pub fn release(&mut self) -> usize {
        let files = self.files.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut failed = 0;
        let total = files.len();
        for temp in files.drain(..) {
            let path = temp.to_path_buf();
            if let Err(err) = temp.close() {
                warn!(path = %path.display(), error = %err, "failed to remove scratch file");
                failed += 1;
            }
        }
        if total > 0 {
            debug!(removed = total - failed, failed, "released scratch files");
        }
        failed
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        self.release();
    }
}
