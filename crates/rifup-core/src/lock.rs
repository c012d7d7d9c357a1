//! Per-interface state locking.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{IfupError, IfupResult};
use crate::options::ExecuteOpts;

/// Exclusive advisory lock serializing transitions of one interface
/// across concurrent invocations. Unrelated interfaces use different
/// lock files and never contend. Released on drop.
#[derive(Debug)]
pub struct StateLock {
    file: File,
    path: PathBuf,
}

impl StateLock {
    /// Acquires the lock for `ifname`, blocking until the holder
    /// releases it. Returns `None` without locking when locking is
    /// disabled or in mock mode.
    pub fn acquire(opts: &ExecuteOpts, ifname: &str) -> IfupResult<Option<Self>> {
        if opts.no_lock || opts.mock {
            return Ok(None);
        }
        let path = lock_path(&opts.state_file, ifname);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .map_err(|e| IfupError::Lock {
                path: path.clone(),
                source: e,
            })?;
        file.lock_exclusive().map_err(|e| IfupError::Lock {
            path: path.clone(),
            source: e,
        })?;
        Ok(Some(Self { file, path }))
    }

    /// The lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Lock files live next to the state file: `<state-file>.<ifname>.lock`.
fn lock_path(state_file: &Path, ifname: &str) -> PathBuf {
    let mut os = state_file.as_os_str().to_os_string();
    os.push(format!(".{ifname}.lock"));
    PathBuf::from(os)
}
