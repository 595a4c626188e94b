//! Per-date run lock.
//!
//! Two overlapping scheduler triggers for the same date must not run the
//! catalog twice at once. The lock is an exclusive `flock`-style lock on
//! `batch_<YYYYMMDD>.lock` next to the day's log, held for as long as the
//! guard lives.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;
use tracing::debug;

use crate::domain::TargetDate;

/// Exclusive lock guard for one target date
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    file: File,
}

impl RunLock {
    /// Path of the lock file for a date
    pub fn lock_path(lock_dir: &Path, target_date: &TargetDate) -> PathBuf {
        lock_dir.join(format!("batch_{}.lock", target_date.compact()))
    }

    /// Try to take the lock without blocking
    pub fn acquire(lock_dir: &Path, target_date: &TargetDate) -> Result<Self, LockError> {
        let path = Self::lock_path(lock_dir, target_date);
        let io_err = |source: io::Error| LockError::Io {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(lock_dir).map_err(io_err)?;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(io_err)?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() {
                return Err(LockError::Busy { path });
            }
            return Err(io_err(e));
        }

        // Record the holder for operators inspecting a stuck run
        file.set_len(0).map_err(io_err)?;
        writeln!(file, "{}", std::process::id()).map_err(io_err)?;

        debug!(path = %path.display(), "Acquired run lock");
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Lock acquisition errors
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Another run for this date holds the lock: {}", .path.display())]
    Busy { path: PathBuf },

    #[error("Failed to access lock file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
