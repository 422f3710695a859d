//! The single-writer lock.
//!
//! All mutation of a database root (sealing, manifest appends, router
//! updates, DB receipt recompute) happens while holding an OS-level
//! exclusive lock on `.writer.lock`. Readers never take it.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::time::Duration;

use fs2::FileExt;

use latticedb_core::Deadline;

use crate::error::{Result, StoreError};

/// Poll interval while waiting for a contended lock.
const RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// An exclusive writer lock on a database root. Released on drop.
#[derive(Debug)]
pub struct WriterLock {
    file: File,
}

impl WriterLock {
    /// Acquire the lock, failing immediately if another writer holds it.
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        file.try_lock_exclusive()
            .map_err(|e| StoreError::Locked(format!("{}: {e}", path.display())))?;
        Ok(Self { file })
    }

    /// Acquire the lock, waiting for a contending writer until the
    /// deadline expires. Acquisition order is poll order, so concurrent
    /// builds serialize.
    pub fn acquire_with_deadline(path: &Path, deadline: Deadline) -> Result<Self> {
        loop {
            match Self::acquire(path) {
                Ok(lock) => return Ok(lock),
                Err(StoreError::Locked(msg)) => {
                    if deadline.expired() {
                        return Err(StoreError::Locked(format!(
                            "timed out waiting for writer lock: {msg}"
                        )));
                    }
                    std::thread::sleep(RETRY_INTERVAL);
                }
                Err(other) => return Err(other),
            }
        }
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        // Unlock errors on drop have no recovery path; the OS releases the
        // lock when the file closes regardless.
        let _ = self.file.unlock();
    }
}
