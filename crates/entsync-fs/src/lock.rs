//! System-wide action lock
//!
//! A reconciliation cycle runs while holding an exclusive advisory lock on a
//! well-known lock file. The lock is taken with `flock(2)` semantics through
//! `fs2`, so it excludes other processes as well as other threads of this one.
//! Nested acquisition from the thread that already owns the lock is allowed and
//! only bumps a depth counter.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use fs2::FileExt;

use crate::{Error, Result};

#[derive(Debug, Default)]
struct Holder {
    owner: Option<ThreadId>,
    depth: usize,
    file: Option<File>,
}

/// Exclusive, re-entrant, OS-level lock guarding a whole cycle.
#[derive(Debug)]
pub struct ActionLock {
    path: PathBuf,
    holder: Mutex<Holder>,
}

impl ActionLock {
    /// Create a lock backed by the file at `path`.
    ///
    /// The file is created on first acquisition; it is never removed.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            holder: Mutex::new(Holder::default()),
        }
    }

    /// Path of the backing lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until the lock is held, then return a guard releasing it on drop.
    pub fn acquire(&self) -> Result<LockGuard<'_>> {
        let me = thread::current().id();
        {
            let mut holder = self.holder();
            if holder.owner == Some(me) {
                holder.depth += 1;
                tracing::trace!(path = %self.path.display(), depth = holder.depth, "Re-entered action lock");
                return Ok(LockGuard { lock: self });
            }
        }

        let file = self.open()?;
        tracing::debug!(path = %self.path.display(), "Waiting for action lock");
        // Blocks without holding `holder`, so the owner can still release.
        file.lock_exclusive().map_err(|source| Error::LockFailed {
            path: self.path.clone(),
            source,
        })?;

        let mut holder = self.holder();
        holder.owner = Some(me);
        holder.depth = 1;
        holder.file = Some(file);
        tracing::debug!(path = %self.path.display(), "Acquired action lock");

        Ok(LockGuard { lock: self })
    }

    /// Whether the calling thread currently holds the lock.
    pub fn is_held_by_current_thread(&self) -> bool {
        self.holder().owner == Some(thread::current().id())
    }

    fn open(&self) -> Result<File> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| Error::io(&self.path, e))
    }

    fn holder(&self) -> MutexGuard<'_, Holder> {
        // A panic inside a cycle must not wedge every later cycle.
        self.holder.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn release(&self) {
        let file = {
            let mut holder = self.holder();
            holder.depth = holder.depth.saturating_sub(1);
            if holder.depth > 0 {
                return;
            }
            holder.owner = None;
            holder.file.take()
        };

        if let Some(file) = file {
            if let Err(e) = FileExt::unlock(&file) {
                tracing::warn!(path = %self.path.display(), "Failed to unlock action lock: {}", e);
            }
            tracing::debug!(path = %self.path.display(), "Released action lock");
        }
    }
}

/// Scoped ownership of an [`ActionLock`].
#[derive(Debug)]
pub struct LockGuard<'a> {
    lock: &'a ActionLock,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
