//! Pool of scratch working copies for one repository.
//!
//! Operations that need a checkout borrow a [`LockedWorkingCopy`] from the
//! [`RepositoryWorkspace`]. The handle owns its directory exclusively until
//! it is dropped. A handle released while flagged as corrupted leaves its
//! slot dirty, and the next borrower of that slot gets an emptied directory.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use sha2::{Digest, Sha256};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::errors::VcsError;

/// Default number of working copies kept per repository.
pub const DEFAULT_MAX_WORKING_COPIES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Free,
    Busy,
    /// Released while corrupted; emptied before it is handed out again.
    Dirty,
}

/// Scratch space for one repository: `<home>/<repo-key>/wc-<n>`.
#[derive(Debug, Clone)]
pub struct RepositoryWorkspace {
    repo_url: String,
    root: PathBuf,
    slots: Arc<Mutex<Vec<Slot>>>,
    permits: Arc<Semaphore>,
}

impl RepositoryWorkspace {
    /// Create the workspace for `repo_url` under `home` with `max_working_copies`
    /// slots (at least one). Directories are created lazily.
    pub fn new(home: impl AsRef<Path>, repo_url: impl Into<String>, max_working_copies: usize) -> Self {
        let repo_url = repo_url.into();
        let slots = max_working_copies.max(1);
        let root = home.as_ref().join(repo_key(&repo_url));
        debug!(url = %repo_url, root = %root.display(), slots, "created repository workspace");
        Self {
            repo_url,
            root,
            slots: Arc::new(Mutex::new(vec![Slot::Free; slots])),
            permits: Arc::new(Semaphore::new(slots)),
        }
    }

    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }

    /// Directory holding this repository's working copies.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn capacity(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Borrow a working copy, waiting until one is free.
    ///
    /// A slot left dirty by a corrupted copy is emptied on a blocking thread
    /// first. Until that finishes the handle stays flagged, so a cancelled
    /// `lock()` leaves the slot dirty.
    pub async fn lock(&self) -> Result<LockedWorkingCopy, VcsError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| VcsError::unexpected("working copy pool is closed", e))?;

        let (slot, dirty) = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(slot) = slots.iter().position(|s| *s != Slot::Busy) else {
                return Err(VcsError::unexpected(
                    "no free working copy despite an available permit",
                    format!("{} slots all busy", slots.len()),
                ));
            };
            let dirty = slots[slot] == Slot::Dirty;
            slots[slot] = Slot::Busy;
            (slot, dirty)
        };

        let folder = self.root.join(format!("wc-{}", slot));
        // the guard already owns the slot, so a failure below still frees it
        let mut guard = LockedWorkingCopy {
            folder,
            slot,
            corrupted: dirty,
            slots: Arc::clone(&self.slots),
            _permit: permit,
        };
        if dirty {
            wipe(&guard.folder).await?;
            guard.corrupted = false;
        }
        std::fs::create_dir_all(&guard.folder).map_err(|e| {
            VcsError::unexpected(
                format!("failed to create working copy {}", guard.folder.display()),
                e,
            )
        })?;
        debug!(folder = %guard.folder.display(), "locked working copy");
        Ok(guard)
    }
}

/// Remove a working-copy directory off the async runtime.
async fn wipe(folder: &Path) -> Result<(), VcsError> {
    let target = folder.to_path_buf();
    let removed = tokio::task::spawn_blocking(move || std::fs::remove_dir_all(&target))
        .await
        .map_err(|e| VcsError::unexpected("working copy wipe did not finish", e))?;
    match removed {
        Ok(()) => {
            info!(folder = %folder.display(), "wiped corrupted working copy");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            warn!(folder = %folder.display(), error = %e, "failed to wipe corrupted working copy");
            Err(VcsError::unexpected(
                format!("failed to wipe working copy {}", folder.display()),
                e,
            ))
        }
    }
}

/// Exclusive handle to one working-copy directory. Released on drop.
#[derive(Debug)]
pub struct LockedWorkingCopy {
    folder: PathBuf,
    slot: usize,
    corrupted: bool,
    slots: Arc<Mutex<Vec<Slot>>>,
    _permit: OwnedSemaphorePermit,
}

impl LockedWorkingCopy {
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn is_corrupted(&self) -> bool {
        self.corrupted
    }

    /// Mark the directory as untrustworthy; it is emptied before its next use.
    pub fn set_corrupted(&mut self, corrupted: bool) {
        self.corrupted = corrupted;
    }
}

impl Drop for LockedWorkingCopy {
    fn drop(&mut self) {
        let released = if self.corrupted {
            Slot::Dirty
        } else {
            Slot::Free
        };
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get_mut(self.slot) {
            *slot = released;
        }
        debug!(
            folder = %self.folder.display(),
            corrupted = self.corrupted,
            "released working copy"
        );
    }
}

/// Stable directory name for a repository URL.
fn repo_key(repo_url: &str) -> String {
    let normalized = repo_url.trim().trim_end_matches(['/', '\\']);
    let digest = Sha256::digest(normalized.as_bytes());
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_lock_creates_folder_under_repo_root() {
        let home = tempfile::tempdir().unwrap();
        let ws = RepositoryWorkspace::new(home.path(), "file:///tmp/repo", 2);
        let wc = ws.lock().await.unwrap();
        assert!(wc.folder().is_dir());
        assert!(wc.folder().starts_with(ws.root()));
        assert!(!wc.is_corrupted());
    }

    #[test]
    fn test_repo_key_ignores_trailing_slash() {
        assert_eq!(repo_key("file:///tmp/repo"), repo_key("file:///tmp/repo/"));
        assert_ne!(repo_key("file:///tmp/repo"), repo_key("file:///tmp/other"));
        assert_eq!(repo_key("file:///tmp/repo").len(), 16);
    }

    #[tokio::test]
    async fn test_concurrent_locks_get_distinct_folders() {
        let home = tempfile::tempdir().unwrap();
        let ws = RepositoryWorkspace::new(home.path(), "file:///tmp/repo", 3);
        let a = ws.lock().await.unwrap();
        let b = ws.lock().await.unwrap();
        let c = ws.lock().await.unwrap();
        assert_ne!(a.folder(), b.folder());
        assert_ne!(b.folder(), c.folder());
        assert_ne!(a.folder(), c.folder());
    }

    #[tokio::test]
    async fn test_lock_waits_for_release() {
        let home = tempfile::tempdir().unwrap();
        let ws = RepositoryWorkspace::new(home.path(), "file:///tmp/repo", 1);
        let first = ws.lock().await.unwrap();
        let first_folder = first.folder().to_path_buf();

        let blocked = tokio::time::timeout(Duration::from_millis(50), ws.lock()).await;
        assert!(blocked.is_err(), "second lock must wait while the slot is held");

        drop(first);
        let second = ws.lock().await.unwrap();
        assert_eq!(second.folder(), first_folder);
    }

    #[tokio::test]
    async fn test_corrupted_folder_is_emptied_for_next_borrower() {
        let home = tempfile::tempdir().unwrap();
        let ws = RepositoryWorkspace::new(home.path(), "file:///tmp/repo", 1);
        let mut wc = ws.lock().await.unwrap();
        let folder = wc.folder().to_path_buf();
        std::fs::write(folder.join("half-merged.txt"), "<<<<<<<").unwrap();
        wc.set_corrupted(true);
        drop(wc);

        let wc = ws.lock().await.unwrap();
        assert_eq!(wc.folder(), folder);
        assert!(wc.folder().is_dir());
        assert!(!wc.is_corrupted());
        assert!(!wc.folder().join("half-merged.txt").exists());
    }

    #[tokio::test]
    async fn test_dirty_slot_is_reused_after_wipe() {
        let home = tempfile::tempdir().unwrap();
        let ws = RepositoryWorkspace::new(home.path(), "file:///tmp/repo", 2);
        let mut wc = ws.lock().await.unwrap();
        std::fs::write(wc.folder().join("leftover"), "x").unwrap();
        wc.set_corrupted(true);
        drop(wc);

        let first = ws.lock().await.unwrap();
        assert!(first.folder().ends_with("wc-0"));
        assert!(!first.folder().join("leftover").exists());
        let second = ws.lock().await.unwrap();
        assert!(second.folder().ends_with("wc-1"));
    }

    #[tokio::test]
    async fn test_clean_folder_is_kept_on_release() {
        let home = tempfile::tempdir().unwrap();
        let ws = RepositoryWorkspace::new(home.path(), "file:///tmp/repo", 1);
        let wc = ws.lock().await.unwrap();
        std::fs::write(wc.folder().join("kept.txt"), "x").unwrap();
        let folder = wc.folder().to_path_buf();
        drop(wc);
        assert!(folder.join("kept.txt").exists());
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let ws = RepositoryWorkspace::new("/tmp", "file:///tmp/repo", 0);
        assert_eq!(ws.capacity(), 1);
    }
}
