//! Per-file write serialization
//!
//! One async mutex per relative path. Holders of a guard are the only writer
//! of that file for the lifetime of the guard.

use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of per-path locks, cheap to clone and share
#[derive(Debug, Clone, Default)]
pub struct FileLocks {
    inner: Arc<DashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl FileLocks {
    /// Empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `path`
    pub async fn lock(&self, path: &Path) -> OwnedMutexGuard<()> {
        let mutex = self.inner.entry(path.to_path_buf()).or_default().clone();
        mutex.lock_owned().await
    }

    /// Number of paths ever locked
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// No path locked yet
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_path_is_serialized() {
        let locks = FileLocks::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_seen = max_seen.clone();
                tokio::spawn(async move {
                    let _guard = locks.lock(Path::new("Data/users.csv")).await;
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn different_paths_do_not_block() {
        let locks = FileLocks::new();
        let _a = locks.lock(Path::new("a.csv")).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock(Path::new("b.csv"))).await;
        assert!(b.is_ok());
    }
}
