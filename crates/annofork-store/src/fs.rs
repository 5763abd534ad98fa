//! Directory and file handle provider
//!
//! [`Filesystem`] is the only way the engine touches storage. Paths are
//! always relative to the provider root; the engine never sees absolute
//! paths. [`LocalFs`] implements it over `tokio::fs`.

use crate::error::StorageError;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Suffix of in-flight write files; hidden from listings
const TMP_SUFFIX: &str = ".annofork-tmp";

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Directory,
}

/// One child of a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// File or folder name
    pub name: String,
    /// What it is
    pub kind: EntryKind,
}

impl DirEntry {
    /// Whether this is a `.csv` file (extension compared case-insensitively)
    #[must_use]
    pub fn is_csv(&self) -> bool {
        self.kind == EntryKind::File && is_csv_name(&self.name)
    }
}

/// Whether a file name carries the `.csv` extension
#[must_use]
pub fn is_csv_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

/// Capability-style access to a dataset tree
///
/// Implementations must make [`Filesystem::write`] replace the whole file:
/// readers observe either the old or the new content.
#[async_trait]
pub trait Filesystem: Send + Sync + std::fmt::Debug {
    /// Kind of the entry at `path`, or `None` if absent
    async fn kind(&self, path: &Path) -> Result<Option<EntryKind>, StorageError>;

    /// Children of a directory, sorted by name
    async fn list(&self, path: &Path) -> Result<Vec<DirEntry>, StorageError>;

    /// Create a directory and any missing parents
    async fn create_dir_all(&self, path: &Path) -> Result<(), StorageError>;

    /// Read a whole file
    async fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError>;

    /// Replace a file's contents, creating it if missing
    async fn write(&self, path: &Path, contents: &[u8]) -> Result<(), StorageError>;

    /// Read a whole file as UTF-8 text
    async fn read_to_string(&self, path: &Path) -> Result<String, StorageError> {
        let bytes = self.read(path).await?;
        String::from_utf8(bytes).map_err(|_| StorageError::NotText(path.to_path_buf()))
    }

    /// Check for a directory
    async fn is_dir(&self, path: &Path) -> Result<bool, StorageError> {
        Ok(self.kind(path).await? == Some(EntryKind::Directory))
    }

    /// Check for a file
    async fn is_file(&self, path: &Path) -> Result<bool, StorageError> {
        Ok(self.kind(path).await? == Some(EntryKind::File))
    }
}

/// [`Filesystem`] over a local directory
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    /// Provider rooted at `root`
    #[inline]
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a relative path under the root
    ///
    /// # Errors
    /// Returns [`StorageError::InvalidPath`] for absolute paths or `..`
    pub fn resolve(&self, path: &Path) -> Result<PathBuf, StorageError> {
        let mut out = self.root.clone();
        for component in path.components() {
            match component {
                Component::Normal(part) => out.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StorageError::InvalidPath(path.to_path_buf()));
                }
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl Filesystem for LocalFs {
    async fn kind(&self, path: &Path) -> Result<Option<EntryKind>, StorageError> {
        let full = self.resolve(path)?;
        match tokio::fs::metadata(&full).await {
            Ok(meta) if meta.is_dir() => Ok(Some(EntryKind::Directory)),
            Ok(meta) if meta.is_file() => Ok(Some(EntryKind::File)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io_error(path, e)),
        }
    }

    async fn list(&self, path: &Path) -> Result<Vec<DirEntry>, StorageError> {
        let full = self.resolve(path)?;
        let mut dir = tokio::fs::read_dir(&full)
            .await
            .map_err(|e| StorageError::io_error(path, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StorageError::io_error(path, e))?
        {
            let Ok(name) = entry.file_name().into_string() else {
                tracing::warn!("skipping non UTF-8 entry in {}", path.display());
                continue;
            };
            if name.ends_with(TMP_SUFFIX) {
                continue;
            }
            // Follow symlinks so linked folders behave like real ones
            let meta = tokio::fs::metadata(entry.path())
                .await
                .map_err(|e| StorageError::io_error(path.join(&name), e))?;
            let kind = if meta.is_dir() {
                EntryKind::Directory
            } else if meta.is_file() {
                EntryKind::File
            } else {
                continue;
            };
            entries.push(DirEntry { name, kind });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn create_dir_all(&self, path: &Path) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        tokio::fs::create_dir_all(&full)
            .await
            .map_err(|e| StorageError::io_error(path, e))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        let full = self.resolve(path)?;
        tokio::fs::read(&full)
            .await
            .map_err(|e| StorageError::io_error(path, e))
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        let Some(name) = full.file_name().and_then(|n| n.to_str()) else {
            return Err(StorageError::InvalidPath(path.to_path_buf()));
        };
        let tmp = full.with_file_name(format!(".{name}{TMP_SUFFIX}"));

        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| StorageError::io_error(path, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &full).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(StorageError::io_error(path, e));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_names() {
        assert!(is_csv_name("alice.csv"));
        assert!(is_csv_name("ALICE.CSV"));
        assert!(!is_csv_name("notes.txt"));
        assert!(!is_csv_name("csv"));
    }

    #[test]
    fn resolve_rejects_escapes() {
        let fs = LocalFs::new("/data");
        assert_eq!(
            fs.resolve(Path::new("Data/users.csv")).unwrap(),
            PathBuf::from("/data/Data/users.csv")
        );
        assert!(fs.resolve(Path::new("../etc")).is_err());
        assert!(fs.resolve(Path::new("/etc")).is_err());
    }

    #[tokio::test]
    async fn write_replaces_and_list_hides_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFs::new(dir.path());
        fs.create_dir_all(Path::new("Data")).await.unwrap();

        fs.write(Path::new("Data/users.csv"), b"old").await.unwrap();
        fs.write(Path::new("Data/users.csv"), b"new").await.unwrap();
        std::fs::write(dir.path().join("Data/.x.csv.annofork-tmp"), b"junk").unwrap();

        assert_eq!(
            fs.read_to_string(Path::new("Data/users.csv")).await.unwrap(),
            "new"
        );
        let names: Vec<_> = fs
            .list(Path::new("Data"))
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["users.csv"]);
    }

    #[tokio::test]
    async fn kind_reports_missing_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFs::new(dir.path());
        assert_eq!(fs.kind(Path::new("Data")).await.unwrap(), None);
        fs.create_dir_all(Path::new("Data")).await.unwrap();
        assert!(fs.is_dir(Path::new("Data")).await.unwrap());
        assert!(!fs.is_file(Path::new("Data")).await.unwrap());
    }

    #[tokio::test]
    async fn write_without_parent_fails_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFs::new(dir.path());
        let err = fs.write(Path::new("Nope/x.csv"), b"x").await.unwrap_err();
        assert!(err.to_string().contains("Nope/x.csv"));
    }

    #[tokio::test]
    async fn non_utf8_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFs::new(dir.path());
        fs.write(Path::new("blob.bin"), &[0xff, 0xfe]).await.unwrap();
        assert!(matches!(
            fs.read_to_string(Path::new("blob.bin")).await,
            Err(StorageError::NotText(_))
        ));
    }
}
