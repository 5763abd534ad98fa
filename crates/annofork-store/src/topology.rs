//! Folder topology
//!
//! Resolves the fixed dataset layout into concrete locations:
//!
//! ```text
//! <root>/Data/users.csv
//! <root>/Data/TrajectoriesToAnalyse/<author>.csv
//! <root>/Users/<reviewer>/Data/...            (same shape as Data/)
//! ```
//!
//! Pure navigation: nothing here creates folders.

use crate::error::{StructureError, WorkspaceResult};
use crate::fs::{is_csv_name, EntryKind, Filesystem};
use annofork_table::Reviewer;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared data folder name
pub const DATA_DIR: &str = "Data";
/// Folder holding one subfolder per reviewer
pub const USERS_DIR: &str = "Users";
/// Per-author trajectory folder inside a data folder
pub const TRAJECTORIES_DIR: &str = "TrajectoriesToAnalyse";
/// Per-author summary table inside a data folder
pub const USERS_FILE: &str = "users.csv";

/// A resolved `Data/` folder, shared or per-reviewer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataDir(PathBuf);

impl DataDir {
    /// Path relative to the dataset root
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// `<data>/users.csv`
    #[must_use]
    pub fn users_file(&self) -> PathBuf {
        self.0.join(USERS_FILE)
    }

    /// `<data>/TrajectoriesToAnalyse`
    #[must_use]
    pub fn trajectories_dir(&self) -> PathBuf {
        self.0.join(TRAJECTORIES_DIR)
    }

    /// `<data>/TrajectoriesToAnalyse/<author>.csv`, unchecked
    #[must_use]
    pub fn trajectory_path(&self, author: &str) -> PathBuf {
        self.trajectories_dir().join(format!("{author}.csv"))
    }

    /// Same relative file under another data folder
    #[must_use]
    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.0.join(relative)
    }
}

/// `Users/<reviewer>/Data`, unchecked
#[must_use]
pub fn workspace_data_path(reviewer: &Reviewer) -> PathBuf {
    Path::new(USERS_DIR).join(reviewer.as_str()).join(DATA_DIR)
}

/// Navigator over one dataset root
#[derive(Debug, Clone)]
pub struct Topology {
    fs: Arc<dyn Filesystem>,
}

impl Topology {
    /// Navigator over the provider's root
    #[inline]
    #[must_use]
    pub fn new(fs: Arc<dyn Filesystem>) -> Self {
        Self { fs }
    }

    /// Underlying provider
    #[inline]
    #[must_use]
    pub fn fs(&self) -> &Arc<dyn Filesystem> {
        &self.fs
    }

    /// The shared `Data/` folder
    ///
    /// # Errors
    /// [`StructureError::MissingDataFolder`] if `Data/` is absent
    pub async fn resolve_shared_data(&self) -> WorkspaceResult<DataDir> {
        let data = PathBuf::from(DATA_DIR);
        if !self.fs.is_dir(&data).await? {
            return Err(StructureError::MissingDataFolder(data).into());
        }
        Ok(DataDir(data))
    }

    /// A reviewer's `Users/<reviewer>/Data/` folder
    ///
    /// # Errors
    /// The first missing segment of `Users/<reviewer>/Data`
    pub async fn resolve_user_data(&self, reviewer: &Reviewer) -> WorkspaceResult<DataDir> {
        let users = PathBuf::from(USERS_DIR);
        if !self.fs.is_dir(&users).await? {
            return Err(StructureError::MissingUsersFolder(users).into());
        }
        let folder = users.join(reviewer.as_str());
        if !self.fs.is_dir(&folder).await? {
            return Err(StructureError::MissingReviewerFolder(folder).into());
        }
        let data = folder.join(DATA_DIR);
        if !self.fs.is_dir(&data).await? {
            return Err(StructureError::MissingDataFolder(data).into());
        }
        Ok(DataDir(data))
    }

    /// Immediate subfolders of `Users/`, sorted
    ///
    /// # Errors
    /// [`StructureError::MissingUsersFolder`] if `Users/` is absent
    pub async fn list_reviewers(&self) -> WorkspaceResult<BTreeSet<String>> {
        let users = PathBuf::from(USERS_DIR);
        if !self.fs.is_dir(&users).await? {
            return Err(StructureError::MissingUsersFolder(users).into());
        }
        Ok(self
            .fs
            .list(&users)
            .await?
            .into_iter()
            .filter(|e| e.kind == EntryKind::Directory)
            .map(|e| e.name)
            .collect())
    }

    /// An author's trajectory file inside a data folder
    ///
    /// # Errors
    /// [`StructureError::MissingTrajectoryFile`] if the file is absent or the
    /// author name cannot be a file name
    pub async fn resolve_trajectory_file(
        &self,
        data: &DataDir,
        author: &str,
    ) -> WorkspaceResult<PathBuf> {
        let path = data.trajectory_path(author);
        let plain = !author.is_empty()
            && author != "."
            && author != ".."
            && !author.contains(['/', '\\']);
        if !plain || !self.fs.is_file(&path).await? {
            return Err(StructureError::MissingTrajectoryFile(path).into());
        }
        Ok(path)
    }

    /// `.csv` files directly inside a data folder's trajectory folder, sorted
    ///
    /// Empty when the trajectory folder does not exist.
    pub async fn trajectory_files(&self, data: &DataDir) -> WorkspaceResult<Vec<PathBuf>> {
        let dir = data.trajectories_dir();
        if !self.fs.is_dir(&dir).await? {
            return Ok(Vec::new());
        }
        Ok(self
            .fs
            .list(&dir)
            .await?
            .into_iter()
            .filter(|e| e.kind == EntryKind::File && is_csv_name(&e.name))
            .map(|e| dir.join(e.name))
            .collect())
    }
}
