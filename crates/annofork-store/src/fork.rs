//! User workspace forker
//!
//! Copies the shared `Data/` tree into `Users/<reviewer>/Data/`:
//!
//! 1. every directory is recreated, in sorted depth-first order
//! 2. every `.csv` file is parsed, gets the reviewer's `Notes_`/`Summary_`
//!    columns if it lacks them, and is written back out
//! 3. every other file is copied byte for byte
//!
//! Column injection never removes or reorders existing columns, so forking
//! from a template that already carries another reviewer's columns keeps
//! them. A failure aborts the fork and leaves whatever was already written;
//! every write replaces its target, so retrying is safe.

use crate::error::{WorkspaceError, WorkspaceResult};
use crate::fs::{is_csv_name, EntryKind};
use crate::progress::{CancelFlag, ProgressObserver, ProgressTracker};
use crate::topology::{workspace_data_path, DataDir, Topology};
use annofork_table::{parse, serialize, ParseMode, Reviewer};
use std::path::{Path, PathBuf};

/// What a fork produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkReport {
    /// New workspace data folder
    pub workspace: PathBuf,
    /// CSV files written with injected columns
    pub tables: usize,
    /// Non-CSV files copied verbatim
    pub copied: usize,
    /// Total reviewer columns added across all tables
    pub columns_added: usize,
}

/// Clones the shared dataset for one reviewer
#[derive(Debug, Clone)]
pub struct Forker {
    topology: Topology,
    strict: bool,
}

impl Forker {
    /// Forker over a dataset root
    #[inline]
    #[must_use]
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            strict: true,
        }
    }

    /// Fork CSVs with row diagnostics instead of aborting
    #[inline]
    #[must_use]
    pub fn with_strict_parse(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Create `Users/<reviewer>/Data/` from the shared `Data/`
    ///
    /// Does not check whether the reviewer already has a workspace; callers
    /// consult [`Topology::list_reviewers`] first.
    ///
    /// # Errors
    /// Missing shared `Data/`, any storage failure, any CSV that fails to
    /// parse (or has diagnostics in strict mode), or cancellation. The
    /// error names the offending file.
    pub async fn fork(
        &self,
        reviewer: &Reviewer,
        observer: &dyn ProgressObserver,
        cancel: &CancelFlag,
    ) -> WorkspaceResult<ForkReport> {
        let shared = self.topology.resolve_shared_data().await?;
        let target = workspace_data_path(reviewer);
        tracing::info!("Forking {} into {}", shared.path().display(), target.display());

        let (dirs, files) = self.walk(&shared).await?;
        let fs = self.topology.fs();
        fs.create_dir_all(&target).await?;
        for dir in &dirs {
            fs.create_dir_all(&target.join(dir)).await?;
        }

        let mut report = ForkReport {
            workspace: target.clone(),
            tables: 0,
            copied: 0,
            columns_added: 0,
        };
        let mut tracker = ProgressTracker::new(observer, files.len());
        tracker.start(format!("Creating workspace for {reviewer}"));

        for relative in &files {
            cancel.check()?;
            let source = shared.join(relative);
            let dest = target.join(relative);
            if is_csv(relative) {
                report.columns_added += self.fork_table(reviewer, &source, &dest).await?;
                report.tables += 1;
            } else {
                let bytes = fs.read(&source).await?;
                fs.write(&dest, &bytes).await?;
                report.copied += 1;
            }
            tracing::debug!("Forked {}", source.display());
            tracker.step(&dest, format!("Copied {}", relative.display()));
        }

        tracker.finish(format!("Workspace ready for {reviewer}"));
        tracing::info!(
            "Forked {} tables and {} other files for {}",
            report.tables,
            report.copied,
            reviewer
        );
        Ok(report)
    }

    /// Parse, inject, write; returns the number of columns added
    async fn fork_table(
        &self,
        reviewer: &Reviewer,
        source: &Path,
        dest: &Path,
    ) -> WorkspaceResult<usize> {
        let fs = self.topology.fs();
        let text = fs.read_to_string(source).await?;
        let parsed =
            parse(&text, ParseMode::Literal).map_err(|e| WorkspaceError::parse(source, e))?;
        let mut table = if self.strict {
            parsed
                .into_strict()
                .map_err(|e| WorkspaceError::parse(source, e))?
        } else {
            for diagnostic in &parsed.diagnostics {
                tracing::warn!("{}: {}", source.display(), diagnostic);
            }
            parsed.table
        };
        let added = reviewer.columns().inject_required(&mut table);
        fs.write(dest, serialize(&table).as_bytes()).await?;
        Ok(added.len())
    }

    /// Every directory and file under a data folder, relative to it, sorted
    /// depth-first
    async fn walk(&self, data: &DataDir) -> WorkspaceResult<(Vec<PathBuf>, Vec<PathBuf>)> {
        let fs = self.topology.fs();
        let mut dirs = Vec::new();
        let mut files = Vec::new();
        let mut pending = vec![PathBuf::new()];

        while let Some(relative) = pending.pop() {
            let mut children = Vec::new();
            for entry in fs.list(&data.join(&relative)).await? {
                let path = relative.join(&entry.name);
                match entry.kind {
                    EntryKind::Directory => {
                        dirs.push(path.clone());
                        children.push(path);
                    }
                    EntryKind::File => files.push(path),
                }
            }
            pending.extend(children.into_iter().rev());
        }
        Ok((dirs, files))
    }
}

fn is_csv(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(is_csv_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StructureError;
    use crate::fs::{Filesystem, LocalFs};
    use crate::progress::NoProgress;
    use std::sync::{Arc, Mutex};

    async fn dataset() -> (tempfile::TempDir, Topology) {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFs::new(dir.path());
        fs.create_dir_all(Path::new("Data/TrajectoriesToAnalyse/extra"))
            .await
            .unwrap();
        fs.write(Path::new("Data/users.csv"), b"Author,TotalPosts\nalice,10")
            .await
            .unwrap();
        fs.write(
            Path::new("Data/TrajectoriesToAnalyse/alice.csv"),
            b"year,title\n2020,a\n2021,b",
        )
        .await
        .unwrap();
        fs.write(Path::new("Data/TrajectoriesToAnalyse/notes.txt"), b"raw\r\nbytes")
            .await
            .unwrap();
        (dir, Topology::new(Arc::new(fs)))
    }

    #[tokio::test]
    async fn forks_tree_with_injected_columns() {
        let (_dir, topology) = dataset().await;
        let bob = Reviewer::new("bob").unwrap();
        let report = Forker::new(topology.clone())
            .fork(&bob, &NoProgress, &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(report.tables, 2);
        assert_eq!(report.copied, 1);
        assert_eq!(report.columns_added, 4);

        let fs = topology.fs();
        assert_eq!(
            fs.read_to_string(Path::new("Users/bob/Data/users.csv"))
                .await
                .unwrap(),
            "Author,TotalPosts,Notes_bob,Summary_bob\nalice,10,,"
        );
        assert_eq!(
            fs.read(Path::new("Users/bob/Data/TrajectoriesToAnalyse/notes.txt"))
                .await
                .unwrap(),
            b"raw\r\nbytes"
        );
        assert!(fs
            .is_dir(Path::new("Users/bob/Data/TrajectoriesToAnalyse/extra"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn progress_ends_at_100() {
        let (_dir, topology) = dataset().await;
        let seen = Mutex::new(Vec::new());
        let observer = |e: crate::ProgressEvent| seen.lock().unwrap().push(e.percent);
        Forker::new(topology)
            .fork(&Reviewer::new("bob").unwrap(), &observer, &CancelFlag::new())
            .await
            .unwrap();
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn missing_shared_data_is_structural() {
        let dir = tempfile::tempdir().unwrap();
        let topology = Topology::new(Arc::new(LocalFs::new(dir.path())));
        let err = Forker::new(topology)
            .fork(&Reviewer::new("bob").unwrap(), &NoProgress, &CancelFlag::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkspaceError::Structure(StructureError::MissingDataFolder(_))
        ));
    }

    #[tokio::test]
    async fn strict_fork_names_bad_file() {
        let (_dir, topology) = dataset().await;
        topology
            .fs()
            .write(Path::new("Data/TrajectoriesToAnalyse/broken.csv"), b"a,b\n1")
            .await
            .unwrap();
        let err = Forker::new(topology.clone())
            .fork(&Reviewer::new("bob").unwrap(), &NoProgress, &CancelFlag::new())
            .await
            .unwrap_err();
        match err {
            WorkspaceError::Parse { path, .. } => {
                assert_eq!(path, PathBuf::from("Data/TrajectoriesToAnalyse/broken.csv"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let report = Forker::new(topology)
            .with_strict_parse(false)
            .fork(&Reviewer::new("bob").unwrap(), &NoProgress, &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(report.tables, 3);
    }

    #[tokio::test]
    async fn cancelled_fork_stops_between_files() {
        let (_dir, topology) = dataset().await;
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = Forker::new(topology.clone())
            .fork(&Reviewer::new("bob").unwrap(), &NoProgress, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::Cancelled));
        assert!(!topology
            .fs()
            .is_file(Path::new("Users/bob/Data/users.csv"))
            .await
            .unwrap());
    }
}
