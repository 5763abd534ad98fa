//! Reconciliation (send-back) engine
//!
//! Pushes one reviewer's `Notes_`/`Summary_` columns from their workspace back
//! into the shared `Data/` folder. For every file present in both places, each shared
//! row is matched to a workspace row by natural key and only that reviewer's
//! cells are overwritten; every other column, including other reviewers'
//! annotation columns, is left as found. Workspace rows with no shared
//! counterpart are ignored.
//!
//! Workspace copies are read ahead in batches of `reconcile_batch_size`; the
//! merges themselves run one file at a time in sorted order. A failure stops
//! the pass before any later file is touched but does not undo files already
//! written; rerunning re-derives everything from the same workspace state.

use crate::annotation::{TableKind, AUTHOR_FIELD};
use crate::error::{ConflictError, WorkspaceError, WorkspaceResult};
use crate::locks::FileLocks;
use crate::progress::{CancelFlag, ProgressObserver, ProgressTracker};
use crate::topology::{DataDir, Topology, TRAJECTORIES_DIR, USERS_FILE};
use annofork_table::{parse, serialize, ParseMode, Reviewer, ReviewerColumns, Table};
use futures::future::join_all;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Outcome for one tracked file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileStatus {
    /// Shared file rewritten with the reviewer's values
    Merged,
    /// Shared file already matched the workspace; nothing written
    Unchanged,
    /// No counterpart in the shared root; skipped
    MissingInShared,
    /// Workspace copy carries none of the reviewer's columns; skipped
    NotAnnotated,
}

/// Per-file reconciliation summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    /// Path relative to the data folder
    pub path: PathBuf,
    /// What happened
    pub status: FileStatus,
    /// Shared rows whose owned cells changed
    pub rows_updated: usize,
    /// Shared rows with no matching workspace row
    pub rows_unmatched: usize,
}

impl FileReport {
    fn skipped(path: PathBuf, status: FileStatus) -> Self {
        Self {
            path,
            status,
            rows_updated: 0,
            rows_unmatched: 0,
        }
    }
}

/// Result of one send-back pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    /// Reviewer whose columns were sent
    pub reviewer: Reviewer,
    /// One entry per tracked file, in processing order
    pub files: Vec<FileReport>,
}

impl SendResult {
    /// Files actually rewritten in the shared root
    pub fn written(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| f.status == FileStatus::Merged)
    }

    /// Files skipped because the shared root lacks them
    pub fn missing_in_shared(&self) -> impl Iterator<Item = &FileReport> {
        self.files
            .iter()
            .filter(|f| f.status == FileStatus::MissingInShared)
    }

    /// Total rows changed across all files
    #[must_use]
    pub fn rows_updated(&self) -> usize {
        self.files.iter().map(|f| f.rows_updated).sum()
    }
}

/// How rows of one file are paired up
#[derive(Debug, Clone, PartialEq, Eq)]
enum RowMatch {
    ByKey(Vec<String>),
    ByPosition,
}

/// Merges reviewer columns back into the shared root
#[derive(Debug, Clone)]
pub struct Reconciler {
    topology: Topology,
    locks: FileLocks,
    key_fields: Vec<String>,
    batch_size: usize,
    strict: bool,
}

impl Reconciler {
    /// Reconciler keyed on `permalink` with batches of 10
    #[must_use]
    pub fn new(topology: Topology, locks: FileLocks) -> Self {
        Self {
            topology,
            locks,
            key_fields: vec!["permalink".to_string()],
            batch_size: 10,
            strict: true,
        }
    }

    /// With trajectory key fields
    #[inline]
    #[must_use]
    pub fn with_key_fields(mut self, fields: Vec<String>) -> Self {
        self.key_fields = fields;
        self
    }

    /// With batch size (clamped to at least 1)
    #[inline]
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// With strict parsing on or off
    #[inline]
    #[must_use]
    pub fn with_strict_parse(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Send a reviewer's owned columns from `workspace` to `shared`
    ///
    /// Tracks `users.csv` plus every `.csv` directly inside the workspace's
    /// `TrajectoriesToAnalyse/`, in sorted order.
    ///
    /// # Errors
    /// The first failing file's error, or [`WorkspaceError::Cancelled`].
    /// Files already written stay written.
    pub async fn reconcile(
        &self,
        workspace: &DataDir,
        shared: &DataDir,
        reviewer: &Reviewer,
        observer: &dyn ProgressObserver,
        cancel: &CancelFlag,
    ) -> WorkspaceResult<SendResult> {
        let files = self.tracked_files(workspace).await?;
        tracing::info!(
            "Reconciling {} files for {} into {}",
            files.len(),
            reviewer,
            shared.path().display()
        );

        let columns = reviewer.columns();
        let mut tracker = ProgressTracker::new(observer, files.len());
        tracker.start(format!("Sending back annotations for {reviewer}"));
        let mut reports = Vec::with_capacity(files.len());

        for batch in files.chunks(self.batch_size) {
            cancel.check()?;
            // read-ahead only; merges and writes below run one file at a time
            let sources = join_all(batch.iter().map(|(relative, _)| async move {
                self.load(&workspace.join(relative)).await
            }))
            .await;
            for ((relative, kind), source) in batch.iter().zip(sources) {
                let report = self
                    .merge_file(workspace, shared, &columns, relative, *kind, source)
                    .await
                    .map_err(|e| {
                        tracing::warn!(
                            "Send-back stopped at {} after {} files",
                            relative.display(),
                            reports.len()
                        );
                        e
                    })?;
                tracker.step(&shared.join(&report.path), format!("Sent {}", report.path.display()));
                reports.push(report);
            }
        }

        tracker.finish("Send-back complete");
        let result = SendResult {
            reviewer: reviewer.clone(),
            files: reports,
        };
        tracing::info!(
            "Reconciled {}: {} files written, {} rows updated",
            reviewer,
            result.written().count(),
            result.rows_updated()
        );
        Ok(result)
    }

    /// `users.csv` (if the workspace has it) plus workspace trajectory files
    async fn tracked_files(&self, workspace: &DataDir) -> WorkspaceResult<Vec<(PathBuf, TableKind)>> {
        let mut files = Vec::new();
        if self.topology.fs().is_file(&workspace.users_file()).await? {
            files.push((PathBuf::from(USERS_FILE), TableKind::Users));
        }
        for path in self.topology.trajectory_files(workspace).await? {
            if let Some(name) = path.file_name() {
                files.push((Path::new(TRAJECTORIES_DIR).join(name), TableKind::Trajectory));
            }
        }
        Ok(files)
    }

    /// Merge one file whose workspace copy was already loaded as `theirs`
    async fn merge_file(
        &self,
        workspace: &DataDir,
        shared: &DataDir,
        columns: &ReviewerColumns,
        relative: &Path,
        kind: TableKind,
        theirs: WorkspaceResult<Table>,
    ) -> WorkspaceResult<FileReport> {
        let fs = self.topology.fs();
        let source = workspace.join(relative);
        let target = shared.join(relative);
        if !fs.is_file(&target).await? {
            tracing::warn!("{} has no shared counterpart, skipped", relative.display());
            return Ok(FileReport::skipped(relative.to_path_buf(), FileStatus::MissingInShared));
        }

        let theirs = theirs?;
        let owned: Vec<String> = columns
            .required()
            .into_iter()
            .filter(|name| theirs.has_field(name))
            .map(str::to_string)
            .collect();
        if owned.is_empty() {
            tracing::warn!("{} carries no {} columns, skipped", source.display(), columns.reviewer());
            return Ok(FileReport::skipped(relative.to_path_buf(), FileStatus::NotAnnotated));
        }

        let _guard = self.locks.lock(&target).await;
        let mut ours = self.load(&target).await?;
        let mut changed = false;
        for name in &owned {
            changed |= ours.add_field(name.clone());
        }

        let matching = self.row_match(kind, &theirs, &ours, &target)?;
        let lookup = match &matching {
            RowMatch::ByKey(fields) => {
                key_index(&ours, fields, &target)?;
                Some((fields, key_index(&theirs, fields, &source)?))
            }
            RowMatch::ByPosition => None,
        };

        let mut rows_updated = 0;
        let mut rows_unmatched = 0;
        for row in 0..ours.len() {
            let partner = match &lookup {
                Some((fields, index)) => index.get(&row_key(&ours, row, fields)).copied(),
                None => (row < theirs.len()).then_some(row),
            };
            let Some(partner) = partner else {
                rows_unmatched += 1;
                continue;
            };
            let mut row_changed = false;
            for name in &owned {
                let value = theirs.get(partner, name).cloned().unwrap_or_default();
                if ours.get(row, name) != Some(&value) {
                    ours.set(row, name, value)
                        .map_err(|e| WorkspaceError::Annotation(e.into()))?;
                    row_changed = true;
                }
            }
            if row_changed {
                rows_updated += 1;
                changed = true;
            }
        }
        if rows_unmatched > 0 {
            tracing::warn!("{}: {} rows had no workspace match", target.display(), rows_unmatched);
        }

        let status = if changed {
            fs.write(&target, serialize(&ours).as_bytes()).await?;
            tracing::debug!("Merged {} ({} rows)", target.display(), rows_updated);
            FileStatus::Merged
        } else {
            tracing::debug!("{} already up to date", target.display());
            FileStatus::Unchanged
        };
        Ok(FileReport {
            path: relative.to_path_buf(),
            status,
            rows_updated,
            rows_unmatched,
        })
    }

    fn row_match(
        &self,
        kind: TableKind,
        theirs: &Table,
        ours: &Table,
        target: &Path,
    ) -> WorkspaceResult<RowMatch> {
        match kind {
            TableKind::Users => {
                for table in [ours, theirs] {
                    if !table.has_field(AUTHOR_FIELD) {
                        return Err(ConflictError::MissingKeyField {
                            path: target.to_path_buf(),
                            field: AUTHOR_FIELD.to_string(),
                        }
                        .into());
                    }
                }
                Ok(RowMatch::ByKey(vec![AUTHOR_FIELD.to_string()]))
            }
            TableKind::Trajectory => {
                let keyed = !self.key_fields.is_empty()
                    && self
                        .key_fields
                        .iter()
                        .all(|f| theirs.has_field(f) && ours.has_field(f));
                if keyed {
                    Ok(RowMatch::ByKey(self.key_fields.clone()))
                } else {
                    tracing::debug!("{} matched by row position", target.display());
                    Ok(RowMatch::ByPosition)
                }
            }
        }
    }

    async fn load(&self, path: &Path) -> WorkspaceResult<Table> {
        let text = self.topology.fs().read_to_string(path).await?;
        let parsed =
            parse(&text, ParseMode::Literal).map_err(|e| WorkspaceError::parse(path, e))?;
        if self.strict {
            parsed
                .into_strict()
                .map_err(|e| WorkspaceError::parse(path, e))
        } else {
            for diagnostic in &parsed.diagnostics {
                tracing::warn!("{}: {}", path.display(), diagnostic);
            }
            Ok(parsed.table)
        }
    }
}

fn row_key(table: &Table, row: usize, fields: &[String]) -> Vec<String> {
    fields
        .iter()
        .map(|f| table.get(row, f).map(ToString::to_string).unwrap_or_default())
        .collect()
}

/// Key to row index, rejecting duplicates
fn key_index(
    table: &Table,
    fields: &[String],
    path: &Path,
) -> Result<HashMap<Vec<String>, usize>, ConflictError> {
    let mut index = HashMap::with_capacity(table.len());
    for row in 0..table.len() {
        let key = row_key(table, row, fields);
        if index.insert(key.clone(), row).is_some() {
            return Err(ConflictError::DuplicateKey {
                path: path.to_path_buf(),
                key,
            });
        }
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{Filesystem, LocalFs};
    use crate::progress::{progress_channel, NoProgress};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    struct Fixture {
        _dir: tempfile::TempDir,
        topology: Topology,
        shared: DataDir,
        workspace: DataDir,
    }

    async fn fixture(shared_users: &str, workspace_users: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFs::new(dir.path());
        fs.create_dir_all(Path::new("Data")).await.unwrap();
        fs.create_dir_all(Path::new("Users/bob/Data")).await.unwrap();
        fs.write(Path::new("Data/users.csv"), shared_users.as_bytes())
            .await
            .unwrap();
        fs.write(Path::new("Users/bob/Data/users.csv"), workspace_users.as_bytes())
            .await
            .unwrap();
        let topology = Topology::new(Arc::new(fs));
        let shared = topology.resolve_shared_data().await.unwrap();
        let workspace = topology
            .resolve_user_data(&Reviewer::new("bob").unwrap())
            .await
            .unwrap();
        Fixture {
            _dir: dir,
            topology,
            shared,
            workspace,
        }
    }

    async fn run(f: &Fixture, reconciler: &Reconciler) -> WorkspaceResult<SendResult> {
        reconciler
            .reconcile(
                &f.workspace,
                &f.shared,
                &Reviewer::new("bob").unwrap(),
                &NoProgress,
                &CancelFlag::new(),
            )
            .await
    }

    async fn shared_text(f: &Fixture, relative: &str) -> String {
        f.topology
            .fs()
            .read_to_string(&f.shared.join(relative))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn copies_owned_columns_by_author() {
        let f = fixture(
            "Author,TotalPosts\ncarol,4\nalice,10",
            "Author,TotalPosts,Notes_bob,Summary_bob\nalice,99,hi,Notes saved\ncarol,4,,",
        )
        .await;
        let reconciler = Reconciler::new(f.topology.clone(), FileLocks::new());
        let result = run(&f, &reconciler).await.unwrap();

        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].status, FileStatus::Merged);
        assert_eq!(result.files[0].rows_updated, 1);
        assert_eq!(
            shared_text(&f, "users.csv").await,
            "Author,TotalPosts,Notes_bob,Summary_bob\ncarol,4,,\nalice,10,hi,Notes saved"
        );

        let again = run(&f, &reconciler).await.unwrap();
        assert_eq!(again.files[0].status, FileStatus::Unchanged);
    }

    #[tokio::test]
    async fn duplicate_author_is_a_conflict() {
        let f = fixture(
            "Author\nalice",
            "Author,Notes_bob,Summary_bob\nalice,a,\nalice,b,",
        )
        .await;
        let err = run(&f, &Reconciler::new(f.topology.clone(), FileLocks::new()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WorkspaceError::Conflict(ConflictError::DuplicateKey { .. })
        ));
    }

    #[tokio::test]
    async fn trajectories_match_by_key_then_position() {
        let f = fixture("Author\nalice", "Author,Notes_bob,Summary_bob\nalice,,").await;
        let fs = f.topology.fs();
        fs.create_dir_all(Path::new("Data/TrajectoriesToAnalyse"))
            .await
            .unwrap();
        fs.create_dir_all(Path::new("Users/bob/Data/TrajectoriesToAnalyse"))
            .await
            .unwrap();
        // shared file was re-scraped: rows reordered, one added
        fs.write(
            Path::new("Data/TrajectoriesToAnalyse/alice.csv"),
            b"permalink,title\n/p2,b\n/p3,c\n/p1,a",
        )
        .await
        .unwrap();
        fs.write(
            Path::new("Users/bob/Data/TrajectoriesToAnalyse/alice.csv"),
            b"permalink,title,Notes_bob,Summary_bob\n/p1,a,first,Notes saved\n/p2,b,second,Notes saved",
        )
        .await
        .unwrap();
        fs.write(
            Path::new("Users/bob/Data/TrajectoriesToAnalyse/zed.csv"),
            b"title,Notes_bob,Summary_bob\nx,,",
        )
        .await
        .unwrap();

        let result = run(&f, &Reconciler::new(f.topology.clone(), FileLocks::new()))
            .await
            .unwrap();
        let statuses: Vec<_> = result.files.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![FileStatus::Merged, FileStatus::Merged, FileStatus::MissingInShared]
        );
        assert_eq!(result.files[1].rows_unmatched, 1);
        assert_eq!(
            shared_text(&f, "TrajectoriesToAnalyse/alice.csv").await,
            "permalink,title,Notes_bob,Summary_bob\n/p2,b,second,Notes saved\n/p3,c,,\n/p1,a,first,Notes saved"
        );

        let by_position = Reconciler::new(f.topology.clone(), FileLocks::new())
            .with_key_fields(vec!["post_id".to_string()]);
        run(&f, &by_position).await.unwrap();
        assert_eq!(
            shared_text(&f, "TrajectoriesToAnalyse/alice.csv").await,
            "permalink,title,Notes_bob,Summary_bob\n/p2,b,first,Notes saved\n/p3,c,second,Notes saved\n/p1,a,first,Notes saved"
        );
    }

    async fn write_trajectories(f: &Fixture, files: &[(&str, &str, &str)]) {
        let fs = f.topology.fs();
        for dir in ["Data/TrajectoriesToAnalyse", "Users/bob/Data/TrajectoriesToAnalyse"] {
            fs.create_dir_all(Path::new(dir)).await.unwrap();
        }
        for (name, shared, workspace) in files {
            fs.write(&f.shared.join(format!("TrajectoriesToAnalyse/{name}")), shared.as_bytes())
                .await
                .unwrap();
            fs.write(
                &f.workspace.join(format!("TrajectoriesToAnalyse/{name}")),
                workspace.as_bytes(),
            )
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn workspace_only_rows_are_not_inserted() {
        let f = fixture(
            "Author,TotalPosts\ncarol,4",
            "Author,TotalPosts,Notes_bob,Summary_bob\ncarol,4,c,Notes saved\nzoe,1,z,Notes saved",
        )
        .await;
        let result = run(&f, &Reconciler::new(f.topology.clone(), FileLocks::new()))
            .await
            .unwrap();
        assert_eq!(result.rows_updated(), 1);
        assert_eq!(
            shared_text(&f, "users.csv").await,
            "Author,TotalPosts,Notes_bob,Summary_bob\ncarol,4,c,Notes saved"
        );
    }

    #[tokio::test]
    async fn only_notes_and_summary_are_sent() {
        let f = fixture("Author\nalice", "Author,Notes_bob,Summary_bob\nalice,,").await;
        write_trajectories(
            &f,
            &[(
                "alice.csv",
                "permalink,title\n/p1,a",
                "permalink,title,Notes_bob,Summary_bob,Topics_bob,BeliefDegree_bob\n/p1,edited,n,Notes saved,health,weak",
            )],
        )
        .await;
        run(&f, &Reconciler::new(f.topology.clone(), FileLocks::new()))
            .await
            .unwrap();
        assert_eq!(
            shared_text(&f, "TrajectoriesToAnalyse/alice.csv").await,
            "permalink,title,Notes_bob,Summary_bob\n/p1,a,n,Notes saved"
        );
    }

    #[tokio::test]
    async fn failure_leaves_later_files_untouched() {
        let f = fixture(
            "Author\nalice",
            "Author,Notes_bob,Summary_bob\nalice,seen,Notes saved",
        )
        .await;
        write_trajectories(
            &f,
            &[
                ("a.csv", "permalink,title\n/1,x", "permalink,title,Notes_bob,Summary_bob\n\"/1,x,,"),
                (
                    "b.csv",
                    "permalink,title\n/2,y",
                    "permalink,title,Notes_bob,Summary_bob\n/2,y,late,Notes saved",
                ),
            ],
        )
        .await;

        let err = run(&f, &Reconciler::new(f.topology.clone(), FileLocks::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::Parse { .. }));
        // users.csv sorts first and stays written; b.csv comes after the failure
        assert_eq!(
            shared_text(&f, "users.csv").await,
            "Author,Notes_bob,Summary_bob\nalice,seen,Notes saved"
        );
        assert_eq!(shared_text(&f, "TrajectoriesToAnalyse/a.csv").await, "permalink,title\n/1,x");
        assert_eq!(shared_text(&f, "TrajectoriesToAnalyse/b.csv").await, "permalink,title\n/2,y");
    }

    #[tokio::test]
    async fn progress_names_each_file_and_ends_at_100() {
        let f = fixture("Author\nalice", "Author,Notes_bob,Summary_bob\nalice,x,").await;
        write_trajectories(
            &f,
            &[("alice.csv", "permalink\n/p1", "permalink,Notes_bob,Summary_bob\n/p1,,")],
        )
        .await;
        let (observer, mut rx) = progress_channel();
        Reconciler::new(f.topology.clone(), FileLocks::new())
            .reconcile(
                &f.workspace,
                &f.shared,
                &Reviewer::new("bob").unwrap(),
                &observer,
                &CancelFlag::new(),
            )
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        let percents: Vec<_> = events.iter().map(|e| e.percent).collect();
        assert_eq!(percents, vec![0, 50, 99, 100]);
        let files: Vec<_> = events.iter().filter_map(|e| e.file.clone()).collect();
        assert_eq!(
            files,
            vec![
                PathBuf::from("Data/users.csv"),
                PathBuf::from("Data/TrajectoriesToAnalyse/alice.csv"),
            ]
        );
    }

    #[tokio::test]
    async fn cancellation_is_checked_between_batches() {
        let f = fixture("Author\nalice", "Author,Notes_bob,Summary_bob\nalice,x,").await;
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = Reconciler::new(f.topology.clone(), FileLocks::new())
            .reconcile(
                &f.workspace,
                &f.shared,
                &Reviewer::new("bob").unwrap(),
                &NoProgress,
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::Cancelled));
        assert_eq!(shared_text(&f, "users.csv").await, "Author\nalice");
    }
}
