//! Annotation store
//!
//! Reads one reviewer table (`users.csv` or a trajectory file), exposes the
//! reviewer's owned cells row by row, and writes the whole table back on
//! [`AnnotationStore::persist`]. Every setter mutates the in-memory table
//! only; nothing reaches storage until the caller persists.

use crate::cache::TableCache;
use crate::error::{AnnotationError, WorkspaceError, WorkspaceResult};
use crate::locks::FileLocks;
use crate::topology::{DataDir, Topology};
use annofork_table::{
    serialize, sync_notes_saved, OwnedColumn, ParseMode, Reviewer, ReviewerColumns, RowDiagnostic,
    StructuredField, SummaryTags, Table, Value,
};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

/// Natural key field of `users.csv`
pub const AUTHOR_FIELD: &str = "Author";

const MULTI_SELECT_SEPARATOR: &str = "; ";

/// Which of the two table shapes is open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    /// `Data/users.csv`, keyed by `Author`
    Users,
    /// `Data/TrajectoriesToAnalyse/<author>.csv`, keyed by row position
    Trajectory,
}

impl TableKind {
    /// Short name for messages
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Trajectory => "trajectory",
        }
    }
}

/// Natural key of one row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RowKey {
    /// `Author` value in `users.csv`
    Author(String),
    /// 1-based row number in a trajectory file
    Position(usize),
}

impl Display for RowKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Author(author) => write!(f, "Author={author}"),
            Self::Position(row) => write!(f, "row {row}"),
        }
    }
}

/// The eight structured per-post judgments
///
/// Multi-select fields hold one entry per selected option and are stored
/// `"; "`-joined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredJudgment {
    /// Selected topics
    pub topics: Vec<String>,
    /// Free-text topic detail
    pub specific_topic: String,
    /// Degree of belief expressed by the post
    pub belief_degree: String,
    /// Comments on the belief judgment
    pub belief_comments: String,
    /// Selected reactions seen in comments
    pub comment_reactions: Vec<String>,
    /// Comments on the reactions
    pub reaction_comments: String,
    /// Selected sources cited by the post
    pub sources_used: Vec<String>,
    /// Comments on the sources
    pub source_comments: String,
}

impl StructuredJudgment {
    /// Storage form of one field
    #[must_use]
    pub fn cell(&self, field: StructuredField) -> String {
        match field {
            StructuredField::Topics => self.topics.join(MULTI_SELECT_SEPARATOR),
            StructuredField::SpecificTopic => self.specific_topic.clone(),
            StructuredField::BeliefDegree => self.belief_degree.clone(),
            StructuredField::BeliefComments => self.belief_comments.clone(),
            StructuredField::CommentReactions => self.comment_reactions.join(MULTI_SELECT_SEPARATOR),
            StructuredField::ReactionComments => self.reaction_comments.clone(),
            StructuredField::SourcesUsed => self.sources_used.join(MULTI_SELECT_SEPARATOR),
            StructuredField::SourceComments => self.source_comments.clone(),
        }
    }

    /// Rebuild from stored cells
    pub fn from_cells(mut cell: impl FnMut(StructuredField) -> String) -> Self {
        fn split(stored: &str) -> Vec<String> {
            stored
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        }
        Self {
            topics: split(&cell(StructuredField::Topics)),
            specific_topic: cell(StructuredField::SpecificTopic),
            belief_degree: cell(StructuredField::BeliefDegree),
            belief_comments: cell(StructuredField::BeliefComments),
            comment_reactions: split(&cell(StructuredField::CommentReactions)),
            reaction_comments: cell(StructuredField::ReactionComments),
            sources_used: split(&cell(StructuredField::SourcesUsed)),
            source_comments: cell(StructuredField::SourceComments),
        }
    }

    /// Every field unset
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A reviewer's view of one row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotation {
    /// `Notes_<reviewer>`
    pub notes: String,
    /// `Summary_<reviewer>`
    pub summary: SummaryTags,
    /// Structured judgments; `None` unless the table carries the columns
    pub structured: Option<StructuredJudgment>,
}

/// One open table plus the reviewer it is being edited for
#[derive(Debug, Clone)]
pub struct AnnotatedTable {
    kind: TableKind,
    path: PathBuf,
    columns: ReviewerColumns,
    table: Table,
    dirty: bool,
}

impl AnnotatedTable {
    /// Wrap a parsed table, adding the reviewer's required columns if absent
    #[must_use]
    pub fn new(kind: TableKind, path: impl Into<PathBuf>, reviewer: &Reviewer, mut table: Table) -> Self {
        let columns = reviewer.columns();
        let added = columns.inject_required(&mut table);
        Self {
            kind,
            path: path.into(),
            columns,
            table,
            dirty: !added.is_empty(),
        }
    }

    /// Table shape
    #[inline]
    #[must_use]
    pub fn kind(&self) -> TableKind {
        self.kind
    }

    /// Location relative to the dataset root
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Underlying table
    #[inline]
    #[must_use]
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Reviewer column names
    #[inline]
    #[must_use]
    pub fn columns(&self) -> &ReviewerColumns {
        &self.columns
    }

    /// Unsaved changes exist
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Index of the row a key addresses
    ///
    /// # Errors
    /// [`AnnotationError::KeyKind`] if the key does not fit the table shape,
    /// [`AnnotationError::UnknownRow`] if no row matches
    pub fn row_index(&self, key: &RowKey) -> Result<usize, AnnotationError> {
        match (self.kind, key) {
            (TableKind::Users, RowKey::Author(author)) => self
                .table
                .find_row(AUTHOR_FIELD, author)
                .ok_or_else(|| AnnotationError::UnknownRow(key.to_string())),
            (TableKind::Trajectory, RowKey::Position(row)) if (1..=self.table.len()).contains(row) => {
                Ok(row - 1)
            }
            (TableKind::Trajectory, RowKey::Position(_)) => {
                Err(AnnotationError::UnknownRow(key.to_string()))
            }
            _ => Err(AnnotationError::KeyKind {
                key: key.to_string(),
                table: self.kind.name(),
            }),
        }
    }

    /// Read the reviewer's cells for one row
    ///
    /// # Errors
    /// See [`AnnotatedTable::row_index`]
    pub fn get_annotation(&self, key: &RowKey) -> Result<Annotation, AnnotationError> {
        let row = self.row_index(key)?;
        let structured = (self.kind == TableKind::Trajectory
            && self.columns.has_structured(&self.table))
        .then(|| {
            StructuredJudgment::from_cells(|field| {
                self.cell(row, &self.columns.name(OwnedColumn::Structured(field)))
            })
        });
        Ok(Annotation {
            notes: self.cell(row, self.columns.notes()),
            summary: SummaryTags::parse(&self.cell(row, self.columns.summary())),
            structured,
        })
    }

    /// Replace a row's notes and toggle the "Notes saved" tag to match
    ///
    /// # Errors
    /// See [`AnnotatedTable::row_index`]
    pub fn set_notes(&mut self, key: &RowKey, text: &str) -> Result<(), AnnotationError> {
        let row = self.row_index(key)?;
        let summary = sync_notes_saved(&self.cell(row, self.columns.summary()), text);
        let notes = self.columns.notes().to_string();
        self.table.set(row, &notes, text)?;
        let summary_field = self.columns.summary().to_string();
        self.table.set(row, &summary_field, summary)?;
        self.dirty = true;
        Ok(())
    }

    /// Replace a row's summary tags
    ///
    /// # Errors
    /// See [`AnnotatedTable::row_index`]
    pub fn set_tags(&mut self, key: &RowKey, tags: &SummaryTags) -> Result<(), AnnotationError> {
        let row = self.row_index(key)?;
        self.write_tags(row, tags)
    }

    /// Store all eight structured judgments for a row
    ///
    /// Adds the structured columns to the table first if any are missing.
    ///
    /// # Errors
    /// [`AnnotationError::NotTrajectory`] on `users.csv`, otherwise see
    /// [`AnnotatedTable::row_index`]
    pub fn set_structured(
        &mut self,
        key: &RowKey,
        judgment: &StructuredJudgment,
    ) -> Result<(), AnnotationError> {
        if self.kind != TableKind::Trajectory {
            return Err(AnnotationError::NotTrajectory);
        }
        let row = self.row_index(key)?;
        if !self.columns.inject_structured(&mut self.table).is_empty() {
            self.dirty = true;
        }
        for (field, name) in self.columns.structured() {
            self.table.set(row, &name, judgment.cell(field))?;
        }
        self.dirty = true;
        Ok(())
    }

    fn write_tags(&mut self, row: usize, tags: &SummaryTags) -> Result<(), AnnotationError> {
        let summary = self.columns.summary().to_string();
        self.table.set(row, &summary, tags.to_string())?;
        self.dirty = true;
        Ok(())
    }

    fn cell(&self, row: usize, field: &str) -> String {
        self.table
            .get(row, field)
            .map(Value::to_string)
            .unwrap_or_default()
    }
}

/// A freshly loaded table and what the codec had to say about it
#[derive(Debug, Clone)]
pub struct Loaded {
    /// The open table
    pub table: AnnotatedTable,
    /// Rows renamed or dropped while parsing; always empty in strict mode
    pub diagnostics: Vec<RowDiagnostic>,
}

/// Loads and persists one reviewer's tables
#[derive(Debug, Clone)]
pub struct AnnotationStore {
    topology: Topology,
    locks: FileLocks,
    cache: TableCache,
    reviewer: Reviewer,
    strict: bool,
}

impl AnnotationStore {
    /// Store for one reviewer
    #[must_use]
    pub fn new(topology: Topology, locks: FileLocks, cache: TableCache, reviewer: Reviewer) -> Self {
        Self {
            topology,
            locks,
            cache,
            reviewer,
            strict: true,
        }
    }

    /// Accept tables with codec diagnostics instead of failing
    #[inline]
    #[must_use]
    pub fn with_strict_parse(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Reviewer this store edits for
    #[inline]
    #[must_use]
    pub fn reviewer(&self) -> &Reviewer {
        &self.reviewer
    }

    /// Open a table for annotation
    ///
    /// # Errors
    /// Storage failures, header parse errors, and (in strict mode) any row
    /// diagnostic
    pub async fn load(&self, path: &Path, kind: TableKind) -> WorkspaceResult<Loaded> {
        let text = self.topology.fs().read_to_string(path).await?;
        let parsed = self
            .cache
            .parse(&text, ParseMode::Literal)
            .await
            .map_err(|e| WorkspaceError::parse(path, e))?;
        let (table, diagnostics) = if self.strict {
            let table = parsed
                .into_strict()
                .map_err(|e| WorkspaceError::parse(path, e))?;
            (table, Vec::new())
        } else {
            for diagnostic in &parsed.diagnostics {
                tracing::warn!("{}: {}", path.display(), diagnostic);
            }
            (parsed.table, parsed.diagnostics)
        };
        tracing::debug!("Loaded {} ({} rows)", path.display(), table.len());
        Ok(Loaded {
            table: AnnotatedTable::new(kind, path, &self.reviewer, table),
            diagnostics,
        })
    }

    /// Open `users.csv` in a data folder
    ///
    /// # Errors
    /// See [`AnnotationStore::load`]
    pub async fn load_users(&self, data: &DataDir) -> WorkspaceResult<Loaded> {
        self.load(&data.users_file(), TableKind::Users).await
    }

    /// Open an author's trajectory file in a data folder
    ///
    /// # Errors
    /// [`crate::StructureError::MissingTrajectoryFile`] if absent, otherwise
    /// see [`AnnotationStore::load`]
    pub async fn load_trajectory(&self, data: &DataDir, author: &str) -> WorkspaceResult<Loaded> {
        let path = self.topology.resolve_trajectory_file(data, author).await?;
        self.load(&path, TableKind::Trajectory).await
    }

    /// Parse a file with typed scalars for display, without annotation wrapping
    ///
    /// # Errors
    /// Storage failures and header parse errors
    pub async fn view(&self, path: &Path) -> WorkspaceResult<Table> {
        let text = self.topology.fs().read_to_string(path).await?;
        let parsed = self
            .cache
            .parse(&text, ParseMode::Typed)
            .await
            .map_err(|e| WorkspaceError::parse(path, e))?;
        Ok(parsed.table)
    }

    /// Write the whole table back to where it was loaded from
    ///
    /// # Errors
    /// Storage failures; the table stays dirty so the caller can retry
    pub async fn persist(&self, table: &mut AnnotatedTable) -> WorkspaceResult<()> {
        let _guard = self.locks.lock(&table.path).await;
        let text = serialize(&table.table);
        self.topology.fs().write(&table.path, text.as_bytes()).await?;
        table.dirty = false;
        tracing::debug!("Persisted {} ({} rows)", table.path.display(), table.table.len());
        Ok(())
    }
}
