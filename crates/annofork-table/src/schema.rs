//! Reviewer-scoped column schema
//!
//! Every reviewer owns a fixed set of columns whose names are the column
//! prefix joined to the reviewer name with `_`. Ownership is looked up by
//! reviewer, never by scanning field names for a prefix.

use crate::error::ReviewerError;
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// A validated reviewer name
///
/// Doubles as the folder name under `Users/`, so anything that is not a
/// single plain path segment is rejected.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Reviewer(String);

impl Reviewer {
    /// Validate and wrap a reviewer name
    ///
    /// # Errors
    /// - [`ReviewerError::Empty`] for an empty name
    /// - [`ReviewerError::Untrimmed`] for surrounding whitespace
    /// - [`ReviewerError::InvalidCharacters`] for separators, control
    ///   characters, `.` or `..`
    pub fn new(name: impl Into<String>) -> Result<Self, ReviewerError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ReviewerError::Empty);
        }
        if name.trim() != name {
            return Err(ReviewerError::Untrimmed(name));
        }
        if name == "."
            || name == ".."
            || name.chars().any(|c| c == '/' || c == '\\' || c.is_control())
        {
            return Err(ReviewerError::InvalidCharacters(name));
        }
        Ok(Self(name))
    }

    /// Borrow the name
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Column names owned by this reviewer
    #[inline]
    #[must_use]
    pub fn columns(&self) -> ReviewerColumns {
        ReviewerColumns::new(self)
    }
}

impl Display for Reviewer {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Reviewer {
    type Err = ReviewerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Reviewer {
    type Error = ReviewerError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Reviewer> for String {
    fn from(r: Reviewer) -> Self {
        r.0
    }
}

impl AsRef<str> for Reviewer {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Structured per-post judgments (trajectory tables only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StructuredField {
    /// Multi-select topic list
    Topics,
    /// Free-text specific topic
    SpecificTopic,
    /// Degree of belief expressed
    BeliefDegree,
    /// Comments on the belief judgment
    BeliefComments,
    /// Multi-select reactions in comments
    CommentReactions,
    /// Comments on the reactions
    ReactionComments,
    /// Multi-select sources cited
    SourcesUsed,
    /// Comments on the sources
    SourceComments,
}

impl StructuredField {
    /// All structured fields in column order
    pub const ALL: [Self; 8] = [
        Self::Topics,
        Self::SpecificTopic,
        Self::BeliefDegree,
        Self::BeliefComments,
        Self::CommentReactions,
        Self::ReactionComments,
        Self::SourcesUsed,
        Self::SourceComments,
    ];

    /// Column prefix
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Topics => "Topics",
            Self::SpecificTopic => "SpecificTopic",
            Self::BeliefDegree => "BeliefDegree",
            Self::BeliefComments => "BeliefComments",
            Self::CommentReactions => "CommentReactions",
            Self::ReactionComments => "ReactionComments",
            Self::SourcesUsed => "SourcesUsed",
            Self::SourceComments => "SourceComments",
        }
    }

    /// Multi-select fields are stored `"; "`-joined
    #[must_use]
    pub const fn is_multi_select(self) -> bool {
        matches!(self, Self::Topics | Self::CommentReactions | Self::SourcesUsed)
    }
}

/// A column a reviewer owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OwnedColumn {
    /// Free-form notes
    Notes,
    /// Comma-joined status tags
    Summary,
    /// One of the structured judgments
    Structured(StructuredField),
}

impl OwnedColumn {
    /// Columns injected into every table at fork time
    pub const REQUIRED: [Self; 2] = [Self::Notes, Self::Summary];

    /// Column prefix
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Notes => "Notes",
            Self::Summary => "Summary",
            Self::Structured(field) => field.prefix(),
        }
    }

    /// Concrete column name for a reviewer
    #[must_use]
    pub fn name_for(self, reviewer: &Reviewer) -> String {
        format!("{}_{}", self.prefix(), reviewer.as_str())
    }
}

/// Resolved column names for one reviewer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewerColumns {
    reviewer: Reviewer,
    notes: String,
    summary: String,
}

impl ReviewerColumns {
    /// Resolve names for a reviewer
    #[must_use]
    pub fn new(reviewer: &Reviewer) -> Self {
        Self {
            reviewer: reviewer.clone(),
            notes: OwnedColumn::Notes.name_for(reviewer),
            summary: OwnedColumn::Summary.name_for(reviewer),
        }
    }

    /// Owning reviewer
    #[inline]
    #[must_use]
    pub fn reviewer(&self) -> &Reviewer {
        &self.reviewer
    }

    /// `Notes_<reviewer>`
    #[inline]
    #[must_use]
    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// `Summary_<reviewer>`
    #[inline]
    #[must_use]
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Name of any owned column
    #[must_use]
    pub fn name(&self, column: OwnedColumn) -> String {
        match column {
            OwnedColumn::Notes => self.notes.clone(),
            OwnedColumn::Summary => self.summary.clone(),
            other => other.name_for(&self.reviewer),
        }
    }

    /// The two columns every table carries, in injection order
    #[must_use]
    pub fn required(&self) -> [&str; 2] {
        [&self.notes, &self.summary]
    }

    /// All eight structured-judgment column names, in column order
    #[must_use]
    pub fn structured(&self) -> Vec<(StructuredField, String)> {
        StructuredField::ALL
            .iter()
            .map(|&f| (f, OwnedColumn::Structured(f).name_for(&self.reviewer)))
            .collect()
    }

    /// Add whichever required columns are missing
    ///
    /// Each column is checked independently; existing columns and their
    /// values are left untouched. Returns the names that were added.
    pub fn inject_required(&self, table: &mut Table) -> Vec<String> {
        self.required()
            .into_iter()
            .filter(|name| table.add_field(*name))
            .map(str::to_string)
            .collect()
    }

    /// Add whichever structured columns are missing
    pub fn inject_structured(&self, table: &mut Table) -> Vec<String> {
        self.structured()
            .into_iter()
            .filter_map(|(_, name)| table.add_field(name.clone()).then_some(name))
            .collect()
    }

    /// Whether the table carries the full structured set
    #[must_use]
    pub fn has_structured(&self, table: &Table) -> bool {
        self.structured()
            .iter()
            .all(|(_, name)| table.has_field(name))
    }
}
