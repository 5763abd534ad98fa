//! Summary status tags
//!
//! The `Summary_<reviewer>` column stores an ordered set of status tags as a
//! comma-joined string. [`SummaryTags`] is the in-memory form and renders with
//! `", "`; [`sync_notes_saved`] edits a stored string directly and keeps
//! whatever separators the other tags already use.

use indexmap::IndexSet;
use std::fmt::{self, Display, Formatter};

/// Tag added while a row has non-empty notes
pub const NOTES_SAVED: &str = "Notes saved";

const SEPARATOR: &str = ", ";

/// Insertion-ordered set of summary tags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryTags(IndexSet<String>);

impl SummaryTags {
    /// Empty tag set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the stored form
    ///
    /// Splits on commas, trims each token and drops empty ones, so stray
    /// separators in hand-edited files do not produce phantom tags.
    #[must_use]
    pub fn parse(stored: &str) -> Self {
        Self(
            stored
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Add a tag at the end; no-op if present
    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        self.0.insert(tag.into())
    }

    /// Remove exactly one tag, keeping the order of the rest
    pub fn remove(&mut self, tag: &str) -> bool {
        self.0.shift_remove(tag)
    }

    /// Membership check
    #[inline]
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    /// Number of tags
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// No tags
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Tags in order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Toggle [`NOTES_SAVED`] inside a stored summary string
///
/// Only the `Notes saved` token and the one separator next to it are added or
/// removed; every other tag keeps its exact text and spacing.
#[must_use]
pub fn sync_notes_saved(stored: &str, notes: &str) -> String {
    let has_tag = stored.split(',').any(|t| t.trim() == NOTES_SAVED);
    if notes.is_empty() {
        if !has_tag {
            return stored.to_string();
        }
        let kept: Vec<&str> = stored
            .split(',')
            .filter(|t| t.trim() != NOTES_SAVED)
            .collect();
        let mut out = kept.join(",");
        if stored.split(',').next().map(str::trim) == Some(NOTES_SAVED) {
            out = out.trim_start().to_string();
        }
        out
    } else if has_tag {
        stored.to_string()
    } else {
        let rest = stored.trim_end_matches(|c: char| c == ',' || c.is_whitespace());
        if rest.is_empty() {
            NOTES_SAVED.to_string()
        } else {
            format!("{rest}{SEPARATOR}{NOTES_SAVED}")
        }
    }
}

impl Display for SummaryTags {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, tag) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(SEPARATOR)?;
            }
            f.write_str(tag)?;
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<S> for SummaryTags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_render() {
        let tags = SummaryTags::parse("Flagged,  Notes saved,,");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags.to_string(), "Flagged, Notes saved");
        assert!(SummaryTags::parse("").is_empty());
    }

    #[test]
    fn notes_toggle_adds_once() {
        let stored = sync_notes_saved("", "");
        let stored = sync_notes_saved(&stored, "x");
        let stored = sync_notes_saved(&stored, "y");
        assert_eq!(stored, NOTES_SAVED);
    }

    #[test]
    fn notes_toggle_removes_only_its_tag() {
        assert_eq!(sync_notes_saved("Flagged, Notes saved", ""), "Flagged");
        assert_eq!(
            sync_notes_saved("Notes saved, Flagged, Reviewed", ""),
            "Flagged, Reviewed"
        );
    }

    #[test]
    fn stored_toggle_keeps_neighbouring_separators() {
        assert_eq!(sync_notes_saved("Flagged,Reviewed", "x"), "Flagged,Reviewed, Notes saved");
        assert_eq!(sync_notes_saved("Flagged,Notes saved,Reviewed", ""), "Flagged,Reviewed");
        assert_eq!(sync_notes_saved("Notes saved;  Flagged", ""), "Notes saved;  Flagged");
        assert_eq!(sync_notes_saved("Notes saved,  Flagged", ""), "Flagged");
        assert_eq!(sync_notes_saved("Flagged ,Notes saved", ""), "Flagged ");
        assert_eq!(sync_notes_saved("Flagged,Notes saved", "y"), "Flagged,Notes saved");
        assert_eq!(sync_notes_saved("", "y"), NOTES_SAVED);
        assert_eq!(sync_notes_saved("", ""), "");
    }

    #[test]
    fn similar_tags_are_distinct() {
        assert_eq!(
            sync_notes_saved("Notes saved later, Notes saved", ""),
            "Notes saved later"
        );
        let mut tags = SummaryTags::parse("Notes saved later");
        assert!(!tags.contains(NOTES_SAVED));
        assert!(tags.insert(NOTES_SAVED));
        assert!(tags.remove(NOTES_SAVED));
        assert_eq!(tags.to_string(), "Notes saved later");
    }
}
