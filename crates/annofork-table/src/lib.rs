//! annofork Table Model
//!
//! In-memory CSV tables and the reviewer column schema shared by every
//! annofork component.
//!
//! # Core Concepts
//!
//! - [`Table`]: ordered unique fields + ordered rows of [`Value`]s
//! - [`parse`] / [`serialize`]: tolerant CSV codec with row diagnostics
//! - [`Reviewer`] / [`ReviewerColumns`]: typed per-reviewer column names
//! - [`SummaryTags`]: the `Summary_<reviewer>` tag set
//! - [`ContentHash`]: Blake3 digest of raw file text
//!
//! # Example
//!
//! ```rust
//! use annofork_table::{parse, serialize, ParseMode, Reviewer};
//!
//! let mut table = parse("Author,TotalPosts\nalice,10", ParseMode::Literal)?
//!     .into_strict()?;
//! let bob = Reviewer::new("bob")?;
//! bob.columns().inject_required(&mut table);
//!
//! assert_eq!(
//!     serialize(&table),
//!     "Author,TotalPosts,Notes_bob,Summary_bob\nalice,10,,"
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

mod codec;
mod error;
mod hash;
mod schema;
mod table;
mod tags;
mod value;

pub use codec::{parse, serialize, ParseMode, Parsed};
pub use error::{DiagnosticKind, ParseError, ReviewerError, RowDiagnostic, TableError};
pub use hash::ContentHash;
pub use schema::{OwnedColumn, Reviewer, ReviewerColumns, StructuredField};
pub use table::{RowView, Table};
pub use tags::{sync_notes_saved, SummaryTags, NOTES_SAVED};
pub use value::Value;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
