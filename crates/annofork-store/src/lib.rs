//! annofork Workspace Engine
//!
//! Forks a shared CSV dataset into per-reviewer workspaces, edits reviewer
//! annotation columns, and reconciles them back into the shared copy.
//!
//! # Architecture
//!
//! ```text
//! Filesystem ──► Topology ──► Forker        (Data/ → Users/<r>/Data/)
//!                   │
//!                   ├───────► AnnotationStore (load / set / persist)
//!                   │
//!                   └───────► Reconciler    (Users/<r>/Data/ → Data/)
//! ```
//!
//! [`Session`] ties the pieces together for one reviewer.
//!
//! # Example
//!
//! ```rust,no_run
//! use annofork_store::{AnnotatorConfig, CancelFlag, LocalFs, NoProgress, RowKey, Session};
//! use annofork_table::Reviewer;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let fs = Arc::new(LocalFs::new("/datasets/reddit"));
//! let bob = Reviewer::new("bob")?;
//! let (mut session, _) =
//!     Session::open(fs, bob, AnnotatorConfig::default(), &NoProgress, &CancelFlag::new()).await?;
//!
//! let mut users = session.open_users().await?.table;
//! users.set_notes(&RowKey::Author("alice".into()), "interesting")?;
//! session.save(&mut users).await?;
//!
//! session.reconcile(&NoProgress, &CancelFlag::new()).await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

mod annotation;
mod cache;
mod config;
mod error;
mod fork;
mod fs;
mod locks;
mod progress;
mod reconcile;
mod session;
mod topology;

pub use annotation::{
    AnnotatedTable, Annotation, AnnotationStore, Loaded, RowKey, StructuredJudgment, TableKind,
    AUTHOR_FIELD,
};
pub use cache::{CacheStats, TableCache};
pub use config::AnnotatorConfig;
pub use error::{
    AnnotationError, ConfigError, ConflictError, StorageError, StructureError, WorkspaceError,
    WorkspaceResult,
};
pub use fork::{ForkReport, Forker};
pub use fs::{is_csv_name, DirEntry, EntryKind, Filesystem, LocalFs};
pub use locks::FileLocks;
pub use progress::{progress_channel, CancelFlag, NoProgress, ProgressEvent, ProgressObserver};
pub use reconcile::{FileReport, FileStatus, Reconciler, SendResult};
pub use session::{known_reviewers, Session, ViewedItem};
pub use topology::{
    workspace_data_path, DataDir, Topology, DATA_DIR, TRAJECTORIES_DIR, USERS_DIR, USERS_FILE,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
