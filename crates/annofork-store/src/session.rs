//! Reviewer session context
//!
//! Owns everything one reviewer's session needs (dataset handles, resolved
//! data folders, the annotation store, and the last viewed item) so that no
//! component reads ambient state.

use crate::annotation::{AnnotatedTable, AnnotationStore, Loaded, RowKey};
use crate::cache::TableCache;
use crate::config::AnnotatorConfig;
use crate::error::{StructureError, WorkspaceError, WorkspaceResult};
use crate::fork::{ForkReport, Forker};
use crate::fs::Filesystem;
use crate::locks::FileLocks;
use crate::progress::{CancelFlag, ProgressObserver};
use crate::reconcile::{Reconciler, SendResult};
use crate::topology::{DataDir, Topology};
use annofork_table::Reviewer;
use std::collections::BTreeSet;
use std::sync::Arc;

/// What the reviewer looked at last
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewedItem {
    /// The `users.csv` overview
    Users,
    /// One author's trajectory file
    Trajectory {
        /// Author whose file is open
        author: String,
    },
    /// A single row
    Row {
        /// Author whose file holds the row, `None` for `users.csv`
        author: Option<String>,
        /// Row key
        key: RowKey,
    },
}

/// One reviewer's open workspace
#[derive(Debug, Clone)]
pub struct Session {
    topology: Topology,
    config: AnnotatorConfig,
    locks: FileLocks,
    reviewer: Reviewer,
    shared: DataDir,
    workspace: DataDir,
    store: AnnotationStore,
    last_viewed: Option<ViewedItem>,
}

/// Reviewers with a folder under `Users/`; empty when `Users/` is absent
///
/// # Errors
/// Storage failures only
pub async fn known_reviewers(topology: &Topology) -> WorkspaceResult<BTreeSet<String>> {
    match topology.list_reviewers().await {
        Err(WorkspaceError::Structure(StructureError::MissingUsersFolder(_))) => {
            Ok(BTreeSet::new())
        }
        other => other,
    }
}

impl Session {
    /// Open a reviewer's workspace, forking it first if the reviewer is new
    ///
    /// Returns the fork report when a fork happened.
    ///
    /// # Errors
    /// Structure, storage, parse, or cancellation errors from the fork, or a
    /// structure error if the workspace is incomplete
    pub async fn open(
        fs: Arc<dyn Filesystem>,
        reviewer: Reviewer,
        config: AnnotatorConfig,
        observer: &dyn ProgressObserver,
        cancel: &CancelFlag,
    ) -> WorkspaceResult<(Self, Option<ForkReport>)> {
        config.validate()?;
        let topology = Topology::new(fs);
        let report = if known_reviewers(&topology).await?.contains(reviewer.as_str()) {
            None
        } else {
            Some(Self::forker(&topology, &config).fork(&reviewer, observer, cancel).await?)
        };
        let session = Self::attach_to(topology, reviewer, config).await?;
        Ok((session, report))
    }

    /// Fork a workspace for a new reviewer and open it
    ///
    /// # Errors
    /// [`WorkspaceError::WorkspaceExists`] if `Users/<reviewer>/` is already
    /// there, otherwise as [`Session::open`]
    pub async fn create(
        fs: Arc<dyn Filesystem>,
        reviewer: Reviewer,
        config: AnnotatorConfig,
        observer: &dyn ProgressObserver,
        cancel: &CancelFlag,
    ) -> WorkspaceResult<(Self, ForkReport)> {
        config.validate()?;
        let topology = Topology::new(fs);
        if known_reviewers(&topology).await?.contains(reviewer.as_str()) {
            return Err(WorkspaceError::WorkspaceExists(reviewer.to_string()));
        }
        let report = Self::forker(&topology, &config)
            .fork(&reviewer, observer, cancel)
            .await?;
        let session = Self::attach_to(topology, reviewer, config).await?;
        Ok((session, report))
    }

    /// Open an existing workspace without forking
    ///
    /// # Errors
    /// Structure errors naming the first missing folder
    pub async fn attach(
        fs: Arc<dyn Filesystem>,
        reviewer: Reviewer,
        config: AnnotatorConfig,
    ) -> WorkspaceResult<Self> {
        config.validate()?;
        Self::attach_to(Topology::new(fs), reviewer, config).await
    }

    async fn attach_to(
        topology: Topology,
        reviewer: Reviewer,
        config: AnnotatorConfig,
    ) -> WorkspaceResult<Self> {
        let shared = topology.resolve_shared_data().await?;
        let workspace = topology.resolve_user_data(&reviewer).await?;
        let locks = FileLocks::new();
        let store = AnnotationStore::new(
            topology.clone(),
            locks.clone(),
            TableCache::new(config.cache_capacity),
            reviewer.clone(),
        )
        .with_strict_parse(config.strict_parse);
        tracing::info!("Opened workspace {} for {}", workspace.path().display(), reviewer);
        Ok(Self {
            topology,
            config,
            locks,
            reviewer,
            shared,
            workspace,
            store,
            last_viewed: None,
        })
    }

    fn forker(topology: &Topology, config: &AnnotatorConfig) -> Forker {
        Forker::new(topology.clone()).with_strict_parse(config.strict_parse)
    }

    /// Current reviewer
    #[inline]
    #[must_use]
    pub fn reviewer(&self) -> &Reviewer {
        &self.reviewer
    }

    /// Dataset navigator
    #[inline]
    #[must_use]
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Shared `Data/`
    #[inline]
    #[must_use]
    pub fn shared(&self) -> &DataDir {
        &self.shared
    }

    /// `Users/<reviewer>/Data/`
    #[inline]
    #[must_use]
    pub fn workspace(&self) -> &DataDir {
        &self.workspace
    }

    /// Annotation store bound to this reviewer
    #[inline]
    #[must_use]
    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &AnnotatorConfig {
        &self.config
    }

    /// What was viewed last, if anything
    #[inline]
    #[must_use]
    pub fn last_viewed(&self) -> Option<&ViewedItem> {
        self.last_viewed.as_ref()
    }

    /// Record a row as viewed
    pub fn view_row(&mut self, author: Option<String>, key: RowKey) {
        self.last_viewed = Some(ViewedItem::Row { author, key });
    }

    /// Open the workspace `users.csv`
    ///
    /// # Errors
    /// See [`AnnotationStore::load`]
    pub async fn open_users(&mut self) -> WorkspaceResult<Loaded> {
        let loaded = self.store.load_users(&self.workspace).await?;
        self.last_viewed = Some(ViewedItem::Users);
        Ok(loaded)
    }

    /// Open one author's workspace trajectory file
    ///
    /// # Errors
    /// See [`AnnotationStore::load_trajectory`]
    pub async fn open_trajectory(&mut self, author: &str) -> WorkspaceResult<Loaded> {
        let loaded = self.store.load_trajectory(&self.workspace, author).await?;
        self.last_viewed = Some(ViewedItem::Trajectory {
            author: author.to_string(),
        });
        Ok(loaded)
    }

    /// Save an open table
    ///
    /// # Errors
    /// See [`AnnotationStore::persist`]
    pub async fn save(&self, table: &mut AnnotatedTable) -> WorkspaceResult<()> {
        self.store.persist(table).await
    }

    /// Send this reviewer's columns back to the shared root
    ///
    /// # Errors
    /// See [`Reconciler::reconcile`]
    pub async fn reconcile(
        &self,
        observer: &dyn ProgressObserver,
        cancel: &CancelFlag,
    ) -> WorkspaceResult<SendResult> {
        Reconciler::new(self.topology.clone(), self.locks.clone())
            .with_key_fields(self.config.trajectory_key_fields.clone())
            .with_batch_size(self.config.reconcile_batch_size)
            .with_strict_parse(self.config.strict_parse)
            .reconcile(&self.workspace, &self.shared, &self.reviewer, observer, cancel)
            .await
    }
}
