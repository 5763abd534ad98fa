//! Progress reporting and cooperative cancellation
//!
//! Long operations (fork, reconcile) emit [`ProgressEvent`]s through a
//! [`ProgressObserver`] and check a [`CancelFlag`] between files.

use crate::error::{WorkspaceError, WorkspaceResult};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// One progress update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// 0..=100, non-decreasing within one operation
    pub percent: u8,
    /// Human-readable status
    pub message: String,
    /// File just processed, if any
    pub file: Option<PathBuf>,
}

/// Receiver of progress updates
pub trait ProgressObserver: Send + Sync {
    /// Handle one update
    fn report(&self, event: ProgressEvent);
}

impl<F> ProgressObserver for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn report(&self, event: ProgressEvent) {
        self(event);
    }
}

/// Observer that drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Observer backed by an unbounded channel
///
/// Events sent after the receiver is dropped are discarded.
#[must_use]
pub fn progress_channel() -> (
    impl ProgressObserver,
    mpsc::UnboundedReceiver<ProgressEvent>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let observer = move |event: ProgressEvent| {
        let _ = tx.send(event);
    };
    (observer, rx)
}

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Fresh, not cancelled
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Bail out if cancelled
    ///
    /// # Errors
    /// [`WorkspaceError::Cancelled`] once [`CancelFlag::cancel`] was called
    #[inline]
    pub fn check(&self) -> WorkspaceResult<()> {
        if self.is_cancelled() {
            Err(WorkspaceError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Turns "n of total files done" into percentages
///
/// Steps never report 100; only [`ProgressTracker::finish`] does, so a 100
/// event always means success.
pub(crate) struct ProgressTracker<'a> {
    observer: &'a dyn ProgressObserver,
    total: usize,
    done: usize,
    last: u8,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(observer: &'a dyn ProgressObserver, total: usize) -> Self {
        Self {
            observer,
            total,
            done: 0,
            last: 0,
        }
    }

    pub(crate) fn start(&mut self, message: impl Into<String>) {
        self.emit(0, message.into(), None);
    }

    pub(crate) fn step(&mut self, file: &Path, message: impl Into<String>) {
        self.done += 1;
        let percent = if self.total == 0 {
            99
        } else {
            u8::try_from((self.done * 100 / self.total).min(99)).unwrap_or(99)
        };
        self.emit(percent, message.into(), Some(file.to_path_buf()));
    }

    pub(crate) fn finish(&mut self, message: impl Into<String>) {
        self.emit(100, message.into(), None);
    }

    fn emit(&mut self, percent: u8, message: String, file: Option<PathBuf>) {
        let percent = percent.max(self.last);
        self.last = percent;
        self.observer.report(ProgressEvent {
            percent,
            message,
            file,
        });
    }
}
