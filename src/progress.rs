//! Progress sink and cancellation poll shared by every primitive.
//!
//! A primitive receives a [`Control`] holding two optional collaborators:
//!
//! * a [`ConversionProgress`] sink, called as `emit(current, total, message)`
//!   once per completed unit of work (page, image, file);
//! * a [`CancelCheck`] predicate, polled at the start of every unit.
//!
//! Both are plain trait objects. The worker only writes to the sink and only
//! reads the flag, so no locking is needed beyond what the implementations
//! themselves choose to do.
//!
//! # Example
//!
//! ```rust
//! use docshift::{CancellationToken, Control};
//! use std::sync::Arc;
//!
//! let token = CancellationToken::new();
//! let control = Control::new()
//!     .with_progress(Arc::new(|current: usize, total: usize, msg: &str| {
//!         eprintln!("{current}/{total} {msg}");
//!     }))
//!     .with_token(token.clone());
//!
//! // From another thread, e.g. a UI button:
//! token.cancel();
//! assert!(control.is_cancelled());
//! ```

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// One progress update: `current` units done out of a fixed `total`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub current: usize,
    pub total: usize,
    pub message: String,
}

/// Receives progress events from a running primitive or batch.
///
/// Implementations must be `Send + Sync`: the primitive runs on a worker
/// thread while the sink is usually owned by a UI or CLI.
pub trait ConversionProgress: Send + Sync {
    fn emit(&self, current: usize, total: usize, message: &str);
}

impl<F> ConversionProgress for F
where
    F: Fn(usize, usize, &str) + Send + Sync,
{
    fn emit(&self, current: usize, total: usize, message: &str) {
        self(current, total, message)
    }
}

/// A sink that drops every event.
pub struct NoopProgress;

impl ConversionProgress for NoopProgress {
    fn emit(&self, _current: usize, _total: usize, _message: &str) {}
}

/// Shared handle to a progress sink.
pub type ProgressCallback = Arc<dyn ConversionProgress>;

/// Polled between units of work; never blocks.
pub trait CancelCheck: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

impl<F> CancelCheck for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_cancelled(&self) -> bool {
        self()
    }
}

/// A flag settable once from any thread.
///
/// Cloning shares the flag. Cancelling twice is harmless.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl CancelCheck for CancellationToken {
    fn is_cancelled(&self) -> bool {
        CancellationToken::is_cancelled(self)
    }
}

/// The progress/cancellation pair handed to every primitive.
#[derive(Clone, Default)]
pub struct Control {
    progress: Option<ProgressCallback>,
    cancel: Option<Arc<dyn CancelCheck>>,
}

impl std::fmt::Debug for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Control")
            .field("progress", &self.progress.as_ref().map(|_| "<dyn ConversionProgress>"))
            .field("cancel", &self.cancel.as_ref().map(|_| "<dyn CancelCheck>"))
            .finish()
    }
}

impl Control {
    /// No sink, never cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancel(mut self, cancel: Arc<dyn CancelCheck>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_token(self, token: CancellationToken) -> Self {
        self.with_cancel(Arc::new(token))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }

    pub fn emit(&self, current: usize, total: usize, message: &str) {
        if let Some(ref p) = self.progress {
            p.emit(current, total, message);
        }
    }

    /// Same cancellation, progress dropped. Used when a caller relays its own
    /// coarser-grained events (the batch runner counts files, not pages).
    pub fn without_progress(&self) -> Self {
        Self {
            progress: None,
            cancel: self.cancel.clone(),
        }
    }
}

/// Enforces the per-job progress contract.
///
/// `total` is fixed at construction, `current` only moves forward one unit
/// at a time, and cancellation is only observed at [`checkpoint`] calls.
///
/// [`checkpoint`]: ProgressTracker::checkpoint
pub(crate) struct ProgressTracker<'a> {
    control: &'a Control,
    current: usize,
    total: usize,
}

impl<'a> ProgressTracker<'a> {
    /// Emit `(0, total, message)` and start counting.
    pub(crate) fn start(control: &'a Control, total: usize, message: &str) -> Self {
        debug_assert!(total > 0, "progress total must be positive");
        control.emit(0, total, message);
        Self {
            control,
            current: 0,
            total,
        }
    }

    /// Poll cancellation at a unit boundary.
    pub(crate) fn checkpoint(&self) -> Result<(), ConvertError> {
        if self.control.is_cancelled() {
            debug!(current = self.current, total = self.total, "cancellation observed");
            return Err(ConvertError::Cancelled {
                current: self.current,
                total: self.total,
            });
        }
        Ok(())
    }

    /// Mark one unit complete and emit it.
    pub(crate) fn advance(&mut self, message: impl AsRef<str>) {
        if self.current < self.total {
            self.current += 1;
        }
        self.control.emit(self.current, self.total, message.as_ref());
    }

    pub(crate) fn current(&self) -> usize {
        self.current
    }
}
