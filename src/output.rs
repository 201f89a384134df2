//! Result records returned by primitives.
//!
//! An [`OperationResult`] is built once at the end of a job and never
//! mutated afterwards. Tolerated unit failures live in `errors`. Fatal ones
//! are returned as [`crate::error::ConvertError`] and can be folded into a
//! record with [`OperationResult::from_error`] when a caller wants one
//! uniform shape (the worker and the CLI do).

use crate::error::{ConvertError, UnitError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Succeeded,
    /// Output written, but some units were skipped after failing.
    SucceededWithErrors,
    Cancelled,
    Failed,
}

/// Byte sizes before and after a compression job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeReport {
    pub original_size: u64,
    pub new_size: u64,
    /// `max(0, (original - new) / original * 100)`.
    pub reduction_percent: f64,
}

impl SizeReport {
    pub fn new(original_size: u64, new_size: u64) -> Self {
        Self {
            original_size,
            new_size,
            reduction_percent: reduction_percent(original_size, new_size),
        }
    }
}

/// Percentage saved, floored at zero. An empty original yields zero.
pub fn reduction_percent(original_size: u64, new_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    let pct = (original_size as f64 - new_size as f64) / original_size as f64 * 100.0;
    pct.max(0.0)
}

/// Outcome of one primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub outcome: Outcome,
    /// Units that produced output.
    pub converted: usize,
    /// Units deliberately left untouched (unsupported media, no gain).
    pub skipped: usize,
    /// Units that failed and were skipped; one entry each in `errors`.
    pub errored: usize,
    pub errors: Vec<UnitError>,
    /// Present for compression jobs.
    pub sizes: Option<SizeReport>,
    /// Present for DOCX image compression.
    pub images_processed: Option<usize>,
    /// Files written (one for document jobs, many for extraction).
    pub outputs: Vec<PathBuf>,
    /// Set when `outcome` is `Cancelled` or `Failed`.
    pub message: Option<String>,
}

impl OperationResult {
    /// A finished job; the outcome follows from `errors`.
    pub(crate) fn finished(
        converted: usize,
        skipped: usize,
        errors: Vec<UnitError>,
        outputs: Vec<PathBuf>,
    ) -> Self {
        let outcome = if errors.is_empty() {
            Outcome::Succeeded
        } else {
            Outcome::SucceededWithErrors
        };
        Self {
            outcome,
            converted,
            skipped,
            errored: errors.len(),
            errors,
            sizes: None,
            images_processed: None,
            outputs,
            message: None,
        }
    }

    pub(crate) fn with_sizes(mut self, sizes: SizeReport) -> Self {
        self.sizes = Some(sizes);
        self
    }

    pub(crate) fn with_images_processed(mut self, n: usize) -> Self {
        self.images_processed = Some(n);
        self
    }

    /// Fold a fatal error into a `Cancelled` or `Failed` record.
    pub fn from_error(err: &ConvertError) -> Self {
        let outcome = if err.is_cancelled() {
            Outcome::Cancelled
        } else {
            Outcome::Failed
        };
        Self {
            outcome,
            converted: 0,
            skipped: 0,
            errored: 0,
            errors: Vec::new(),
            sizes: None,
            images_processed: None,
            outputs: Vec::new(),
            message: Some(err.to_string()),
        }
    }

    /// A directory job stopped by `err` after writing `outputs`.
    ///
    /// The files stay on disk, so they are listed alongside the
    /// `Cancelled`/`Failed` outcome.
    pub(crate) fn interrupted(
        err: &ConvertError,
        errors: Vec<UnitError>,
        outputs: Vec<PathBuf>,
    ) -> Self {
        Self {
            converted: outputs.len(),
            errored: errors.len(),
            errors,
            outputs,
            ..Self::from_error(err)
        }
    }

    /// `Ok` passes through, `Err` becomes [`OperationResult::from_error`].
    pub fn settle(result: Result<OperationResult, ConvertError>) -> Self {
        match result {
            Ok(r) => r,
            Err(e) => Self::from_error(&e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Succeeded | Outcome::SucceededWithErrors)
    }
}

/// Basic facts about an image file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    /// Detected container format, e.g. `Png`, or `Unknown`.
    pub format: String,
    /// Colour layout, e.g. `Rgba8`.
    pub color: String,
    pub file_size: u64,
    pub file_size_human: String,
}

/// `512 B`, `1.5 KB`, `2.0 MB`.
pub fn human_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    if bytes < KB {
        format!("{bytes} B")
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}
