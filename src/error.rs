//! Error types for the docshift library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ConvertError`]: **fatal**. The operation cannot produce its output
//!   (missing source, destination collision, cancellation, engine failure on
//!   a unit the operation cannot skip). Returned as `Err(ConvertError)` from
//!   every primitive.
//!
//! * [`UnitError`]: **non-fatal**. A single unit (one embedded image, one
//!   batch file) failed but the operation tolerated it. Stored inside
//!   [`crate::output::OperationResult`] and [`crate::batch::BatchReport`] so
//!   callers can see every skipped unit.
//!
//! Engines report failures as [`EngineError`]; primitives wrap it in
//! [`ConvertError::Engine`] together with the unit that failed.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by docshift primitives.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input / output validation ─────────────────────────────────────────
    /// Source file was not found at the given path.
    #[error("Source file not found: '{path}'")]
    NotFound { path: PathBuf },

    /// Destination exists and overwrite was not requested.
    #[error("Destination already exists: '{path}'\nPass --overwrite to replace it.")]
    AlreadyExists { path: PathBuf },

    /// Options are malformed or the format pair is unsupported.
    #[error("Invalid request: {0}")]
    Validation(String),

    // ── Cancellation ──────────────────────────────────────────────────────
    /// The caller asked to stop; detected at a unit boundary.
    #[error("Operation cancelled after {current} of {total} units")]
    Cancelled { current: usize, total: usize },

    // ── Engine ────────────────────────────────────────────────────────────
    /// The wrapped conversion/OCR/codec engine failed on a specific unit.
    #[error("{unit}: {detail}")]
    Engine { unit: String, detail: String },

    // ── I/O ───────────────────────────────────────────────────────────────
    /// Could not read, create or persist a file.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error (e.g. a worker thread panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    /// `true` for [`ConvertError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ConvertError::Cancelled { .. })
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn engine(unit: impl Into<String>, err: impl std::fmt::Display) -> Self {
        ConvertError::Engine {
            unit: unit.into(),
            detail: err.to_string(),
        }
    }
}

/// Error raised by an engine implementation (pdfium, tesseract, codecs, …).
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The engine library could not be loaded or initialised.
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// The input could not be opened or parsed by the engine.
    #[error("cannot open document: {0}")]
    Open(String),

    /// The engine failed while processing one unit.
    #[error("{0}")]
    Failed(String),
}

impl From<image::ImageError> for EngineError {
    fn from(e: image::ImageError) -> Self {
        EngineError::Failed(format!("image codec: {e}"))
    }
}

/// A non-fatal error for a single unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{unit}: {message}")]
pub struct UnitError {
    /// What failed: an archive entry name, a file name, "page 3", …
    pub unit: String,
    /// Human-readable reason.
    pub message: String,
}

impl UnitError {
    pub fn new(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            message: message.into(),
        }
    }
}
