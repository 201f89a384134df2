//! # docshift
//!
//! Convert between PDF, DOCX and raster image formats.
//!
//! ## Primitives
//!
//! | Primitive | Unit of work | Engine |
//! |-----------|--------------|--------|
//! | PDF → DOCX (text, raster, OCR) | page | pdfium (+ tesseract for OCR) |
//! | DOCX → PDF | document | LibreOffice |
//! | PDF compression | page | lopdf |
//! | DOCX compression | embedded image | zip + image |
//! | Image → image | file | image |
//! | Image extraction | page / embedded image | pdfium, zip |
//!
//! Every primitive reports `(current, total, message)` progress through a
//! [`Control`], polls its cancellation flag between units, and writes its
//! output atomically: a failed or cancelled job never leaves a partial file
//! at the destination.
//!
//! ## Pipeline Overview
//!
//! ```text
//! ConversionRequest
//!  │
//!  ├─ 1. Validate  source exists, extension matches, destination free
//!  ├─ 2. Open      engine loads the document (pdfium / zip / image)
//!  ├─ 3. Units     per page or image: checkpoint → work → progress
//!  ├─ 4. Persist   temp file renamed over the destination
//!  └─ 5. Result    OperationResult (counts, unit errors, sizes)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docshift::{convert, Control, Engines, PdfToDocxMode, RasterOptions};
//! use std::path::Path;
//!
//! let engines = Engines::detect();
//! let result = convert::pdf_to_docx(
//!     &engines,
//!     Path::new("scan.pdf"),
//!     Path::new("scan.docx"),
//!     PdfToDocxMode::Raster(RasterOptions::default()),
//!     false,
//!     &Control::new(),
//! )?;
//! println!("{} pages", result.converted);
//! # Ok::<(), docshift::ConvertError>(())
//! ```
//!
//! For non-blocking use, [`worker::spawn`] runs a request on tokio's
//! blocking pool and streams its progress.
//!
//! ## Feature Flags
//!
//! | Feature     | Default | Description |
//! |-------------|---------|-------------|
//! | `cli`       | on      | Enables the `docshift` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `tesseract` | off     | OCR mode through libtesseract (`leptess`) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docshift = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod request;
pub mod worker;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{
    run_batch, BatchCategory, BatchFailure, BatchItem, BatchOptions, BatchReport, BatchRunner,
    BatchState,
};
pub use config::{
    DocxCompression, ImageFormat, ImageOptions, OcrOptions, PageSelection, RasterOptions,
    ResizeTarget,
};
pub use engine::{Engines, OcrEngine, OfficeConverter, PdfEngine, PdfSource};
pub use error::{ConvertError, EngineError, UnitError};
pub use output::{ImageInfo, OperationResult, Outcome, SizeReport};
pub use progress::{
    CancelCheck, CancellationToken, Control, ConversionProgress, NoopProgress, ProgressCallback,
    ProgressEvent,
};
pub use request::{Conversion, ConversionRequest, PdfToDocxMode};
