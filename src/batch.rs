//! Sequential runner for heterogeneous file lists.
//!
//! ## Ordering
//!
//! Files are classified by extension and drained category by category in
//! [`BatchCategory::ORDER`] (PDF → DOCX, then DOCX → PDF, then image →
//! image). Within a category they keep their input order.
//!
//! ## Progress
//!
//! The total is the number of eligible files across every selected
//! category, fixed before the first file starts. One event is emitted per
//! finished file, whether it succeeded or failed. The primitives run with
//! progress muted so page-level events never mix with file-level ones;
//! cancellation still reaches them.
//!
//! ## Failure
//!
//! A failing file is recorded as a [`BatchFailure`] and counted as done. Only
//! cancellation stops the run early.

use crate::config::{ImageFormat, ImageOptions};
use crate::convert;
use crate::engine::Engines;
use crate::error::ConvertError;
use crate::pipeline::io;
use crate::progress::Control;
use crate::request::{extension_of, Conversion, ConversionRequest, PdfToDocxMode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Which primitive handles a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchCategory {
    PdfToDocx,
    DocxToPdf,
    ImageToImage,
}

impl BatchCategory {
    /// Processing order.
    pub const ORDER: [BatchCategory; 3] = [
        BatchCategory::PdfToDocx,
        BatchCategory::DocxToPdf,
        BatchCategory::ImageToImage,
    ];

    /// Category for a file extension (case-insensitive, no dot).
    pub fn for_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(BatchCategory::PdfToDocx),
            "docx" => Some(BatchCategory::DocxToPdf),
            other if ImageFormat::from_extension(other).is_some() => {
                Some(BatchCategory::ImageToImage)
            }
            _ => None,
        }
    }
}

impl fmt::Display for BatchCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BatchCategory::PdfToDocx => "pdf→docx",
            BatchCategory::DocxToPdf => "docx→pdf",
            BatchCategory::ImageToImage => "image→image",
        })
    }
}

/// A file and the category it was classified into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub path: PathBuf,
    pub category: BatchCategory,
}

impl BatchItem {
    /// `None` for files no category accepts.
    pub fn classify(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let category = BatchCategory::for_extension(&extension_of(&path))?;
        Some(Self { path, category })
    }
}

/// Which categories to run and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOptions {
    pub pdf_to_docx: bool,
    pub docx_to_pdf: bool,
    /// Target format for image files; `None` leaves images alone.
    pub image: Option<ImageOptions>,
    pub pdf_mode: PdfToDocxMode,
    pub overwrite: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            pdf_to_docx: true,
            docx_to_pdf: true,
            image: None,
            pdf_mode: PdfToDocxMode::default(),
            overwrite: false,
        }
    }
}

impl BatchOptions {
    pub fn selects(&self, category: BatchCategory) -> bool {
        match category {
            BatchCategory::PdfToDocx => self.pdf_to_docx,
            BatchCategory::DocxToPdf => self.docx_to_pdf,
            BatchCategory::ImageToImage => self.image.is_some(),
        }
    }

    fn conversion(&self, category: BatchCategory) -> Option<Conversion> {
        match category {
            BatchCategory::PdfToDocx => Some(Conversion::PdfToDocx(self.pdf_mode.clone())),
            BatchCategory::DocxToPdf => Some(Conversion::DocxToPdf),
            BatchCategory::ImageToImage => self.image.map(Conversion::Image),
        }
    }
}

/// Eligible files in processing order.
pub fn plan(files: &[PathBuf], options: &BatchOptions) -> Vec<BatchItem> {
    let classified: Vec<BatchItem> = files.iter().filter_map(BatchItem::classify).collect();
    BatchCategory::ORDER
        .into_iter()
        .filter(|c| options.selects(*c))
        .flat_map(|c| classified.iter().filter(move |i| i.category == c).cloned())
        .collect()
}

/// Lifecycle of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Idle,
    Running,
    Completed,
    Cancelled,
    /// The run could not start (e.g. the output directory is unusable).
    Failed,
}

/// One file that could not be converted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub file: PathBuf,
    pub message: String,
}

/// Aggregate outcome of a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub state: BatchState,
    /// Eligible files.
    pub total: usize,
    /// Files attempted (succeeded + failed).
    pub done: usize,
    pub succeeded: usize,
    pub failures: Vec<BatchFailure>,
    pub outputs: Vec<PathBuf>,
    /// Set when `state` is `Failed`.
    pub message: Option<String>,
}

impl BatchReport {
    fn new(total: usize) -> Self {
        Self {
            state: BatchState::Idle,
            total,
            done: 0,
            succeeded: 0,
            failures: Vec::new(),
            outputs: Vec::new(),
            message: None,
        }
    }
}

/// Drives one batch from `Idle` to a terminal state.
pub struct BatchRunner<'a> {
    engines: &'a Engines,
    options: BatchOptions,
    state: BatchState,
}

impl<'a> BatchRunner<'a> {
    pub fn new(engines: &'a Engines, options: BatchOptions) -> Self {
        Self {
            engines,
            options,
            state: BatchState::Idle,
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Convert `files` into `output_dir`.
    #[instrument(skip_all, fields(files = files.len(), output_dir = %output_dir.display()))]
    pub fn run(&mut self, files: &[PathBuf], output_dir: &Path, control: &Control) -> BatchReport {
        let items = plan(files, &self.options);
        let mut report = BatchReport::new(items.len());
        self.state = BatchState::Running;

        if let Err(e) = io::ensure_dir(output_dir) {
            return self.finish(report, BatchState::Failed, Some(e.to_string()));
        }
        if items.is_empty() {
            info!("no eligible files");
            return self.finish(report, BatchState::Completed, None);
        }

        let total = items.len();
        control.emit(0, total, &format!("Processing {total} files"));
        let quiet = control.without_progress();

        for item in &items {
            if control.is_cancelled() {
                info!(done = report.done, total, "batch cancelled");
                return self.finish(report, BatchState::Cancelled, None);
            }

            let Some(conversion) = self.options.conversion(item.category) else {
                continue;
            };
            let request = ConversionRequest::into_dir(item.path.clone(), output_dir, conversion)
                .overwrite(self.options.overwrite);
            let name = item
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            match convert::run(self.engines, &request, &quiet) {
                Ok(_) => {
                    report.succeeded += 1;
                    report.outputs.push(request.destination);
                }
                Err(ConvertError::Cancelled { .. }) => {
                    info!(file = %name, "batch cancelled mid-file");
                    return self.finish(report, BatchState::Cancelled, None);
                }
                Err(e) => {
                    warn!(file = %item.path.display(), error = %e, "file failed");
                    report.failures.push(BatchFailure {
                        file: item.path.clone(),
                        message: e.to_string(),
                    });
                }
            }
            report.done += 1;
            control.emit(report.done, total, &format!("{name} ({})", item.category));
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failures.len(),
            "batch finished"
        );
        self.finish(report, BatchState::Completed, None)
    }

    fn finish(
        &mut self,
        mut report: BatchReport,
        state: BatchState,
        message: Option<String>,
    ) -> BatchReport {
        self.state = state;
        report.state = state;
        report.message = message;
        report
    }
}

/// Convenience wrapper: build a runner and run it once.
pub fn run_batch(
    engines: &Engines,
    files: &[PathBuf],
    output_dir: &Path,
    options: BatchOptions,
    control: &Control,
) -> BatchReport {
    BatchRunner::new(engines, options).run(files, output_dir, control)
}
