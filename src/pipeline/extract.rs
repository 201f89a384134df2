//! Pull embedded images out of PDF and DOCX files into a directory.
//!
//! Files written before a cancellation stay in place and are listed in the
//! `Cancelled` result; each one is persisted atomically, so none is ever
//! half-written. A file that cannot be written
//! (for instance because it exists and `overwrite` is off) is recorded and
//! skipped.

use crate::config::ImageFormat;
use crate::engine::{Engines, PdfSource};
use crate::error::{ConvertError, UnitError};
use crate::output::OperationResult;
use crate::pipeline::image::encode;
use crate::pipeline::io::{self, AtomicOutput};
use crate::progress::{Control, ProgressTracker};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};
use zip::ZipArchive;

const MEDIA_PREFIX: &str = "word/media/";

fn label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Every image on every page, written as `image_0001.<ext>`, `image_0002.<ext>`, …
#[instrument(skip_all, fields(source = %source.display(), format = %format))]
pub(crate) fn extract_pdf_images(
    engines: &Engines,
    source: &Path,
    output_dir: &Path,
    format: ImageFormat,
    overwrite: bool,
    control: &Control,
) -> Result<OperationResult, ConvertError> {
    io::source_size(source)?;
    io::ensure_dir(output_dir)?;

    engines
        .pdf
        .read(source, |doc| page_images(doc, output_dir, format, overwrite, control))
        .map_err(|e| ConvertError::engine(label(source), e))?
}

fn page_images(
    doc: &dyn PdfSource,
    output_dir: &Path,
    format: ImageFormat,
    overwrite: bool,
    control: &Control,
) -> Result<OperationResult, ConvertError> {
    let total = doc.page_count();
    if total == 0 {
        return Ok(OperationResult::finished(0, 0, Vec::new(), Vec::new()));
    }

    let mut tracker = ProgressTracker::start(control, total, "Extracting images");
    let mut outputs: Vec<PathBuf> = Vec::new();
    let mut errors = Vec::new();
    let mut counter = 0usize;

    for idx in 0..total {
        if let Err(e) = tracker.checkpoint() {
            return Ok(OperationResult::interrupted(&e, errors, outputs));
        }
        let images = doc
            .page_images(idx)
            .map_err(|e| ConvertError::engine(format!("page {}", idx + 1), e))?;
        for img in images {
            counter += 1;
            let name = format!("image_{counter:04}.{}", format.extension());
            let path = output_dir.join(&name);
            let written = io::check_destination(&path, overwrite)
                .and_then(|_| {
                    encode(&img, format, crate::config::DEFAULT_IMAGE_QUALITY)
                        .map_err(|e| ConvertError::engine(&name, e))
                })
                .and_then(|bytes| AtomicOutput::write_all(&path, overwrite, &bytes));
            match written {
                Ok(_) => outputs.push(path),
                Err(e) => {
                    warn!(file = %name, error = %e, "image not extracted");
                    errors.push(UnitError::new(name, e.to_string()));
                }
            }
        }
        tracker.advance(format!("Page {}/{}", idx + 1, total));
    }

    info!(images = outputs.len(), failed = errors.len(), "PDF images extracted");
    Ok(OperationResult::finished(outputs.len(), 0, errors, outputs))
}

/// Every `word/media/*` entry, copied byte for byte.
#[instrument(skip_all, fields(source = %source.display()))]
pub(crate) fn extract_docx_images(
    source: &Path,
    output_dir: &Path,
    overwrite: bool,
    control: &Control,
) -> Result<OperationResult, ConvertError> {
    io::source_size(source)?;
    io::ensure_dir(output_dir)?;
    let src_label = label(source);

    let file = File::open(source).map_err(|e| ConvertError::io(source, e))?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| ConvertError::engine(&src_label, e))?;

    let mut media = Vec::new();
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| ConvertError::engine(&src_label, e))?;
        if entry.name().starts_with(MEDIA_PREFIX) && !entry.is_dir() {
            media.push(i);
        }
    }
    if media.is_empty() {
        return Ok(OperationResult::finished(0, 0, Vec::new(), Vec::new()));
    }

    let total = media.len();
    let mut tracker = ProgressTracker::start(control, total, "Extracting images");
    let mut outputs = Vec::new();
    let mut errors = Vec::new();

    for (n, index) in media.into_iter().enumerate() {
        if let Err(e) = tracker.checkpoint() {
            return Ok(OperationResult::interrupted(&e, errors, outputs));
        }
        let mut entry = archive
            .by_index(index)
            .map_err(|e| ConvertError::engine(&src_label, e))?;
        let entry_name = entry.name().to_string();
        let file_name = label(Path::new(&entry_name));
        let path = output_dir.join(&file_name);

        let mut bytes = Vec::with_capacity(entry.size() as usize);
        let written = entry
            .read_to_end(&mut bytes)
            .map_err(|e| ConvertError::io(source, e))
            .and_then(|_| io::check_destination(&path, overwrite))
            .and_then(|_| AtomicOutput::write_all(&path, overwrite, &bytes));
        match written {
            Ok(_) => outputs.push(path),
            Err(e) => {
                warn!(entry = %entry_name, error = %e, "image not extracted");
                errors.push(UnitError::new(entry_name, e.to_string()));
            }
        }
        tracker.advance(format!("Image {}/{}", n + 1, total));
    }

    info!(images = outputs.len(), failed = errors.len(), "DOCX images extracted");
    Ok(OperationResult::finished(outputs.len(), 0, errors, outputs))
}
