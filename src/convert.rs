//! Public entry points, one per primitive, plus tagged dispatch.
//!
//! Every function here is blocking and returns once the job has finished,
//! failed, or observed cancellation. Run them on a worker thread (see
//! [`crate::worker`]) when the caller must stay responsive.
//!
//! `Err` is reserved for fatal outcomes; tolerated unit failures are listed
//! in [`OperationResult::errors`]. Use [`OperationResult::settle`] to fold
//! both into a single record.
//!
//! Jobs that write into a directory (image batches, extraction) return a
//! cancellation as `Ok` with [`crate::Outcome::Cancelled`], so the files
//! already written stay listed in `outputs`.

use crate::config::{DocxCompression, ImageFormat, ImageOptions};
use crate::engine::Engines;
use crate::error::ConvertError;
use crate::output::{ImageInfo, OperationResult};
use crate::pipeline::{compress, docx_pdf, extract, image, pdf_docx};
use crate::progress::Control;
use crate::request::{Conversion, ConversionRequest, PdfToDocxMode};
use std::path::{Path, PathBuf};
use tracing::info;

/// Run `request` through the primitive its [`Conversion`] names.
pub fn run(
    engines: &Engines,
    request: &ConversionRequest,
    control: &Control,
) -> Result<OperationResult, ConvertError> {
    info!(
        source = %request.source.display(),
        destination = %request.destination.display(),
        conversion = %request.conversion.label(),
        "starting"
    );
    match &request.conversion {
        Conversion::PdfToDocx(mode) => pdf_docx::pdf_to_docx(engines, request, mode, control),
        Conversion::DocxToPdf => docx_pdf::docx_to_pdf(engines, request, control),
        Conversion::CompressPdf => compress::compress_pdf(request, control),
        Conversion::CompressDocx(opts) => compress::compress_docx(request, opts, control),
        Conversion::Image(opts) => image::convert_image(request, opts, control),
    }
}

fn request(
    source: &Path,
    destination: &Path,
    conversion: Conversion,
    overwrite: bool,
) -> ConversionRequest {
    ConversionRequest::new(source, destination, conversion).overwrite(overwrite)
}

/// PDF → DOCX in the given mode.
pub fn pdf_to_docx(
    engines: &Engines,
    source: &Path,
    destination: &Path,
    mode: PdfToDocxMode,
    overwrite: bool,
    control: &Control,
) -> Result<OperationResult, ConvertError> {
    run(
        engines,
        &request(source, destination, Conversion::PdfToDocx(mode), overwrite),
        control,
    )
}

/// DOCX → PDF through the office converter.
pub fn docx_to_pdf(
    engines: &Engines,
    source: &Path,
    destination: &Path,
    overwrite: bool,
    control: &Control,
) -> Result<OperationResult, ConvertError> {
    run(
        engines,
        &request(source, destination, Conversion::DocxToPdf, overwrite),
        control,
    )
}

/// Compress a PDF's streams. The result carries a [`crate::SizeReport`].
pub fn compress_pdf(
    source: &Path,
    destination: &Path,
    overwrite: bool,
    control: &Control,
) -> Result<OperationResult, ConvertError> {
    compress::compress_pdf(
        &request(source, destination, Conversion::CompressPdf, overwrite),
        control,
    )
}

/// Recompress the images embedded in a DOCX.
pub fn compress_docx(
    source: &Path,
    destination: &Path,
    options: DocxCompression,
    overwrite: bool,
    control: &Control,
) -> Result<OperationResult, ConvertError> {
    compress::compress_docx(
        &request(source, destination, Conversion::CompressDocx(options), overwrite),
        &options,
        control,
    )
}

/// Convert one image file.
pub fn convert_image(
    source: &Path,
    destination: &Path,
    options: ImageOptions,
    overwrite: bool,
    control: &Control,
) -> Result<OperationResult, ConvertError> {
    image::convert_image(
        &request(source, destination, Conversion::Image(options), overwrite),
        &options,
        control,
    )
}

/// Convert many images into `output_dir` as `<stem>.<ext>`.
///
/// Failing files are listed in the result and do not stop the run.
pub fn convert_images(
    sources: &[PathBuf],
    output_dir: &Path,
    options: ImageOptions,
    overwrite: bool,
    control: &Control,
) -> Result<OperationResult, ConvertError> {
    image::convert_images(sources, output_dir, &options, overwrite, control)
}

/// Read basic facts about an image without converting it.
pub fn image_info(path: &Path) -> Result<ImageInfo, ConvertError> {
    image::image_info(path)
}

/// Write every image embedded in a PDF to `output_dir`.
pub fn extract_pdf_images(
    engines: &Engines,
    source: &Path,
    output_dir: &Path,
    format: ImageFormat,
    overwrite: bool,
    control: &Control,
) -> Result<OperationResult, ConvertError> {
    extract::extract_pdf_images(engines, source, output_dir, format, overwrite, control)
}

/// Copy every image stored in a DOCX to `output_dir`.
pub fn extract_docx_images(
    source: &Path,
    output_dir: &Path,
    overwrite: bool,
    control: &Control,
) -> Result<OperationResult, ConvertError> {
    extract::extract_docx_images(source, output_dir, overwrite, control)
}
