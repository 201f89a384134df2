//! DOCX → PDF through the office converter. One unit of work.

use crate::engine::Engines;
use crate::error::ConvertError;
use crate::output::OperationResult;
use crate::pipeline::io::{self, AtomicOutput};
use crate::progress::{Control, ProgressTracker};
use crate::request::ConversionRequest;
use tracing::{info, instrument};

#[instrument(skip_all, fields(source = %request.source.display()))]
pub(crate) fn docx_to_pdf(
    engines: &Engines,
    request: &ConversionRequest,
    control: &Control,
) -> Result<OperationResult, ConvertError> {
    io::prepare(request)?;
    let name = request
        .source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut tracker = ProgressTracker::start(control, 1, "Converting DOCX to PDF");
    tracker.checkpoint()?;

    let out = AtomicOutput::new(&request.destination, request.overwrite)?;
    engines
        .office
        .docx_to_pdf(&request.source, out.path())
        .map_err(|e| ConvertError::engine(&name, e))?;
    let size = out.persist()?;
    tracker.advance(format!("Converted {name}"));

    info!(size, "PDF written");
    Ok(OperationResult::finished(
        1,
        0,
        Vec::new(),
        vec![request.destination.clone()],
    ))
}
