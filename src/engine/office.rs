//! DOCX → PDF through a headless LibreOffice.

use super::OfficeConverter;
use crate::error::EngineError;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, instrument};

/// Runs `soffice --headless --convert-to pdf` into a scratch directory and
/// copies the result to the requested destination.
#[derive(Debug, Clone)]
pub struct LibreOffice {
    binary: PathBuf,
}

impl Default for LibreOffice {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("soffice"),
        }
    }
}

impl LibreOffice {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// `DOCSHIFT_SOFFICE` if set, otherwise `soffice` on `PATH`.
    pub fn from_env() -> Self {
        match std::env::var_os("DOCSHIFT_SOFFICE") {
            Some(p) if !p.is_empty() => Self::new(p),
            _ => Self::default(),
        }
    }
}

impl OfficeConverter for LibreOffice {
    #[instrument(skip(self), fields(source = %source.display()))]
    fn docx_to_pdf(&self, source: &Path, destination: &Path) -> Result<(), EngineError> {
        let scratch = tempfile::tempdir()
            .map_err(|e| EngineError::Failed(format!("scratch directory: {e}")))?;

        let output = Command::new(&self.binary)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(scratch.path())
            .arg(source)
            .output()
            .map_err(|e| {
                EngineError::Unavailable(format!(
                    "cannot run '{}': {e} (set DOCSHIFT_SOFFICE)",
                    self.binary.display()
                ))
            })?;

        if !output.status.success() {
            return Err(EngineError::Failed(format!(
                "LibreOffice conversion failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stem = source
            .file_stem()
            .ok_or_else(|| EngineError::Failed("source has no file name".into()))?;
        let produced = scratch
            .path()
            .join(format!("{}.pdf", stem.to_string_lossy()));
        if !produced.exists() {
            return Err(EngineError::Failed(format!(
                "PDF not generated at {}",
                produced.display()
            )));
        }

        std::fs::copy(&produced, destination)
            .map_err(|e| EngineError::Failed(format!("copy generated PDF: {e}")))?;
        debug!(destination = %destination.display(), "LibreOffice produced PDF");
        Ok(())
    }
}
