//! Immutable description of one conversion job.
//!
//! A [`ConversionRequest`] pairs a source and destination path with a tagged
//! [`Conversion`] carrying the mode-specific options. The request is checked
//! before any engine is touched: the destination extension must match the
//! target format, and [`crate::pipeline::io::prepare`] rejects missing
//! sources and destination collisions.

use crate::config::{DocxCompression, ImageOptions, OcrOptions, PageSelection, RasterOptions};
use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Fidelity mode for PDF → DOCX.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PdfToDocxMode {
    /// Native text layer, editable paragraphs.
    Text { pages: PageSelection },
    /// One picture per page; exact look, not editable.
    Raster(RasterOptions),
    /// Render each page and recognise its text.
    Ocr(OcrOptions),
}

impl Default for PdfToDocxMode {
    fn default() -> Self {
        PdfToDocxMode::Text {
            pages: PageSelection::All,
        }
    }
}

impl PdfToDocxMode {
    pub fn name(&self) -> &'static str {
        match self {
            PdfToDocxMode::Text { .. } => "text",
            PdfToDocxMode::Raster(_) => "raster",
            PdfToDocxMode::Ocr(_) => "ocr",
        }
    }
}

/// What to do with the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Conversion {
    PdfToDocx(PdfToDocxMode),
    DocxToPdf,
    CompressPdf,
    CompressDocx(DocxCompression),
    Image(ImageOptions),
}

impl Conversion {
    /// Extensions the destination may carry (lowercase, no dot).
    pub fn target_extensions(&self) -> &'static [&'static str] {
        match self {
            Conversion::PdfToDocx(_) | Conversion::CompressDocx(_) => &["docx"],
            Conversion::DocxToPdf | Conversion::CompressPdf => &["pdf"],
            Conversion::Image(opts) => match opts.format {
                crate::config::ImageFormat::Png => &["png"],
                crate::config::ImageFormat::Jpeg => &["jpg", "jpeg"],
                crate::config::ImageFormat::Webp => &["webp"],
                crate::config::ImageFormat::Bmp => &["bmp"],
                crate::config::ImageFormat::Gif => &["gif"],
                crate::config::ImageFormat::Tiff => &["tiff", "tif"],
                crate::config::ImageFormat::Ico => &["ico"],
            },
        }
    }

    /// Extension used when no destination is given.
    pub fn default_extension(&self) -> &'static str {
        match self {
            Conversion::Image(opts) => opts.format.extension(),
            other => other.target_extensions()[0],
        }
    }

    /// Short human label, e.g. `pdf→docx (raster)`.
    pub fn label(&self) -> String {
        match self {
            Conversion::PdfToDocx(mode) => format!("pdf→docx ({})", mode.name()),
            Conversion::DocxToPdf => "docx→pdf".to_string(),
            Conversion::CompressPdf => "compress pdf".to_string(),
            Conversion::CompressDocx(_) => "compress docx images".to_string(),
            Conversion::Image(opts) => format!("image→{}", opts.format),
        }
    }
}

/// One job: source, destination, conversion and overwrite policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub conversion: Conversion,
    pub overwrite: bool,
}

impl ConversionRequest {
    pub fn new(
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
        conversion: Conversion,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            conversion,
            overwrite: false,
        }
    }

    /// Destination is the source path with the target extension.
    pub fn beside_source(source: impl Into<PathBuf>, conversion: Conversion) -> Self {
        let source = source.into();
        let destination = source.with_extension(conversion.default_extension());
        Self::new(source, destination, conversion)
    }

    /// Destination is `<dir>/<source stem>.<target ext>`.
    pub fn into_dir(source: impl Into<PathBuf>, dir: &Path, conversion: Conversion) -> Self {
        let source = source.into();
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let destination = dir.join(format!("{stem}.{}", conversion.default_extension()));
        Self::new(source, destination, conversion)
    }

    pub fn overwrite(mut self, v: bool) -> Self {
        self.overwrite = v;
        self
    }

    /// Check the destination extension against the target format.
    pub fn validate(&self) -> Result<(), ConvertError> {
        let ext = extension_of(&self.destination);
        let allowed = self.conversion.target_extensions();
        if !allowed.contains(&ext.as_str()) {
            return Err(ConvertError::Validation(format!(
                "destination '{}' must have extension .{} for {}",
                self.destination.display(),
                allowed.join(" or ."),
                self.conversion.label()
            )));
        }
        if self.source == self.destination {
            return Err(ConvertError::Validation(format!(
                "source and destination are the same file: '{}'",
                self.source.display()
            )));
        }
        Ok(())
    }
}

/// Lowercase extension without the dot, or an empty string.
pub(crate) fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}
