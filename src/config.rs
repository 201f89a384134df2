//! Option types for every conversion mode.
//!
//! Each mode has its own small struct with well-documented defaults and
//! clamping setters, so callers set only what they care about. Values that
//! arrive out of range are clamped rather than rejected; values that cannot
//! be interpreted at all (an unknown image format, an inverted page range)
//! fail with [`ConvertError::Validation`].

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest accepted rendering DPI.
pub const MIN_DPI: u32 = 72;
/// Highest accepted rendering DPI.
pub const MAX_DPI: u32 = 600;
/// Default DPI for raster-mode PDF → DOCX.
pub const DEFAULT_RASTER_DPI: u32 = 200;
/// Default DPI for OCR-mode PDF → DOCX.
pub const DEFAULT_OCR_DPI: u32 = 300;
/// Default tesseract language code.
pub const DEFAULT_OCR_LANG: &str = "spa";

/// Quality bounds for images embedded in a DOCX package.
pub const DOCX_QUALITY_RANGE: (u8, u8) = (1, 95);
/// Default JPEG quality for DOCX image recompression.
pub const DEFAULT_DOCX_QUALITY: u8 = 75;
/// Quality bounds for standalone image conversion.
pub const IMAGE_QUALITY_RANGE: (u8, u8) = (1, 100);
/// Default quality for standalone image conversion.
pub const DEFAULT_IMAGE_QUALITY: u8 = 95;

/// Clamp a caller-supplied quality into the document-image range (1–95).
pub fn clamp_docx_quality(q: u32) -> u8 {
    q.clamp(DOCX_QUALITY_RANGE.0 as u32, DOCX_QUALITY_RANGE.1 as u32) as u8
}

/// Clamp a caller-supplied quality into the standalone-image range (1–100).
pub fn clamp_image_quality(q: u32) -> u8 {
    q.clamp(IMAGE_QUALITY_RANGE.0 as u32, IMAGE_QUALITY_RANGE.1 as u32) as u8
}

/// Clamp a rendering DPI into 72–600.
pub fn clamp_dpi(dpi: u32) -> u32 {
    dpi.clamp(MIN_DPI, MAX_DPI)
}

/// Translate the "0 means unspecified" convention into `None`.
fn non_zero(v: u32) -> Option<u32> {
    (v > 0).then_some(v)
}

// ── PDF → DOCX modes ─────────────────────────────────────────────────────

/// Raster mode: every page becomes a picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RasterOptions {
    pub dpi: u32,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_RASTER_DPI,
        }
    }
}

impl RasterOptions {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.dpi = clamp_dpi(dpi);
        self
    }
}

/// OCR mode: every page is rendered and run through text recognition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrOptions {
    pub dpi: u32,
    /// Tesseract language code(s), e.g. `eng` or `spa+eng`.
    pub lang: String,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_OCR_DPI,
            lang: DEFAULT_OCR_LANG.to_string(),
        }
    }
}

impl OcrOptions {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.dpi = clamp_dpi(dpi);
        self
    }

    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        let lang = lang.into();
        if !lang.trim().is_empty() {
            self.lang = lang.trim().to_string();
        }
        self
    }
}

/// Specifies which pages of the PDF to convert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Convert all pages (default).
    #[default]
    All,
    /// Convert a single page (1-indexed).
    Single(usize),
    /// Convert a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Convert specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Build a selection from optional 1-based start/end bounds.
    pub fn from_bounds(start: Option<usize>, end: Option<usize>) -> Result<Self, ConvertError> {
        match (start, end) {
            (None, None) => Ok(PageSelection::All),
            (Some(0), _) | (_, Some(0)) => Err(ConvertError::Validation(
                "pages are 1-indexed, minimum is 1".into(),
            )),
            (Some(s), Some(e)) if s > e => Err(ConvertError::Validation(format!(
                "invalid page range {s}-{e}: start must be <= end"
            ))),
            (s, e) => Ok(PageSelection::Range(s.unwrap_or(1), e.unwrap_or(usize::MAX))),
        }
    }

    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

// ── DOCX image compression ───────────────────────────────────────────────

/// Options for recompressing the images embedded in a DOCX package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocxCompression {
    /// JPEG quality, 1–95.
    pub quality: u8,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
}

impl Default for DocxCompression {
    fn default() -> Self {
        Self {
            quality: DEFAULT_DOCX_QUALITY,
            max_width: None,
            max_height: None,
        }
    }
}

impl DocxCompression {
    pub fn quality(mut self, q: u32) -> Self {
        self.quality = clamp_docx_quality(q);
        self
    }

    /// `0` removes the constraint.
    pub fn max_width(mut self, w: u32) -> Self {
        self.max_width = non_zero(w);
        self
    }

    /// `0` removes the constraint.
    pub fn max_height(mut self, h: u32) -> Self {
        self.max_height = non_zero(h);
        self
    }
}

// ── Standalone images ────────────────────────────────────────────────────

/// Output formats accepted by image conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
    Bmp,
    Gif,
    Tiff,
    Ico,
}

/// Extensions recognised as image inputs.
pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] =
    &["png", "jpg", "jpeg", "webp", "bmp", "gif", "tiff", "tif", "ico"];

impl ImageFormat {
    pub const ALL: [ImageFormat; 7] = [
        ImageFormat::Png,
        ImageFormat::Jpeg,
        ImageFormat::Webp,
        ImageFormat::Bmp,
        ImageFormat::Gif,
        ImageFormat::Tiff,
        ImageFormat::Ico,
    ];

    /// Match a file extension (case-insensitive, without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "webp" => Some(ImageFormat::Webp),
            "bmp" => Some(ImageFormat::Bmp),
            "gif" => Some(ImageFormat::Gif),
            "tif" | "tiff" => Some(ImageFormat::Tiff),
            "ico" => Some(ImageFormat::Ico),
            _ => None,
        }
    }

    /// Canonical extension for output files (`jpeg` is written as `jpg`).
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Webp => "webp",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Gif => "gif",
            ImageFormat::Tiff => "tiff",
            ImageFormat::Ico => "ico",
        }
    }

    /// Formats without an alpha channel; transparency is flattened onto white.
    pub fn requires_opaque(self) -> bool {
        matches!(self, ImageFormat::Jpeg)
    }

    /// Formats whose encoder honours a quality setting.
    pub fn uses_quality(self) -> bool {
        matches!(self, ImageFormat::Jpeg)
    }

    pub(crate) fn codec(self) -> image::ImageFormat {
        match self {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Webp => image::ImageFormat::WebP,
            ImageFormat::Bmp => image::ImageFormat::Bmp,
            ImageFormat::Gif => image::ImageFormat::Gif,
            ImageFormat::Tiff => image::ImageFormat::Tiff,
            ImageFormat::Ico => image::ImageFormat::Ico,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageFormat::from_extension(s.trim().trim_start_matches('.')).ok_or_else(|| {
            ConvertError::Validation(format!(
                "unsupported image format '{s}' (expected one of: {})",
                SUPPORTED_IMAGE_EXTENSIONS.join(", ")
            ))
        })
    }
}

/// Target box for a resize; `None` on an axis means unconstrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizeTarget {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ResizeTarget {
    /// Build from raw width/height where `0` means "unspecified".
    /// Returns `None` when both axes are unspecified.
    pub fn from_raw(width: u32, height: u32) -> Option<Self> {
        let (width, height) = (non_zero(width), non_zero(height));
        (width.is_some() || height.is_some()).then_some(Self { width, height })
    }
}

/// Options for converting one image into another format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOptions {
    pub format: ImageFormat,
    /// 1–100; only JPEG honours it.
    pub quality: u8,
    pub resize: Option<ResizeTarget>,
    /// Preserve the aspect ratio and never upscale.
    pub keep_aspect: bool,
}

impl ImageOptions {
    pub fn new(format: ImageFormat) -> Self {
        Self {
            format,
            quality: DEFAULT_IMAGE_QUALITY,
            resize: None,
            keep_aspect: true,
        }
    }

    pub fn quality(mut self, q: u32) -> Self {
        self.quality = clamp_image_quality(q);
        self
    }

    /// `0` on an axis means "no constraint on that axis".
    pub fn resize(mut self, width: u32, height: u32) -> Self {
        self.resize = ResizeTarget::from_raw(width, height);
        self
    }

    pub fn keep_aspect(mut self, v: bool) -> Self {
        self.keep_aspect = v;
        self
    }
}
