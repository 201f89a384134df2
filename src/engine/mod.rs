//! Engine boundary: the external libraries the primitives drive.
//!
//! Primitives never touch pdfium, tesseract or LibreOffice directly. They
//! call the traits below, which keeps the orchestration layer (progress,
//! cancellation, partial-failure bookkeeping) testable with in-memory fakes.
//!
//! | Trait               | Default implementation        |
//! |---------------------|-------------------------------|
//! | [`PdfEngine`]       | [`pdfium::PdfiumEngine`]      |
//! | [`OcrEngine`]       | `tesseract::TesseractOcr`     |
//! | [`OfficeConverter`] | [`office::LibreOffice`]       |
//!
//! Every call is blocking. The worker runs them on a `spawn_blocking` thread.

pub mod office;
pub mod pdfium;
#[cfg(feature = "tesseract")]
pub mod tesseract;

use crate::error::EngineError;
use image::DynamicImage;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Opens PDF documents.
///
/// The document is lent to `visit` for the duration of the call and closed
/// afterwards, so a backend may keep per-thread state (a library binding, a
/// loaded file) without the engine itself holding it.
pub trait PdfEngine: Send + Sync {
    fn with_document(
        &self,
        path: &Path,
        visit: &mut dyn FnMut(&dyn PdfSource),
    ) -> Result<(), EngineError>;
}

impl dyn PdfEngine + '_ {
    /// Open `path`, run `f` on the document and return what it produced.
    pub fn read<T>(
        &self,
        path: &Path,
        f: impl FnOnce(&dyn PdfSource) -> T,
    ) -> Result<T, EngineError> {
        let mut f = Some(f);
        let mut produced = None;
        self.with_document(path, &mut |doc: &dyn PdfSource| {
            if let Some(f) = f.take() {
                produced = Some(f(doc));
            }
        })?;
        produced.ok_or_else(|| EngineError::Failed("PDF engine never opened the document".into()))
    }
}

/// An opened PDF. Page indices are 0-based.
pub trait PdfSource {
    fn page_count(&self) -> usize;

    /// Page width in PDF points (1/72 inch).
    fn page_width_points(&self, index: usize) -> Result<f32, EngineError>;

    fn render_page(&self, index: usize, dpi: u32) -> Result<DynamicImage, EngineError>;

    /// Native text layer of one page; empty for scanned pages.
    fn page_text(&self, index: usize) -> Result<String, EngineError>;

    /// Raster images embedded on one page, in content order.
    fn page_images(&self, index: usize) -> Result<Vec<DynamicImage>, EngineError>;
}

/// Recognises text in a raster image.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &DynamicImage, lang: &str) -> Result<String, EngineError>;
}

/// Converts word-processor documents to PDF.
pub trait OfficeConverter: Send + Sync {
    /// Write a PDF rendition of `source` to `destination`.
    fn docx_to_pdf(&self, source: &Path, destination: &Path) -> Result<(), EngineError>;
}

/// One engine of each kind, shared by every job.
#[derive(Clone)]
pub struct Engines {
    pub pdf: Arc<dyn PdfEngine>,
    /// `None` when no OCR backend was compiled in or found.
    pub ocr: Option<Arc<dyn OcrEngine>>,
    pub office: Arc<dyn OfficeConverter>,
}

impl std::fmt::Debug for Engines {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engines")
            .field("ocr", &self.ocr.is_some())
            .finish_non_exhaustive()
    }
}

impl Engines {
    pub fn new(pdf: Arc<dyn PdfEngine>, office: Arc<dyn OfficeConverter>) -> Self {
        Self {
            pdf,
            ocr: None,
            office,
        }
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    /// Bind the default engines from the environment.
    ///
    /// A missing pdfium library does not fail here: image and DOCX jobs do
    /// not need it, and PDF jobs report the binding error when they open
    /// their source.
    pub fn detect() -> Self {
        let pdf: Arc<dyn PdfEngine> = match pdfium::PdfiumEngine::bind() {
            Ok(engine) => {
                debug!("pdfium bound");
                Arc::new(engine)
            }
            Err(e) => {
                warn!("PDF engine unavailable: {e}");
                Arc::new(Unavailable(e.to_string()))
            }
        };
        let office: Arc<dyn OfficeConverter> = Arc::new(office::LibreOffice::from_env());

        #[allow(unused_mut)]
        let mut engines = Self::new(pdf, office);

        #[cfg(feature = "tesseract")]
        {
            engines = engines.with_ocr(Arc::new(tesseract::TesseractOcr));
        }

        engines
    }
}

/// Stand-in for a PDF engine that failed to load.
struct Unavailable(String);

impl PdfEngine for Unavailable {
    fn with_document(
        &self,
        _path: &Path,
        _visit: &mut dyn FnMut(&dyn PdfSource),
    ) -> Result<(), EngineError> {
        Err(EngineError::Unavailable(self.0.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_engine_reports_reason() {
        let engine: Arc<dyn PdfEngine> = Arc::new(Unavailable("libpdfium.so not found".into()));
        match engine.read(Path::new("x.pdf"), |doc| doc.page_count()) {
            Err(EngineError::Unavailable(msg)) => assert!(msg.contains("libpdfium")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an error"),
        }
    }

    struct Blank;

    impl PdfSource for Blank {
        fn page_count(&self) -> usize {
            3
        }
        fn page_width_points(&self, _: usize) -> Result<f32, EngineError> {
            Ok(612.0)
        }
        fn render_page(&self, _: usize, _: u32) -> Result<DynamicImage, EngineError> {
            Ok(DynamicImage::new_rgb8(1, 1))
        }
        fn page_text(&self, _: usize) -> Result<String, EngineError> {
            Ok(String::new())
        }
        fn page_images(&self, _: usize) -> Result<Vec<DynamicImage>, EngineError> {
            Ok(Vec::new())
        }
    }

    struct Lending;

    impl PdfEngine for Lending {
        fn with_document(
            &self,
            _path: &Path,
            visit: &mut dyn FnMut(&dyn PdfSource),
        ) -> Result<(), EngineError> {
            visit(&Blank);
            Ok(())
        }
    }

    struct Silent;

    impl PdfEngine for Silent {
        fn with_document(
            &self,
            _path: &Path,
            _visit: &mut dyn FnMut(&dyn PdfSource),
        ) -> Result<(), EngineError> {
            Ok(())
        }
    }

    #[test]
    fn read_returns_what_the_visitor_produced() {
        let engine: Arc<dyn PdfEngine> = Arc::new(Lending);
        let pages = engine.read(Path::new("x.pdf"), |doc| doc.page_count()).unwrap();
        assert_eq!(pages, 3);
    }

    #[test]
    fn read_fails_when_the_document_is_never_lent() {
        let engine: Arc<dyn PdfEngine> = Arc::new(Silent);
        assert!(matches!(
            engine.read(Path::new("x.pdf"), |doc| doc.page_count()),
            Err(EngineError::Failed(_))
        ));
    }

    #[test]
    fn engines_are_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engines>();
        assert_send_sync::<pdfium::PdfiumEngine>();
    }
}
