//! pdfium-backed [`PdfEngine`].
//!
//! ## Binding
//!
//! `PDFIUM_LIB_PATH` may point at a directory holding the platform library
//! (`libpdfium.so`, `libpdfium.dylib`, `pdfium.dll`) or at the library file
//! itself. Otherwise the system library search path is used.
//!
//! ## Threading
//!
//! A `Pdfium` binding cannot leave the thread that created it, so the
//! engine only remembers where the library lives. Each document is opened
//! against a fresh binding on the calling thread (the worker's blocking
//! thread) and closed before `with_document` returns. pdfium keeps global
//! state and is not reentrant: opens are serialised process-wide.

use super::{PdfEngine, PdfSource};
use crate::error::EngineError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, instrument};

static PDFIUM_LOCK: Mutex<()> = Mutex::new(());

/// Where to load pdfium from; `None` means the system search path.
pub struct PdfiumEngine {
    library: Option<PathBuf>,
}

impl PdfiumEngine {
    /// Resolve `PDFIUM_LIB_PATH` (or the system library) and check that it
    /// loads.
    pub fn bind() -> Result<Self, EngineError> {
        let library = std::env::var_os("PDFIUM_LIB_PATH").map(|raw| {
            let path = PathBuf::from(raw);
            if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            }
        });
        let engine = Self { library };
        engine.bindings()?;
        Ok(engine)
    }

    fn bindings(&self) -> Result<Box<dyn PdfiumLibraryBindings>, EngineError> {
        match &self.library {
            Some(lib) => {
                debug!(lib = %lib.display(), "binding pdfium from PDFIUM_LIB_PATH");
                Pdfium::bind_to_library(lib)
            }
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| EngineError::Unavailable(format!("pdfium: {e:?}")))
    }
}

impl PdfEngine for PdfiumEngine {
    #[instrument(skip(self, visit), fields(path = %path.display()))]
    fn with_document(
        &self,
        path: &Path,
        visit: &mut dyn FnMut(&dyn PdfSource),
    ) -> Result<(), EngineError> {
        let _guard = PDFIUM_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let pdfium = Pdfium::new(self.bindings()?);
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| EngineError::Open(format!("{e:?}")))?;
        info!(pages = document.pages().len(), "PDF loaded");
        visit(&PdfiumDocument { document });
        Ok(())
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl PdfiumDocument<'_> {
    fn page(&self, index: usize) -> Result<PdfPage<'_>, EngineError> {
        let idx = PdfPageIndex::try_from(index)
            .map_err(|_| EngineError::Failed(format!("page index {index} out of range")))?;
        self.document
            .pages()
            .get(idx)
            .map_err(|e| EngineError::Failed(format!("page {}: {e:?}", index + 1)))
    }
}

impl PdfSource for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_width_points(&self, index: usize) -> Result<f32, EngineError> {
        Ok(self.page(index)?.width().value)
    }

    fn render_page(&self, index: usize, dpi: u32) -> Result<DynamicImage, EngineError> {
        let page = self.page(index)?;
        let config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| EngineError::Failed(format!("render page {}: {e:?}", index + 1)))?;
        let image = bitmap.as_image();
        debug!(
            page = index + 1,
            dpi,
            width = image.width(),
            height = image.height(),
            "rendered"
        );
        Ok(image)
    }

    fn page_text(&self, index: usize) -> Result<String, EngineError> {
        let page = self.page(index)?;
        let text = page
            .text()
            .map_err(|e| EngineError::Failed(format!("text layer of page {}: {e:?}", index + 1)))?;
        Ok(text.all())
    }

    fn page_images(&self, index: usize) -> Result<Vec<DynamicImage>, EngineError> {
        let page = self.page(index)?;
        let mut images = Vec::new();
        for object in page.objects().iter() {
            if let Some(image_object) = object.as_image_object() {
                let raw = image_object.get_raw_image().map_err(|e| {
                    EngineError::Failed(format!("image on page {}: {e:?}", index + 1))
                })?;
                images.push(raw);
            }
        }
        Ok(images)
    }
}
