//! PDF → DOCX in three fidelity modes.
//!
//! | Mode   | Unit            | Per unit                                  |
//! |--------|-----------------|-------------------------------------------|
//! | text   | selected page   | native text layer → cleaned paragraphs    |
//! | raster | page            | render at DPI → PNG picture               |
//! | ocr    | page            | render at DPI → recognise → paragraphs    |
//!
//! Single-document primitives: the first page that fails aborts the job and
//! nothing is written.

use crate::config::{clamp_dpi, OcrOptions, PageSelection, RasterOptions};
use crate::engine::{Engines, OcrEngine, PdfSource};
use crate::error::ConvertError;
use crate::output::OperationResult;
use crate::pipeline::docx::{display_width_in, DocxBuilder};
use crate::pipeline::image::encode_png;
use crate::pipeline::io::{self, AtomicOutput};
use crate::pipeline::text::paragraphs;
use crate::progress::{Control, ProgressTracker};
use crate::request::{ConversionRequest, PdfToDocxMode};
use std::path::Path;
use tracing::{debug, info, instrument};

fn label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn page_unit(index: usize) -> String {
    format!("page {}", index + 1)
}

#[instrument(skip_all, fields(source = %request.source.display(), mode = mode.name()))]
pub(crate) fn pdf_to_docx(
    engines: &Engines,
    request: &ConversionRequest,
    mode: &PdfToDocxMode,
    control: &Control,
) -> Result<OperationResult, ConvertError> {
    io::prepare(request)?;

    // Fail before opening anything when OCR cannot run.
    if matches!(mode, PdfToDocxMode::Ocr(_)) {
        ocr_engine(engines)?;
    }

    let (builder, page_count) = engines
        .pdf
        .read(&request.source, |doc| {
            let builder = match mode {
                PdfToDocxMode::Text { pages } => text_pages(doc, pages, control)?,
                PdfToDocxMode::Raster(opts) => raster_pages(doc, opts, control)?,
                PdfToDocxMode::Ocr(opts) => ocr_pages(doc, ocr_engine(engines)?, opts, control)?,
            };
            Ok::<_, ConvertError>((builder, doc.page_count()))
        })
        .map_err(|e| ConvertError::engine(label(&request.source), e))??;
    let converted = builder.page_count();

    let mut out = AtomicOutput::new(&request.destination, request.overwrite)?;
    builder
        .write(out.file_mut())
        .map_err(|e| ConvertError::engine(label(&request.destination), e))?;
    let size = out.persist()?;

    info!(pages = converted, of = page_count, size, "DOCX written");
    Ok(OperationResult::finished(
        converted,
        0,
        Vec::new(),
        vec![request.destination.clone()],
    ))
}

fn ocr_engine(engines: &Engines) -> Result<&dyn OcrEngine, ConvertError> {
    engines.ocr.as_deref().ok_or_else(|| {
        ConvertError::Validation(
            "OCR mode needs an OCR engine (build with the `tesseract` feature)".into(),
        )
    })
}

fn require_pages(count: usize) -> Result<(), ConvertError> {
    if count == 0 {
        return Err(ConvertError::Validation("document has no pages".into()));
    }
    Ok(())
}

fn text_pages(
    doc: &dyn PdfSource,
    pages: &PageSelection,
    control: &Control,
) -> Result<DocxBuilder, ConvertError> {
    let page_count = doc.page_count();
    require_pages(page_count)?;
    let indices = pages.to_indices(page_count);
    if indices.is_empty() {
        return Err(ConvertError::Validation(format!(
            "page selection {pages:?} is outside the document's {page_count} pages"
        )));
    }

    let total = indices.len();
    let mut tracker = ProgressTracker::start(control, total, "Extracting text");
    let mut builder = DocxBuilder::new();
    for (n, &idx) in indices.iter().enumerate() {
        tracker.checkpoint()?;
        let raw = doc
            .page_text(idx)
            .map_err(|e| ConvertError::engine(page_unit(idx), e))?;
        let paras = paragraphs(&raw);
        debug!(page = idx + 1, paragraphs = paras.len(), "text extracted");
        builder.add_text_page(&paras);
        tracker.advance(format!("Page {}/{}", n + 1, total));
    }
    Ok(builder)
}

fn raster_pages(
    doc: &dyn PdfSource,
    opts: &RasterOptions,
    control: &Control,
) -> Result<DocxBuilder, ConvertError> {
    let total = doc.page_count();
    require_pages(total)?;

    let dpi = clamp_dpi(opts.dpi);
    let mut tracker = ProgressTracker::start(control, total, &format!("Rendering at {dpi} DPI"));
    let mut builder = DocxBuilder::new();
    for idx in 0..total {
        tracker.checkpoint()?;
        let unit = page_unit(idx);
        let image = doc
            .render_page(idx, dpi)
            .map_err(|e| ConvertError::engine(&unit, e))?;
        let width_pt = doc
            .page_width_points(idx)
            .map_err(|e| ConvertError::engine(&unit, e))?;
        let png = encode_png(&image).map_err(|e| ConvertError::engine(&unit, e))?;
        builder.add_picture_page(&png, image.width(), image.height(), display_width_in(width_pt));
        tracker.advance(format!("Page {}/{}", idx + 1, total));
    }
    Ok(builder)
}

fn ocr_pages(
    doc: &dyn PdfSource,
    ocr: &dyn OcrEngine,
    opts: &OcrOptions,
    control: &Control,
) -> Result<DocxBuilder, ConvertError> {
    let total = doc.page_count();
    require_pages(total)?;

    let dpi = clamp_dpi(opts.dpi);
    let mut tracker = ProgressTracker::start(control, total, &format!("OCR ({})", opts.lang));
    let mut builder = DocxBuilder::new();
    for idx in 0..total {
        tracker.checkpoint()?;
        let unit = page_unit(idx);
        let image = doc
            .render_page(idx, dpi)
            .map_err(|e| ConvertError::engine(&unit, e))?;
        let text = ocr
            .recognize(&image, &opts.lang)
            .map_err(|e| ConvertError::engine(&unit, e))?;
        builder.add_text_page(&paragraphs(&text));
        tracker.advance(format!("Page {}/{} recognised", idx + 1, total));
    }
    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use image::DynamicImage;
    use std::sync::Mutex;

    /// Two blank pages; remembers the DPI of every render.
    #[derive(Default)]
    struct Renders(Mutex<Vec<u32>>);

    impl PdfSource for Renders {
        fn page_count(&self) -> usize {
            2
        }
        fn page_width_points(&self, _: usize) -> Result<f32, EngineError> {
            Ok(612.0)
        }
        fn render_page(&self, _: usize, dpi: u32) -> Result<DynamicImage, EngineError> {
            self.0.lock().unwrap().push(dpi);
            Ok(DynamicImage::new_rgb8(4, 4))
        }
        fn page_text(&self, _: usize) -> Result<String, EngineError> {
            Ok(String::new())
        }
        fn page_images(&self, _: usize) -> Result<Vec<DynamicImage>, EngineError> {
            Ok(Vec::new())
        }
    }

    struct Blind;

    impl OcrEngine for Blind {
        fn recognize(&self, _: &DynamicImage, _: &str) -> Result<String, EngineError> {
            Ok(String::new())
        }
    }

    #[test]
    fn raster_dpi_is_clamped_before_rendering() {
        let low = Renders::default();
        raster_pages(&low, &RasterOptions { dpi: 0 }, &Control::new()).unwrap();
        assert_eq!(*low.0.lock().unwrap(), vec![72, 72]);

        let high = Renders::default();
        raster_pages(&high, &RasterOptions { dpi: 5000 }, &Control::new()).unwrap();
        assert_eq!(*high.0.lock().unwrap(), vec![600, 600]);
    }

    #[test]
    fn ocr_dpi_is_clamped_before_rendering() {
        let doc = Renders::default();
        let opts = OcrOptions {
            dpi: 1,
            ..OcrOptions::default()
        };
        let builder = ocr_pages(&doc, &Blind, &opts, &Control::new()).unwrap();
        assert_eq!(builder.page_count(), 2);
        assert_eq!(*doc.0.lock().unwrap(), vec![72, 72]);
    }
}
