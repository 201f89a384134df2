//! Tesseract OCR through `leptess`.
//!
//! A fresh `LepTess` handle is created per call; it is not `Send`. Language
//! data is looked up through `TESSDATA_PREFIX` by tesseract itself.

use super::OcrEngine;
use crate::error::EngineError;
use image::DynamicImage;
use leptess::LepTess;
use std::io::Cursor;
use tracing::{debug, instrument};

#[derive(Debug, Default, Clone, Copy)]
pub struct TesseractOcr;

impl OcrEngine for TesseractOcr {
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    fn recognize(&self, image: &DynamicImage, lang: &str) -> Result<String, EngineError> {
        let mut lt = LepTess::new(None, lang).map_err(|e| {
            EngineError::Unavailable(format!("tesseract ({lang}): {e}"))
        })?;

        let mut png = Cursor::new(Vec::new());
        image.write_to(&mut png, image::ImageFormat::Png)?;

        lt.set_image_from_mem(png.get_ref())
            .map_err(|e| EngineError::Failed(format!("tesseract input: {e}")))?;

        let text = lt
            .get_utf8_text()
            .map_err(|e| EngineError::Failed(format!("tesseract output: {e}")))?;
        debug!(chars = text.len(), "recognised");
        Ok(text)
    }
}
