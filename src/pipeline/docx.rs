//! DOCX assembly for the PDF → DOCX modes, on top of `docx-rs`.
//!
//! Pages are appended in order with a hard page break between them. Text
//! pages become one paragraph per cleaned paragraph; raster pages become a
//! single inline picture sized to the physical page width.

use crate::error::EngineError;
use docx_rs::{BreakType, Docx, Paragraph, Pic, Run};
use std::io::{Seek, Write};

/// English Metric Units per inch, the DrawingML length unit.
const EMU_PER_INCH: f64 = 914_400.0;
/// Widest picture that fits a Letter page with default margins.
pub(crate) const MAX_PICTURE_WIDTH_IN: f64 = 7.5;

#[derive(Default)]
pub(crate) struct DocxBuilder {
    paragraphs: Vec<Paragraph>,
    pages: usize,
}

impl DocxBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn start_page(&mut self) {
        if self.pages > 0 {
            self.paragraphs
                .push(Paragraph::new().add_run(Run::new().add_break(BreakType::Page)));
        }
        self.pages += 1;
    }

    /// Append a page of text. Newlines inside a paragraph become line breaks.
    pub(crate) fn add_text_page(&mut self, paragraphs: &[String]) {
        self.start_page();
        if paragraphs.is_empty() {
            self.paragraphs.push(Paragraph::new());
            return;
        }
        for para in paragraphs {
            let mut run = Run::new();
            for (i, line) in para.split('\n').enumerate() {
                if i > 0 {
                    run = run.add_break(BreakType::TextWrapping);
                }
                run = run.add_text(line);
            }
            self.paragraphs.push(Paragraph::new().add_run(run));
        }
    }

    /// Append a page holding one picture `width_in` inches wide.
    pub(crate) fn add_picture_page(
        &mut self,
        png: &[u8],
        pixel_width: u32,
        pixel_height: u32,
        width_in: f64,
    ) {
        self.start_page();
        let (w, h) = picture_extent(pixel_width, pixel_height, width_in);
        let pic = Pic::new(png).size(w, h);
        self.paragraphs
            .push(Paragraph::new().add_run(Run::new().add_image(pic)));
    }

    pub(crate) fn page_count(&self) -> usize {
        self.pages
    }

    /// Serialise the package into `out`.
    pub(crate) fn write<W: Write + Seek>(self, out: W) -> Result<(), EngineError> {
        let docx = self
            .paragraphs
            .into_iter()
            .fold(Docx::new(), |doc, p| doc.add_paragraph(p));
        docx.build()
            .pack(out)
            .map_err(|e| EngineError::Failed(format!("write docx: {e}")))?;
        Ok(())
    }
}

/// Picture size in EMU: `width_in` wide, height following the pixel aspect.
pub(crate) fn picture_extent(pixel_width: u32, pixel_height: u32, width_in: f64) -> (u32, u32) {
    let width_emu = width_in * EMU_PER_INCH;
    let aspect = pixel_height as f64 / pixel_width.max(1) as f64;
    (width_emu.round() as u32, (width_emu * aspect).round() as u32)
}

/// Physical page width in inches, capped to what fits the page body.
pub(crate) fn display_width_in(page_width_points: f32) -> f64 {
    (page_width_points as f64 / 72.0).clamp(0.1, MAX_PICTURE_WIDTH_IN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picture_width_is_capped() {
        // US Letter is 612 pt = 8.5 in.
        assert_eq!(display_width_in(612.0), MAX_PICTURE_WIDTH_IN);
        assert!((display_width_in(360.0) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn extent_keeps_aspect() {
        let (w, h) = picture_extent(1000, 500, 2.0);
        assert_eq!(w, 1_828_800);
        assert_eq!(h, 914_400);
    }

    #[test]
    fn builds_a_zip_package() {
        let mut builder = DocxBuilder::new();
        builder.add_text_page(&["Hello\nworld".to_string()]);
        builder.add_text_page(&[]);
        assert_eq!(builder.page_count(), 2);

        let mut buf = std::io::Cursor::new(Vec::new());
        builder.write(&mut buf).unwrap();
        let bytes = buf.into_inner();
        assert_eq!(&bytes[..2], b"PK");
    }
}
