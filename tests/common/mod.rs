//! Shared fixtures for the integration tests.
//!
//! The fake engines stand in for pdfium, tesseract and LibreOffice so the
//! orchestration (progress, cancellation, atomic output, error collection)
//! can be tested without native libraries.
//!
//! A fake PDF is a text file whose first line is `%PDF-fake pages=N`. Any
//! file not starting with `%PDF` is rejected as corrupt.

#![allow(dead_code)]

use docshift::{
    CancelCheck, Control, EngineError, Engines, OcrEngine, OfficeConverter, PdfEngine, PdfSource,
    ProgressCallback, ProgressEvent,
};
use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

// ── Fake engines ─────────────────────────────────────────────────────────────

pub struct FakePdf;

struct FakeDoc {
    pages: usize,
}

impl PdfEngine for FakePdf {
    fn with_document(
        &self,
        path: &Path,
        visit: &mut dyn FnMut(&dyn PdfSource),
    ) -> Result<(), EngineError> {
        let raw = std::fs::read_to_string(path).map_err(|e| EngineError::Open(e.to_string()))?;
        let header = raw.lines().next().unwrap_or_default();
        if !header.starts_with("%PDF") {
            return Err(EngineError::Open("not a PDF".into()));
        }
        let pages = header
            .split_whitespace()
            .find_map(|t| t.strip_prefix("pages="))
            .and_then(|n| n.parse().ok())
            .unwrap_or(1);
        visit(&FakeDoc { pages });
        Ok(())
    }
}

impl PdfSource for FakeDoc {
    fn page_count(&self) -> usize {
        self.pages
    }

    fn page_width_points(&self, _index: usize) -> Result<f32, EngineError> {
        Ok(144.0)
    }

    fn render_page(&self, index: usize, dpi: u32) -> Result<DynamicImage, EngineError> {
        let shade = (index * 40 % 255) as u8;
        let img: RgbImage =
            ImageBuffer::from_pixel(dpi * 2, dpi * 3, Rgb([shade, 200, 255 - shade]));
        Ok(DynamicImage::ImageRgb8(img))
    }

    fn page_text(&self, index: usize) -> Result<String, EngineError> {
        Ok(format!(
            "Page {}\r\n\r\nThis para-\ngraph was hyphen-\nated.",
            index + 1
        ))
    }

    fn page_images(&self, index: usize) -> Result<Vec<DynamicImage>, EngineError> {
        let img: RgbImage = ImageBuffer::from_pixel(20, 10, Rgb([index as u8, 0, 0]));
        Ok(vec![DynamicImage::ImageRgb8(img)])
    }
}

pub struct FakeOcr;

impl OcrEngine for FakeOcr {
    fn recognize(&self, image: &DynamicImage, lang: &str) -> Result<String, EngineError> {
        Ok(format!("Recognised {}x{} [{lang}]", image.width(), image.height()))
    }
}

/// Writes a small valid PDF; fails on sources containing `BROKEN`.
pub struct FakeOffice;

impl OfficeConverter for FakeOffice {
    fn docx_to_pdf(&self, source: &Path, destination: &Path) -> Result<(), EngineError> {
        let bytes = std::fs::read(source).map_err(|e| EngineError::Open(e.to_string()))?;
        if bytes.windows(6).any(|w| w == b"BROKEN") {
            return Err(EngineError::Failed("conversion failed".into()));
        }
        write_pdf(destination, 1, 1);
        Ok(())
    }
}

pub fn engines() -> Engines {
    Engines::new(Arc::new(FakePdf), Arc::new(FakeOffice))
}

pub fn engines_with_ocr() -> Engines {
    engines().with_ocr(Arc::new(FakeOcr))
}

// ── Progress and cancellation ────────────────────────────────────────────────

pub type Events = Arc<Mutex<Vec<ProgressEvent>>>;

pub fn recording() -> (Events, ProgressCallback) {
    let events: Events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let cb: ProgressCallback = Arc::new(move |current: usize, total: usize, msg: &str| {
        sink.lock().unwrap().push(ProgressEvent {
            current,
            total,
            message: msg.to_string(),
        });
    });
    (events, cb)
}

pub fn recorded(events: &Events) -> Vec<(usize, usize)> {
    events
        .lock()
        .unwrap()
        .iter()
        .map(|e| (e.current, e.total))
        .collect()
}

/// Reports cancelled from the `n`-th poll on (0-based).
pub fn cancel_after(n: usize) -> Arc<dyn CancelCheck> {
    let polls = AtomicUsize::new(0);
    Arc::new(move || polls.fetch_add(1, Ordering::SeqCst) >= n)
}

pub fn recording_control() -> (Events, Control) {
    let (events, cb) = recording();
    (events, Control::new().with_progress(cb))
}

// ── File fixtures ────────────────────────────────────────────────────────────

pub fn fake_pdf(dir: &Path, name: &str, pages: usize) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("%PDF-fake pages={pages}\n")).unwrap();
    path
}

pub fn corrupt_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"this is not a document").unwrap();
    path
}

/// Smooth colour gradient, which JPEG compresses predictably.
pub fn gradient(width: u32, height: u32) -> DynamicImage {
    let img: RgbImage = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
        ])
    });
    DynamicImage::ImageRgb8(img)
}

pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    gradient(width, height).save(&path).unwrap();
    path
}

pub fn jpeg_bytes(img: &DynamicImage, quality: u8) -> Vec<u8> {
    let mut buf = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
    img.write_with_encoder(encoder).unwrap();
    buf
}

pub fn png_bytes(img: &DynamicImage) -> Vec<u8> {
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// A DOCX package whose `word/media/` holds `media`. Every entry gets a
/// relationship in `document.xml.rels` and a part override in
/// `[Content_Types].xml`.
pub fn docx_with_media(dir: &Path, name: &str, media: &[(&str, Vec<u8>)]) -> PathBuf {
    let mut overrides = String::new();
    let mut rels = String::new();
    for (i, (file, _)) in media.iter().enumerate() {
        let content_type = match file.rsplit('.').next() {
            Some("png") => "image/png",
            Some("jpeg") | Some("jpg") => "image/jpeg",
            _ => "application/octet-stream",
        };
        overrides.push_str(&format!(
            r#"<Override PartName="/word/media/{file}" ContentType="{content_type}"/>"#
        ));
        rels.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/{file}"/>"#,
            i + 1
        ));
    }

    let path = dir.join(name);
    let mut zip = ZipWriter::new(std::fs::File::create(&path).unwrap());
    let opts = SimpleFileOptions::default();

    zip.start_file("[Content_Types].xml", opts).unwrap();
    write!(
        zip,
        r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/>{overrides}</Types>"#
    )
    .unwrap();

    zip.start_file("word/document.xml", opts).unwrap();
    zip.write_all(br#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>Hello</w:t></w:r></w:p></w:body></w:document>"#)
        .unwrap();

    zip.start_file("word/_rels/document.xml.rels", opts).unwrap();
    write!(
        zip,
        r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#
    )
    .unwrap();

    for (file, bytes) in media {
        zip.start_file(format!("word/media/{file}"), opts).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
    path
}

/// Names of every entry in a zip archive.
pub fn zip_names(path: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    archive.file_names().map(String::from).collect()
}

/// A DOCX package holding one 1600×1200 high-quality JPEG and one SVG.
pub fn docx_with_images(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut zip = ZipWriter::new(file);
    let opts = SimpleFileOptions::default();

    zip.start_file("[Content_Types].xml", opts).unwrap();
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="jpeg" ContentType="image/jpeg"/><Default Extension="svg" ContentType="image/svg+xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#,
    )
    .unwrap();

    zip.start_file("word/document.xml", opts).unwrap();
    zip.write_all(br#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>Hello</w:t></w:r></w:p></w:body></w:document>"#)
        .unwrap();

    zip.start_file("word/_rels/document.xml.rels", opts).unwrap();
    zip.write_all(br#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.jpeg"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/logo.svg"/></Relationships>"#)
        .unwrap();

    zip.start_file("word/media/image1.jpeg", opts).unwrap();
    zip.write_all(&jpeg_bytes(&gradient(1600, 1200), 100)).unwrap();

    zip.start_file("word/media/logo.svg", opts).unwrap();
    zip.write_all(br#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"/>"#)
        .unwrap();

    zip.finish().unwrap();
    path
}

/// Read one entry of a zip archive.
pub fn zip_entry(path: &Path, name: &str) -> Vec<u8> {
    use std::io::Read;
    let mut archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf).unwrap();
    buf
}

/// A real PDF with `pages` pages of repeated, uncompressed text operators.
pub fn write_pdf(path: &Path, pages: usize, lines_per_page: usize) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for p in 0..pages {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
        ];
        for line in 0..lines_per_page {
            operations.push(Operation::new("Td", vec![0.into(), (-12).into()]));
            operations.push(Operation::new(
                "Tj",
                vec![Object::string_literal(format!(
                    "Page {} line {} lorem ipsum dolor sit amet",
                    p + 1,
                    line + 1
                ))],
            ));
        }
        operations.push(Operation::new("ET", vec![]));
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}
