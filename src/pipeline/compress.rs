//! Size reduction for PDF and DOCX files.
//!
//! ## PDF
//!
//! One unit per page: that page's content streams are Flate-compressed.
//! After the last page the whole document is swept once: unreferenced
//! objects are pruned, every remaining stream is compressed, objects are
//! renumbered, and the result is saved.
//!
//! ## DOCX
//!
//! One unit per `word/media/*` entry plus one for repacking. Raster images
//! are decoded, optionally shrunk, flattened and re-encoded as JPEG at the
//! requested quality. An image whose re-encoding is not smaller (and that
//! was not resized) keeps its original bytes. Vector media (EMF, WMF, SVG)
//! are left untouched. A failing image is recorded and kept as-is.
//!
//! When an image changes extension (`image1.png` → `image1.jpeg`) the
//! relationship parts and `[Content_Types].xml` are rewritten to match, so
//! the package still opens. A new name never collides with an existing
//! entry: `image1_1.jpeg`, `image1_2.jpeg`, … are tried in turn.

use crate::config::{clamp_docx_quality, DocxCompression, ResizeTarget};
use crate::error::{ConvertError, EngineError, UnitError};
use crate::output::{OperationResult, SizeReport};
use crate::pipeline::image::{encode_jpeg, fit_dimensions};
use crate::pipeline::io::{self, AtomicOutput};
use crate::progress::{Control, ProgressTracker};
use crate::request::{extension_of, ConversionRequest};
use image::imageops::FilterType;
use image::GenericImageView;
use lopdf::{Document, Object};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info, instrument, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MEDIA_PREFIX: &str = "word/media/";
const CONTENT_TYPES: &str = "[Content_Types].xml";
const RASTER_MEDIA: &[&str] = &["png", "jpg", "jpeg", "jpe", "bmp", "gif", "tif", "tiff", "webp"];
const MAX_RENAME_SUFFIX: usize = 999;

static OVERRIDE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<Override\b[^>]*>").unwrap());
static CONTENT_TYPE_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"ContentType="[^"]*""#).unwrap());

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ── PDF ──────────────────────────────────────────────────────────────────

#[instrument(skip_all, fields(source = %request.source.display()))]
pub(crate) fn compress_pdf(
    request: &ConversionRequest,
    control: &Control,
) -> Result<OperationResult, ConvertError> {
    let original_size = io::prepare(request)?;
    let label = file_label(&request.source);

    let mut doc =
        Document::load(&request.source).map_err(|e| ConvertError::engine(&label, e))?;
    let pages: Vec<_> = doc.get_pages().into_values().collect();
    if pages.is_empty() {
        return Err(ConvertError::Validation(format!("{label}: document has no pages")));
    }

    let total = pages.len();
    let mut tracker = ProgressTracker::start(control, total, "Compressing PDF");
    for (i, page_id) in pages.into_iter().enumerate() {
        tracker.checkpoint()?;
        for content_id in doc.get_page_contents(page_id) {
            if let Ok(Object::Stream(stream)) = doc.get_object_mut(content_id) {
                if let Err(e) = stream.compress() {
                    debug!(page = i + 1, error = %e, "content stream left as-is");
                }
            }
        }
        tracker.advance(format!("Page {}/{}", i + 1, total));
    }

    let pruned = doc.prune_objects();
    doc.delete_zero_length_streams();
    doc.compress();
    doc.renumber_objects();
    debug!(pruned = pruned.len(), "document swept");

    let mut out = AtomicOutput::new(&request.destination, request.overwrite)?;
    doc.save_to(out.file_mut())
        .map_err(|e| ConvertError::engine(&label, e))?;
    let new_size = out.persist()?;

    let sizes = SizeReport::new(original_size, new_size);
    info!(
        original_size,
        new_size,
        reduction_percent = sizes.reduction_percent,
        "PDF compressed"
    );
    Ok(
        OperationResult::finished(total, 0, Vec::new(), vec![request.destination.clone()])
            .with_sizes(sizes),
    )
}

// ── DOCX ─────────────────────────────────────────────────────────────────

/// What happened to one media entry.
enum Recompressed {
    /// JPEG bytes to store in place of the original.
    Replaced(Vec<u8>),
    Kept,
}

fn is_raster_media(name: &str) -> bool {
    RASTER_MEDIA.contains(&extension_of(Path::new(name)).as_str())
}

/// Entry name for a JPEG re-encoding of `name` that is not in `taken`.
///
/// `None` when every candidate is already used.
fn jpeg_name(name: &str, taken: &HashSet<String>) -> Option<String> {
    if matches!(extension_of(Path::new(name)).as_str(), "jpg" | "jpeg" | "jpe") {
        return Some(name.to_string());
    }
    let stem = match name.rfind('.') {
        Some(dot) if dot > name.rfind('/').map_or(0, |s| s + 1) => &name[..dot],
        _ => name,
    };
    std::iter::once(format!("{stem}.jpeg"))
        .chain((1..=MAX_RENAME_SUFFIX).map(|n| format!("{stem}_{n}.jpeg")))
        .find(|candidate| !taken.contains(candidate))
}

fn recompress_image(
    name: &str,
    bytes: &[u8],
    options: &DocxCompression,
) -> Result<Recompressed, EngineError> {
    let mut img = image::load_from_memory(bytes)?;
    let (w, h) = img.dimensions();

    let mut resized = false;
    if let Some(target) = ResizeTarget::from_raw(
        options.max_width.unwrap_or(0),
        options.max_height.unwrap_or(0),
    ) {
        let (nw, nh) = fit_dimensions(w, h, target, true);
        if (nw, nh) != (w, h) {
            img = img.resize_exact(nw, nh, FilterType::Lanczos3);
            resized = true;
        }
    }

    let encoded = encode_jpeg(&img, clamp_docx_quality(options.quality.into()))?;
    if !resized && encoded.len() >= bytes.len() {
        return Ok(Recompressed::Kept);
    }
    debug!(
        entry = name,
        before = bytes.len(),
        after = encoded.len(),
        resized,
        "image recompressed"
    );
    Ok(Recompressed::Replaced(encoded))
}

/// Point relationship targets at renamed media files.
fn rewrite_rels(xml: &str, renames: &HashMap<String, String>) -> String {
    let mut out = xml.to_string();
    for (old, new) in renames {
        let old_file = old.trim_start_matches(MEDIA_PREFIX);
        let new_file = new.trim_start_matches(MEDIA_PREFIX);
        out = out.replace(
            &format!("media/{old_file}\""),
            &format!("media/{new_file}\""),
        );
    }
    out
}

/// Rename part overrides (now `image/jpeg`) and make sure `.jpeg` has a
/// default content type.
fn rewrite_content_types(xml: &str, renames: &HashMap<String, String>) -> String {
    let mut out = OVERRIDE_TAG
        .replace_all(xml, |caps: &Captures| {
            let tag = &caps[0];
            for (old, new) in renames {
                let part = format!("PartName=\"/{old}\"");
                if tag.contains(&part) {
                    let renamed = tag.replace(&part, &format!("PartName=\"/{new}\""));
                    return CONTENT_TYPE_ATTR
                        .replace(&renamed, r#"ContentType="image/jpeg""#)
                        .into_owned();
                }
            }
            tag.to_string()
        })
        .into_owned();
    let declared = out.to_ascii_lowercase().contains("extension=\"jpeg\"");
    if !renames.is_empty() && !declared {
        if let Some(pos) = out.rfind("</Types>") {
            out.insert_str(
                pos,
                "<Default Extension=\"jpeg\" ContentType=\"image/jpeg\"/>",
            );
        }
    }
    out
}

fn zip_err(label: &str) -> impl Fn(zip::result::ZipError) -> ConvertError + '_ {
    move |e| ConvertError::engine(label, e)
}

#[instrument(skip_all, fields(source = %request.source.display(), quality = options.quality))]
pub(crate) fn compress_docx(
    request: &ConversionRequest,
    options: &DocxCompression,
    control: &Control,
) -> Result<OperationResult, ConvertError> {
    let original_size = io::prepare(request)?;
    let label = file_label(&request.source);

    let file = File::open(&request.source).map_err(|e| ConvertError::io(&request.source, e))?;
    let mut archive = ZipArchive::new(file).map_err(zip_err(&label))?;

    let mut media = Vec::new();
    let mut taken = HashSet::new();
    for i in 0..archive.len() {
        let entry = archive.by_index(i).map_err(zip_err(&label))?;
        if entry.name().starts_with(MEDIA_PREFIX) && !entry.is_dir() {
            media.push(i);
        }
        taken.insert(entry.name().to_string());
    }

    let image_count = media.len();
    let total = image_count + 1;
    let mut tracker =
        ProgressTracker::start(control, total, &format!("Compressing {image_count} images"));

    let mut replaced: HashMap<usize, (String, Vec<u8>)> = HashMap::new();
    let mut renames: HashMap<String, String> = HashMap::new();
    let mut skipped = 0;
    let mut errors = Vec::new();

    for (n, &index) in media.iter().enumerate() {
        tracker.checkpoint()?;
        let mut entry = archive.by_index(index).map_err(zip_err(&label))?;
        let name = entry.name().to_string();

        if !is_raster_media(&name) {
            debug!(entry = %name, "non-raster media skipped");
            skipped += 1;
        } else {
            let mut bytes = Vec::with_capacity(entry.size() as usize);
            let outcome = entry
                .read_to_end(&mut bytes)
                .map_err(|e| EngineError::Failed(format!("read entry: {e}")))
                .and_then(|_| recompress_image(&name, &bytes, options));
            match outcome {
                Ok(Recompressed::Replaced(bytes)) => match jpeg_name(&name, &taken) {
                    Some(new_name) => {
                        if new_name != name {
                            taken.insert(new_name.clone());
                            renames.insert(name.clone(), new_name.clone());
                        }
                        replaced.insert(index, (new_name, bytes));
                    }
                    None => {
                        warn!(entry = %name, "no free JPEG name, image left unchanged");
                        skipped += 1;
                    }
                },
                Ok(Recompressed::Kept) => skipped += 1,
                Err(e) => {
                    warn!(entry = %name, error = %e, "image left unchanged");
                    errors.push(UnitError::new(name.clone(), e.to_string()));
                }
            }
        }
        tracker.advance(format!("Image {}/{}", n + 1, image_count));
    }

    tracker.checkpoint()?;
    let mut out = AtomicOutput::new(&request.destination, request.overwrite)?;
    {
        let mut writer = ZipWriter::new(out.file_mut());
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for i in 0..archive.len() {
            if let Some((new_name, bytes)) = replaced.remove(&i) {
                writer
                    .start_file(new_name, deflated)
                    .map_err(zip_err(&label))?;
                writer
                    .write_all(&bytes)
                    .map_err(|e| ConvertError::io(&request.destination, e))?;
                continue;
            }

            let entry = archive.by_index(i).map_err(zip_err(&label))?;
            let name = entry.name().to_string();
            let rewrite = !renames.is_empty() && (name.ends_with(".rels") || name == CONTENT_TYPES);
            if !rewrite {
                writer.raw_copy_file(entry).map_err(zip_err(&label))?;
                continue;
            }

            let mut raw = Vec::new();
            let mut entry = entry;
            entry
                .read_to_end(&mut raw)
                .map_err(|e| ConvertError::io(&request.source, e))?;
            drop(entry);
            let patched = match String::from_utf8(raw) {
                Ok(xml) if name == CONTENT_TYPES => {
                    rewrite_content_types(&xml, &renames).into_bytes()
                }
                Ok(xml) => rewrite_rels(&xml, &renames).into_bytes(),
                Err(e) => e.into_bytes(),
            };
            writer.start_file(name, deflated).map_err(zip_err(&label))?;
            writer
                .write_all(&patched)
                .map_err(|e| ConvertError::io(&request.destination, e))?;
        }
        writer.finish().map_err(zip_err(&label))?;
    }
    tracker.advance("Repacked DOCX");
    let new_size = out.persist()?;

    let converted = image_count - skipped - errors.len();
    let sizes = SizeReport::new(original_size, new_size);
    info!(
        images = image_count,
        converted,
        skipped,
        failed = errors.len(),
        reduction_percent = sizes.reduction_percent,
        "DOCX compressed"
    );
    Ok(
        OperationResult::finished(converted, skipped, errors, vec![request.destination.clone()])
            .with_sizes(sizes)
            .with_images_processed(converted),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jpeg_names() {
        let none = HashSet::new();
        assert_eq!(jpeg_name("word/media/image1.png", &none).unwrap(), "word/media/image1.jpeg");
        assert_eq!(jpeg_name("word/media/photo.JPG", &none).unwrap(), "word/media/photo.JPG");
        assert_eq!(jpeg_name("word/media/raw", &none).unwrap(), "word/media/raw.jpeg");
    }

    #[test]
    fn jpeg_names_skip_existing_entries() {
        let taken: HashSet<String> = ["word/media/image1.jpeg", "word/media/image1_1.jpeg"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(
            jpeg_name("word/media/image1.png", &taken).unwrap(),
            "word/media/image1_2.jpeg"
        );

        let mut full = HashSet::from(["word/media/a.jpeg".to_string()]);
        full.extend((1..=MAX_RENAME_SUFFIX).map(|n| format!("word/media/a_{n}.jpeg")));
        assert_eq!(jpeg_name("word/media/a.png", &full), None);
    }

    #[test]
    fn docx_quality_is_clamped_at_encode_time() {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(300, 200, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x * y) % 256) as u8])
        }));
        let png = crate::pipeline::image::encode_png(&img).unwrap();
        let at = |quality: u8| {
            let options = DocxCompression {
                quality,
                max_width: Some(100),
                max_height: None,
            };
            match recompress_image("word/media/p.png", &png, &options).unwrap() {
                Recompressed::Replaced(bytes) => bytes,
                Recompressed::Kept => panic!("resized image must be replaced"),
            }
        };
        assert_eq!(at(100), at(95));
        assert_eq!(at(0), at(1));
    }

    #[test]
    fn raster_media_detection() {
        assert!(is_raster_media("word/media/a.PNG"));
        assert!(!is_raster_media("word/media/diagram.emf"));
        assert!(!is_raster_media("word/media/logo.svg"));
    }

    #[test]
    fn rels_targets_follow_renames() {
        let renames = HashMap::from([(
            "word/media/image1.png".to_string(),
            "word/media/image1.jpeg".to_string(),
        )]);
        let xml = r#"<Relationship Id="rId4" Target="media/image1.png"/><Relationship Id="rId5" Target="media/image11.png"/>"#;
        let out = rewrite_rels(xml, &renames);
        assert!(out.contains(r#"Target="media/image1.jpeg""#));
        assert!(out.contains(r#"Target="media/image11.png""#));
    }

    #[test]
    fn content_types_gain_jpeg_default() {
        let renames = HashMap::from([(
            "word/media/image1.png".to_string(),
            "word/media/image1.jpeg".to_string(),
        )]);
        let xml = r#"<Types><Default Extension="png" ContentType="image/png"/><Override PartName="/word/media/image1.png" ContentType="image/png"/><Override PartName="/word/document.xml" ContentType="application/xml"/></Types>"#;
        let out = rewrite_content_types(xml, &renames);
        assert!(out.contains(r#"Extension="jpeg""#));
        assert!(out.contains(
            r#"<Override PartName="/word/media/image1.jpeg" ContentType="image/jpeg"/>"#
        ));
        assert!(!out.contains("/word/media/image1.png"));
        assert!(out.contains(
            r#"<Override PartName="/word/document.xml" ContentType="application/xml"/>"#
        ));
        assert!(out.contains(r#"<Default Extension="png" ContentType="image/png"/>"#));
        assert!(out.ends_with("</Types>"));

        // Already declared: no duplicate.
        let again = rewrite_content_types(&out, &renames);
        assert_eq!(again.matches(r#"Extension="jpeg""#).count(), 1);
    }
}
