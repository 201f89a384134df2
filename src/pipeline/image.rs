//! Raster codec work: resize, flatten, encode.
//!
//! Shared by standalone image conversion, DOCX image recompression, page
//! rendering for raster-mode DOCX and image extraction.

use crate::config::{clamp_image_quality, ImageFormat, ImageOptions, ResizeTarget};
use crate::error::{ConvertError, EngineError, UnitError};
use crate::output::{human_size, ImageInfo, OperationResult};
use crate::pipeline::io::{self, AtomicOutput};
use crate::progress::{Control, ProgressTracker};
use crate::request::ConversionRequest;
use image::codecs::ico::{IcoEncoder, IcoFrame};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, GenericImageView, ImageReader, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Icon sizes written into `.ico` files, largest first.
const ICO_SIZES: [u32; 6] = [256, 128, 64, 48, 32, 16];

// ── Geometry ─────────────────────────────────────────────────────────────

/// Output dimensions for `target`.
///
/// With `keep_aspect` the image is scaled by the largest factor ≤ 1 that
/// fits every constrained axis, so it is never upscaled. Without it the
/// constrained axes take the exact target size.
pub(crate) fn fit_dimensions(
    width: u32,
    height: u32,
    target: ResizeTarget,
    keep_aspect: bool,
) -> (u32, u32) {
    if !keep_aspect {
        return (
            target.width.unwrap_or(width),
            target.height.unwrap_or(height),
        );
    }

    let mut scale = 1.0_f64;
    if let Some(tw) = target.width {
        scale = scale.min(tw as f64 / width.max(1) as f64);
    }
    if let Some(th) = target.height {
        scale = scale.min(th as f64 / height.max(1) as f64);
    }
    if scale >= 1.0 {
        return (width, height);
    }
    (
        ((width as f64 * scale).round() as u32).max(1),
        ((height as f64 * scale).round() as u32).max(1),
    )
}

/// Descending square icon sizes that do not exceed the source.
pub(crate) fn ico_sizes(width: u32, height: u32) -> Vec<u32> {
    let largest = width.max(height).max(1);
    let sizes: Vec<u32> = ICO_SIZES.into_iter().filter(|&s| s <= largest).collect();
    if sizes.is_empty() {
        vec![largest.min(ICO_SIZES[0])]
    } else {
        sizes
    }
}

/// Composite onto white and drop the alpha channel.
pub(crate) fn flatten_onto_white(img: &DynamicImage) -> DynamicImage {
    if !img.color().has_alpha() {
        return DynamicImage::ImageRgb8(img.to_rgb8());
    }
    let rgba = img.to_rgba8();
    let flat = RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let p = rgba.get_pixel(x, y).0;
        let a = p[3] as u32;
        let blend = |c: u8| ((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        image::Rgb([blend(p[0]), blend(p[1]), blend(p[2])])
    });
    DynamicImage::ImageRgb8(flat)
}

// ── Encoding ─────────────────────────────────────────────────────────────

pub(crate) fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, EngineError> {
    let flat = flatten_onto_white(img);
    let mut buf = Cursor::new(Vec::new());
    flat.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;
    Ok(buf.into_inner())
}

pub(crate) fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, EngineError> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)?;
    Ok(buf.into_inner())
}

fn encode_ico(img: &DynamicImage) -> Result<Vec<u8>, EngineError> {
    let rasters: Vec<(u32, image::RgbaImage)> = ico_sizes(img.width(), img.height())
        .into_iter()
        .map(|s| (s, img.resize_exact(s, s, FilterType::Lanczos3).to_rgba8()))
        .collect();
    let frames = rasters
        .iter()
        .map(|(s, r)| IcoFrame::as_png(r.as_raw(), *s, *s, ExtendedColorType::Rgba8))
        .collect::<Result<Vec<_>, _>>()?;
    let mut buf = Cursor::new(Vec::new());
    IcoEncoder::new(&mut buf).encode_images(&frames)?;
    Ok(buf.into_inner())
}

/// Encode `img` as `format`. Only JPEG honours `quality`.
pub(crate) fn encode(
    img: &DynamicImage,
    format: ImageFormat,
    quality: u8,
) -> Result<Vec<u8>, EngineError> {
    match format {
        ImageFormat::Jpeg => encode_jpeg(img, quality),
        ImageFormat::Ico => encode_ico(img),
        ImageFormat::Png | ImageFormat::Tiff => {
            let mut buf = Cursor::new(Vec::new());
            img.write_to(&mut buf, format.codec())?;
            Ok(buf.into_inner())
        }
        ImageFormat::Webp | ImageFormat::Bmp | ImageFormat::Gif => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            let mut buf = Cursor::new(Vec::new());
            rgba.write_to(&mut buf, format.codec())?;
            Ok(buf.into_inner())
        }
    }
}

/// Decode, resize and re-encode one image according to `options`.
pub(crate) fn transcode(bytes: &[u8], options: &ImageOptions) -> Result<Vec<u8>, EngineError> {
    let mut img = image::load_from_memory(bytes)?;
    if let Some(target) = options.resize {
        let (w, h) = img.dimensions();
        let (nw, nh) = fit_dimensions(w, h, target, options.keep_aspect);
        if (nw, nh) != (w, h) {
            debug!(from = ?(w, h), to = ?(nw, nh), "resizing");
            img = img.resize_exact(nw, nh, FilterType::Lanczos3);
        }
    }
    encode(&img, options.format, clamp_image_quality(options.quality.into()))
}

// ── Primitives ───────────────────────────────────────────────────────────

fn unit_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn convert_file(
    source: &Path,
    destination: &Path,
    options: &ImageOptions,
    overwrite: bool,
) -> Result<u64, ConvertError> {
    let bytes = std::fs::read(source).map_err(|e| ConvertError::io(source, e))?;
    let encoded =
        transcode(&bytes, options).map_err(|e| ConvertError::engine(unit_name(source), e))?;
    AtomicOutput::write_all(destination, overwrite, &encoded)
}

/// Convert one image. A single unit of work.
#[instrument(skip_all, fields(source = %request.source.display(), format = %options.format))]
pub(crate) fn convert_image(
    request: &ConversionRequest,
    options: &ImageOptions,
    control: &Control,
) -> Result<OperationResult, ConvertError> {
    io::prepare(request)?;

    let mut tracker = ProgressTracker::start(control, 1, "Converting image");
    tracker.checkpoint()?;
    let size = convert_file(&request.source, &request.destination, options, request.overwrite)?;
    tracker.advance(format!("Converted {}", unit_name(&request.source)));

    info!(size, "image converted");
    Ok(OperationResult::finished(
        1,
        0,
        Vec::new(),
        vec![request.destination.clone()],
    ))
}

/// Convert many images into `output_dir`, one unit per file.
///
/// A file that fails is recorded and skipped; the run continues. On
/// cancellation the images already written are listed in the `Cancelled`
/// result.
#[instrument(skip_all, fields(files = sources.len(), format = %options.format))]
pub(crate) fn convert_images(
    sources: &[PathBuf],
    output_dir: &Path,
    options: &ImageOptions,
    overwrite: bool,
    control: &Control,
) -> Result<OperationResult, ConvertError> {
    if sources.is_empty() {
        return Err(ConvertError::Validation("no images to convert".into()));
    }
    io::ensure_dir(output_dir)?;

    let total = sources.len();
    let mut tracker = ProgressTracker::start(control, total, &format!("Converting {total} images"));
    let mut outputs = Vec::new();
    let mut errors = Vec::new();

    for source in sources {
        if let Err(e) = tracker.checkpoint() {
            return Ok(OperationResult::interrupted(&e, errors, outputs));
        }
        let request = ConversionRequest::into_dir(
            source.clone(),
            output_dir,
            crate::request::Conversion::Image(*options),
        )
        .overwrite(overwrite);

        let result = io::prepare(&request).and_then(|_| {
            convert_file(&request.source, &request.destination, options, overwrite)
        });
        match result {
            Ok(_) => outputs.push(request.destination),
            Err(e) => {
                warn!(file = %source.display(), error = %e, "image skipped");
                errors.push(UnitError::new(unit_name(source), e.to_string()));
            }
        }
        tracker.advance(format!("Converting {}", unit_name(source)));
    }

    info!(converted = outputs.len(), failed = errors.len(), "image batch finished");
    Ok(OperationResult::finished(outputs.len(), 0, errors, outputs))
}

/// Dimensions, format, colour layout and size of an image file.
pub(crate) fn image_info(path: &Path) -> Result<ImageInfo, ConvertError> {
    let file_size = io::source_size(path)?;
    let reader = ImageReader::open(path)
        .map_err(|e| ConvertError::io(path, e))?
        .with_guessed_format()
        .map_err(|e| ConvertError::io(path, e))?;
    let format = reader
        .format()
        .map(|f| format!("{f:?}").to_uppercase())
        .unwrap_or_else(|| "UNKNOWN".to_string());
    let img = reader
        .decode()
        .map_err(|e| ConvertError::engine(unit_name(path), EngineError::from(e)))?;

    Ok(ImageInfo {
        width: img.width(),
        height: img.height(),
        format,
        color: format!("{:?}", img.color()),
        file_size,
        file_size_human: human_size(file_size),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn target(w: u32, h: u32) -> ResizeTarget {
        ResizeTarget::from_raw(w, h).unwrap()
    }

    #[test]
    fn aspect_lock_fits_both_axes_without_upscaling() {
        assert_eq!(fit_dimensions(1600, 1200, target(800, 0), true), (800, 600));
        assert_eq!(fit_dimensions(1600, 1200, target(800, 300), true), (400, 300));
        assert_eq!(fit_dimensions(400, 300, target(800, 600), true), (400, 300));
    }

    #[test]
    fn without_aspect_lock_targets_are_exact() {
        assert_eq!(fit_dimensions(1600, 1200, target(100, 0), false), (100, 1200));
        assert_eq!(fit_dimensions(10, 10, target(50, 20), false), (50, 20));
    }

    #[test]
    fn ico_sizes_never_exceed_source() {
        assert_eq!(ico_sizes(1024, 512), vec![256, 128, 64, 48, 32, 16]);
        assert_eq!(ico_sizes(50, 40), vec![48, 32, 16]);
        assert_eq!(ico_sizes(10, 8), vec![10]);
    }

    #[test]
    fn transparency_becomes_white() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0])));
        let flat = flatten_onto_white(&img);
        assert!(!flat.color().has_alpha());
        assert_eq!(flat.to_rgb8().get_pixel(0, 0).0, [255, 255, 255]);

        let opaque = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([10, 20, 30, 255])));
        assert_eq!(flatten_onto_white(&opaque).to_rgb8().get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn every_format_encodes() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(20, 20, Rgba([200, 10, 10, 128])));
        for format in ImageFormat::ALL {
            let bytes = encode(&img, format, 80).unwrap_or_else(|e| panic!("{format}: {e}"));
            let back = image::load_from_memory(&bytes).unwrap_or_else(|e| panic!("{format}: {e}"));
            assert!(back.width() > 0, "{format}");
        }
    }

    #[test]
    fn transcode_resizes() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(300, 150, Rgba([1, 2, 3, 255])));
        let png = encode_png(&img).unwrap();
        let opts = ImageOptions::new(ImageFormat::Png).resize(100, 0);
        let out = image::load_from_memory(&transcode(&png, &opts).unwrap()).unwrap();
        assert_eq!(out.dimensions(), (100, 50));
    }

    #[test]
    fn out_of_range_quality_is_clamped_at_encode_time() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_fn(64, 64, |x, y| {
            image::Rgb([(x * 4) as u8, (y * 4) as u8, 90])
        }));
        let png = encode_png(&img).unwrap();
        let raw = |quality: u8| ImageOptions {
            quality,
            ..ImageOptions::new(ImageFormat::Jpeg)
        };

        assert_eq!(transcode(&png, &raw(255)).unwrap(), transcode(&png, &raw(100)).unwrap());
        assert_eq!(transcode(&png, &raw(0)).unwrap(), transcode(&png, &raw(1)).unwrap());
    }
}
