//! CLI binary for docshift.
//!
//! A thin shim over the library crate: each subcommand maps its flags to a
//! request, runs it on the worker pool, drives a progress bar from the job's
//! event stream and prints the result.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use docshift::worker::{self, JobHandle};
use docshift::{
    convert, BatchOptions, BatchReport, BatchState, Conversion, ConversionRequest, DocxCompression,
    Engines, ImageFormat, ImageOptions, OcrOptions, OperationResult, Outcome, PageSelection,
    PdfToDocxMode, RasterOptions,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

const AFTER_HELP: &str = r#"EXAMPLES:
  # Editable DOCX from a PDF's text layer, pages 2 to 5
  docshift pdf2docx report.pdf --start 2 --end 5

  # Pixel-exact DOCX, one picture per page
  docshift pdf2docx brochure.pdf --mode raster --dpi 150 -o brochure.docx

  # Scanned PDF through OCR (needs the `tesseract` feature)
  docshift pdf2docx scan.pdf --mode ocr --lang eng

  # DOCX to PDF through LibreOffice
  docshift docx2pdf letter.docx

  # Shrink a DOCX by recompressing its images
  docshift compress-docx deck.docx --quality 60 --max-width 1280

  # Convert and resize an image
  docshift image photo.png --format jpg --width 800

  # Convert every PDF and DOCX in a folder, images to WebP
  docshift batch ./inbox --out-dir ./converted --image-format webp

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Directory or file of an existing libpdfium
  DOCSHIFT_SOFFICE  LibreOffice binary (default: soffice)
  RUST_LOG          Override the log filter

EXIT STATUS:
  0 success (including files skipped with errors), 1 failure, 130 cancelled
"#;

/// Convert between PDF, DOCX and image formats.
#[derive(Parser, Debug)]
#[command(
    name = "docshift",
    version,
    about = "Convert between PDF, DOCX and image formats",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Replace destination files that already exist.
    #[arg(long, global = true, env = "DOCSHIFT_OVERWRITE")]
    overwrite: bool,

    /// Print the result as JSON on stdout.
    #[arg(long, global = true, env = "DOCSHIFT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "DOCSHIFT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCSHIFT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCSHIFT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// PDF → DOCX (text, raster or OCR).
    Pdf2docx {
        input: PathBuf,
        /// Output file. Default: input with a .docx extension.
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        mode: ModeArgs,
    },

    /// DOCX → PDF through LibreOffice.
    Docx2pdf {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Recompress a PDF's content streams.
    CompressPdf {
        input: PathBuf,
        /// Output file. Default: <input>_compressed.pdf.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Recompress the images embedded in a DOCX.
    CompressDocx {
        input: PathBuf,
        /// Output file. Default: <input>_compressed.docx.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// JPEG quality (1–95).
        #[arg(long, env = "DOCSHIFT_DOCX_QUALITY", default_value_t = 75)]
        quality: u32,
        /// Shrink images wider than this (pixels).
        #[arg(long)]
        max_width: Option<u32>,
        /// Shrink images taller than this (pixels).
        #[arg(long)]
        max_height: Option<u32>,
    },

    /// Convert one image to another format.
    Image {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        image: ImageArgs,
    },

    /// Print dimensions, format and size of an image.
    ImageInfo { input: PathBuf },

    /// Write every image embedded in a PDF or DOCX to a directory.
    ExtractImages {
        input: PathBuf,
        #[arg(long)]
        out_dir: PathBuf,
        /// Format for images pulled out of a PDF (DOCX media is copied as is).
        #[arg(long, default_value = "png")]
        format: ImageFormat,
    },

    /// Convert many files. Directories are scanned one level deep.
    Batch {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long)]
        out_dir: PathBuf,
        /// Leave PDF files alone.
        #[arg(long)]
        no_pdf: bool,
        /// Leave DOCX files alone.
        #[arg(long)]
        no_docx: bool,
        /// Convert image files to this format; images are skipped without it.
        #[arg(long)]
        image_format: Option<ImageFormat>,
        /// Image quality (1–100), used with --image-format.
        #[arg(long, default_value_t = 95)]
        image_quality: u32,
        #[command(flatten)]
        mode: ModeArgs,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default)]
enum ModeArg {
    #[default]
    Text,
    Raster,
    Ocr,
}

#[derive(Args, Debug)]
struct ModeArgs {
    /// Fidelity mode.
    #[arg(long, value_enum, env = "DOCSHIFT_MODE", default_value = "text")]
    mode: ModeArg,
    /// First page, 1-based (text mode).
    #[arg(long)]
    start: Option<usize>,
    /// Last page, inclusive (text mode).
    #[arg(long)]
    end: Option<usize>,
    /// Render DPI (72–600) for raster and OCR modes.
    #[arg(long, env = "DOCSHIFT_DPI",
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: Option<u32>,
    /// OCR language, e.g. eng or spa+eng.
    #[arg(long, env = "DOCSHIFT_OCR_LANG")]
    lang: Option<String>,
}

impl ModeArgs {
    fn to_mode(&self) -> Result<PdfToDocxMode> {
        Ok(match self.mode {
            ModeArg::Text => PdfToDocxMode::Text {
                pages: PageSelection::from_bounds(self.start, self.end)?,
            },
            ModeArg::Raster => {
                let opts = RasterOptions::default();
                PdfToDocxMode::Raster(match self.dpi {
                    Some(d) => opts.dpi(d),
                    None => opts,
                })
            }
            ModeArg::Ocr => {
                let mut opts = OcrOptions::default();
                if let Some(d) = self.dpi {
                    opts = opts.dpi(d);
                }
                if let Some(ref l) = self.lang {
                    opts = opts.lang(l.clone());
                }
                PdfToDocxMode::Ocr(opts)
            }
        })
    }
}

#[derive(Args, Debug)]
struct ImageArgs {
    /// Target format: png, jpg, webp, bmp, gif, tiff, ico.
    #[arg(long)]
    format: ImageFormat,
    /// Quality (1–100); only JPEG honours it.
    #[arg(long, default_value_t = 95)]
    quality: u32,
    /// Target width in pixels.
    #[arg(long)]
    width: Option<u32>,
    /// Target height in pixels.
    #[arg(long)]
    height: Option<u32>,
    /// Stretch to exactly --width x --height.
    #[arg(long)]
    no_keep_aspect: bool,
}

impl ImageArgs {
    fn to_options(&self) -> ImageOptions {
        ImageOptions::new(self.format)
            .quality(self.quality)
            .resize(self.width.unwrap_or(0), self.height.unwrap_or(0))
            .keep_aspect(!self.no_keep_aspect)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    let filter = if cli.verbose { "debug" } else { filter };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let ui = Ui {
        json: cli.json,
        quiet: cli.quiet,
        progress: show_progress,
    };
    let overwrite = cli.overwrite;

    match cli.command {
        Command::Pdf2docx {
            input,
            output,
            mode,
        } => {
            let conversion = Conversion::PdfToDocx(mode.to_mode()?);
            run_request(&ui, Engines::detect(), request(input, output, conversion, overwrite))
                .await
        }
        Command::Docx2pdf { input, output } => {
            run_request(
                &ui,
                Engines::detect(),
                request(input, output, Conversion::DocxToPdf, overwrite),
            )
            .await
        }
        Command::CompressPdf { input, output } => {
            let output = output.unwrap_or_else(|| suffixed(&input, "compressed", "pdf"));
            let (src, dst) = (input, output);
            let job = worker::spawn_job(move |c| {
                OperationResult::settle(convert::compress_pdf(&src, &dst, overwrite, c))
            });
            let result = drive(&ui, job).await?;
            report(&ui, &result)
        }
        Command::CompressDocx {
            input,
            output,
            quality,
            max_width,
            max_height,
        } => {
            let output = output.unwrap_or_else(|| suffixed(&input, "compressed", "docx"));
            let mut opts = DocxCompression::default().quality(quality);
            if let Some(w) = max_width {
                opts = opts.max_width(w);
            }
            if let Some(h) = max_height {
                opts = opts.max_height(h);
            }
            let (src, dst) = (input, output);
            let job = worker::spawn_job(move |c| {
                OperationResult::settle(convert::compress_docx(&src, &dst, opts, overwrite, c))
            });
            let result = drive(&ui, job).await?;
            report(&ui, &result)
        }
        Command::Image {
            input,
            output,
            image,
        } => {
            let opts = image.to_options();
            let output = output.unwrap_or_else(|| image_output(&input, opts.format));
            let (src, dst) = (input, output);
            let job = worker::spawn_job(move |c| {
                OperationResult::settle(convert::convert_image(&src, &dst, opts, overwrite, c))
            });
            let result = drive(&ui, job).await?;
            report(&ui, &result)
        }
        Command::ImageInfo { input } => {
            let info = convert::image_info(&input)
                .with_context(|| format!("Failed to read image {}", input.display()))?;
            if ui.json {
                print_json(&info)?;
            } else {
                println!("File:    {}", input.display());
                println!("Size:    {} x {}", info.width, info.height);
                println!("Format:  {}", info.format);
                println!("Colour:  {}", info.color);
                println!("Bytes:   {} ({})", info.file_size, info.file_size_human);
            }
            Ok(())
        }
        Command::ExtractImages {
            input,
            out_dir,
            format,
        } => {
            let is_docx = input
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case("docx"));
            let job = if is_docx {
                worker::spawn_job(move |c| {
                    OperationResult::settle(convert::extract_docx_images(
                        &input, &out_dir, overwrite, c,
                    ))
                })
            } else {
                let engines = Engines::detect();
                worker::spawn_job(move |c| {
                    OperationResult::settle(convert::extract_pdf_images(
                        &engines, &input, &out_dir, format, overwrite, c,
                    ))
                })
            };
            let result = drive(&ui, job).await?;
            report(&ui, &result)
        }
        Command::Batch {
            inputs,
            out_dir,
            no_pdf,
            no_docx,
            image_format,
            image_quality,
            mode,
        } => {
            let files = collect_files(&inputs)?;
            let options = BatchOptions {
                pdf_to_docx: !no_pdf,
                docx_to_pdf: !no_docx,
                image: image_format.map(|f| ImageOptions::new(f).quality(image_quality)),
                pdf_mode: mode.to_mode()?,
                overwrite,
            };
            let job = worker::spawn_batch(Engines::detect(), files, out_dir, options);
            let report = drive(&ui, job).await?;
            report_batch(&ui, &report)
        }
    }
}

// ── Requests and paths ───────────────────────────────────────────────────────

fn request(
    input: PathBuf,
    output: Option<PathBuf>,
    conversion: Conversion,
    overwrite: bool,
) -> ConversionRequest {
    let request = match output {
        Some(out) => ConversionRequest::new(input, out, conversion),
        None => ConversionRequest::beside_source(input, conversion),
    };
    request.overwrite(overwrite)
}

/// `dir/report.pdf` → `dir/report_compressed.pdf`.
fn suffixed(input: &Path, suffix: &str, ext: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{stem}_{suffix}.{ext}"))
}

/// Same directory, new extension; suffixed when that would overwrite the input.
fn image_output(input: &Path, format: ImageFormat) -> PathBuf {
    let out = input.with_extension(format.extension());
    if out == input {
        suffixed(input, "converted", format.extension())
    } else {
        out
    }
}

/// Expand directories (one level, sorted by name) and keep plain files.
fn collect_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
            {
                let entry =
                    entry.with_context(|| format!("Failed to read directory {}", input.display()))?;
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(input.clone());
        }
    }
    if files.is_empty() {
        bail!("No input files found");
    }
    Ok(files)
}

// ── Running jobs ─────────────────────────────────────────────────────────────

struct Ui {
    json: bool,
    quiet: bool,
    progress: bool,
}

async fn run_request(ui: &Ui, engines: Engines, request: ConversionRequest) -> Result<()> {
    let job = worker::spawn(engines, request);
    let result = drive(ui, job).await?;
    report(ui, &result)
}

fn new_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len}  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    bar.set_prefix("Working");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Feed the progress bar until the job ends; Ctrl-C cancels it.
async fn drive<T: Send + 'static>(ui: &Ui, mut job: JobHandle<T>) -> Result<T> {
    let bar = ui.progress.then(new_bar);
    let token = job.token();
    let mut cancelled = false;

    if let Some(mut events) = job.take_progress() {
        loop {
            tokio::select! {
                ev = events.next() => match ev {
                    Some(ev) => {
                        if let Some(ref bar) = bar {
                            bar.set_length(ev.total as u64);
                            bar.set_position(ev.current as u64);
                            bar.set_message(ev.message);
                        }
                    }
                    None => break,
                },
                _ = tokio::signal::ctrl_c(), if !cancelled => {
                    cancelled = true;
                    token.cancel();
                    if let Some(ref bar) = bar {
                        bar.set_prefix("Cancelling");
                    }
                }
            }
        }
    }

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    Ok(job.wait().await?)
}

// ── Reporting ────────────────────────────────────────────────────────────────

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialise output")?
    );
    Ok(())
}

fn report(ui: &Ui, result: &OperationResult) -> Result<()> {
    if ui.json {
        print_json(result)?;
    } else if !ui.quiet {
        let mark = match result.outcome {
            Outcome::Succeeded => green("✔"),
            Outcome::SucceededWithErrors => cyan("⚠"),
            Outcome::Cancelled | Outcome::Failed => red("✘"),
        };
        for out in &result.outputs {
            eprintln!("{mark}  →  {}", bold(&out.display().to_string()));
        }
        if let Some(sizes) = result.sizes {
            eprintln!(
                "   {} → {}  {}",
                dim(&sizes.original_size.to_string()),
                dim(&sizes.new_size.to_string()),
                bold(&format!("-{:.1}%", sizes.reduction_percent)),
            );
        }
        if let Some(n) = result.images_processed {
            eprintln!("   {} images recompressed, {} kept", n, result.skipped);
        }
        for err in &result.errors {
            eprintln!("  {} {}  {}", red("✗"), err.unit, red(&err.message));
        }
    }

    match result.outcome {
        Outcome::Succeeded | Outcome::SucceededWithErrors => Ok(()),
        Outcome::Cancelled => {
            if !ui.quiet {
                eprintln!("{} Cancelled", red("✘"));
            }
            std::process::exit(130)
        }
        Outcome::Failed => bail!(result
            .message
            .clone()
            .unwrap_or_else(|| "Conversion failed".to_string())),
    }
}

fn report_batch(ui: &Ui, report: &BatchReport) -> Result<()> {
    if ui.json {
        print_json(report)?;
    } else if !ui.quiet {
        for f in &report.failures {
            eprintln!(
                "  {} {}  {}",
                red("✗"),
                f.file.display(),
                red(&f.message)
            );
        }
        eprintln!(
            "{}  {}/{} files converted  ({} failed)",
            if report.failures.is_empty() {
                green("✔")
            } else {
                cyan("⚠")
            },
            bold(&report.succeeded.to_string()),
            report.total,
            report.failures.len(),
        );
    }

    match report.state {
        BatchState::Completed | BatchState::Idle | BatchState::Running => Ok(()),
        BatchState::Cancelled => {
            if !ui.quiet {
                eprintln!(
                    "{} Cancelled after {}/{} files",
                    red("✘"),
                    report.done,
                    report.total
                );
            }
            std::process::exit(130)
        }
        BatchState::Failed => bail!(report
            .message
            .clone()
            .unwrap_or_else(|| "Batch failed".to_string())),
    }
}
