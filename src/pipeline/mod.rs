//! Conversion primitives and the stages they share.
//!
//! Each primitive follows the same shape:
//!
//! ```text
//! io::prepare ──▶ count units ──▶ per unit: checkpoint → work → advance ──▶ AtomicOutput::persist
//! (validate,       (pages,          (cancellation polled          (temp file renamed
//!  fail fast)       images)           before each unit)             into place)
//! ```
//!
//! 1. [`io`]: source and destination checks, atomic output
//! 2. [`text`]: cleanup of extracted and recognised text
//! 3. [`docx`]: DOCX assembly for the PDF → DOCX modes
//! 4. [`image`]: resize, flatten and encode rasters
//! 5. [`pdf_docx`], [`docx_pdf`], [`compress`], [`extract`]: the primitives

pub mod compress;
pub mod docx;
pub mod docx_pdf;
pub mod extract;
pub mod image;
pub mod io;
pub mod pdf_docx;
pub mod text;
