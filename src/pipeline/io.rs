//! Input checks and atomic output.
//!
//! Every primitive calls [`prepare`] before doing any work: the request is
//! validated, the source must exist, and a destination collision without
//! `overwrite` is rejected here, before any byte is written.
//!
//! Output goes through [`AtomicOutput`]: a temporary file created beside the
//! destination (same directory, so the final rename never crosses a
//! filesystem). Dropping it without calling [`AtomicOutput::persist`]
//! removes the temporary file, so a cancelled or failed job leaves nothing
//! behind that looks complete.

use crate::error::ConvertError;
use crate::request::ConversionRequest;
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Validate `request` and make sure its destination can be written.
///
/// Returns the source size in bytes.
pub(crate) fn prepare(request: &ConversionRequest) -> Result<u64, ConvertError> {
    request.validate()?;
    let size = source_size(&request.source)?;
    check_destination(&request.destination, request.overwrite)?;
    Ok(size)
}

/// Size of an existing regular file, or `NotFound`.
pub(crate) fn source_size(path: &Path) -> Result<u64, ConvertError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(meta.len()),
        Ok(_) => Err(ConvertError::NotFound {
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ConvertError::NotFound {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(ConvertError::io(path, e)),
    }
}

/// Reject an existing destination unless `overwrite`, then create its parent.
pub(crate) fn check_destination(path: &Path, overwrite: bool) -> Result<(), ConvertError> {
    if path.exists() && !overwrite {
        return Err(ConvertError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    Ok(())
}

pub(crate) fn ensure_dir(dir: &Path) -> Result<(), ConvertError> {
    std::fs::create_dir_all(dir).map_err(|e| ConvertError::io(dir, e))
}

/// A temporary file that becomes `destination` on [`persist`](Self::persist).
pub(crate) struct AtomicOutput {
    temp: NamedTempFile,
    destination: PathBuf,
    overwrite: bool,
}

impl AtomicOutput {
    pub(crate) fn new(destination: &Path, overwrite: bool) -> Result<Self, ConvertError> {
        let parent = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let suffix = destination
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let temp = tempfile::Builder::new()
            .prefix(".docshift-")
            .suffix(&suffix)
            .tempfile_in(&parent)
            .map_err(|e| ConvertError::io(&parent, e))?;
        debug!(temp = %temp.path().display(), "opened temporary output");
        Ok(Self {
            temp,
            destination: destination.to_path_buf(),
            overwrite,
        })
    }

    /// Path of the temporary file, for engines that write by path.
    pub(crate) fn path(&self) -> &Path {
        self.temp.path()
    }

    pub(crate) fn file_mut(&mut self) -> &mut File {
        self.temp.as_file_mut()
    }

    /// Move the temporary file into place and return the final size.
    pub(crate) fn persist(self) -> Result<u64, ConvertError> {
        let Self {
            temp,
            destination,
            overwrite,
        } = self;
        let persisted = if overwrite {
            temp.persist(&destination)
        } else {
            temp.persist_noclobber(&destination)
        };
        persisted.map_err(|e| {
            if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                ConvertError::AlreadyExists {
                    path: destination.clone(),
                }
            } else {
                ConvertError::io(&destination, e.error)
            }
        })?;
        let size = std::fs::metadata(&destination)
            .map_err(|e| ConvertError::io(&destination, e))?
            .len();
        debug!(path = %destination.display(), size, "output persisted");
        Ok(size)
    }

    /// Write `bytes` and persist in one step.
    pub(crate) fn write_all(
        destination: &Path,
        overwrite: bool,
        bytes: &[u8],
    ) -> Result<u64, ConvertError> {
        use std::io::Write;
        let mut out = Self::new(destination, overwrite)?;
        out.file_mut()
            .write_all(bytes)
            .map_err(|e| ConvertError::io(destination, e))?;
        out.persist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Conversion;

    #[test]
    fn missing_source_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let req = ConversionRequest::new(
            dir.path().join("nope.pdf"),
            dir.path().join("out.pdf"),
            Conversion::CompressPdf,
        );
        assert!(matches!(prepare(&req), Err(ConvertError::NotFound { .. })));
    }

    #[test]
    fn existing_destination_requires_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.pdf");
        let dst = dir.path().join("out.pdf");
        std::fs::write(&src, b"%PDF").unwrap();
        std::fs::write(&dst, b"old").unwrap();

        let req = ConversionRequest::new(&src, &dst, Conversion::CompressPdf);
        assert!(matches!(prepare(&req), Err(ConvertError::AlreadyExists { .. })));
        assert_eq!(prepare(&req.overwrite(true)).unwrap(), 4);
    }

    #[test]
    fn destination_parent_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("a/b/out.docx");
        check_destination(&dst, false).unwrap();
        assert!(dir.path().join("a/b").is_dir());
    }

    #[test]
    fn dropped_output_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("out.docx");
        {
            let mut out = AtomicOutput::new(&dst, false).unwrap();
            use std::io::Write;
            out.file_mut().write_all(b"partial").unwrap();
        }
        assert!(!dst.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn persist_without_overwrite_never_clobbers() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("out.png");
        let out = AtomicOutput::new(&dst, false).unwrap();
        std::fs::write(&dst, b"raced in").unwrap();

        assert!(matches!(out.persist(), Err(ConvertError::AlreadyExists { .. })));
        assert_eq!(std::fs::read(&dst).unwrap(), b"raced in");
    }

    #[test]
    fn write_all_replaces_with_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("out.bin");
        std::fs::write(&dst, b"old").unwrap();
        assert_eq!(AtomicOutput::write_all(&dst, true, b"fresh").unwrap(), 5);
        assert_eq!(std::fs::read(&dst).unwrap(), b"fresh");
    }
}
