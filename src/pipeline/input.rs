//! Input validation: make sure the path names a readable PDF before pdfium
//! ever sees it.
//!
//! pdfium's own error for a non-PDF is an opaque format error; checking the
//! `%PDF` magic up front turns that into a message that names the file and
//! shows what it actually starts with.

use crate::error::Pdf2TextError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Validate that `path` exists, is readable and starts with `%PDF`.
pub fn resolve_input(path: impl AsRef<Path>) -> Result<PathBuf, Pdf2TextError> {
    let path = path.as_ref().to_path_buf();

    if !path.is_file() {
        return Err(Pdf2TextError::FileNotFound { path });
    }

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2TextError::PermissionDenied { path });
        }
        Err(_) => return Err(Pdf2TextError::FileNotFound { path }),
    };

    let mut magic = [0u8; 4];
    let read = match read_prefix(&mut file, &mut magic) {
        Ok(n) => n,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2TextError::PermissionDenied { path });
        }
        Err(source) => return Err(Pdf2TextError::InputReadFailed { path, source }),
    };
    if read < magic.len() || &magic != PDF_MAGIC {
        return Err(Pdf2TextError::NotAPdf { path, magic });
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

/// Read up to `buf.len()` bytes, tolerating short files.
fn read_prefix(file: &mut std::fs::File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
