//! Error types for the edgequake-pdf2text library.
//!
//! Two tiers of failure mirror the two tiers of work:
//!
//! * [`Pdf2TextError`] — **Fatal**: the document cannot be converted at all
//!   (bad input file, pdfium cannot open it, credential missing when a page
//!   needs transcription, an encoder invariant broke). Returned as
//!   `Err(Pdf2TextError)` from the top-level `convert*` functions.
//!
//! * [`PageError`] — **Non-fatal**: transcription of one page failed after the
//!   retry budget was spent. The page slot in the output receives an error
//!   marker and the loop moves on to the next page.
//!
//! Component errors ([`EncodeError`], [`TranscriptionError`],
//! [`TransportError`]) live here too so the pipeline stages share one
//! vocabulary.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdf2text library.
#[derive(Debug, Error)]
pub enum Pdf2TextError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file could be opened but reading its header failed.
    #[error("Failed to read '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error(
        "PDF '{path}' is encrypted and requires a password.\n\
         Provide it with --password <PASSWORD>."
    )]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// Text extraction failed for a specific page.
    #[error("Text extraction failed for page {page}: {detail}")]
    TextExtractionFailed { page: usize, detail: String },

    /// A 0-based page index outside `0..total` was requested.
    #[error("Page index {index} is out of range (document has {total} pages)")]
    PageOutOfRange { index: usize, total: usize },

    /// pdfium returned an error while rendering a page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The page bitmap could not be turned into a PNG.
    #[error("Image encoding failed for page {page}: {source}")]
    Encoding {
        page: usize,
        #[source]
        source: EncodeError,
    },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or pass --pdfium-lib) to point at an existing copy,\n\
or place the library next to the executable.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Transcription errors ──────────────────────────────────────────────
    /// A page needs transcription but no API credential is available.
    #[error(
        "Page {first_page} has no usable text layer and must be transcribed, \
but no API key is configured.\nSet OPENAI_API_KEY or pass --api-key."
    )]
    MissingCredential { first_page: usize },

    /// The HTTP client could not be constructed.
    #[error("Failed to initialise HTTP client: {0}")]
    HttpClient(String),

    /// The caller requested cancellation; `completed_pages` were fully written.
    #[error("Conversion cancelled after {completed_pages} of {total_pages} pages")]
    Cancelled {
        completed_pages: usize,
        total_pages: usize,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or append to the output text file.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Transcription failed after the retry budget, or with a non-retryable status.
    #[error("Page {page}: transcription failed after {attempts} attempt(s): {detail}")]
    TranscriptionFailed {
        page: usize,
        attempts: u32,
        detail: String,
    },
}

/// Failures of the PNG encoder. All are deterministic: retrying reproduces them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("image dimensions must be non-zero (got {width}x{height})")]
    ZeroDimension { width: u32, height: u32 },

    #[error("image {width}x{height} is too large to encode")]
    TooLarge { width: u32, height: u32 },

    #[error("pixel buffer is {actual} bytes but {width}x{height} RGBA needs {expected}")]
    LengthMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("deflate stream failed: {0}")]
    Compression(String),
}

/// A single attempt could not reach the endpoint.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),
}

/// Terminal outcome of one page's transcription call.
#[derive(Debug, Clone, Error)]
pub enum TranscriptionError {
    /// The endpoint answered with a non-success status.
    #[error("HTTP {status} after {attempts} attempt(s): {body}")]
    Http {
        status: u16,
        attempts: u32,
        /// Response body, truncated to 500 characters.
        body: String,
    },

    /// Every attempt (or the last one) failed below the HTTP layer.
    #[error("{source} (after {attempts} attempt(s))")]
    Transport {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// 2xx response whose body is not JSON.
    #[error("response is not valid JSON ({detail}): {body}")]
    InvalidResponse { detail: String, body: String },

    /// Cancellation arrived while waiting to retry.
    #[error("cancelled before attempt {attempt}")]
    Cancelled { attempt: u32 },
}

impl TranscriptionError {
    /// Number of HTTP attempts that were made before this error was produced.
    pub fn attempts(&self) -> u32 {
        match self {
            TranscriptionError::Http { attempts, .. }
            | TranscriptionError::Transport { attempts, .. } => *attempts,
            TranscriptionError::InvalidResponse { .. } => 1,
            TranscriptionError::Cancelled { attempt } => attempt.saturating_sub(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_display_carries_status_and_body() {
        let e = TranscriptionError::Http {
            status: 503,
            attempts: 6,
            body: "upstream overloaded".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("503"), "got: {msg}");
        assert!(msg.contains("6 attempt"), "got: {msg}");
        assert!(msg.contains("upstream overloaded"), "got: {msg}");
    }

    #[test]
    fn transport_timeout_display() {
        let e = TranscriptionError::Transport {
            attempts: 6,
            source: TransportError::Timeout(Duration::from_secs(300)),
        };
        assert!(e.to_string().contains("300s"));
    }

    #[test]
    fn missing_credential_mentions_page_and_env_var() {
        let e = Pdf2TextError::MissingCredential { first_page: 4 };
        let msg = e.to_string();
        assert!(msg.contains("Page 4"));
        assert!(msg.contains("OPENAI_API_KEY"));
    }

    #[test]
    fn page_out_of_range_display() {
        let e = Pdf2TextError::PageOutOfRange { index: 7, total: 3 };
        assert!(e.to_string().contains("index 7"));
        assert!(e.to_string().contains("3 pages"));
    }

    #[test]
    fn encode_length_mismatch_display() {
        let e = EncodeError::LengthMismatch {
            width: 2,
            height: 2,
            expected: 16,
            actual: 15,
        };
        assert!(e.to_string().contains("15 bytes"));
        assert!(e.to_string().contains("needs 16"));
    }

    #[test]
    fn cancelled_attempt_count() {
        assert_eq!(TranscriptionError::Cancelled { attempt: 3 }.attempts(), 2);
    }
}
