//! # edgequake-pdf2text
//!
//! Convert PDF documents to plain text, using the embedded text layer when
//! there is one and a Vision Language Model when there is not.
//!
//! ## Why this crate?
//!
//! Born-digital PDFs carry their text; extracting it is instant and exact.
//! Scanned PDFs carry only pictures of text. This crate decides, once per
//! document, which kind it is holding: if the whole text layer has fewer
//! than 200 non-whitespace characters every page is rendered, PNG-encoded
//! and sent to a vision endpoint for verbatim transcription. Otherwise the
//! text layer is written as-is and no network call is made.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input       check the file exists and starts with %PDF
//!  ├─ 2. Extract     per-page text layer via pdfium (spawn_blocking)
//!  ├─ 3. Decide      sum of non-whitespace chars vs. threshold
//!  ├─ 4. Render      page → RGBA → PNG → data URL (OCR path only)
//!  ├─ 5. Transcribe  POST to the vision endpoint, retried with jittered backoff
//!  └─ 6. Output      "=== Page N ===" blocks, flushed page by page
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2text::{convert_to_file, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key read from OPENAI_API_KEY, only if some page needs OCR.
//!     let config = ExtractionConfig::default();
//!     let report = convert_to_file("scan.pdf", "scan.txt", &config).await?;
//!     eprintln!("{} pages ({:?}), {} failed",
//!         report.total_pages, report.mode, report.failed_pages);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2text` binary and its terminal dependencies |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdf2text = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assemble;
pub mod cancel;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assemble::{
    analyze, convert_sync, convert_to_file, convert_to_writer, DocumentAnalysis, ExtractionMode,
    ExtractionReport,
};
pub use cancel::{CancelHandle, CancelSignal};
pub use config::{ExtractionConfig, ExtractionConfigBuilder, Granularity};
pub use error::{EncodeError, PageError, Pdf2TextError, TranscriptionError, TransportError};
pub use pipeline::backoff::RetryPolicy;
pub use pipeline::pdf::{PdfBackend, PdfiumBackend, RawBitmap};
pub use pipeline::sufficiency::SufficiencyVerdict;
pub use pipeline::transcribe::{TranscriptionClient, TranscriptionRequest};
pub use pipeline::transport::{HttpTransport, TranscriptionTransport, TransportResponse};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
