//! Progress-callback trait for per-page conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to observe
//! the pipeline as it classifies the document and works through its pages.
//! Pages are processed strictly in order, so events for page `n` always
//! complete before events for page `n + 1` begin.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2text::{ConversionProgressCallback, ExtractionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} done ({} bytes)", page_num, total_pages, text_len);
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::sufficiency::SufficiencyVerdict;
use std::sync::Arc;

/// Called by the conversion pipeline as it processes each page.
///
/// All methods default to no-ops so implementors override only what they need.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once after text extraction, with the document verdict and how
    /// many pages will go through transcription.
    fn on_document_classified(
        &self,
        total_pages: usize,
        verdict: &SufficiencyVerdict,
        pages_to_transcribe: usize,
    ) {
        let _ = (total_pages, verdict, pages_to_transcribe);
    }

    /// Called before a page is written. `transcribing` is true on the OCR path.
    fn on_page_start(&self, page_num: usize, total_pages: usize, transcribing: bool) {
        let _ = (page_num, total_pages, transcribing);
    }

    /// Called after a page's block has been written and flushed.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
        let _ = (page_num, total_pages, text_len);
    }

    /// Called when a page's transcription failed terminally. The page still
    /// receives an error marker in the output.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after the last page.
    fn on_conversion_complete(&self, total_pages: usize, failed_pages: usize) {
        let _ = (total_pages, failed_pages);
    }
}

/// No-op implementation; the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
