//! Configuration types for PDF-to-text conversion.
//!
//! All conversion behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Collaborators (PDF backend,
//! transcription transport, progress callback, cancel signal) are injected
//! here too, so tests and embedding applications swap them without touching
//! the pipeline.

use crate::cancel::CancelSignal;
use crate::error::Pdf2TextError;
use crate::pipeline::backoff::RetryPolicy;
use crate::pipeline::pdf::PdfBackend;
use crate::pipeline::render::DEFAULT_RENDER_SCALE;
use crate::pipeline::sufficiency::{DEFAULT_MIN_PAGE_CHARS, DEFAULT_THRESHOLD};
use crate::pipeline::transport::TranscriptionTransport;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default transcription endpoint (OpenAI Responses API).
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/responses";

/// Default vision model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Configuration for a PDF-to-text conversion.
///
/// # Example
/// ```rust
/// use edgequake_pdf2text::{ExtractionConfig, Granularity};
///
/// let config = ExtractionConfig::builder()
///     .threshold(200)
///     .granularity(Granularity::Document)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Minimum effective characters for the document to count as having a
    /// text layer. Default: 200.
    pub threshold: usize,

    /// Whether the text-layer decision is made once per document or per page.
    /// Default: [`Granularity::Document`].
    pub granularity: Granularity,

    /// Per-page threshold used only with [`Granularity::Page`]. Default: 50.
    pub min_page_chars: usize,

    /// Rasterisation scale over the 72-DPI page size. Range: 0.5–8. Default: 4.0.
    pub render_scale: f32,

    /// Vision model identifier sent with every request.
    pub model: String,

    /// Transcription endpoint URL.
    pub endpoint: String,

    /// Bearer token. Falls back to `OPENAI_API_KEY` when `None`.
    pub api_key: Option<String>,

    /// Custom transcription instruction. If None, uses the built-in default.
    pub instruction: Option<String>,

    /// Retry schedule for the transcription endpoint.
    pub retry: RetryPolicy,

    /// Per-attempt HTTP timeout in seconds. Default: 300.
    pub api_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Explicit pdfium shared library. Falls back to `PDFIUM_LIB_PATH`, then
    /// the working directory, then the system library.
    pub pdfium_library_path: Option<PathBuf>,

    /// Seed for retry jitter. `None` seeds from the OS.
    pub jitter_seed: Option<u64>,

    /// Pre-constructed PDF backend. Takes precedence over pdfium settings.
    pub backend: Option<Arc<dyn PdfBackend>>,

    /// Pre-constructed transport. Takes precedence over endpoint/api_key.
    pub transport: Option<Arc<dyn TranscriptionTransport>>,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,

    /// Cooperative cancellation, checked between pages and during backoff.
    pub cancel: CancelSignal,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            granularity: Granularity::default(),
            min_page_chars: DEFAULT_MIN_PAGE_CHARS,
            render_scale: DEFAULT_RENDER_SCALE,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            instruction: None,
            retry: RetryPolicy::default(),
            api_timeout_secs: 300,
            password: None,
            pdfium_library_path: None,
            jitter_seed: None,
            backend: None,
            transport: None,
            progress_callback: None,
            cancel: CancelSignal::never(),
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("threshold", &self.threshold)
            .field("granularity", &self.granularity)
            .field("min_page_chars", &self.min_page_chars)
            .field("render_scale", &self.render_scale)
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("retry", &self.retry)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("jitter_seed", &self.jitter_seed)
            .field("backend", &self.backend.as_ref().map(|_| "<dyn PdfBackend>"))
            .field(
                "transport",
                &self.transport.as_ref().map(|_| "<dyn TranscriptionTransport>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    /// Configured key, else a non-empty `OPENAI_API_KEY`.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()))
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn threshold(mut self, chars: usize) -> Self {
        self.config.threshold = chars;
        self
    }

    pub fn granularity(mut self, g: Granularity) -> Self {
        self.config.granularity = g;
        self
    }

    pub fn min_page_chars(mut self, chars: usize) -> Self {
        self.config.min_page_chars = chars;
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn instruction(mut self, text: impl Into<String>) -> Self {
        self.config.instruction = Some(text.into());
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.retry.max_attempts = n.max(1);
        self
    }

    pub fn retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry.base_delay = Duration::from_millis(ms);
        self
    }

    pub fn retry_max_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry.max_delay = Duration::from_millis(ms);
        self
    }

    pub fn retry_jitter(mut self, fraction: f64) -> Self {
        self.config.retry.jitter = fraction.clamp(0.0, 0.99);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn jitter_seed(mut self, seed: u64) -> Self {
        self.config.jitter_seed = Some(seed);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn PdfBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn TranscriptionTransport>) -> Self {
        self.config.transport = Some(transport);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancel(mut self, signal: CancelSignal) -> Self {
        self.config.cancel = signal;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, Pdf2TextError> {
        let c = &self.config;
        if !(0.5..=8.0).contains(&c.render_scale) {
            return Err(Pdf2TextError::InvalidConfig(format!(
                "render scale must be 0.5–8.0, got {}",
                c.render_scale
            )));
        }
        if c.model.trim().is_empty() {
            return Err(Pdf2TextError::InvalidConfig("model must not be empty".into()));
        }
        if !(c.endpoint.starts_with("http://") || c.endpoint.starts_with("https://")) {
            return Err(Pdf2TextError::InvalidConfig(format!(
                "endpoint must be an http(s) URL, got '{}'",
                c.endpoint
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(Pdf2TextError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.retry.base_delay > c.retry.max_delay {
            return Err(Pdf2TextError::InvalidConfig(format!(
                "retry base delay ({:?}) exceeds max delay ({:?})",
                c.retry.base_delay, c.retry.max_delay
            )));
        }
        Ok(self.config)
    }
}

/// Unit at which the text-layer decision is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Granularity {
    /// One decision for the whole document from the summed character count. (default)
    #[default]
    Document,
    /// Each page is transcribed when its own count is below `min_page_chars`.
    Page,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ExtractionConfig::default();
        assert_eq!(c.threshold, 200);
        assert_eq!(c.granularity, Granularity::Document);
        assert_eq!(c.render_scale, 4.0);
        assert_eq!(c.api_timeout_secs, 300);
        assert_eq!(c.retry.max_attempts, 6);
        assert_eq!(c.retry.base_delay, Duration::from_secs(1));
        assert_eq!(c.retry.max_delay, Duration::from_secs(60));
        assert_eq!(c.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn builder_rejects_bad_scale() {
        let err = ExtractionConfig::builder().render_scale(12.0).build().unwrap_err();
        assert!(err.to_string().contains("render scale"));
    }

    #[test]
    fn builder_rejects_non_http_endpoint() {
        assert!(ExtractionConfig::builder().endpoint("ftp://x").build().is_err());
    }

    #[test]
    fn builder_clamps_attempts_to_at_least_one() {
        let c = ExtractionConfig::builder().max_attempts(0).build().unwrap();
        assert_eq!(c.retry.max_attempts, 1);
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = ExtractionConfig::builder().api_key("sk-live-123").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-live-123"));
    }

    #[test]
    fn explicit_key_wins_over_env() {
        let c = ExtractionConfig::builder().api_key("explicit").build().unwrap();
        assert_eq!(c.resolve_api_key().as_deref(), Some("explicit"));
    }
}
