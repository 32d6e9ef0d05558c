//! Document driver: extract, classify, then write every page in order.
//!
//! ```text
//! Start ─▶ ExtractingText ─▶ Deciding ─┬─▶ DirectWrite ─────────────┐
//!                                      └─▶ OcrLoop[page = 1..N] ────┴─▶ Done
//! ```
//!
//! Output is a sequence of page blocks:
//!
//! ```text
//! === Page <N> ===
//! <page text>
//! <blank line>
//! ```
//!
//! Each block is produced in full, written with a single `write_all` and
//! flushed before the next page starts, so a crash mid-document leaves every
//! finished page on disk and no page half-written.

use crate::config::ExtractionConfig;
use crate::error::{PageError, Pdf2TextError, TranscriptionError};
use crate::pipeline::input;
use crate::pipeline::pdf::{PdfBackend, PdfiumBackend};
use crate::pipeline::render::PageRasterizer;
use crate::pipeline::sufficiency::{self, SufficiencyVerdict};
use crate::pipeline::transcribe::TranscriptionClient;
use crate::pipeline::transport::{HttpTransport, TranscriptionTransport};
use crate::prompts::DEFAULT_INSTRUCTION;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// How the document's pages were produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExtractionMode {
    /// Every page came from the text layer.
    Direct,
    /// Every page went through transcription.
    Transcribed,
    /// Per-page granularity picked some of each.
    Mixed,
}

/// Summary returned after a conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionReport {
    pub total_pages: usize,
    pub mode: ExtractionMode,
    pub verdict: SufficiencyVerdict,
    /// Pages whose text came back from the transcription endpoint.
    pub transcribed_pages: usize,
    /// Pages that received an error marker instead of text.
    pub failed_pages: usize,
    pub page_errors: Vec<PageError>,
    pub duration_ms: u64,
}

/// Result of [`analyze`]: the classification without any transcription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentAnalysis {
    pub page_count: usize,
    /// Effective characters per page, in page order.
    pub page_chars: Vec<usize>,
    pub verdict: SufficiencyVerdict,
    /// 1-based pages that a conversion with this config would transcribe.
    pub pages_to_transcribe: Vec<usize>,
}

/// The block written for one page: marker line, content, blank line.
pub fn page_block(page_num: usize, content: &str) -> String {
    format!("=== Page {} ===\n{}\n\n", page_num, content)
}

/// Text written in place of a page whose transcription failed.
pub fn failure_marker(err: &TranscriptionError) -> String {
    format!("[transcription failed: {}]", err)
}

/// Classify a PDF without calling the transcription endpoint.
///
/// Does not require an API key.
pub async fn analyze(
    input_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<DocumentAnalysis, Pdf2TextError> {
    let path = input::resolve_input(input_path)?;
    let backend = resolve_backend(config);
    let texts = extract_texts(&backend, &path).await?;
    let (verdict, plan) = classify(&texts, config);

    Ok(DocumentAnalysis {
        page_count: texts.len(),
        page_chars: texts.iter().map(|t| sufficiency::effective_chars(t)).collect(),
        verdict,
        pages_to_transcribe: planned_pages(&plan),
    })
}

/// Convert a PDF and stream page blocks into `writer`, flushing after each page.
pub async fn convert_to_writer<W>(
    input_path: impl AsRef<Path>,
    writer: &mut W,
    config: &ExtractionConfig,
) -> Result<ExtractionReport, Pdf2TextError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let prepared = prepare(input_path.as_ref(), config).await?;
    write_pages(prepared, writer, Path::new("<writer>"), config).await
}

/// Convert a PDF and write the page blocks to `output_path`.
///
/// The file is created only once the document has been read, classified and
/// (if needed) a credential found, so a run that fails during setup leaves an
/// existing file at `output_path` untouched. From then on it is appended to
/// page by page, so partial progress survives an interrupted run.
pub async fn convert_to_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionReport, Pdf2TextError> {
    let out = output_path.as_ref();
    let prepared = prepare(input_path.as_ref(), config).await?;

    let write_err = |source| Pdf2TextError::OutputWriteFailed {
        path: out.to_path_buf(),
        source,
    };

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let mut file = tokio::fs::File::create(out).await.map_err(write_err)?;

    write_pages(prepared, &mut file, out, config).await
}

/// Synchronous wrapper around [`convert_to_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionReport, Pdf2TextError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2TextError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_to_file(input_path, output_path, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Everything the page loop needs, gathered before any output exists.
struct Prepared {
    start: Instant,
    texts: Vec<String>,
    verdict: SufficiencyVerdict,
    plan: Vec<bool>,
    planned: usize,
    client: Option<TranscriptionClient>,
    rasterizer: PageRasterizer,
    rng: StdRng,
}

async fn prepare(input_path: &Path, config: &ExtractionConfig) -> Result<Prepared, Pdf2TextError> {
    let start = Instant::now();
    info!("Starting conversion: {}", input_path.display());

    // ── ExtractingText ───────────────────────────────────────────────────
    let path = input::resolve_input(input_path)?;
    let backend = resolve_backend(config);
    let texts = extract_texts(&backend, &path).await?;
    let total_pages = texts.len();

    // ── Deciding ─────────────────────────────────────────────────────────
    let (verdict, plan) = classify(&texts, config);
    let planned = plan.iter().filter(|&&t| t).count();
    info!(
        "{} pages, {} effective chars (threshold {}) → {} page(s) to transcribe",
        total_pages, verdict.effective_character_count, config.threshold, planned
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_document_classified(total_pages, &verdict, planned);
    }

    let client = match plan.iter().position(|&t| t) {
        Some(first) => Some(build_client(config, first + 1)?),
        None => None,
    };
    let rasterizer = PageRasterizer::new(
        Arc::clone(&backend),
        &path,
        total_pages,
        config.render_scale,
    );
    let rng = match config.jitter_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    Ok(Prepared {
        start,
        texts,
        verdict,
        plan,
        planned,
        client,
        rasterizer,
        rng,
    })
}

async fn write_pages<W>(
    prepared: Prepared,
    writer: &mut W,
    sink: &Path,
    config: &ExtractionConfig,
) -> Result<ExtractionReport, Pdf2TextError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let Prepared {
        start,
        texts,
        verdict,
        plan,
        planned,
        client,
        rasterizer,
        mut rng,
    } = prepared;
    let total_pages = texts.len();

    // ── DirectWrite / OcrLoop ────────────────────────────────────────────
    let mut transcribed_pages = 0;
    let mut page_errors = Vec::new();

    for (idx, text) in texts.iter().enumerate() {
        if config.cancel.is_cancelled() {
            warn!("Cancelled before page {}", idx + 1);
            return Err(Pdf2TextError::Cancelled {
                completed_pages: idx,
                total_pages,
            });
        }

        let page_num = idx + 1;
        let transcribe = plan[idx];
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(page_num, total_pages, transcribe);
        }

        let content = match (&client, transcribe) {
            (Some(client), true) => {
                let data_url = rasterizer.render_as_data_url(idx).await?;
                match client
                    .transcribe_with(&data_url, page_num, &mut rng, &config.cancel)
                    .await
                {
                    Ok(t) => {
                        transcribed_pages += 1;
                        t.text
                    }
                    Err(TranscriptionError::Cancelled { .. }) => {
                        return Err(Pdf2TextError::Cancelled {
                            completed_pages: idx,
                            total_pages,
                        });
                    }
                    Err(e) => {
                        let page_err = PageError::TranscriptionFailed {
                            page: page_num,
                            attempts: e.attempts(),
                            detail: e.to_string(),
                        };
                        warn!("{}", page_err);
                        page_errors.push(page_err);
                        if let Some(ref cb) = config.progress_callback {
                            cb.on_page_error(page_num, total_pages, &e.to_string());
                        }
                        failure_marker(&e)
                    }
                }
            }
            _ => text.clone(),
        };

        write_page(writer, page_num, &content)
            .await
            .map_err(|source| Pdf2TextError::OutputWriteFailed {
                path: sink.to_path_buf(),
                source,
            })?;
        debug!("Page {}: wrote {} bytes", page_num, content.len());

        if let Some(ref cb) = config.progress_callback {
            cb.on_page_complete(page_num, total_pages, content.len());
        }
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(total_pages, page_errors.len());
    }

    let report = ExtractionReport {
        total_pages,
        mode: mode_for(planned, total_pages),
        verdict,
        transcribed_pages,
        failed_pages: page_errors.len(),
        page_errors,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Conversion complete: {} pages ({:?}), {} transcribed, {} failed, {}ms",
        report.total_pages,
        report.mode,
        report.transcribed_pages,
        report.failed_pages,
        report.duration_ms
    );
    Ok(report)
}

/// One page = one write + one flush.
async fn write_page<W>(writer: &mut W, page_num: usize, content: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(page_block(page_num, content).as_bytes()).await?;
    writer.flush().await
}

fn classify(texts: &[String], config: &ExtractionConfig) -> (SufficiencyVerdict, Vec<bool>) {
    let verdict = sufficiency::decide(texts, config.threshold);
    let plan =
        sufficiency::transcription_plan(texts, &verdict, config.granularity, config.min_page_chars);
    (verdict, plan)
}

fn planned_pages(plan: &[bool]) -> Vec<usize> {
    plan.iter()
        .enumerate()
        .filter(|(_, &t)| t)
        .map(|(i, _)| i + 1)
        .collect()
}

fn mode_for(planned: usize, total: usize) -> ExtractionMode {
    match planned {
        0 => ExtractionMode::Direct,
        n if n == total => ExtractionMode::Transcribed,
        _ => ExtractionMode::Mixed,
    }
}

fn resolve_backend(config: &ExtractionConfig) -> Arc<dyn PdfBackend> {
    match config.backend {
        Some(ref backend) => Arc::clone(backend),
        None => Arc::new(PdfiumBackend::new(
            config.pdfium_library_path.clone(),
            config.password.clone(),
        )),
    }
}

/// Open the document, pull every page's text, close it again.
async fn extract_texts(
    backend: &Arc<dyn PdfBackend>,
    path: &Path,
) -> Result<Vec<String>, Pdf2TextError> {
    let backend = Arc::clone(backend);
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || backend.page_texts(&path))
        .await
        .map_err(|e| Pdf2TextError::Internal(format!("Text extraction task panicked: {}", e)))?
}

/// Resolve the transport, from most-specific to least-specific:
/// an injected transport, else an HTTP transport with the configured or
/// environment API key.
fn build_client(
    config: &ExtractionConfig,
    first_page: usize,
) -> Result<TranscriptionClient, Pdf2TextError> {
    let transport: Arc<dyn TranscriptionTransport> = match config.transport {
        Some(ref t) => Arc::clone(t),
        None => {
            let key = config
                .resolve_api_key()
                .ok_or(Pdf2TextError::MissingCredential { first_page })?;
            Arc::new(HttpTransport::new(&config.endpoint, key, config.api_timeout())?)
        }
    };

    let instruction = config.instruction.as_deref().unwrap_or(DEFAULT_INSTRUCTION);
    Ok(TranscriptionClient::new(
        transport,
        config.model.clone(),
        instruction,
        config.retry,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_block_format_is_exact() {
        assert_eq!(page_block(3, "hello"), "=== Page 3 ===\nhello\n\n");
        assert_eq!(page_block(1, ""), "=== Page 1 ===\n\n\n");
    }

    #[test]
    fn failure_marker_carries_status() {
        let e = TranscriptionError::Http {
            status: 401,
            attempts: 1,
            body: "bad key".into(),
        };
        let m = failure_marker(&e);
        assert!(m.starts_with("[transcription failed: "));
        assert!(m.contains("401"));
        assert!(m.contains("bad key"));
    }

    #[test]
    fn mode_selection() {
        assert_eq!(mode_for(0, 5), ExtractionMode::Direct);
        assert_eq!(mode_for(5, 5), ExtractionMode::Transcribed);
        assert_eq!(mode_for(2, 5), ExtractionMode::Mixed);
        assert_eq!(mode_for(0, 0), ExtractionMode::Direct);
    }

    #[test]
    fn planned_pages_are_one_based() {
        assert_eq!(planned_pages(&[false, true, true, false]), vec![2, 3]);
    }
}
