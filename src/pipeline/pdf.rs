//! PDF access: per-page text and raw page bitmaps.
//!
//! [`PdfBackend`] is the only place the crate touches the PDF object model.
//! Each method opens the document, does its work and drops every pdfium
//! handle before returning, on success and on error alike. The pipeline calls
//! it from `spawn_blocking` because pdfium is synchronous and keeps
//! thread-local state.

use crate::error::Pdf2TextError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Renderer-native page pixels: BGRA, 4 bytes per pixel, `stride` bytes per row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBitmap {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub bgra: Vec<u8>,
}

/// Source of page text and page pixels.
pub trait PdfBackend: Send + Sync {
    /// Text of every page, in page order. Empty strings for pages without a text layer.
    fn page_texts(&self, path: &Path) -> Result<Vec<String>, Pdf2TextError>;

    /// Render the 0-based page `index` at `scale` × the 72-DPI page size.
    fn render_page(
        &self,
        path: &Path,
        index: usize,
        scale: f32,
    ) -> Result<RawBitmap, Pdf2TextError>;
}

/// [`PdfBackend`] backed by the pdfium shared library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    library_path: Option<PathBuf>,
    password: Option<String>,
}

impl PdfiumBackend {
    pub fn new(library_path: Option<PathBuf>, password: Option<String>) -> Self {
        Self {
            library_path,
            password,
        }
    }

    /// Bind pdfium: explicit path, then `PDFIUM_LIB_PATH`, then next to the
    /// executable's working directory, then the system library.
    fn bind(&self) -> Result<Pdfium, Pdf2TextError> {
        let explicit = self
            .library_path
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

        let bindings = match explicit {
            Some(dir) if dir.is_dir() => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
            }
            Some(path) => Pdfium::bind_to_library(&path),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| Pdf2TextError::PdfiumBindingFailed(e.to_string()))?;

        Ok(Pdfium::new(bindings))
    }

    /// The document borrows both the bindings and the password, so both
    /// must outlive it.
    fn open<'a>(
        &'a self,
        pdfium: &'a Pdfium,
        path: &Path,
    ) -> Result<PdfDocument<'a>, Pdf2TextError> {
        let password = self.password.as_deref();
        pdfium.load_pdf_from_file(path, password).map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                if password.is_some() {
                    Pdf2TextError::WrongPassword {
                        path: path.to_path_buf(),
                    }
                } else {
                    Pdf2TextError::PasswordRequired {
                        path: path.to_path_buf(),
                    }
                }
            } else {
                Pdf2TextError::CorruptPdf {
                    path: path.to_path_buf(),
                    detail: err_str,
                }
            }
        })
    }
}

impl PdfBackend for PdfiumBackend {
    fn page_texts(&self, path: &Path) -> Result<Vec<String>, Pdf2TextError> {
        let pdfium = self.bind()?;
        let document = self.open(&pdfium, path)?;
        let pages = document.pages();
        info!("PDF loaded: {} pages", pages.len());

        let texts = pages
            .iter()
            .enumerate()
            .map(|(idx, page)| {
                let text = page
                    .text()
                    .map_err(|e| Pdf2TextError::TextExtractionFailed {
                        page: idx + 1,
                        detail: format!("{:?}", e),
                    })?
                    .all();
                debug!("Page {}: {} bytes of text", idx + 1, text.len());
                Ok(text)
            })
            .collect::<Result<Vec<_>, Pdf2TextError>>()?;

        Ok(texts)
    }

    fn render_page(
        &self,
        path: &Path,
        index: usize,
        scale: f32,
    ) -> Result<RawBitmap, Pdf2TextError> {
        let pdfium = self.bind()?;
        let document = self.open(&pdfium, path)?;
        let pages = document.pages();
        let total = pages.len() as usize;

        let page_index = u16::try_from(index)
            .ok()
            .filter(|&i| (i as usize) < total)
            .ok_or(Pdf2TextError::PageOutOfRange { index, total })?;

        let page = pages
            .get(page_index)
            .map_err(|e| Pdf2TextError::RasterisationFailed {
                page: index + 1,
                detail: format!("{:?}", e),
            })?;

        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| Pdf2TextError::RasterisationFailed {
                page: index + 1,
                detail: format!("{:?}", e),
            })?;

        let width = bitmap.width() as u32;
        let height = bitmap.height() as u32;
        let bgra = bitmap.as_raw_bytes();
        let stride = if height == 0 {
            0
        } else {
            bgra.len() / height as usize
        };
        debug!(
            "Rendered page {} → {}x{} px (stride {})",
            index + 1,
            width,
            height,
            stride
        );

        Ok(RawBitmap {
            width,
            height,
            stride,
            bgra,
        })
    }
}
