//! Page rasterisation: pdfium bitmap → RGBA → PNG → data URL.
//!
//! ## Why a fixed scale, not a pixel cap?
//!
//! Transcription quality tracks glyph size in pixels. A scale of 4× the
//! 72-DPI baseline renders a Letter/A4 page at roughly 300 DPI, enough for
//! footnotes and subscripts, while a single page stays a few MB of PNG.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is synchronous and CPU-bound; rendering on a Tokio worker would
//! stall every other task on that thread for the duration of the render.

use crate::error::Pdf2TextError;
use crate::pipeline::pdf::{PdfBackend, RawBitmap};
use crate::pipeline::png;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Scale applied to the 72-DPI page size (≈ 288 DPI).
pub const DEFAULT_RENDER_SCALE: f32 = 4.0;

const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// One rendered, encoded page. Lives only for that page's transcription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8.
    pub pixels: Vec<u8>,
    /// PNG stream for `pixels`.
    pub png: Vec<u8>,
}

impl RasterImage {
    pub fn to_data_url(&self) -> String {
        to_data_url(&self.png)
    }
}

/// `data:image/png;base64,…` for a PNG stream.
pub fn to_data_url(png: &[u8]) -> String {
    let b64 = STANDARD.encode(png);
    let mut url = String::with_capacity(DATA_URL_PREFIX.len() + b64.len());
    url.push_str(DATA_URL_PREFIX);
    url.push_str(&b64);
    url
}

/// Swap pdfium's BGRA byte order to RGBA in place: R↔B, G and A untouched.
pub fn bgra_to_rgba(buf: &mut [u8]) {
    for px in buf.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
}

/// Drop per-row padding so rows are exactly `width * 4` bytes.
///
/// Buffers that are already tight, or whose stride is smaller than a row
/// (which the encoder will reject), are returned unchanged.
fn pack_rows(bitmap: RawBitmap) -> Vec<u8> {
    let row = bitmap.width as usize * 4;
    if bitmap.stride <= row || bitmap.bgra.len() != bitmap.stride * bitmap.height as usize {
        return bitmap.bgra;
    }
    let mut packed = Vec::with_capacity(row * bitmap.height as usize);
    for line in bitmap.bgra.chunks_exact(bitmap.stride) {
        packed.extend_from_slice(&line[..row]);
    }
    packed
}

/// Turn a renderer bitmap into a [`RasterImage`] for the 1-based `page_num`.
pub fn rasterise_bitmap(bitmap: RawBitmap, page_num: usize) -> Result<RasterImage, Pdf2TextError> {
    let (width, height) = (bitmap.width, bitmap.height);
    let mut pixels = pack_rows(bitmap);
    bgra_to_rgba(&mut pixels);

    let png = png::encode(&pixels, width, height).map_err(|source| Pdf2TextError::Encoding {
        page: page_num,
        source,
    })?;

    Ok(RasterImage {
        width,
        height,
        pixels,
        png,
    })
}

/// Renders pages of one document on demand.
///
/// Holds only the path and page count; each [`PageRasterizer::render`] call
/// opens and closes its own pdfium handle.
pub struct PageRasterizer {
    backend: Arc<dyn PdfBackend>,
    path: PathBuf,
    page_count: usize,
    scale: f32,
}

impl PageRasterizer {
    pub fn new(backend: Arc<dyn PdfBackend>, path: &Path, page_count: usize, scale: f32) -> Self {
        Self {
            backend,
            path: path.to_path_buf(),
            page_count,
            scale,
        }
    }

    /// Render the 0-based page `index`. Out-of-range indices are an error, never clamped.
    pub async fn render(&self, index: usize) -> Result<RasterImage, Pdf2TextError> {
        if index >= self.page_count {
            return Err(Pdf2TextError::PageOutOfRange {
                index,
                total: self.page_count,
            });
        }

        let backend = Arc::clone(&self.backend);
        let path = self.path.clone();
        let scale = self.scale;

        let bitmap = tokio::task::spawn_blocking(move || backend.render_page(&path, index, scale))
            .await
            .map_err(|e| Pdf2TextError::Internal(format!("Render task panicked: {}", e)))??;

        let image = rasterise_bitmap(bitmap, index + 1)?;
        debug!(
            "Page {}: {}x{} px → {} bytes PNG",
            index + 1,
            image.width,
            image.height,
            image.png.len()
        );
        Ok(image)
    }

    /// Render the 0-based page `index` straight to a PNG data URL.
    pub async fn render_as_data_url(&self, index: usize) -> Result<String, Pdf2TextError> {
        Ok(self.render(index).await?.to_data_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SolidBackend {
        width: u32,
        height: u32,
        stride: usize,
    }

    impl PdfBackend for SolidBackend {
        fn page_texts(&self, _path: &Path) -> Result<Vec<String>, Pdf2TextError> {
            Ok(vec![String::new(); 2])
        }

        fn render_page(
            &self,
            _path: &Path,
            _index: usize,
            _scale: f32,
        ) -> Result<RawBitmap, Pdf2TextError> {
            // B=10 G=20 R=30 A=255, padding bytes = 0xEE
            let mut bgra = Vec::new();
            for _ in 0..self.height {
                for _ in 0..self.width {
                    bgra.extend_from_slice(&[10, 20, 30, 255]);
                }
                bgra.resize(bgra.len() + self.stride - self.width as usize * 4, 0xEE);
            }
            Ok(RawBitmap {
                width: self.width,
                height: self.height,
                stride: self.stride,
                bgra,
            })
        }
    }

    fn rasterizer(width: u32, height: u32, stride: usize) -> PageRasterizer {
        PageRasterizer::new(
            Arc::new(SolidBackend { width, height, stride }),
            Path::new("doc.pdf"),
            2,
            DEFAULT_RENDER_SCALE,
        )
    }

    #[test]
    fn swap_exchanges_red_and_blue_only() {
        let mut buf = vec![1, 2, 3, 4, 5, 6, 7, 8];
        bgra_to_rgba(&mut buf);
        assert_eq!(buf, vec![3, 2, 1, 4, 7, 6, 5, 8]);
    }

    #[test]
    fn swap_twice_is_identity() {
        let orig: Vec<u8> = (0..=255).collect();
        let mut buf = orig.clone();
        bgra_to_rgba(&mut buf);
        bgra_to_rgba(&mut buf);
        assert_eq!(buf, orig);
    }

    #[test]
    fn data_url_prefix() {
        let url = to_data_url(&[0x89, b'P', b'N', b'G']);
        assert_eq!(url, "data:image/png;base64,iVBORw==");
    }

    #[tokio::test]
    async fn render_produces_rgba_png() {
        let img = rasterizer(3, 2, 12).render(0).await.unwrap();
        assert_eq!((img.width, img.height), (3, 2));
        assert_eq!(&img.pixels[..4], &[30, 20, 10, 255]);
        assert_eq!(&img.png[..8], &png::SIGNATURE);
    }

    #[tokio::test]
    async fn render_strips_row_padding() {
        let img = rasterizer(3, 2, 16).render(1).await.unwrap();
        assert_eq!(img.pixels.len(), 3 * 2 * 4);
        assert!(img.pixels.chunks_exact(4).all(|p| p == [30, 20, 10, 255]));
    }

    #[tokio::test]
    async fn out_of_range_index_is_rejected() {
        let err = rasterizer(1, 1, 4).render(2).await.unwrap_err();
        assert!(matches!(err, Pdf2TextError::PageOutOfRange { index: 2, total: 2 }));
    }

    #[tokio::test]
    async fn data_url_round_trips_to_png() {
        let url = rasterizer(2, 2, 8).render_as_data_url(0).await.unwrap();
        let b64 = url.strip_prefix("data:image/png;base64,").unwrap();
        let bytes = STANDARD.decode(b64).unwrap();
        assert_eq!(&bytes[..8], &png::SIGNATURE);
    }

    #[test]
    fn short_buffer_surfaces_encoding_error() {
        let bitmap = RawBitmap {
            width: 4,
            height: 4,
            stride: 16,
            bgra: vec![0; 60],
        };
        let err = rasterise_bitmap(bitmap, 7).unwrap_err();
        assert!(matches!(err, Pdf2TextError::Encoding { page: 7, .. }));
    }
}
