//! Pipeline stages for PDF-to-text conversion.
//!
//! Each submodule implements one transformation step so it can be tested on
//! its own and swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ pdf ──▶ sufficiency ──┬──▶ (page text)                         ──▶ output
//!                                  └──▶ render ──▶ png ──▶ transcribe ──▶ output
//!                                                          (backoff, transport)
//! ```
//!
//! 1. [`input`]       — validate the local path and the `%PDF` magic
//! 2. [`pdf`]         — per-page text and raw bitmaps via pdfium
//! 3. [`sufficiency`] — whole-document (or per-page) text-layer decision
//! 4. [`render`]      — BGRA → RGBA, row packing, PNG, data URL
//! 5. [`png`]         — hand-written PNG container with CRC-32 / Adler-32
//! 6. [`transcribe`]  — request/response shapes and the retrying client,
//!    built on [`backoff`] and [`transport`]

pub mod backoff;
pub mod input;
pub mod pdf;
pub mod png;
pub mod render;
pub mod sufficiency;
pub mod transcribe;
pub mod transport;
