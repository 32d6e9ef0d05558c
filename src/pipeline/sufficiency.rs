//! Text-layer sufficiency: does the PDF carry enough extractable text, or
//! must its pages be transcribed from images?
//!
//! The unit of measure is the *effective character*: any `char` for which
//! [`char::is_whitespace`] is false. Scanned PDFs typically expose an empty
//! text layer or a handful of stray glyphs, so a small absolute threshold
//! separates the two populations well.

use crate::config::Granularity;
use serde::{Deserialize, Serialize};

/// Default whole-document threshold of effective characters.
pub const DEFAULT_THRESHOLD: usize = 200;

/// Default per-page threshold used by [`Granularity::Page`].
pub const DEFAULT_MIN_PAGE_CHARS: usize = 50;

/// Outcome of [`decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SufficiencyVerdict {
    /// `effective_character_count < threshold`.
    pub requires_transcription: bool,
    /// Sum over all pages of non-whitespace characters.
    pub effective_character_count: usize,
}

/// Non-whitespace character count of one page.
pub fn effective_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// Classify the whole document from its page texts.
///
/// A document with zero pages has count 0 and therefore requires
/// transcription (there is nothing to extract either way).
pub fn decide<S: AsRef<str>>(page_texts: &[S], threshold: usize) -> SufficiencyVerdict {
    let effective_character_count = page_texts
        .iter()
        .map(|t| effective_chars(t.as_ref()))
        .sum::<usize>();

    SufficiencyVerdict {
        requires_transcription: effective_character_count < threshold,
        effective_character_count,
    }
}

/// Per-page transcription plan derived from the chosen granularity.
///
/// With [`Granularity::Document`] every entry equals
/// `verdict.requires_transcription`; with [`Granularity::Page`] a page is
/// transcribed when its own count is below `min_page_chars`.
pub fn transcription_plan<S: AsRef<str>>(
    page_texts: &[S],
    verdict: &SufficiencyVerdict,
    granularity: Granularity,
    min_page_chars: usize,
) -> Vec<bool> {
    match granularity {
        Granularity::Document => vec![verdict.requires_transcription; page_texts.len()],
        Granularity::Page => page_texts
            .iter()
            .map(|t| effective_chars(t.as_ref()) < min_page_chars)
            .collect(),
    }
}
