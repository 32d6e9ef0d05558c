//! Instruction text sent alongside every page image.
//!
//! Kept in one place so prompt changes never touch the retry or parsing code,
//! and so tests can assert on the wording directly.
//! Callers can override it via [`crate::config::ExtractionConfig::instruction`].

/// Marker the model is told to emit for unreadable passages.
pub const ILLEGIBLE_MARKER: &str = "[illegible]";

/// Default transcription instruction.
pub const DEFAULT_INSTRUCTION: &str = "Transcribe all text on this page image exactly as written. \
Preserve the original wording, spelling, punctuation, and line breaks. \
Do not summarize, translate, correct, or add any commentary, headings, or formatting \
that is not on the page. \
If a word or passage cannot be read, write [illegible] in its place. \
Output only the transcribed text.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_names_the_illegible_marker() {
        assert!(DEFAULT_INSTRUCTION.contains(ILLEGIBLE_MARKER));
    }

    #[test]
    fn instruction_forbids_embellishment() {
        let lower = DEFAULT_INSTRUCTION.to_lowercase();
        assert!(lower.contains("exactly"));
        assert!(lower.contains("do not summarize"));
    }
}
