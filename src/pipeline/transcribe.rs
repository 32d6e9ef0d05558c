//! Page transcription: build the vision request, drive retries, parse the reply.
//!
//! ## Wire format
//!
//! ```json
//! { "model": "...",
//!   "input": [ { "role": "user",
//!                "content": [ { "type": "input_text",  "text": "..." },
//!                             { "type": "input_image",
//!                               "image_url": "data:image/png;base64,..." } ] } ] }
//! ```
//!
//! ## Failure handling
//!
//! 429/500/502/503/504 and transport failures are retried on the
//! [`RetryPolicy`] schedule; any other non-2xx status fails on the spot.
//! Terminal errors carry the status and at most [`MAX_ERROR_BODY_CHARS`]
//! characters of the body so a failed page can be diagnosed from the output
//! file alone.

use crate::cancel::CancelSignal;
use crate::error::TranscriptionError;
use crate::pipeline::backoff::{is_retryable_status, RetryPolicy, RetryState};
use crate::pipeline::transport::TranscriptionTransport;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Body excerpts in errors never exceed this many characters.
pub const MAX_ERROR_BODY_CHARS: usize = 500;

/// Written in place of the page text when the reply contains no text at all.
pub const EMPTY_TRANSCRIPTION: &str = "[no text returned]";

// ── Request ──────────────────────────────────────────────────────────────

/// JSON body of one transcription call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptionRequest {
    pub model: String,
    pub input: Vec<InputMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputMessage {
    pub role: String,
    pub content: Vec<ContentItem>,
}

/// The two kinds of content a request carries, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    InputText { text: String },
    InputImage { image_url: String },
}

impl TranscriptionRequest {
    pub fn new(model: &str, instruction: &str, image_data_url: &str) -> Self {
        Self {
            model: model.to_string(),
            input: vec![InputMessage {
                role: "user".to_string(),
                content: vec![
                    ContentItem::InputText {
                        text: instruction.to_string(),
                    },
                    ContentItem::InputImage {
                        image_url: image_data_url.to_string(),
                    },
                ],
            }],
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────

/// Parse a 2xx body into page text, falling back to [`EMPTY_TRANSCRIPTION`].
pub fn parse_response_body(body: &str) -> Result<String, TranscriptionError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| TranscriptionError::InvalidResponse {
            detail: e.to_string(),
            body: excerpt(body, MAX_ERROR_BODY_CHARS),
        })?;

    Ok(extract_text(&value).unwrap_or_else(|| EMPTY_TRANSCRIPTION.to_string()))
}

/// Pull text out of a response value: the `output[]` message shape first,
/// then the older `choices[]` shape. `None` when neither yields text.
pub fn extract_text(value: &Value) -> Option<String> {
    from_output_messages(value).or_else(|| from_choices(value))
}

fn type_is(v: &Value, expected: &str) -> bool {
    v.get("type").and_then(Value::as_str) == Some(expected)
}

fn join_non_empty(parts: Vec<&str>) -> Option<String> {
    let joined = parts.join("\n");
    if joined.trim().is_empty() {
        None
    } else {
        Some(joined)
    }
}

fn from_output_messages(value: &Value) -> Option<String> {
    let parts: Vec<&str> = value
        .get("output")?
        .as_array()?
        .iter()
        .filter(|item| type_is(item, "message"))
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|part| type_is(part, "output_text"))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();

    join_non_empty(parts)
}

fn from_choices(value: &Value) -> Option<String> {
    let parts: Vec<&str> = value
        .get("choices")?
        .as_array()?
        .iter()
        .filter_map(|choice| choice.get("message")?.get("content"))
        .flat_map(|content| match content {
            Value::String(s) => vec![s.as_str()],
            Value::Array(items) => items
                .iter()
                .filter_map(|i| i.get("text").and_then(Value::as_str))
                .collect(),
            _ => Vec::new(),
        })
        .collect();

    join_non_empty(parts)
}

/// At most `max` characters of `s`, ending in `…` when cut.
pub fn excerpt(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

// ── Client ───────────────────────────────────────────────────────────────

/// Successful transcription plus how many HTTP attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcription {
    pub text: String,
    pub attempts: u32,
}

/// Sends page images to the vision endpoint with retry and backoff.
///
/// Holds no per-call state: the retry counter lives inside each
/// [`TranscriptionClient::transcribe_with`] invocation.
#[derive(Clone)]
pub struct TranscriptionClient {
    transport: Arc<dyn TranscriptionTransport>,
    model: String,
    instruction: String,
    policy: RetryPolicy,
}

impl TranscriptionClient {
    pub fn new(
        transport: Arc<dyn TranscriptionTransport>,
        model: impl Into<String>,
        instruction: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            model: model.into(),
            instruction: instruction.into(),
            policy,
        }
    }

    /// Transcribe with OS-seeded jitter and no cancellation.
    pub async fn transcribe(
        &self,
        image_data_url: &str,
        page_num: usize,
    ) -> Result<String, TranscriptionError> {
        let mut rng = StdRng::from_entropy();
        self.transcribe_with(image_data_url, page_num, &mut rng, &CancelSignal::never())
            .await
            .map(|t| t.text)
    }

    /// Transcribe one page, drawing jitter from `rng` and honouring `cancel`
    /// during backoff waits.
    pub async fn transcribe_with<R: Rng + Send + ?Sized>(
        &self,
        image_data_url: &str,
        page_num: usize,
        rng: &mut R,
        cancel: &CancelSignal,
    ) -> Result<Transcription, TranscriptionError> {
        let request = TranscriptionRequest::new(&self.model, &self.instruction, image_data_url);
        let mut state = RetryState::default();

        loop {
            let delay = state.advance(&self.policy, rng);
            if !delay.is_zero() {
                warn!(
                    "Page {}: retry {}/{} in {}ms",
                    page_num, state.attempt, self.policy.max_attempts, state.last_delay_ms
                );
                if !cancel.sleep(delay).await {
                    return Err(TranscriptionError::Cancelled {
                        attempt: state.attempt,
                    });
                }
            }

            match self.transport.send(&request).await {
                Ok(resp) if resp.is_success() => {
                    let text = parse_response_body(&resp.body)?;
                    debug!(
                        "Page {}: transcribed {} chars on attempt {}",
                        page_num,
                        text.len(),
                        state.attempt
                    );
                    return Ok(Transcription {
                        text,
                        attempts: state.attempt,
                    });
                }
                Ok(resp) => {
                    let retryable = is_retryable_status(resp.status);
                    let err = TranscriptionError::Http {
                        status: resp.status,
                        attempts: state.attempt,
                        body: excerpt(&resp.body, MAX_ERROR_BODY_CHARS),
                    };
                    if !retryable || !self.policy.allows_another(state.attempt) {
                        return Err(err);
                    }
                    warn!(
                        "Page {}: attempt {} failed — HTTP {}",
                        page_num, state.attempt, resp.status
                    );
                }
                Err(source) => {
                    if !self.policy.allows_another(state.attempt) {
                        return Err(TranscriptionError::Transport {
                            attempts: state.attempt,
                            source,
                        });
                    }
                    warn!("Page {}: attempt {} failed — {}", page_num, state.attempt, source);
                }
            }
        }
    }
}

impl std::fmt::Debug for TranscriptionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptionClient")
            .field("transport", &"<dyn TranscriptionTransport>")
            .field("model", &self.model)
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serialises_tagged_content() {
        let req = TranscriptionRequest::new(
            "gpt-4.1-mini",
            "Transcribe.",
            "data:image/png;base64,AAAA",
        );
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v,
            json!({
                "model": "gpt-4.1-mini",
                "input": [{
                    "role": "user",
                    "content": [
                        { "type": "input_text", "text": "Transcribe." },
                        { "type": "input_image", "image_url": "data:image/png;base64,AAAA" }
                    ]
                }]
            })
        );
    }

    #[test]
    fn output_messages_joined_with_newlines() {
        let v = json!({
            "output": [
                { "type": "reasoning", "content": [{ "type": "output_text", "text": "ignored" }] },
                { "type": "message", "content": [
                    { "type": "output_text", "text": "first" },
                    { "type": "refusal", "refusal": "nope" },
                    { "type": "output_text", "text": "second" }
                ]},
                { "type": "message", "content": [{ "type": "output_text", "text": "third" }] }
            ]
        });
        assert_eq!(extract_text(&v).as_deref(), Some("first\nsecond\nthird"));
    }

    #[test]
    fn single_output_text_has_no_separator() {
        let v = json!({
            "output": [{
                "type": "message",
                "content": [{ "type": "output_text", "text": "only" }]
            }]
        });
        assert_eq!(extract_text(&v).as_deref(), Some("only"));
    }

    #[test]
    fn falls_back_to_choices_string() {
        let v = json!({
            "output": [],
            "choices": [{ "message": { "content": "legacy text" } }]
        });
        assert_eq!(extract_text(&v).as_deref(), Some("legacy text"));
    }

    #[test]
    fn falls_back_to_choices_parts() {
        let v = json!({
            "choices": [{
                "message": { "content": [{ "type": "text", "text": "a" }, { "text": "b" }] }
            }]
        });
        assert_eq!(extract_text(&v).as_deref(), Some("a\nb"));
    }

    #[test]
    fn nothing_usable_yields_marker() {
        assert_eq!(parse_response_body(r#"{"id":"resp_1"}"#).unwrap(), EMPTY_TRANSCRIPTION);
        let no_parts = r#"{"output":[{"type":"message","content":[]}],"choices":null}"#;
        assert_eq!(parse_response_body(no_parts).unwrap(), EMPTY_TRANSCRIPTION);
        let blank_part =
            r#"{"output":[{"type":"message","content":[{"type":"output_text","text":""}]}]}"#;
        assert_eq!(parse_response_body(blank_part).unwrap(), EMPTY_TRANSCRIPTION);
    }

    #[test]
    fn non_json_body_is_invalid_response() {
        let err = parse_response_body("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, TranscriptionError::InvalidResponse { .. }));
        assert!(err.to_string().contains("<html>"));
    }

    #[test]
    fn excerpt_caps_characters_not_bytes() {
        let long = "é".repeat(1_000);
        let cut = excerpt(&long, MAX_ERROR_BODY_CHARS);
        assert_eq!(cut.chars().count(), MAX_ERROR_BODY_CHARS);
        assert!(cut.ends_with('…'));
        assert_eq!(excerpt("short", 500), "short");
    }
}
