//! Shared response handling: status checks, envelope extraction, fence stripping.

use super::transport::HttpResponse;
use crate::error::{IdentifyError, Result};
use serde_json::Value;

/// Longest slice of an upstream body we carry into an error message.
const MAX_ERROR_BODY: usize = 300;

/// Fail on non-2xx, carrying the upstream error message when there is one.
pub fn ensure_success(provider: &'static str, response: &HttpResponse) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }
    let message = upstream_error_message(&response.body)
        .unwrap_or_else(|| truncate(response.body.trim(), MAX_ERROR_BODY).to_string());
    log::debug!(
        "[{}] API returned {}: {}",
        provider.to_uppercase(),
        response.status,
        message
    );
    Err(IdentifyError::Status {
        provider,
        status: response.status,
        message,
    })
}

/// Pull a human-readable message out of an error body.
///
/// OpenAI and Gemini use `{"error": {"message": ...}}`; the custom model
/// server uses `{"error": "..."}`.
pub fn upstream_error_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    let error = json.get("error")?;
    error
        .as_str()
        .or_else(|| error.get("message").and_then(Value::as_str))
        .map(|s| s.to_string())
}

/// Parse a response body as JSON.
pub fn parse_body(provider: &'static str, body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| IdentifyError::Parse {
        provider,
        message: format!("body is not JSON: {} (body: {})", e, truncate(body, MAX_ERROR_BODY)),
    })
}

/// OpenAI chat completion: choices[0].message.content
pub fn openai_message_text(body: &Value) -> Option<&str> {
    body.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
}

/// Gemini generateContent: candidates[0].content.parts[0].text
pub fn gemini_candidate_text(body: &Value) -> Option<&str> {
    body.get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
}

/// Strip a Markdown code fence (```json ... ```) around model output.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Drop the info string ("json") on the opening line.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
        .to_string()
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
