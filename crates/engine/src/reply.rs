//! Helpers for calling the provider and reading loosely formatted replies.

use scaffold_core::error::ProviderError;
use scaffold_core::provider::{Provider, generate};
use serde_json::Value;
use std::time::Duration;

/// Default per-call timeout when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Single-attempt generation bounded by `timeout`. Elapsed time surfaces as
/// [`ProviderError::Timeout`] and empty text as [`ProviderError::EmptyResponse`].
pub async fn generate_within(
    provider: &dyn Provider,
    timeout: Duration,
    model: &str,
    system_prompt: &str,
    user_message: &str,
    max_tokens: u32,
    temperature: f32,
) -> Result<String, ProviderError> {
    let call = generate(provider, model, system_prompt, user_message, max_tokens, temperature);
    let text = tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| ProviderError::Timeout(format!("no reply within {}s", timeout.as_secs())))??;

    if text.trim().is_empty() {
        return Err(ProviderError::EmptyResponse);
    }
    Ok(text)
}

/// Pull a JSON object out of a reply that may wrap it in markdown fences or
/// surround it with prose.
pub fn extract_json_object(raw: &str) -> Option<serde_json::Map<String, Value>> {
    let unfenced = strip_fence(raw.trim());
    if let Ok(Value::Object(map)) = serde_json::from_str(unfenced) {
        return Some(map);
    }

    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str(&raw[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Skip the info string ("json", "JSON", ...)
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Read a field as text, accepting strings, numbers and booleans.
pub fn field_text(map: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Clip to `max` characters, ending with an ellipsis when shortened.
pub fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
