//! LLM error types.

use thiserror::Error;

/// Errors that can occur when making LLM API calls.
#[derive(Debug, Error)]
pub enum LLMError {
    /// HTTP request failed
    #[error("http request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// API returned an error response
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl LLMError {
    /// Best-effort, user-facing description of the failure.
    ///
    /// Upstream bodies are usually `{"error": {"message": ...}}` or
    /// `{"error": "..."}`; anything else falls back to the raw text.
    pub fn user_message(&self) -> String {
        let message = match self {
            LLMError::Request(e) => e.to_string(),
            LLMError::Api { message, .. } => {
                extract_error_message(message).unwrap_or_else(|| message.trim().to_string())
            }
        };

        if message.is_empty() {
            "Something went wrong".to_string()
        } else {
            message
        }
    }
}

fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    let candidate = match value.get("error") {
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(obj @ serde_json::Value::Object(_)) => obj
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string),
        _ => value
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string),
    };

    candidate.filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(message: &str) -> LLMError {
        LLMError::Api {
            status: 500,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_nested_error_message() {
        let err = api(r#"{"error":{"message":"No auth credentials found","code":401}}"#);
        assert_eq!(err.user_message(), "No auth credentials found");
    }

    #[test]
    fn test_string_error_message() {
        let err = api(r#"{"error":"model is overloaded"}"#);
        assert_eq!(err.user_message(), "model is overloaded");
    }

    #[test]
    fn test_top_level_message() {
        let err = api(r#"{"message":"bad gateway"}"#);
        assert_eq!(err.user_message(), "bad gateway");
    }

    #[test]
    fn test_plain_text_body() {
        let err = api("upstream exploded\n");
        assert_eq!(err.user_message(), "upstream exploded");
    }

    #[test]
    fn test_empty_body_falls_back() {
        assert_eq!(api("").user_message(), "Something went wrong");
        assert_eq!(api("  \n").user_message(), "Something went wrong");
    }

    #[test]
    fn test_display() {
        let err = api("boom");
        assert_eq!(err.to_string(), "api error (status 500): boom");
    }
}
