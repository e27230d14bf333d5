//! Shared HTTP plumbing for the adapters.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::Deserialize;

use crate::error::{LlmError, Result};

/// Build a client with the given request timeout.
pub fn build_client(timeout_secs: u64) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()?)
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorField,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorField {
    Message { message: String },
    Text(String),
}

/// Pull a readable message out of an error body.
///
/// Understands `{"error": {"message": ..}}`, `{"error": ".."}`, and
/// `{"detail": ..}`; anything else is returned as is.
pub fn error_message(body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return match envelope.error {
            ErrorField::Message { message } => message,
            ErrorField::Text(text) => text,
        };
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(detail) = value.get("detail") {
            return match detail.as_str() {
                Some(text) => text.to_string(),
                None => detail.to_string(),
            };
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Turn a non-success response into [`LlmError::Status`].
pub async fn check_status(service: &'static str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "failed to read error body".to_string());
    Err(LlmError::Status {
        service,
        status: status.as_u16(),
        message: error_message(&body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_style_error() {
        let body = r#"{"error": {"message": "Invalid API key", "type": "auth"}}"#;
        assert_eq!(error_message(body), "Invalid API key");
    }

    #[test]
    fn test_plain_error_field() {
        assert_eq!(error_message(r#"{"error": "quota exceeded"}"#), "quota exceeded");
    }

    #[test]
    fn test_detail_field() {
        assert_eq!(error_message(r#"{"detail": "Unauthorized"}"#), "Unauthorized");
        assert_eq!(
            error_message(r#"{"detail": {"error": 1}}"#),
            r#"{"error":1}"#
        );
    }

    #[test]
    fn test_non_json_body() {
        assert_eq!(error_message("  Bad Gateway \n"), "Bad Gateway");
        assert_eq!(error_message(""), "empty response body");
    }

    #[test]
    fn test_build_client() {
        assert!(build_client(30).is_ok());
        assert!(build_client(0).is_ok());
    }
}
