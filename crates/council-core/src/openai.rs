//! OpenAI-compatible chat completions adapter.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use crate::services::{Completion, CompletionService, ServiceError, ServiceResult};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    model: String,
    http: Client,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            http: Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = normalize_base(base_url);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn normalize_base(input: &str) -> String {
    let trimmed = input.trim_end_matches('/');
    if trimmed.ends_with("/v1") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/v1")
    }
}

/// 429 and 5xx are worth retrying; every other failure is not.
fn classify_status(status: StatusCode, detail: String) -> ServiceError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        ServiceError::Transient(format!("{status}: {detail}"))
    } else {
        ServiceError::Permanent(format!("{status}: {detail}"))
    }
}

fn extract_error(value: &Value) -> Option<String> {
    value
        .get("error")
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn extract_text(value: &Value) -> Option<String> {
    value
        .get("choices")
        .and_then(|v| v.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// `usage.total_tokens`, or prompt + completion when the total is absent.
fn extract_total_tokens(value: &Value) -> u64 {
    let Some(usage) = value.get("usage") else {
        return 0;
    };
    let field = |name: &str| usage.get(name).and_then(Value::as_u64);
    field("total_tokens").unwrap_or_else(|| {
        field("prompt_tokens")
            .unwrap_or(0)
            .saturating_add(field("completion_tokens").unwrap_or(0))
    })
}

#[async_trait]
impl CompletionService for OpenAiClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_output_tokens: u32,
    ) -> ServiceResult<Completion> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": system_prompt},
                    {"role": "user", "content": user_prompt},
                ],
                "max_tokens": max_output_tokens,
            }))
            .send()
            .await
            .map_err(|e| ServiceError::Transient(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        let value: Value = response
            .json()
            .await
            .map_err(|e| classify_status(status, format!("unreadable body: {e}")))?;

        if !status.is_success() {
            let detail = extract_error(&value).unwrap_or_else(|| "request failed".to_string());
            return Err(classify_status(status, detail));
        }

        let text = extract_text(&value).ok_or_else(|| {
            ServiceError::Permanent(format!("no completion content from model {}", self.model))
        })?;
        let tokens_used = extract_total_tokens(&value);
        debug!(event = "openai.completed", model = %self.model, tokens_used);
        Ok(Completion { text, tokens_used })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_v1_suffix_once() {
        assert_eq!(normalize_base("http://localhost:8080/"), "http://localhost:8080/v1");
        assert_eq!(normalize_base("https://api.openai.com/v1/"), "https://api.openai.com/v1");
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down".into()),
            ServiceError::Transient(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, "x".into()),
            ServiceError::Transient(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, "bad key".into()),
            ServiceError::Permanent(_)
        ));
    }

    #[test]
    fn reads_content_and_usage() {
        let value = json!({
            "choices": [{"message": {"role": "assistant", "content": "## PLAN\nx"}}],
            "usage": {"prompt_tokens": 40, "completion_tokens": 2, "total_tokens": 42}
        });
        assert_eq!(extract_text(&value).as_deref(), Some("## PLAN\nx"));
        assert_eq!(extract_total_tokens(&value), 42);
    }

    #[test]
    fn usage_falls_back_to_parts_or_zero() {
        let parts = json!({"usage": {"prompt_tokens": 10, "completion_tokens": 5}});
        assert_eq!(extract_total_tokens(&parts), 15);
        assert_eq!(extract_total_tokens(&json!({})), 0);
        assert_eq!(
            extract_error(&json!({"error": {"message": "quota"}})).as_deref(),
            Some("quota")
        );
    }
}
