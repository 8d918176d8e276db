use crate::config::AppConfig;
use crate::error::{Nl2SqlError, Result};
use crate::llm::LanguageModel;
use async_trait::async_trait;
use tracing::{debug, warn};

const SYSTEM_MESSAGE: &str = "You are an expert SQL assistant. Follow the output format requested by the user exactly.";

/// OpenAI-compatible chat completions client.
#[derive(Clone)]
pub struct LlmClient {
    api_key: String,
    base_url: String,
    model: String,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();
        Ok(Self::new(api_key, config.model.clone(), config.base_url.clone()))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// gpt-5 and the o-series (o1, o3, o4-mini, ...).
    fn is_reasoning_model(&self) -> bool {
        let mut chars = self.model.chars();
        self.model.starts_with("gpt-5")
            || (chars.next() == Some('o') && chars.next().is_some_and(|c| c.is_ascii_digit()))
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_MESSAGE},
                {"role": "user", "content": prompt}
            ],
        });

        // Reasoning models reject temperature and spend extra tokens thinking
        if self.is_reasoning_model() {
            body["max_completion_tokens"] = serde_json::json!(4000);
        } else if self.model.starts_with("gpt-4") {
            body["temperature"] = serde_json::json!(0);
            body["max_completion_tokens"] = serde_json::json!(1000);
        } else {
            body["temperature"] = serde_json::json!(0);
            body["max_tokens"] = serde_json::json!(1000);
        }

        body
    }

    pub async fn call_llm(&self, prompt: &str) -> Result<String> {
        debug!("LLM prompt ({} chars):\n{}", prompt.len(), prompt);

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| Nl2SqlError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Nl2SqlError::Llm(format!("LLM API error ({}): {}", status, error_text)));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Nl2SqlError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        extract_content(&response_json)
    }
}

/// Pull `choices[0].message.content` out of a chat completions payload.
fn extract_content(response_json: &serde_json::Value) -> Result<String> {
    if let Some(error) = response_json.get("error") {
        return Err(Nl2SqlError::Llm(format!("LLM API error: {}", error)));
    }

    let choices = response_json
        .get("choices")
        .and_then(|c| c.as_array())
        .ok_or_else(|| Nl2SqlError::Llm(format!("No choices array in LLM response: {}", response_json)))?;

    let first = choices
        .first()
        .ok_or_else(|| Nl2SqlError::Llm("Empty choices array in LLM response".to_string()))?;

    match first.get("finish_reason").and_then(|r| r.as_str()) {
        Some("length") => warn!("LLM response was truncated due to length limit"),
        Some("content_filter") => {
            return Err(Nl2SqlError::Llm("LLM response was filtered by content policy".to_string()));
        }
        _ => {}
    }

    let content = first["message"]["content"]
        .as_str()
        .ok_or_else(|| Nl2SqlError::Llm(format!("No content in LLM response: {}", first)))?;

    debug!("LLM response:\n{}", content);
    Ok(content.trim().to_string())
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.call_llm(prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_content_trims_message() {
        let payload = json!({
            "choices": [{"message": {"content": "  SELECT 1;\n"}, "finish_reason": "stop"}]
        });
        assert_eq!(extract_content(&payload).unwrap(), "SELECT 1;");
    }

    #[test]
    fn test_extract_content_reports_api_errors() {
        assert!(extract_content(&json!({"error": {"message": "bad key"}})).is_err());
        assert!(extract_content(&json!({"choices": []})).is_err());
        assert!(extract_content(&json!({
            "choices": [{"message": {"content": "x"}, "finish_reason": "content_filter"}]
        }))
        .is_err());
    }

    #[test]
    fn test_request_body_uses_zero_temperature() {
        let client = LlmClient::new("k".into(), "gpt-4.1-mini".into(), "http://localhost/v1/".into());
        let body = client.request_body("hi");
        assert_eq!(body["temperature"], json!(0));
        assert_eq!(body["messages"][1]["content"], json!("hi"));
        assert_eq!(client.base_url, "http://localhost/v1");
    }

    #[test]
    fn test_reasoning_models_get_no_temperature() {
        for model in ["o1", "o3", "o4-mini", "gpt-5-mini"] {
            let client = LlmClient::new("k".into(), model.into(), "http://localhost/v1".into());
            let body = client.request_body("hi");
            assert!(body.get("temperature").is_none(), "{}", model);
            assert!(body.get("max_tokens").is_none(), "{}", model);
            assert_eq!(body["max_completion_tokens"], json!(4000));
        }

        for model in ["gpt-4o-mini", "omni-local"] {
            let client = LlmClient::new("k".into(), model.into(), "http://localhost/v1".into());
            assert_eq!(client.request_body("hi")["temperature"], json!(0), "{}", model);
        }
    }
}
