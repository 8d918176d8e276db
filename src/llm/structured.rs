//! Validate-or-fallback layer for model output.
//!
//! Model text is never trusted: it is unfenced, parsed into a typed shape,
//! checked with [`Validate`], and replaced by the caller's fallback when any
//! of those steps (or the model call itself) fails.

use crate::error::{Nl2SqlError, Result};
use crate::llm::LanguageModel;
use serde::de::DeserializeOwned;
use tracing::warn;

/// Structural checks that `serde` cannot express.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

impl Validate for serde_json::Map<String, serde_json::Value> {
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Remove a surrounding markdown fence (```` ```json ... ``` ````) if present.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let body = match rest.split_once('\n') {
        Some((tag, body))
            if tag
                .trim()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') =>
        {
            body
        }
        Some(_) => rest,
        None => rest
            .strip_prefix("json")
            .or_else(|| rest.strip_prefix("sql"))
            .unwrap_or(rest),
    };

    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 200;
    match text.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

pub fn parse_structured<T>(raw: &str) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let body = strip_code_fences(raw);
    let value: T = serde_json::from_str(body)
        .map_err(|e| Nl2SqlError::Parse(format!("{}. Response: {}", e, preview(body))))?;
    value.validate()?;
    Ok(value)
}

/// One model call parsed and validated into `T`.
pub async fn request_structured<T>(llm: &dyn LanguageModel, prompt: &str) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let raw = llm.complete(prompt).await?;
    parse_structured(&raw)
}

/// Ask for structured JSON; on any failure log and return `fallback()`.
pub async fn structured_or_else<T, F>(
    llm: &dyn LanguageModel,
    prompt: &str,
    stage: &str,
    fallback: F,
) -> T
where
    T: DeserializeOwned + Validate,
    F: FnOnce() -> T,
{
    match request_structured::<T>(llm, prompt).await {
        Ok(value) => value,
        Err(e) => {
            warn!("{}: falling back after invalid model output: {}", stage, e);
            fallback()
        }
    }
}

/// Ask for raw text; an unfenced empty answer or a failed call yields `fallback()`.
pub async fn text_or_else<F>(llm: &dyn LanguageModel, prompt: &str, stage: &str, fallback: F) -> String
where
    F: FnOnce() -> String,
{
    match llm.complete(prompt).await {
        Ok(raw) => {
            let text = strip_code_fences(&raw);
            if text.is_empty() {
                warn!("{}: model returned empty text, using fallback", stage);
                fallback()
            } else {
                text.to_string()
            }
        }
        Err(e) => {
            warn!("{}: model call failed, using fallback: {}", stage, e);
            fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Answer {
        value: i64,
    }

    impl Validate for Answer {
        fn validate(&self) -> Result<()> {
            if self.value < 0 {
                return Err(Nl2SqlError::Parse("value must be non-negative".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```sql\nSELECT 1;\n```\n"), "SELECT 1;");
        assert_eq!(strip_code_fences("```\nSELECT 1;\n```"), "SELECT 1;");
        assert_eq!(strip_code_fences("```sql SELECT 1;```"), "SELECT 1;");
        assert_eq!(strip_code_fences("  SELECT 1;  "), "SELECT 1;");
        assert_eq!(strip_code_fences(""), "");
    }

    #[test]
    fn test_parse_structured_validates() {
        let ok: Answer = parse_structured("```json\n{\"value\": 3}\n```").unwrap();
        assert_eq!(ok.value, 3);

        assert!(parse_structured::<Answer>("{\"value\": -1}").is_err());
        assert!(parse_structured::<Answer>("{\"other\": 1}").is_err());
        assert!(parse_structured::<Answer>("I think the answer is 3").is_err());
    }

    #[tokio::test]
    async fn test_structured_or_else_falls_back() {
        let model = crate::llm::ScriptedModel::new().on("question", "not json at all");
        let answer: Answer = structured_or_else(&model, "question", "test", || Answer { value: 7 }).await;
        assert_eq!(answer.value, 7);

        let silent = crate::llm::ScriptedModel::new();
        let text = text_or_else(&silent, "anything", "test", || "fallback".to_string()).await;
        assert_eq!(text, "fallback");
    }
}
