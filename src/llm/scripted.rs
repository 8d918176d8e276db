//! Deterministic stand-in for a real model.
//!
//! Responses are keyed by a marker substring of the prompt. Each marker owns a
//! sequence of answers that is consumed call by call; the last answer repeats
//! once the sequence is exhausted.

use crate::error::{Nl2SqlError, Result};
use crate::llm::LanguageModel;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

struct ScriptRule {
    marker: String,
    responses: Vec<String>,
    cursor: AtomicUsize,
}

#[derive(Default)]
pub struct ScriptedModel {
    rules: Vec<ScriptRule>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `response` to prompts containing `marker`.
    pub fn on(self, marker: impl Into<String>, response: impl Into<String>) -> Self {
        self.on_sequence(marker, vec![response.into()])
    }

    /// Answer prompts containing `marker` with `responses` in order.
    pub fn on_sequence(mut self, marker: impl Into<String>, responses: Vec<String>) -> Self {
        self.rules.push(ScriptRule {
            marker: marker.into(),
            responses,
            cursor: AtomicUsize::new(0),
        });
        self
    }

    /// Every prompt received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn calls_matching(&self, marker: &str) -> usize {
        self.prompts().iter().filter(|p| p.contains(marker)).count()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let rule = self
            .rules
            .iter()
            .find(|r| prompt.contains(&r.marker))
            .ok_or_else(|| Nl2SqlError::Llm("no scripted response for prompt".to_string()))?;

        if rule.responses.is_empty() {
            return Err(Nl2SqlError::Llm(format!("script for '{}' is empty", rule.marker)));
        }

        let idx = rule.cursor.fetch_add(1, Ordering::SeqCst);
        let response = &rule.responses[idx.min(rule.responses.len() - 1)];
        Ok(response.clone())
    }
}
