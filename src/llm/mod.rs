//! Model inference boundary.
//!
//! Every reasoning stage sends one free-text prompt and gets free text back.
//! Stages never see transport details; they only depend on [`LanguageModel`].

pub mod client;
pub mod scripted;
pub mod structured;

pub use client::LlmClient;
pub use scripted::ScriptedModel;
pub use structured::{
    parse_structured, request_structured, strip_code_fences, structured_or_else, text_or_else, Validate,
};

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send a single prompt and return the raw completion text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}
