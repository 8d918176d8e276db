//! Process configuration
//!
//! Values come from the environment (a `.env` file is loaded first by the
//! binary). Command-line flags override individual fields afterwards.

use crate::error::{Nl2SqlError, Result};
use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_SCHEMA_PATH: &str = "config/schema.json";
pub const DEFAULT_TAXONOMY_PATH: &str = "config/error_taxonomy.json";
pub const DEFAULT_DB_PATH: &str = "demo.db";
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub schema_path: PathBuf,
    pub taxonomy_path: PathBuf,
    pub db_path: PathBuf,
    pub max_iterations: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            schema_path: PathBuf::from(DEFAULT_SCHEMA_PATH),
            taxonomy_path: PathBuf::from(DEFAULT_TAXONOMY_PATH),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl AppConfig {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let max_iterations = match non_empty("NL2SQL_MAX_ITERATIONS") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|e| {
                Nl2SqlError::Config(format!("NL2SQL_MAX_ITERATIONS='{}' is not a number: {}", raw, e))
            })?,
            None => defaults.max_iterations,
        };

        if max_iterations == 0 {
            return Err(Nl2SqlError::Config(
                "NL2SQL_MAX_ITERATIONS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            api_key: non_empty("OPENAI_API_KEY"),
            model: non_empty("OPENAI_MODEL").unwrap_or(defaults.model),
            base_url: non_empty("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            schema_path: non_empty("NL2SQL_SCHEMA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.schema_path),
            taxonomy_path: non_empty("NL2SQL_TAXONOMY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.taxonomy_path),
            db_path: non_empty("NL2SQL_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            max_iterations,
        })
    }

    /// API key for commands that talk to the model.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            Nl2SqlError::Config(
                "OPENAI_API_KEY not found in environment variables (or pass --api-key)".to_string(),
            )
        })
    }
}
