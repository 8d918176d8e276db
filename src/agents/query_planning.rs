//! Decomposer/Planner
//!
//! Two model calls: one splits the question into SQL clause fragments, the
//! other writes a numbered plan with a rationale per step. Either may come
//! back empty; the pipeline carries on without them.

use crate::agents::schema_linking::LinkedSchema;
use crate::error::{Nl2SqlError, Result};
use crate::llm::{structured_or_else, LanguageModel, Validate};
use crate::prompts;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Clause name (select, from, where, ...) → partial clause text.
pub type ClauseDecomposition = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    #[serde(default)]
    pub step: u32,
    pub description: String,
    #[serde(default)]
    pub rationale: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub steps: Vec<PlanStep>,
}

impl QueryPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Numbered plan text. Step numbers are re-derived from position.
    pub fn to_text(&self) -> String {
        self.steps
            .iter()
            .enumerate()
            .map(|(i, s)| {
                if s.rationale.is_empty() {
                    format!("{}. {}", i + 1, s.description)
                } else {
                    format!("{}. {} (rationale: {})", i + 1, s.description, s.rationale)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Validate for QueryPlan {
    fn validate(&self) -> Result<()> {
        if let Some(pos) = self.steps.iter().position(|s| s.description.trim().is_empty()) {
            return Err(Nl2SqlError::Parse(format!("plan step {} has no description", pos + 1)));
        }
        Ok(())
    }
}

pub struct QueryPlanner {
    llm: Arc<dyn LanguageModel>,
}

impl QueryPlanner {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Clause decomposition; empty on malformed output.
    pub async fn decompose(&self, question: &str, linked: &LinkedSchema) -> ClauseDecomposition {
        let prompt = prompts::decomposition(question, linked);
        let clauses =
            structured_or_else(self.llm.as_ref(), &prompt, "decomposition", ClauseDecomposition::new).await;
        info!(
            "Clause decomposition: [{}]",
            clauses.keys().cloned().collect::<Vec<_>>().join(", ")
        );
        clauses
    }

    /// Step-by-step plan; empty on malformed output.
    pub async fn plan(
        &self,
        question: &str,
        linked: &LinkedSchema,
        clauses: &ClauseDecomposition,
    ) -> QueryPlan {
        let prompt = prompts::query_plan(question, linked, clauses);
        let plan = structured_or_else(self.llm.as_ref(), &prompt, "query planning", QueryPlan::default).await;
        info!("Query plan has {} steps", plan.steps.len());
        plan
    }
}
