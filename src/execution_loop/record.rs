//! Audit trail and terminal value of one pipeline run.

use crate::agents::{ClauseDecomposition, ErrorClassification, ExecutionOutcome, LinkedSchema};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What the loop saw and did in one iteration that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionRecord {
    /// Raw database error; empty when the SQL ran but was still flagged.
    pub error_message: String,
    pub category: Option<String>,
    pub error_code: Option<String>,
    pub reason: String,
    pub fix_plan: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_sql: Option<String>,
}

impl CorrectionRecord {
    pub fn new(error_message: &str, classification: &ErrorClassification) -> Self {
        Self {
            error_message: error_message.to_string(),
            category: classification.category.clone(),
            error_code: classification.error_code.clone(),
            reason: classification.reason.clone(),
            fix_plan: classification.fix_plan.clone(),
            corrected_sql: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub question: String,
    pub linked_schema: LinkedSchema,
    /// Clause decomposition of the question.
    pub sub_problems: ClauseDecomposition,
    pub query_plan: String,
    pub initial_sql: String,
    /// Keyed by 1-based iteration.
    pub corrections: BTreeMap<usize, CorrectionRecord>,
    pub final_sql: String,
    /// Present only when the loop succeeded.
    pub execution: Option<ExecutionOutcome>,
    pub success: bool,
    /// Execution flag of the last iteration, whatever the classifier said.
    pub last_execution_success: bool,
    pub iterations: usize,
}

impl PipelineResult {
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}
