//! Loop states and the transition taken after each execution.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How to read a successful execution that the classifier still flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InconsistencyPolicy {
    /// Succeed only when execution succeeded AND no error code was returned.
    #[default]
    TrustClassifier,
    /// Succeed whenever execution succeeded.
    TrustExecution,
}

impl InconsistencyPolicy {
    pub fn accepts(self, execution_success: bool, classifier_reports_error: bool) -> bool {
        match self {
            InconsistencyPolicy::TrustClassifier => execution_success && !classifier_reports_error,
            InconsistencyPolicy::TrustExecution => execution_success,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopState {
    Planning,
    Executing,
    Correcting,
    Succeeded,
    Exhausted,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Planning => "PLANNING",
            LoopState::Executing => "EXECUTING",
            LoopState::Correcting => "CORRECTING",
            LoopState::Succeeded => "SUCCEEDED",
            LoopState::Exhausted => "EXHAUSTED",
        };
        f.write_str(name)
    }
}

/// Next state once iteration `iteration` (1-based) has executed and been classified.
pub fn after_execution(
    policy: InconsistencyPolicy,
    execution_success: bool,
    classifier_reports_error: bool,
    iteration: usize,
    max_iterations: usize,
) -> LoopState {
    if policy.accepts(execution_success, classifier_reports_error) {
        LoopState::Succeeded
    } else if iteration >= max_iterations {
        LoopState::Exhausted
    } else {
        LoopState::Correcting
    }
}
