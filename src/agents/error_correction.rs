//! Corrector
//!
//! `classify` labels the single most relevant defect of a SQL string against
//! the error taxonomy and proposes a one-step fix plan. `apply` rewrites the
//! SQL according to that plan, leaving everything else untouched.

use crate::agents::error_hints::hint_for;
use crate::agents::schema_linking::LinkedSchema;
use crate::catalog::ErrorTaxonomy;
use crate::error::Result;
use crate::llm::{request_structured, text_or_else, LanguageModel, Validate};
use crate::prompts;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const CLASSIFICATION_FAILED: &str = "classification failed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorClassification {
    pub category: Option<String>,
    pub error_code: Option<String>,
    pub reason: String,
    pub fix_plan: String,
}

impl ErrorClassification {
    pub fn failed() -> Self {
        Self {
            category: None,
            error_code: None,
            reason: CLASSIFICATION_FAILED.to_string(),
            fix_plan: String::new(),
        }
    }

    /// A null error code is the classifier's "nothing to fix" signal.
    pub fn reports_error(&self) -> bool {
        self.error_code.is_some()
    }

    /// `category.error_code` for logs.
    pub fn label(&self) -> String {
        format!(
            "{}.{}",
            self.category.as_deref().unwrap_or("null"),
            self.error_code.as_deref().unwrap_or("null")
        )
    }
}

#[derive(Debug, Deserialize)]
struct ClassificationResponse {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    fix_plan: String,
}

impl Validate for ClassificationResponse {
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Models echo the template literally; treat "null", "none" and blanks as absent.
fn normalize_label(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null") && !v.eq_ignore_ascii_case("none"))
}

pub struct ErrorCorrector {
    llm: Arc<dyn LanguageModel>,
    taxonomy: Arc<ErrorTaxonomy>,
}

impl ErrorCorrector {
    pub fn new(llm: Arc<dyn LanguageModel>, taxonomy: Arc<ErrorTaxonomy>) -> Self {
        Self { llm, taxonomy }
    }

    pub async fn classify(
        &self,
        question: &str,
        linked: &LinkedSchema,
        sql: &str,
        error_message: &str,
    ) -> ErrorClassification {
        let hint = hint_for(error_message, &self.taxonomy);
        let prompt = prompts::error_classification(
            question,
            linked,
            sql,
            error_message,
            &self.taxonomy.to_prompt_json(),
            hint.as_ref(),
        );

        let response = match request_structured::<ClassificationResponse>(self.llm.as_ref(), &prompt).await {
            Ok(r) => r,
            Err(e) => {
                warn!("Error classification failed: {}", e);
                return ErrorClassification::failed();
            }
        };

        let mut classification = ErrorClassification {
            category: normalize_label(response.category),
            error_code: normalize_label(response.error_code),
            reason: response.reason.trim().to_string(),
            fix_plan: response.fix_plan.trim().to_string(),
        };
        self.reconcile_with_taxonomy(&mut classification);

        info!("Classified as {}: {}", classification.label(), classification.reason);
        classification
    }

    fn reconcile_with_taxonomy(&self, classification: &mut ErrorClassification) {
        let Some(code) = classification.error_code.as_deref() else {
            return;
        };

        if let Some(category) = classification.category.as_deref() {
            if self.taxonomy.contains(category, code) {
                return;
            }
        }

        match self.taxonomy.category_of(code) {
            Some(category) => {
                warn!(
                    "Error code '{}' belongs to category '{}', not '{}'",
                    code,
                    category,
                    classification.category.as_deref().unwrap_or("null")
                );
                classification.category = Some(category.to_string());
            }
            None => warn!("Error code '{}' is not in the error taxonomy", code),
        }
    }

    /// Rewrite `sql` per `fix_plan`. An empty plan or an empty answer keeps `sql`.
    pub async fn apply(&self, sql: &str, fix_plan: &str) -> String {
        if fix_plan.trim().is_empty() {
            debug!("Empty fix plan, SQL left unchanged");
            return sql.to_string();
        }

        let prompt = prompts::apply_correction(sql, fix_plan);
        text_or_else(self.llm.as_ref(), &prompt, "apply correction", || sql.to_string()).await
    }
}
