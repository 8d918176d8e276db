//! SQL Synthesizer - renders the clause plan into a SQL string.
//!
//! The answer is accepted verbatim once fences are stripped. Only used when the
//! pipeline is asked to synthesize its starting SQL.

use crate::agents::query_planning::{ClauseDecomposition, QueryPlan};
use crate::llm::{text_or_else, LanguageModel};
use crate::prompts;
use std::sync::Arc;

pub struct SqlGenerator {
    llm: Arc<dyn LanguageModel>,
}

impl SqlGenerator {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    pub async fn generate(&self, clauses: &ClauseDecomposition, plan: &QueryPlan) -> String {
        let prompt = prompts::sql_generation(clauses, plan);
        text_or_else(self.llm.as_ref(), &prompt, "sql generation", String::new).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedModel;
    use crate::prompts::SQL_GENERATION_TASK;

    #[tokio::test]
    async fn test_generate_strips_fences() {
        let model = ScriptedModel::new().on(
            SQL_GENERATION_TASK,
            "```sql\nSELECT * FROM users WHERE country = 'USA';\n```",
        );
        let generator = SqlGenerator::new(Arc::new(model));
        let sql = generator.generate(&ClauseDecomposition::new(), &QueryPlan::default()).await;
        assert_eq!(sql, "SELECT * FROM users WHERE country = 'USA';");
    }

    #[tokio::test]
    async fn test_generate_without_model_answer_is_empty() {
        let generator = SqlGenerator::new(Arc::new(ScriptedModel::new()));
        let sql = generator.generate(&ClauseDecomposition::new(), &QueryPlan::default()).await;
        assert!(sql.is_empty());
    }
}
