//! Schema Linker - narrows the catalog to the tables and columns a question needs.

use crate::catalog::SchemaCatalog;
use crate::error::{Nl2SqlError, Result};
use crate::llm::{request_structured, LanguageModel, Validate};
use crate::prompts;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedTable {
    pub name: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedSchema {
    pub tables: Vec<LinkedTable>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
    #[serde(default)]
    pub reasoning: String,
}

impl LinkedSchema {
    /// Every table and column of the catalog, verbatim.
    pub fn full_catalog(catalog: &SchemaCatalog) -> Self {
        Self {
            tables: catalog
                .tables()
                .iter()
                .map(|t| LinkedTable {
                    name: t.name.clone(),
                    columns: t.column_names(),
                })
                .collect(),
            foreign_keys: Vec::new(),
            reasoning: "Schema linking failed; using the full schema catalog.".to_string(),
        }
    }

    pub fn table(&self, name: &str) -> Option<&LinkedTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// `{"tables": {...}, "foreign_keys": [...], "reasoning": "..."}` as sent to the model.
    pub fn to_prompt_json(&self) -> String {
        let tables: serde_json::Map<String, Value> = self
            .tables
            .iter()
            .map(|t| {
                let columns = t.columns.iter().cloned().map(Value::String).collect();
                (t.name.clone(), Value::Array(columns))
            })
            .collect();
        let document = serde_json::json!({
            "tables": tables,
            "foreign_keys": self.foreign_keys,
            "reasoning": self.reasoning,
        });
        serde_json::to_string_pretty(&document).unwrap_or_default()
    }
}

/// Model answer before it is trusted.
#[derive(Debug, Deserialize)]
struct LinkingResponse {
    tables: serde_json::Map<String, Value>,
    #[serde(default)]
    foreign_keys: Vec<ForeignKey>,
    #[serde(default)]
    reasoning: String,
}

impl Validate for LinkingResponse {
    fn validate(&self) -> Result<()> {
        if self.tables.is_empty() {
            return Err(Nl2SqlError::Parse("schema linking returned no tables".to_string()));
        }
        for (table, columns) in &self.tables {
            let columns = columns.as_array().ok_or_else(|| {
                Nl2SqlError::Parse(format!("columns of '{}' must be an array", table))
            })?;
            if columns.iter().any(|c| !c.is_string()) {
                return Err(Nl2SqlError::Parse(format!(
                    "columns of '{}' must be strings",
                    table
                )));
            }
        }
        Ok(())
    }
}

impl LinkingResponse {
    fn into_linked_schema(self) -> LinkedSchema {
        let tables = self
            .tables
            .into_iter()
            .map(|(name, columns)| LinkedTable {
                name,
                columns: columns
                    .as_array()
                    .map(|cols| {
                        cols.iter()
                            .filter_map(|c| c.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default(),
            })
            .collect();

        LinkedSchema {
            tables,
            foreign_keys: self.foreign_keys,
            reasoning: self.reasoning,
        }
    }
}

pub struct SchemaLinker {
    llm: Arc<dyn LanguageModel>,
    catalog: Arc<SchemaCatalog>,
}

impl SchemaLinker {
    pub fn new(llm: Arc<dyn LanguageModel>, catalog: Arc<SchemaCatalog>) -> Self {
        Self { llm, catalog }
    }

    /// Link the question to the catalog. Never fails: malformed answers fall
    /// back to the whole catalog.
    pub async fn link(&self, question: &str) -> LinkedSchema {
        let prompt = prompts::schema_linking(question, &self.catalog.to_prompt_json());

        let linked = match request_structured::<LinkingResponse>(self.llm.as_ref(), &prompt).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Schema linking failed, using the full catalog: {}", e);
                return LinkedSchema::full_catalog(&self.catalog);
            }
        };

        let linked = linked.into_linked_schema();
        for table in &linked.tables {
            match self.catalog.table(&table.name) {
                None => warn!("Linked table '{}' is not in the schema catalog", table.name),
                Some(def) => {
                    for column in table.columns.iter().filter(|c| !def.has_column(c)) {
                        warn!("Linked column '{}.{}' is not in the schema catalog", table.name, column);
                    }
                }
            }
        }

        info!(
            "Linked schema: {}",
            linked.tables.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", ")
        );
        linked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedModel;
    use crate::prompts::SCHEMA_LINKING_TASK;

    fn catalog() -> Arc<SchemaCatalog> {
        Arc::new(
            SchemaCatalog::from_json_str(
                r#"{"users": {"id": "INTEGER", "name": "TEXT", "country": "TEXT"},
                    "orders": {"id": "INTEGER", "user_id": "INTEGER", "amount": "REAL"}}"#,
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_link_parses_model_answer() {
        let model = ScriptedModel::new().on(
            SCHEMA_LINKING_TASK,
            r#"{"tables": {"users": ["name", "country"]},
                "foreign_keys": [],
                "reasoning": "Users carry the country."}"#,
        );
        let linker = SchemaLinker::new(Arc::new(model), catalog());

        let linked = linker.link("Show me users in the USA.").await;
        assert_eq!(linked.tables.len(), 1);
        assert_eq!(linked.table("users").unwrap().columns, vec!["name", "country"]);
        assert_eq!(linked.reasoning, "Users carry the country.");
    }

    #[tokio::test]
    async fn test_malformed_answer_falls_back_to_full_catalog() {
        for answer in ["Sure! The users table.", r#"{"tables": {}}"#, r#"{"tables": {"users": "name"}}"#] {
            let model = ScriptedModel::new().on(SCHEMA_LINKING_TASK, answer);
            let linker = SchemaLinker::new(Arc::new(model), catalog());

            let linked = linker.link("Show me users in the USA.").await;
            assert_eq!(linked, LinkedSchema::full_catalog(&catalog()), "answer: {answer}");
            assert_eq!(linked.table("orders").unwrap().columns, vec!["id", "user_id", "amount"]);
        }
    }

    #[tokio::test]
    async fn test_model_failure_falls_back_to_full_catalog() {
        let linker = SchemaLinker::new(Arc::new(ScriptedModel::new()), catalog());
        let linked = linker.link("").await;
        assert_eq!(linked.tables.len(), 2);
    }

    #[test]
    fn test_prompt_json_uses_document_shape() {
        let linked = LinkedSchema::full_catalog(&catalog());
        let value: Value = serde_json::from_str(&linked.to_prompt_json()).unwrap();
        assert_eq!(value["tables"]["users"][2], "country");
    }
}
