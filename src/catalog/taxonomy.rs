//! Error Taxonomy - category → error_code → description.
//!
//! Constrains what the classifier may answer with. The loop itself only cares
//! whether a code was returned, but codes are checked here so off-taxonomy
//! answers show up in the logs.

use crate::catalog::read_document;
use crate::error::{Nl2SqlError, Result};
use serde_json::Value;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCode {
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCategory {
    pub name: String,
    pub codes: Vec<ErrorCode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorTaxonomy {
    categories: Vec<ErrorCategory>,
}

impl ErrorTaxonomy {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let document = read_document(path, Nl2SqlError::Taxonomy)?;
        let taxonomy = Self::from_value(&document)?;
        info!(
            "Loaded error taxonomy from {} ({} categories, {} codes)",
            path.display(),
            taxonomy.categories.len(),
            taxonomy.code_count()
        );
        Ok(taxonomy)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(content)
            .map_err(|e| Nl2SqlError::Taxonomy(format!("Failed to parse error taxonomy: {}", e)))?;
        Self::from_value(&document)
    }

    /// Expects `{"category": {"error_code": "description", ...}, ...}`.
    pub fn from_value(document: &Value) -> Result<Self> {
        let categories_obj = document.as_object().ok_or_else(|| {
            Nl2SqlError::Taxonomy("error taxonomy must be a JSON object of categories".to_string())
        })?;

        if categories_obj.is_empty() {
            return Err(Nl2SqlError::Taxonomy("error taxonomy defines no categories".to_string()));
        }

        let mut categories = Vec::with_capacity(categories_obj.len());
        for (name, codes_value) in categories_obj {
            let codes_obj = codes_value.as_object().ok_or_else(|| {
                Nl2SqlError::Taxonomy(format!(
                    "category '{}' must map error codes to descriptions",
                    name
                ))
            })?;

            let mut codes = Vec::with_capacity(codes_obj.len());
            for (code, description) in codes_obj {
                let description = description.as_str().ok_or_else(|| {
                    Nl2SqlError::Taxonomy(format!(
                        "error code '{}.{}' has a non-string description",
                        name, code
                    ))
                })?;
                codes.push(ErrorCode {
                    code: code.clone(),
                    description: description.to_string(),
                });
            }

            categories.push(ErrorCategory {
                name: name.clone(),
                codes,
            });
        }

        Ok(Self { categories })
    }

    pub fn categories(&self) -> &[ErrorCategory] {
        &self.categories
    }

    pub fn code_count(&self) -> usize {
        self.categories.iter().map(|c| c.codes.len()).sum()
    }

    pub fn contains(&self, category: &str, code: &str) -> bool {
        self.categories
            .iter()
            .filter(|c| c.name == category)
            .any(|c| c.codes.iter().any(|e| e.code == code))
    }

    /// First category that defines `code`.
    pub fn category_of(&self, code: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|c| c.codes.iter().any(|e| e.code == code))
            .map(|c| c.name.as_str())
    }

    pub fn description(&self, category: &str, code: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|c| c.name == category)
            .and_then(|c| c.codes.iter().find(|e| e.code == code))
            .map(|e| e.description.as_str())
    }

    pub fn to_prompt_json(&self) -> String {
        let mut document = serde_json::Map::new();
        for category in &self.categories {
            let codes: serde_json::Map<String, Value> = category
                .codes
                .iter()
                .map(|e| (e.code.clone(), Value::String(e.description.clone())))
                .collect();
            document.insert(category.name.clone(), Value::Object(codes));
        }
        serde_json::to_string_pretty(&Value::Object(document)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAXONOMY: &str = r#"{
        "syntax": {"sql_syntax_error": "Malformed SQL", "invalid_alias": "Alias misuse"},
        "schema_link": {"table_missing": "Unknown table", "col_missing": "Unknown column"}
    }"#;

    #[test]
    fn test_lookup_by_category_and_code() {
        let taxonomy = ErrorTaxonomy::from_json_str(TAXONOMY).unwrap();
        assert_eq!(taxonomy.code_count(), 4);
        assert!(taxonomy.contains("syntax", "sql_syntax_error"));
        assert!(!taxonomy.contains("syntax", "table_missing"));
        assert_eq!(taxonomy.category_of("col_missing"), Some("schema_link"));
        assert_eq!(taxonomy.category_of("nope"), None);
        assert_eq!(taxonomy.description("schema_link", "table_missing"), Some("Unknown table"));
    }

    #[test]
    fn test_malformed_taxonomy_is_rejected() {
        assert!(ErrorTaxonomy::from_json_str("{}").is_err());
        assert!(ErrorTaxonomy::from_json_str(r#"{"syntax": ["sql_syntax_error"]}"#).is_err());
        assert!(ErrorTaxonomy::from_json_str(r#"{"syntax": {"x": false}}"#).is_err());
        assert!(matches!(
            ErrorTaxonomy::load("/nonexistent/taxonomy.json"),
            Err(Nl2SqlError::Taxonomy(_))
        ));
    }
}
