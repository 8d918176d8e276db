//! Schema Catalog - table → column → type mapping used as prompt context.

use crate::catalog::read_document;
use crate::error::{Nl2SqlError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.name == column)
    }
}

/// Tables and columns in the order they appear in the catalog document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaCatalog {
    tables: Vec<TableDef>,
}

impl SchemaCatalog {
    /// Load the catalog from disk. A missing or malformed file is fatal.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let document = read_document(path, Nl2SqlError::Catalog)?;
        let catalog = Self::from_value(&document)?;
        info!(
            "Loaded schema catalog from {} ({} tables)",
            path.display(),
            catalog.tables.len()
        );
        Ok(catalog)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(content)
            .map_err(|e| Nl2SqlError::Catalog(format!("Failed to parse schema catalog: {}", e)))?;
        Self::from_value(&document)
    }

    /// Expects `{"table": {"column": "TYPE", ...}, ...}`.
    pub fn from_value(document: &Value) -> Result<Self> {
        let tables_obj = document.as_object().ok_or_else(|| {
            Nl2SqlError::Catalog("schema catalog must be a JSON object of tables".to_string())
        })?;

        if tables_obj.is_empty() {
            return Err(Nl2SqlError::Catalog("schema catalog defines no tables".to_string()));
        }

        let mut tables = Vec::with_capacity(tables_obj.len());
        for (table_name, columns_value) in tables_obj {
            let columns_obj = columns_value.as_object().ok_or_else(|| {
                Nl2SqlError::Catalog(format!(
                    "table '{}' must map column names to types",
                    table_name
                ))
            })?;

            let mut columns = Vec::with_capacity(columns_obj.len());
            for (column_name, type_value) in columns_obj {
                let data_type = type_value.as_str().ok_or_else(|| {
                    Nl2SqlError::Catalog(format!(
                        "column '{}.{}' has a non-string type",
                        table_name, column_name
                    ))
                })?;
                columns.push(ColumnDef {
                    name: column_name.clone(),
                    data_type: data_type.to_string(),
                });
            }

            tables.push(TableDef {
                name: table_name.clone(),
                columns,
            });
        }

        Ok(Self { tables })
    }

    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// The catalog in its document shape, pretty-printed for prompts.
    pub fn to_prompt_json(&self) -> String {
        let mut document = serde_json::Map::new();
        for table in &self.tables {
            let columns: serde_json::Map<String, Value> = table
                .columns
                .iter()
                .map(|c| (c.name.clone(), Value::String(c.data_type.clone())))
                .collect();
            document.insert(table.name.clone(), Value::Object(columns));
        }
        serde_json::to_string_pretty(&Value::Object(document)).unwrap_or_default()
    }
}
