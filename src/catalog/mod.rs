//! Static configuration documents loaded once at startup.
//!
//! Both documents are read-only after load and are handed to components as
//! `Arc` handles, so tests can inject fixture catalogs.

pub mod schema;
pub mod taxonomy;

pub use schema::{ColumnDef, SchemaCatalog, TableDef};
pub use taxonomy::{ErrorCategory, ErrorCode, ErrorTaxonomy};

use crate::error::{Nl2SqlError, Result};
use std::path::Path;

/// Read a JSON document, mapping failures to a configuration-specific error.
fn read_document(path: &Path, wrap: fn(String) -> Nl2SqlError) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| wrap(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| wrap(format!("Failed to parse {}: {}", path.display(), e)))
}
