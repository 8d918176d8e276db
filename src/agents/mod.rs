//! Pipeline stages. Each stage owns its prompt, its validation and its
//! fallback; none of them returns an error to the caller.

pub mod error_correction;
pub mod error_hints;
pub mod query_planning;
pub mod schema_linking;
pub mod sql_execution;
pub mod sql_generation;

pub use error_correction::{ErrorClassification, ErrorCorrector};
pub use query_planning::{ClauseDecomposition, PlanStep, QueryPlan, QueryPlanner};
pub use schema_linking::{ForeignKey, LinkedSchema, LinkedTable, SchemaLinker};
pub use sql_execution::{ExecutionOutcome, SqlExecutor};
pub use sql_generation::SqlGenerator;
