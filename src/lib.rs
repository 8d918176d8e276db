pub mod agents;
pub mod catalog;
pub mod config;
pub mod demo_db;
pub mod error;
pub mod execution_loop;
pub mod llm;
pub mod prompts;

pub use execution_loop::{
    ExecutionLoop, InconsistencyPolicy, InitialSql, LoopOptions, PipelineContext, PipelineResult,
};
