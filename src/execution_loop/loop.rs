//! Execution Loop
//!
//! Bounded execute → classify → apply cycle that drives a SQL candidate
//! toward a successful run.

use crate::agents::{
    ClauseDecomposition, ErrorCorrector, ExecutionOutcome, LinkedSchema, QueryPlanner, SchemaLinker,
    SqlExecutor, SqlGenerator,
};
use crate::catalog::{ErrorTaxonomy, SchemaCatalog};
use crate::execution_loop::record::{CorrectionRecord, PipelineResult};
use crate::execution_loop::state::{after_execution, InconsistencyPolicy, LoopState};
use crate::llm::LanguageModel;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Starting SQL used when synthesis is not requested.
pub const DEFAULT_SEED_SQL: &str = "SELECT FROM WHERE;";

/// Shared, read-only handles every stage needs.
#[derive(Clone)]
pub struct PipelineContext {
    pub llm: Arc<dyn LanguageModel>,
    pub catalog: Arc<SchemaCatalog>,
    pub taxonomy: Arc<ErrorTaxonomy>,
    pub db_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitialSql {
    Seeded(String),
    /// Ask the synthesizer for the first candidate.
    Synthesize,
}

impl Default for InitialSql {
    fn default() -> Self {
        InitialSql::Seeded(DEFAULT_SEED_SQL.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoopOptions {
    pub initial_sql: InitialSql,
    pub policy: InconsistencyPolicy,
}

/// Output of the one-shot PLANNING state.
struct Planning {
    linked: LinkedSchema,
    clauses: ClauseDecomposition,
    plan_text: String,
    initial_sql: String,
}

pub struct ExecutionLoop {
    linker: SchemaLinker,
    planner: QueryPlanner,
    generator: SqlGenerator,
    executor: SqlExecutor,
    corrector: ErrorCorrector,
    options: LoopOptions,
}

impl ExecutionLoop {
    pub fn new(context: PipelineContext, options: LoopOptions) -> Self {
        Self {
            linker: SchemaLinker::new(Arc::clone(&context.llm), Arc::clone(&context.catalog)),
            planner: QueryPlanner::new(Arc::clone(&context.llm)),
            generator: SqlGenerator::new(Arc::clone(&context.llm)),
            executor: SqlExecutor::new(context.db_path),
            corrector: ErrorCorrector::new(context.llm, context.taxonomy),
            options,
        }
    }

    /// Run the whole pipeline for `question`. Never fails: exhaustion is
    /// reported through `success = false` and `execution = None`.
    pub async fn run(&self, question: &str, max_iterations: usize) -> PipelineResult {
        let max_iterations = if max_iterations == 0 {
            warn!("max_iterations must be at least 1, using 1");
            1
        } else {
            max_iterations
        };

        info!("{}: {}", LoopState::Planning, question);
        let planning = self.plan(question).await;
        info!("Initial SQL: {}", planning.initial_sql);

        let mut sql = planning.initial_sql.clone();
        let mut corrections = BTreeMap::new();
        let mut iteration = 0;

        loop {
            iteration += 1;
            info!("{} ({}/{}): {}", LoopState::Executing, iteration, max_iterations, sql);

            let outcome = self.executor.execute(&sql);
            let classification = self
                .corrector
                .classify(question, &planning.linked, &sql, &outcome.error)
                .await;

            let state = after_execution(
                self.options.policy,
                outcome.success,
                classification.reports_error(),
                iteration,
                max_iterations,
            );

            if state == LoopState::Succeeded {
                info!("{} after {} iteration(s)", state, iteration);
                return finish(question, planning, corrections, sql, Some(outcome), true, iteration);
            }

            if outcome.success {
                warn!(
                    "SQL executed but the classifier reported {}; continuing",
                    classification.label()
                );
            }

            let mut record = CorrectionRecord::new(&outcome.error, &classification);

            if state == LoopState::Exhausted {
                corrections.insert(iteration, record);
                info!("{} after {} iteration(s)", state, iteration);
                return finish(question, planning, corrections, sql, None, outcome.success, iteration);
            }

            info!(
                "{} iteration {}: {} | reason: {} | fix plan: {}",
                LoopState::Correcting,
                iteration,
                classification.label(),
                classification.reason,
                classification.fix_plan
            );
            let corrected = self.corrector.apply(&sql, &classification.fix_plan).await;
            info!("Corrected SQL: {}", corrected);

            record.corrected_sql = Some(corrected.clone());
            corrections.insert(iteration, record);
            sql = corrected;
        }
    }

    async fn plan(&self, question: &str) -> Planning {
        let linked = self.linker.link(question).await;
        let clauses = self.planner.decompose(question, &linked).await;
        let plan = self.planner.plan(question, &linked, &clauses).await;

        let initial_sql = match &self.options.initial_sql {
            InitialSql::Seeded(sql) => sql.clone(),
            InitialSql::Synthesize => {
                let sql = self.generator.generate(&clauses, &plan).await;
                if sql.is_empty() {
                    warn!("SQL synthesis returned nothing, seeding with {}", DEFAULT_SEED_SQL);
                    DEFAULT_SEED_SQL.to_string()
                } else {
                    sql
                }
            }
        };

        Planning {
            linked,
            clauses,
            plan_text: plan.to_text(),
            initial_sql,
        }
    }
}

fn finish(
    question: &str,
    planning: Planning,
    corrections: BTreeMap<usize, CorrectionRecord>,
    final_sql: String,
    execution: Option<ExecutionOutcome>,
    last_execution_success: bool,
    iterations: usize,
) -> PipelineResult {
    PipelineResult {
        question: question.to_string(),
        linked_schema: planning.linked,
        sub_problems: planning.clauses,
        query_plan: planning.plan_text,
        initial_sql: planning.initial_sql,
        corrections,
        final_sql,
        success: execution.is_some(),
        execution,
        last_execution_success,
        iterations,
    }
}
