//! Prompt templates for every model-backed stage.
//!
//! Each template carries a fixed task line (the `*_TASK` constants). Besides
//! steering the model, the task line identifies the stage, which is what
//! scripted models key their answers on.

use crate::agents::error_hints::ErrorHint;
use crate::agents::query_planning::ClauseDecomposition;
use crate::agents::schema_linking::LinkedSchema;
use crate::agents::query_planning::QueryPlan;

pub const SCHEMA_LINKING_TASK: &str =
    "TASK: Identify which tables and columns are relevant to answer this question.";
pub const DECOMPOSITION_TASK: &str =
    "TASK: Decompose the question into the clauses of a single SQL query.";
pub const QUERY_PLAN_TASK: &str =
    "TASK: Write a step-by-step plan for building the SQL query.";
pub const SQL_GENERATION_TASK: &str =
    "TASK: Convert this logical plan into a valid SQL query.";
pub const ERROR_CLASSIFICATION_TASK: &str =
    "TASK: Detect the single most relevant error in the SQL and plan its fix.";
pub const APPLY_CORRECTION_TASK: &str =
    "TASK: Apply the fix plan to the SQL and change nothing else.";

const NO_FENCES: &str = "Do NOT include code fences such as ```json or ```sql.";

pub fn schema_linking(question: &str, schema_json: &str) -> String {
    format!(
        r#"You are an expert SQL assistant.

Schema:
{schema_json}

Question: "{question}"

{SCHEMA_LINKING_TASK}
Only include relevant columns. Return output as a JSON object like:
{{
  "tables": {{"table_name": ["column1", "column2"]}},
  "foreign_keys": [{{"from": "table1.fk_column", "to": "table2.pk_column"}}],
  "reasoning": "<1-2 sentences on why these tables and columns are needed>"
}}

{NO_FENCES}"#
    )
}

pub fn decomposition(question: &str, linked: &LinkedSchema) -> String {
    format!(
        r#"You are an expert SQL planner.

Question: "{question}"

Linked schema:
{linked}

{DECOMPOSITION_TASK}
Return a JSON object whose keys are SQL clauses (select, from, join, where,
group_by, having, order_by, limit) and whose values are the partial clause text
needed for this question. Omit clauses the query does not need.

{NO_FENCES}"#,
        linked = linked.to_prompt_json()
    )
}

pub fn query_plan(question: &str, linked: &LinkedSchema, clauses: &ClauseDecomposition) -> String {
    let clauses_json = serde_json::to_string_pretty(clauses).unwrap_or_else(|_| "{}".to_string());
    format!(
        r#"You are an expert SQL planner.

Question: "{question}"

Linked schema:
{linked}

Clause decomposition:
{clauses_json}

{QUERY_PLAN_TASK}
Each step states one action and the reason it is needed. Return JSON like:
{{
  "steps": [
    {{"step": 1, "description": "<what to do>", "rationale": "<why>"}}
  ]
}}

{NO_FENCES}"#,
        linked = linked.to_prompt_json()
    )
}

pub fn sql_generation(clauses: &ClauseDecomposition, plan: &QueryPlan) -> String {
    let clauses_json = serde_json::to_string_pretty(clauses).unwrap_or_else(|_| "{}".to_string());
    format!(
        r#"You are an expert SQL assistant.

Logical plan (JSON):
{clauses_json}

Plan steps:
{steps}

{SQL_GENERATION_TASK}
Return ONLY the SQL query, without explanation.
{NO_FENCES}"#,
        steps = plan.to_text()
    )
}

pub fn error_classification(
    question: &str,
    linked: &LinkedSchema,
    sql: &str,
    error_message: &str,
    taxonomy_json: &str,
    hint: Option<&ErrorHint<'_>>,
) -> String {
    let runtime_error = if error_message.trim().is_empty() {
        "(none: the query executed successfully; answer with null category and error_code unless the SQL clearly does not answer the question)".to_string()
    } else {
        error_message.to_string()
    };
    let hint_line = match hint {
        Some(hint) => format!(
            "\nThe database message resembles \"{}.{}\" ({}); confirm or override this.\n",
            hint.category, hint.code, hint.description
        ),
        None => String::new(),
    };

    format!(
        r#"You are an expert SQL debugging assistant.

Question:
{question}

Linked schema:
{linked}

SQL Query:
{sql}

Database Runtime Error:
{runtime_error}
{hint_line}
Error Taxonomy (JSON):
{taxonomy_json}

{ERROR_CLASSIFICATION_TASK}
You must identify and correct only ONE error in the given SQL.
1. Detect the single most relevant error and label it with its taxonomy category and error code.
2. Explain in 1-2 sentences why this error makes the SQL incorrect.
3. Provide a short, high-level plan to fix only this one error (do not fix anything else).

Return ONLY JSON like this:
{{
  "category": "<category_name or null>",
  "error_code": "<error_code or null>",
  "reason": "<reason explaining the error>",
  "fix_plan": "<short high-level plan to fix the SQL>"
}}
{NO_FENCES}"#,
        linked = linked.to_prompt_json()
    )
}

pub fn apply_correction(sql: &str, fix_plan: &str) -> String {
    format!(
        r#"You are an expert SQL assistant.

Current SQL:
{sql}

Instruction to fix the SQL:
{fix_plan}

{APPLY_CORRECTION_TASK}
1. Modify ONLY the parts of the SQL that the instruction explicitly mentions.
2. Do NOT remove, reorder, or alter any other clause or content of the original SQL.
3. Preserve all structure, formatting, tables, columns, joins, filters, and logic the instruction does not reference.
4. Return ONLY the corrected SQL query without any extra text or explanation.
{NO_FENCES}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_prompt_carries_only_its_own_task_line() {
        let linked = LinkedSchema::default();
        let clauses = ClauseDecomposition::new();
        let plan = QueryPlan::default();

        let prompts = [
            (schema_linking("q", "{}"), SCHEMA_LINKING_TASK),
            (decomposition("q", &linked), DECOMPOSITION_TASK),
            (query_plan("q", &linked, &clauses), QUERY_PLAN_TASK),
            (sql_generation(&clauses, &plan), SQL_GENERATION_TASK),
            (error_classification("q", &linked, "SELECT 1", "boom", "{}", None), ERROR_CLASSIFICATION_TASK),
            (apply_correction("SELECT 1", "fix it"), APPLY_CORRECTION_TASK),
        ];
        let tasks = [
            SCHEMA_LINKING_TASK,
            DECOMPOSITION_TASK,
            QUERY_PLAN_TASK,
            SQL_GENERATION_TASK,
            ERROR_CLASSIFICATION_TASK,
            APPLY_CORRECTION_TASK,
        ];

        for (prompt, own_task) in &prompts {
            for task in &tasks {
                assert_eq!(prompt.contains(task), task == own_task, "prompt for {own_task}");
            }
        }
    }

    #[test]
    fn test_successful_execution_is_spelled_out_for_the_classifier() {
        let prompt = error_classification("q", &LinkedSchema::default(), "SELECT 1", "", "{}", None);
        assert!(prompt.contains("executed successfully"));

        let hinted = error_classification(
            "q",
            &LinkedSchema::default(),
            "SELECT 1",
            "no such table: x",
            "{}",
            Some(&ErrorHint {
                category: "schema_link",
                code: "table_missing",
                description: "Unknown table",
            }),
        );
        assert!(hinted.contains("\"schema_link.table_missing\" (Unknown table)"));
    }
}
