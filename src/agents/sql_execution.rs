//! Executor - runs SQL verbatim against the target SQLite file.
//!
//! The connection lives for one call only. Failures are folded into the
//! outcome with the database's own message, which the corrector relies on.

use rusqlite::types::ValueRef;
use rusqlite::{Batch, Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub columns: Option<Vec<String>>,
    pub rows: Option<Vec<Vec<Value>>>,
    /// Rows keyed by column name.
    pub result: Option<Vec<Map<String, Value>>>,
    pub error: String,
}

impl ExecutionOutcome {
    fn succeeded(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let result = rows
            .iter()
            .map(|row| columns.iter().cloned().zip(row.iter().cloned()).collect())
            .collect();
        Self {
            success: true,
            columns: Some(columns),
            rows: Some(rows),
            result: Some(result),
            error: String::new(),
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            columns: None,
            rows: None,
            result: None,
            error: error.into(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.as_ref().map(Vec::len).unwrap_or(0)
    }
}

fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => {
            Value::String(bytes.iter().map(|b| format!("{:02x}", b)).collect())
        }
    }
}

pub struct SqlExecutor {
    db_path: PathBuf,
}

impl SqlExecutor {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    /// Execute `sql`. Never fails; errors are reported in the outcome.
    pub fn execute(&self, sql: &str) -> ExecutionOutcome {
        match self.run(sql) {
            Ok((columns, rows)) => {
                info!("SQL executed: {} columns, {} rows", columns.len(), rows.len());
                ExecutionOutcome::succeeded(columns, rows)
            }
            Err(e) => {
                let message = e.to_string();
                info!("SQL failed: {}", message);
                ExecutionOutcome::failed(message)
            }
        }
    }

    fn run(&self, sql: &str) -> rusqlite::Result<(Vec<String>, Vec<Vec<Value>>)> {
        debug!("Executing against {}: {}", self.db_path.display(), sql);
        // No CREATE flag: a missing database file is an execution error
        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        // Exactly one statement; blank or comment-only input runs as an empty result
        let mut batch = Batch::new(&conn, sql);
        let Some(mut stmt) = batch.next()? else {
            return Ok((Vec::new(), Vec::new()));
        };
        if !matches!(batch.next(), Ok(None)) {
            return Err(rusqlite::Error::MultipleStatement);
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for idx in 0..width {
                values.push(value_to_json(row.get_ref(idx)?));
            }
            out.push(values);
        }

        Ok((columns, out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seeded_db(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("demo.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, country TEXT, signup_date TEXT);
             INSERT INTO users VALUES (1, 'Alice', 'USA', '2023-01-05');
             INSERT INTO users VALUES (2, 'Bob', 'Vietnam', '2023-02-11');
             INSERT INTO users VALUES (3, 'Hana', 'USA', NULL);",
        )
        .unwrap();
        path
    }

    #[test]
    fn test_valid_select_returns_columns_in_table_order() {
        let dir = TempDir::new().unwrap();
        let executor = SqlExecutor::new(seeded_db(&dir));

        let outcome = executor.execute("SELECT * FROM users WHERE country = 'USA';");
        assert!(outcome.success);
        assert_eq!(outcome.error, "");
        assert_eq!(
            outcome.columns.as_deref().unwrap(),
            ["id", "name", "country", "signup_date"]
        );
        assert_eq!(outcome.row_count(), 2);

        let records = outcome.result.unwrap();
        assert_eq!(records[0]["name"], "Alice");
        assert_eq!(records[1]["signup_date"], Value::Null);
    }

    #[test]
    fn test_unknown_table_reports_raw_error() {
        let dir = TempDir::new().unwrap();
        let executor = SqlExecutor::new(seeded_db(&dir));

        let outcome = executor.execute("SELECT * FROM customers;");
        assert!(!outcome.success);
        assert!(outcome.error.contains("no such table"), "{}", outcome.error);
        assert!(outcome.columns.is_none());
        assert!(outcome.rows.is_none());
        assert!(outcome.result.is_none());
    }

    #[test]
    fn test_syntax_error_and_missing_database() {
        let dir = TempDir::new().unwrap();
        let executor = SqlExecutor::new(seeded_db(&dir));
        let outcome = executor.execute("SELECT FROM WHERE;");
        assert!(!outcome.success);
        assert!(outcome.error.contains("syntax error"), "{}", outcome.error);

        let missing = SqlExecutor::new(dir.path().join("absent.db"));
        let outcome = missing.execute("SELECT 1;");
        assert!(!outcome.success);
        assert!(!outcome.error.is_empty());
        assert!(!dir.path().join("absent.db").exists());
    }

    #[test]
    fn test_aggregates_and_reals_are_converted() {
        let dir = TempDir::new().unwrap();
        let executor = SqlExecutor::new(seeded_db(&dir));

        let outcome = executor.execute("SELECT COUNT(*) AS n, 1.5 AS x FROM users;");
        assert!(outcome.success);
        assert_eq!(outcome.rows.unwrap(), vec![vec![Value::from(3), Value::from(1.5)]]);
    }

    #[test]
    fn test_only_one_statement_per_call() {
        let dir = TempDir::new().unwrap();
        let executor = SqlExecutor::new(seeded_db(&dir));

        let outcome = executor.execute("SELECT * FROM users; SELECT nonsense FROM nowhere;");
        assert!(!outcome.success);
        assert!(!outcome.error.is_empty());
        assert!(outcome.rows.is_none());

        // The trailing statement must not run either
        assert!(!executor.execute("SELECT * FROM users; DELETE FROM users;").success);
        assert_eq!(executor.execute("SELECT * FROM users;").row_count(), 3);

        // A trailing comment is not a second statement
        assert!(executor.execute("SELECT * FROM users; -- all of them").success);
    }

    #[test]
    fn test_blank_or_comment_only_sql_is_an_empty_result() {
        let dir = TempDir::new().unwrap();
        let executor = SqlExecutor::new(seeded_db(&dir));

        for sql in ["", "   ", "-- just a comment"] {
            let outcome = executor.execute(sql);
            assert!(outcome.success, "{:?}: {}", sql, outcome.error);
            assert_eq!(outcome.error, "");
            assert_eq!(outcome.columns.as_deref(), Some(&[][..]));
            assert_eq!(outcome.row_count(), 0);
        }
    }
}
