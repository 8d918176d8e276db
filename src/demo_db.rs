//! Demo database: the `users`/`orders` tables the default catalog describes,
//! filled with random sample rows.

use crate::agents::SqlExecutor;
use crate::error::{Nl2SqlError, Result};
use chrono::{Duration, NaiveDate};
use rand::seq::SliceRandom;
use rand::Rng;
use rusqlite::{params, Connection};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::info;

pub const COUNTRIES: &[&str] = &["USA", "Vietnam", "Japan", "Germany", "Brazil"];
pub const NAMES: &[&str] = &["Alice", "Bob", "Charlie", "Daisy", "Ethan", "Fiona", "Gabe", "Hana"];

/// Dates are drawn from this many days after 2023-01-01.
const DATE_SPAN_DAYS: i64 = 700;

const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    name TEXT,
    country TEXT,
    signup_date TEXT
);
CREATE TABLE IF NOT EXISTS orders (
    id INTEGER PRIMARY KEY,
    user_id INTEGER,
    amount REAL,
    created_at TEXT,
    FOREIGN KEY(user_id) REFERENCES users(id)
);";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub users: usize,
    pub orders: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableDump {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

fn random_date<R: Rng>(rng: &mut R) -> String {
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default();
    (start + Duration::days(rng.gen_range(0..=DATE_SPAN_DAYS)))
        .format("%Y-%m-%d")
        .to_string()
}

pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLES)?;
    Ok(())
}

/// Replace the contents of both tables with `users` users and `orders` orders.
pub fn seed<R: Rng>(conn: &mut Connection, users: usize, orders: usize, rng: &mut R) -> Result<SeedSummary> {
    if users == 0 && orders > 0 {
        return Err(Nl2SqlError::Database(
            "cannot create orders without any users".to_string(),
        ));
    }

    let tx = conn.transaction()?;
    tx.execute("DELETE FROM orders", [])?;
    tx.execute("DELETE FROM users", [])?;

    for id in 1..=users {
        let name = NAMES.choose(rng).copied().unwrap_or("Alice");
        let country = COUNTRIES.choose(rng).copied().unwrap_or("USA");
        tx.execute(
            "INSERT INTO users (id, name, country, signup_date) VALUES (?1, ?2, ?3, ?4)",
            params![id as i64, name, country, random_date(rng)],
        )?;
    }

    for id in 1..=orders {
        let user_id = rng.gen_range(1..=users) as i64;
        let amount = (rng.gen_range(10.0..500.0_f64) * 100.0).round() / 100.0;
        tx.execute(
            "INSERT INTO orders (id, user_id, amount, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id as i64, user_id, amount, random_date(rng)],
        )?;
    }

    tx.commit()?;
    Ok(SeedSummary { users, orders })
}

/// Create (or reset) the demo database at `path`.
pub fn init_demo_db(path: impl AsRef<Path>, users: usize, orders: usize) -> Result<SeedSummary> {
    let path = path.as_ref();
    let mut conn = Connection::open(path)?;
    create_tables(&conn)?;
    let summary = seed(&mut conn, users, orders, &mut rand::thread_rng())?;
    info!(
        "Seeded {} with {} users and {} orders",
        path.display(),
        summary.users,
        summary.orders
    );
    Ok(summary)
}

/// First `limit` rows of every user table, in creation order.
pub fn dump_tables(path: impl AsRef<Path>, limit: usize) -> Result<Vec<TableDump>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Nl2SqlError::Database(format!("{} does not exist", path.display())));
    }

    let names: Vec<String> = {
        let conn = Connection::open(path)?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        names
    };

    let executor = SqlExecutor::new(path);
    let mut dumps = Vec::with_capacity(names.len());
    for name in names {
        let sql = format!("SELECT * FROM \"{}\" LIMIT {}", name.replace('"', "\"\""), limit);
        let outcome = executor.execute(&sql);
        if !outcome.success {
            return Err(Nl2SqlError::Database(outcome.error));
        }
        dumps.push(TableDump {
            name,
            columns: outcome.columns.unwrap_or_default(),
            rows: outcome.rows.unwrap_or_default(),
        });
    }
    Ok(dumps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    #[test]
    fn test_seed_fills_both_tables() {
        let dir = TempDir::new().unwrap();
        let mut conn = Connection::open(dir.path().join("demo.db")).unwrap();
        create_tables(&conn).unwrap();

        let mut rng = StdRng::seed_from_u64(7);
        let summary = seed(&mut conn, 20, 50, &mut rng).unwrap();
        assert_eq!(summary, SeedSummary { users: 20, orders: 50 });

        let users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0)).unwrap();
        let orphans: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM orders WHERE user_id NOT IN (SELECT id FROM users)",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(users, 20);
        assert_eq!(orphans, 0);

        // Reseeding replaces rows instead of colliding on primary keys
        seed(&mut conn, 3, 4, &mut rng).unwrap();
        let orders: i64 = conn.query_row("SELECT COUNT(*) FROM orders", [], |r| r.get(0)).unwrap();
        assert_eq!(orders, 4);
    }

    #[test]
    fn test_orders_need_users() {
        let dir = TempDir::new().unwrap();
        let mut conn = Connection::open(dir.path().join("demo.db")).unwrap();
        create_tables(&conn).unwrap();
        assert!(seed(&mut conn, 0, 5, &mut StdRng::seed_from_u64(1)).is_err());
    }

    #[test]
    fn test_dump_tables_lists_demo_tables() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("demo.db");
        init_demo_db(&path, 5, 8).unwrap();

        let dumps = dump_tables(&path, 3).unwrap();
        let names: Vec<&str> = dumps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["users", "orders"]);
        assert_eq!(dumps[0].columns, vec!["id", "name", "country", "signup_date"]);
        assert_eq!(dumps[1].rows.len(), 3);

        assert!(dump_tables(dir.path().join("missing.db"), 3).is_err());
    }
}
