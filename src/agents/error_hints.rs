//! Pattern hints for raw SQLite error messages.
//!
//! Gives the classifier a starting point when the database message is one of
//! the well-known shapes. The hint is only offered when the taxonomy actually
//! defines the suggested code.

use crate::catalog::ErrorTaxonomy;

/// (message fragments that must all appear, category, error_code)
const PATTERNS: &[(&[&str], &str, &str)] = &[
    (&["syntax error"], "syntax", "sql_syntax_error"),
    (&["incomplete input"], "syntax", "sql_syntax_error"),
    (&["unrecognized token"], "syntax", "sql_syntax_error"),
    (&["no such table"], "schema_link", "table_missing"),
    (&["no such column"], "schema_link", "col_missing"),
    (&["ambiguous column"], "schema_link", "ambiguous_col"),
    (&["no such function"], "others", "unsupported_function"),
    (&["multiple statements"], "syntax", "sql_syntax_error"),
    // Aggregate used in WHERE
    (&["misuse of aggregate"], "aggregation", "having_vs_where"),
    (&["group by clause is required before having"], "aggregation", "having_without_groupby"),
    (&["having clause on a non-aggregate query"], "aggregation", "having_without_groupby"),
    (&["datatype mismatch"], "filter", "condition_type_mismatch"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorHint<'a> {
    pub category: &'a str,
    pub code: &'a str,
    pub description: &'a str,
}

/// Suggest a taxonomy entry for a raw database message.
pub fn hint_for<'a>(message: &str, taxonomy: &'a ErrorTaxonomy) -> Option<ErrorHint<'a>> {
    let lowered = message.to_lowercase();
    if lowered.trim().is_empty() {
        return None;
    }

    PATTERNS
        .iter()
        .filter(|(fragments, _, _)| fragments.iter().all(|f| lowered.contains(f)))
        .find_map(|&(_, category, code)| {
            taxonomy
                .description(category, code)
                .map(|description| ErrorHint { category, code, description })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn taxonomy() -> ErrorTaxonomy {
        ErrorTaxonomy::from_json_str(
            r#"{"syntax": {"sql_syntax_error": "bad"},
                "schema_link": {"table_missing": "t", "col_missing": "c"},
                "aggregation": {"having_without_groupby": "h", "having_vs_where": "w"}}"#,
        )
        .unwrap()
    }

    fn labels<'a>(hint: Option<ErrorHint<'a>>) -> Option<(&'a str, &'a str)> {
        hint.map(|h| (h.category, h.code))
    }

    /// Message SQLite itself produces for `sql` against a one-table database.
    fn sqlite_message(sql: &str) -> String {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE users (id INTEGER, country TEXT);").unwrap();
        conn.prepare(sql).map(|_| ()).unwrap_err().to_string()
    }

    #[test]
    fn test_known_messages_map_to_taxonomy_codes() {
        let taxonomy = taxonomy();
        assert_eq!(
            labels(hint_for("near \"FROM\": syntax error", &taxonomy)),
            Some(("syntax", "sql_syntax_error"))
        );
        assert_eq!(
            labels(hint_for("no such table: customers", &taxonomy)),
            Some(("schema_link", "table_missing"))
        );
        let hint = hint_for("no such column: userid", &taxonomy).unwrap();
        assert_eq!((hint.category, hint.code, hint.description), ("schema_link", "col_missing", "c"));
    }

    #[test]
    fn test_real_sqlite_messages() {
        let taxonomy = taxonomy();
        let cases = [
            ("SELECT FROM WHERE;", ("syntax", "sql_syntax_error")),
            ("SELECT * FROM customers", ("schema_link", "table_missing")),
            ("SELECT userid FROM users", ("schema_link", "col_missing")),
            ("SELECT country FROM users WHERE COUNT(*) > 1", ("aggregation", "having_vs_where")),
            ("SELECT country FROM users HAVING id > 1", ("aggregation", "having_without_groupby")),
        ];
        for (sql, expected) in cases {
            let message = sqlite_message(sql);
            assert_eq!(labels(hint_for(&message, &taxonomy)), Some(expected), "{}: {}", sql, message);
        }

        let message = rusqlite::Error::MultipleStatement.to_string();
        assert_eq!(labels(hint_for(&message, &taxonomy)), Some(("syntax", "sql_syntax_error")));
    }

    #[test]
    fn test_no_hint_outside_taxonomy_or_on_success() {
        let taxonomy = taxonomy();
        assert_eq!(hint_for("ambiguous column name: id", &taxonomy), None);
        assert_eq!(hint_for("", &taxonomy), None);
        assert_eq!(hint_for("disk I/O error", &taxonomy), None);
    }
}
