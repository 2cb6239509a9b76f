//! Read-only policy checks for agent-supplied SQL.
//!
//! Two separate checks live here:
//! - the SELECT gate used by `execute_query` (leading keyword only), with the
//!   dialect row-limit rewrite that follows it
//! - the lexical review behind `validate_sql`, which reports every issue it
//!   finds instead of stopping at the first
//!
//! Keyword detection tokenizes with [sqlparser](https://docs.rs/sqlparser/) so
//! that string literals, comments and identifiers such as `updated_at` or
//! `[delete_log]` never count as the keyword itself.

use crate::db::BackendKind;
use regex::Regex;
use sqlparser::dialect::{Dialect, GenericDialect, MsSqlDialect, PostgreSqlDialect};
use sqlparser::tokenizer::{Token, Tokenizer};
use std::sync::LazyLock;

/// Keywords `validate_sql` flags, in report order.
pub const DANGEROUS_KEYWORDS: [&str; 7] =
    ["drop", "delete", "update", "insert", "truncate", "alter", "create"];

pub const SELECT_ONLY: &str = "Only SELECT queries are allowed";

/// Used only when the tokenizer rejects the text (e.g. an unterminated string).
static KEYWORD_FALLBACK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(drop|delete|update|insert|truncate|alter|create)\b").expect("valid regex")
});

fn get_dialect(kind: BackendKind) -> Box<dyn Dialect> {
    match kind {
        BackendKind::Postgres => Box::new(PostgreSqlDialect {}),
        BackendKind::SqlServer => Box::new(MsSqlDialect {}),
        BackendKind::Mock => Box::new(GenericDialect {}),
    }
}

/// Whether the trimmed text starts with `select`, ignoring case.
pub fn is_select(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("select"))
}

/// Add a row limit to a SELECT that has none.
///
/// SQL Server gets `TOP n` after `SELECT` (or `SELECT DISTINCT`) unless the text
/// already contains `top `; the other dialects get a trailing `LIMIT n` unless
/// the text already mentions `limit`. A limit of zero leaves the text alone.
pub fn apply_row_limit(kind: BackendKind, sql: &str, row_limit: u32) -> String {
    if row_limit == 0 || !is_select(sql) {
        return sql.to_string();
    }
    let statement = sql.trim().trim_end_matches(';').trim_end();
    let lower = statement.to_ascii_lowercase();

    if kind.uses_top() {
        if lower.contains("top ") {
            return statement.to_string();
        }
        let rest = statement[6..].trim_start();
        match rest.get(..9) {
            Some(head) if head.eq_ignore_ascii_case("distinct ") => {
                format!("SELECT DISTINCT TOP {} {}", row_limit, rest[9..].trim_start())
            }
            _ => format!("SELECT TOP {} {}", row_limit, rest),
        }
    } else if lower.contains("limit") {
        statement.to_string()
    } else {
        format!("{} LIMIT {}", statement, row_limit)
    }
}

/// Dangerous keywords present as bare words, in [`DANGEROUS_KEYWORDS`] order.
pub fn dangerous_keywords(kind: BackendKind, sql: &str) -> Vec<&'static str> {
    let dialect = get_dialect(kind);
    let found: Vec<String> = match Tokenizer::new(dialect.as_ref(), sql).tokenize() {
        Ok(tokens) => tokens
            .into_iter()
            .filter_map(|token| match token {
                Token::Word(word) if word.quote_style.is_none() => {
                    Some(word.value.to_ascii_lowercase())
                }
                _ => None,
            })
            .collect(),
        Err(_) => KEYWORD_FALLBACK_RE
            .find_iter(sql)
            .map(|m| m.as_str().to_ascii_lowercase())
            .collect(),
    };

    DANGEROUS_KEYWORDS
        .into_iter()
        .filter(|keyword| found.iter().any(|word| word == keyword))
        .collect()
}

/// Every issue `validate_sql` reports for `sql`. Empty means valid.
pub fn review(kind: BackendKind, sql: &str) -> Vec<String> {
    let mut issues: Vec<String> = dangerous_keywords(kind, sql)
        .into_iter()
        .map(|keyword| format!("Contains potentially dangerous keyword: {}", keyword))
        .collect();

    if !is_select(sql) {
        issues.push("Query must start with SELECT".to_string());
    }
    if sql.matches('(').count() != sql.matches(')').count() {
        issues.push("Mismatched parentheses".to_string());
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_gate() {
        assert!(is_select("SeLeCt 1"));
        assert!(is_select("   select * from t"));
        assert!(!is_select("  update x set a = 1"));
        assert!(!is_select("sel"));
        assert!(!is_select(""));
        assert!(!is_select("WITH x AS (SELECT 1) SELECT * FROM x"));
    }

    #[test]
    fn test_limit_appended() {
        assert_eq!(
            apply_row_limit(BackendKind::Postgres, "SELECT * FROM ai_agents;", 50),
            "SELECT * FROM ai_agents LIMIT 50"
        );
        assert_eq!(
            apply_row_limit(BackendKind::Mock, "SELECT * FROM AI_Agents LIMIT 3", 1000),
            "SELECT * FROM AI_Agents LIMIT 3"
        );
        assert_eq!(
            apply_row_limit(BackendKind::Mock, "SELECT * FROM AI_Agents", 0),
            "SELECT * FROM AI_Agents"
        );
    }

    #[test]
    fn test_top_injected() {
        assert_eq!(
            apply_row_limit(BackendKind::SqlServer, "select Agent from AI_Agents", 10),
            "SELECT TOP 10 Agent from AI_Agents"
        );
        assert_eq!(
            apply_row_limit(BackendKind::SqlServer, "SELECT DISTINCT Agent FROM AI_Memories", 5),
            "SELECT DISTINCT TOP 5 Agent FROM AI_Memories"
        );
        assert_eq!(
            apply_row_limit(BackendKind::SqlServer, "SELECT TOP 3 * FROM AI_Agents", 10),
            "SELECT TOP 3 * FROM AI_Agents"
        );
    }

    #[test]
    fn test_keywords_are_whole_words() {
        assert!(dangerous_keywords(BackendKind::Mock, "SELECT updated_at FROM t").is_empty());
        assert!(
            dangerous_keywords(BackendKind::Mock, "SELECT * FROM t WHERE note = 'drop me'").is_empty()
        );
        assert!(dangerous_keywords(BackendKind::SqlServer, "SELECT [delete] FROM t").is_empty());
        assert!(dangerous_keywords(BackendKind::Mock, "SELECT 1 -- insert later").is_empty());
        assert_eq!(
            dangerous_keywords(BackendKind::Postgres, "DELETE FROM t; DROP TABLE t"),
            vec!["drop", "delete"]
        );
    }

    #[test]
    fn test_keyword_fallback_on_tokenizer_error() {
        let found = dangerous_keywords(BackendKind::Mock, "DROP TABLE t WHERE x = 'unterminated");
        assert_eq!(found, vec!["drop"]);
    }

    #[test]
    fn test_review_issues() {
        let issues = review(BackendKind::Mock, "DROP TABLE ai_agents");
        assert_eq!(
            issues,
            vec![
                "Contains potentially dangerous keyword: drop".to_string(),
                "Query must start with SELECT".to_string(),
            ]
        );
        assert!(review(BackendKind::Mock, "SELECT * FROM ai_agents").is_empty());
        assert_eq!(
            review(BackendKind::Mock, "SELECT COUNT(* FROM t"),
            vec!["Mismatched parentheses".to_string()]
        );
    }
}
