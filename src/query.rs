use bigdecimal::BigDecimal;
use regex::Regex;
use serde::Serialize;
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Executor, Row, ValueRef};
use std::sync::OnceLock;

use crate::db::Database;
use crate::errors::{AppError, ResultExt};

const READ_ONLY_KEYWORDS: &[&str] = &["SELECT", "SHOW", "DESCRIBE", "DESC", "EXPLAIN", "WITH"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

fn write_keyword_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(insert|update|delete|replace|drop|alter|create|truncate|grant|revoke|rename|lock|call|load|handler)\b|\binto\s+(outfile|dumpfile)\b",
        )
        .expect("valid write keyword regex")
    })
}

/// Accepts exactly one diagnostic statement and returns it without a
/// trailing semicolon.
pub fn check_read_only(sql: &str) -> Result<&str, AppError> {
    let trimmed = sql.trim();
    let statement = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end();

    if statement.is_empty() {
        return Err(AppError::Rejected("empty statement".to_string()));
    }
    if statement.contains(';') {
        return Err(AppError::Rejected(
            "only a single statement is allowed".to_string(),
        ));
    }

    let keyword = statement
        .trim_start_matches('(')
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    if !READ_ONLY_KEYWORDS.contains(&keyword.as_str()) {
        return Err(AppError::Rejected(format!(
            "`{}` statements are not allowed; use SELECT, SHOW, DESCRIBE, EXPLAIN or WITH",
            keyword
        )));
    }

    let scanned = matches!(keyword.as_str(), "SELECT" | "WITH" | "EXPLAIN");
    if let Some(found) = write_keyword_regex()
        .find(statement)
        .filter(|_| scanned)
    {
        return Err(AppError::Rejected(format!(
            "statement contains `{}`",
            found.as_str()
        )));
    }

    Ok(statement)
}

/// Best-effort text rendering of one column of a row.
fn render_value(row: &MySqlRow, idx: usize) -> Option<String> {
    if row.try_get_raw(idx).map(|v| v.is_null()).unwrap_or(true) {
        return None;
    }

    if let Ok(v) = row.try_get::<String, _>(idx) {
        return Some(v);
    }
    if let Ok(v) = row.try_get::<i64, _>(idx) {
        return Some(v.to_string());
    }
    if let Ok(v) = row.try_get::<u64, _>(idx) {
        return Some(v.to_string());
    }
    if let Ok(v) = row.try_get::<BigDecimal, _>(idx) {
        return Some(v.to_string());
    }
    if let Ok(v) = row.try_get::<f64, _>(idx) {
        return Some(v.to_string());
    }
    if let Ok(v) = row.try_get::<chrono::NaiveDateTime, _>(idx) {
        return Some(v.to_string());
    }
    if let Ok(v) = row.try_get::<chrono::NaiveDate, _>(idx) {
        return Some(v.to_string());
    }
    if let Ok(v) = row.try_get::<chrono::NaiveTime, _>(idx) {
        return Some(v.to_string());
    }
    if let Ok(v) = row.try_get::<serde_json::Value, _>(idx) {
        return Some(v.to_string());
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(idx) {
        return Some(String::from_utf8_lossy(&v).into_owned());
    }

    Some("<unprintable>".to_string())
}

/// Runs an ad-hoc diagnostic statement over the text protocol.
pub async fn run_read_only(db: &Database, sql: &str) -> Result<QueryResult, AppError> {
    let statement = check_read_only(sql)?;
    tracing::debug!("Running: {}", statement);

    let rows: Vec<MySqlRow> = (&db.pool)
        .fetch_all(statement)
        .await
        .context("Query failed")?;

    let columns = rows
        .first()
        .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();

    let rows = rows
        .iter()
        .map(|row| (0..row.len()).map(|i| render_value(row, i)).collect())
        .collect();

    Ok(QueryResult { columns, rows })
}
