//! Read-only introspection of the configured database via `information_schema`.
//!
//! All text columns are wrapped in `CAST(... AS CHAR)`; MySQL 8 reports several
//! `information_schema` columns as binary strings otherwise.

use serde::Serialize;
use sqlx::FromRow;

use crate::db::Database;
use crate::errors::{AppError, ResultExt};
use crate::schema::quote_ident;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct TableSummary {
    pub table_name: String,
    pub engine: Option<String>,
    pub table_rows: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveColumn {
    pub name: String,
    pub column_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub key: String,
    pub extra: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveIndex {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveForeignKey {
    pub name: String,
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveTable {
    pub name: String,
    pub engine: Option<String>,
    pub columns: Vec<LiveColumn>,
    pub indexes: Vec<LiveIndex>,
    pub foreign_keys: Vec<LiveForeignKey>,
}

impl LiveTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            engine: Some("InnoDB".to_string()),
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&LiveColumn> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Everything drift detection needs to know about the live database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LiveSchema {
    pub database: String,
    pub tables: Vec<LiveTable>,
}

impl LiveSchema {
    pub fn table(&self, name: &str) -> Option<&LiveTable> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCount {
    pub table: String,
    pub rows: i64,
}

#[derive(Debug, FromRow)]
struct ColumnRow {
    table_name: String,
    column_name: String,
    column_type: String,
    is_nullable: String,
    column_default: Option<String>,
    column_key: Option<String>,
    extra: Option<String>,
}

impl From<ColumnRow> for LiveColumn {
    fn from(row: ColumnRow) -> Self {
        Self {
            name: row.column_name,
            column_type: row.column_type,
            nullable: row.is_nullable.eq_ignore_ascii_case("YES"),
            default: row.column_default,
            key: row.column_key.unwrap_or_default(),
            extra: row.extra.unwrap_or_default(),
        }
    }
}

#[derive(Debug, FromRow)]
struct IndexRow {
    table_name: String,
    index_name: String,
    column_name: Option<String>,
    non_unique: i64,
}

#[derive(Debug, FromRow)]
struct ForeignKeyRow {
    table_name: String,
    constraint_name: String,
    column_name: String,
    referenced_table_name: String,
    referenced_column_name: String,
}

impl From<ForeignKeyRow> for LiveForeignKey {
    fn from(row: ForeignKeyRow) -> Self {
        Self {
            name: row.constraint_name,
            column: row.column_name,
            ref_table: row.referenced_table_name,
            ref_column: row.referenced_column_name,
        }
    }
}

/// Base tables of the current database, i.e. `SHOW TABLE STATUS` without the noise.
pub async fn list_tables(db: &Database) -> Result<Vec<TableSummary>, AppError> {
    sqlx::query_as(
        r#"
        SELECT CAST(TABLE_NAME AS CHAR) AS table_name,
               CAST(ENGINE AS CHAR) AS engine,
               CAST(TABLE_ROWS AS UNSIGNED) AS table_rows
        FROM information_schema.TABLES
        WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE'
        ORDER BY TABLE_NAME
        "#,
    )
    .bind(&db.database)
    .fetch_all(&db.pool)
    .await
    .context("Failed to list tables")
}

async fn fetch_columns(db: &Database, table: Option<&str>) -> Result<Vec<ColumnRow>, AppError> {
    sqlx::query_as(
        r#"
        SELECT CAST(TABLE_NAME AS CHAR) AS table_name,
               CAST(COLUMN_NAME AS CHAR) AS column_name,
               CAST(COLUMN_TYPE AS CHAR) AS column_type,
               CAST(IS_NULLABLE AS CHAR) AS is_nullable,
               CAST(COLUMN_DEFAULT AS CHAR) AS column_default,
               CAST(COLUMN_KEY AS CHAR) AS column_key,
               CAST(EXTRA AS CHAR) AS extra
        FROM information_schema.COLUMNS
        WHERE TABLE_SCHEMA = ? AND (? IS NULL OR TABLE_NAME = ?)
        ORDER BY TABLE_NAME, ORDINAL_POSITION
        "#,
    )
    .bind(&db.database)
    .bind(table)
    .bind(table)
    .fetch_all(&db.pool)
    .await
    .context("Failed to read columns")
}

async fn fetch_indexes(db: &Database, table: Option<&str>) -> Result<Vec<IndexRow>, AppError> {
    sqlx::query_as(
        r#"
        SELECT CAST(TABLE_NAME AS CHAR) AS table_name,
               CAST(INDEX_NAME AS CHAR) AS index_name,
               CAST(COLUMN_NAME AS CHAR) AS column_name,
               CAST(NON_UNIQUE AS SIGNED) AS non_unique
        FROM information_schema.STATISTICS
        WHERE TABLE_SCHEMA = ? AND (? IS NULL OR TABLE_NAME = ?)
        ORDER BY TABLE_NAME, INDEX_NAME, SEQ_IN_INDEX
        "#,
    )
    .bind(&db.database)
    .bind(table)
    .bind(table)
    .fetch_all(&db.pool)
    .await
    .context("Failed to read indexes")
}

async fn fetch_foreign_keys(
    db: &Database,
    table: Option<&str>,
) -> Result<Vec<ForeignKeyRow>, AppError> {
    sqlx::query_as(
        r#"
        SELECT CAST(TABLE_NAME AS CHAR) AS table_name,
               CAST(CONSTRAINT_NAME AS CHAR) AS constraint_name,
               CAST(COLUMN_NAME AS CHAR) AS column_name,
               CAST(REFERENCED_TABLE_NAME AS CHAR) AS referenced_table_name,
               CAST(REFERENCED_COLUMN_NAME AS CHAR) AS referenced_column_name
        FROM information_schema.KEY_COLUMN_USAGE
        WHERE TABLE_SCHEMA = ?
          AND REFERENCED_TABLE_NAME IS NOT NULL
          AND (? IS NULL OR TABLE_NAME = ?)
        ORDER BY TABLE_NAME, CONSTRAINT_NAME, ORDINAL_POSITION
        "#,
    )
    .bind(&db.database)
    .bind(table)
    .bind(table)
    .fetch_all(&db.pool)
    .await
    .context("Failed to read foreign keys")
}

/// Collapses one-row-per-column statistics into one entry per index.
fn group_indexes(rows: Vec<IndexRow>) -> Vec<(String, LiveIndex)> {
    let mut grouped: Vec<(String, LiveIndex)> = Vec::new();
    for row in rows {
        match grouped.last_mut() {
            Some((table, index)) if *table == row.table_name && index.name == row.index_name => {
                index.columns.extend(row.column_name);
            }
            _ => grouped.push((
                row.table_name,
                LiveIndex {
                    name: row.index_name,
                    columns: row.column_name.into_iter().collect(),
                    unique: row.non_unique == 0,
                },
            )),
        }
    }
    grouped
}

/// Equivalent of `DESCRIBE <table>`.
pub async fn describe_table(db: &Database, table: &str) -> Result<Vec<LiveColumn>, AppError> {
    let columns: Vec<LiveColumn> = fetch_columns(db, Some(table))
        .await?
        .into_iter()
        .map(LiveColumn::from)
        .collect();

    if columns.is_empty() {
        return Err(AppError::NotFound(format!(
            "table `{}` in database `{}`",
            table, db.database
        )));
    }
    Ok(columns)
}

pub async fn list_indexes(db: &Database, table: &str) -> Result<Vec<LiveIndex>, AppError> {
    let rows = fetch_indexes(db, Some(table)).await?;
    Ok(group_indexes(rows).into_iter().map(|(_, i)| i).collect())
}

pub async fn list_foreign_keys(db: &Database, table: &str) -> Result<Vec<LiveForeignKey>, AppError> {
    Ok(fetch_foreign_keys(db, Some(table))
        .await?
        .into_iter()
        .map(LiveForeignKey::from)
        .collect())
}

/// Exact `COUNT(*)` for every base table.
pub async fn row_counts(db: &Database) -> Result<Vec<TableCount>, AppError> {
    let tables = list_tables(db).await?;
    let mut counts = Vec::with_capacity(tables.len());

    for t in tables {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(&t.table_name));
        let rows: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&db.pool)
            .await
            .with_context(|| format!("Failed to count rows in {}", t.table_name))?;
        counts.push(TableCount {
            table: t.table_name,
            rows,
        });
    }

    Ok(counts)
}

/// Reads tables, columns, indexes and foreign keys in four queries.
pub async fn snapshot(db: &Database) -> Result<LiveSchema, AppError> {
    let mut tables: Vec<LiveTable> = list_tables(db)
        .await?
        .into_iter()
        .map(|s| LiveTable {
            engine: s.engine,
            ..LiveTable::new(s.table_name)
        })
        .collect();

    for row in fetch_columns(db, None).await? {
        if let Some(t) = tables.iter_mut().find(|t| t.name == row.table_name) {
            t.columns.push(row.into());
        }
    }

    for (table, index) in group_indexes(fetch_indexes(db, None).await?) {
        if let Some(t) = tables.iter_mut().find(|t| t.name == table) {
            t.indexes.push(index);
        }
    }

    for row in fetch_foreign_keys(db, None).await? {
        if let Some(t) = tables.iter_mut().find(|t| t.name == row.table_name) {
            t.foreign_keys.push(row.into());
        }
    }

    tracing::debug!("Snapshot of `{}`: {} tables", db.database, tables.len());

    Ok(LiveSchema {
        database: db.database.clone(),
        tables,
    })
}
