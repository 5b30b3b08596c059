//! Additive schema repair.
//!
//! Plans are built from a [`DriftReport`] and never contain a DROP. Legacy
//! tables, unexpected columns and (unless allowed) type changes are left for a
//! human to look at.

use serde::Serialize;
use sqlx::{Executor, MySqlConnection};

use crate::db::Database;
use crate::drift::{DriftReport, Finding};
use crate::errors::{classify, AppError, ResultExt, SqlErrorKind};
use crate::schema::{creation_order, quote_ident, TableDef};

#[derive(Debug, Clone, Copy, Default)]
pub struct RepairOptions {
    /// Emit `MODIFY COLUMN` for type and nullability mismatches.
    pub allow_modify: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum RepairStep {
    CreateTable {
        table: String,
        sql: String,
    },
    ConvertEngine {
        table: String,
        sql: String,
    },
    AddColumn {
        table: String,
        column: String,
        sql: String,
    },
    ModifyColumn {
        table: String,
        column: String,
        sql: String,
    },
    AddIndex {
        table: String,
        index: String,
        sql: String,
    },
    AddForeignKey {
        table: String,
        constraint: String,
        sql: String,
    },
}

impl RepairStep {
    pub fn sql(&self) -> &str {
        match self {
            RepairStep::CreateTable { sql, .. }
            | RepairStep::ConvertEngine { sql, .. }
            | RepairStep::AddColumn { sql, .. }
            | RepairStep::ModifyColumn { sql, .. }
            | RepairStep::AddIndex { sql, .. }
            | RepairStep::AddForeignKey { sql, .. } => sql,
        }
    }

    fn phase(&self) -> u8 {
        match self {
            RepairStep::CreateTable { .. } => 0,
            RepairStep::ConvertEngine { .. } => 1,
            RepairStep::AddColumn { .. } | RepairStep::ModifyColumn { .. } => 2,
            RepairStep::AddIndex { .. } => 3,
            RepairStep::AddForeignKey { .. } => 4,
        }
    }

    pub fn is_foreign_key(&self) -> bool {
        matches!(self, RepairStep::AddForeignKey { .. })
    }

    pub fn describe(&self) -> String {
        match self {
            RepairStep::CreateTable { table, .. } => format!("create table `{}`", table),
            RepairStep::ConvertEngine { table, .. } => format!("convert `{}` to InnoDB", table),
            RepairStep::AddColumn { table, column, .. } => {
                format!("add column `{}`.`{}`", table, column)
            }
            RepairStep::ModifyColumn { table, column, .. } => {
                format!("modify column `{}`.`{}`", table, column)
            }
            RepairStep::AddIndex { table, index, .. } => {
                format!("add index `{}` on `{}`", index, table)
            }
            RepairStep::AddForeignKey {
                table, constraint, ..
            } => format!("add foreign key `{}` on `{}`", constraint, table),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairPlan {
    pub steps: Vec<RepairStep>,
    /// Findings that need manual attention.
    pub report_only: Vec<Finding>,
}

impl RepairPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

fn lookup<'a>(catalog: &'a [TableDef], table: &str) -> Result<&'a TableDef, AppError> {
    catalog
        .iter()
        .find(|t| t.name == table)
        .ok_or_else(|| AppError::Schema(format!("table `{}` is not in the catalog", table)))
}

fn add_column_sql(def: &TableDef, column: &str) -> Result<String, AppError> {
    let position = def
        .columns
        .iter()
        .position(|c| c.name == column)
        .ok_or_else(|| {
            AppError::Schema(format!("column `{}`.`{}` is not in the catalog", def.name, column))
        })?;

    let placement = match position {
        0 => " FIRST".to_string(),
        n => format!(" AFTER {}", quote_ident(def.columns[n - 1].name)),
    };

    Ok(format!(
        "ALTER TABLE {} ADD COLUMN {}{}",
        quote_ident(def.name),
        def.columns[position].definition_sql(),
        placement
    ))
}

/// Turns findings into an ordered list of additive steps:
/// tables, engines, columns, indexes, then foreign keys.
pub fn plan(
    catalog: &[TableDef],
    report: &DriftReport,
    options: RepairOptions,
) -> Result<RepairPlan, AppError> {
    let mut steps = Vec::new();
    let mut report_only = Vec::new();

    let missing: Vec<&str> = report
        .findings
        .iter()
        .filter_map(|f| match f {
            Finding::MissingTable { table } => Some(table.as_str()),
            _ => None,
        })
        .collect();
    for def in creation_order(catalog)? {
        if missing.contains(&def.name) {
            steps.push(RepairStep::CreateTable {
                table: def.name.to_string(),
                sql: def.create_sql(),
            });
        }
    }

    let mut modified: Vec<(&str, &str)> = Vec::new();

    for finding in &report.findings {
        match finding {
            Finding::MissingTable { .. } => {}
            Finding::EngineMismatch {
                table, expected, ..
            } => steps.push(RepairStep::ConvertEngine {
                table: table.clone(),
                sql: format!("ALTER TABLE {} ENGINE={}", quote_ident(table), expected),
            }),
            Finding::MissingColumn { table, column } => {
                let def = lookup(catalog, table)?;
                // An AUTO_INCREMENT column can only be added together with its key.
                if def.primary_key.iter().any(|c| *c == column.as_str()) {
                    report_only.push(finding.clone());
                    continue;
                }
                steps.push(RepairStep::AddColumn {
                    table: table.clone(),
                    column: column.clone(),
                    sql: add_column_sql(def, column)?,
                });
            }
            Finding::TypeMismatch { table, column, .. }
            | Finding::NullabilityMismatch { table, column, .. }
                if options.allow_modify =>
            {
                if modified.contains(&(table.as_str(), column.as_str())) {
                    continue;
                }
                modified.push((table.as_str(), column.as_str()));

                let def = lookup(catalog, table)?;
                let column_def = def.find_column(column).ok_or_else(|| {
                    AppError::Schema(format!("column `{}`.`{}` is not in the catalog", table, column))
                })?;
                steps.push(RepairStep::ModifyColumn {
                    table: table.clone(),
                    column: column.clone(),
                    sql: format!(
                        "ALTER TABLE {} MODIFY COLUMN {}",
                        quote_ident(table),
                        column_def.definition_sql()
                    ),
                });
            }
            Finding::MissingIndex { table, index } => {
                let def = lookup(catalog, table)?;
                let index_def = def
                    .indexes
                    .iter()
                    .find(|i| i.name == index)
                    .ok_or_else(|| AppError::Schema(format!("unknown index `{}`", index)))?;
                steps.push(RepairStep::AddIndex {
                    table: table.clone(),
                    index: index.clone(),
                    sql: index_def.add_sql(table),
                });
            }
            Finding::MissingForeignKey { table, constraint } => {
                let def = lookup(catalog, table)?;
                let fk = def
                    .foreign_keys
                    .iter()
                    .find(|fk| fk.name == constraint)
                    .ok_or_else(|| {
                        AppError::Schema(format!("unknown foreign key `{}`", constraint))
                    })?;
                steps.push(RepairStep::AddForeignKey {
                    table: table.clone(),
                    constraint: constraint.clone(),
                    sql: fk.add_sql(table),
                });
            }
            other => report_only.push(other.clone()),
        }
    }

    steps.sort_by_key(RepairStep::phase);

    Ok(RepairPlan { steps, report_only })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    Planned,
    Applied,
    Skipped { reason: SqlErrorKind },
    Failed { kind: SqlErrorKind, error: String },
}

impl StepStatus {
    /// Status of a step whose statement was rejected by the server.
    /// Errors meaning "already there" count as skipped.
    pub fn from_failure(kind: SqlErrorKind, error: String) -> Self {
        if kind.is_already_applied() {
            StepStatus::Skipped { reason: kind }
        } else {
            StepStatus::Failed { kind, error }
        }
    }

    pub fn stops_run(&self) -> bool {
        matches!(self, StepStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub step: RepairStep,
    pub status: StepStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplyOutcome {
    pub dry_run: bool,
    pub results: Vec<StepResult>,
}

impl ApplyOutcome {
    fn count(&self, pred: impl Fn(&StepStatus) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.status)).count()
    }

    pub fn applied(&self) -> usize {
        self.count(|s| matches!(s, StepStatus::Applied))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, StepStatus::Skipped { .. }))
    }

    pub fn failed(&self) -> Option<&StepResult> {
        self.results
            .iter()
            .find(|r| matches!(r.status, StepStatus::Failed { .. }))
    }

    pub fn is_success(&self) -> bool {
        self.failed().is_none()
    }

    /// Records the result of one step; returns `false` when the run must stop.
    pub fn record(&mut self, step: &RepairStep, status: StepStatus) -> bool {
        let keep_going = !status.stops_run();
        self.results.push(StepResult {
            step: step.clone(),
            status,
        });
        keep_going
    }
}

async fn run_step(conn: &mut MySqlConnection, step: &RepairStep, outcome: &mut ApplyOutcome) -> bool {
    tracing::info!("{}", step.describe());
    tracing::debug!("{}", step.sql());

    let status = match conn.execute(step.sql()).await {
        Ok(_) => StepStatus::Applied,
        Err(e) => {
            let status = StepStatus::from_failure(classify(&e), e.to_string());
            match &status {
                StepStatus::Skipped { reason } => {
                    tracing::info!("Already applied ({:?}): {}", reason, step.describe())
                }
                _ => tracing::error!("Failed to {}: {}", step.describe(), e),
            }
            status
        }
    };

    outcome.record(step, status)
}

/// Executes `plan` on a single connection. Foreign-key steps run with
/// `FOREIGN_KEY_CHECKS=0`, which is restored afterwards whatever happens.
pub async fn apply(db: &Database, plan: &RepairPlan, dry_run: bool) -> Result<ApplyOutcome, AppError> {
    let mut outcome = ApplyOutcome {
        dry_run,
        results: Vec::with_capacity(plan.steps.len()),
    };

    if dry_run {
        for step in &plan.steps {
            tracing::info!("[dry-run] {}", step.describe());
            outcome.record(step, StepStatus::Planned);
        }
        return Ok(outcome);
    }

    let mut conn = db
        .pool
        .acquire()
        .await
        .context("Failed to acquire connection for repair")?;

    let (plain, foreign_keys): (Vec<&RepairStep>, Vec<&RepairStep>) =
        plan.steps.iter().partition(|s| !s.is_foreign_key());

    for step in plain {
        if !run_step(&mut conn, step, &mut outcome).await {
            return Ok(outcome);
        }
    }

    if foreign_keys.is_empty() {
        return Ok(outcome);
    }

    (&mut *conn)
        .execute("SET FOREIGN_KEY_CHECKS = 0")
        .await
        .context("Failed to disable foreign key checks")?;

    for step in foreign_keys {
        if !run_step(&mut conn, step, &mut outcome).await {
            break;
        }
    }

    (&mut *conn)
        .execute("SET FOREIGN_KEY_CHECKS = 1")
        .await
        .context("Failed to re-enable foreign key checks")?;

    Ok(outcome)
}
