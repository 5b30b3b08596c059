//! Plain-text console rendering for every command's output.

use serde::Serialize;

use crate::drift::{DriftReport, Severity};
use crate::inspect::{LiveColumn, LiveForeignKey, LiveIndex, TableCount, TableSummary};
use crate::query::QueryResult;
use crate::repair::{ApplyOutcome, RepairPlan, StepStatus};

const NULL: &str = "NULL";

/// Left-aligned columns separated by two spaces, with a dashed rule under the header.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(headers.to_vec()));
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&line(rule.iter().map(String::as_str).collect()));
    out.push('\n');
    for row in rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    out
}

pub fn tables_text(tables: &[TableSummary]) -> String {
    let rows: Vec<Vec<String>> = tables
        .iter()
        .map(|t| {
            vec![
                t.table_name.clone(),
                t.engine.clone().unwrap_or_else(|| NULL.to_string()),
                t.table_rows.map(|r| r.to_string()).unwrap_or_default(),
            ]
        })
        .collect();
    format!(
        "{}{} table(s)\n",
        render_table(&["table", "engine", "rows (est.)"], &rows),
        tables.len()
    )
}

pub fn columns_text(columns: &[LiveColumn]) -> String {
    let rows: Vec<Vec<String>> = columns
        .iter()
        .map(|c| {
            vec![
                c.name.clone(),
                c.column_type.clone(),
                if c.nullable { "YES" } else { "NO" }.to_string(),
                c.key.clone(),
                c.default.clone().unwrap_or_else(|| NULL.to_string()),
                c.extra.clone(),
            ]
        })
        .collect();
    render_table(&["Field", "Type", "Null", "Key", "Default", "Extra"], &rows)
}

pub fn indexes_text(indexes: &[LiveIndex]) -> String {
    let rows: Vec<Vec<String>> = indexes
        .iter()
        .map(|i| {
            vec![
                i.name.clone(),
                i.columns.join(", "),
                if i.unique { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    render_table(&["index", "columns", "unique"], &rows)
}

pub fn foreign_keys_text(fks: &[LiveForeignKey]) -> String {
    let rows: Vec<Vec<String>> = fks
        .iter()
        .map(|fk| {
            vec![
                fk.name.clone(),
                fk.column.clone(),
                format!("{}.{}", fk.ref_table, fk.ref_column),
            ]
        })
        .collect();
    render_table(&["constraint", "column", "references"], &rows)
}

pub fn counts_text(counts: &[TableCount]) -> String {
    let rows: Vec<Vec<String>> = counts
        .iter()
        .map(|c| vec![c.table.clone(), c.rows.to_string()])
        .collect();
    render_table(&["table", "rows"], &rows)
}

pub fn query_text(result: &QueryResult) -> String {
    if result.rows.is_empty() {
        return "(0 rows)\n".to_string();
    }
    let headers: Vec<&str> = result.columns.iter().map(String::as_str).collect();
    let rows: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|r| {
            r.iter()
                .map(|v| v.clone().unwrap_or_else(|| NULL.to_string()))
                .collect()
        })
        .collect();
    format!(
        "{}({} row{})\n",
        render_table(&headers, &rows),
        rows.len(),
        if rows.len() == 1 { "" } else { "s" }
    )
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Info => "info",
        Severity::Warning => "warn",
        Severity::Error => "ERROR",
    }
}

pub fn drift_text(report: &DriftReport) -> String {
    let mut out = format!("Schema drift for `{}`\n", report.database);
    if report.findings.is_empty() {
        out.push_str("No drift: live schema matches the catalog.\n");
        return out;
    }

    for finding in &report.findings {
        out.push_str(&format!(
            "  [{:<5}] {}\n",
            severity_label(finding.severity()),
            finding.describe()
        ));
    }
    out.push_str(&format!(
        "{} error(s), {} warning(s), {} info\n",
        report.count(Severity::Error),
        report.count(Severity::Warning),
        report.count(Severity::Info)
    ));
    out
}

pub fn plan_text(plan: &RepairPlan) -> String {
    let mut out = String::new();
    if plan.is_empty() {
        out.push_str("Nothing to repair.\n");
    } else {
        out.push_str(&format!("{} repair step(s):\n", plan.steps.len()));
        for (i, step) in plan.steps.iter().enumerate() {
            out.push_str(&format!("{:>3}. {}\n     {};\n", i + 1, step.describe(), step.sql()));
        }
    }

    if !plan.report_only.is_empty() {
        out.push_str("Needs manual attention (not repaired):\n");
        for finding in &plan.report_only {
            out.push_str(&format!("  - {}\n", finding.describe()));
        }
    }
    out
}

pub fn outcome_text(outcome: &ApplyOutcome) -> String {
    let mut out = String::new();
    for result in &outcome.results {
        let status = match &result.status {
            StepStatus::Planned => "planned".to_string(),
            StepStatus::Applied => "applied".to_string(),
            StepStatus::Skipped { reason } => format!("skipped ({:?})", reason),
            StepStatus::Failed { error, .. } => format!("FAILED: {}", error),
        };
        out.push_str(&format!("  {:<60} {}\n", result.step.describe(), status));
    }

    if outcome.dry_run {
        out.push_str(&format!(
            "Dry run: {} step(s) planned, nothing executed.\n",
            outcome.results.len()
        ));
    } else {
        out.push_str(&format!(
            "{} applied, {} already in place{}\n",
            outcome.applied(),
            outcome.skipped(),
            if outcome.is_success() { "" } else { ", stopped on failure" }
        ));
    }
    out
}

/// Everything `repair` reports: the plan, including findings left for a
/// human, and what happened to each step.
#[derive(Debug, Serialize)]
pub struct RepairSummary<'a> {
    pub plan: &'a RepairPlan,
    pub outcome: &'a ApplyOutcome,
}

pub fn repair_text(summary: &RepairSummary<'_>) -> String {
    format!(
        "{}{}",
        plan_text(summary.plan),
        outcome_text(summary.outcome)
    )
}
