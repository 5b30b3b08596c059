//! Comparison of the live database against the schema catalog.

use serde::Serialize;

use crate::inspect::{LiveSchema, LiveTable};
use crate::schema::{normalize_type, ForeignKeyDef, IndexDef, TableDef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// A legacy alias table (e.g. `companies`) exists for a catalog table.
    DuplicateConcept {
        table: String,
        legacy: String,
        canonical_exists: bool,
    },
    MissingTable {
        table: String,
    },
    EngineMismatch {
        table: String,
        expected: String,
        actual: Option<String>,
    },
    MissingColumn {
        table: String,
        column: String,
    },
    TypeMismatch {
        table: String,
        column: String,
        expected: String,
        actual: String,
    },
    NullabilityMismatch {
        table: String,
        column: String,
        expected_nullable: bool,
    },
    MissingPrimaryKey {
        table: String,
    },
    MissingIndex {
        table: String,
        index: String,
    },
    MissingForeignKey {
        table: String,
        constraint: String,
    },
    UnexpectedColumn {
        table: String,
        column: String,
    },
    UnknownTable {
        table: String,
    },
}

impl Finding {
    pub fn severity(&self) -> Severity {
        match self {
            Finding::MissingTable { .. } | Finding::MissingColumn { .. } => Severity::Error,
            Finding::UnexpectedColumn { .. } | Finding::UnknownTable { .. } => Severity::Info,
            _ => Severity::Warning,
        }
    }

    /// Position of this kind of finding within one table's findings.
    pub fn rank(&self) -> u8 {
        match self {
            Finding::DuplicateConcept { .. } => 0,
            Finding::MissingTable { .. } => 1,
            Finding::EngineMismatch { .. } => 2,
            Finding::MissingColumn { .. } => 3,
            Finding::TypeMismatch { .. } => 4,
            Finding::NullabilityMismatch { .. } => 5,
            Finding::MissingPrimaryKey { .. } => 6,
            Finding::MissingIndex { .. } => 7,
            Finding::MissingForeignKey { .. } => 8,
            Finding::UnexpectedColumn { .. } => 9,
            Finding::UnknownTable { .. } => 10,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            Finding::DuplicateConcept { table, .. }
            | Finding::MissingTable { table }
            | Finding::EngineMismatch { table, .. }
            | Finding::MissingColumn { table, .. }
            | Finding::TypeMismatch { table, .. }
            | Finding::NullabilityMismatch { table, .. }
            | Finding::UnexpectedColumn { table, .. }
            | Finding::MissingPrimaryKey { table }
            | Finding::MissingIndex { table, .. }
            | Finding::MissingForeignKey { table, .. }
            | Finding::UnknownTable { table } => table,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Finding::DuplicateConcept {
                table,
                legacy,
                canonical_exists: true,
            } => format!("legacy table `{}` duplicates `{}`", legacy, table),
            Finding::DuplicateConcept { table, legacy, .. } => {
                format!("legacy table `{}` exists instead of `{}`", legacy, table)
            }
            Finding::MissingTable { table } => format!("table `{}` is missing", table),
            Finding::EngineMismatch {
                table,
                expected,
                actual,
            } => format!(
                "table `{}` uses engine {} (expected {})",
                table,
                actual.as_deref().unwrap_or("<none>"),
                expected
            ),
            Finding::MissingColumn { table, column } => {
                format!("column `{}`.`{}` is missing", table, column)
            }
            Finding::TypeMismatch {
                table,
                column,
                expected,
                actual,
            } => format!(
                "column `{}`.`{}` is {} (expected {})",
                table, column, actual, expected
            ),
            Finding::NullabilityMismatch {
                table,
                column,
                expected_nullable,
            } => format!(
                "column `{}`.`{}` should be {}",
                table,
                column,
                if *expected_nullable { "NULL" } else { "NOT NULL" }
            ),
            Finding::UnexpectedColumn { table, column } => {
                format!("column `{}`.`{}` is not in the catalog", table, column)
            }
            Finding::MissingPrimaryKey { table } => {
                format!("table `{}` has no matching primary key", table)
            }
            Finding::MissingIndex { table, index } => {
                format!("index `{}` on `{}` is missing", index, table)
            }
            Finding::MissingForeignKey { table, constraint } => {
                format!("foreign key `{}` on `{}` is missing", constraint, table)
            }
            Finding::UnknownTable { table } => {
                format!("table `{}` is not in the catalog", table)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    pub database: String,
    pub findings: Vec<Finding>,
}

impl DriftReport {
    /// No warnings or errors; informational findings are allowed.
    pub fn is_clean(&self) -> bool {
        self.findings
            .iter()
            .all(|f| f.severity() == Severity::Info)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity() == severity)
            .count()
    }

    pub fn for_table<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a Finding> + 'a {
        self.findings.iter().filter(move |f| f.table() == table)
    }
}

fn same_columns(expected: &[&str], actual: &[String]) -> bool {
    expected.len() == actual.len()
        && expected
            .iter()
            .zip(actual)
            .all(|(e, a)| a.eq_ignore_ascii_case(e))
}

fn index_present(index: &IndexDef, live: &LiveTable) -> bool {
    live.indexes
        .iter()
        .any(|l| same_columns(&index.columns, &l.columns) && (l.unique || !index.unique))
}

fn foreign_key_present(fk: &ForeignKeyDef, live: &LiveTable) -> bool {
    live.foreign_keys.iter().any(|l| {
        l.column.eq_ignore_ascii_case(fk.column)
            && l.ref_table.eq_ignore_ascii_case(fk.ref_table)
            && l.ref_column.eq_ignore_ascii_case(fk.ref_column)
    })
}

fn compare_table(def: &TableDef, live: &LiveTable, findings: &mut Vec<Finding>) {
    let table = def.name.to_string();

    let engine_matches = live
        .engine
        .as_deref()
        .is_some_and(|e| e.eq_ignore_ascii_case(def.engine));
    if !engine_matches {
        findings.push(Finding::EngineMismatch {
            table: table.clone(),
            expected: def.engine.to_string(),
            actual: live.engine.clone(),
        });
    }

    for column in &def.columns {
        let Some(live_column) = live.column(column.name) else {
            findings.push(Finding::MissingColumn {
                table: table.clone(),
                column: column.name.to_string(),
            });
            continue;
        };

        let expected = normalize_type(column.sql_type);
        let actual = normalize_type(&live_column.column_type);
        if expected != actual {
            findings.push(Finding::TypeMismatch {
                table: table.clone(),
                column: column.name.to_string(),
                expected,
                actual,
            });
        }
        if column.nullable != live_column.nullable {
            findings.push(Finding::NullabilityMismatch {
                table: table.clone(),
                column: column.name.to_string(),
                expected_nullable: column.nullable,
            });
        }
    }

    for live_column in &live.columns {
        if def.find_column(&live_column.name).is_none() {
            findings.push(Finding::UnexpectedColumn {
                table: table.clone(),
                column: live_column.name.clone(),
            });
        }
    }

    if !def.primary_key.is_empty() {
        let has_pk = live
            .indexes
            .iter()
            .any(|i| i.name == "PRIMARY" && same_columns(&def.primary_key, &i.columns));
        if !has_pk {
            findings.push(Finding::MissingPrimaryKey {
                table: table.clone(),
            });
        }
    }

    for index in &def.indexes {
        if !index_present(index, live) {
            findings.push(Finding::MissingIndex {
                table: table.clone(),
                index: index.name.to_string(),
            });
        }
    }

    for fk in &def.foreign_keys {
        if !foreign_key_present(fk, live) {
            findings.push(Finding::MissingForeignKey {
                table: table.clone(),
                constraint: fk.name.to_string(),
            });
        }
    }
}

/// Findings come out in catalog order, then by kind; tables the catalog does
/// not know about are listed last.
pub fn compare(catalog: &[TableDef], live: &LiveSchema) -> DriftReport {
    let mut findings = Vec::new();

    for def in catalog {
        let canonical = live.table(def.name);
        let mut table_findings = Vec::new();

        for alias in &def.legacy_aliases {
            if let Some(legacy) = live.table(alias) {
                table_findings.push(Finding::DuplicateConcept {
                    table: def.name.to_string(),
                    legacy: legacy.name.clone(),
                    canonical_exists: canonical.is_some(),
                });
            }
        }

        match canonical {
            Some(live_table) => compare_table(def, live_table, &mut table_findings),
            None => table_findings.push(Finding::MissingTable {
                table: def.name.to_string(),
            }),
        }

        table_findings.sort_by_key(Finding::rank);
        findings.extend(table_findings);
    }

    let mut unknown: Vec<&str> = live
        .tables
        .iter()
        .map(|t| t.name.as_str())
        .filter(|name| {
            !catalog.iter().any(|d| {
                d.name.eq_ignore_ascii_case(name)
                    || d.legacy_aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
            })
        })
        .collect();
    unknown.sort_unstable();
    findings.extend(unknown.into_iter().map(|t| Finding::UnknownTable {
        table: t.to_string(),
    }));

    DriftReport {
        database: live.database.clone(),
        findings,
    }
}
