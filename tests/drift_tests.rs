/// Drift detection and repair planning against synthetic live schemas
use payroll_db::drift::{compare, Finding, Severity};
use payroll_db::inspect::{LiveColumn, LiveForeignKey, LiveIndex, LiveSchema, LiveTable};
use payroll_db::repair::{plan, RepairOptions, RepairStep};
use payroll_db::schema::{catalog, TableDef};

fn live_table(def: &TableDef) -> LiveTable {
    let mut table = LiveTable::new(def.name);
    table.columns = def
        .columns
        .iter()
        .map(|c| LiveColumn {
            name: c.name.to_string(),
            column_type: c.sql_type.to_string(),
            nullable: c.nullable,
            default: c.default.map(str::to_string),
            key: String::new(),
            extra: String::new(),
        })
        .collect();
    table.indexes.push(LiveIndex {
        name: "PRIMARY".to_string(),
        columns: def.primary_key.iter().map(|c| c.to_string()).collect(),
        unique: true,
    });
    table.indexes.extend(def.indexes.iter().map(|i| LiveIndex {
        name: i.name.to_string(),
        columns: i.columns.iter().map(|c| c.to_string()).collect(),
        unique: i.unique,
    }));
    table.foreign_keys = def
        .foreign_keys
        .iter()
        .map(|fk| LiveForeignKey {
            name: fk.name.to_string(),
            column: fk.column.to_string(),
            ref_table: fk.ref_table.to_string(),
            ref_column: fk.ref_column.to_string(),
        })
        .collect();
    table
}

/// A live schema that matches the catalog exactly.
fn matching_schema() -> LiveSchema {
    LiveSchema {
        database: "payroll_db".to_string(),
        tables: catalog().iter().map(live_table).collect(),
    }
}

fn table_mut<'a>(schema: &'a mut LiveSchema, name: &str) -> &'a mut LiveTable {
    schema
        .tables
        .iter_mut()
        .find(|t| t.name == name)
        .expect("table present")
}

#[cfg(test)]
mod drift_detection_tests {
    use super::*;

    #[test]
    fn test_matching_schema_is_clean() {
        let report = compare(&catalog(), &matching_schema());
        assert!(report.findings.is_empty(), "{:?}", report.findings);
        assert!(report.is_clean());
    }

    #[test]
    fn test_empty_database_reports_only_missing_tables() {
        let live = LiveSchema {
            database: "payroll_db".to_string(),
            tables: Vec::new(),
        };
        let report = compare(&catalog(), &live);

        assert_eq!(report.findings.len(), catalog().len());
        assert!(report
            .findings
            .iter()
            .all(|f| matches!(f, Finding::MissingTable { .. })));
        assert!(!report.is_clean());
        assert_eq!(report.count(Severity::Error), catalog().len());
    }

    #[test]
    fn test_legacy_display_widths_are_not_drift() {
        let mut live = matching_schema();
        let users = table_mut(&mut live, "users");
        for column in users.columns.iter_mut() {
            if column.name == "id" {
                column.column_type = "int(10) unsigned".to_string();
            }
        }
        assert!(compare(&catalog(), &live).is_clean());
    }

    #[test]
    fn test_missing_column_and_type_mismatch() {
        let mut live = matching_schema();
        let employees = table_mut(&mut live, "employees");
        employees.columns.retain(|c| c.name != "department");
        for column in employees.columns.iter_mut() {
            if column.name == "salary" {
                column.column_type = "float".to_string();
            }
        }

        let report = compare(&catalog(), &live);
        assert!(report.findings.contains(&Finding::MissingColumn {
            table: "employees".to_string(),
            column: "department".to_string(),
        }));
        assert!(report.findings.contains(&Finding::TypeMismatch {
            table: "employees".to_string(),
            column: "salary".to_string(),
            expected: "decimal(12,2)".to_string(),
            actual: "float".to_string(),
        }));
    }

    #[test]
    fn test_findings_within_a_table_are_ordered_by_kind() {
        let mut live = matching_schema();
        let employees = table_mut(&mut live, "employees");
        employees.columns.retain(|c| c.name != "status");
        for column in employees.columns.iter_mut() {
            if column.name == "salary" {
                column.column_type = "float".to_string();
            }
        }
        employees.columns.push(LiveColumn {
            name: "badge".to_string(),
            column_type: "varchar(20)".to_string(),
            nullable: true,
            default: None,
            key: String::new(),
            extra: String::new(),
        });
        employees.indexes.retain(|i| i.name == "PRIMARY");

        let report = compare(&catalog(), &live);
        let kinds: Vec<&str> = report
            .for_table("employees")
            .map(|f| match f {
                Finding::MissingColumn { .. } => "missing_column",
                Finding::TypeMismatch { .. } => "type_mismatch",
                Finding::MissingIndex { .. } => "missing_index",
                Finding::UnexpectedColumn { .. } => "unexpected_column",
                other => panic!("unexpected finding {:?}", other),
            })
            .collect();

        let first_index = kinds.iter().position(|k| *k == "missing_index").unwrap();
        assert_eq!(&kinds[..first_index], &["missing_column", "type_mismatch"]);
        assert_eq!(kinds.last(), Some(&"unexpected_column"));
    }

    #[test]
    fn test_myisam_table_is_flagged() {
        let mut live = matching_schema();
        table_mut(&mut live, "transactions").engine = Some("MyISAM".to_string());

        let report = compare(&catalog(), &live);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].severity(), Severity::Warning);
        assert!(matches!(
            &report.findings[0],
            Finding::EngineMismatch { table, .. } if table == "transactions"
        ));
    }

    #[test]
    fn test_companies_alongside_employers_is_duplicate_concept() {
        let mut live = matching_schema();
        live.tables.push(LiveTable::new("companies"));

        let report = compare(&catalog(), &live);
        assert_eq!(
            report.findings,
            vec![Finding::DuplicateConcept {
                table: "employers".to_string(),
                legacy: "companies".to_string(),
                canonical_exists: true,
            }]
        );
    }

    #[test]
    fn test_companies_instead_of_employers() {
        let mut live = matching_schema();
        live.tables.retain(|t| t.name != "employers");
        live.tables.push(LiveTable::new("companies"));

        let findings = compare(&catalog(), &live).findings;
        assert!(findings.contains(&Finding::DuplicateConcept {
            table: "employers".to_string(),
            legacy: "companies".to_string(),
            canonical_exists: false,
        }));
        assert!(findings.contains(&Finding::MissingTable {
            table: "employers".to_string(),
        }));
    }

    #[test]
    fn test_extra_columns_and_tables_are_informational() {
        let mut live = matching_schema();
        table_mut(&mut live, "users").columns.push(LiveColumn {
            name: "legacy_token".to_string(),
            column_type: "varchar(64)".to_string(),
            nullable: true,
            default: None,
            key: String::new(),
            extra: String::new(),
        });
        live.tables.push(LiveTable::new("tmp_import"));

        let report = compare(&catalog(), &live);
        assert_eq!(report.count(Severity::Info), 2);
        assert!(report.is_clean());
        assert!(matches!(
            report.findings.last(),
            Some(Finding::UnknownTable { table }) if table == "tmp_import"
        ));
    }

    #[test]
    fn test_index_matched_by_columns_not_name() {
        let mut live = matching_schema();
        for index in table_mut(&mut live, "users").indexes.iter_mut() {
            if index.name == "uq_users_email" {
                index.name = "email".to_string();
            }
        }
        assert!(compare(&catalog(), &live).is_clean());
    }

    #[test]
    fn test_non_unique_index_does_not_satisfy_unique() {
        let mut live = matching_schema();
        for index in table_mut(&mut live, "plans").indexes.iter_mut() {
            if index.name == "uq_plans_name" {
                index.unique = false;
            }
        }
        let report = compare(&catalog(), &live);
        assert!(report.findings.contains(&Finding::MissingIndex {
            table: "plans".to_string(),
            index: "uq_plans_name".to_string(),
        }));
    }
}

#[cfg(test)]
mod repair_planning_tests {
    use super::*;

    #[test]
    fn test_clean_schema_needs_no_repair() {
        let report = compare(&catalog(), &matching_schema());
        let repair = plan(&catalog(), &report, RepairOptions::default()).unwrap();
        assert!(repair.is_empty());
        assert!(repair.report_only.is_empty());
    }

    #[test]
    fn test_empty_database_creates_every_table_in_dependency_order() {
        let live = LiveSchema::default();
        let tables = catalog();
        let report = compare(&tables, &live);
        let repair = plan(&tables, &report, RepairOptions::default()).unwrap();

        assert_eq!(repair.steps.len(), tables.len());
        let created: Vec<&str> = repair
            .steps
            .iter()
            .map(|s| match s {
                RepairStep::CreateTable { table, .. } => table.as_str(),
                other => panic!("unexpected step {:?}", other),
            })
            .collect();
        let position = |name: &str| created.iter().position(|t| *t == name).unwrap();
        assert!(position("users") < position("employers"));
        assert!(position("employers") < position("jobs"));
        assert!(position("jobs") < position("job_applications"));
        assert!(position("plans") < position("subscriptions"));
    }

    #[test]
    fn test_plan_never_drops() {
        let mut live = matching_schema();
        live.tables.push(LiveTable::new("companies"));
        live.tables.retain(|t| t.name != "jobs");
        table_mut(&mut live, "users").columns.retain(|c| c.name != "phone");
        let report = compare(&catalog(), &live);
        let repair = plan(
            &catalog(),
            &report,
            RepairOptions { allow_modify: true },
        )
        .unwrap();

        for step in &repair.steps {
            assert!(!step.sql().to_uppercase().contains("DROP"), "{}", step.sql());
        }
        assert!(repair
            .report_only
            .iter()
            .any(|f| matches!(f, Finding::DuplicateConcept { .. })));
    }

    #[test]
    fn test_added_column_is_placed_after_its_predecessor() {
        let mut live = matching_schema();
        table_mut(&mut live, "users").columns.retain(|c| c.name != "phone");
        let report = compare(&catalog(), &live);
        let repair = plan(&catalog(), &report, RepairOptions::default()).unwrap();

        assert_eq!(
            repair.steps,
            vec![RepairStep::AddColumn {
                table: "users".to_string(),
                column: "phone".to_string(),
                sql: "ALTER TABLE `users` ADD COLUMN `phone` varchar(30) NULL AFTER `role`"
                    .to_string(),
            }]
        );
    }

    #[test]
    fn test_missing_primary_key_column_is_report_only() {
        let mut live = matching_schema();
        let employees = table_mut(&mut live, "employees");
        employees.columns.retain(|c| c.name != "id" && c.name != "department");
        employees.indexes.retain(|i| i.name != "PRIMARY");
        let report = compare(&catalog(), &live);
        let repair = plan(&catalog(), &report, RepairOptions::default()).unwrap();

        assert!(repair.steps.iter().all(|s| !s.sql().contains("AUTO_INCREMENT")));
        assert!(repair.steps.iter().any(|s| matches!(
            s,
            RepairStep::AddColumn { column, .. } if column == "department"
        )));
        assert!(repair.report_only.contains(&Finding::MissingColumn {
            table: "employees".to_string(),
            column: "id".to_string(),
        }));
        assert!(repair
            .report_only
            .iter()
            .any(|f| matches!(f, Finding::MissingPrimaryKey { .. })));
    }

    #[test]
    fn test_steps_are_ordered_by_phase() {
        let mut live = matching_schema();
        live.tables.retain(|t| t.name != "bill_companies");
        let jobs = table_mut(&mut live, "jobs");
        jobs.foreign_keys.clear();
        jobs.columns.retain(|c| c.name != "location");
        table_mut(&mut live, "credits").engine = Some("MyISAM".to_string());

        let report = compare(&catalog(), &live);
        let repair = plan(&catalog(), &report, RepairOptions::default()).unwrap();
        let kinds: Vec<&str> = repair
            .steps
            .iter()
            .map(|s| match s {
                RepairStep::CreateTable { .. } => "create",
                RepairStep::ConvertEngine { .. } => "engine",
                RepairStep::AddColumn { .. } => "column",
                RepairStep::ModifyColumn { .. } => "modify",
                RepairStep::AddIndex { .. } => "index",
                RepairStep::AddForeignKey { .. } => "fk",
            })
            .collect();
        assert_eq!(kinds, vec!["create", "engine", "column", "fk"]);
    }

    #[test]
    fn test_type_mismatch_is_report_only_by_default() {
        let mut live = matching_schema();
        for column in table_mut(&mut live, "employees").columns.iter_mut() {
            if column.name == "salary" {
                column.column_type = "float".to_string();
                column.nullable = true;
            }
        }
        let report = compare(&catalog(), &live);

        let cautious = plan(&catalog(), &report, RepairOptions::default()).unwrap();
        assert!(cautious.is_empty());
        assert_eq!(cautious.report_only.len(), 2);

        let modifying = plan(&catalog(), &report, RepairOptions { allow_modify: true }).unwrap();
        assert_eq!(
            modifying.steps,
            vec![RepairStep::ModifyColumn {
                table: "employees".to_string(),
                column: "salary".to_string(),
                sql: "ALTER TABLE `employees` MODIFY COLUMN `salary` decimal(12,2) NOT NULL DEFAULT 0.00"
                    .to_string(),
            }]
        );
    }

    #[test]
    fn test_missing_foreign_key_renders_constraint() {
        let mut live = matching_schema();
        table_mut(&mut live, "subscriptions")
            .foreign_keys
            .retain(|fk| fk.ref_table != "plans");
        let report = compare(&catalog(), &live);
        let repair = plan(&catalog(), &report, RepairOptions::default()).unwrap();

        assert_eq!(repair.steps.len(), 1);
        assert!(repair.steps[0].is_foreign_key());
        assert_eq!(
            repair.steps[0].sql(),
            "ALTER TABLE `subscriptions` ADD CONSTRAINT `fk_subscriptions_plan` FOREIGN KEY (`plan_id`) REFERENCES `plans` (`id`) ON DELETE RESTRICT"
        );
    }
}
