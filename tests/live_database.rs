use std::env;

use payroll_db::config::DbConfig;
use payroll_db::db::Database;
use payroll_db::repair::{self, RepairOptions};
use payroll_db::{drift, inspect, query, schema, seed};

/// Builds a config for a disposable test database.
/// Marked ignored to avoid running against a real payroll database by accident;
/// set TEST_DB_NAME (plus the usual DB_* variables) to run.
fn test_config() -> anyhow::Result<DbConfig> {
    let name = env::var("TEST_DB_NAME")
        .map_err(|_| anyhow::anyhow!("Set TEST_DB_NAME to run this test"))?;
    let mut config = DbConfig::from_env()?;
    config.database = name;
    Ok(config)
}

#[tokio::test]
#[ignore]
async fn repair_converges_and_is_rerunnable() -> anyhow::Result<()> {
    let db = Database::connect(&test_config()?).await?;
    let catalog = schema::catalog();

    for _ in 0..2 {
        let live = inspect::snapshot(&db).await?;
        let report = drift::compare(&catalog, &live);
        let plan = repair::plan(&catalog, &report, RepairOptions::default())?;
        let outcome = repair::apply(&db, &plan, false).await?;
        assert!(outcome.is_success());
    }

    let live = inspect::snapshot(&db).await?;
    let report = drift::compare(&catalog, &live);
    assert!(
        report.for_table("users").next().is_none(),
        "{:?}",
        report.findings
    );

    let first = seed::seed_default_plans(&db).await?;
    let second = seed::seed_default_plans(&db).await?;
    assert!(first <= seed::DEFAULT_PLANS.len() as u64);
    assert_eq!(second, 0);

    let result = query::run_read_only(&db, "SELECT name FROM plans ORDER BY name").await?;
    assert_eq!(result.columns, vec!["name"]);
    assert!(result.rows.len() >= seed::DEFAULT_PLANS.len());

    db.close().await;
    Ok(())
}

#[tokio::test]
#[ignore]
async fn describe_unknown_table_is_not_found() -> anyhow::Result<()> {
    let db = Database::connect(&test_config()?).await?;
    let err = inspect::describe_table(&db, "definitely_not_a_table")
        .await
        .unwrap_err();
    assert!(matches!(err, payroll_db::errors::AppError::NotFound(_)));
    db.close().await;
    Ok(())
}

#[tokio::test]
#[ignore]
async fn foreign_key_checks_are_restored_after_a_failed_step() -> anyhow::Result<()> {
    let db = Database::connect(&test_config()?).await?;
    let plan = repair::RepairPlan {
        steps: vec![repair::RepairStep::AddForeignKey {
            table: "no_such_table_for_fk".to_string(),
            constraint: "fk_missing".to_string(),
            sql: "ALTER TABLE `no_such_table_for_fk` ADD CONSTRAINT `fk_missing` FOREIGN KEY (`user_id`) REFERENCES `users` (`id`)".to_string(),
        }],
        report_only: Vec::new(),
    };

    let outcome = repair::apply(&db, &plan, false).await?;
    assert!(!outcome.is_success());

    let (checks,): (i64,) = sqlx::query_as("SELECT CAST(@@FOREIGN_KEY_CHECKS AS SIGNED)")
        .fetch_one(&db.pool)
        .await?;
    assert_eq!(checks, 1);

    db.close().await;
    Ok(())
}

#[tokio::test]
#[ignore]
async fn decimal_and_time_values_are_printable() -> anyhow::Result<()> {
    let db = Database::connect(&test_config()?).await?;
    let result = query::run_read_only(
        &db,
        "SELECT CAST(1234.50 AS DECIMAL(12,2)) AS amount, CAST('10:30:00' AS TIME) AS shift_start",
    )
    .await?;

    assert_eq!(result.columns, vec!["amount", "shift_start"]);
    assert_eq!(
        result.rows,
        vec![vec![Some("1234.50".to_string()), Some("10:30:00".to_string())]]
    );

    db.close().await;
    Ok(())
}
