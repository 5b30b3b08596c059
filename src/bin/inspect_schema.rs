//! Utility to inspect the database schema and print table structures.

use payroll_db::config::DbConfig;
use payroll_db::db::Database;
use payroll_db::errors::AppError;
use payroll_db::inspect;

async fn print_schema(db: &Database) -> Result<(), AppError> {
    let tables = inspect::list_tables(db).await?;

    println!("Found {} tables in `{}`:", tables.len(), db.database);
    for table in &tables {
        println!(
            "- {} ({})",
            table.table_name,
            table.engine.as_deref().unwrap_or("?")
        );

        for column in inspect::describe_table(db, &table.table_name).await? {
            let null = if column.nullable { " NULL" } else { "" };
            println!("  - {}: {}{}", column.name, column.column_type, null);
        }
        println!();
    }
    Ok(())
}

/// Main entry point for the schema inspection utility.
///
/// Connects to the configured database and lists every base table with its columns.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = DbConfig::from_env()?;
    let db = Database::connect(&config).await?;

    let result = print_schema(&db).await;
    db.close().await;
    Ok(result?)
}
