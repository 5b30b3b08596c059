use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use payroll_db::config::DbConfig;
use payroll_db::db::Database;
use payroll_db::repair::RepairOptions;
use payroll_db::{drift, inspect, query, repair, report, schema, seed};

#[derive(Parser)]
#[command(name = "payroll-db")]
#[command(about = "Diagnostics and additive schema repair for the payroll database")]
struct Cli {
    /// Print results as JSON instead of text tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check connectivity and print the server version
    Ping,

    /// List tables with engine and estimated row count
    Tables,

    /// Show the columns of a table (like DESCRIBE)
    Describe {
        table: String,
    },

    /// Show the indexes of a table
    Indexes {
        table: String,
    },

    /// Show the foreign keys of a table
    ForeignKeys {
        table: String,
    },

    /// Exact row count for every table
    Counts,

    /// Run a single read-only statement (SELECT, SHOW, DESCRIBE, EXPLAIN, WITH)
    Query {
        sql: String,
    },

    /// Print the canonical DDL in creation order (no database needed)
    Ddl {
        /// Only this table (canonical name or legacy alias)
        table: Option<String>,
    },

    /// Compare the live schema with the catalog
    Drift {
        /// Exit with status 2 when warnings or errors are found
        #[arg(long)]
        fail_on_drift: bool,
    },

    /// Apply additive repairs for detected drift
    Repair {
        /// Print the planned statements without executing them
        #[arg(long)]
        dry_run: bool,

        /// Also change column types and nullability to match the catalog
        #[arg(long)]
        allow_modify: bool,
    },

    /// Insert the default subscription plans if missing
    SeedPlans,
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", text(value));
    }
    Ok(())
}

fn print_ddl(json: bool, table: Option<&str>) -> Result<ExitCode> {
    let catalog = schema::catalog();
    let ordered = schema::creation_order(&catalog)?;

    let selected: Vec<&schema::TableDef> = match table {
        Some(name) => {
            let def = schema::table(name)
                .with_context(|| format!("`{}` is not in the schema catalog", name))?;
            ordered.into_iter().filter(|t| t.name == def.name).collect()
        }
        None => ordered,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&selected)?);
    } else {
        for def in selected {
            println!("{};\n", def.create_sql());
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn execute(db: &Database, command: &Commands, json: bool) -> Result<ExitCode> {
    match command {
        Commands::Ping => {
            let info = db.server_info().await?;
            emit(json, &info, |i| {
                format!(
                    "MySQL {} - database `{}`\n",
                    i.version,
                    i.database.as_deref().unwrap_or("<none>")
                )
            })?;
        }
        Commands::Tables => {
            let tables = inspect::list_tables(db).await?;
            emit(json, &tables, |t| report::tables_text(t))?;
        }
        Commands::Describe { table } => {
            let columns = inspect::describe_table(db, table).await?;
            emit(json, &columns, |c| report::columns_text(c))?;
        }
        Commands::Indexes { table } => {
            let indexes = inspect::list_indexes(db, table).await?;
            emit(json, &indexes, |i| report::indexes_text(i))?;
        }
        Commands::ForeignKeys { table } => {
            let fks = inspect::list_foreign_keys(db, table).await?;
            emit(json, &fks, |f| report::foreign_keys_text(f))?;
        }
        Commands::Counts => {
            let counts = inspect::row_counts(db).await?;
            emit(json, &counts, |c| report::counts_text(c))?;
        }
        Commands::Query { sql } => {
            let result = query::run_read_only(db, sql).await?;
            emit(json, &result, report::query_text)?;
        }
        Commands::Drift { fail_on_drift } => {
            let live = inspect::snapshot(db).await?;
            let drift_report = drift::compare(&schema::catalog(), &live);
            emit(json, &drift_report, report::drift_text)?;

            if *fail_on_drift && !drift_report.is_clean() {
                return Ok(ExitCode::from(2));
            }
        }
        Commands::Repair {
            dry_run,
            allow_modify,
        } => {
            let catalog = schema::catalog();
            let live = inspect::snapshot(db).await?;
            let drift_report = drift::compare(&catalog, &live);
            let plan = repair::plan(
                &catalog,
                &drift_report,
                RepairOptions {
                    allow_modify: *allow_modify,
                },
            )?;

            let outcome = repair::apply(db, &plan, *dry_run).await?;
            let summary = report::RepairSummary {
                plan: &plan,
                outcome: &outcome,
            };
            emit(json, &summary, report::repair_text)?;

            if let Some(failed) = outcome.failed() {
                anyhow::bail!("repair stopped at: {}", failed.step.describe());
            }
        }
        Commands::SeedPlans => {
            let inserted = seed::seed_default_plans(db).await?;
            emit(json, &inserted, |n| format!("Inserted {} plan(s)\n", n))?;
        }
        Commands::Ddl { .. } => unreachable!("ddl is printed without a connection"),
    }

    Ok(ExitCode::SUCCESS)
}

async fn run(cli: Cli) -> Result<ExitCode> {
    if let Commands::Ddl { table } = &cli.command {
        return print_ddl(cli.json, table.as_deref());
    }

    let config = DbConfig::from_env()?;
    let db = Database::connect(&config).await?;

    let result = execute(&db, &cli.command, cli.json).await;
    db.close().await;
    result
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "payroll_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
