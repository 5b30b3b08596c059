use serde::Serialize;

use crate::db::Database;
use crate::errors::{AppError, ResultExt, SqlErrorKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanSeed {
    pub name: &'static str,
    pub price: f64,
    pub credits: u32,
    pub duration_days: u32,
}

pub const DEFAULT_PLANS: &[PlanSeed] = &[
    PlanSeed {
        name: "Free",
        price: 0.0,
        credits: 5,
        duration_days: 30,
    },
    PlanSeed {
        name: "Basic",
        price: 29.0,
        credits: 50,
        duration_days: 30,
    },
    PlanSeed {
        name: "Premium",
        price: 99.0,
        credits: 250,
        duration_days: 30,
    },
];

/// Inserts the default subscription plans; existing names are left alone.
/// Returns the number of rows actually inserted.
pub async fn seed_default_plans(db: &Database) -> Result<u64, AppError> {
    let mut tx = db.pool.begin().await.context("Failed to start transaction")?;
    let mut inserted = 0;

    for plan in DEFAULT_PLANS {
        let result = sqlx::query(
            "INSERT IGNORE INTO plans (name, price, credits, duration_days) VALUES (?, ?, ?, ?)",
        )
        .bind(plan.name)
        .bind(plan.price)
        .bind(plan.credits)
        .bind(plan.duration_days)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from);

        match result {
            Ok(r) => {
                if r.rows_affected() == 0 {
                    tracing::debug!("Plan {} already present", plan.name);
                }
                inserted += r.rows_affected();
            }
            Err(e) if e.sql_kind() == SqlErrorKind::NoSuchTable => {
                return Err(e).context("Table `plans` does not exist; run `repair` first");
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to insert plan {}", plan.name)),
        }
    }

    tx.commit().await.context("Failed to commit plans")?;
    tracing::info!("Seeded {} plan(s)", inserted);

    Ok(inserted)
}
