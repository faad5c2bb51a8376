//! Repository for budget alert configuration

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::PostgresPool;
use crate::error::Result;
use crate::models::{BudgetAlert, BudgetAlertInput};

/// Repository for budget alerts
#[derive(Clone)]
pub struct AlertRepository {
    pool: PgPool,
}

impl AlertRepository {
    /// Create a new alert repository
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool().clone(),
        }
    }

    /// Create a new budget alert from validated input
    pub async fn create(&self, input: BudgetAlertInput) -> Result<BudgetAlert> {
        input.validate()?;
        let alert = input.into_alert();

        sqlx::query(
            r#"
            INSERT INTO budget_alerts (
                id, subscription_id, name, amount, current_spend,
                threshold_percent, notify_email, is_active, created_at, last_checked_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(alert.id)
        .bind(&alert.subscription_id)
        .bind(&alert.name)
        .bind(alert.amount)
        .bind(alert.current_spend)
        .bind(alert.threshold_percent)
        .bind(&alert.notify_email)
        .bind(alert.is_active)
        .bind(alert.created_at)
        .bind(alert.last_checked_at)
        .execute(&self.pool)
        .await?;

        Ok(alert)
    }

    /// Get an alert by ID
    pub async fn get(&self, id: Uuid) -> Result<Option<BudgetAlert>> {
        let row = sqlx::query_as::<_, BudgetAlertRow>(
            "SELECT * FROM budget_alerts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }

    /// List alerts for a subscription, newest first
    pub async fn list_for_subscription(&self, subscription_id: &str) -> Result<Vec<BudgetAlert>> {
        let rows = sqlx::query_as::<_, BudgetAlertRow>(
            r#"
            SELECT * FROM budget_alerts
            WHERE subscription_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// List active alerts for a subscription
    pub async fn list_active_for_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<BudgetAlert>> {
        let rows = sqlx::query_as::<_, BudgetAlertRow>(
            r#"
            SELECT * FROM budget_alerts
            WHERE subscription_id = $1 AND is_active = true
            ORDER BY created_at DESC
            "#,
        )
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Delete an alert
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM budget_alerts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Record an evaluation pass: refresh the derived spend and check time
    pub async fn record_evaluation(
        &self,
        id: Uuid,
        current_spend: f64,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE budget_alerts SET current_spend = $2, last_checked_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(current_spend)
        .bind(checked_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct BudgetAlertRow {
    id: Uuid,
    subscription_id: String,
    name: String,
    amount: f64,
    current_spend: f64,
    threshold_percent: f64,
    notify_email: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    last_checked_at: Option<DateTime<Utc>>,
}

impl From<BudgetAlertRow> for BudgetAlert {
    fn from(row: BudgetAlertRow) -> Self {
        BudgetAlert {
            id: row.id,
            subscription_id: row.subscription_id,
            name: row.name,
            amount: row.amount,
            current_spend: row.current_spend,
            threshold_percent: row.threshold_percent,
            notify_email: row.notify_email,
            is_active: row.is_active,
            created_at: row.created_at,
            last_checked_at: row.last_checked_at,
        }
    }
}
