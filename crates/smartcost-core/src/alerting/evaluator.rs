//! Budget alert evaluation
//!
//! Compares month-to-date spend against each active budget alert after a
//! collection run. Evaluation itself is pure: the same stored records and
//! alert configs always yield the same triggered set, so a re-run only risks
//! duplicate notifications, never divergent state.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::db::CostRepository;
use crate::error::Result;
use crate::models::{first_of_month, BudgetAlert, CostRecord, TriggeredAlert};

use super::repository::AlertRepository;

/// Evaluates budget alerts against freshly saved cost records
#[derive(Clone)]
pub struct AlertEvaluator {
    alert_repo: AlertRepository,
    cost_repo: CostRepository,
}

impl AlertEvaluator {
    /// Create a new alert evaluator
    pub fn new(alert_repo: AlertRepository, cost_repo: CostRepository) -> Self {
        Self {
            alert_repo,
            cost_repo,
        }
    }

    /// Evaluate all active alerts for every subscription present in
    /// `saved_records`, returning the triggered set.
    ///
    /// The budget period is the calendar month containing the newest saved
    /// record date for the subscription; `current_spend` is recomputed from
    /// the stored records in that month, never accumulated incrementally.
    /// A failure on one alert is logged and never aborts the rest.
    pub async fn evaluate(&self, saved_records: &[CostRecord]) -> Result<Vec<TriggeredAlert>> {
        let mut triggered = Vec::new();

        for subscription_id in CostRepository::subscriptions_in(saved_records) {
            let Some(latest_date) = saved_records
                .iter()
                .filter(|r| r.subscription_id == subscription_id)
                .map(|r| r.date)
                .max()
            else {
                continue;
            };

            let month_start = first_of_month(latest_date);
            let current_spend = self
                .cost_repo
                .month_to_date_total(&subscription_id, month_start)
                .await?;

            let alerts = self
                .alert_repo
                .list_active_for_subscription(&subscription_id)
                .await?;

            debug!(
                subscription_id,
                %month_start,
                current_spend,
                alert_count = alerts.len(),
                "evaluating budget alerts"
            );

            let now = Utc::now();
            for alert in alerts {
                if let Err(e) = self
                    .alert_repo
                    .record_evaluation(alert.id, current_spend, now)
                    .await
                {
                    error!(alert_id = %alert.id, error = %e, "failed to record evaluation");
                    continue;
                }

                if let Some(event) = evaluate_alert(&alert, current_spend, now) {
                    info!(
                        alert_id = %alert.id,
                        subscription_id,
                        actual = event.actual_value,
                        threshold = event.threshold_value,
                        "budget alert triggered"
                    );
                    triggered.push(event);
                }
            }
        }

        Ok(triggered)
    }
}

/// Pure threshold check for a single alert.
///
/// Fires when spend as a percentage of budget reaches the threshold. A
/// non-positive budget always fires: a zero budget means any spend is over
/// budget, and guarding here keeps the percentage math division-safe.
pub fn evaluate_alert(
    alert: &BudgetAlert,
    current_spend: f64,
    now: DateTime<Utc>,
) -> Option<TriggeredAlert> {
    if !alert.is_breached(current_spend) {
        return None;
    }

    Some(TriggeredAlert {
        alert_id: alert.id,
        subscription_id: alert.subscription_id.clone(),
        alert_name: alert.name.clone(),
        notify_email: alert.notify_email.clone(),
        actual_value: alert.spend_percent(current_spend),
        threshold_value: alert.threshold_percent,
        current_spend,
        budget_amount: alert.amount,
        triggered_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use uuid::Uuid;

    fn alert(amount: f64, threshold: f64) -> BudgetAlert {
        BudgetAlert {
            id: Uuid::new_v4(),
            subscription_id: "sub-1".to_string(),
            name: "monthly budget".to_string(),
            amount,
            current_spend: 0.0,
            threshold_percent: threshold,
            notify_email: "ops@example.com".to_string(),
            is_active: true,
            created_at: Utc::now(),
            last_checked_at: None,
        }
    }

    #[test]
    fn fires_at_85_percent_of_100_budget() {
        let a = alert(100.0, 80.0);
        let event = evaluate_alert(&a, 85.0, Utc::now()).expect("should trigger");
        assert_eq!(event.actual_value, 85.0);
        assert_eq!(event.threshold_value, 80.0);
        assert_eq!(event.current_spend, 85.0);
        assert_eq!(event.budget_amount, 100.0);
    }

    #[rstest]
    #[case(79.99, false)]
    #[case(80.0, true)]
    #[case(80.01, true)]
    fn threshold_boundary(#[case] spend: f64, #[case] fires: bool) {
        let a = alert(100.0, 80.0);
        assert_eq!(evaluate_alert(&a, spend, Utc::now()).is_some(), fires);
    }

    #[test]
    fn zero_budget_always_fires() {
        let a = alert(0.0, 80.0);
        let event = evaluate_alert(&a, 0.0, Utc::now()).expect("zero budget triggers");
        assert_eq!(event.actual_value, 100.0);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let a = alert(200.0, 50.0);
        let now = Utc::now();
        let first = evaluate_alert(&a, 120.0, now);
        let second = evaluate_alert(&a, 120.0, now);
        assert_eq!(first, second);
    }

    #[test]
    fn message_names_the_alert_and_subscription() {
        let a = alert(100.0, 80.0);
        let event = evaluate_alert(&a, 85.0, Utc::now()).expect("should trigger");
        let message = event.message();
        assert!(message.contains("monthly budget"));
        assert!(message.contains("sub-1"));
        assert!(message.contains("85.0%"));
    }
}
