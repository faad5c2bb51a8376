//! Budget alert data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// A configured budget alert for a subscription.
///
/// `current_spend` and `last_checked_at` are recomputed by the evaluator on
/// every collection cycle; everything else is user-owned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetAlert {
    /// Unique identifier
    pub id: Uuid,

    /// Subscription the budget applies to
    pub subscription_id: String,

    /// Human-readable name
    pub name: String,

    /// Budget amount for the calendar month
    pub amount: f64,

    /// Month-to-date spend as of the last evaluation
    pub current_spend: f64,

    /// Percentage of `amount` at which the alert fires, in (0, 100]
    pub threshold_percent: f64,

    /// Recipient for alert notifications
    pub notify_email: String,

    /// Whether the alert participates in evaluation
    pub is_active: bool,

    /// When the alert was created
    pub created_at: DateTime<Utc>,

    /// Last time the evaluator checked this alert
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl BudgetAlert {
    /// Percentage of the budget consumed by `spend`.
    ///
    /// A non-positive budget always reads as fully consumed: a zero budget
    /// means any spend at all is over budget, so such alerts always fire.
    pub fn spend_percent(&self, spend: f64) -> f64 {
        if self.amount <= 0.0 {
            return 100.0;
        }
        spend / self.amount * 100.0
    }

    /// Whether `spend` puts this alert over its threshold
    pub fn is_breached(&self, spend: f64) -> bool {
        self.spend_percent(spend) >= self.threshold_percent
    }
}

/// Input for creating a budget alert
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetAlertInput {
    pub subscription_id: String,
    pub name: String,
    pub amount: f64,
    pub threshold_percent: Option<f64>,
    pub notify_email: String,
    pub is_active: Option<bool>,
}

impl BudgetAlertInput {
    /// Validate invariants: amount > 0, threshold in (0, 100]
    pub fn validate(&self) -> Result<()> {
        if self.subscription_id.trim().is_empty() {
            return Err(Error::validation("subscriptionId must not be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(Error::validation("name must not be empty"));
        }
        if self.amount <= 0.0 {
            return Err(Error::validation("amount must be greater than zero"));
        }
        if let Some(t) = self.threshold_percent {
            if t <= 0.0 || t > 100.0 {
                return Err(Error::validation(
                    "thresholdPercent must be in (0, 100]",
                ));
            }
        }
        if self.notify_email.trim().is_empty() || !self.notify_email.contains('@') {
            return Err(Error::validation("notifyEmail must be a valid address"));
        }
        Ok(())
    }

    /// Materialize a new alert with generated id and timestamps
    pub fn into_alert(self) -> BudgetAlert {
        BudgetAlert {
            id: Uuid::new_v4(),
            subscription_id: self.subscription_id,
            name: self.name,
            amount: self.amount,
            current_spend: 0.0,
            threshold_percent: self.threshold_percent.unwrap_or(80.0),
            notify_email: self.notify_email,
            is_active: self.is_active.unwrap_or(true),
            created_at: Utc::now(),
            last_checked_at: None,
        }
    }
}

/// A breached budget alert produced by one evaluation run.
///
/// Transient: consumed once by the dispatcher, not persisted beyond delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggeredAlert {
    /// The alert that fired
    pub alert_id: Uuid,

    /// Subscription the alert belongs to
    pub subscription_id: String,

    /// Name of the alert, for the notification body
    pub alert_name: String,

    /// Recipient address
    pub notify_email: String,

    /// Observed spend as a percentage of the budget
    pub actual_value: f64,

    /// Threshold percentage that was crossed
    pub threshold_value: f64,

    /// Month-to-date spend at evaluation time
    pub current_spend: f64,

    /// Configured budget amount
    pub budget_amount: f64,

    /// When the evaluation fired
    pub triggered_at: DateTime<Utc>,
}

impl TriggeredAlert {
    /// Notification body for the email
    pub fn message(&self) -> String {
        format!(
            "Budget '{}' for subscription {} reached {:.1}% of its {:.2} budget \
             (month-to-date spend {:.2}, threshold {:.0}%). \
             Review your resources and consider cost optimization.",
            self.alert_name,
            self.subscription_id,
            self.actual_value,
            self.budget_amount,
            self.current_spend,
            self.threshold_value,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(amount: f64, threshold: f64) -> BudgetAlert {
        BudgetAlert {
            id: Uuid::new_v4(),
            subscription_id: "sub-1".to_string(),
            name: "monthly".to_string(),
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
    fn breach_at_threshold() {
        let a = alert(100.0, 80.0);
        assert!(a.is_breached(85.0));
        assert!(a.is_breached(80.0));
        assert!(!a.is_breached(79.99));
    }

    #[test]
    fn zero_budget_always_breached() {
        let a = alert(0.0, 80.0);
        assert!(a.is_breached(0.0));
        assert!(a.is_breached(0.01));
        assert_eq!(a.spend_percent(50.0), 100.0);
    }

    #[test]
    fn input_validation() {
        let input = BudgetAlertInput {
            subscription_id: "sub-1".to_string(),
            name: "monthly".to_string(),
            amount: 100.0,
            threshold_percent: Some(80.0),
            notify_email: "ops@example.com".to_string(),
            is_active: None,
        };
        assert!(input.validate().is_ok());

        let mut bad = input.clone();
        bad.amount = 0.0;
        assert!(bad.validate().is_err());

        let mut bad = input.clone();
        bad.threshold_percent = Some(101.0);
        assert!(bad.validate().is_err());

        let mut bad = input.clone();
        bad.notify_email = "not-an-address".to_string();
        assert!(bad.validate().is_err());

        let mut bad = input;
        bad.subscription_id = "  ".to_string();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn input_defaults() {
        let alert = BudgetAlertInput {
            subscription_id: "sub-1".to_string(),
            name: "monthly".to_string(),
            amount: 250.0,
            threshold_percent: None,
            notify_email: "ops@example.com".to_string(),
            is_active: None,
        }
        .into_alert();

        assert_eq!(alert.threshold_percent, 80.0);
        assert!(alert.is_active);
        assert_eq!(alert.current_spend, 0.0);
        assert!(alert.last_checked_at.is_none());
    }
}
