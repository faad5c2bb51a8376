//! Cost record and snapshot data models

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single day's cost for one resource within a subscription.
///
/// Identity is the composite `(subscription_id, date, resource_id)`. Records
/// are immutable once written for a day; a re-fetch overwrites them via
/// last-writer-wins upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostRecord {
    /// Subscription this cost belongs to
    pub subscription_id: String,

    /// Day the cost was incurred
    pub date: NaiveDate,

    /// Summed cost for the resource on this day
    pub total_cost: f64,

    /// ISO currency code
    pub currency: String,

    /// Resource group containing the resource
    pub resource_group: String,

    /// Service (resource type) the cost is attributed to
    pub service_name: String,

    /// Fully qualified resource identifier
    pub resource_id: String,

    /// Short name extracted from the resource id
    pub resource_name: String,

    /// Resource tags
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

impl CostRecord {
    /// First day of the calendar month containing this record's date.
    /// The budget period is derived from `date`, never stored.
    pub fn month_start(&self) -> NaiveDate {
        first_of_month(self.date)
    }
}

/// First day of the calendar month containing `date`
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    // with_day(1) cannot fail for day 1
    date.with_day(1).unwrap_or(date)
}

/// Extract the trailing segment of a fully qualified resource id
pub fn resource_name_from_id(resource_id: &str) -> String {
    resource_id
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// The most recently fetched cost set for a subscription, kept in the cache
/// and served as a fallback when the billing API is unavailable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSnapshot {
    /// Subscription the snapshot covers
    pub subscription_id: String,

    /// Records in the snapshot
    pub records: Vec<CostRecord>,

    /// Sum of all record costs
    pub total_cost: f64,

    /// ISO currency code
    pub currency: String,

    /// When the snapshot was fetched
    pub cached_at: DateTime<Utc>,

    /// Operator-facing notes about the snapshot (fallbacks, empty periods)
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl CostSnapshot {
    /// Build a snapshot from freshly fetched records
    pub fn from_records(subscription_id: impl Into<String>, records: Vec<CostRecord>) -> Self {
        let total_cost = records.iter().map(|r| r.total_cost).sum();
        let currency = records
            .first()
            .map(|r| r.currency.clone())
            .unwrap_or_else(|| "USD".to_string());

        Self {
            subscription_id: subscription_id.into(),
            records,
            total_cost,
            currency,
            cached_at: Utc::now(),
            recommendations: Vec::new(),
        }
    }

    /// A zeroed snapshot carrying a note explaining why no data is available
    pub fn empty_with_note(subscription_id: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            records: Vec::new(),
            total_cost: 0.0,
            currency: "USD".to_string(),
            cached_at: Utc::now(),
            recommendations: vec![note.into()],
        }
    }

    /// Age of the snapshot relative to `now`
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.cached_at
    }
}
