//! Dashboard view models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Aggregated dashboard view for a subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    /// Subscription the overview covers
    pub subscription_id: String,

    /// Number of days the aggregation covers
    pub period_days: i64,

    /// Headline totals
    pub summary: CostSummary,

    /// Cost per service, highest first
    pub by_service: Vec<ServiceCost>,

    /// Cost per resource group, highest first
    pub by_resource_group: Vec<ResourceGroupCost>,

    /// Configured alert state for the subscription
    pub alerts_overview: AlertsOverview,

    /// Provenance of the cached data backing this view
    pub data_quality: DataQuality,

    /// Operator-facing observations about the spend profile
    pub recommendations: Vec<String>,
}

/// Headline cost totals
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSummary {
    /// Total cost over the period
    pub total: f64,

    /// Average cost per day with data
    pub average_daily: f64,

    /// ISO currency code
    pub currency: String,
}

/// Cost attributed to one service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCost {
    /// Service name
    pub service: String,

    /// Cost for the service over the period
    pub cost: f64,

    /// Share of the period total, 0 when the total is 0
    pub percentage: f64,

    /// Distinct resources contributing to the cost
    pub resource_count: usize,
}

/// Cost attributed to one resource group
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroupCost {
    /// Resource group name
    pub resource_group: String,

    /// Cost for the group over the period
    pub cost: f64,

    /// Share of the period total, 0 when the total is 0
    pub percentage: f64,
}

/// Alert state summary for the dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsOverview {
    /// Alerts configured for the subscription
    pub total: usize,

    /// Alerts currently active
    pub active: usize,

    /// Alerts whose last recorded spend is over their threshold
    pub breached: usize,
}

/// Provenance of the cached cost data
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuality {
    /// Number of stored records aggregated
    pub record_count: usize,

    /// Earliest record date, if any
    pub earliest_date: Option<NaiveDate>,

    /// Latest record date, if any
    pub latest_date: Option<NaiveDate>,

    /// When the backing data was last written
    pub last_updated: Option<DateTime<Utc>>,
}
