//! Dashboard aggregation
//!
//! Reshapes stored cost records into the summary/trend views served to the
//! UI. Pure grouping and percentage math over data already in the store; no
//! outbound calls.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::{BTreeMap, BTreeSet};

use crate::db::CostRepository;
use crate::error::Result;
use crate::models::{
    AlertsOverview, BudgetAlert, CostRecord, CostSummary, DashboardOverview, DataQuality,
    ResourceGroupCost, ServiceCost,
};

/// Builds dashboard views from the cost store
#[derive(Clone)]
pub struct DashboardService {
    cost_repo: CostRepository,
}

impl DashboardService {
    /// Create a new dashboard service
    pub fn new(cost_repo: CostRepository) -> Self {
        Self { cost_repo }
    }

    /// Aggregate the stored records for a subscription over the trailing
    /// `period_days` into an overview.
    pub async fn get_overview(
        &self,
        subscription_id: &str,
        period_days: i64,
        alerts: &[BudgetAlert],
    ) -> Result<DashboardOverview> {
        let since = Utc::now().date_naive() - ChronoDuration::days(period_days);
        let records = self.cost_repo.records_since(subscription_id, since).await?;
        let last_updated = self.cost_repo.last_updated(subscription_id).await?;

        Ok(overview(
            subscription_id,
            period_days,
            &records,
            alerts,
            last_updated,
        ))
    }
}

/// Pure aggregation over a record set.
///
/// The percentage denominator is guarded: with a zero total every share is
/// 0%, never a division error. Zero records produce a zeroed summary and
/// empty breakdowns.
pub fn overview(
    subscription_id: &str,
    period_days: i64,
    records: &[CostRecord],
    alerts: &[BudgetAlert],
    last_updated: Option<DateTime<Utc>>,
) -> DashboardOverview {
    let total: f64 = records.iter().map(|r| r.total_cost).sum();
    let currency = records
        .first()
        .map(|r| r.currency.clone())
        .unwrap_or_else(|| "USD".to_string());

    let distinct_days = {
        let mut days: Vec<_> = records.iter().map(|r| r.date).collect();
        days.sort_unstable();
        days.dedup();
        days.len()
    };
    let average_daily = if distinct_days == 0 {
        0.0
    } else {
        total / distinct_days as f64
    };

    let by_service = service_breakdown(records, total);
    let by_resource_group = resource_group_breakdown(records, total);

    let alerts_overview = AlertsOverview {
        total: alerts.len(),
        active: alerts.iter().filter(|a| a.is_active).count(),
        breached: alerts
            .iter()
            .filter(|a| a.is_active && a.is_breached(a.current_spend))
            .count(),
    };

    let data_quality = DataQuality {
        record_count: records.len(),
        earliest_date: records.iter().map(|r| r.date).min(),
        latest_date: records.iter().map(|r| r.date).max(),
        last_updated,
    };

    let recommendations = recommendations(records, &by_service, total);

    DashboardOverview {
        subscription_id: subscription_id.to_string(),
        period_days,
        summary: CostSummary {
            total,
            average_daily,
            currency,
        },
        by_service,
        by_resource_group,
        alerts_overview,
        data_quality,
        recommendations,
    }
}

fn share(cost: f64, total: f64) -> f64 {
    if total <= 0.0 {
        0.0
    } else {
        cost / total * 100.0
    }
}

fn service_breakdown(records: &[CostRecord], total: f64) -> Vec<ServiceCost> {
    let mut grouped: BTreeMap<&str, (f64, BTreeSet<&str>)> = BTreeMap::new();
    for record in records {
        let entry = grouped.entry(record.service_name.as_str()).or_default();
        entry.0 += record.total_cost;
        entry.1.insert(record.resource_id.as_str());
    }

    let mut breakdown: Vec<ServiceCost> = grouped
        .into_iter()
        .map(|(service, (cost, resources))| ServiceCost {
            service: service.to_string(),
            cost,
            percentage: share(cost, total),
            resource_count: resources.len(),
        })
        .collect();
    breakdown.sort_by(|a, b| b.cost.partial_cmp(&a.cost).unwrap_or(std::cmp::Ordering::Equal));
    breakdown
}

fn resource_group_breakdown(records: &[CostRecord], total: f64) -> Vec<ResourceGroupCost> {
    let mut grouped: BTreeMap<&str, f64> = BTreeMap::new();
    for record in records {
        *grouped.entry(record.resource_group.as_str()).or_default() += record.total_cost;
    }

    let mut breakdown: Vec<ResourceGroupCost> = grouped
        .into_iter()
        .map(|(group, cost)| ResourceGroupCost {
            resource_group: group.to_string(),
            cost,
            percentage: share(cost, total),
        })
        .collect();
    breakdown.sort_by(|a, b| b.cost.partial_cmp(&a.cost).unwrap_or(std::cmp::Ordering::Equal));
    breakdown
}

/// Operator-facing observations about the spend profile
fn recommendations(records: &[CostRecord], by_service: &[ServiceCost], total: f64) -> Vec<String> {
    let mut notes = Vec::new();

    if records.is_empty() {
        notes.push("No resource cost in the period".to_string());
        return notes;
    }

    let mut top: Vec<&CostRecord> = records.iter().collect();
    top.sort_by(|a, b| {
        b.total_cost
            .partial_cmp(&a.total_cost)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let names: Vec<String> = top
        .iter()
        .take(3)
        .map(|r| format!("{} ({:.2})", r.resource_name, r.total_cost))
        .collect();
    notes.push(format!("Top resources by cost: {}", names.join(", ")));

    if let Some(dominant) = by_service.first() {
        notes.push(format!(
            "{}: {} resource(s), {:.1}% of total spend",
            dominant.service, dominant.resource_count, dominant.percentage
        ));
    }

    let untagged = records.iter().filter(|r| r.tags.is_empty()).count();
    if untagged > 0 {
        notes.push(format!(
            "{untagged} resource(s) without tags - add tags for better governance"
        ));
    }

    if total > 1000.0 {
        notes.push(format!(
            "Period spend {total:.2} - review unused resources"
        ));
    }

    notes
}
