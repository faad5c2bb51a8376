//! Billing API cost fetcher
//!
//! Queries the cost management REST API for a subscription over a date range
//! and folds the returned rows into per-resource, per-day [`CostRecord`]s.

use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::BillingConfig;
use crate::error::{Error, Result};
use crate::models::{resource_name_from_id, CostRecord};

/// Fetches cost rows from the billing query API.
///
/// Read-only: performs the outbound HTTP call and nothing else. Persisting
/// the result is the caller's job.
#[derive(Clone)]
pub struct CostFetcher {
    client: Client,
    config: BillingConfig,
}

impl CostFetcher {
    /// Create a new fetcher from billing configuration
    pub fn new(config: BillingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Fetch costs for a subscription over an inclusive date range.
    ///
    /// Returns an empty list when the period has no cost; that is a valid
    /// outcome, distinct from an [`Error::Upstream`] failure. Transient 429
    /// and 5xx responses are retried within a small attempt budget before
    /// the error surfaces.
    pub async fn fetch_costs(
        &self,
        subscription_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<CostRecord>> {
        if subscription_id.trim().is_empty() {
            return Err(Error::validation("subscriptionId must not be empty"));
        }
        if start_date > end_date {
            return Err(Error::validation(format!(
                "startDate {start_date} is after endDate {end_date}"
            )));
        }

        let token = self
            .config
            .token
            .as_deref()
            .ok_or_else(|| Error::config("billing API token is not configured"))?;

        let url = format!(
            "{}/subscriptions/{}/providers/Microsoft.CostManagement/query?api-version={}",
            self.config.base_url, subscription_id, self.config.api_version
        );
        let body = BillingQueryRequest::daily_by_resource(start_date, end_date);

        let response = self.post_with_retry(&url, token, &body).await?;

        let records = group_rows(&response, subscription_id, end_date);
        debug!(
            subscription_id,
            rows = response.properties.rows.len(),
            resources = records.len(),
            "parsed billing query response"
        );

        Ok(records)
    }

    /// POST the query, retrying transient upstream failures.
    async fn post_with_retry(
        &self,
        url: &str,
        token: &str,
        body: &BillingQueryRequest,
    ) -> Result<BillingQueryResponse> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.post_once(url, token, body).await {
                Ok(response) => return Ok(response),
                Err(e) if is_transient(&e) && attempt < max_attempts => {
                    warn!(attempt, max_attempts, error = %e, "transient billing API failure, retrying");
                    tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| Error::upstream_transport("retry budget exhausted")))
    }

    async fn post_once(
        &self,
        url: &str,
        token: &str,
        body: &BillingQueryRequest,
    ) -> Result<BillingQueryResponse> {
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::upstream_transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::upstream(status.as_u16(), text));
        }

        response
            .json::<BillingQueryResponse>()
            .await
            .map_err(|e| Error::upstream_transport(format!("malformed billing response: {e}")))
    }
}

/// True for failures worth one more attempt: 429, 5xx, transport errors
fn is_transient(error: &Error) -> bool {
    match error {
        Error::Upstream { status: Some(s), .. } => *s == 429 || *s >= 500,
        Error::Upstream { status: None, .. } => true,
        _ => false,
    }
}

/// Fold query rows into one record per resource per usage day. A Daily
/// query returns one row per resource per day; keeping the day in the record
/// key is what lets month-to-date totals sum stored records without
/// overlapping windows. Rows without a resource id contribute nothing
/// attributable and are skipped. Missing or mistyped cells default to 0 cost
/// / empty string; a row without a usage date falls back to `fallback_date`.
fn group_rows(
    response: &BillingQueryResponse,
    subscription_id: &str,
    fallback_date: NaiveDate,
) -> Vec<CostRecord> {
    let layout = ColumnLayout::from_columns(&response.properties.columns);
    let mut by_resource_day: HashMap<(String, NaiveDate), CostRecord> = HashMap::new();

    for row in &response.properties.rows {
        let cost = layout.number(row, layout.cost);
        let resource_id = layout.string(row, layout.resource_id);
        let service_name = layout.string(row, layout.resource_type);
        let resource_group = layout.string(row, layout.resource_group);
        let date = layout.date(row, fallback_date);

        if resource_id.is_empty() {
            continue;
        }

        let entry = by_resource_day
            .entry((resource_id.clone(), date))
            .or_insert_with(|| CostRecord {
                subscription_id: subscription_id.to_string(),
                date,
                total_cost: 0.0,
                currency: layout.currency(row),
                resource_group,
                service_name,
                resource_name: resource_name_from_id(&resource_id),
                resource_id,
                tags: HashMap::new(),
            });
        entry.total_cost += cost;
    }

    let mut records: Vec<CostRecord> = by_resource_day.into_values().collect();
    records.sort_by(|a, b| {
        b.date.cmp(&a.date).then(
            b.total_cost
                .partial_cmp(&a.total_cost)
                .unwrap_or(std::cmp::Ordering::Equal),
        )
    });
    records
}

/// Column positions resolved from the response header, falling back to the
/// documented order `[cost, resourceId, resourceType, resourceGroup]`.
struct ColumnLayout {
    cost: usize,
    resource_id: usize,
    resource_type: usize,
    resource_group: usize,
    usage_date: Option<usize>,
    currency: Option<usize>,
}

impl ColumnLayout {
    fn from_columns(columns: &[BillingColumn]) -> Self {
        let find = |names: &[&str]| {
            columns
                .iter()
                .position(|c| names.iter().any(|n| c.name.eq_ignore_ascii_case(n)))
        };

        Self {
            cost: find(&["PreTaxCost", "Cost"]).unwrap_or(0),
            resource_id: find(&["ResourceId"]).unwrap_or(1),
            resource_type: find(&["ResourceType"]).unwrap_or(2),
            resource_group: find(&["ResourceGroupName", "ResourceGroup"]).unwrap_or(3),
            usage_date: find(&["UsageDate", "Date"]),
            currency: find(&["Currency"]),
        }
    }

    fn number(&self, row: &[serde_json::Value], index: usize) -> f64 {
        row.get(index).and_then(|v| v.as_f64()).unwrap_or(0.0)
    }

    fn string(&self, row: &[serde_json::Value], index: usize) -> String {
        row.get(index)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    fn date(&self, row: &[serde_json::Value], fallback: NaiveDate) -> NaiveDate {
        self.usage_date
            .and_then(|i| row.get(i))
            .and_then(date_cell)
            .unwrap_or(fallback)
    }

    fn currency(&self, row: &[serde_json::Value]) -> String {
        self.currency
            .and_then(|i| row.get(i))
            .and_then(|v| v.as_str())
            .unwrap_or("USD")
            .to_string()
    }
}

/// Usage dates arrive as `yyyymmdd` integers or as date strings
fn date_cell(value: &serde_json::Value) -> Option<NaiveDate> {
    if let Some(n) = value.as_i64() {
        return yyyymmdd_date(n);
    }
    value.as_str().and_then(|s| {
        s.get(..10)
            .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
            .or_else(|| s.parse::<i64>().ok().and_then(yyyymmdd_date))
    })
}

fn yyyymmdd_date(n: i64) -> Option<NaiveDate> {
    let year = i32::try_from(n / 10_000).ok()?;
    let month = u32::try_from((n / 100) % 100).ok()?;
    let day = u32::try_from(n % 100).ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Request body for the cost management query endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingQueryRequest {
    #[serde(rename = "type")]
    pub query_type: String,
    pub timeframe: String,
    pub time_period: TimePeriod,
    pub dataset: Dataset,
}

impl BillingQueryRequest {
    /// Daily actual-cost query grouped by resource
    pub fn daily_by_resource(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            query_type: "ActualCost".to_string(),
            timeframe: "Custom".to_string(),
            time_period: TimePeriod {
                from: from.to_string(),
                to: to.to_string(),
            },
            dataset: Dataset {
                granularity: "Daily".to_string(),
                aggregation: HashMap::from([(
                    "totalCost".to_string(),
                    Aggregation {
                        name: "PreTaxCost".to_string(),
                        function: "Sum".to_string(),
                    },
                )]),
                grouping: vec![
                    Grouping::dimension("ResourceId"),
                    Grouping::dimension("ResourceType"),
                    Grouping::dimension("ResourceGroupName"),
                ],
            },
        }
    }
}

/// Query date range
#[derive(Debug, Serialize)]
pub struct TimePeriod {
    pub from: String,
    pub to: String,
}

/// Query dataset: granularity, aggregation, grouping
#[derive(Debug, Serialize)]
pub struct Dataset {
    pub granularity: String,
    pub aggregation: HashMap<String, Aggregation>,
    pub grouping: Vec<Grouping>,
}

/// Aggregation function over a cost column
#[derive(Debug, Serialize)]
pub struct Aggregation {
    pub name: String,
    pub function: String,
}

/// Grouping dimension
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grouping {
    #[serde(rename = "type")]
    pub group_type: String,
    pub name: String,
}

impl Grouping {
    fn dimension(name: &str) -> Self {
        Self {
            group_type: "Dimension".to_string(),
            name: name.to_string(),
        }
    }
}

/// Top-level billing query response
#[derive(Debug, Default, Deserialize)]
pub struct BillingQueryResponse {
    #[serde(default)]
    pub properties: BillingQueryProperties,
}

/// Result table: column headers plus value rows
#[derive(Debug, Default, Deserialize)]
pub struct BillingQueryProperties {
    #[serde(default)]
    pub columns: Vec<BillingColumn>,
    #[serde(default)]
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// One column header in the result table
#[derive(Debug, Deserialize)]
pub struct BillingColumn {
    pub name: String,
    #[serde(rename = "type", default)]
    pub column_type: String,
}
