//! API handlers for the HTTP REST API

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::alerting::AlertRepository;
use crate::collector::Collector;
use crate::dashboard::DashboardService;
use crate::db::Database;
use crate::error::Error;
use crate::models::{BudgetAlert, BudgetAlertInput, CostRecord, DashboardOverview};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub collector: Arc<Collector>,
    pub alert_repo: AlertRepository,
    pub dashboard: DashboardService,
    pub db: Arc<Database>,
}

fn into_response_error(e: Error) -> (StatusCode, String) {
    let status = match &e {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::Upstream { .. } => StatusCode::BAD_GATEWAY,
        Error::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, (StatusCode, String)> {
    state
        .db
        .health_check()
        .await
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

/// Current costs response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostsResponse {
    pub subscription_id: String,
    pub costs: Vec<CostRecord>,
    pub total_cost: f64,
    pub currency: String,
    pub recommendations: Vec<String>,
    pub cached: bool,
    /// Seconds since the served snapshot was captured
    pub cache_age_seconds: i64,
}

/// Current costs for a subscription, served from the snapshot cache when
/// fresh and falling back to a zeroed snapshot when the billing API is down
pub async fn get_costs(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
) -> Result<Json<CostsResponse>, (StatusCode, String)> {
    let (snapshot, cached) = state
        .collector
        .current_costs(&subscription_id)
        .await
        .map_err(into_response_error)?;

    let cache_age_seconds = snapshot.age(chrono::Utc::now()).num_seconds().max(0);

    Ok(Json(CostsResponse {
        subscription_id: snapshot.subscription_id,
        costs: snapshot.records,
        total_cost: snapshot.total_cost,
        currency: snapshot.currency,
        recommendations: snapshot.recommendations,
        cached,
        cache_age_seconds,
    }))
}

/// Query parameters for the dashboard
#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub period_days: Option<i64>,
}

/// Aggregated dashboard for a subscription
pub async fn get_dashboard(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardOverview>, (StatusCode, String)> {
    let period_days = query.period_days.unwrap_or(30).clamp(1, 365);

    let alerts = state
        .alert_repo
        .list_for_subscription(&subscription_id)
        .await
        .map_err(into_response_error)?;

    let overview = state
        .dashboard
        .get_overview(&subscription_id, period_days, &alerts)
        .await
        .map_err(into_response_error)?;

    Ok(Json(overview))
}

/// List alerts response
#[derive(Serialize)]
pub struct ListAlertsResponse {
    pub alerts: Vec<BudgetAlert>,
    pub total: usize,
}

/// List budget alerts for a subscription
pub async fn list_alerts(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
) -> Result<Json<ListAlertsResponse>, (StatusCode, String)> {
    let alerts = state
        .alert_repo
        .list_for_subscription(&subscription_id)
        .await
        .map_err(into_response_error)?;

    let total = alerts.len();
    Ok(Json(ListAlertsResponse { alerts, total }))
}

/// Create a budget alert
pub async fn create_alert(
    State(state): State<AppState>,
    Json(input): Json<BudgetAlertInput>,
) -> Result<(StatusCode, Json<BudgetAlert>), (StatusCode, String)> {
    let alert = state
        .alert_repo
        .create(input)
        .await
        .map_err(into_response_error)?;

    Ok((StatusCode::CREATED, Json(alert)))
}

/// Delete a budget alert
pub async fn delete_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let deleted = state
        .alert_repo
        .delete(alert_id)
        .await
        .map_err(into_response_error)?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, "Alert not found".to_string()))
    }
}

/// Collection run response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionResponse {
    pub subscription_id: String,
    pub records_saved: usize,
    pub alerts_triggered: usize,
    pub notifications_failed: usize,
}

/// Trigger a collection run outside the schedule
pub async fn trigger_collection(
    State(state): State<AppState>,
    Path(subscription_id): Path<String>,
) -> Result<Json<CollectionResponse>, (StatusCode, String)> {
    let report = state
        .collector
        .run_once(&subscription_id)
        .await
        .map_err(into_response_error)?;

    Ok(Json(CollectionResponse {
        subscription_id: report.subscription_id,
        records_saved: report.records_saved,
        alerts_triggered: report.alerts_triggered,
        notifications_failed: report.notifications_failed,
    }))
}
