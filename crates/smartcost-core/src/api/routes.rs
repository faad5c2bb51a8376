//! API routes

use axum::{
    routing::{delete, get, post},
    Router,
};

use super::handlers::{self, AppState};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health))

        // Costs
        .route("/api/v1/costs/:subscription_id", get(handlers::get_costs))

        // Dashboard
        .route("/api/v1/dashboard/:subscription_id", get(handlers::get_dashboard))

        // Budget alerts
        .route("/api/v1/alerts/:subscription_id", get(handlers::list_alerts))
        .route("/api/v1/alerts", post(handlers::create_alert))
        .route("/api/v1/alerts/:alert_id", delete(handlers::delete_alert))

        // Manual collection trigger
        .route("/api/v1/collect/:subscription_id", post(handlers::trigger_collection))

        .with_state(state)
}
