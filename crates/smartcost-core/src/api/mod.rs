//! REST API implementation
//!
//! This module provides the HTTP API for SmartCost.

pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;

use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::alerting::AlertRepository;
use crate::collector::Collector;
use crate::dashboard::DashboardService;
use crate::db::Database;
use crate::error::Result;

/// HTTP API server
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(
        collector: Arc<Collector>,
        alert_repo: AlertRepository,
        dashboard: DashboardService,
        db: Arc<Database>,
    ) -> Self {
        Self {
            state: AppState {
                collector,
                alert_repo,
                dashboard,
                db,
            },
        }
    }

    /// Start the HTTP server
    pub async fn serve(self, addr: &str) -> Result<()> {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let app = create_router(self.state).layer(cors);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| crate::error::Error::Internal(e.to_string()))?;

        info!("HTTP server listening on {}", addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| crate::error::Error::Internal(e.to_string()))?;

        Ok(())
    }
}
