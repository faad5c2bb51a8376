//! # SmartCost
//!
//! Cloud cost collection and budget alerting service.
//!
//! SmartCost pulls daily resource costs from a cloud billing API on a
//! schedule, stores them, evaluates budget alerts against month-to-date
//! spend, and serves aggregated dashboards over a REST API.
//!
//! ## Architecture
//!
//! - **Collector**: Scheduled fetch from the billing API with retry
//! - **Storage**: PostgreSQL for cost records and alerts, Redis for snapshots
//! - **Alerting**: Threshold evaluation and email dispatch
//! - **API**: REST API for costs, dashboards, and alert management
//!
//! ## Quick Start
//!
//! ```bash
//! # Start the API server and the scheduled collector
//! smartcost serve
//!
//! # Run one collection cycle by hand
//! smartcost collect
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerting;
pub mod api;
pub mod collector;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod models;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::collector::{Collector, RunReport};
    pub use crate::config::Config;
    pub use crate::db::Database;
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
}
