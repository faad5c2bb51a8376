//! Error types for SmartCost

use thiserror::Error;

/// Result type alias using SmartCost's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for SmartCost operations
#[derive(Error, Debug)]
pub enum Error {
    /// Billing API returned a non-success status or the call failed at the
    /// network level. `status` is `None` for transport errors.
    #[error("upstream billing API failure{}: {body}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Upstream { status: Option<u16>, body: String },

    /// Missing or invalid required setting - fatal for the run
    #[error("configuration error: {0}")]
    Config(String),

    /// Input rejected before any network call
    #[error("validation error: {0}")]
    Validation(String),

    /// Not found error
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Snapshot cache error
    #[error("cache error: {0}")]
    Cache(String),

    /// Notification delivery error
    #[error("notification error: {0}")]
    Notification(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create an upstream error from an HTTP status and response body
    pub fn upstream(status: u16, body: impl Into<String>) -> Self {
        Self::Upstream {
            status: Some(status),
            body: body.into(),
        }
    }

    /// Create an upstream error for a transport-level failure
    pub fn upstream_transport(msg: impl Into<String>) -> Self {
        Self::Upstream {
            status: None,
            body: msg.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True when the failure came from the billing API (non-2xx or network),
    /// which lets callers fall back to the cached snapshot.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream { .. })
    }
}
