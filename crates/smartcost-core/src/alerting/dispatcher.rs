//! Email notification delivery for triggered alerts

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};

use crate::config::AlertingConfig;
use crate::error::{Error, Result};
use crate::models::TriggeredAlert;

/// Outcome of one notification attempt
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub alert_id: uuid::Uuid,
    pub recipient: String,
    pub success: bool,
    pub error: Option<String>,
    pub sent_at: DateTime<Utc>,
}

/// Sends one email per triggered alert through the configured mail gateway.
///
/// Failures are isolated per item: a failed send never stops the remaining
/// alerts in the batch, and there is no in-run retry. The next hourly cycle
/// re-fires any alert whose threshold condition still holds.
#[derive(Clone)]
pub struct AlertDispatcher {
    client: Client,
    config: AlertingConfig,
}

impl AlertDispatcher {
    /// Create a new dispatcher
    pub fn new(config: AlertingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Attempt every alert in the batch, collecting per-item results
    pub async fn dispatch_all(&self, alerts: &[TriggeredAlert]) -> Vec<DispatchResult> {
        let mut results = Vec::with_capacity(alerts.len());

        for alert in alerts {
            let sent_at = Utc::now();
            let outcome = self.send(alert).await;

            if let Err(ref e) = outcome {
                error!(alert_id = %alert.alert_id, recipient = %alert.notify_email, error = %e, "alert notification failed");
            }

            results.push(DispatchResult {
                alert_id: alert.alert_id,
                recipient: alert.notify_email.clone(),
                success: outcome.is_ok(),
                error: outcome.err().map(|e| e.to_string()),
                sent_at,
            });
        }

        let failed = results.iter().filter(|r| !r.success).count();
        info!(
            total = results.len(),
            failed, "alert notification batch processed"
        );

        results
    }

    /// Send one notification email
    pub async fn send(&self, alert: &TriggeredAlert) -> Result<()> {
        let gateway_url = self
            .config
            .mail_gateway_url
            .as_deref()
            .ok_or_else(|| Error::config("mail gateway URL is not configured"))?;

        let payload = EmailPayload {
            from: self.config.from_address.clone(),
            to: alert.notify_email.clone(),
            subject: format!(
                "Budget alert: {} at {:.1}% of budget",
                alert.alert_name, alert.actual_value
            ),
            body: alert.message(),
        };

        let mut request = self.client.post(gateway_url).json(&payload);
        if let Some(key) = &self.config.mail_gateway_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Notification(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Notification(format!(
                "mail gateway returned {status}: {body}"
            )));
        }

        info!(alert_id = %alert.alert_id, recipient = %alert.notify_email, "alert notification sent");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct EmailPayload {
    from: String,
    to: String,
    subject: String,
    body: String,
}
