//! Cost collection pipeline
//!
//! One scheduled run fetches billing data for a subscription, upserts the
//! records, re-evaluates budget alerts, and dispatches notifications. Stages
//! execute sequentially within a run; runs for different subscriptions are
//! independent and may overlap.

mod fetcher;

pub use fetcher::CostFetcher;

use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::alerting::{AlertDispatcher, AlertEvaluator, AlertRepository};
use crate::config::Config;
use crate::db::{CostRepository, Database, SnapshotCache};
use crate::error::{Error, Result};
use crate::models::{CostRecord, CostSnapshot, TriggeredAlert};

/// Summary of one completed collection run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub subscription_id: String,
    pub records_saved: usize,
    pub alerts_triggered: usize,
    pub notifications_failed: usize,
}

/// The scheduled cost collection service
pub struct Collector {
    config: Config,
    fetcher: CostFetcher,
    cost_repo: CostRepository,
    snapshot_cache: SnapshotCache,
    evaluator: AlertEvaluator,
    dispatcher: AlertDispatcher,
}

impl Collector {
    /// Create a new collector wired to the given database handles.
    ///
    /// Client handles are injected here and owned by the composition root;
    /// components never construct their own connections.
    pub fn new(config: Config, db: &Database) -> Result<Self> {
        let fetcher = CostFetcher::new(config.billing.clone())?;
        let cost_repo = CostRepository::new(&db.postgres);
        let alert_repo = AlertRepository::new(&db.postgres);
        let snapshot_cache = SnapshotCache::new(&db.redis);
        let evaluator = AlertEvaluator::new(alert_repo, cost_repo.clone());
        let dispatcher = AlertDispatcher::new(config.alerting.clone())?;

        Ok(Self {
            config,
            fetcher,
            cost_repo,
            snapshot_cache,
            evaluator,
            dispatcher,
        })
    }

    /// Run collection on the configured fixed interval until the task is
    /// dropped. A failed run is logged; the next tick retries.
    pub async fn start(&self) -> Result<()> {
        self.config.validate_for_collection()?;
        let subscription_id = self
            .config
            .billing
            .default_subscription_id
            .clone()
            .ok_or_else(|| Error::config("SMARTCOST_SUBSCRIPTION_ID is not set"))?;

        info!(
            subscription_id,
            interval_secs = self.config.collector.interval_secs,
            "starting scheduled cost collection"
        );

        let mut ticker = interval(Duration::from_secs(self.config.collector.interval_secs));

        loop {
            ticker.tick().await;

            match self.run_once(&subscription_id).await {
                Ok(report) => {
                    info!(
                        subscription_id = %report.subscription_id,
                        records = report.records_saved,
                        alerts = report.alerts_triggered,
                        failed_notifications = report.notifications_failed,
                        "collection run completed"
                    );
                }
                Err(e) => {
                    error!(subscription_id, error = %e, "collection run failed");
                }
            }
        }
    }

    /// Execute one full pipeline run: fetch, store, evaluate, dispatch.
    ///
    /// An upstream or store failure aborts the run (the next tick retries);
    /// evaluation and dispatch failures are logged and never do.
    pub async fn run_once(&self, subscription_id: &str) -> Result<RunReport> {
        let end_date = Utc::now().date_naive();
        let start_date = end_date - ChronoDuration::days(self.config.collector.lookback_days);

        let records = self
            .fetcher
            .fetch_costs(subscription_id, start_date, end_date)
            .await?;

        if records.is_empty() {
            info!(subscription_id, "no cost records in period");
            return Ok(RunReport {
                subscription_id: subscription_id.to_string(),
                records_saved: 0,
                alerts_triggered: 0,
                notifications_failed: 0,
            });
        }

        let saved = self.cost_repo.upsert_records(&records).await?;
        info!(subscription_id, saved, "cost records saved");

        // Refresh the fallback snapshot; losing it is non-fatal
        let snapshot = CostSnapshot::from_records(subscription_id, records.clone());
        if let Err(e) = self.snapshot_cache.put(&snapshot).await {
            warn!(subscription_id, error = %e, "failed to refresh snapshot cache");
        }

        let triggered = isolate_evaluation(self.evaluator.evaluate(&records).await);
        let alerts_triggered = triggered.len();

        let notifications_failed = if triggered.is_empty() {
            info!(subscription_id, "no budget alerts triggered");
            0
        } else {
            warn!(
                subscription_id,
                count = alerts_triggered,
                "budget alerts triggered, dispatching notifications"
            );
            self.dispatcher
                .dispatch_all(&triggered)
                .await
                .iter()
                .filter(|r| !r.success)
                .count()
        };

        Ok(RunReport {
            subscription_id: subscription_id.to_string(),
            records_saved: saved,
            alerts_triggered,
            notifications_failed,
        })
    }

    /// Current costs for a subscription, served from the snapshot cache while
    /// one is live and otherwise fetched from the billing API.
    ///
    /// Cache entries expire after an hour, so a served snapshot is always
    /// younger than that; with no live snapshot and a failing billing API the
    /// result is zeroed and carries a note explaining the failure. The flag
    /// is true when the snapshot came from cache rather than this call.
    pub async fn current_costs(&self, subscription_id: &str) -> Result<(CostSnapshot, bool)> {
        let cached = match self.snapshot_cache.get(subscription_id).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(subscription_id, error = %e, "snapshot cache read failed");
                None
            }
        };

        // Spare the API while a fresh snapshot is cached
        let fetched = if cached.is_some() {
            Ok(Vec::new())
        } else {
            let end_date = Utc::now().date_naive();
            let start_date = end_date - ChronoDuration::days(self.config.collector.lookback_days);
            self.fetcher
                .fetch_costs(subscription_id, start_date, end_date)
                .await
        };
        let fetch_ok = fetched.is_ok();

        let (snapshot, from_cache) = resolve_costs(subscription_id, cached, fetched)?;

        if !from_cache && fetch_ok {
            if let Err(e) = self.snapshot_cache.put(&snapshot).await {
                warn!(subscription_id, error = %e, "failed to cache snapshot");
            }
        }

        Ok((snapshot, from_cache))
    }

    /// Repository handle for read paths (dashboard, API)
    pub fn cost_repository(&self) -> &CostRepository {
        &self.cost_repo
    }
}

/// Decide what a costs read serves: the cached snapshot when one is live,
/// otherwise the fetch outcome. An upstream failure degrades to a zeroed
/// snapshot carrying an explanatory note; any other error propagates.
fn resolve_costs(
    subscription_id: &str,
    cached: Option<CostSnapshot>,
    fetched: Result<Vec<CostRecord>>,
) -> Result<(CostSnapshot, bool)> {
    if let Some(snapshot) = cached {
        return Ok((snapshot, true));
    }

    match fetched {
        Ok(records) => {
            let mut snapshot = CostSnapshot::from_records(subscription_id, records);
            if snapshot.records.is_empty() {
                snapshot
                    .recommendations
                    .push("No cost recorded in the selected period".to_string());
            }
            Ok((snapshot, false))
        }
        Err(e) if e.is_upstream() => {
            warn!(subscription_id, error = %e, "billing API unavailable, serving zeroed fallback");
            Ok((
                CostSnapshot::empty_with_note(
                    subscription_id,
                    format!("Cost data unavailable: {e}. Retry on the next collection cycle."),
                ),
                false,
            ))
        }
        Err(e) => Err(e),
    }
}

/// Evaluation failures surface in the run report as zero triggered alerts,
/// never as a failed run
fn isolate_evaluation(outcome: Result<Vec<TriggeredAlert>>) -> Vec<TriggeredAlert> {
    outcome.unwrap_or_else(|e| {
        error!(error = %e, "alert evaluation failed, dispatching nothing this run");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn record(cost: f64) -> CostRecord {
        CostRecord {
            subscription_id: "sub-1".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 8, 20).unwrap(),
            total_cost: cost,
            currency: "USD".to_string(),
            resource_group: "rg-a".to_string(),
            service_name: "Compute".to_string(),
            resource_id: "/sub/r/vm-1".to_string(),
            resource_name: "vm-1".to_string(),
            tags: HashMap::new(),
        }
    }

    #[test]
    fn cached_snapshot_is_served_even_when_upstream_is_down() {
        let cached = CostSnapshot::from_records("sub-1", vec![record(12.0)]);

        let (snapshot, from_cache) =
            resolve_costs("sub-1", Some(cached), Err(Error::upstream(429, "throttled")))
                .expect("cached snapshot serves");

        assert!(from_cache);
        assert_eq!(snapshot.records.len(), 1);
        assert!((snapshot.total_cost - 12.0).abs() < 1e-9);
    }

    #[test]
    fn upstream_failure_without_cache_degrades_to_zeroed_note() {
        let (snapshot, from_cache) =
            resolve_costs("sub-1", None, Err(Error::upstream(429, "throttled")))
                .expect("fallback serves");

        assert!(!from_cache);
        assert_eq!(snapshot.total_cost, 0.0);
        assert!(snapshot.records.is_empty());
        assert!(snapshot
            .recommendations
            .iter()
            .any(|n| n.contains("unavailable")));
    }

    #[test]
    fn successful_fetch_builds_a_fresh_snapshot() {
        let (snapshot, from_cache) =
            resolve_costs("sub-1", None, Ok(vec![record(3.5)])).expect("fetch serves");

        assert!(!from_cache);
        assert!((snapshot.total_cost - 3.5).abs() < 1e-9);
        assert!(snapshot.recommendations.is_empty());

        let (empty, _) = resolve_costs("sub-1", None, Ok(Vec::new())).expect("empty is valid");
        assert!(empty
            .recommendations
            .iter()
            .any(|n| n.contains("No cost recorded")));
    }

    #[test]
    fn non_upstream_errors_propagate() {
        let err = resolve_costs("sub-1", None, Err(Error::Cache("down".to_string())))
            .expect_err("must propagate");
        assert!(matches!(err, Error::Cache(_)));
    }

    #[test]
    fn failed_evaluation_dispatches_nothing_but_keeps_the_run() {
        assert!(isolate_evaluation(Err(Error::Cache("down".to_string()))).is_empty());
        assert_eq!(isolate_evaluation(Ok(Vec::new())).len(), 0);
    }
}
