//! Postgres-backed store tests. Ignored by default; point
//! SMARTCOST_TEST_DATABASE_URL at a disposable database and run with
//! `cargo test -- --ignored` to exercise them.

use chrono::NaiveDate;
use std::collections::HashMap;
use uuid::Uuid;

use smartcost::config::DatabaseConfig;
use smartcost::db::{CostRepository, PostgresPool};
use smartcost::models::CostRecord;

async fn pool() -> PostgresPool {
    let url = std::env::var("SMARTCOST_TEST_DATABASE_URL")
        .expect("SMARTCOST_TEST_DATABASE_URL must point at a test database");
    let config = DatabaseConfig {
        url,
        max_connections: 5,
        min_connections: 1,
    };
    let pool = PostgresPool::new(&config).await.expect("connect");
    pool.migrate().await.expect("migrate");
    pool
}

fn record(subscription_id: &str, day: u32, cost: f64) -> CostRecord {
    CostRecord {
        subscription_id: subscription_id.to_string(),
        date: NaiveDate::from_ymd_opt(2026, 8, day).unwrap(),
        total_cost: cost,
        currency: "USD".to_string(),
        resource_group: "rg-test".to_string(),
        service_name: "Compute".to_string(),
        resource_id: format!("/subscriptions/{subscription_id}/resources/vm-1"),
        resource_name: "vm-1".to_string(),
        tags: HashMap::new(),
    }
}

#[tokio::test]
#[ignore = "needs a live Postgres via SMARTCOST_TEST_DATABASE_URL"]
async fn repeated_upsert_leaves_stored_totals_unchanged() {
    let pool = pool().await;
    let repo = CostRepository::new(&pool);
    let subscription_id = format!("sub-{}", Uuid::new_v4());
    let month_start = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();

    let records = vec![record(&subscription_id, 10, 10.0)];
    repo.upsert_records(&records).await.unwrap();
    repo.upsert_records(&records).await.unwrap();

    let total = repo
        .month_to_date_total(&subscription_id, month_start)
        .await
        .unwrap();
    assert!((total - 10.0).abs() < 1e-9);
}

#[tokio::test]
#[ignore = "needs a live Postgres via SMARTCOST_TEST_DATABASE_URL"]
async fn refetched_day_overwrites_the_stored_cost() {
    let pool = pool().await;
    let repo = CostRepository::new(&pool);
    let subscription_id = format!("sub-{}", Uuid::new_v4());
    let month_start = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();

    repo.upsert_records(&[record(&subscription_id, 10, 10.0)])
        .await
        .unwrap();
    // Same (subscription, date, resource) key, corrected cost
    repo.upsert_records(&[record(&subscription_id, 10, 12.5)])
        .await
        .unwrap();

    let total = repo
        .month_to_date_total(&subscription_id, month_start)
        .await
        .unwrap();
    assert!((total - 12.5).abs() < 1e-9);
}

#[tokio::test]
#[ignore = "needs a live Postgres via SMARTCOST_TEST_DATABASE_URL"]
async fn per_day_records_sum_without_overlap() {
    let pool = pool().await;
    let repo = CostRepository::new(&pool);
    let subscription_id = format!("sub-{}", Uuid::new_v4());
    let month_start = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();

    // Overlapping fetch windows re-deliver day 10 alongside day 11
    repo.upsert_records(&[record(&subscription_id, 10, 10.0)])
        .await
        .unwrap();
    repo.upsert_records(&[
        record(&subscription_id, 10, 10.0),
        record(&subscription_id, 11, 20.0),
    ])
    .await
    .unwrap();

    let total = repo
        .month_to_date_total(&subscription_id, month_start)
        .await
        .unwrap();
    assert!((total - 30.0).abs() < 1e-9);
}
