//! HTTP-level tests for the billing API fetcher, using a mock upstream.

use chrono::NaiveDate;
use serde_json::json;
use wiremock::matchers::{bearer_token, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use smartcost::collector::CostFetcher;
use smartcost::config::BillingConfig;
use smartcost::Error;

fn config(base_url: &str) -> BillingConfig {
    BillingConfig {
        base_url: base_url.to_string(),
        token: Some("test-token".to_string()),
        max_attempts: 3,
        ..BillingConfig::default()
    }
}

fn dates() -> (NaiveDate, NaiveDate) {
    (
        NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
        NaiveDate::from_ymd_opt(2026, 8, 20).unwrap(),
    )
}

fn query_body() -> serde_json::Value {
    json!({
        "properties": {
            "columns": [
                { "name": "PreTaxCost", "type": "Number" },
                { "name": "UsageDate", "type": "Number" },
                { "name": "ResourceId", "type": "String" },
                { "name": "ResourceType", "type": "String" },
                { "name": "ResourceGroupName", "type": "String" }
            ],
            "rows": [
                [42.5, 20260819, "/subscriptions/sub-1/resources/vm-web", "Compute", "rg-prod"],
                [7.5, 20260819, "/subscriptions/sub-1/resources/vm-web", "Compute", "rg-prod"],
                [10.0, 20260820, "/subscriptions/sub-1/resources/sql-main", "Database", "rg-prod"]
            ]
        }
    })
}

#[tokio::test]
async fn fetches_and_groups_cost_records() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(
            "/subscriptions/sub-1/providers/Microsoft.CostManagement/query",
        ))
        .and(query_param("api-version", "2023-11-01"))
        .and(bearer_token("test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_body()))
        .mount(&server)
        .await;

    let fetcher = CostFetcher::new(config(&server.uri())).unwrap();
    let (start, end) = dates();
    let records = fetcher.fetch_costs("sub-1", start, end).await.unwrap();

    assert_eq!(records.len(), 2);
    // Newest usage day first
    assert_eq!(records[0].resource_name, "sql-main");
    assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2026, 8, 20).unwrap());
    assert_eq!(records[1].resource_name, "vm-web");
    assert_eq!(records[1].date, NaiveDate::from_ymd_opt(2026, 8, 19).unwrap());
    assert!((records[1].total_cost - 50.0).abs() < 1e-9);
}

#[tokio::test]
async fn one_resource_yields_one_record_per_usage_day() {
    let server = MockServer::start().await;
    let body = json!({
        "properties": {
            "columns": [
                { "name": "PreTaxCost", "type": "Number" },
                { "name": "UsageDate", "type": "Number" },
                { "name": "ResourceId", "type": "String" },
                { "name": "ResourceType", "type": "String" },
                { "name": "ResourceGroupName", "type": "String" }
            ],
            "rows": [
                [10.0, 20260801, "/subscriptions/sub-1/resources/vm-web", "Compute", "rg-prod"],
                [20.0, 20260802, "/subscriptions/sub-1/resources/vm-web", "Compute", "rg-prod"]
            ]
        }
    });
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let fetcher = CostFetcher::new(config(&server.uri())).unwrap();
    let (start, end) = dates();
    let records = fetcher.fetch_costs("sub-1", start, end).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2026, 8, 2).unwrap());
    assert!((records[0].total_cost - 20.0).abs() < 1e-9);
    assert_eq!(records[1].date, NaiveDate::from_ymd_opt(2026, 8, 1).unwrap());
    assert!((records[1].total_cost - 10.0).abs() < 1e-9);
}

#[tokio::test]
async fn retries_through_throttling_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("throttled"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_body()))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = CostFetcher::new(config(&server.uri())).unwrap();
    let (start, end) = dates();
    let records = fetcher.fetch_costs("sub-1", start, end).await.unwrap();

    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn gives_up_after_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .expect(3)
        .mount(&server)
        .await;

    let fetcher = CostFetcher::new(config(&server.uri())).unwrap();
    let (start, end) = dates();
    let err = fetcher.fetch_costs("sub-1", start, end).await.unwrap_err();

    assert!(matches!(err, Error::Upstream { status: Some(503), .. }));
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = CostFetcher::new(config(&server.uri())).unwrap();
    let (start, end) = dates();
    let err = fetcher.fetch_costs("sub-1", start, end).await.unwrap_err();

    assert!(err.is_upstream());
    assert!(matches!(err, Error::Upstream { status: Some(403), .. }));
}

#[tokio::test]
async fn empty_result_is_a_valid_empty_list() {
    let server = MockServer::start().await;
    let body = json!({
        "properties": {
            "columns": [
                { "name": "PreTaxCost", "type": "Number" },
                { "name": "ResourceId", "type": "String" },
                { "name": "ResourceType", "type": "String" },
                { "name": "ResourceGroupName", "type": "String" }
            ],
            "rows": []
        }
    });
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let fetcher = CostFetcher::new(config(&server.uri())).unwrap();
    let (start, end) = dates();
    let records = fetcher.fetch_costs("sub-1", start, end).await.unwrap();

    assert!(records.is_empty());
}

#[tokio::test]
async fn validation_rejects_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(query_body()))
        .expect(0)
        .mount(&server)
        .await;

    let fetcher = CostFetcher::new(config(&server.uri())).unwrap();
    let (start, end) = dates();

    let err = fetcher.fetch_costs("  ", start, end).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = fetcher.fetch_costs("sub-1", end, start).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}
