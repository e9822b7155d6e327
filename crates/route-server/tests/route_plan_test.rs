//! Route planning integration tests.
//!
//! Run with: cargo test --test route_plan_test -- --ignored
//! Requires a running route-server, with OBSTACLE_SERVICE_URL and
//! ROUTER_SERVICE_URL pointed at reachable upstreams.

use reqwest::Client;
use serde_json::json;

fn base_url() -> String {
    std::env::var("ROUTE_PLANNER_TEST_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

/// Short trip (below the FAST_PATH threshold) should come back CLEAN or WARN,
/// never BLOCKED, when no obstacles obstruct the corridor.
#[tokio::test]
#[ignore]
async fn test_short_clean_route() {
    let client = Client::new();
    let base = base_url();

    let resp = client
        .post(format!("{}/route/plan", base))
        .json(&json!({
            "start": [8.682, 50.1109],
            "end": [8.8, 50.2],
            "vehicle": { "width_m": 2.55, "height_m": 4.0, "weight_t": 40.0 },
        }))
        .send()
        .await
        .expect("plan request failed");

    assert!(resp.status().is_success(), "plan should succeed");
    let body: serde_json::Value = resp.json().await.unwrap();
    let status = body["meta"]["status"].as_str().unwrap();
    assert_ne!(status, "BLOCKED", "a clean corridor should not come back blocked");
    assert!(body["geojson"]["features"].is_array());
}

/// A long trip should dispatch to FAST_PATH and still return a usable route.
#[tokio::test]
#[ignore]
async fn test_long_route_uses_fast_path() {
    let client = Client::new();
    let base = base_url();

    let resp = client
        .post(format!("{}/route/plan", base))
        .json(&json!({
            "start": [8.682, 50.1109],
            "end": [11.576, 48.137],
        }))
        .send()
        .await
        .expect("plan request failed");

    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["meta"]["iterations"].as_i64().unwrap() >= 1);
    assert!(body["geojson"]["features"].as_array().is_some());
}

/// An invalid start coordinate should be rejected before any upstream call.
#[tokio::test]
#[ignore]
async fn test_invalid_coordinate_is_rejected() {
    let client = Client::new();
    let base = base_url();

    let resp = client
        .post(format!("{}/route/plan", base))
        .json(&json!({
            "start": [200.0, 50.0],
            "end": [8.8, 50.2],
        }))
        .send()
        .await
        .expect("plan request failed");

    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["meta"]["status"].as_str(), Some("BLOCKED"));
    assert!(body["meta"]["error"].is_string());
}

/// A wide/heavy vehicle is more likely to trip a blocking warning than the
/// default profile; the response should at least stay structurally sound.
#[tokio::test]
#[ignore]
async fn test_oversized_vehicle_reports_blocking_warnings_consistently() {
    let client = Client::new();
    let base = base_url();

    let resp = client
        .post(format!("{}/route/plan", base))
        .json(&json!({
            "start": [8.682, 50.1109],
            "end": [8.9, 50.3],
            "vehicle": { "width_m": 3.2, "height_m": 4.5, "weight_t": 44.0 },
        }))
        .send()
        .await
        .expect("plan request failed");

    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.unwrap();
    let warnings = body["blocking_warnings"].as_array().unwrap();
    let status = body["meta"]["status"].as_str().unwrap();
    if status == "WARN" {
        assert!(!warnings.is_empty(), "WARN status should carry at least one blocking warning");
    }
    if status == "CLEAN" {
        assert!(warnings.is_empty(), "CLEAN status should carry no blocking warnings");
    }
}

/// The precheck endpoint should answer fast without ever returning a route
/// geometry payload.
#[tokio::test]
#[ignore]
async fn test_precheck_returns_a_verdict_only() {
    let client = Client::new();
    let base = base_url();

    let resp = client
        .post(format!("{}/route/precheck", base))
        .json(&json!({
            "start": [8.682, 50.1109],
            "end": [8.8, 50.2],
        }))
        .send()
        .await
        .expect("precheck request failed");

    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(matches!(body["status"].as_str(), Some("CLEAN") | Some("WARN") | Some("BLOCKED")));
    assert!(body["blocking_count"].as_u64().is_some());
    assert!(body.get("geojson").is_none(), "precheck should not return route geometry");
}

/// The roadworks proxy should echo upstream metadata alongside the features.
#[tokio::test]
#[ignore]
async fn test_roadworks_proxy_carries_meta() {
    let client = Client::new();
    let base = base_url();

    let resp = client
        .post(format!("{}/roadworks", base))
        .json(&json!({
            "ts": chrono::Utc::now().to_rfc3339(),
            "bbox": [8.0, 50.0, 9.0, 51.0],
        }))
        .send()
        .await
        .expect("roadworks request failed");

    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["type"].as_str(), Some("FeatureCollection"));
    assert!(body["meta"]["fetched"].as_u64().is_some());
}
