//! In-process HTTP tests. Obstacle and routing-engine upstreams are stood up
//! as plain axum apps on ephemeral ports; `setup_app_with` points `Config` at
//! them so `cargo test` exercises the real handlers with no live upstream.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use route_core::polyline;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::api;
use crate::config::Config;
use crate::state::AppState;

/// Bind a canned-response axum app to an ephemeral port and return its base URL.
async fn spawn_mock(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mock listener");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.expect("mock server");
    });
    format!("http://{addr}")
}

/// A mock obstacle service that always answers `POST /obstacles` with `body`.
async fn mock_obstacle_service(body: Value) -> String {
    let app = Router::new().route(
        "/obstacles",
        post(move || {
            let body = body.clone();
            async move { Json(body) }
        }),
    );
    spawn_mock(app).await
}

/// A mock routing engine that always answers `POST /route` with a single leg
/// following `coords`, ignoring whatever avoid polygons were requested.
async fn mock_router_service(coords: &[route_core::model::Coordinate], distance_km: f64, duration_s: f64) -> String {
    let shape = polyline::encode(coords);
    let body = json!({
        "trip": {
            "legs": [{
                "shape": shape,
                "summary": { "length": distance_km, "time": duration_s },
                "maneuvers": [],
            }]
        }
    });
    let app = Router::new().route(
        "/route",
        post(move || {
            let body = body.clone();
            async move { Json(body) }
        }),
    );
    spawn_mock(app).await
}

async fn setup_app_with(
    obstacle_url: String,
    router_url: String,
    overrides: impl FnOnce(&mut Config),
) -> Router {
    let mut config = Config::from_env();
    config.obstacle_service_url = obstacle_url;
    config.router_service_url = router_url;
    config.obstacle_timeout_s = 5.0;
    config.router_timeout_s = 5.0;
    config.plan_budget_s = 20.0;
    overrides(&mut config);
    let state = Arc::new(AppState::new(config));
    api::routes().with_state(state)
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

fn empty_feature_collection() -> Value {
    json!({ "type": "FeatureCollection", "features": [] })
}

fn point_feature(lon: f64, lat: f64, properties: Value) -> Value {
    json!({
        "type": "Feature",
        "geometry": { "type": "Point", "coordinates": [lon, lat] },
        "properties": properties,
    })
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn plan_returns_clean_when_no_obstacles_on_route() {
    let start = route_core::model::Coordinate::new(13.40, 52.50);
    let end = route_core::model::Coordinate::new(13.41, 52.49);

    let obstacle_url = mock_obstacle_service(empty_feature_collection()).await;
    let router_url = mock_router_service(&[start, end], 1.2, 90.0).await;
    let app = setup_app_with(obstacle_url, router_url, |_| {}).await;

    let response = app
        .oneshot(post_json(
            "/route/plan",
            json!({ "start": [start.lon, start.lat], "end": [end.lon, end.lat] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["meta"]["status"], "CLEAN");
    assert!(body["blocking_warnings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn plan_surfaces_free_text_enriched_width_limit_as_warn() {
    let start = route_core::model::Coordinate::new(13.40, 52.50);
    let end = route_core::model::Coordinate::new(13.41, 52.49);
    let mid = route_core::model::Coordinate::new(
        (start.lon + end.lon) / 2.0,
        (start.lat + end.lat) / 2.0,
    );

    let obstacles = json!({
        "type": "FeatureCollection",
        "features": [point_feature(
            mid.lon,
            mid.lat,
            json!({
                "id": "w1",
                "title": "Width restriction",
                "description": "Gesperrt fuer Fahrzeuge ueber 2,00 m Breite",
            }),
        )],
    });

    let obstacle_url = mock_obstacle_service(obstacles).await;
    // The routing engine ignores avoid polygons, so the obstacle can never be
    // routed around and the plan converges to WARN rather than CLEAN.
    let router_url = mock_router_service(&[start, end], 1.2, 90.0).await;
    let app = setup_app_with(obstacle_url, router_url, |_| {}).await;

    let response = app
        .oneshot(post_json(
            "/route/plan",
            json!({ "start": [start.lon, start.lat], "end": [end.lon, end.lat] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["meta"]["status"], "WARN");
    let warnings = body["blocking_warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0]["limits"]["width"], 2.0);
    assert!(warnings[0]["limits"].get("max_width_m").is_none());
}

#[tokio::test]
async fn precheck_reports_blocked_when_route_fully_obstructed() {
    let start = route_core::model::Coordinate::new(13.40, 52.50);
    let end = route_core::model::Coordinate::new(13.41, 52.49);
    let mid = route_core::model::Coordinate::new(
        (start.lon + end.lon) / 2.0,
        (start.lat + end.lat) / 2.0,
    );

    let obstacles = json!({
        "type": "FeatureCollection",
        "features": [point_feature(
            mid.lon,
            mid.lat,
            json!({ "id": "b1", "max_width_m": 2.0, "max_weight_t": null }),
        )],
    });

    let obstacle_url = mock_obstacle_service(obstacles).await;
    let router_url = mock_router_service(&[start, end], 1.2, 90.0).await;
    let app = setup_app_with(obstacle_url, router_url, |_| {}).await;

    let response = app
        .oneshot(post_json(
            "/route/precheck",
            json!({ "start": [start.lon, start.lat], "end": [end.lon, end.lat] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["status"], "BLOCKED");
    assert_eq!(body["intersects"], true);
    assert_eq!(body["blocking_count"], 1);
}

#[tokio::test]
async fn plan_runs_fast_path_tiling_for_long_distance() {
    let start = route_core::model::Coordinate::new(13.40, 52.50);
    let end = route_core::model::Coordinate::new(9.0, 48.0);

    let obstacle_url = mock_obstacle_service(empty_feature_collection()).await;
    let router_url = mock_router_service(&[start, end], 600.0, 20_000.0).await;
    let app = setup_app_with(obstacle_url, router_url, |cfg| {
        cfg.fast_path_threshold_km = 220.0;
    })
    .await;

    let response = app
        .oneshot(post_json(
            "/route/plan",
            json!({ "start": [start.lon, start.lat], "end": [end.lon, end.lat] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["meta"]["status"], "CLEAN");
    let phases = body["meta"]["phases"].as_array().unwrap();
    assert!(phases.iter().any(|p| p["phase"] == "FAST_PATH"));
    assert!(phases.iter().any(|p| p["phase"] == "FAST_PATH_TILES"));
}

#[tokio::test]
async fn valhalla_proxy_round_trips_router_legs() {
    let start = route_core::model::Coordinate::new(13.40, 52.50);
    let end = route_core::model::Coordinate::new(13.41, 52.49);

    let obstacle_url = mock_obstacle_service(empty_feature_collection()).await;
    let router_url = mock_router_service(&[start, end], 1.2, 90.0).await;
    let app = setup_app_with(obstacle_url, router_url, |_| {}).await;

    let response = app
        .oneshot(post_json(
            "/route/valhalla",
            json!({ "start": [start.lon, start.lat], "end": [end.lon, end.lat] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    let features = body["features"].as_array().unwrap();
    assert_eq!(features.len(), 1);
    assert_eq!(features[0]["properties"]["summary"]["distance_km"], 1.2);
}
