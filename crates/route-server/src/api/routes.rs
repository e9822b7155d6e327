//! REST API routes: route planning, and proxies onto the obstacle and
//! routing-engine upstreams.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use route_core::model::{BBox, Coordinate};

use crate::adapter::{
    self, AdapterError, PlanRequestBody, PrecheckRequestBody, PrecheckResponse, RoadworksProxyBody,
    RouterProxyBody,
};
use crate::obstacle_client::{self, ObstacleQuery};
use crate::planner::{self, PlanOutcome, PlanStatus};
use crate::router_client::{self, RouteError, RouteRequest};
use crate::state::AppState;

/// Create the API router.
pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/route/plan", post(plan_handler))
        .route("/roadworks", post(roadworks_handler))
        .route("/route/valhalla", post(valhalla_handler))
        .route("/route/precheck", post(precheck_handler))
}

async fn plan_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PlanRequestBody>,
) -> impl IntoResponse {
    let plan_request = match adapter::to_plan_request(body, &state.config) {
        Ok(req) => req,
        Err(AdapterError::InputInvalid(reason)) => {
            let envelope = adapter::to_envelope(PlanOutcome {
                status: PlanStatus::Blocked,
                error: Some(reason),
                iterations: 0,
                avoids_applied: 0,
                bbox_km_used: None,
                fallback_used: false,
                phases: Vec::new(),
                best: None,
                alternates: Vec::new(),
            });
            return (StatusCode::BAD_REQUEST, Json(envelope));
        }
    };

    let outcome = planner::plan(&state, plan_request).await;
    (StatusCode::OK, Json(adapter::to_envelope(outcome)))
}

async fn roadworks_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RoadworksProxyBody>,
) -> impl IntoResponse {
    let bbox = BBox::new(body.bbox[0], body.bbox[1], body.bbox[2], body.bbox[3]);
    let result = obstacle_client::fetch_obstacles(
        &state.obstacle_client,
        &state.config,
        ObstacleQuery {
            ts: body.ts,
            tz: body.tz,
            bbox,
            buffer_m: body.buffer_m,
            only_motorways: body.only_motorways,
        },
    )
    .await;
    Json(obstacle_client::to_feature_collection(&result))
}

async fn valhalla_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RouterProxyBody>,
) -> impl IntoResponse {
    let start = Coordinate::new(body.start[0], body.start[1]);
    let end = Coordinate::new(body.end[0], body.end[1]);
    let avoid_polygons = adapter::rings_to_avoid_polygons(body.avoid_polygons);

    let route_req = RouteRequest {
        start,
        end,
        vehicle: &body.vehicle,
        avoid_polygons: &avoid_polygons,
        alternates: body.alternates,
        language: body.language,
        escape_mode: body.escape_mode,
    };

    match router_client::route(&state.router_client, &state.config, route_req).await {
        Ok(response) => {
            let fc = router_client::legs_to_feature_collection(&response.legs);
            (StatusCode::OK, Json(fc)).into_response()
        }
        Err(RouteError::Upstream(message)) => {
            let body = serde_json::json!({
                "error": message,
                "status": "error",
                "request_had_excludes": !avoid_polygons.is_empty(),
            });
            (StatusCode::BAD_GATEWAY, Json(body)).into_response()
        }
    }
}

async fn precheck_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PrecheckRequestBody>,
) -> impl IntoResponse {
    let start = Coordinate::new(body.start[0], body.start[1]);
    let end = Coordinate::new(body.end[0], body.end[1]);
    let ts = body.ts.unwrap_or_else(Utc::now);

    let (status, intersects, blocking_count, blocking) = planner::precheck(
        &state,
        start,
        end,
        &body.vehicle,
        ts,
        &body.tz,
        body.roadworks.buffer_m,
    )
    .await;

    Json(PrecheckResponse {
        status: status.as_str(),
        intersects,
        blocking_count,
        blocking,
    })
}
