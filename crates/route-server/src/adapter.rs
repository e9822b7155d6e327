//! Request/response adapter: validates the incoming plan request, fills in
//! defaults, derives the parameters the planner needs, and shapes the
//! outgoing envelope.

use chrono::{DateTime, Utc};
use route_core::model::{BlockingWarning, Coordinate, Vehicle};
use serde::{Deserialize, Serialize};

use route_core::model::AvoidPolygon;

use crate::config::Config;
use crate::planner::{PlanOutcome, PlanRequest};

/// Extra buffer per metre of vehicle width beyond the 2.55 m baseline,
/// expressed in km (i.e. 10 m per excess metre of width).
const AVOID_BUFFER_WIDTH_BONUS_KM_PER_M: f64 = 0.010;

fn default_tz() -> String {
    "Europe/Berlin".to_string()
}

fn default_corridor_width_m() -> f64 {
    2000.0
}

fn default_roadworks_buffer_m() -> f64 {
    60.0
}

fn default_roadworks_only_motorways() -> bool {
    true
}

fn default_directions_language() -> String {
    "de-DE".to_string()
}

fn default_avoid_target_max() -> i32 {
    30
}

fn default_respect_direction() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct CorridorRequest {
    #[serde(default = "default_corridor_width_m")]
    pub width_m: f64,
}

impl Default for CorridorRequest {
    fn default() -> Self {
        Self {
            width_m: default_corridor_width_m(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RoadworksRequest {
    #[serde(default = "default_roadworks_buffer_m")]
    pub buffer_m: f64,
    #[serde(default = "default_roadworks_only_motorways")]
    pub only_motorways: bool,
}

impl Default for RoadworksRequest {
    fn default() -> Self {
        Self {
            buffer_m: default_roadworks_buffer_m(),
            only_motorways: default_roadworks_only_motorways(),
        }
    }
}

/// Wire shape of `POST /route/plan`, per the plan request contract.
#[derive(Debug, Deserialize)]
pub struct PlanRequestBody {
    pub start: [f64; 2],
    pub end: [f64; 2],
    #[serde(default)]
    pub vehicle: Vehicle,
    pub ts: Option<DateTime<Utc>>,
    #[serde(default = "default_tz")]
    pub tz: String,
    #[serde(default)]
    pub corridor: CorridorRequest,
    #[serde(default)]
    pub roadworks: RoadworksRequest,
    pub alternates: Option<i32>,
    #[serde(default = "default_directions_language")]
    pub directions_language: String,
    #[serde(default = "default_avoid_target_max")]
    pub avoid_target_max: i32,
    #[serde(default)]
    pub valhalla_soft_max: Option<i32>,
    #[serde(default = "default_respect_direction")]
    pub respect_direction: bool,
}

pub enum AdapterError {
    InputInvalid(String),
}

/// Validate `start`/`end` and derive `avoidBufferKm`, `corridorKm` and
/// `MAX_AVOIDS_GLOBAL` per the adapter's derivation rules.
pub fn to_plan_request(body: PlanRequestBody, config: &Config) -> Result<PlanRequest, AdapterError> {
    let start = Coordinate::new(body.start[0], body.start[1]);
    let end = Coordinate::new(body.end[0], body.end[1]);
    if !start.is_valid() {
        return Err(AdapterError::InputInvalid("start is not a valid [lon, lat] pair".into()));
    }
    if !end.is_valid() {
        return Err(AdapterError::InputInvalid("end is not a valid [lon, lat] pair".into()));
    }

    let distance_km = route_core::geometry::haversine(start, end);
    let alternates = body.alternates.unwrap_or(if distance_km >= 220.0 { 0 } else { 1 });

    let min_buffer_km = config.min_avoid_buffer_m / 1000.0;
    let bonus_cap_km = config.max_avoid_buffer_bonus_m / 1000.0;
    let width_bonus_km =
        bonus_cap_km.min(0.0_f64.max((body.vehicle.width_m - 2.55) * AVOID_BUFFER_WIDTH_BONUS_KM_PER_M));
    let avoid_buffer_km = min_buffer_km.max(body.roadworks.buffer_m / 1000.0) + width_bonus_km;

    let corridor_km = 6.0_f64.max(60.0_f64.min((body.corridor.width_m / 1000.0) * 6.0));

    let max_avoids_global = 10usize.max(80usize.min(body.avoid_target_max.max(0) as usize));

    Ok(PlanRequest {
        start,
        end,
        vehicle: body.vehicle,
        ts: body.ts.unwrap_or_else(Utc::now),
        tz: body.tz,
        corridor_km,
        roadworks_buffer_m: body.roadworks.buffer_m,
        roadworks_only_motorways: body.roadworks.only_motorways,
        alternates,
        directions_language: body.directions_language,
        avoid_buffer_km,
        max_avoids_global,
    })
}

#[derive(Debug, Serialize)]
pub struct PlanMeta {
    pub source: &'static str,
    pub status: &'static str,
    pub clean: bool,
    pub error: Option<String>,
    pub iterations: i32,
    pub avoids_applied: usize,
    pub bbox_km_used: Option<u32>,
    pub fallback_used: bool,
    pub phases: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct AvoidAppliedSummary {
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct PlanResponseEnvelope {
    pub meta: PlanMeta,
    pub avoid_applied: AvoidAppliedSummary,
    pub geojson: geojson::FeatureCollection,
    pub blocking_warnings: Vec<BlockingWarning>,
    pub geojson_alts: Vec<geojson::FeatureCollection>,
}

fn empty_feature_collection() -> geojson::FeatureCollection {
    geojson::FeatureCollection {
        bbox: None,
        features: Vec::new(),
        foreign_members: None,
    }
}

/// Shape a [`PlanOutcome`] into the wire envelope of §6.2.
pub fn to_envelope(outcome: PlanOutcome) -> PlanResponseEnvelope {
    let status = outcome.status.as_str();
    let clean = status == "CLEAN";
    let (geojson, blocking_warnings) = match outcome.best {
        Some(candidate) => (candidate.geojson, candidate.stats.blocking_warnings),
        None => (empty_feature_collection(), Vec::new()),
    };

    PlanResponseEnvelope {
        meta: PlanMeta {
            source: "route/plan-v1",
            status,
            clean,
            error: outcome.error,
            iterations: outcome.iterations,
            avoids_applied: outcome.avoids_applied,
            bbox_km_used: outcome.bbox_km_used,
            fallback_used: outcome.fallback_used,
            phases: outcome.phases,
        },
        avoid_applied: AvoidAppliedSummary {
            total: outcome.avoids_applied,
        },
        geojson,
        blocking_warnings,
        geojson_alts: outcome.alternates,
    }
}

/// Wire shape of `POST /roadworks`, per the obstacle service contract (§6.3)
/// exposed directly to callers of this service.
#[derive(Debug, Deserialize)]
pub struct RoadworksProxyBody {
    pub ts: DateTime<Utc>,
    #[serde(default = "default_tz")]
    pub tz: String,
    pub bbox: [f64; 4],
    pub buffer_m: Option<f64>,
    #[serde(default)]
    pub only_motorways: bool,
}

/// Wire shape of `POST /route/valhalla`, per the router contract (§4.3/§6.4)
/// exposed directly to callers of this service.
#[derive(Debug, Deserialize)]
pub struct RouterProxyBody {
    pub start: [f64; 2],
    pub end: [f64; 2],
    #[serde(default)]
    pub vehicle: Vehicle,
    #[serde(default)]
    pub avoid_polygons: Vec<Vec<[f64; 2]>>,
    #[serde(default)]
    pub alternates: i32,
    #[serde(default = "default_directions_language")]
    pub language: String,
    #[serde(default)]
    pub escape_mode: bool,
}

/// Turn caller-supplied raw rings into [`AvoidPolygon`]s. The router client
/// only reads `.ring`; `obstacle_id`/`bbox` are filled in for API symmetry.
pub fn rings_to_avoid_polygons(rings: Vec<Vec<[f64; 2]>>) -> Vec<AvoidPolygon> {
    rings
        .into_iter()
        .enumerate()
        .filter_map(|(idx, ring)| {
            if ring.len() < 3 {
                return None;
            }
            let points: Vec<Coordinate> = ring.iter().map(|p| Coordinate::new(p[0], p[1])).collect();
            let bbox = route_core::geometry::bbox_of_points(&points);
            let mut closed_ring: Vec<(f64, f64)> = ring.iter().map(|p| (p[0], p[1])).collect();
            if closed_ring.first() != closed_ring.last() {
                closed_ring.push(closed_ring[0]);
            }
            Some(AvoidPolygon {
                obstacle_id: format!("proxy-{idx}"),
                bbox,
                ring: closed_ring,
            })
        })
        .collect()
}

/// Wire shape of `POST /route/precheck`.
#[derive(Debug, Deserialize)]
pub struct PrecheckRequestBody {
    pub start: [f64; 2],
    pub end: [f64; 2],
    #[serde(default)]
    pub vehicle: Vehicle,
    pub ts: Option<DateTime<Utc>>,
    #[serde(default = "default_tz")]
    pub tz: String,
    #[serde(default)]
    pub roadworks: RoadworksRequest,
}

#[derive(Debug, Serialize)]
pub struct PrecheckResponse {
    pub status: &'static str,
    pub intersects: bool,
    pub blocking_count: usize,
    pub blocking: Vec<BlockingWarning>,
}
