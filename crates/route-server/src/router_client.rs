//! Routing engine client: builds a truck-costing request with exclusion
//! polygons and decodes the polyline6-encoded response into GeoJSON line
//! features with per-leg summary and maneuvers.

use route_core::model::{AvoidPolygon, Coordinate, Vehicle};
use route_core::polyline;
use serde::Serialize;
use serde_json::Value as Json;

use crate::config::Config;

pub struct RouteRequest<'a> {
    pub start: Coordinate,
    pub end: Coordinate,
    pub vehicle: &'a Vehicle,
    pub avoid_polygons: &'a [AvoidPolygon],
    pub alternates: i32,
    pub language: String,
    pub escape_mode: bool,
}

#[derive(Debug, Serialize)]
struct TruckCostingOptions {
    width: f64,
    height: f64,
    weight: f64,
    axle_load: f64,
    use_highways: f64,
    shortest: bool,
    country_crossing_penalty: f64,
    hazmat: bool,
    maneuver_penalty: f64,
    gate_penalty: f64,
    service_penalty: f64,
}

impl TruckCostingOptions {
    fn build(vehicle: &Vehicle, escape_mode: bool) -> Self {
        let (maneuver_penalty, gate_penalty, service_penalty) = if escape_mode {
            (2000.0, 10_000_000.0, 10_000_000.0)
        } else {
            (5.0, 300.0, 0.0)
        };
        Self {
            width: vehicle.width_m,
            height: vehicle.height_m,
            weight: vehicle.weight_t * 1000.0,
            axle_load: vehicle.axleload_t * 1000.0,
            use_highways: 1.0,
            shortest: false,
            country_crossing_penalty: 0.0,
            hazmat: true,
            maneuver_penalty,
            gate_penalty,
            service_penalty,
        }
    }
}

#[derive(Debug, Serialize)]
struct DirectionsOptions {
    language: String,
}

#[derive(Debug, Serialize)]
struct Manifest {
    costing: &'static str,
    costing_options: CostingOptionsWrapper,
    locations: Vec<Location>,
    units: &'static str,
    alternates: i32,
    directions_options: DirectionsOptions,
    exclude_polygons: Vec<Vec<(f64, f64)>>,
    avoid_polygons: Vec<Vec<(f64, f64)>>,
}

#[derive(Debug, Serialize)]
struct CostingOptionsWrapper {
    truck: TruckCostingOptions,
}

#[derive(Debug, Serialize)]
struct Location {
    lat: f64,
    lon: f64,
}

impl From<Coordinate> for Location {
    fn from(c: Coordinate) -> Self {
        Self { lat: c.lat, lon: c.lon }
    }
}

fn build_manifest(req: &RouteRequest) -> Manifest {
    // Exclusion polygons are attached under both keys defensively: backends
    // in this family vary on which key they read.
    let rings: Vec<Vec<(f64, f64)>> = req.avoid_polygons.iter().map(|p| p.ring.clone()).collect();

    Manifest {
        costing: "truck",
        costing_options: CostingOptionsWrapper {
            truck: TruckCostingOptions::build(req.vehicle, req.escape_mode),
        },
        locations: vec![req.start.into(), req.end.into()],
        units: "kilometers",
        alternates: req.alternates,
        directions_options: DirectionsOptions {
            language: req.language.clone(),
        },
        exclude_polygons: rings.clone(),
        avoid_polygons: rings,
    }
}

#[derive(Debug, Clone)]
pub struct RouteLeg {
    pub coords: Vec<Coordinate>,
    pub distance_km: f64,
    pub duration_s: f64,
    pub maneuvers: Vec<RouteManeuver>,
    pub street_names: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RouteManeuver {
    pub instruction: String,
    pub distance_km: f64,
    pub duration_s: f64,
    pub street_names: Vec<String>,
}

pub struct RouteResponse {
    pub legs: Vec<RouteLeg>,
}

pub enum RouteError {
    /// Non-OK HTTP from the router, or the body could not be parsed.
    Upstream(String),
}

/// Call the truck-routing engine. Deadline is the `router_client`'s own
/// `reqwest::Client` timeout. Returns `Err` only on a failed/non-OK call or
/// a response that decodes to zero legs — the planner treats both the same
/// way (router error text surfaces in the phase log).
pub async fn route(
    client: &reqwest::Client,
    config: &Config,
    req: RouteRequest<'_>,
) -> Result<RouteResponse, RouteError> {
    let manifest = build_manifest(&req);
    let url = format!("{}/route", config.router_service_url.trim_end_matches('/'));

    let response = client
        .post(&url)
        .json(&manifest)
        .send()
        .await
        .map_err(|e| RouteError::Upstream(format!("router request failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(RouteError::Upstream(format!(
            "router returned HTTP {status}: {body}"
        )));
    }

    let body: Json = response
        .json()
        .await
        .map_err(|e| RouteError::Upstream(format!("failed to parse router response: {e}")))?;

    let legs_json = body
        .pointer("/trip/legs")
        .and_then(Json::as_array)
        .cloned()
        .unwrap_or_default();

    if legs_json.is_empty() {
        let message = body
            .get("error")
            .and_then(Json::as_str)
            .unwrap_or("router returned zero legs")
            .to_string();
        return Err(RouteError::Upstream(message));
    }

    let legs = legs_json.iter().map(decode_leg).collect();
    Ok(RouteResponse { legs })
}

fn decode_leg(leg: &Json) -> RouteLeg {
    let shape = leg.get("shape").and_then(Json::as_str).unwrap_or("");
    let coords = polyline::decode(shape);

    let summary = leg.get("summary");
    let distance_km = summary
        .and_then(|s| s.get("length"))
        .and_then(Json::as_f64)
        .unwrap_or(0.0);
    let duration_s = summary
        .and_then(|s| s.get("time"))
        .and_then(Json::as_f64)
        .unwrap_or(0.0);

    let maneuvers = leg
        .get("maneuvers")
        .and_then(Json::as_array)
        .map(|arr| arr.iter().map(decode_maneuver).collect())
        .unwrap_or_default();

    let street_names = maneuvers
        .iter()
        .flat_map(|m: &RouteManeuver| m.street_names.clone())
        .collect();

    RouteLeg {
        coords,
        distance_km,
        duration_s,
        maneuvers,
        street_names,
    }
}

fn decode_maneuver(m: &Json) -> RouteManeuver {
    RouteManeuver {
        instruction: m.get("instruction").and_then(Json::as_str).unwrap_or("").to_string(),
        distance_km: m.get("length").and_then(Json::as_f64).unwrap_or(0.0),
        duration_s: m.get("time").and_then(Json::as_f64).unwrap_or(0.0),
        street_names: m
            .get("street_names")
            .and_then(Json::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default(),
    }
}

/// Convert decoded legs into a GeoJSON FeatureCollection, one LineString
/// feature per leg, carrying leg index, summary, maneuvers and streets.
pub fn legs_to_feature_collection(legs: &[RouteLeg]) -> geojson::FeatureCollection {
    let features = legs
        .iter()
        .enumerate()
        .map(|(idx, leg)| {
            let line = geojson::Value::LineString(leg.coords.iter().map(|c| vec![c.lon, c.lat]).collect());
            let maneuvers_json: Vec<Json> = leg
                .maneuvers
                .iter()
                .map(|m| {
                    serde_json::json!({
                        "instruction": m.instruction,
                        "distance_km": m.distance_km,
                        "duration_s": m.duration_s,
                        "street_names": m.street_names,
                    })
                })
                .collect();

            let mut properties = serde_json::Map::new();
            properties.insert("leg_index".into(), Json::from(idx));
            properties.insert(
                "summary".into(),
                serde_json::json!({ "distance_km": leg.distance_km, "duration_s": leg.duration_s }),
            );
            properties.insert("maneuvers".into(), Json::Array(maneuvers_json));
            properties.insert("streets_sequence".into(), Json::Array(
                leg.street_names.iter().cloned().map(Json::from).collect(),
            ));

            geojson::Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(line)),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Total distance across all legs, in kilometres.
pub fn total_distance_km(legs: &[RouteLeg]) -> f64 {
    legs.iter().map(|l| l.distance_km).sum()
}

/// Total duration across all legs, in seconds.
pub fn total_duration_s(legs: &[RouteLeg]) -> f64 {
    legs.iter().map(|l| l.duration_s).sum()
}

/// All coordinates across all legs, concatenated in order.
pub fn all_coords(legs: &[RouteLeg]) -> Vec<Coordinate> {
    legs.iter().flat_map(|l| l.coords.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_mode_raises_penalties() {
        let vehicle = Vehicle::default();
        let normal = TruckCostingOptions::build(&vehicle, false);
        let escape = TruckCostingOptions::build(&vehicle, true);
        assert!(escape.gate_penalty > normal.gate_penalty);
        assert!(escape.maneuver_penalty > normal.maneuver_penalty);
    }

    #[test]
    fn weight_and_axle_load_convert_tonnes_to_kilograms() {
        let vehicle = Vehicle {
            weight_t: 40.0,
            axleload_t: 10.0,
            ..Vehicle::default()
        };
        let opts = TruckCostingOptions::build(&vehicle, false);
        assert_eq!(opts.weight, 40_000.0);
        assert_eq!(opts.axle_load, 10_000.0);
    }
}
