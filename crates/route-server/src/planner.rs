//! Planner core: FAST_PATH and STRICT strategies, iterative avoid-polygon
//! accretion, candidate scoring, escape-mode escalation, and time-budget
//! discipline.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use geo::algorithm::centroid::Centroid;
use route_core::geometry::{
    chunk_polyline_to_bboxes, corridor_polygon, create_avoid_polygon, geometry_intersects_polygon,
    line_buffer_polygon, safe_bbox, spread_pick,
};
use route_core::model::{
    AvoidPolygon, BBox, BlockingWarning, Coordinate, Obstacle, RouteCandidate, RouteStats, Vehicle,
};
use route_core::pipeline::{merge_obstacles, prioritize_obstacles, stable_obs_id};
use tracing::{info, instrument};

use crate::config::Config;
use crate::obstacle_client::{fetch_obstacles, ObstacleQuery};
use crate::router_client::{self, RouteError, RouteRequest};
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub start: Coordinate,
    pub end: Coordinate,
    pub vehicle: Vehicle,
    pub ts: DateTime<Utc>,
    pub tz: String,
    pub corridor_km: f64,
    pub roadworks_buffer_m: f64,
    pub roadworks_only_motorways: bool,
    pub alternates: i32,
    pub directions_language: String,
    pub avoid_buffer_km: f64,
    pub max_avoids_global: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStatus {
    Clean,
    Warn,
    Blocked,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Clean => "CLEAN",
            PlanStatus::Warn => "WARN",
            PlanStatus::Blocked => "BLOCKED",
        }
    }
}

pub struct PlanOutcome {
    pub status: PlanStatus,
    pub error: Option<String>,
    pub iterations: i32,
    pub avoids_applied: usize,
    pub bbox_km_used: Option<u32>,
    pub fallback_used: bool,
    pub phases: Vec<serde_json::Value>,
    pub best: Option<RouteCandidate>,
    pub alternates: Vec<geojson::FeatureCollection>,
}

/// Tracks the 55 s total plan budget. Every external call checks
/// `time_left() >= required` before being made.
struct TimeBudget {
    deadline: Instant,
}

impl TimeBudget {
    fn new(total_s: f64) -> Self {
        Self {
            deadline: Instant::now() + Duration::from_secs_f64(total_s),
        }
    }

    fn time_left(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    fn can_afford(&self, required_s: f64) -> bool {
        self.time_left().as_secs_f64() >= required_s
    }
}

struct AvoidAccumulator {
    ids: HashSet<String>,
    polygons: Vec<AvoidPolygon>,
    max: usize,
}

impl AvoidAccumulator {
    fn new(max: usize) -> Self {
        Self {
            ids: HashSet::new(),
            polygons: Vec::new(),
            max,
        }
    }

    /// Add avoid polygons for the given obstacles (already sorted narrowest
    /// first), skipping already-avoided ids and geometry failures, stopping
    /// at `per_iter_cap` new additions or the global cap. Returns the count
    /// actually added.
    fn add_many(&mut self, obstacles: &[Obstacle], buffer_km: f64, per_iter_cap: usize) -> usize {
        let mut added = 0;
        for obs in obstacles {
            if added >= per_iter_cap || self.polygons.len() >= self.max {
                break;
            }
            let id = stable_obs_id(obs);
            if self.ids.contains(&id) {
                continue;
            }
            if let Some(poly) = create_avoid_polygon(obs, buffer_km) {
                self.ids.insert(id);
                self.polygons.push(poly);
                added += 1;
            }
        }
        added
    }
}

/// Best-effort centroid of an obstacle's geometry, used to place blocking
/// warnings on the map. Falls back to the origin if the geometry can't be
/// converted or has no centroid (e.g. an empty collection).
fn obstacle_centroid(obs: &Obstacle) -> Coordinate {
    geo_types::Geometry::<f64>::try_from(obs.geometry.value.clone())
        .ok()
        .and_then(|g| g.centroid())
        .map(|c| Coordinate::new(c.x(), c.y()))
        .unwrap_or(Coordinate::new(0.0, 0.0))
}

/// Buffer the route by `route_buffer_km` and score it against the obstacle
/// set: `roadworksHits` for every intersection, `blockingWarnings` for those
/// whose limits the vehicle violates.
pub fn compute_route_stats(
    coords: &[Coordinate],
    obstacles: &[Obstacle],
    route_buffer_km: f64,
    vehicle: &Vehicle,
    avoided_ids: &HashSet<String>,
) -> RouteStats {
    let mut stats = RouteStats::default();
    let Some(buffer) = line_buffer_polygon(coords, route_buffer_km) else {
        return stats;
    };

    for obs in obstacles {
        if !geometry_intersects_polygon(&obs.geometry, &buffer) {
            continue;
        }
        stats.roadworks_hits += 1;
        if obs.limits.blocks(vehicle) {
            stats.blocking_warnings.push(BlockingWarning {
                title: obs.title.clone().unwrap_or_default(),
                description: obs.description.clone().unwrap_or_default(),
                limits: obs.limits,
                coords: obstacle_centroid(obs),
                already_avoided: avoided_ids.contains(&stable_obs_id(obs)),
            });
        }
    }
    stats
}

/// Obstacles on `coords`'s `route_buffer_km` buffer whose limits the vehicle
/// violates and which aren't already avoided, narrowest-limit first. This is
/// the route-relative violator set the convergence loops target — obstacles
/// elsewhere in the corridor but off the current best route are irrelevant.
fn find_violators(
    coords: &[Coordinate],
    obstacles: &[Obstacle],
    route_buffer_km: f64,
    vehicle: &Vehicle,
    avoided_ids: &HashSet<String>,
) -> Vec<Obstacle> {
    let Some(buffer) = line_buffer_polygon(coords, route_buffer_km) else {
        return Vec::new();
    };
    let mut violators: Vec<Obstacle> = obstacles
        .iter()
        .filter(|o| {
            o.limits.blocks(vehicle)
                && !avoided_ids.contains(&stable_obs_id(o))
                && geometry_intersects_polygon(&o.geometry, &buffer)
        })
        .cloned()
        .collect();
    violators.sort_by(|a, b| {
        (a.limits.width_limit(), a.limits.weight_limit())
            .partial_cmp(&(b.limits.width_limit(), b.limits.weight_limit()))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    violators
}

/// Lexicographic candidate preference: zero warnings beats some, then fewer
/// warnings, then fewer roadworks hits, then strictly shorter distance. Ties
/// keep `a`.
pub fn pick_better_candidate<'a>(a: &'a RouteCandidate, b: &'a RouteCandidate) -> &'a RouteCandidate {
    let a_warn = a.stats.blocking_warnings.len();
    let b_warn = b.stats.blocking_warnings.len();

    if a_warn == 0 && b_warn > 0 {
        return a;
    }
    if b_warn == 0 && a_warn > 0 {
        return b;
    }
    if a_warn != b_warn {
        return if b_warn < a_warn { b } else { a };
    }
    if a.stats.roadworks_hits != b.stats.roadworks_hits {
        return if b.stats.roadworks_hits < a.stats.roadworks_hits {
            b
        } else {
            a
        };
    }
    if a.stats.distance_km > 0.0 && b.stats.distance_km > 0.0 && a.stats.distance_km != b.stats.distance_km {
        return if b.stats.distance_km < a.stats.distance_km {
            b
        } else {
            a
        };
    }
    a
}

fn phase(name: &str, result: &str, extra: serde_json::Value) -> serde_json::Value {
    let mut obj = match extra {
        serde_json::Value::Object(m) => m,
        _ => serde_json::Map::new(),
    };
    obj.insert("phase".into(), serde_json::Value::from(name));
    obj.insert("result".into(), serde_json::Value::from(result));
    serde_json::Value::Object(obj)
}

fn phase_with_reason(name: &str, result: &str, reason: &str) -> serde_json::Value {
    phase(name, result, serde_json::json!({ "reason": reason }))
}

async fn call_router(
    state: &AppState,
    req: &PlanRequest,
    avoid_polygons: &[AvoidPolygon],
    alternates: i32,
    escape_mode: bool,
) -> Result<(Vec<Coordinate>, f64, f64, geojson::FeatureCollection), RouteError> {
    let route_req = RouteRequest {
        start: req.start,
        end: req.end,
        vehicle: &req.vehicle,
        avoid_polygons,
        alternates,
        language: req.directions_language.clone(),
        escape_mode,
    };
    let response = router_client::route(&state.router_client, &state.config, route_req).await?;
    let coords = router_client::all_coords(&response.legs);
    let distance_km = router_client::total_distance_km(&response.legs);
    let duration_s = router_client::total_duration_s(&response.legs);
    let fc = router_client::legs_to_feature_collection(&response.legs);
    Ok((coords, distance_km, duration_s, fc))
}

fn make_candidate(
    coords: Vec<Coordinate>,
    distance_km: f64,
    duration_s: f64,
    fc: geojson::FeatureCollection,
    obstacles: &[Obstacle],
    vehicle: &Vehicle,
    avoided_ids: &HashSet<String>,
    route_buffer_km: f64,
    avoids_applied: usize,
    bbox_km_used: Option<u32>,
    fallback_used: bool,
) -> RouteCandidate {
    let mut stats = compute_route_stats(&coords, obstacles, route_buffer_km, vehicle, avoided_ids);
    stats.distance_km = distance_km;
    stats.duration_s = duration_s;
    RouteCandidate {
        geojson: fc,
        stats,
        avoids_applied,
        bbox_km_used,
        fallback_used,
    }
}

/// FAST_PATH strategy for long trips (>= threshold).
#[instrument(skip(state, req))]
async fn fast_path(state: &AppState, req: &PlanRequest, budget: &TimeBudget) -> PlanOutcome {
    let cfg = &state.config;
    let mut phases = Vec::new();
    let route_buffer_km = cfg.route_buffer_m / 1000.0;

    // 1. Probe route with no exclusions.
    let probe = match call_router(state, req, &[], req.alternates, false).await {
        Ok(v) => v,
        Err(RouteError::Upstream(msg)) => {
            phases.push(phase_with_reason("FAST_PATH_PROBE", "error", &msg));
            return PlanOutcome {
                status: PlanStatus::Blocked,
                error: Some(msg),
                iterations: 0,
                avoids_applied: 0,
                bbox_km_used: None,
                fallback_used: false,
                phases,
                best: None,
                alternates: Vec::new(),
            };
        }
    };
    phases.push(phase("FAST_PATH", "ok", serde_json::json!({})));
    phases.push(phase("FAST_PATH_PROBE", "ok", serde_json::json!({})));

    // 2. Tile obstacles along the probe.
    let expand_km = req.corridor_km.min(28.0).max(10.0);
    let bboxes = chunk_polyline_to_bboxes(
        &probe.0,
        cfg.fast_path_chunk_km,
        cfg.fast_path_overlap_km,
        expand_km,
    );
    let tiles = spread_pick(&bboxes, cfg.fast_path_max_tiles);

    let mut obstacles = if budget.can_afford(cfg.obstacle_timeout_s) {
        let fetches = tiles.iter().map(|bbox| {
            fetch_obstacles(
                &state.obstacle_client,
                cfg,
                ObstacleQuery {
                    ts: req.ts,
                    tz: req.tz.clone(),
                    bbox: *bbox,
                    buffer_m: Some(req.roadworks_buffer_m),
                    only_motorways: false,
                },
            )
        });
        let results = futures::future::join_all(fetches).await;
        phases.push(phase(
            "FAST_PATH_TILES",
            "ok",
            serde_json::json!({ "tiles": tiles.len() }),
        ));
        let tile_errors = results.iter().filter(|r| r.meta.error.is_some()).count();
        if tile_errors > 0 {
            phases.push(phase(
                "FAST_PATH_TILES",
                "partial",
                serde_json::json!({ "tiles_failed": tile_errors }),
            ));
        }
        let batches = results.into_iter().map(|r| r.obstacles).collect();
        let merged = merge_obstacles(batches, cfg.fast_path_merge_cap);
        prioritize_obstacles(merged, req.start, req.end, req.corridor_km, cfg.fast_path_prioritize_cap)
    } else {
        phases.push(phase_with_reason(
            "FAST_PATH_TILES",
            "skipped",
            "time budget insufficient",
        ));
        Vec::new()
    };

    // 3. Score the probe.
    let mut avoided_ids: HashSet<String> = HashSet::new();
    let mut best_coords = probe.0.clone();
    let mut best = make_candidate(
        probe.0,
        probe.1,
        probe.2,
        probe.3,
        &obstacles,
        &req.vehicle,
        &avoided_ids,
        route_buffer_km,
        0,
        None,
        false,
    );
    let mut iterations = 1;

    if best.is_clean() {
        phases.push(phase("FAST_PATH_SCORE", "clean", serde_json::json!({})));
        return finish(best, iterations, phases, false, None);
    }
    phases.push(phase(
        "FAST_PATH_SCORE",
        "warn",
        serde_json::json!({ "blocking_warnings": best.stats.blocking_warnings.len() }),
    ));

    // 4. Convergence loop.
    let mut avoids = AvoidAccumulator::new(req.max_avoids_global.min(cfg.fast_path_max_avoids));
    for iter in 0..cfg.fast_path_max_iterations {
        if best.is_clean() {
            break;
        }
        if !budget.can_afford(cfg.router_timeout_s + 2.5) {
            phases.push(phase_with_reason(
                "FAST_PATH_ITERATION",
                "stopped",
                "time budget insufficient",
            ));
            break;
        }

        let to_add = find_violators(&best_coords, &obstacles, route_buffer_km, &req.vehicle, &avoided_ids);

        let added = avoids.add_many(&to_add, req.avoid_buffer_km, cfg.fast_path_max_new_avoids_per_iter);
        if added == 0 {
            phases.push(phase_with_reason(
                "FAST_PATH_ITERATION",
                "stopped",
                "no new avoids addable",
            ));
            break;
        }
        avoided_ids = avoids.ids.clone();

        match call_router(state, req, &avoids.polygons, 3, true).await {
            Ok((coords, dist, dur, fc)) => {
                let candidate = make_candidate(
                    coords.clone(),
                    dist,
                    dur,
                    fc,
                    &obstacles,
                    &req.vehicle,
                    &avoided_ids,
                    route_buffer_km,
                    avoids.polygons.len(),
                    None,
                    false,
                );
                iterations += 1;
                let better = pick_better_candidate(&best, &candidate);
                let candidate_wins = std::ptr::eq(better, &candidate);
                best = better.clone();
                if candidate_wins {
                    best_coords = coords;
                }
                phases.push(phase(
                    "FAST_PATH_ITERATION",
                    "ok",
                    serde_json::json!({ "iteration": iter + 1, "avoids_applied": avoids.polygons.len() }),
                ));
            }
            Err(RouteError::Upstream(msg)) => {
                phases.push(phase_with_reason("FAST_PATH_ITERATION", "error", &msg));
                break;
            }
        }
    }

    // 5. Escape pass.
    if !best.is_clean() && budget.can_afford(cfg.router_timeout_s + 2.5) {
        if let Ok((coords, dist, dur, fc)) = call_router(state, req, &avoids.polygons, 3, true).await {
            let candidate = make_candidate(
                coords,
                dist,
                dur,
                fc,
                &obstacles,
                &req.vehicle,
                &avoided_ids,
                route_buffer_km,
                avoids.polygons.len(),
                None,
                false,
            );
            iterations += 1;
            best = pick_better_candidate(&best, &candidate).clone();
            phases.push(phase("FAST_PATH_ESCAPE", "ok", serde_json::json!({})));
        }
    }

    let avoids_applied = avoids.polygons.len();
    finish(best, iterations, phases, false, Some(avoids_applied))
}

fn finish(
    best: RouteCandidate,
    iterations: i32,
    phases: Vec<serde_json::Value>,
    fallback_used: bool,
    _avoids_hint: Option<usize>,
) -> PlanOutcome {
    let status = if best.is_clean() {
        PlanStatus::Clean
    } else {
        PlanStatus::Warn
    };
    let avoids_applied = best.avoids_applied;
    let bbox_km_used = best.bbox_km_used;
    PlanOutcome {
        status,
        error: None,
        iterations,
        avoids_applied,
        bbox_km_used,
        fallback_used: best.fallback_used || fallback_used,
        phases,
        best: Some(best),
        alternates: Vec::new(),
    }
}

const STRICT_BBOX_STEPS_KM: [f64; 5] = [200.0, 400.0, 800.0, 1400.0, 2200.0];

/// STRICT strategy for short trips (< threshold).
#[instrument(skip(state, req))]
async fn strict(state: &AppState, req: &PlanRequest, budget: &TimeBudget) -> PlanOutcome {
    let cfg = &state.config;
    let mut phases = Vec::new();
    let route_buffer_km = cfg.route_buffer_m / 1000.0;

    let mut avoids = AvoidAccumulator::new(req.max_avoids_global.min(cfg.strict_max_avoids));
    let mut avoided_ids: HashSet<String> = HashSet::new();
    let mut best: Option<RouteCandidate> = None;
    let mut best_coords: Vec<Coordinate> = Vec::new();
    let mut iterations = 0i32;
    let mut bbox_km_used: Option<u32> = None;
    let mut alternates_kept: Vec<geojson::FeatureCollection> = Vec::new();
    let mut seen_alt_distances: Vec<f64> = Vec::new();

    'steps: for &step_km in STRICT_BBOX_STEPS_KM.iter() {
        if !budget.can_afford(cfg.obstacle_timeout_s) {
            phases.push(phase_with_reason(
                "STRICT_STEP",
                "skipped",
                "time budget insufficient",
            ));
            break;
        }
        let bbox: BBox = safe_bbox(req.start, req.end, step_km);
        let fetch = fetch_obstacles(
            &state.obstacle_client,
            cfg,
            ObstacleQuery {
                ts: req.ts,
                tz: req.tz.clone(),
                bbox,
                buffer_m: Some(req.roadworks_buffer_m),
                only_motorways: req.roadworks_only_motorways,
            },
        )
        .await;

        let corridor_km = (req.corridor_km.max(step_km * 0.04)).min(90.0);
        let obstacles = prioritize_obstacles(
            merge_obstacles(vec![fetch.obstacles], cfg.strict_merge_cap),
            req.start,
            req.end,
            corridor_km,
            cfg.strict_prioritize_cap,
        );
        bbox_km_used = Some(step_km as u32);
        phases.push(phase(
            "STRICT_STEP",
            "ok",
            serde_json::json!({
                "bbox_km": step_km,
                "obstacles": obstacles.len(),
                "fetch_error": fetch.meta.error,
            }),
        ));

        for iter in 0..cfg.strict_max_router_iterations {
            if !budget.can_afford(cfg.router_timeout_s + 2.5) {
                phases.push(phase_with_reason(
                    "STRICT_ITERATION",
                    "stopped",
                    "time budget insufficient",
                ));
                break 'steps;
            }
            let escape_mode = !avoids.polygons.is_empty();
            let alternates = if escape_mode { 3 } else { req.alternates };

            match call_router(state, req, &avoids.polygons, alternates, escape_mode).await {
                Ok((coords, dist, dur, fc)) => {
                    iterations += 1;
                    if seen_alt_distances.len() < cfg.strict_max_alternates_kept
                        && !seen_alt_distances.iter().any(|d| (*d - dist).abs() < 0.01)
                    {
                        seen_alt_distances.push(dist);
                        alternates_kept.push(fc.clone());
                    }
                    let candidate = make_candidate(
                        coords.clone(),
                        dist,
                        dur,
                        fc,
                        &obstacles,
                        &req.vehicle,
                        &avoided_ids,
                        route_buffer_km,
                        avoids.polygons.len(),
                        bbox_km_used,
                        false,
                    );
                    best = Some(match best.take() {
                        Some(prev) => {
                            let better = pick_better_candidate(&prev, &candidate);
                            let candidate_wins = std::ptr::eq(better, &candidate);
                            let merged = better.clone();
                            if candidate_wins {
                                best_coords = coords;
                            }
                            merged
                        }
                        None => {
                            best_coords = coords;
                            candidate
                        }
                    });
                    phases.push(phase(
                        "STRICT_ITERATION",
                        "ok",
                        serde_json::json!({ "iteration": iter + 1 }),
                    ));
                    if best.as_ref().unwrap().is_clean() {
                        break 'steps;
                    }
                }
                Err(RouteError::Upstream(msg)) => {
                    phases.push(phase_with_reason("STRICT_ITERATION", "error", &msg));
                    break;
                }
            }

            let sorted = find_violators(&best_coords, &obstacles, route_buffer_km, &req.vehicle, &avoided_ids);
            let added = avoids.add_many(&sorted, req.avoid_buffer_km, cfg.strict_max_new_avoids_per_iter);
            avoided_ids = avoids.ids.clone();
            if added == 0 {
                break;
            }
        }
    }

    let mut fallback_used = false;
    if best.is_none() {
        if budget.can_afford(cfg.router_timeout_s + 2.5) {
            match call_router(state, req, &[], req.alternates, false).await {
                Ok((coords, dist, dur, fc)) => {
                    fallback_used = true;
                    iterations += 1;
                    best = Some(make_candidate(
                        coords,
                        dist,
                        dur,
                        fc,
                        &[],
                        &req.vehicle,
                        &avoided_ids,
                        route_buffer_km,
                        0,
                        bbox_km_used,
                        true,
                    ));
                    phases.push(phase("STRICT_FALLBACK", "ok", serde_json::json!({})));
                }
                Err(RouteError::Upstream(msg)) => {
                    phases.push(phase_with_reason("STRICT_FALLBACK", "error", &msg));
                    return PlanOutcome {
                        status: PlanStatus::Blocked,
                        error: Some(msg),
                        iterations,
                        avoids_applied: avoids.polygons.len(),
                        bbox_km_used,
                        fallback_used: true,
                        phases,
                        best: None,
                        alternates: Vec::new(),
                    };
                }
            }
        } else {
            phases.push(phase_with_reason(
                "STRICT_FALLBACK",
                "skipped",
                "time budget insufficient",
            ));
            return PlanOutcome {
                status: PlanStatus::Blocked,
                error: Some("no route could be produced within the time budget".to_string()),
                iterations,
                avoids_applied: avoids.polygons.len(),
                bbox_km_used,
                fallback_used: false,
                phases,
                best: None,
                alternates: Vec::new(),
            };
        }
    }

    let mut best = best.expect("best is populated by the fallback branch above");

    if !best.is_clean() && budget.can_afford(cfg.router_timeout_s + 2.5) {
        if let Ok((coords, dist, dur, fc)) = call_router(state, req, &avoids.polygons, 3, true).await {
            iterations += 1;
            let candidate = make_candidate(
                coords,
                dist,
                dur,
                fc,
                &[],
                &req.vehicle,
                &avoided_ids,
                route_buffer_km,
                avoids.polygons.len(),
                bbox_km_used,
                fallback_used,
            );
            best = pick_better_candidate(&best, &candidate).clone();
            phases.push(phase("STRICT_ESCAPE", "ok", serde_json::json!({})));
        }
    }

    let status = if best.is_clean() {
        PlanStatus::Clean
    } else {
        PlanStatus::Warn
    };
    PlanOutcome {
        status,
        error: None,
        iterations,
        avoids_applied: avoids.polygons.len(),
        bbox_km_used,
        fallback_used,
        phases,
        best: Some(best),
        alternates: alternates_kept,
    }
}

/// Dispatch by great-circle distance and run the selected strategy under the
/// global plan-budget.
pub async fn plan(state: &AppState, req: PlanRequest) -> PlanOutcome {
    let budget = TimeBudget::new(state.config.plan_budget_s);
    let distance_km = route_core::geometry::haversine(req.start, req.end);
    info!(distance_km, "dispatching plan request");

    if distance_km >= state.config.fast_path_threshold_km {
        fast_path(state, &req, &budget).await
    } else {
        strict(state, &req, &budget).await
    }
}

/// Cheap pre-planning verdict for `POST /route/precheck`.
pub async fn precheck(
    state: &AppState,
    start: Coordinate,
    end: Coordinate,
    vehicle: &Vehicle,
    ts: DateTime<Utc>,
    tz: &str,
    roadworks_buffer_m: f64,
) -> (PlanStatus, bool, usize, Vec<BlockingWarning>) {
    let cfg = &state.config;
    let buffer_km = (roadworks_buffer_m / 1000.0).max(cfg.precheck_min_buffer_km) * 1.2;
    let bbox = safe_bbox(start, end, buffer_km);
    let fetch = fetch_obstacles(
        &state.obstacle_client,
        cfg,
        ObstacleQuery {
            ts,
            tz: tz.to_string(),
            bbox,
            buffer_m: Some(roadworks_buffer_m),
            only_motorways: false,
        },
    )
    .await;

    let corridor = corridor_polygon(start, end, buffer_km);
    let intersecting: Vec<Obstacle> = fetch
        .obstacles
        .into_iter()
        .filter(|o| geometry_intersects_polygon(&o.geometry, &corridor))
        .collect();

    let blocking: Vec<BlockingWarning> = intersecting
        .iter()
        .filter(|o| o.limits.blocks(vehicle))
        .map(|o| BlockingWarning {
            title: o.title.clone().unwrap_or_default(),
            description: o.description.clone().unwrap_or_default(),
            limits: o.limits,
            coords: obstacle_centroid(o),
            already_avoided: false,
        })
        .collect();

    let status = if intersecting.is_empty() {
        PlanStatus::Clean
    } else if blocking.is_empty() {
        PlanStatus::Clean
    } else if blocking.len() == intersecting.len() {
        PlanStatus::Blocked
    } else {
        PlanStatus::Warn
    };

    (status, !intersecting.is_empty(), blocking.len(), blocking)
}
