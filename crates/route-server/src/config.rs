//! Server configuration from environment.

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub cors_permissive: bool,
    pub log_format_json: bool,

    pub obstacle_service_url: String,
    pub obstacle_service_token: String,
    pub router_service_url: String,

    pub obstacle_timeout_s: f64,
    pub router_timeout_s: f64,
    pub plan_budget_s: f64,

    pub fast_path_threshold_km: f64,
    pub fast_path_chunk_km: f64,
    pub fast_path_overlap_km: f64,
    pub fast_path_max_tiles: usize,
    pub fast_path_merge_cap: usize,
    pub fast_path_prioritize_cap: usize,
    pub fast_path_max_iterations: usize,
    pub fast_path_max_avoids: usize,
    pub fast_path_max_new_avoids_per_iter: usize,

    pub strict_merge_cap: usize,
    pub strict_prioritize_cap: usize,
    pub strict_max_router_iterations: usize,
    pub strict_max_avoids: usize,
    pub strict_max_new_avoids_per_iter: usize,
    pub strict_max_alternates_kept: usize,

    pub route_buffer_m: f64,
    pub min_avoid_buffer_m: f64,
    pub max_avoid_buffer_bonus_m: f64,

    pub precheck_min_buffer_km: f64,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env::var("ROUTE_PLANNER_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            cors_permissive: env_parse("ROUTE_PLANNER_CORS_PERMISSIVE", true),
            log_format_json: env_parse("ROUTE_PLANNER_LOG_FORMAT_JSON", false),

            obstacle_service_url: env::var("OBSTACLE_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:4000".to_string()),
            obstacle_service_token: env::var("OBSTACLE_SERVICE_TOKEN").unwrap_or_default(),
            router_service_url: env::var("ROUTER_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8002".to_string()),

            obstacle_timeout_s: env_parse("OBSTACLE_TIMEOUT_S", 4.5),
            router_timeout_s: env_parse("ROUTER_TIMEOUT_S", 14.0),
            plan_budget_s: env_parse("PLAN_BUDGET_S", 55.0),

            fast_path_threshold_km: env_parse("FAST_PATH_THRESHOLD_KM", 220.0),
            fast_path_chunk_km: env_parse("FAST_PATH_CHUNK_KM", 260.0),
            fast_path_overlap_km: env_parse("FAST_PATH_OVERLAP_KM", 45.0),
            fast_path_max_tiles: env_parse("FAST_PATH_MAX_TILES", 4),
            fast_path_merge_cap: env_parse("FAST_PATH_MERGE_CAP", 1800),
            fast_path_prioritize_cap: env_parse("FAST_PATH_PRIORITIZE_CAP", 1400),
            fast_path_max_iterations: env_parse("FAST_PATH_MAX_ITERATIONS", 8),
            fast_path_max_avoids: env_parse("FAST_PATH_MAX_AVOIDS", 50),
            fast_path_max_new_avoids_per_iter: env_parse("FAST_PATH_MAX_NEW_AVOIDS_PER_ITER", 8),

            strict_merge_cap: env_parse("STRICT_MERGE_CAP", 1600),
            strict_prioritize_cap: env_parse("STRICT_PRIORITIZE_CAP", 1600),
            strict_max_router_iterations: env_parse("STRICT_MAX_ROUTER_ITERATIONS", 7),
            strict_max_avoids: env_parse("STRICT_MAX_AVOIDS", 60),
            strict_max_new_avoids_per_iter: env_parse("STRICT_MAX_NEW_AVOIDS_PER_ITER", 7),
            strict_max_alternates_kept: env_parse("STRICT_MAX_ALTERNATES_KEPT", 2),

            route_buffer_m: env_parse("ROUTE_BUFFER_M", 20.0),
            min_avoid_buffer_m: env_parse("MIN_AVOID_BUFFER_M", 30.0),
            max_avoid_buffer_bonus_m: env_parse("MAX_AVOID_BUFFER_BONUS_M", 150.0),

            precheck_min_buffer_km: env_parse("PRECHECK_MIN_BUFFER_KM", 200.0),
        }
    }
}
