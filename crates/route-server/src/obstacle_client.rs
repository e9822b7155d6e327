//! Obstacle service client: fetches active road-works/restrictions for a
//! bbox and enriches missing numeric limits from free text. Never throws —
//! every failure mode degrades to an empty feature collection plus a
//! diagnostic meta flag.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use route_core::model::{BBox, Obstacle, ObstacleLimits};
use serde_json::Value as Json;
use tracing::warn;

use crate::config::Config;

pub struct ObstacleQuery {
    pub ts: DateTime<Utc>,
    pub tz: String,
    pub bbox: BBox,
    pub buffer_m: Option<f64>,
    pub only_motorways: bool,
}

#[derive(Debug, Default, Clone)]
pub struct ObstacleFetchMeta {
    pub fetched: usize,
    pub used: usize,
    pub timeout_ms_used: u64,
    pub error: Option<String>,
}

pub struct ObstacleFetchResult {
    pub obstacles: Vec<Obstacle>,
    pub meta: ObstacleFetchMeta,
}

impl ObstacleFetchResult {
    fn empty(error: impl Into<String>) -> Self {
        Self {
            obstacles: Vec::new(),
            meta: ObstacleFetchMeta {
                fetched: 0,
                used: 0,
                timeout_ms_used: 0,
                error: Some(error.into()),
            },
        }
    }
}

/// Fetch obstacles for a bbox. Deadline is enforced by the client's own
/// `reqwest::Client` timeout (see `state::AppState::new`); any failure here
/// (timeout, HTTP error, malformed body) is swallowed into `meta.error`.
pub async fn fetch_obstacles(
    client: &reqwest::Client,
    config: &Config,
    query: ObstacleQuery,
) -> ObstacleFetchResult {
    let body = serde_json::json!({
        "ts": query.ts.to_rfc3339(),
        "tz": query.tz,
        "bbox": query.bbox.as_array(),
        "buffer_m": query.buffer_m,
        "only_motorways": query.only_motorways,
        "timeout_ms": (config.obstacle_timeout_s * 1000.0) as u64,
    });

    let url = format!("{}/obstacles", config.obstacle_service_url.trim_end_matches('/'));
    let mut req = client.post(&url).json(&body);
    if !config.obstacle_service_token.is_empty() {
        req = req.bearer_auth(&config.obstacle_service_token);
    }

    let response = match req.send().await {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "obstacle service request failed");
            return ObstacleFetchResult::empty(format!("obstacle service request failed: {e}"));
        }
    };

    if !response.status().is_success() {
        let status = response.status();
        return ObstacleFetchResult::empty(format!("obstacle service returned HTTP {status}"));
    }

    let text = match response.text().await {
        Ok(t) => t,
        Err(e) => return ObstacleFetchResult::empty(format!("failed to read obstacle response: {e}")),
    };

    let geojson: geojson::GeoJson = match text.parse() {
        Ok(g) => g,
        Err(e) => return ObstacleFetchResult::empty(format!("non-JSON obstacle response: {e}")),
    };

    let collection = match geojson {
        geojson::GeoJson::FeatureCollection(fc) => fc,
        _ => return ObstacleFetchResult::empty("obstacle response was not a FeatureCollection"),
    };

    let fetched = collection.features.len();
    let mut obstacles: Vec<Obstacle> = collection
        .features
        .into_iter()
        .filter_map(feature_to_obstacle)
        .collect();

    enrich_missing_limits(&mut obstacles);

    if query.only_motorways {
        obstacles.retain(|o| o.is_motorway());
    }

    let used = obstacles.len();
    ObstacleFetchResult {
        obstacles,
        meta: ObstacleFetchMeta {
            fetched,
            used,
            timeout_ms_used: (config.obstacle_timeout_s * 1000.0) as u64,
            error: None,
        },
    }
}

/// Render a fetch result back into a GeoJSON FeatureCollection, carrying
/// `meta` as a foreign member, for the `/roadworks` proxy endpoint.
pub fn to_feature_collection(result: &ObstacleFetchResult) -> geojson::FeatureCollection {
    let features = result.obstacles.iter().map(obstacle_to_feature).collect();
    let mut foreign_members = serde_json::Map::new();
    foreign_members.insert(
        "meta".into(),
        serde_json::json!({
            "fetched": result.meta.fetched,
            "used": result.meta.used,
            "timeout_ms_used": result.meta.timeout_ms_used,
            "error": result.meta.error,
        }),
    );
    geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(foreign_members),
    }
}

fn obstacle_to_feature(obs: &Obstacle) -> geojson::Feature {
    let mut properties = serde_json::Map::new();
    properties.insert("id".into(), Json::from(obs.id.clone()));
    properties.insert(
        "max_width_m".into(),
        obs.limits.max_width_m.map(Json::from).unwrap_or(Json::Null),
    );
    properties.insert(
        "max_weight_t".into(),
        obs.limits.max_weight_t.map(Json::from).unwrap_or(Json::Null),
    );
    for (key, value) in [
        ("title", &obs.title),
        ("description", &obs.description),
        ("reason", &obs.reason),
        ("subtitle", &obs.subtitle),
        ("source_system", &obs.source_system),
        ("source", &obs.source),
        ("external_id", &obs.external_id),
    ] {
        properties.insert(key.into(), value.clone().map(Json::from).unwrap_or(Json::Null));
    }

    geojson::Feature {
        bbox: None,
        geometry: Some(obs.geometry.clone()),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn feature_to_obstacle(feature: geojson::Feature) -> Option<Obstacle> {
    let geometry = feature.geometry?;
    let props = feature.properties.unwrap_or_default();

    let str_prop = |key: &str| -> Option<String> {
        props.get(key).and_then(Json::as_str).map(str::to_string)
    };
    let num_prop = |key: &str| -> Option<f64> { props.get(key).and_then(Json::as_f64) };

    let max_width_m = num_prop("max_width_m")
        .or_else(|| num_prop("maxWidth"))
        .or_else(|| num_prop("width_limit_m"));
    let max_weight_t = num_prop("max_weight_t")
        .or_else(|| num_prop("maxWeight"))
        .or_else(|| num_prop("weight_limit_t"));

    Some(Obstacle {
        id: str_prop("id").unwrap_or_default(),
        geometry,
        limits: ObstacleLimits {
            max_width_m,
            max_weight_t,
        },
        valid_from: str_prop("valid_from")
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&Utc)),
        valid_to: str_prop("valid_to")
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|d| d.with_timezone(&Utc)),
        title: str_prop("title"),
        description: str_prop("description"),
        reason: str_prop("reason"),
        subtitle: str_prop("subtitle"),
        source_system: str_prop("source_system"),
        source: str_prop("source"),
        external_id: str_prop("external_id"),
        roadwork_id: str_prop("roadwork_id"),
        restriction_id: str_prop("restriction_id"),
        raw_id: str_prop("id"),
    })
}

struct EnrichmentPatterns {
    width: Vec<Regex>,
    weight: Regex,
}

fn patterns() -> &'static EnrichmentPatterns {
    static PATTERNS: OnceLock<EnrichmentPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| EnrichmentPatterns {
        width: vec![
            Regex::new(r"(?i)(Breite|width)\D*([0-9]+([.,][0-9]+)?)\s*m").unwrap(),
            Regex::new(r"(?i)([0-9]+([.,][0-9]+)?)\s*m\s*(Breite|width)").unwrap(),
            Regex::new(r"(?i)(über|over|width)\s*([0-9]+([.,][0-9]+)?)\s*m").unwrap(),
        ],
        weight: Regex::new(r"(?i)(Gewicht|weight|Last)\D*([0-9]+([.,][0-9]+)?)\s*t").unwrap(),
    })
}

fn parse_decimal(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse::<f64>().ok()
}

/// Recover `max_width_m`/`max_weight_t` from free text when the structured
/// fields are missing or carry the "not limiting" sentinel (> 900).
fn enrich_missing_limits(obstacles: &mut [Obstacle]) {
    let p = patterns();
    for obs in obstacles.iter_mut() {
        let needs_width = !matches!(obs.limits.max_width_m, Some(w) if w > 0.0 && w <= 900.0);
        let needs_weight = !matches!(obs.limits.max_weight_t, Some(w) if w > 0.0);
        if !needs_width && !needs_weight {
            continue;
        }
        let text = obs.free_text();
        if needs_width {
            for re in &p.width {
                if let Some(caps) = re.captures(&text) {
                    let numeric = caps
                        .iter()
                        .skip(1)
                        .find_map(|m| m.and_then(|m| parse_decimal(m.as_str())));
                    if let Some(value) = numeric {
                        obs.limits.max_width_m = Some(value);
                        break;
                    }
                }
            }
        }
        if needs_weight {
            if let Some(caps) = p.weight.captures(&text) {
                let numeric = caps
                    .iter()
                    .skip(1)
                    .find_map(|m| m.and_then(|m| parse_decimal(m.as_str())));
                if let Some(value) = numeric {
                    obs.limits.max_weight_t = Some(value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obstacle_with_text(description: &str) -> Obstacle {
        Obstacle {
            id: "o1".into(),
            geometry: geojson::Geometry::new(geojson::Value::Point(vec![7.0, 51.0])),
            limits: ObstacleLimits::default(),
            valid_from: None,
            valid_to: None,
            title: None,
            description: Some(description.to_string()),
            reason: None,
            subtitle: None,
            source_system: None,
            source: None,
            external_id: None,
            roadwork_id: None,
            restriction_id: None,
            raw_id: None,
        }
    }

    #[test]
    fn recovers_width_from_german_phrase() {
        let mut obstacles = vec![obstacle_with_text("Verbot für Fahrzeuge über 2,10 m")];
        enrich_missing_limits(&mut obstacles);
        assert_eq!(obstacles[0].limits.max_width_m, Some(2.10));
    }

    #[test]
    fn recovers_weight_from_english_phrase() {
        let mut obstacles = vec![obstacle_with_text("closed for vehicles weight over 7.5 t")];
        enrich_missing_limits(&mut obstacles);
        assert_eq!(obstacles[0].limits.max_weight_t, Some(7.5));
    }

    #[test]
    fn leaves_structured_limits_untouched() {
        let mut obstacles = vec![obstacle_with_text("width 1.5 m")];
        obstacles[0].limits.max_width_m = Some(3.2);
        enrich_missing_limits(&mut obstacles);
        assert_eq!(obstacles[0].limits.max_width_m, Some(3.2));
    }

    #[test]
    fn motorway_filter_keeps_external_id_or_autobahn_source() {
        let mut with_ext = obstacle_with_text("");
        with_ext.external_id = Some("A1-123".into());
        assert!(with_ext.is_motorway());

        let mut with_source = obstacle_with_text("");
        with_source.source_system = Some("Autobahn GmbH".into());
        assert!(with_source.is_motorway());

        let plain = obstacle_with_text("");
        assert!(!plain.is_motorway());
    }
}
