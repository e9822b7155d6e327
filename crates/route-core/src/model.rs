//! Shared data model for the route planner: coordinates, vehicle profile,
//! obstacles, avoid polygons and route candidates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A WGS84 point, wire-encoded as a two-element `[lon, lat]` array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// True if this coordinate falls inside WGS84 bounds.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

impl Serialize for Coordinate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.lon, self.lat).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Coordinate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (lon, lat) = <(f64, f64)>::deserialize(deserializer)?;
        Ok(Coordinate { lon, lat })
    }
}

impl From<Coordinate> for geo_types::Point<f64> {
    fn from(c: Coordinate) -> Self {
        geo_types::Point::new(c.lon, c.lat)
    }
}

/// Axis-aligned bounding box in lon/lat degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    pub fn contains(&self, c: Coordinate) -> bool {
        c.lon >= self.min_lon && c.lon <= self.max_lon && c.lat >= self.min_lat && c.lat <= self.max_lat
    }

    /// Rounded to 3 decimals, used as a deduplication signature.
    pub fn signature(&self) -> String {
        format!(
            "{:.3},{:.3},{:.3},{:.3}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }
}

/// The vehicle profile a route must satisfy. Defaults match the
/// planner's canonical heavy-vehicle baseline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Vehicle {
    #[serde(default = "Vehicle::default_width_m")]
    pub width_m: f64,
    #[serde(default = "Vehicle::default_height_m")]
    pub height_m: f64,
    #[serde(default = "Vehicle::default_weight_t")]
    pub weight_t: f64,
    #[serde(default = "Vehicle::default_axleload_t")]
    pub axleload_t: f64,
    #[serde(default = "Vehicle::default_hazmat")]
    pub hazmat: bool,
}

impl Vehicle {
    fn default_width_m() -> f64 {
        2.55
    }
    fn default_height_m() -> f64 {
        4.0
    }
    fn default_weight_t() -> f64 {
        40.0
    }
    fn default_axleload_t() -> f64 {
        10.0
    }
    fn default_hazmat() -> bool {
        true
    }
}

impl Default for Vehicle {
    fn default() -> Self {
        Self {
            width_m: Self::default_width_m(),
            height_m: Self::default_height_m(),
            weight_t: Self::default_weight_t(),
            axleload_t: Self::default_axleload_t(),
            hazmat: Self::default_hazmat(),
        }
    }
}

/// Numeric limits posted by an obstacle. A sentinel of 0 (or absence) means
/// "unknown, not limiting" and is normalised to 999 by
/// [`ObstacleLimits::width_limit`]/[`ObstacleLimits::weight_limit`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ObstacleLimits {
    #[serde(rename = "width")]
    pub max_width_m: Option<f64>,
    #[serde(rename = "weight")]
    pub max_weight_t: Option<f64>,
}

const NOT_LIMITING: f64 = 999.0;

impl ObstacleLimits {
    /// Resolve `max_width_m`, treating missing/zero as non-limiting.
    pub fn width_limit(&self) -> f64 {
        match self.max_width_m {
            Some(w) if w > 0.0 => w,
            _ => NOT_LIMITING,
        }
    }

    /// Resolve `max_weight_t`, treating missing/zero as non-limiting.
    pub fn weight_limit(&self) -> f64 {
        match self.max_weight_t {
            Some(w) if w > 0.0 => w,
            _ => NOT_LIMITING,
        }
    }

    /// True when this limit set would block a vehicle with the given dims.
    pub fn blocks(&self, vehicle: &Vehicle) -> bool {
        self.width_limit() < vehicle.width_m || self.weight_limit() < vehicle.weight_t
    }
}

/// An active road-work or restriction, normalised to the planner's canonical
/// schema: geometry, canonical limits, stable id, and source tags.
#[derive(Debug, Clone)]
pub struct Obstacle {
    pub id: String,
    pub geometry: geojson::Geometry,
    pub limits: ObstacleLimits,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub reason: Option<String>,
    pub subtitle: Option<String>,
    pub source_system: Option<String>,
    pub source: Option<String>,
    pub external_id: Option<String>,
    pub roadwork_id: Option<String>,
    pub restriction_id: Option<String>,
    pub raw_id: Option<String>,
}

impl Obstacle {
    /// Concatenation of the free-text fields the enricher scans for
    /// recoverable width/weight limits.
    pub fn free_text(&self) -> String {
        [&self.title, &self.description, &self.reason, &self.subtitle]
            .into_iter()
            .flatten()
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// True when the source tags mark this obstacle as motorway-classified.
    pub fn is_motorway(&self) -> bool {
        if self
            .external_id
            .as_ref()
            .is_some_and(|s| !s.trim().is_empty())
        {
            return true;
        }
        [&self.source_system, &self.source]
            .into_iter()
            .flatten()
            .any(|s| s.to_lowercase().contains("autobahn"))
    }
}

/// A rectangular, axis-aligned exclusion polygon handed to the routing
/// engine. Accumulated across iterations; never removed once added.
#[derive(Debug, Clone)]
pub struct AvoidPolygon {
    pub obstacle_id: String,
    pub bbox: BBox,
    /// 5-vertex closed ring, lon/lat pairs, first == last.
    pub ring: Vec<(f64, f64)>,
}

/// Stats a scored route candidate carries alongside its geometry.
#[derive(Debug, Clone, Default)]
pub struct RouteStats {
    pub distance_km: f64,
    pub duration_s: f64,
    pub blocking_warnings: Vec<BlockingWarning>,
    pub roadworks_hits: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockingWarning {
    pub title: String,
    pub description: String,
    pub limits: ObstacleLimits,
    pub coords: Coordinate,
    pub already_avoided: bool,
}

/// A route returned by the routing engine, plus the planner's derived
/// scoring stats. One plan call owns a small list of these.
#[derive(Debug, Clone)]
pub struct RouteCandidate {
    pub geojson: geojson::FeatureCollection,
    pub stats: RouteStats,
    pub avoids_applied: usize,
    pub bbox_km_used: Option<u32>,
    pub fallback_used: bool,
}

impl RouteCandidate {
    pub fn is_clean(&self) -> bool {
        self.stats.blocking_warnings.is_empty()
    }
}
