//! Obstacle pipeline: stable identity, cross-tile deduplication, and
//! corridor-based prioritisation.

use crate::geometry::{corridor_polygon, geometry_intersects_polygon};
use crate::model::{Coordinate, Obstacle};

/// First non-empty of `roadwork_id, external_id, restriction_id, id`; else a
/// string form of the obstacle's bbox rounded to 3 decimals.
pub fn stable_obs_id(obs: &Obstacle) -> String {
    for candidate in [&obs.roadwork_id, &obs.external_id, &obs.restriction_id, &obs.raw_id] {
        if let Some(s) = candidate {
            if !s.trim().is_empty() {
                return s.clone();
            }
        }
    }
    match geo_types::Geometry::<f64>::try_from(obs.geometry.value.clone()) {
        Ok(geom) => {
            use geo::algorithm::bounding_rect::BoundingRect;
            if let Some(rect) = geom.bounding_rect() {
                return format!(
                    "{:.3},{:.3},{:.3},{:.3}",
                    rect.min().x,
                    rect.min().y,
                    rect.max().x,
                    rect.max().y
                );
            }
            "unknown".to_string()
        }
        Err(_) => "unknown".to_string(),
    }
}

/// Append obstacles from each batch in order, deduplicating by stable id,
/// short-circuiting once `cap` unique obstacles have been collected.
pub fn merge_obstacles(batches: Vec<Vec<Obstacle>>, cap: usize) -> Vec<Obstacle> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    'outer: for batch in batches {
        for obs in batch {
            if out.len() >= cap {
                break 'outer;
            }
            let id = stable_obs_id(&obs);
            if seen.insert(id) {
                out.push(obs);
            }
        }
    }
    out
}

/// Partition obstacles by corridor containment (primary = intersects the
/// buffered start->end corridor), emitting primary first, then secondary,
/// stopping at `cap`.
pub fn prioritize_obstacles(
    list: Vec<Obstacle>,
    start: Coordinate,
    end: Coordinate,
    corridor_km: f64,
    cap: usize,
) -> Vec<Obstacle> {
    let corridor = corridor_polygon(start, end, corridor_km);

    let mut primary = Vec::new();
    let mut secondary = Vec::new();
    for obs in list {
        if geometry_intersects_polygon(&obs.geometry, &corridor) {
            primary.push(obs);
        } else {
            secondary.push(obs);
        }
    }

    primary.into_iter().chain(secondary).take(cap).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ObstacleLimits;

    fn point_obstacle(id: &str, lon: f64, lat: f64) -> Obstacle {
        Obstacle {
            id: id.to_string(),
            geometry: geojson::Geometry::new(geojson::Value::Point(vec![lon, lat])),
            limits: ObstacleLimits::default(),
            valid_from: None,
            valid_to: None,
            title: None,
            description: None,
            reason: None,
            subtitle: None,
            source_system: None,
            source: None,
            external_id: Some(id.to_string()),
            roadwork_id: None,
            restriction_id: None,
            raw_id: None,
        }
    }

    #[test]
    fn merge_deduplicates_and_respects_cap() {
        let a = point_obstacle("x1", 7.0, 51.0);
        let b = point_obstacle("x1", 7.0, 51.0);
        let c = point_obstacle("x2", 7.1, 51.1);
        let merged = merge_obstacles(vec![vec![a, b], vec![c]], 10);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merge_short_circuits_at_cap() {
        let obstacles: Vec<Obstacle> = (0..5)
            .map(|i| point_obstacle(&format!("o{i}"), 7.0 + i as f64 * 0.01, 51.0))
            .collect();
        let merged = merge_obstacles(vec![obstacles], 2);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn prioritize_puts_corridor_hits_first() {
        let start = Coordinate::new(6.96, 50.94);
        let end = Coordinate::new(7.47, 51.51);
        let on_corridor = point_obstacle("on", 7.2, 51.2);
        let off_corridor = point_obstacle("off", 20.0, 10.0);
        let result = prioritize_obstacles(
            vec![off_corridor.clone(), on_corridor.clone()],
            start,
            end,
            10.0,
            10,
        );
        assert_eq!(result[0].id, "on");
    }
}
