//! Geometry utilities: great-circle distance, metre/degree conversions,
//! bounding boxes, polyline tiling, and polygon intersection.
//!
//! All degree arithmetic uses `f64`; mercator and geographic coordinates are
//! never mixed within a single operation.

use geo::algorithm::intersects::Intersects;

use crate::model::{AvoidPolygon, BBox, Coordinate, Obstacle};

/// Mean Earth radius in kilometres, per the planner's haversine convention.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points, in kilometres.
pub fn haversine(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let dphi = (b.lat - a.lat).to_radians();
    let dlambda = (b.lon - a.lon).to_radians();
    let h = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Metres per degree of latitude; constant at all latitudes.
pub const METERS_PER_DEG_LAT: f64 = 111_320.0;

/// Metres per degree of longitude at a given latitude; shrinks toward the poles.
pub fn meters_per_deg_lon(lat_deg: f64) -> f64 {
    METERS_PER_DEG_LAT * lat_deg.to_radians().cos()
}

pub fn meters_to_lat_deg(meters: f64) -> f64 {
    meters / METERS_PER_DEG_LAT
}

pub fn meters_to_lon_deg(meters: f64, ref_lat_deg: f64) -> f64 {
    meters / meters_per_deg_lon(ref_lat_deg).max(1.0)
}

pub fn km_to_lat_deg(km: f64) -> f64 {
    meters_to_lat_deg(km * 1000.0)
}

pub fn km_to_lon_deg(km: f64, ref_lat_deg: f64) -> f64 {
    meters_to_lon_deg(km * 1000.0, ref_lat_deg)
}

/// Bounding box enclosing a set of points, with no buffer applied.
pub fn bbox_of_points(points: &[Coordinate]) -> BBox {
    let mut min_lon = f64::MAX;
    let mut min_lat = f64::MAX;
    let mut max_lon = f64::MIN;
    let mut max_lat = f64::MIN;
    for p in points {
        min_lon = min_lon.min(p.lon);
        min_lat = min_lat.min(p.lat);
        max_lon = max_lon.max(p.lon);
        max_lat = max_lat.max(p.lat);
    }
    BBox::new(min_lon, min_lat, max_lon, max_lat)
}

/// Expand a bbox uniformly by `km_buffer` kilometres in every direction.
pub fn expand_bbox(bbox: BBox, km_buffer: f64) -> BBox {
    let mid_lat = (bbox.min_lat + bbox.max_lat) / 2.0;
    let dlat = km_to_lat_deg(km_buffer);
    let dlon = km_to_lon_deg(km_buffer, mid_lat);
    BBox::new(
        bbox.min_lon - dlon,
        bbox.min_lat - dlat,
        bbox.max_lon + dlon,
        bbox.max_lat + dlat,
    )
}

/// Bbox of the line `a`-`b`, buffered by `km_buffer` kilometres.
pub fn safe_bbox(a: Coordinate, b: Coordinate, km_buffer: f64) -> BBox {
    expand_bbox(bbox_of_points(&[a, b]), km_buffer)
}

/// 5-vertex closed rectangle ring for a bbox, in (lon, lat) pairs.
pub fn bbox_polygon(bbox: BBox) -> Vec<(f64, f64)> {
    vec![
        (bbox.min_lon, bbox.min_lat),
        (bbox.max_lon, bbox.min_lat),
        (bbox.max_lon, bbox.max_lat),
        (bbox.min_lon, bbox.max_lat),
        (bbox.min_lon, bbox.min_lat),
    ]
}

/// A buffered-straight-line corridor polygon from `start` to `end`, `width_km`
/// wide, used for gross spatial filtering (corridor containment).
pub fn corridor_polygon(start: Coordinate, end: Coordinate, width_km: f64) -> geo_types::Polygon<f64> {
    let mid_lat = (start.lat + end.lat) / 2.0;
    let half_km = width_km.max(0.001) / 2.0;
    let dlat = km_to_lat_deg(half_km);
    let dlon = km_to_lon_deg(half_km, mid_lat);

    let bearing_rad = {
        let phi1 = start.lat.to_radians();
        let phi2 = end.lat.to_radians();
        let dl = (end.lon - start.lon).to_radians();
        let x = dl.sin() * phi2.cos();
        let y = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dl.cos();
        x.atan2(y)
    };
    // Perpendicular unit offset in the local tangent plane, expressed in degrees.
    let perp = bearing_rad + std::f64::consts::FRAC_PI_2;
    let off_lat = perp.cos();
    let off_lon = perp.sin();

    let left_start = (start.lon + off_lon * dlon, start.lat + off_lat * dlat);
    let right_start = (start.lon - off_lon * dlon, start.lat - off_lat * dlat);
    let left_end = (end.lon + off_lon * dlon, end.lat + off_lat * dlat);
    let right_end = (end.lon - off_lon * dlon, end.lat - off_lat * dlat);

    geo_types::Polygon::new(
        geo_types::LineString::from(vec![left_start, left_end, right_end, right_start, left_start]),
        vec![],
    )
}

/// Walk the polyline, emitting overlapping bboxes of roughly `chunk_km` length,
/// rewinding `overlap_km` between chunks, buffered by `expand_km`. Always
/// emits the trailing tail. Deduplicates bboxes to a 3-decimal signature.
pub fn chunk_polyline_to_bboxes(
    coords: &[Coordinate],
    chunk_km: f64,
    overlap_km: f64,
    expand_km: f64,
) -> Vec<BBox> {
    if coords.is_empty() {
        return Vec::new();
    }
    if coords.len() == 1 {
        return vec![expand_bbox(bbox_of_points(coords), expand_km)];
    }

    let mut out: Vec<BBox> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut slice_start = 0usize;
    let mut acc_km = 0.0;
    let mut i = 0usize;

    let mut push_slice = |start: usize, end: usize, out: &mut Vec<BBox>| {
        let bbox = expand_bbox(bbox_of_points(&coords[start..=end]), expand_km);
        let sig = bbox.signature();
        if seen.insert(sig) {
            out.push(bbox);
        }
    };

    while i + 1 < coords.len() {
        acc_km += haversine(coords[i], coords[i + 1]);
        if acc_km >= chunk_km {
            push_slice(slice_start, i + 1, &mut out);
            // Rewind overlap_km worth of distance for the next chunk.
            let mut rewind = overlap_km;
            let mut j = i + 1;
            while j > slice_start && rewind > 0.0 {
                rewind -= haversine(coords[j - 1], coords[j]);
                j -= 1;
            }
            slice_start = j;
            acc_km = 0.0;
            i = j;
        }
        i += 1;
    }
    // Trailing tail.
    push_slice(slice_start, coords.len() - 1, &mut out);
    out
}

/// Evenly spread subsampling: `min(max, |arr|)` elements at indices spread
/// over `[0, |arr|-1]`, always including index 0, deduplicated.
pub fn spread_pick<T: Clone>(arr: &[T], max: usize) -> Vec<T> {
    if arr.len() <= max || max == 0 {
        return arr.to_vec();
    }
    let mut idxs = std::collections::BTreeSet::new();
    if max == 1 {
        idxs.insert(0);
    } else {
        for k in 0..max {
            let idx = (k * (arr.len() - 1)) / (max - 1);
            idxs.insert(idx);
        }
    }
    idxs.into_iter().map(|i| arr[i].clone()).collect()
}

/// Buffer the obstacle by `km_buffer` km and return its bbox as a 5-vertex
/// closed avoid rectangle. Falls back to a uniformly expanded raw bbox on
/// geometry failure; returns `None` only on total failure.
pub fn create_avoid_polygon(obstacle: &Obstacle, km_buffer: f64) -> Option<AvoidPolygon> {
    let geom = match geo_types::Geometry::<f64>::try_from(obstacle.geometry.value.clone()) {
        Ok(g) => g,
        Err(_) => return create_avoid_polygon_fallback(obstacle, km_buffer),
    };
    let bbox = match geometry_bbox(&geom) {
        Some(b) => expand_bbox(b, km_buffer),
        None => return create_avoid_polygon_fallback(obstacle, km_buffer),
    };
    Some(AvoidPolygon {
        obstacle_id: obstacle.id.clone(),
        bbox,
        ring: bbox_polygon(bbox),
    })
}

fn create_avoid_polygon_fallback(obstacle: &Obstacle, km_buffer: f64) -> Option<AvoidPolygon> {
    let geom = geo_types::Geometry::<f64>::try_from(obstacle.geometry.value.clone()).ok()?;
    let raw_bbox = geometry_bbox(&geom)?;
    let bbox = expand_bbox(raw_bbox, km_buffer * 1.5);
    Some(AvoidPolygon {
        obstacle_id: obstacle.id.clone(),
        bbox,
        ring: bbox_polygon(bbox),
    })
}

fn geometry_bbox(geom: &geo_types::Geometry<f64>) -> Option<BBox> {
    use geo::algorithm::bounding_rect::BoundingRect;
    let rect = geom.bounding_rect()?;
    Some(BBox::new(
        rect.min().x,
        rect.min().y,
        rect.max().x,
        rect.max().y,
    ))
}

/// Boolean intersect predicate between an obstacle's GeoJSON geometry and an
/// arbitrary `geo_types` polygon (corridor or route buffer).
pub fn geometry_intersects_polygon(
    geometry: &geojson::Geometry,
    polygon: &geo_types::Polygon<f64>,
) -> bool {
    match geo_types::Geometry::<f64>::try_from(geometry.value.clone()) {
        Ok(geo_types::Geometry::Point(p)) => polygon.intersects(&p),
        Ok(geo_types::Geometry::LineString(l)) => polygon.intersects(&l),
        Ok(geo_types::Geometry::Polygon(p)) => polygon.intersects(&p),
        Ok(geo_types::Geometry::MultiPolygon(mp)) => polygon.intersects(&mp),
        Ok(geo_types::Geometry::MultiLineString(ml)) => polygon.intersects(&ml),
        Ok(geo_types::Geometry::MultiPoint(mpt)) => polygon.intersects(&mpt),
        _ => false,
    }
}

/// Buffer a route LineString by `buffer_km` and return the resulting corridor
/// polygon, used for the route-vs-obstacle intersection test.
pub fn line_buffer_polygon(coords: &[Coordinate], buffer_km: f64) -> Option<geo_types::Polygon<f64>> {
    if coords.len() < 2 {
        return None;
    }
    // Approximate the buffered polyline as the union of per-segment
    // corridors' convex hull; sufficient for the bbox-scale obstacle checks
    // this planner performs.
    let mut all_points: Vec<(f64, f64)> = Vec::new();
    for pair in coords.windows(2) {
        let corridor = corridor_polygon(pair[0], pair[1], buffer_km * 2.0);
        all_points.extend(corridor.exterior().points().map(|p| (p.x(), p.y())));
    }
    if all_points.is_empty() {
        return None;
    }
    use geo::algorithm::convex_hull::ConvexHull;
    let hull = geo_types::MultiPoint::from(
        all_points
            .into_iter()
            .map(|(x, y)| geo_types::Point::new(x, y))
            .collect::<Vec<_>>(),
    )
    .convex_hull();
    Some(hull)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lon: f64, lat: f64) -> Coordinate {
        Coordinate::new(lon, lat)
    }

    #[test]
    fn haversine_known_distance() {
        let dist = haversine(c(0.0, 0.0), c(0.0, 1.0));
        assert!((dist - 111.19).abs() < 0.1);
    }

    #[test]
    fn haversine_is_symmetric() {
        let a = c(6.9603, 50.9375);
        let b = c(7.4653, 51.5136);
        assert!((haversine(a, b) - haversine(b, a)).abs() < 1e-9);
    }

    #[test]
    fn spread_pick_respects_count_and_includes_first() {
        let arr: Vec<usize> = (0..100).collect();
        let picked = spread_pick(&arr, 4);
        assert_eq!(picked.len(), 4);
        assert_eq!(picked[0], 0);
    }

    #[test]
    fn spread_pick_returns_all_when_under_cap() {
        let arr = vec![1, 2, 3];
        let picked = spread_pick(&arr, 10);
        assert_eq!(picked, arr);
    }

    #[test]
    fn chunk_polyline_covers_short_line() {
        let coords = vec![c(6.96, 50.94), c(7.0, 51.0)];
        let bboxes = chunk_polyline_to_bboxes(&coords, 260.0, 45.0, 15.0);
        assert!(!bboxes.is_empty());
        for p in &coords {
            assert!(bboxes.iter().any(|b| b.contains(*p)));
        }
    }

    #[test]
    fn bbox_buffer_zero_still_contains_points() {
        let bbox = safe_bbox(c(6.0, 50.0), c(7.0, 51.0), 0.0);
        assert!(bbox.contains(c(6.0, 50.0)));
        assert!(bbox.contains(c(7.0, 51.0)));
    }
}
