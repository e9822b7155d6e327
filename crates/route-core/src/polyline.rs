//! Polyline6 codec: little-endian varint, zig-zag delta encoded coordinates
//! scaled by 1e6. The wire stream orders each pair lat-then-lon; this module
//! always emits/accepts `Coordinate` as (lon, lat).

use crate::model::Coordinate;

const PRECISION: f64 = 1e6;

/// Decode a polyline6 string into a sequence of (lon, lat) coordinates.
///
/// Accumulates deltas in signed 32-bit arithmetic and scales to floating
/// point only at emit, per the routing engine's encoding convention.
pub fn decode(encoded: &str) -> Vec<Coordinate> {
    let bytes = encoded.as_bytes();
    let mut index = 0usize;
    let mut lat: i64 = 0;
    let mut lon: i64 = 0;
    let mut out = Vec::new();

    while index < bytes.len() {
        let Some((dlat, next)) = decode_varint(bytes, index) else {
            break;
        };
        index = next;
        let Some((dlon, next)) = decode_varint(bytes, index) else {
            break;
        };
        index = next;

        lat += dlat;
        lon += dlon;

        out.push(Coordinate::new(lon as f64 / PRECISION, lat as f64 / PRECISION));
    }
    out
}

fn decode_varint(bytes: &[u8], start: usize) -> Option<(i64, usize)> {
    let mut result: i64 = 0;
    let mut shift = 0u32;
    let mut index = start;
    loop {
        let raw = *bytes.get(index)?;
        index += 1;
        let byte = raw.wrapping_sub(63);
        result |= ((byte & 0x1f) as i64) << shift;
        if byte & 0x20 == 0 {
            break;
        }
        shift += 5;
    }
    // zig-zag decode
    let value = if result & 1 != 0 { !(result >> 1) } else { result >> 1 };
    Some((value, index))
}

/// Encode a sequence of (lon, lat) coordinates into a polyline6 string,
/// emitting lat-then-lon deltas to match the routing engine's wire format.
pub fn encode(coords: &[Coordinate]) -> String {
    let mut out = String::new();
    let mut prev_lat: i64 = 0;
    let mut prev_lon: i64 = 0;
    for c in coords {
        let lat = (c.lat * PRECISION).round() as i64;
        let lon = (c.lon * PRECISION).round() as i64;
        encode_varint(lat - prev_lat, &mut out);
        encode_varint(lon - prev_lon, &mut out);
        prev_lat = lat;
        prev_lon = lon;
    }
    out
}

fn encode_varint(value: i64, out: &mut String) {
    let mut v = value << 1;
    if value < 0 {
        v = !v;
    }
    let mut v = v as u64;
    loop {
        let mut byte = (v & 0x1f) as u8;
        v >>= 5;
        if v != 0 {
            byte |= 0x20;
        }
        out.push((byte + 63) as char);
        if v == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_quantisation() {
        let coords = vec![
            Coordinate::new(-120.2, 38.5),
            Coordinate::new(-120.95, 40.7),
            Coordinate::new(-126.453, 43.252),
        ];
        let encoded = encode(&coords);
        let decoded = decode(&encoded);
        assert_eq!(decoded.len(), coords.len());
        for (a, b) in coords.iter().zip(decoded.iter()) {
            assert!((a.lon - b.lon).abs() < 1e-5);
            assert!((a.lat - b.lat).abs() < 1e-5);
        }
    }

    #[test]
    fn empty_input_decodes_empty() {
        assert!(decode("").is_empty());
    }
}
