//! Great-circle geometry for vendor/activity proximity matching.
//!
//! Distances use the Haversine formula on a spherical Earth. Candidate
//! selection is stable: the first candidate at the minimum distance wins.

use tracing::warn;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Two coordinates closer than this on both axes are the same location.
pub const COORDINATE_TOLERANCE_DEGREES: f64 = 1e-6;

/// Haversine great-circle distance between two points, in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Exact-match mode: true when both axes differ by less than the fixed
/// tolerance. Used to check whether a vendor-known location coincides with
/// an externally supplied event location.
pub fn coordinates_match(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> bool {
    (lat_a - lat_b).abs() < COORDINATE_TOLERANCE_DEGREES
        && (lon_a - lon_b).abs() < COORDINATE_TOLERANCE_DEGREES
}

/// Select the candidate nearest to the given point.
///
/// `coords` extracts a candidate's coordinates; candidates for which it
/// returns `None` (unparsable payloads) are skipped with a warning. Ties
/// keep the first-encountered candidate. Returns `None` when the set is
/// empty or nothing was parsable.
pub fn nearest<'a, T, F>(lat: f64, lon: f64, candidates: &'a [T], coords: F) -> Option<&'a T>
where
    F: Fn(&T) -> Option<(f64, f64)>,
{
    let mut closest: Option<(&T, f64)> = None;

    for (index, candidate) in candidates.iter().enumerate() {
        let Some((cand_lat, cand_lon)) = coords(candidate) else {
            warn!(index, "Skipping candidate with unparsable coordinates");
            continue;
        };

        let distance = haversine_km(lat, lon, cand_lat, cand_lon);
        match closest {
            Some((_, min_distance)) if distance >= min_distance => {}
            _ => closest = Some((candidate, distance)),
        }
    }

    closest.map(|(candidate, _)| candidate)
}
