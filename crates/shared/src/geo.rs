use crate::models::{Interaction, LonLat, Story, StoryPoint};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two `[lon, lat]` points.
pub fn haversine_distance(a: LonLat, b: LonLat) -> f64 {
    let d_lat = (b[1] - a[1]).to_radians();
    let d_lon = (b[0] - a[0]).to_radians();
    let lat1 = a[1].to_radians();
    let lat2 = b[1].to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push h a hair above 1 for antipodal points.
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

pub fn is_within_radius(position: LonLat, target: LonLat, radius_m: f64) -> bool {
    haversine_distance(position, target) <= radius_m
}

/// Result of testing a tracked position against one point.
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityCheck {
    pub point_id: String,
    pub distance_m: f64,
    pub reached: bool,
}

pub fn check_point(point: &StoryPoint, position: LonLat) -> ProximityCheck {
    let distance_m = haversine_distance(position, point.coordinates);
    ProximityCheck {
        point_id: point.id.clone(),
        distance_m,
        reached: distance_m <= point.trigger_radius,
    }
}

/// Every proximity point of `story` whose trigger circle contains `position`.
/// A plain linear scan; stories hold a handful of points.
pub fn reached_points(story: &Story, position: LonLat) -> Vec<&StoryPoint> {
    story
        .points
        .iter()
        .filter(|p| p.interaction == Interaction::Proximity)
        .filter(|p| is_within_radius(position, p.coordinates, p.trigger_radius))
        .collect()
}

/// Closest point to `position` with its distance.
pub fn nearest_point(story: &Story, position: LonLat) -> Option<(&StoryPoint, f64)> {
    story
        .points
        .iter()
        .map(|p| (p, haversine_distance(position, p.coordinates)))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
}

/// Shift `origin` by `meters` due north. Handy for placing test positions.
pub fn offset_north(origin: LonLat, meters: f64) -> LonLat {
    let d_lat = (meters / EARTH_RADIUS_M).to_degrees();
    [origin[0], origin[1] + d_lat]
}
