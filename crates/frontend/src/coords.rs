//! Screen <-> ground conversions for the map view (spherical web mercator).
//!
//! Everything here is pure so it can be tested without a browser. Screen
//! coordinates are CSS pixels relative to the map container's top-left.

use std::f64::consts::PI;

use vma_shared::geo::EARTH_RADIUS_M;
use vma_shared::map_state::CameraPatch;
use vma_shared::models::{CameraState, LonLat};

pub const TILE_SIZE: f64 = 256.0;
pub const ZOOM_MIN: f64 = 2.0;
pub const ZOOM_MAX: f64 = 20.0;
/// Zoom levels per wheel notch.
pub const WHEEL_ZOOM_STEP: f64 = 0.25;

const MAX_LATITUDE: f64 = 85.051_128_78;

/// Convert client (viewport) coordinates to container-relative pixel coordinates.
pub fn client_to_container(client_x: f64, client_y: f64, rect_left: f64, rect_top: f64) -> (f64, f64) {
    (client_x - rect_left, client_y - rect_top)
}

fn world_size(zoom: f64) -> f64 {
    TILE_SIZE * 2f64.powf(zoom)
}

/// World pixel of `lonlat` at `zoom`, origin at the north-west corner.
pub fn lonlat_to_world(lonlat: LonLat, zoom: f64) -> (f64, f64) {
    let size = world_size(zoom);
    let lat = lonlat[1].clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (lonlat[0] + 180.0) / 360.0 * size;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * size;
    (x, y)
}

pub fn world_to_lonlat(x: f64, y: f64, zoom: f64) -> LonLat {
    let size = world_size(zoom);
    let lon = x / size * 360.0 - 180.0;
    let n = PI * (1.0 - 2.0 * y / size);
    [lon, n.sinh().atan().to_degrees()]
}

fn rotate(dx: f64, dy: f64, angle: f64) -> (f64, f64) {
    let (sin, cos) = angle.sin_cos();
    (dx * cos - dy * sin, dx * sin + dy * cos)
}

pub fn wrap_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Screen position of `lonlat` in a `width` x `height` view of `camera`.
pub fn project(camera: &CameraState, lonlat: LonLat, width: f64, height: f64) -> (f64, f64) {
    let (cx, cy) = lonlat_to_world([camera.longitude, camera.latitude], camera.zoom);
    let (px, py) = lonlat_to_world(lonlat, camera.zoom);
    let (dx, dy) = rotate(px - cx, py - cy, camera.rotation);
    (width / 2.0 + dx, height / 2.0 + dy)
}

/// Ground position under screen point `(x, y)`.
pub fn unproject(camera: &CameraState, x: f64, y: f64, width: f64, height: f64) -> LonLat {
    let (dx, dy) = rotate(x - width / 2.0, y - height / 2.0, -camera.rotation);
    let (cx, cy) = lonlat_to_world([camera.longitude, camera.latitude], camera.zoom);
    world_to_lonlat(cx + dx, cy + dy, camera.zoom)
}

/// Ground meters covered by one screen pixel.
pub fn meters_per_pixel(latitude: f64, zoom: f64) -> f64 {
    2.0 * PI * EARTH_RADIUS_M * latitude.to_radians().cos() / world_size(zoom)
}

/// New center after dragging the map content by `(dx, dy)` pixels.
pub fn pan_camera(camera: &CameraState, dx: f64, dy: f64) -> CameraPatch {
    let center = unproject(camera, -dx, -dy, 0.0, 0.0);
    CameraPatch::center(wrap_longitude(center[0]), center[1])
}

/// Zoom to `new_zoom`, keeping the ground point under `cursor` in place.
pub fn zoom_at_cursor(
    camera: &CameraState,
    cursor: (f64, f64),
    width: f64,
    height: f64,
    new_zoom: f64,
) -> CameraPatch {
    let new_zoom = new_zoom.clamp(ZOOM_MIN, ZOOM_MAX);
    let anchor = unproject(camera, cursor.0, cursor.1, width, height);
    let (ax, ay) = lonlat_to_world(anchor, new_zoom);
    let (dx, dy) = rotate(cursor.0 - width / 2.0, cursor.1 - height / 2.0, -camera.rotation);
    let center = world_to_lonlat(ax - dx, ay - dy, new_zoom);
    CameraPatch {
        longitude: Some(wrap_longitude(center[0])),
        latitude: Some(center[1]),
        zoom: Some(new_zoom),
        ..Default::default()
    }
}

/// Target zoom after one wheel event. Negative deltas zoom in.
pub fn wheel_zoom(zoom: f64, delta_y: f64) -> f64 {
    let step = if delta_y < 0.0 { WHEEL_ZOOM_STEP } else { -WHEEL_ZOOM_STEP };
    (zoom + step).clamp(ZOOM_MIN, ZOOM_MAX)
}

/// Target zoom for a pinch that went from `start_distance` to `distance`.
pub fn pinch_zoom(start_zoom: f64, start_distance: f64, distance: f64) -> f64 {
    if start_distance < 1.0 || distance <= 0.0 {
        return start_zoom;
    }
    (start_zoom + (distance / start_distance).log2()).clamp(ZOOM_MIN, ZOOM_MAX)
}

pub fn point_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}

/// Unrotated screen box `(left, top, width, height)` for geographic bounds
/// `[minLon, minLat, maxLon, maxLat]`. Rotation is applied to the whole
/// overlay layer by the caller.
pub fn bounds_rect(camera: &CameraState, bounds: [f64; 4], width: f64, height: f64) -> Option<(f64, f64, f64, f64)> {
    let flat = CameraState {
        rotation: 0.0,
        ..camera.clone()
    };
    let (x0, y0) = project(&flat, [bounds[0], bounds[3]], width, height);
    let (x1, y1) = project(&flat, [bounds[2], bounds[1]], width, height);
    let (w, h) = (x1 - x0, y1 - y0);
    if !(x0.is_finite() && y0.is_finite() && w.is_finite() && h.is_finite()) || w <= 0.0 || h <= 0.0 {
        return None;
    }
    Some((x0, y0, w, h))
}

/// Readout text, e.g. `10.77653°N 106.70098°E`.
pub fn format_lonlat(lonlat: LonLat) -> String {
    let ns = if lonlat[1] >= 0.0 { 'N' } else { 'S' };
    let ew = if lonlat[0] >= 0.0 { 'E' } else { 'W' };
    format!("{:.5}°{ns} {:.5}°{ew}", lonlat[1].abs(), lonlat[0].abs())
}
