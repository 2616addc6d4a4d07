//! View-mode clip geometry.
//!
//! The overlay surface is clipped to reveal the historical map over part of
//! the viewport. All values are CSS pixels relative to the viewport's
//! top-left corner. Nothing here is cached; re-derive on every resize or
//! parameter change.

use crate::models::{ViewMode, LENS_RADIUS_MIN};

/// Region of the overlay left visible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClipRegion {
    /// No clipping; the whole overlay is blended by opacity.
    None,
    Rect { x0: f64, y0: f64, x1: f64, y1: f64 },
    Circle { cx: f64, cy: f64, r: f64 },
}

impl ClipRegion {
    /// CSS `clip-path` value. Empty string clears clipping.
    pub fn to_css(&self) -> String {
        match *self {
            ClipRegion::None => String::new(),
            ClipRegion::Rect { x0, y0, x1, y1 } => format!(
                "polygon({x0}px {y0}px, {x1}px {y0}px, {x1}px {y1}px, {x0}px {y1}px)"
            ),
            ClipRegion::Circle { cx, cy, r } => format!("circle({r}px at {cx}px {cy}px)"),
        }
    }

    /// Axis-aligned bounds `(x0, y0, x1, y1)`, or `None` when unclipped.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        match *self {
            ClipRegion::None => None,
            ClipRegion::Rect { x0, y0, x1, y1 } => Some((x0, y0, x1, y1)),
            ClipRegion::Circle { cx, cy, r } => Some((cx - r, cy - r, cx + r, cy + r)),
        }
    }
}

/// Clip region for `mode`. `lens_radius` must already be clamped to the
/// viewport (see [`clamp_lens_radius`]); this function does not clamp.
pub fn clip_path_for(mode: ViewMode, width: f64, height: f64, side_ratio: f64, lens_radius: f64) -> ClipRegion {
    match mode {
        ViewMode::Overlay => ClipRegion::None,
        ViewMode::SideX => ClipRegion::Rect {
            x0: width * side_ratio,
            y0: 0.0,
            x1: width,
            y1: height,
        },
        ViewMode::SideY => ClipRegion::Rect {
            x0: 0.0,
            y0: height * side_ratio,
            x1: width,
            y1: height,
        },
        ViewMode::Spy => ClipRegion::Circle {
            cx: width / 2.0,
            cy: height / 2.0,
            r: lens_radius,
        },
    }
}

pub fn max_lens_radius(width: f64, height: f64) -> f64 {
    width.min(height) / 2.0
}

/// Clamp a lens radius to `[20, min(w, h) / 2]`. On viewports too small for
/// the minimum lens, the minimum wins.
pub fn clamp_lens_radius(radius: f64, width: f64, height: f64) -> f64 {
    let max = max_lens_radius(width, height).max(LENS_RADIUS_MIN);
    radius.clamp(LENS_RADIUS_MIN, max)
}

/// Split-line placement for the side-by-side modes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Divider {
    Hidden,
    /// Vertical line at `x` spanning `height`.
    Vertical { x: f64, height: f64 },
    /// Horizontal line at `y` spanning `width`.
    Horizontal { y: f64, width: f64 },
}

pub fn divider_for(mode: ViewMode, width: f64, height: f64, side_ratio: f64) -> Divider {
    match mode {
        ViewMode::SideX => Divider::Vertical {
            x: width * side_ratio,
            height,
        },
        ViewMode::SideY => Divider::Horizontal {
            y: height * side_ratio,
            width,
        },
        _ => Divider::Hidden,
    }
}

/// Lens outline and resize handle for spyglass mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LensPlacement {
    pub x: f64,
    pub y: f64,
    pub diameter: f64,
    pub handle_x: f64,
    pub handle_y: f64,
}

/// Half the size of the resize handle drawn on the lens rim.
const LENS_HANDLE_HALF: f64 = 8.0;

pub fn lens_for(mode: ViewMode, width: f64, height: f64, lens_radius: f64) -> Option<LensPlacement> {
    if mode != ViewMode::Spy {
        return None;
    }
    Some(LensPlacement {
        x: width / 2.0 - lens_radius,
        y: height / 2.0 - lens_radius,
        diameter: (lens_radius * 2.0).max(LENS_RADIUS_MIN),
        handle_x: width / 2.0 + lens_radius - LENS_HANDLE_HALF,
        handle_y: height / 2.0 - LENS_HANDLE_HALF,
    })
}

/// Side ratio for a pointer at `(x, y)` while dragging the divider.
pub fn ratio_from_pointer(mode: ViewMode, x: f64, y: f64, width: f64, height: f64) -> Option<f64> {
    match mode {
        ViewMode::SideX if width > 0.0 => Some(x / width),
        ViewMode::SideY if height > 0.0 => Some(y / height),
        _ => None,
    }
}
