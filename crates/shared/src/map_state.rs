//! Camera and layer/view-mode state shared by every viewer mode.

use std::cell::Cell;
use std::rc::Rc;

use crate::clip::{self, ClipRegion};
use crate::models::{
    CameraState, LayerPreferences, ViewMode, ViewModeState, LENS_RADIUS_MIN, SIDE_RATIO_MAX,
    SIDE_RATIO_MIN,
};
use crate::store::{Store, Subscription};

/// Partial camera update. `active_overlay` is doubly optional: `None` leaves
/// it untouched, `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraPatch {
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub zoom: Option<f64>,
    pub rotation: Option<f64>,
    pub active_overlay: Option<Option<String>>,
}

impl CameraPatch {
    pub fn is_empty(&self) -> bool {
        self.longitude.is_none()
            && self.latitude.is_none()
            && self.zoom.is_none()
            && self.rotation.is_none()
            && self.active_overlay.is_none()
    }

    pub fn center(longitude: f64, latitude: f64) -> Self {
        CameraPatch {
            longitude: Some(longitude),
            latitude: Some(latitude),
            ..Default::default()
        }
    }

    pub fn apply_to(self, cam: &mut CameraState) {
        let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
        if let Some(lng) = finite(self.longitude) {
            cam.longitude = lng;
        }
        if let Some(lat) = finite(self.latitude) {
            cam.latitude = lat;
        }
        if let Some(zoom) = finite(self.zoom) {
            cam.zoom = zoom.max(0.0);
        }
        if let Some(rot) = finite(self.rotation) {
            cam.rotation = rot;
        }
        if let Some(overlay) = self.active_overlay {
            cam.active_overlay_id = overlay.filter(|id| !id.is_empty());
        }
    }
}

#[derive(Clone)]
pub struct CameraStore {
    store: Store<CameraState>,
}

impl CameraStore {
    pub fn new(initial: CameraState) -> Self {
        CameraStore {
            store: Store::new(initial),
        }
    }

    pub fn get(&self) -> CameraState {
        self.store.get()
    }

    pub fn subscribe(&self, listener: impl Fn(&CameraState) + 'static) -> Subscription {
        self.store.subscribe(listener)
    }

    pub fn subscriber_count(&self) -> usize {
        self.store.subscriber_count()
    }

    /// Merge position fields; the overlay id in `patch` is ignored.
    pub fn set_view(&self, patch: CameraPatch) {
        let patch = CameraPatch {
            active_overlay: None,
            ..patch
        };
        if patch.is_empty() {
            return;
        }
        self.store.update(|cam| patch.apply_to(cam));
    }

    pub fn set_active_overlay(&self, id: Option<String>) {
        self.store
            .update(|cam| cam.active_overlay_id = id.filter(|v| !v.is_empty()));
    }

    pub fn set_all(&self, patch: CameraPatch) {
        if patch.is_empty() {
            return;
        }
        self.store.update(|cam| patch.apply_to(cam));
    }

    pub fn reset(&self) {
        self.store.set(CameraState::default());
    }
}

impl Default for CameraStore {
    fn default() -> Self {
        CameraStore::new(CameraState::default())
    }
}

/// Basemap selection, overlay visibility and the view-comparison mode.
///
/// Every numeric setter clamps before storing; readers never clamp. The lens
/// radius is also bounded by the current viewport once one is known.
#[derive(Clone)]
pub struct LayerStore {
    store: Store<LayerPreferences>,
    viewport: Rc<Cell<Option<(f64, f64)>>>,
}

impl LayerStore {
    pub fn new(initial: LayerPreferences) -> Self {
        let layers = LayerStore {
            store: Store::new(LayerPreferences::default()),
            viewport: Rc::new(Cell::new(None)),
        };
        layers.set_all(initial);
        layers
    }

    /// Wrap an existing store, e.g. a persisted one.
    pub fn from_store(store: Store<LayerPreferences>) -> Self {
        let layers = LayerStore {
            store,
            viewport: Rc::new(Cell::new(None)),
        };
        let current = layers.get();
        let sanitized = layers.sanitize(current.clone());
        if sanitized != current {
            layers.store.set(sanitized);
        }
        layers
    }

    pub fn get(&self) -> LayerPreferences {
        self.store.get()
    }

    pub fn view_mode(&self) -> ViewModeState {
        self.store.with(|p| p.view)
    }

    pub fn basemap(&self) -> String {
        self.store.with(|p| p.basemap.clone())
    }

    pub fn subscribe(&self, listener: impl Fn(&LayerPreferences) + 'static) -> Subscription {
        self.store.subscribe(listener)
    }

    pub fn inner(&self) -> &Store<LayerPreferences> {
        &self.store
    }

    pub fn set_basemap(&self, key: impl Into<String>) {
        let key = key.into();
        if key.is_empty() {
            return;
        }
        self.store.update(|p| p.basemap = key);
    }

    pub fn set_overlay_visible(&self, visible: bool) {
        self.store.update(|p| p.overlay_visible = visible);
    }

    pub fn set_mode(&self, mode: ViewMode) {
        self.store.update(|p| p.view.mode = mode);
    }

    pub fn set_side_ratio(&self, ratio: f64) {
        let Some(ratio) = clamp_side_ratio(ratio) else { return };
        self.store.update(|p| p.view.side_ratio = ratio);
    }

    pub fn set_lens_radius(&self, radius: f64) {
        if !radius.is_finite() {
            return;
        }
        let radius = self.clamp_lens(radius);
        self.store.update(|p| p.view.lens_radius = radius);
    }

    pub fn set_opacity(&self, opacity: f64) {
        if !opacity.is_finite() {
            return;
        }
        self.store.update(|p| p.view.opacity = opacity.clamp(0.0, 1.0));
    }

    /// Record the viewport size and re-clamp the stored lens radius to it.
    pub fn set_viewport(&self, width: f64, height: f64) {
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return;
        }
        self.viewport.set(Some((width, height)));
        let current = self.view_mode().lens_radius;
        let clamped = self.clamp_lens(current);
        if clamped != current {
            self.store.update(|p| p.view.lens_radius = clamped);
        }
    }

    pub fn viewport(&self) -> Option<(f64, f64)> {
        self.viewport.get()
    }

    /// Merge a whole preferences record, clamping every field.
    pub fn set_all(&self, prefs: LayerPreferences) {
        let prefs = self.sanitize(prefs);
        self.store.set(prefs);
    }

    /// Restore the default view mode, keeping basemap and visibility.
    pub fn reset_view(&self) {
        let view = ViewModeState::default();
        let radius = self.clamp_lens(view.lens_radius);
        self.store.update(|p| {
            p.view = view;
            p.view.lens_radius = radius;
        });
    }

    pub fn reset(&self) {
        self.set_all(LayerPreferences::default());
    }

    /// Clip geometry for the current mode over the recorded viewport.
    pub fn clip_region(&self) -> ClipRegion {
        let Some((w, h)) = self.viewport.get() else {
            return ClipRegion::None;
        };
        let view = self.view_mode();
        clip::clip_path_for(view.mode, w, h, view.side_ratio, view.lens_radius)
    }

    fn clamp_lens(&self, radius: f64) -> f64 {
        match self.viewport.get() {
            Some((w, h)) => clip::clamp_lens_radius(radius, w, h),
            None => radius.max(LENS_RADIUS_MIN),
        }
    }

    fn sanitize(&self, mut prefs: LayerPreferences) -> LayerPreferences {
        let defaults = ViewModeState::default();
        prefs.view.side_ratio = clamp_side_ratio(prefs.view.side_ratio).unwrap_or(defaults.side_ratio);
        prefs.view.opacity = if prefs.view.opacity.is_finite() {
            prefs.view.opacity.clamp(0.0, 1.0)
        } else {
            defaults.opacity
        };
        let radius = if prefs.view.lens_radius.is_finite() {
            prefs.view.lens_radius
        } else {
            defaults.lens_radius
        };
        prefs.view.lens_radius = self.clamp_lens(radius);
        if prefs.basemap.is_empty() {
            prefs.basemap = LayerPreferences::default().basemap;
        }
        prefs
    }
}

impl Default for LayerStore {
    fn default() -> Self {
        LayerStore::new(LayerPreferences::default())
    }
}

fn clamp_side_ratio(ratio: f64) -> Option<f64> {
    ratio
        .is_finite()
        .then(|| ratio.clamp(SIDE_RATIO_MIN, SIDE_RATIO_MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_set_view_merges_fields() {
        let cam = CameraStore::default();
        cam.set_view(CameraPatch {
            zoom: Some(16.5),
            ..Default::default()
        });
        let s = cam.get();
        assert_eq!(s.zoom, 16.5);
        assert_eq!(s.longitude, CameraState::default().longitude);
    }

    #[test]
    fn test_set_view_ignores_overlay() {
        let cam = CameraStore::default();
        cam.set_active_overlay(Some("abc".into()));
        cam.set_view(CameraPatch {
            active_overlay: Some(None),
            latitude: Some(1.0),
            ..Default::default()
        });
        assert_eq!(cam.get().active_overlay_id.as_deref(), Some("abc"));
        assert_eq!(cam.get().latitude, 1.0);
    }

    #[test]
    fn test_set_all_clears_overlay() {
        let cam = CameraStore::default();
        cam.set_active_overlay(Some("abc".into()));
        cam.set_all(CameraPatch {
            active_overlay: Some(None),
            ..Default::default()
        });
        assert!(cam.get().active_overlay_id.is_none());
    }

    #[test]
    fn test_zoom_floored_and_nan_ignored() {
        let cam = CameraStore::default();
        cam.set_view(CameraPatch {
            zoom: Some(-3.0),
            longitude: Some(f64::NAN),
            ..Default::default()
        });
        assert_eq!(cam.get().zoom, 0.0);
        assert_eq!(cam.get().longitude, CameraState::default().longitude);
    }

    #[test]
    fn test_empty_patch_does_not_notify() {
        let cam = CameraStore::default();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let _sub = cam.subscribe(move |_| h.set(h.get() + 1));
        cam.set_view(CameraPatch::default());
        cam.set_all(CameraPatch::default());
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_side_ratio_in_range_stored_exactly() {
        let layers = LayerStore::default();
        for r in [0.01, 0.123456, 0.5, 0.987, 0.99] {
            layers.set_side_ratio(r);
            assert_eq!(layers.view_mode().side_ratio, r);
        }
    }

    #[test]
    fn test_side_ratio_out_of_range_clamps_to_bound() {
        let layers = LayerStore::default();
        layers.set_side_ratio(-4.0);
        assert_eq!(layers.view_mode().side_ratio, 0.01);
        layers.set_side_ratio(1.5);
        assert_eq!(layers.view_mode().side_ratio, 0.99);
        layers.set_side_ratio(f64::NAN);
        assert_eq!(layers.view_mode().side_ratio, 0.99);
    }

    #[test]
    fn test_opacity_clamped() {
        let layers = LayerStore::default();
        layers.set_opacity(2.0);
        assert_eq!(layers.view_mode().opacity, 1.0);
        layers.set_opacity(-1.0);
        assert_eq!(layers.view_mode().opacity, 0.0);
    }

    #[test]
    fn test_lens_radius_minimum_without_viewport() {
        let layers = LayerStore::default();
        layers.set_lens_radius(3.0);
        assert_eq!(layers.view_mode().lens_radius, 20.0);
        layers.set_lens_radius(5000.0);
        assert_eq!(layers.view_mode().lens_radius, 5000.0);
    }

    #[test]
    fn test_lens_radius_bounded_by_viewport() {
        let layers = LayerStore::default();
        layers.set_lens_radius(500.0);
        layers.set_viewport(800.0, 600.0);
        assert_eq!(layers.view_mode().lens_radius, 300.0);
        layers.set_lens_radius(1000.0);
        assert_eq!(layers.view_mode().lens_radius, 300.0);
        layers.set_lens_radius(40.0);
        assert_eq!(layers.view_mode().lens_radius, 40.0);
    }

    #[test]
    fn test_set_all_sanitizes() {
        let mut prefs = LayerPreferences::default();
        prefs.view.side_ratio = 7.0;
        prefs.view.opacity = -1.0;
        prefs.view.lens_radius = 1.0;
        prefs.basemap = String::new();
        let layers = LayerStore::new(prefs);
        let got = layers.get();
        assert_eq!(got.view.side_ratio, 0.99);
        assert_eq!(got.view.opacity, 0.0);
        assert_eq!(got.view.lens_radius, 20.0);
        assert_eq!(got.basemap, "g-streets");
    }

    #[test]
    fn test_reset_view_keeps_basemap() {
        let layers = LayerStore::default();
        layers.set_basemap("g-satellite");
        layers.set_mode(ViewMode::Spy);
        layers.set_side_ratio(0.2);
        layers.reset_view();
        let got = layers.get();
        assert_eq!(got.basemap, "g-satellite");
        assert_eq!(got.view, ViewModeState::default());
        layers.reset();
        assert_eq!(layers.basemap(), "g-streets");
    }

    #[test]
    fn test_clip_region_uses_viewport() {
        let layers = LayerStore::default();
        layers.set_mode(ViewMode::Spy);
        assert_eq!(layers.clip_region(), ClipRegion::None);
        layers.set_viewport(400.0, 200.0);
        assert_eq!(
            layers.clip_region(),
            ClipRegion::Circle { cx: 200.0, cy: 100.0, r: 100.0 }
        );
    }
}
