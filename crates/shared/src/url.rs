//! URL fragment codec and the bidirectional store <-> fragment sync engine.
//!
//! Fragment grammar:
//!
//! ```text
//! #@<lat>,<lng>,<zoom>z,<rotation>r[&map=<id>][&base=<key>]
//! ```
//!
//! Writes are debounced and only happen when the fragment actually changes.
//! Reads apply whatever fields parse and ignore the rest.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::map_state::{CameraPatch, CameraStore, LayerStore};
use crate::models::{CameraState, Millis, DEFAULT_BASEMAP};
use crate::store::Subscription;
use crate::timing::{Clock, Debounce};

pub const DEFAULT_URL_DEBOUNCE_MS: Millis = 300;

/// Fields recovered from a fragment. Absent fields leave state untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UrlState {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub zoom: Option<f64>,
    pub rotation: Option<f64>,
    /// `Some(None)` when the fragment carries an empty `map=`.
    pub active_overlay: Option<Option<String>>,
    pub basemap: Option<String>,
}

impl UrlState {
    pub fn is_empty(&self) -> bool {
        *self == UrlState::default()
    }

    pub fn camera_patch(&self) -> CameraPatch {
        CameraPatch {
            longitude: self.lng,
            latitude: self.lat,
            zoom: self.zoom,
            rotation: self.rotation,
            active_overlay: self.active_overlay.clone(),
        }
    }
}

fn round(value: f64, decimals: i32) -> f64 {
    let f = 10f64.powi(decimals);
    let r = (value * f).round() / f;
    // Avoid "-0.0000" in the address bar.
    if r == 0.0 {
        0.0
    } else {
        r
    }
}

/// Serialize camera + basemap into a fragment body (no leading `#`).
pub fn state_to_hash(camera: &CameraState, basemap: &str) -> String {
    let mut hash = format!(
        "@{:.5},{:.5},{:.2}z,{:.4}r",
        round(camera.latitude, 5),
        round(camera.longitude, 5),
        round(camera.zoom, 2),
        round(camera.rotation, 4),
    );
    if let Some(id) = camera.active_overlay_id.as_deref().filter(|id| !id.is_empty()) {
        hash.push_str("&map=");
        hash.push_str(&urlencoding::encode(id));
    }
    if basemap != DEFAULT_BASEMAP && !basemap.is_empty() {
        hash.push_str("&base=");
        hash.push_str(&urlencoding::encode(basemap));
    }
    hash
}

fn parse_number(raw: &str, suffix: Option<char>) -> Option<f64> {
    let raw = raw.trim();
    let digits = suffix.and_then(|c| raw.strip_suffix(c)).unwrap_or(raw);
    digits.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a fragment, with or without the leading `#`. Never fails; segments
/// that do not match the grammar are skipped.
pub fn hash_to_state(hash: &str) -> UrlState {
    let mut state = UrlState::default();
    let raw = hash.strip_prefix('#').unwrap_or(hash);
    if raw.is_empty() {
        return state;
    }

    let (camera_part, params_part) = match raw.split_once('&') {
        Some((camera, params)) => (camera, params),
        None => (raw, ""),
    };

    if let Some(body) = camera_part.strip_prefix('@') {
        let segments: Vec<&str> = body.split(',').collect();
        if segments.len() >= 2 {
            let lat = parse_number(segments[0], None);
            let lng = parse_number(segments[1], None);
            if let (Some(lat), Some(lng)) = (lat, lng) {
                state.lat = Some(lat);
                state.lng = Some(lng);
            }
        }
        if let Some(seg) = segments.get(2) {
            state.zoom = parse_number(seg, Some('z'));
        }
        if let Some(seg) = segments.get(3) {
            state.rotation = parse_number(seg, Some('r'));
        }
    }

    for pair in params_part.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let Ok(value) = urlencoding::decode(value) else {
            debug!("skipping undecodable fragment param {key}");
            continue;
        };
        match key {
            "map" => {
                state.active_overlay = Some((!value.is_empty()).then(|| value.into_owned()));
            }
            "base" if !value.is_empty() => state.basemap = Some(value.into_owned()),
            _ => {}
        }
    }

    state
}

/// Browser location seam. `hash` returns the fragment including the leading
/// `#`, or an empty string.
pub trait Location {
    fn hash(&self) -> String;
    fn replace_hash(&self, hash: &str);
    fn push_hash(&self, hash: &str);
}

#[derive(Debug, Clone, Copy)]
pub struct UrlSyncOptions {
    pub debounce_ms: Millis,
    /// Use replace for camera moves; push otherwise.
    pub replace_on_move: bool,
}

impl Default for UrlSyncOptions {
    fn default() -> Self {
        UrlSyncOptions {
            debounce_ms: DEFAULT_URL_DEBOUNCE_MS,
            replace_on_move: true,
        }
    }
}

struct SyncInner<L> {
    camera: CameraStore,
    layers: LayerStore,
    location: L,
    clock: Rc<dyn Clock>,
    replace_on_move: bool,
    debounce: RefCell<Debounce>,
    suppressed: Cell<bool>,
    active: Cell<bool>,
    subscriptions: RefCell<Vec<Subscription>>,
}

impl<L: Location> SyncInner<L> {
    fn schedule_write(&self) {
        if self.suppressed.get() || !self.active.get() {
            return;
        }
        let now = self.clock.now_ms();
        self.debounce.borrow_mut().schedule(now);
    }

    fn current_hash(&self) -> String {
        let camera = self.camera.get();
        let basemap = self.layers.basemap();
        format!("#{}", state_to_hash(&camera, &basemap))
    }

    fn write(&self, push: bool) -> bool {
        let hash = self.current_hash();
        if hash == self.location.hash() {
            return false;
        }
        if push {
            self.location.push_hash(&hash);
        } else {
            self.location.replace_hash(&hash);
        }
        true
    }

    fn apply_location(&self) -> bool {
        let parsed = hash_to_state(&self.location.hash());
        if parsed.is_empty() {
            return false;
        }
        self.suppressed.set(true);
        self.debounce.borrow_mut().cancel();

        let patch = parsed.camera_patch();
        if !patch.is_empty() {
            self.camera.set_all(patch);
        }
        if let Some(basemap) = parsed.basemap {
            self.layers.set_basemap(basemap);
        }
        true
    }
}

/// Keeps the camera and basemap in step with the address-bar fragment.
///
/// The host drives it: call [`UrlSync::poll`] when
/// [`UrlSync::next_deadline`] passes, [`UrlSync::on_animation_frame`] once
/// per frame while [`UrlSync::is_suppressed`], and
/// [`UrlSync::on_navigation`] on back/forward.
pub struct UrlSync<L: Location + 'static> {
    inner: Rc<SyncInner<L>>,
}

impl<L: Location + 'static> UrlSync<L> {
    /// Subscribe to both stores and apply the current fragment.
    pub fn start(
        camera: CameraStore,
        layers: LayerStore,
        location: L,
        clock: Rc<dyn Clock>,
        options: UrlSyncOptions,
    ) -> Self {
        let inner = Rc::new(SyncInner {
            camera,
            layers,
            location,
            clock,
            replace_on_move: options.replace_on_move,
            debounce: RefCell::new(Debounce::new(options.debounce_ms)),
            suppressed: Cell::new(false),
            active: Cell::new(true),
            subscriptions: RefCell::new(Vec::new()),
        });

        let weak: Weak<SyncInner<L>> = Rc::downgrade(&inner);
        let on_camera = inner.camera.subscribe(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.schedule_write();
            }
        });
        let weak: Weak<SyncInner<L>> = Rc::downgrade(&inner);
        let on_layers = inner.layers.subscribe(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.schedule_write();
            }
        });
        inner
            .subscriptions
            .borrow_mut()
            .extend([on_camera, on_layers]);

        if inner.apply_location() {
            debug!("applied initial fragment");
        }
        UrlSync { inner }
    }

    /// Back/forward navigation: re-read the fragment into the stores.
    pub fn on_navigation(&self) -> bool {
        if !self.inner.active.get() {
            return false;
        }
        self.inner.apply_location()
    }

    /// Release write suppression after an applied fragment.
    pub fn on_animation_frame(&self) {
        self.inner.suppressed.set(false);
    }

    pub fn is_suppressed(&self) -> bool {
        self.inner.suppressed.get()
    }

    pub fn next_deadline(&self) -> Option<Millis> {
        self.inner.debounce.borrow().next_deadline()
    }

    /// Write the pending fragment if its debounce window has elapsed.
    /// Returns whether the location changed.
    pub fn poll(&self) -> bool {
        if !self.inner.active.get() {
            return false;
        }
        let now = self.inner.clock.now_ms();
        let due = self.inner.debounce.borrow_mut().take_due(now);
        if !due || self.inner.suppressed.get() {
            return false;
        }
        self.inner.write(!self.inner.replace_on_move)
    }

    /// Discrete navigation: cancel any pending move and push immediately.
    pub fn push_now(&self) -> bool {
        if !self.inner.active.get() {
            return false;
        }
        self.inner.debounce.borrow_mut().cancel();
        self.inner.write(true)
    }

    pub fn current_hash(&self) -> String {
        self.inner.current_hash()
    }

    pub fn teardown(&self) {
        self.inner.active.set(false);
        self.inner.debounce.borrow_mut().cancel();
        self.inner.subscriptions.borrow_mut().clear();
    }
}

impl<L: Location + 'static> Drop for UrlSync<L> {
    fn drop(&mut self) {
        self.teardown();
    }
}
