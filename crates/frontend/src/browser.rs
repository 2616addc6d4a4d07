//! Browser-backed implementations of the shared crate's host seams.

use vma_shared::models::{LonLat, Millis};
use vma_shared::persist::{KeyValueStore, StorageError};
use vma_shared::timing::Clock;
use vma_shared::url::Location;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};

/// `Date.now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserClock;

impl Clock for BrowserClock {
    fn now_ms(&self) -> Millis {
        js_sys::Date::now().max(0.0) as Millis
    }
}

fn js_error_name(err: &JsValue) -> String {
    js_sys::Reflect::get(err, &JsValue::from_str("name"))
        .ok()
        .and_then(|v| v.as_string())
        .unwrap_or_else(|| format!("{err:?}"))
}

/// Map a DOMException name raised by `localStorage` onto [`StorageError`].
pub fn storage_error_from_name(name: &str) -> StorageError {
    match name {
        "QuotaExceededError" | "NS_ERROR_DOM_QUOTA_REACHED" => StorageError::Quota,
        "SecurityError" => StorageError::Unavailable,
        other => StorageError::Backend(other.to_string()),
    }
}

/// `window.localStorage`.
pub struct LocalStorage;

impl LocalStorage {
    fn storage() -> Result<web_sys::Storage, StorageError> {
        web_sys::window()
            .ok_or(StorageError::Unavailable)?
            .local_storage()
            .map_err(|e| storage_error_from_name(&js_error_name(&e)))?
            .ok_or(StorageError::Unavailable)
    }
}

impl KeyValueStore for LocalStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Self::storage()?
            .get_item(key)
            .map_err(|e| storage_error_from_name(&js_error_name(&e)))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        Self::storage()?
            .set_item(key, value)
            .map_err(|e| storage_error_from_name(&js_error_name(&e)))
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        Self::storage()?
            .remove_item(key)
            .map_err(|e| storage_error_from_name(&js_error_name(&e)))
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let storage = Self::storage()?;
        let len = storage
            .length()
            .map_err(|e| storage_error_from_name(&js_error_name(&e)))?;
        let mut keys = Vec::with_capacity(len as usize);
        for i in 0..len {
            if let Ok(Some(key)) = storage.key(i) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

/// `window.location` / `window.history` for the URL fragment.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserLocation;

impl BrowserLocation {
    fn write(hash: &str, push: bool) {
        let Some(window) = web_sys::window() else { return };
        let Ok(history) = window.history() else { return };
        let url = if hash.is_empty() {
            // Keep path and query, drop the fragment
            let location = window.location();
            format!(
                "{}{}",
                location.pathname().unwrap_or_default(),
                location.search().unwrap_or_default()
            )
        } else {
            hash.to_string()
        };
        let result = if push {
            history.push_state_with_url(&JsValue::NULL, "", Some(&url))
        } else {
            history.replace_state_with_url(&JsValue::NULL, "", Some(&url))
        };
        if let Err(e) = result {
            tracing::warn!("history update failed: {}", js_error_name(&e));
        }
    }
}

impl Location for BrowserLocation {
    fn hash(&self) -> String {
        web_sys::window()
            .and_then(|w| w.location().hash().ok())
            .unwrap_or_default()
    }

    fn replace_hash(&self, hash: &str) {
        Self::write(hash, false);
    }

    fn push_hash(&self, hash: &str) {
        Self::write(hash, true);
    }
}

/// Run `f` on the next animation frame.
pub fn on_next_frame(f: impl FnOnce() + 'static) {
    let Some(window) = web_sys::window() else { return };
    let callback = Closure::once_into_js(f);
    if window
        .request_animation_frame(callback.unchecked_ref())
        .is_err()
    {
        tracing::warn!("requestAnimationFrame unavailable");
    }
}

/// A window event listener removed on drop.
pub struct WindowListener {
    event: &'static str,
    callback: Closure<dyn FnMut(web_sys::Event)>,
}

impl WindowListener {
    pub fn new(event: &'static str, handler: impl FnMut(web_sys::Event) + 'static) -> Option<Self> {
        let window = web_sys::window()?;
        let callback = Closure::wrap(Box::new(handler) as Box<dyn FnMut(web_sys::Event)>);
        window
            .add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())
            .ok()?;
        Some(WindowListener { event, callback })
    }
}

impl Drop for WindowListener {
    fn drop(&mut self) {
        if let Some(window) = web_sys::window() {
            let _ = window
                .remove_event_listener_with_callback(self.event, self.callback.as_ref().unchecked_ref());
        }
    }
}

fn read_number(obj: &JsValue, key: &str) -> Option<f64> {
    js_sys::Reflect::get(obj, &JsValue::from_str(key))
        .ok()?
        .as_f64()
}

/// A `navigator.geolocation.watchPosition` registration; dropping it
/// clears the watch.
pub struct GeoWatch {
    id: i32,
    _on_position: Closure<dyn FnMut(JsValue)>,
    _on_error: Closure<dyn FnMut(JsValue)>,
}

impl GeoWatch {
    pub fn start(
        mut on_position: impl FnMut(LonLat) + 'static,
        mut on_error: impl FnMut(String) + 'static,
    ) -> Result<Self, String> {
        let geolocation = web_sys::window()
            .ok_or("no window")?
            .navigator()
            .geolocation()
            .map_err(|_| "Geolocation is not available".to_string())?;

        let on_position = Closure::wrap(Box::new(move |pos: JsValue| {
            let coords = js_sys::Reflect::get(&pos, &JsValue::from_str("coords")).ok();
            let lonlat = coords
                .and_then(|c| Some([read_number(&c, "longitude")?, read_number(&c, "latitude")?]));
            if let Some(lonlat) = lonlat {
                on_position(lonlat);
            }
        }) as Box<dyn FnMut(JsValue)>);

        let on_error = Closure::wrap(Box::new(move |err: JsValue| {
            let message = js_sys::Reflect::get(&err, &JsValue::from_str("message"))
                .ok()
                .and_then(|m| m.as_string())
                .unwrap_or_else(|| "Location unavailable".to_string());
            on_error(message);
        }) as Box<dyn FnMut(JsValue)>);

        let id = geolocation
            .watch_position_with_error_callback(
                on_position.as_ref().unchecked_ref(),
                Some(on_error.as_ref().unchecked_ref()),
            )
            .map_err(|e| js_error_name(&e))?;

        Ok(GeoWatch {
            id,
            _on_position: on_position,
            _on_error: on_error,
        })
    }
}

impl Drop for GeoWatch {
    fn drop(&mut self) {
        if let Some(geo) = web_sys::window().and_then(|w| w.navigator().geolocation().ok()) {
            geo.clear_watch(self.id);
        }
    }
}

/// Copy `text` to the clipboard in the background.
pub fn copy_to_clipboard(text: String) {
    wasm_bindgen_futures::spawn_local(async move {
        if let Some(window) = web_sys::window() {
            let clipboard = window.navigator().clipboard();
            let _ = wasm_bindgen_futures::JsFuture::from(clipboard.write_text(&text)).await;
        }
    });
}

/// Page origin, for share links.
pub fn current_origin() -> Option<String> {
    web_sys::window()?.location().origin().ok()
}
