//! Presentation scenes of the viewer's story mode and their autoplay timer.

use tracing::debug;

use crate::ids::random_id;
use crate::map_state::{CameraPatch, CameraStore, LayerStore};
use crate::models::{Millis, StoryScene, STORY_DEFAULT_DELAY, STORY_DELAY_MAX, STORY_DELAY_MIN};
use crate::store::{Store, Subscription};

/// Clamp a scene delay in seconds to `[1, 60]`, rounding to whole seconds.
pub fn clamp_story_delay(value: f64) -> f64 {
    if !value.is_finite() {
        return STORY_DEFAULT_DELAY;
    }
    value.round().clamp(STORY_DELAY_MIN, STORY_DELAY_MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// First non-hidden scene scanning circularly from `start`.
pub fn find_first_visible_index(scenes: &[StoryScene], start: usize) -> Option<usize> {
    let len = scenes.len();
    (0..len)
        .map(|i| (start + i) % len)
        .find(|&i| !scenes[i].hidden)
}

/// Next non-hidden scene after `current` in `direction`, wrapping around.
/// May return `current` itself when it is the only visible scene.
pub fn find_next_visible_index(scenes: &[StoryScene], current: usize, direction: Direction) -> Option<usize> {
    let len = scenes.len();
    if len == 0 {
        return None;
    }
    let current = current % len;
    (1..=len)
        .map(|step| match direction {
            Direction::Forward => (current + step) % len,
            Direction::Backward => (current + len - step % len) % len,
        })
        .find(|&i| !scenes[i].hidden)
}

/// Scene capturing the current camera and layer state.
pub fn scene_from_view(camera: &CameraStore, layers: &LayerStore, title: &str) -> StoryScene {
    let cam = camera.get();
    let prefs = layers.get();
    StoryScene {
        id: random_id("scene"),
        title: title.to_string(),
        center: [cam.longitude, cam.latitude],
        zoom: cam.zoom,
        rotation: cam.rotation,
        basemap: prefs.basemap,
        overlay_id: cam.active_overlay_id,
        opacity: prefs.view.opacity,
        view_mode: prefs.view.mode,
        side_ratio: prefs.view.side_ratio,
        lens_radius: prefs.view.lens_radius,
        ..Default::default()
    }
}

/// Push a scene's camera and view settings into the stores.
pub fn apply_scene(scene: &StoryScene, camera: &CameraStore, layers: &LayerStore) {
    camera.set_all(CameraPatch {
        longitude: Some(scene.center[0]),
        latitude: Some(scene.center[1]),
        zoom: Some(scene.zoom),
        rotation: Some(scene.rotation),
        active_overlay: Some(scene.overlay_id.clone()),
    });
    layers.set_basemap(scene.basemap.clone());
    layers.set_mode(scene.view_mode);
    layers.set_opacity(scene.opacity);
    layers.set_side_ratio(scene.side_ratio);
    layers.set_lens_radius(scene.lens_radius);
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneDeckState {
    pub scenes: Vec<StoryScene>,
    pub active_scene_index: usize,
    pub editing_index: Option<usize>,
    pub presenting: bool,
    pub autoplay: bool,
}

/// Editable, presentable list of scenes.
#[derive(Clone)]
pub struct SceneDeck {
    store: Store<SceneDeckState>,
}

impl Default for SceneDeck {
    fn default() -> Self {
        SceneDeck::new()
    }
}

impl SceneDeck {
    pub fn new() -> Self {
        SceneDeck {
            store: Store::new(SceneDeckState::default()),
        }
    }

    pub fn get(&self) -> SceneDeckState {
        self.store.get()
    }

    pub fn scenes(&self) -> Vec<StoryScene> {
        self.store.with(|s| s.scenes.clone())
    }

    pub fn visible_scenes(&self) -> Vec<StoryScene> {
        self.store
            .with(|s| s.scenes.iter().filter(|sc| !sc.hidden).cloned().collect())
    }

    pub fn subscribe(&self, listener: impl Fn(&SceneDeckState) + 'static) -> Subscription {
        self.store.subscribe(listener)
    }

    pub fn add_scene(&self, mut scene: StoryScene) {
        scene.delay = clamp_story_delay(scene.delay);
        self.store.update(|s| s.scenes.push(scene));
    }

    /// Replace the scene at `index` and leave edit mode.
    pub fn update_scene(&self, index: usize, mut scene: StoryScene) {
        scene.delay = clamp_story_delay(scene.delay);
        self.store.update(|s| {
            if let Some(slot) = s.scenes.get_mut(index) {
                *slot = scene;
            }
            s.editing_index = None;
        });
    }

    pub fn remove_scene(&self, index: usize) {
        self.store.update(|s| {
            if index < s.scenes.len() {
                s.scenes.remove(index);
            }
            s.active_scene_index = s.active_scene_index.min(s.scenes.len().saturating_sub(1));
        });
    }

    /// Insert a copy after `index` with a fresh id and a "(copy)" title.
    pub fn duplicate_scene(&self, index: usize) {
        let Some(scene) = self.store.with(|s| s.scenes.get(index).cloned()) else {
            return;
        };
        let copy = StoryScene {
            id: random_id("scene"),
            title: format!("{} (copy)", scene.title),
            ..scene
        };
        self.store.update(|s| s.scenes.insert(index + 1, copy));
    }

    pub fn move_scene(&self, from: usize, to: usize) {
        let len = self.store.with(|s| s.scenes.len());
        if from == to || from >= len || to >= len {
            return;
        }
        self.store.update(|s| {
            let moved = s.scenes.remove(from);
            s.scenes.insert(to, moved);
        });
    }

    pub fn toggle_visibility(&self, index: usize) {
        self.store.update(|s| {
            if let Some(scene) = s.scenes.get_mut(index) {
                scene.hidden = !scene.hidden;
            }
        });
    }

    pub fn set_active_index(&self, index: usize) {
        self.store.update(|s| s.active_scene_index = index);
    }

    pub fn set_editing_index(&self, index: Option<usize>) {
        self.store.update(|s| s.editing_index = index);
    }

    /// Leaving presentation mode also switches autoplay off.
    pub fn set_presenting(&self, presenting: bool) {
        self.store.update(|s| {
            s.presenting = presenting;
            if !presenting {
                s.autoplay = false;
            }
        });
    }

    pub fn set_autoplay(&self, autoplay: bool) {
        self.store.update(|s| s.autoplay = autoplay);
    }

    pub fn set_scenes(&self, scenes: Vec<StoryScene>) {
        self.store.update(|s| s.scenes = scenes);
    }

    pub fn clear(&self) {
        self.store.set(SceneDeckState::default());
    }
}

/// Single-timer autoplay over a scene list.
///
/// Holds at most one deadline. The host calls [`Autoplay::poll`] with the
/// current scenes; when the deadline has passed it returns the index to show
/// and arms the next deadline from that scene's delay.
#[derive(Debug, Clone, Default)]
pub struct Autoplay {
    running: bool,
    current: usize,
    deadline: Option<Millis>,
}

impl Autoplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn next_deadline(&self) -> Option<Millis> {
        self.deadline
    }

    pub fn start(&mut self, scenes: &[StoryScene], current: usize, now: Millis) {
        if self.running {
            return;
        }
        self.running = true;
        self.current = current;
        self.schedule_next(scenes, now);
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.deadline = None;
    }

    pub fn toggle(&mut self, scenes: &[StoryScene], current: usize, now: Millis) {
        if self.running {
            self.stop();
        } else {
            self.start(scenes, current, now);
        }
    }

    /// Manual navigation while running restarts the countdown from `index`.
    pub fn jump_to(&mut self, scenes: &[StoryScene], index: usize, now: Millis) {
        self.current = index;
        if self.running {
            self.schedule_next(scenes, now);
        }
    }

    pub fn cleanup(&mut self) {
        self.stop();
    }

    /// Advance if the deadline has passed. Stops when no other visible
    /// scene is left.
    pub fn poll(&mut self, scenes: &[StoryScene], now: Millis) -> Option<usize> {
        let deadline = self.deadline?;
        if !self.running || now < deadline {
            return None;
        }
        match self.next_index(scenes) {
            Some(next) => {
                self.current = next;
                self.schedule_next(scenes, now);
                Some(next)
            }
            None => {
                self.stop();
                None
            }
        }
    }

    fn next_index(&self, scenes: &[StoryScene]) -> Option<usize> {
        find_next_visible_index(scenes, self.current, Direction::Forward)
            .filter(|&next| next != self.current)
    }

    fn schedule_next(&mut self, scenes: &[StoryScene], now: Millis) {
        if self.next_index(scenes).is_none() {
            debug!("autoplay stopping: no other visible scene");
            self.stop();
            return;
        }
        let delay = scenes
            .get(self.current)
            .map(|s| s.delay)
            .unwrap_or(STORY_DEFAULT_DELAY);
        let delay_ms = (clamp_story_delay(delay) * 1000.0) as Millis;
        self.deadline = Some(now + delay_ms);
    }
}
