//! Application-wide stores, built once and shared through the Dioxus context.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{json, Value};
use vma_shared::annotation::{AnnotationFeature, AnnotationField, AnnotationLayer, AnnotationSummary, HistoryEntry};
use vma_shared::geo::ProximityCheck;
use vma_shared::history::History;
use vma_shared::ids::random_id;
use vma_shared::map_state::{CameraStore, LayerStore};
use vma_shared::models::{
    AnnotationSet, CameraState, Interaction, LayerPreferences, LonLat, Millis, Story, StoryLibrary,
    StoryPlayerState, StoryProgress,
};
use vma_shared::notice::NoticeQueue;
use vma_shared::persist::{
    KeyValueStore, PersistedStore, RecordStore, LAYER_PREFS_KEY, STORY_LIBRARY_KEY, STORY_PLAYER_KEY,
};
use vma_shared::scenes::{
    apply_scene, find_first_visible_index, find_next_visible_index, scene_from_view, Autoplay, Direction, SceneDeck,
};
use vma_shared::search::{SearchSession, SEARCH_STORE};
use vma_shared::store::{Store, Subscription};
use vma_shared::story::{PlayerStatus, RemoteMirror, StoryLibraryStore, StoryPlayer};
use vma_shared::timing::{Clock, RequestGate, Throttle};

use crate::api::CATALOG_STORE;

pub const USER_ID_KEY: &str = "vma-user-id";
pub const RECORDS_NAMESPACE: &str = "vma-cache";
pub const LAYER_PREFS_DEBOUNCE_MS: Millis = 500;
/// Minimum spacing between geolocation fixes fed to the player.
pub const POSITION_THROTTLE_MS: Millis = 2_000;

fn load_user_id(storage: &dyn KeyValueStore) -> String {
    match storage.get_item(USER_ID_KEY) {
        Ok(Some(id)) if !id.is_empty() => return id,
        Ok(_) => {}
        Err(e) => tracing::warn!("reading user id failed: {e}"),
    }
    let id = random_id("user");
    if let Err(e) = storage.set_item(USER_ID_KEY, &id) {
        tracing::warn!("storing user id failed: {e}");
    }
    id
}

/// Annotation layer plus its undo history. Observers are told about
/// changes through a revision counter.
#[derive(Clone)]
pub struct AnnotationEditor {
    layer: Rc<RefCell<AnnotationLayer>>,
    history: Rc<RefCell<History<HistoryEntry>>>,
    revision: Store<u64>,
    set_id: Rc<RefCell<Option<String>>>,
}

impl Default for AnnotationEditor {
    fn default() -> Self {
        AnnotationEditor {
            layer: Rc::new(RefCell::new(AnnotationLayer::new())),
            history: Rc::new(RefCell::new(History::new())),
            revision: Store::new(0),
            set_id: Rc::new(RefCell::new(None)),
        }
    }
}

impl AnnotationEditor {
    pub fn subscribe(&self, listener: impl Fn(&u64) + 'static) -> Subscription {
        self.revision.subscribe(listener)
    }

    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    fn bump(&self) {
        self.revision.update(|r| *r += 1);
    }

    fn record(&self, entry: Option<HistoryEntry>) -> bool {
        let Some(entry) = entry else { return false };
        self.history.borrow_mut().push(entry);
        self.bump();
        true
    }

    pub fn summaries(&self) -> Vec<AnnotationSummary> {
        self.layer.borrow().summaries()
    }

    pub fn feature_collection(&self) -> Value {
        self.layer.borrow().to_feature_collection()
    }

    pub fn layer(&self) -> AnnotationLayer {
        self.layer.borrow().clone()
    }

    pub fn selected_id(&self) -> Option<String> {
        self.layer.borrow().selected_id().map(str::to_string)
    }

    pub fn select(&self, id: Option<&str>) {
        self.layer.borrow_mut().select(id);
        self.bump();
    }

    pub fn can_undo(&self) -> bool {
        self.history.borrow().can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.borrow().can_redo()
    }

    /// Drop a point marker; returns the new feature id.
    pub fn add_point(&self, at: LonLat, label: &str) -> String {
        let mut feature = AnnotationFeature::new(json!({ "type": "Point", "coordinates": at }));
        feature.label = label.to_string();
        let id = feature.id.clone();
        let entry = self.layer.borrow_mut().add(feature);
        self.record(Some(entry));
        id
    }

    pub fn set_label(&self, id: &str, label: &str) -> bool {
        let entry = self
            .layer
            .borrow_mut()
            .update_fields(id, &[(AnnotationField::Label, json!(label))]);
        self.record(entry)
    }

    pub fn toggle_hidden(&self, id: &str) -> bool {
        let hidden = match self.layer.borrow().get(id) {
            Some(f) => f.hidden,
            None => return false,
        };
        let entry = self
            .layer
            .borrow_mut()
            .update_fields(id, &[(AnnotationField::Hidden, json!(!hidden))]);
        self.record(entry)
    }

    pub fn move_point(&self, id: &str, to: LonLat) -> bool {
        let entry = self
            .layer
            .borrow_mut()
            .replace_geometry(id, json!({ "type": "Point", "coordinates": to }));
        self.record(entry)
    }

    pub fn remove(&self, id: &str) -> bool {
        let entry = self.layer.borrow_mut().remove(id);
        self.record(entry)
    }

    pub fn clear(&self) -> bool {
        let entry = self.layer.borrow_mut().clear();
        self.record(entry)
    }

    /// Import every feature of a FeatureCollection as one undoable step.
    pub fn import(&self, collection: &Value) -> bool {
        let incoming = AnnotationLayer::from_feature_collection(collection);
        let features = incoming.features().to_vec();
        let entry = self.layer.borrow_mut().bulk_add(features);
        self.record(entry)
    }

    pub fn undo(&self) -> bool {
        let Some(entry) = self.history.borrow_mut().undo() else {
            return false;
        };
        self.layer.borrow_mut().apply_undo(&entry);
        self.bump();
        true
    }

    pub fn redo(&self) -> bool {
        let Some(entry) = self.history.borrow_mut().redo() else {
            return false;
        };
        self.layer.borrow_mut().apply_redo(&entry);
        self.bump();
        true
    }

    /// Replace the layer with a saved set. History starts over.
    pub fn load(&self, set: &AnnotationSet) {
        *self.layer.borrow_mut() = AnnotationLayer::from_feature_collection(&set.features);
        self.history.borrow_mut().reset();
        *self.set_id.borrow_mut() = Some(set.id.clone());
        self.bump();
    }

    /// Server id of the set this layer was loaded from or last saved as.
    pub fn set_id(&self) -> Option<String> {
        self.set_id.borrow().clone()
    }

    pub fn remember_set_id(&self, id: String) {
        *self.set_id.borrow_mut() = Some(id);
    }
}

/// Everything the viewer pages share.
#[derive(Clone)]
pub struct AppState {
    pub clock: Rc<dyn Clock>,
    pub user_id: String,
    pub camera: CameraStore,
    pub layers: LayerStore,
    pub notices: NoticeQueue,
    pub library: StoryLibraryStore,
    pub player: StoryPlayer,
    pub scenes: SceneDeck,
    pub annotations: AnnotationEditor,
    pub records: Rc<RecordStore>,
    /// Guards async story loads so a stale response cannot land last.
    pub story_requests: Rc<RequestGate>,
    pub search: SearchSession,
    autoplay: Rc<RefCell<Autoplay>>,
    position_throttle: Rc<RefCell<Throttle>>,
    layer_prefs: Rc<PersistedStore<LayerPreferences>>,
    _story_library: Rc<PersistedStore<StoryLibrary>>,
    _player_state: Rc<PersistedStore<StoryPlayerState>>,
}

impl AppState {
    /// `mirror` receives the user id and the notice queue so remote
    /// failures can be reported.
    pub fn new(
        storage: Rc<dyn KeyValueStore>,
        clock: Rc<dyn Clock>,
        mirror: impl FnOnce(&str, &NoticeQueue) -> Rc<dyn RemoteMirror>,
    ) -> Self {
        let user_id = load_user_id(storage.as_ref());
        let notices = NoticeQueue::new(clock.clone());
        let mirror = mirror(&user_id, &notices);

        let layer_prefs = Rc::new(PersistedStore::open_debounced(
            LAYER_PREFS_KEY,
            LayerPreferences::default(),
            storage.clone(),
            clock.clone(),
            LAYER_PREFS_DEBOUNCE_MS,
        ));
        let story_library = Rc::new(PersistedStore::open(
            STORY_LIBRARY_KEY,
            StoryLibrary::default(),
            storage.clone(),
        ));
        let player_state = Rc::new(PersistedStore::open(
            STORY_PLAYER_KEY,
            StoryPlayerState::default(),
            storage.clone(),
        ));

        let library = StoryLibraryStore::new(
            story_library.store().clone(),
            mirror.clone(),
            clock.clone(),
            user_id.clone(),
        );
        let player = StoryPlayer::new(player_state.store().clone(), mirror, clock.clone());
        let records = Rc::new(RecordStore::new(
            RECORDS_NAMESPACE,
            &[CATALOG_STORE, SEARCH_STORE],
            storage,
            clock.clone(),
        ));

        tracing::info!(
            user = %user_id,
            stories = library.stories().len(),
            "archive state ready"
        );

        AppState {
            clock,
            user_id,
            camera: CameraStore::new(CameraState::default()),
            layers: LayerStore::from_store(layer_prefs.store().clone()),
            notices,
            library,
            player,
            scenes: SceneDeck::new(),
            annotations: AnnotationEditor::default(),
            search: SearchSession::new(records.clone()),
            records,
            story_requests: Rc::new(RequestGate::new()),
            autoplay: Rc::new(RefCell::new(Autoplay::new())),
            position_throttle: Rc::new(RefCell::new(Throttle::new(POSITION_THROTTLE_MS))),
            layer_prefs,
            _story_library: story_library,
            _player_state: player_state,
        }
    }

    pub fn now(&self) -> Millis {
        self.clock.now_ms()
    }

    /// Drive every deadline-based timer. Called from the page's tick loop.
    pub fn tick(&self, now: Millis) {
        self.layer_prefs.poll();
        self.notices.expire(now);

        let scenes = self.scenes.scenes();
        let (next, running) = {
            let mut autoplay = self.autoplay.borrow_mut();
            let next = autoplay.poll(&scenes, now);
            (next, autoplay.is_running())
        };
        if let Some(index) = next {
            self.scenes.set_active_index(index);
            if let Some(scene) = scenes.get(index) {
                apply_scene(scene, &self.camera, &self.layers);
            }
        }
        // Autoplay stops itself when nothing else is visible
        if self.scenes.get().autoplay != running {
            self.scenes.set_autoplay(running);
        }
    }

    /// Persist anything still waiting on a debounce.
    pub fn flush(&self) {
        self.layer_prefs.flush();
    }

    pub fn autoplay_running(&self) -> bool {
        self.autoplay.borrow().is_running()
    }

    // Scenes

    pub fn capture_scene(&self, title: &str) {
        self.scenes
            .add_scene(scene_from_view(&self.camera, &self.layers, title));
    }

    /// Show a scene and restart the autoplay countdown from it.
    pub fn show_scene(&self, index: usize) {
        let scenes = self.scenes.scenes();
        let Some(scene) = scenes.get(index) else { return };
        self.scenes.set_active_index(index);
        apply_scene(scene, &self.camera, &self.layers);
        self.autoplay.borrow_mut().jump_to(&scenes, index, self.now());
    }

    pub fn toggle_autoplay(&self) {
        let scenes = self.scenes.scenes();
        let current = self.scenes.get().active_scene_index;
        let running = {
            let mut autoplay = self.autoplay.borrow_mut();
            autoplay.toggle(&scenes, current, self.now());
            autoplay.is_running()
        };
        self.scenes.set_autoplay(running);
    }

    /// Show the next or previous visible scene.
    pub fn step_scene(&self, direction: Direction) {
        let scenes = self.scenes.scenes();
        let current = self.scenes.get().active_scene_index;
        if let Some(index) = find_next_visible_index(&scenes, current, direction) {
            self.show_scene(index);
        }
    }

    /// Enter or leave presentation. Leaving stops autoplay.
    pub fn set_presenting(&self, presenting: bool) {
        if presenting {
            let scenes = self.scenes.scenes();
            let start = self.scenes.get().active_scene_index;
            if let Some(index) = find_first_visible_index(&scenes, start) {
                self.show_scene(index);
            }
        } else {
            self.autoplay.borrow_mut().stop();
        }
        self.scenes.set_presenting(presenting);
    }

    pub fn stop_autoplay(&self) {
        self.autoplay.borrow_mut().cleanup();
        self.scenes.set_autoplay(false);
    }

    // Stories

    /// Merge server copies into the local library and player.
    pub fn merge_remote(&self, stories: Vec<Story>, progress: Vec<StoryProgress>) {
        self.library.load_remote(stories);
        self.player.load_remote(progress);
    }

    /// Feed a geolocation fix to the player for `story_id`. Fixes arriving
    /// faster than [`POSITION_THROTTLE_MS`] are dropped.
    pub fn handle_position(&self, story_id: &str, position: LonLat) -> Option<ProximityCheck> {
        if !self.position_throttle.borrow_mut().ready(self.now()) {
            return None;
        }
        let story = self.library.story(story_id)?;
        let check = self.player.check_position(&story, position);
        if let Some(done) = self.player.advance_on_position(&story, position) {
            self.announce_completion(&story, &done);
        }
        check
    }

    /// Complete the current QR stop when `payload` matches.
    pub fn scan_qr(&self, story_id: &str, payload: &str) -> bool {
        let Some(story) = self.library.story(story_id) else {
            return false;
        };
        match self.player.complete_with_qr(&story, payload.trim()) {
            Some(done) => {
                self.announce_completion(&story, &done);
                true
            }
            None => {
                self.notices.add_warning("That code does not match this stop");
                false
            }
        }
    }

    /// Mark the current photo stop as done; the hunter confirms it by hand.
    pub fn confirm_photo_stop(&self, story_id: &str) -> bool {
        if self.player.active_story_id().as_deref() != Some(story_id) {
            return false;
        }
        let Some(story) = self.library.story(story_id) else {
            return false;
        };
        let Some(progress) = self.player.progress(story_id) else {
            return false;
        };
        let Some(point) = story.points.get(progress.current_point_index) else {
            return false;
        };
        if point.interaction != Interaction::Camera {
            return false;
        }
        let point_id = point.id.clone();
        if !self.player.complete_point(story_id, &point_id, story.points.len()) {
            return false;
        }
        self.announce_completion(&story, &point_id);
        true
    }

    fn announce_completion(&self, story: &Story, point_id: &str) {
        let title = story
            .point(point_id)
            .map(|p| p.title.clone())
            .unwrap_or_default();
        self.notices.add_success(format!("Reached {title}"));
        if matches!(self.player.status(), PlayerStatus::Finished { .. }) {
            self.notices.add_success(format!("Finished {}", story.title));
        }
    }

    pub fn reset_geolocation_throttle(&self) {
        self.position_throttle.borrow_mut().reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vma_shared::geo::offset_north;
    use vma_shared::models::ViewMode;
    use vma_shared::notice::NoticeLevel;
    use vma_shared::persist::MemoryStorage;
    use vma_shared::story::NoMirror;
    use vma_shared::timing::ManualClock;

    fn app() -> (AppState, MemoryStorage, ManualClock) {
        let mem = MemoryStorage::new();
        let clock = ManualClock::new(1_000);
        let state = AppState::new(Rc::new(mem.clone()), Rc::new(clock.clone()), |_, _| {
            Rc::new(NoMirror)
        });
        (state, mem, clock)
    }

    #[test]
    fn test_user_id_is_stable() {
        let (first, mem, clock) = app();
        let again = AppState::new(Rc::new(mem.clone()), Rc::new(clock), |_, _| Rc::new(NoMirror));
        assert!(first.user_id.starts_with("user-"));
        assert_eq!(first.user_id, again.user_id);
    }

    #[test]
    fn test_search_results_survive_reload() {
        use vma_shared::search::{SearchResult, SearchStart};

        let (state, mem, clock) = app();
        let SearchStart::Pending(request) = state.search.begin("Hue") else {
            panic!("expected a network lookup");
        };
        let hits: Vec<SearchResult> = serde_json::from_value(json!([
            {"place_id": 7, "display_name": "Huế", "lat": "16.46", "lon": "107.59"}
        ]))
        .unwrap();
        assert!(state.search.finish(request, Ok(hits)));

        let again = AppState::new(Rc::new(mem), Rc::new(clock), |_, _| Rc::new(NoMirror));
        assert_eq!(again.search.begin(" hue "), SearchStart::Cached);
        assert_eq!(again.search.state().results[0].display_name, "Huế");
    }

    #[test]
    fn test_layer_prefs_persist_after_debounce() {
        let (state, mem, clock) = app();
        state.layers.set_mode(ViewMode::Spy);
        assert!(mem.get_item(LAYER_PREFS_KEY).unwrap().is_none());

        clock.advance(LAYER_PREFS_DEBOUNCE_MS);
        state.tick(clock.now_ms());
        let saved = mem.get_item(LAYER_PREFS_KEY).unwrap().unwrap();
        assert!(saved.contains("\"spy\""));
    }

    #[test]
    fn test_stories_persist_immediately() {
        let (state, mem, _clock) = app();
        let id = state.library.create_story("Citadel", "");
        let saved = mem.get_item(STORY_LIBRARY_KEY).unwrap().unwrap();
        assert!(saved.contains(&id));
    }

    #[test]
    fn test_hunt_by_position_with_notices() {
        let (state, _mem, clock) = app();
        let id = state.library.create_story("Hunt", "");
        let origin = [106.70, 10.77];
        let a = state.library.add_point(&id, origin).unwrap();
        state.library.add_point(&id, offset_north(origin, 500.0)).unwrap();
        state.player.start(&id);

        let check = state.handle_position(&id, offset_north(origin, 3.0)).unwrap();
        assert_eq!(check.point_id, a);
        assert!(check.reached);
        assert_eq!(state.player.progress(&id).unwrap().current_point_index, 1);
        assert_eq!(state.notices.notices()[0].level, NoticeLevel::Success);

        // Throttled: a second fix inside the window is ignored
        assert!(state.handle_position(&id, offset_north(origin, 500.0)).is_none());
        clock.advance(POSITION_THROTTLE_MS);
        state.handle_position(&id, offset_north(origin, 500.0));
        assert!(state.player.progress(&id).unwrap().is_finished());
    }

    #[test]
    fn test_scan_qr_mismatch_warns() {
        let (state, _mem, _clock) = app();
        let id = state.library.create_story("QR", "");
        state.library.add_point(&id, [106.7, 10.77]);
        state.player.start(&id);
        assert!(!state.scan_qr(&id, "nope"));
        assert_eq!(state.notices.notices()[0].level, NoticeLevel::Warning);
    }

    #[test]
    fn test_confirm_photo_stop_only_for_camera_points() {
        let (state, _mem, _clock) = app();
        let id = state.library.create_story("Photos", "");
        let first = state.library.add_point(&id, [106.7, 10.77]).unwrap();
        let second = state.library.add_point(&id, [106.71, 10.78]).unwrap();
        state.library.update_point(
            &id,
            &second,
            vma_shared::story::PointUpdate {
                interaction: Some(Interaction::Camera),
                ..Default::default()
            },
        );

        assert!(!state.confirm_photo_stop(&id));
        state.player.start(&id);
        assert!(!state.confirm_photo_stop(&id));

        state.player.complete_point(&id, &first, 2);
        assert!(state.confirm_photo_stop(&id));
        assert!(state.player.progress(&id).unwrap().is_finished());
    }

    #[test]
    fn test_autoplay_advances_scenes_on_tick() {
        let (state, _mem, clock) = app();
        state.camera.set_all(vma_shared::map_state::CameraPatch::center(105.85, 21.03));
        state.capture_scene("Hanoi");
        state.camera.set_all(vma_shared::map_state::CameraPatch::center(106.70, 10.77));
        state.capture_scene("Saigon");

        state.show_scene(0);
        assert!((state.camera.get().longitude - 105.85).abs() < 1e-9);
        state.toggle_autoplay();
        assert!(state.autoplay_running());

        clock.advance(5_000);
        state.tick(clock.now_ms());
        assert_eq!(state.scenes.get().active_scene_index, 1);
        assert!((state.camera.get().longitude - 106.70).abs() < 1e-9);

        state.stop_autoplay();
        assert!(!state.scenes.get().autoplay);
    }

    #[test]
    fn test_autoplay_self_stop_reaches_scene_deck() {
        let (state, _mem, clock) = app();
        state.capture_scene("A");
        state.capture_scene("B");
        state.show_scene(0);
        state.toggle_autoplay();
        assert!(state.scenes.get().autoplay);

        state.scenes.toggle_visibility(1);
        clock.advance(5_000);
        state.tick(clock.now_ms());
        assert!(!state.autoplay_running());
        assert!(!state.scenes.get().autoplay);
        assert_eq!(state.scenes.get().active_scene_index, 0);
    }

    #[test]
    fn test_step_scene_skips_hidden_and_presenting_stops_autoplay() {
        let (state, _mem, _clock) = app();
        for title in ["A", "B", "C"] {
            state.capture_scene(title);
        }
        state.scenes.toggle_visibility(1);

        state.set_presenting(true);
        assert!(state.scenes.get().presenting);
        state.step_scene(Direction::Forward);
        assert_eq!(state.scenes.get().active_scene_index, 2);
        state.step_scene(Direction::Forward);
        assert_eq!(state.scenes.get().active_scene_index, 0);
        state.step_scene(Direction::Backward);
        assert_eq!(state.scenes.get().active_scene_index, 2);

        state.toggle_autoplay();
        assert!(state.autoplay_running());
        state.set_presenting(false);
        assert!(!state.autoplay_running());
        assert!(!state.scenes.get().autoplay);
    }

    #[test]
    fn test_annotation_editor_undo_redo() {
        let editor = AnnotationEditor::default();
        let id = editor.add_point([106.7, 10.77], "Market");
        assert!(editor.set_label(&id, "Ben Thanh"));
        assert!(!editor.set_label(&id, "Ben Thanh"));
        assert_eq!(editor.summaries()[0].label, "Ben Thanh");

        assert!(editor.undo());
        assert_eq!(editor.summaries()[0].label, "Market");
        assert!(editor.undo());
        assert!(editor.summaries().is_empty());
        assert!(!editor.undo());

        assert!(editor.redo());
        assert_eq!(editor.summaries().len(), 1);
        assert!(editor.can_redo());
    }

    #[test]
    fn test_annotation_editor_load_resets_history() {
        let editor = AnnotationEditor::default();
        editor.add_point([106.7, 10.77], "Temp");
        let set = AnnotationSet {
            id: "set-1".into(),
            title: "Saved".into(),
            map_id: None,
            owner_id: "u1".into(),
            features: json!({"type": "FeatureCollection", "features": [
                {"type": "Feature", "id": "a1", "geometry": {"type": "Point", "coordinates": [1.0, 2.0]},
                 "properties": {"label": "Pin"}}
            ]}),
            created_at: 0,
            updated_at: 0,
        };
        let before = editor.revision();
        editor.load(&set);
        assert!(editor.revision() > before);
        assert!(!editor.can_undo());
        assert_eq!(editor.set_id().as_deref(), Some("set-1"));
        assert_eq!(editor.summaries()[0].label, "Pin");
    }
}
