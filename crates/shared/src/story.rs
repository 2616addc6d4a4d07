//! Story library and the story/hunt progression state machine.
//!
//! Both stores are authoritative locally. After each successful mutation
//! they notify a [`RemoteMirror`]; the mirror's outcome never feeds back.

use std::rc::Rc;

use tracing::{debug, info};

use crate::geo::{self, ProximityCheck};
use crate::ids::random_id;
use crate::models::{
    Interaction, LonLat, PointCamera, PointChallenge, Region, Story, StoryLibrary, StoryMode,
    StoryPlayerState, StoryPoint, StoryProgress,
};
use crate::store::{Store, Subscription};
use crate::timing::Clock;

/// Best-effort remote copy of local writes.
pub trait RemoteMirror {
    fn story_saved(&self, story: &Story);
    fn story_deleted(&self, story_id: &str);
    fn progress_saved(&self, progress: &StoryProgress);
    fn progress_deleted(&self, story_id: &str);
}

/// Mirror for anonymous sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMirror;

impl RemoteMirror for NoMirror {
    fn story_saved(&self, _story: &Story) {}
    fn story_deleted(&self, _story_id: &str) {}
    fn progress_saved(&self, _progress: &StoryProgress) {}
    fn progress_deleted(&self, _story_id: &str) {}
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoryUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub region: Option<Option<Region>>,
    pub mode: Option<StoryMode>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub hint: Option<Option<String>>,
    pub quest: Option<Option<String>>,
    pub coordinates: Option<LonLat>,
    pub trigger_radius: Option<f64>,
    pub interaction: Option<Interaction>,
    pub challenge: Option<PointChallenge>,
    pub qr_payload: Option<Option<String>>,
    pub overlay_map_id: Option<Option<String>>,
    pub camera: Option<Option<PointCamera>>,
}

impl PointUpdate {
    fn apply(self, point: &mut StoryPoint) {
        if let Some(v) = self.title {
            point.title = v;
        }
        if let Some(v) = self.description {
            point.description = v;
        }
        if let Some(v) = self.hint {
            point.hint = v;
        }
        if let Some(v) = self.quest {
            point.quest = v;
        }
        if let Some(v) = self.coordinates.filter(|c| c.iter().all(|x| x.is_finite())) {
            point.coordinates = v;
        }
        if let Some(v) = self.trigger_radius.filter(|r| r.is_finite() && *r > 0.0) {
            point.trigger_radius = v;
        }
        if let Some(v) = self.interaction {
            point.interaction = v;
        }
        if let Some(v) = self.challenge {
            point.challenge = v;
        }
        if let Some(v) = self.qr_payload {
            point.qr_payload = v;
        }
        if let Some(v) = self.overlay_map_id {
            point.overlay_map_id = v;
        }
        if let Some(v) = self.camera {
            point.camera = v;
        }
    }
}

/// Authoring operations over the persisted story library.
#[derive(Clone)]
pub struct StoryLibraryStore {
    store: Store<StoryLibrary>,
    mirror: Rc<dyn RemoteMirror>,
    clock: Rc<dyn Clock>,
    author_id: String,
}

impl StoryLibraryStore {
    pub fn new(
        store: Store<StoryLibrary>,
        mirror: Rc<dyn RemoteMirror>,
        clock: Rc<dyn Clock>,
        author_id: impl Into<String>,
    ) -> Self {
        StoryLibraryStore {
            store,
            mirror,
            clock,
            author_id: author_id.into(),
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&StoryLibrary) + 'static) -> Subscription {
        self.store.subscribe(listener)
    }

    pub fn stories(&self) -> Vec<Story> {
        self.store.with(|lib| lib.stories.clone())
    }

    pub fn story(&self, id: &str) -> Option<Story> {
        self.store
            .with(|lib| lib.stories.iter().find(|s| s.id == id).cloned())
    }

    pub fn create_story(&self, title: &str, description: &str) -> String {
        let id = random_id("story");
        let title = if title.trim().is_empty() { "New Story" } else { title };
        let story = Story::new(
            id.clone(),
            title.to_string(),
            description.to_string(),
            self.author_id.clone(),
            self.clock.now_ms(),
        );
        self.store.update(|lib| lib.stories.push(story.clone()));
        info!("created story {id}");
        self.mirror.story_saved(&story);
        id
    }

    pub fn update_story(&self, id: &str, update: StoryUpdate) -> bool {
        self.mutate(id, |story| {
            if let Some(v) = update.title {
                story.title = v;
            }
            if let Some(v) = update.description {
                story.description = v;
            }
            if let Some(v) = update.region {
                story.region = v;
            }
            if let Some(v) = update.mode {
                story.mode = v;
            }
            if let Some(v) = update.is_public {
                story.is_public = v;
            }
            true
        })
    }

    pub fn delete_story(&self, id: &str) -> bool {
        let exists = self.store.with(|lib| lib.stories.iter().any(|s| s.id == id));
        if !exists {
            return false;
        }
        self.store.update(|lib| lib.stories.retain(|s| s.id != id));
        self.mirror.story_deleted(id);
        true
    }

    /// Append a fresh proximity point; returns its id.
    pub fn add_point(&self, story_id: &str, coordinates: LonLat) -> Option<String> {
        let point_id = random_id("point");
        let pid = point_id.clone();
        self.mutate(story_id, move |story| {
            let order = story.points.len();
            story.points.push(StoryPoint::new(pid, order, coordinates));
            true
        })
        .then_some(point_id)
    }

    pub fn update_point(&self, story_id: &str, point_id: &str, update: PointUpdate) -> bool {
        self.mutate(story_id, |story| {
            match story.points.iter_mut().find(|p| p.id == point_id) {
                Some(point) => {
                    update.apply(point);
                    true
                }
                None => false,
            }
        })
    }

    pub fn remove_point(&self, story_id: &str, point_id: &str) -> bool {
        self.mutate(story_id, |story| {
            let before = story.points.len();
            story.points.retain(|p| p.id != point_id);
            story.points.len() != before
        })
    }

    /// Move the point at `from` to `to`. Out-of-range indices are ignored.
    pub fn reorder_points(&self, story_id: &str, from: usize, to: usize) -> bool {
        self.mutate(story_id, |story| {
            let len = story.points.len();
            if from >= len || to >= len || from == to {
                return false;
            }
            let moved = story.points.remove(from);
            story.points.insert(to, moved);
            true
        })
    }

    /// Merge stories fetched from the remote mirror. Remote copies win when
    /// they are at least as new as the local one.
    pub fn load_remote(&self, remote: Vec<Story>) {
        if remote.is_empty() {
            return;
        }
        self.store.update(|lib| {
            for mut incoming in remote {
                incoming.densify_order();
                match lib.stories.iter_mut().find(|s| s.id == incoming.id) {
                    Some(local) if local.updated_at > incoming.updated_at => {}
                    Some(local) => *local = incoming,
                    None => lib.stories.push(incoming),
                }
            }
        });
    }

    /// Apply `f` to the story; on success re-densify, stamp and mirror it.
    fn mutate(&self, id: &str, f: impl FnOnce(&mut Story) -> bool) -> bool {
        let Some(mut story) = self.story(id) else {
            debug!("ignoring mutation of unknown story {id}");
            return false;
        };
        if !f(&mut story) {
            return false;
        }
        story.densify_order();
        story.updated_at = self.clock.now_ms().max(story.updated_at);
        let saved = story.clone();
        self.store.update(|lib| {
            if let Some(slot) = lib.stories.iter_mut().find(|s| s.id == saved.id) {
                *slot = saved;
            }
        });
        self.mirror.story_saved(&story);
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerStatus {
    Idle,
    Running { story_id: String, point_index: usize },
    Finished { story_id: String },
}

/// Progression through stories: `idle -> running -> finished`.
#[derive(Clone)]
pub struct StoryPlayer {
    store: Store<StoryPlayerState>,
    mirror: Rc<dyn RemoteMirror>,
    clock: Rc<dyn Clock>,
}

impl StoryPlayer {
    pub fn new(store: Store<StoryPlayerState>, mirror: Rc<dyn RemoteMirror>, clock: Rc<dyn Clock>) -> Self {
        StoryPlayer { store, mirror, clock }
    }

    pub fn subscribe(&self, listener: impl Fn(&StoryPlayerState) + 'static) -> Subscription {
        self.store.subscribe(listener)
    }

    pub fn state(&self) -> StoryPlayerState {
        self.store.get()
    }

    pub fn active_story_id(&self) -> Option<String> {
        self.store.with(|s| s.active_story_id.clone())
    }

    pub fn progress(&self, story_id: &str) -> Option<StoryProgress> {
        self.store.with(|s| s.progress.get(story_id).cloned())
    }

    pub fn status(&self) -> PlayerStatus {
        self.store.with(|s| {
            let Some(id) = s.active_story_id.clone() else {
                return PlayerStatus::Idle;
            };
            match s.progress.get(&id) {
                Some(p) if p.is_finished() => PlayerStatus::Finished { story_id: id },
                Some(p) => PlayerStatus::Running {
                    story_id: id,
                    point_index: p.current_point_index,
                },
                None => PlayerStatus::Idle,
            }
        })
    }

    /// Resume an unfinished record or begin a fresh one at index 0.
    pub fn start(&self, story_id: &str) {
        let resumable = self
            .progress(story_id)
            .filter(|p| !p.is_finished());
        let progress = match resumable {
            Some(existing) => existing,
            None => StoryProgress::new(story_id.to_string(), self.clock.now_ms()),
        };
        let record = progress.clone();
        self.store.update(|s| {
            s.active_story_id = Some(story_id.to_string());
            s.progress.insert(story_id.to_string(), record);
        });
        info!("started story {story_id} at point {}", progress.current_point_index);
        self.mirror.progress_saved(&progress);
    }

    /// Record `point_id` as done. Ignored without a record, on a finished
    /// record, or when the point was already completed.
    pub fn complete_point(&self, story_id: &str, point_id: &str, total_points: usize) -> bool {
        let Some(mut progress) = self.progress(story_id) else {
            return false;
        };
        if progress.is_finished() || progress.completed_point_ids.iter().any(|id| id == point_id) {
            return false;
        }
        progress.completed_point_ids.push(point_id.to_string());
        progress.current_point_index += 1;
        if progress.current_point_index >= total_points {
            progress.completed_at = Some(self.clock.now_ms());
            info!("finished story {story_id}");
        }
        let record = progress.clone();
        self.store.update(|s| {
            s.progress.insert(story_id.to_string(), record);
        });
        self.mirror.progress_saved(&progress);
        true
    }

    /// Leave the active story; its record stays resumable.
    pub fn stop(&self) {
        if self.active_story_id().is_none() {
            return;
        }
        self.store.update(|s| s.active_story_id = None);
    }

    pub fn reset_progress(&self, story_id: &str) {
        let known = self.store.with(|s| {
            s.progress.contains_key(story_id) || s.active_story_id.as_deref() == Some(story_id)
        });
        if !known {
            return;
        }
        self.store.update(|s| {
            s.progress.remove(story_id);
            if s.active_story_id.as_deref() == Some(story_id) {
                s.active_story_id = None;
            }
        });
        self.mirror.progress_deleted(story_id);
    }

    /// Distance check against the story's current point.
    pub fn check_position(&self, story: &Story, position: LonLat) -> Option<ProximityCheck> {
        let progress = self.progress(&story.id)?;
        if progress.is_finished() {
            return None;
        }
        let point = story.points.get(progress.current_point_index)?;
        Some(geo::check_point(point, position))
    }

    /// Complete the current point when it is a proximity point and
    /// `position` lies inside its trigger radius. Returns the completed id.
    pub fn advance_on_position(&self, story: &Story, position: LonLat) -> Option<String> {
        if self.active_story_id().as_deref() != Some(story.id.as_str()) {
            return None;
        }
        let check = self.check_position(story, position)?;
        let point = story.point(&check.point_id)?;
        if point.interaction != Interaction::Proximity || !check.reached {
            return None;
        }
        self.complete_point(&story.id, &check.point_id, story.points.len())
            .then_some(check.point_id)
    }

    /// Complete the current point of a QR stop when the scanned payload
    /// matches.
    pub fn complete_with_qr(&self, story: &Story, payload: &str) -> Option<String> {
        let progress = self.progress(&story.id)?;
        let point = story.points.get(progress.current_point_index)?;
        if point.interaction != Interaction::Qr || point.qr_payload.as_deref() != Some(payload) {
            return None;
        }
        let id = point.id.clone();
        self.complete_point(&story.id, &id, story.points.len())
            .then_some(id)
    }

    /// Merge progress fetched from the remote mirror; remote records win.
    pub fn load_remote(&self, remote: Vec<StoryProgress>) {
        if remote.is_empty() {
            return;
        }
        self.store.update(|s| {
            for p in remote {
                s.progress.insert(p.story_id.clone(), p);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::offset_north;
    use crate::timing::ManualClock;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingMirror {
        events: RefCell<Vec<String>>,
    }

    impl RemoteMirror for RecordingMirror {
        fn story_saved(&self, story: &Story) {
            self.events.borrow_mut().push(format!("story:{}", story.id));
        }
        fn story_deleted(&self, story_id: &str) {
            self.events.borrow_mut().push(format!("delete:{story_id}"));
        }
        fn progress_saved(&self, progress: &StoryProgress) {
            self.events
                .borrow_mut()
                .push(format!("progress:{}:{}", progress.story_id, progress.current_point_index));
        }
        fn progress_deleted(&self, story_id: &str) {
            self.events.borrow_mut().push(format!("reset:{story_id}"));
        }
    }

    fn library() -> (StoryLibraryStore, ManualClock, Rc<RecordingMirror>) {
        let clock = ManualClock::new(1_000);
        let mirror = Rc::new(RecordingMirror::default());
        let lib = StoryLibraryStore::new(
            Store::new(StoryLibrary::default()),
            mirror.clone(),
            Rc::new(clock.clone()),
            "user-1",
        );
        (lib, clock, mirror)
    }

    fn player() -> (StoryPlayer, ManualClock, Rc<RecordingMirror>) {
        let clock = ManualClock::new(5_000);
        let mirror = Rc::new(RecordingMirror::default());
        let player = StoryPlayer::new(
            Store::new(StoryPlayerState::default()),
            mirror.clone(),
            Rc::new(clock.clone()),
        );
        (player, clock, mirror)
    }

    fn orders(story: &Story) -> Vec<usize> {
        story.points.iter().map(|p| p.order).collect()
    }

    const SAIGON: LonLat = [106.70098, 10.77653];

    fn walk() -> Story {
        let mut story = Story::new("walk".into(), "Walk".into(), String::new(), String::new(), 0);
        for i in 0..3 {
            let mut p = StoryPoint::new(format!("stop{i}"), i, offset_north(SAIGON, 500.0 * i as f64));
            p.trigger_radius = 25.0;
            story.points.push(p);
        }
        story
    }

    #[test]
    fn test_create_story_defaults() {
        let (lib, _clock, mirror) = library();
        let id = lib.create_story("Old Saigon", "walk");
        let story = lib.story(&id).unwrap();
        assert_eq!(story.title, "Old Saigon");
        assert_eq!(story.author_id, "user-1");
        assert_eq!(story.created_at, 1_000);
        assert!(!story.is_public);
        assert_eq!(*mirror.events.borrow(), vec![format!("story:{id}")]);

        let untitled = lib.create_story("  ", "");
        assert_eq!(lib.story(&untitled).unwrap().title, "New Story");
    }

    #[test]
    fn test_add_points_are_dense() {
        let (lib, _clock, _) = library();
        let id = lib.create_story("S", "");
        let a = lib.add_point(&id, [1.0, 1.0]).unwrap();
        let b = lib.add_point(&id, [2.0, 2.0]).unwrap();
        let story = lib.story(&id).unwrap();
        assert_eq!(orders(&story), vec![0, 1]);
        assert_eq!(story.points[0].id, a);
        assert_eq!(story.points[1].title, "Point 2");
        assert_ne!(a, b);
    }

    #[test]
    fn test_remove_point_redensifies() {
        let (lib, clock, _) = library();
        let id = lib.create_story("S", "");
        let ids: Vec<String> = (0..4)
            .map(|i| lib.add_point(&id, [i as f64, 0.0]).unwrap())
            .collect();
        clock.advance(10);
        assert!(lib.remove_point(&id, &ids[1]));
        let story = lib.story(&id).unwrap();
        assert_eq!(orders(&story), vec![0, 1, 2]);
        assert_eq!(story.points[1].id, ids[2]);
        assert_eq!(story.updated_at, 1_010);
        assert!(!lib.remove_point(&id, "missing"));
    }

    #[test]
    fn test_reorder_points() {
        let (lib, _clock, _) = library();
        let id = lib.create_story("S", "");
        let ids: Vec<String> = (0..3)
            .map(|i| lib.add_point(&id, [i as f64, 0.0]).unwrap())
            .collect();
        assert!(lib.reorder_points(&id, 0, 2));
        let story = lib.story(&id).unwrap();
        let got: Vec<&str> = story.points.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(got, vec![ids[1].as_str(), ids[2].as_str(), ids[0].as_str()]);
        assert_eq!(orders(&story), vec![0, 1, 2]);

        assert!(!lib.reorder_points(&id, 0, 3));
        assert!(!lib.reorder_points(&id, 7, 0));
        assert_eq!(lib.story(&id).unwrap(), story);
    }

    #[test]
    fn test_update_point_validates_radius() {
        let (lib, _clock, _) = library();
        let id = lib.create_story("S", "");
        let pid = lib.add_point(&id, [1.0, 1.0]).unwrap();
        lib.update_point(
            &id,
            &pid,
            PointUpdate {
                title: Some("Cathedral".into()),
                trigger_radius: Some(-5.0),
                hint: Some(Some("look up".into())),
                ..Default::default()
            },
        );
        let p = lib.story(&id).unwrap().points[0].clone();
        assert_eq!(p.title, "Cathedral");
        assert_eq!(p.trigger_radius, 10.0);
        assert_eq!(p.hint.as_deref(), Some("look up"));
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let (lib, _clock, mirror) = library();
        assert!(!lib.update_story("nope", StoryUpdate::default()));
        assert!(lib.add_point("nope", [0.0, 0.0]).is_none());
        assert!(!lib.delete_story("nope"));
        assert!(!lib.update_point("nope", "p", PointUpdate::default()));
        assert!(mirror.events.borrow().is_empty());
    }

    #[test]
    fn test_update_and_delete_story() {
        let (lib, clock, mirror) = library();
        let id = lib.create_story("S", "");
        clock.advance(50);
        lib.update_story(
            &id,
            StoryUpdate {
                title: Some("Renamed".into()),
                mode: Some(StoryMode::Adventure),
                region: Some(Some(Region { center: SAIGON, zoom: 15.0 })),
                ..Default::default()
            },
        );
        let story = lib.story(&id).unwrap();
        assert_eq!(story.title, "Renamed");
        assert_eq!(story.mode, StoryMode::Adventure);
        assert_eq!(story.updated_at, 1_050);
        assert!(lib.delete_story(&id));
        assert!(lib.story(&id).is_none());
        assert_eq!(mirror.events.borrow().last().unwrap(), &format!("delete:{id}"));
    }

    #[test]
    fn test_load_remote_keeps_newer_local() {
        let (lib, clock, _) = library();
        let id = lib.create_story("Local", "");
        clock.advance(100);
        lib.update_story(&id, StoryUpdate { title: Some("Edited".into()), ..Default::default() });

        let mut stale = lib.story(&id).unwrap();
        stale.title = "Stale".into();
        stale.updated_at = 0;
        let fresh = Story::new("remote".into(), "Remote".into(), String::new(), String::new(), 9_999);
        lib.load_remote(vec![stale, fresh]);

        assert_eq!(lib.story(&id).unwrap().title, "Edited");
        assert!(lib.story("remote").is_some());
    }

    #[test]
    fn test_three_stop_hunt_scenario() {
        let (player, clock, _) = player();
        let story = walk();
        player.start(&story.id);
        assert_eq!(
            player.status(),
            PlayerStatus::Running { story_id: "walk".into(), point_index: 0 }
        );

        let near_stop0 = offset_north(story.points[0].coordinates, 14.0);
        let check = player.check_position(&story, near_stop0).unwrap();
        assert!(check.reached);
        assert_eq!(check.point_id, "stop0");

        assert!(player.complete_point("walk", "stop0", 3));
        let p = player.progress("walk").unwrap();
        assert_eq!(p.current_point_index, 1);
        assert_eq!(p.completed_point_ids, vec!["stop0"]);
        assert!(p.completed_at.is_none());

        clock.advance(60_000);
        player.complete_point("walk", "stop1", 3);
        player.complete_point("walk", "stop2", 3);
        let p = player.progress("walk").unwrap();
        assert_eq!(p.completed_at, Some(65_000));
        assert_eq!(player.status(), PlayerStatus::Finished { story_id: "walk".into() });
    }

    #[test]
    fn test_complete_point_is_monotonic_and_guarded() {
        let (player, _clock, mirror) = player();
        assert!(!player.complete_point("walk", "stop0", 3));
        assert!(mirror.events.borrow().is_empty());

        player.start("walk");
        assert!(player.complete_point("walk", "stop0", 2));
        assert!(!player.complete_point("walk", "stop0", 2));
        assert_eq!(player.progress("walk").unwrap().current_point_index, 1);
        assert!(player.complete_point("walk", "stop1", 2));
        assert!(!player.complete_point("walk", "stop2", 2));
        let p = player.progress("walk").unwrap();
        assert_eq!(p.current_point_index, 2);
        assert_eq!(p.completed_point_ids, vec!["stop0", "stop1"]);
    }

    #[test]
    fn test_start_resumes_unfinished_and_restarts_finished() {
        let (player, clock, _) = player();
        player.start("walk");
        player.complete_point("walk", "stop0", 2);
        player.stop();
        assert_eq!(player.status(), PlayerStatus::Idle);
        assert!(player.progress("walk").is_some());

        player.start("walk");
        assert_eq!(player.progress("walk").unwrap().current_point_index, 1);

        player.complete_point("walk", "stop1", 2);
        clock.advance(10);
        player.start("walk");
        let fresh = player.progress("walk").unwrap();
        assert_eq!(fresh.current_point_index, 0);
        assert!(fresh.completed_point_ids.is_empty());
        assert_eq!(fresh.started_at, 5_010);
    }

    #[test]
    fn test_reset_progress_clears_active_only_when_matching() {
        let (player, _clock, mirror) = player();
        player.start("a");
        player.start("b");
        player.reset_progress("a");
        assert_eq!(player.active_story_id().as_deref(), Some("b"));
        assert!(player.progress("a").is_none());
        player.reset_progress("b");
        assert_eq!(player.active_story_id(), None);
        assert_eq!(mirror.events.borrow().last().unwrap(), "reset:b");
        player.reset_progress("never");
        assert_eq!(mirror.events.borrow().last().unwrap(), "reset:b");
    }

    #[test]
    fn test_advance_on_position_only_for_proximity_points() {
        let (player, _clock, _) = player();
        let mut story = walk();
        story.points[1].interaction = Interaction::Qr;
        story.points[1].qr_payload = Some("VMA-1".into());
        player.start(&story.id);

        let far = offset_north(story.points[0].coordinates, 100.0);
        assert_eq!(player.advance_on_position(&story, far), None);
        let near = offset_north(story.points[0].coordinates, 5.0);
        assert_eq!(player.advance_on_position(&story, near).as_deref(), Some("stop0"));

        let at_qr = story.points[1].coordinates;
        assert_eq!(player.advance_on_position(&story, at_qr), None);
        assert_eq!(player.complete_with_qr(&story, "wrong"), None);
        assert_eq!(player.complete_with_qr(&story, "VMA-1").as_deref(), Some("stop1"));
    }

    #[test]
    fn test_advance_requires_active_story() {
        let (player, _clock, _) = player();
        let story = walk();
        player.start(&story.id);
        player.stop();
        assert_eq!(player.advance_on_position(&story, story.points[0].coordinates), None);
    }

    #[test]
    fn test_load_remote_progress() {
        let (player, _clock, _) = player();
        player.start("a");
        let mut remote = StoryProgress::new("a".into(), 1);
        remote.current_point_index = 2;
        player.load_remote(vec![remote]);
        assert_eq!(player.progress("a").unwrap().current_point_index, 2);
    }
}
