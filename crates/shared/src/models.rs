use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Milliseconds since the Unix epoch.
pub type Millis = u64;

/// `[longitude, latitude]` in EPSG:4326 degrees.
pub type LonLat = [f64; 2];

pub const DEFAULT_BASEMAP: &str = "g-streets";
pub const DEFAULT_TRIGGER_RADIUS: f64 = 10.0;

pub const SIDE_RATIO_MIN: f64 = 0.01;
pub const SIDE_RATIO_MAX: f64 = 0.99;
pub const LENS_RADIUS_MIN: f64 = 20.0;

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

/// Map camera in degree form. The renderer converts to its own projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CameraState {
    pub longitude: f64,
    pub latitude: f64,
    pub zoom: f64,
    /// Radians, clockwise from north.
    pub rotation: f64,
    pub active_overlay_id: Option<String>,
}

impl Default for CameraState {
    fn default() -> Self {
        // Saigon
        CameraState {
            longitude: 106.70098,
            latitude: 10.77653,
            zoom: 14.0,
            rotation: 0.0,
            active_overlay_id: None,
        }
    }
}

// ---------------------------------------------------------------------------
// View mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ViewMode {
    #[default]
    #[serde(rename = "overlay")]
    Overlay,
    #[serde(rename = "side-x")]
    SideX,
    #[serde(rename = "side-y")]
    SideY,
    #[serde(rename = "spy")]
    Spy,
}

impl ViewMode {
    pub const ALL: [ViewMode; 4] = [
        ViewMode::Overlay,
        ViewMode::SideX,
        ViewMode::SideY,
        ViewMode::Spy,
    ];

    /// Parse a mode key, falling back to `Overlay` for anything unknown.
    pub fn normalize(value: &str) -> Self {
        match value {
            "side-x" => ViewMode::SideX,
            "side-y" => ViewMode::SideY,
            "spy" => ViewMode::Spy,
            _ => ViewMode::Overlay,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            ViewMode::Overlay => "overlay",
            ViewMode::SideX => "side-x",
            ViewMode::SideY => "side-y",
            ViewMode::Spy => "spy",
        }
    }
}

impl std::fmt::Display for ViewMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewMode::Overlay => write!(f, "Overlay"),
            ViewMode::SideX => write!(f, "Side by side (X)"),
            ViewMode::SideY => write!(f, "Side by side (Y)"),
            ViewMode::Spy => write!(f, "Spyglass"),
        }
    }
}

impl<'de> Deserialize<'de> for ViewMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ViewMode::normalize(&raw))
    }
}

/// Comparison mode and its parameters. Field names follow the persisted
/// layer-preferences record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewModeState {
    #[serde(rename = "viewMode")]
    pub mode: ViewMode,
    #[serde(rename = "sideRatio")]
    pub side_ratio: f64,
    #[serde(rename = "lensRadius")]
    pub lens_radius: f64,
    #[serde(rename = "overlayOpacity")]
    pub opacity: f64,
}

impl Default for ViewModeState {
    fn default() -> Self {
        ViewModeState {
            mode: ViewMode::Overlay,
            side_ratio: 0.5,
            lens_radius: 150.0,
            opacity: 0.8,
        }
    }
}

/// Persisted view/layer preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayerPreferences {
    pub basemap: String,
    pub overlay_visible: bool,
    #[serde(flatten)]
    pub view: ViewModeState,
}

impl Default for LayerPreferences {
    fn default() -> Self {
        LayerPreferences {
            basemap: DEFAULT_BASEMAP.to_string(),
            overlay_visible: true,
            view: ViewModeState::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Stories and hunts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interaction {
    #[default]
    #[serde(alias = "PROXIMITY")]
    Proximity,
    #[serde(alias = "QR")]
    Qr,
    #[serde(alias = "CAMERA")]
    Camera,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeKind {
    #[default]
    #[serde(alias = "NONE")]
    None,
    #[serde(alias = "QUESTION")]
    Question,
    #[serde(alias = "REACH")]
    Reach,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryMode {
    #[default]
    #[serde(alias = "GUIDED")]
    Guided,
    #[serde(alias = "ADVENTURE")]
    Adventure,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointChallenge {
    #[serde(rename = "type", default)]
    pub kind: ChallengeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_radius: Option<f64>,
}

impl PointChallenge {
    pub fn reach(radius: f64) -> Self {
        PointChallenge {
            kind: ChallengeKind::Reach,
            trigger_radius: Some(radius),
            ..Default::default()
        }
    }
}

/// Camera a point flies to when it becomes active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCamera {
    pub center: LonLat,
    pub zoom: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub center: LonLat,
    pub zoom: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryPoint {
    pub id: String,
    pub order: usize,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quest: Option<String>,
    pub coordinates: LonLat,
    #[serde(default = "default_trigger_radius")]
    pub trigger_radius: f64,
    #[serde(default)]
    pub interaction: Interaction,
    #[serde(default)]
    pub challenge: PointChallenge,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay_map_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<PointCamera>,
}

fn default_trigger_radius() -> f64 {
    DEFAULT_TRIGGER_RADIUS
}

impl StoryPoint {
    /// A fresh proximity point as created by "add point".
    pub fn new(id: String, order: usize, coordinates: LonLat) -> Self {
        StoryPoint {
            id,
            order,
            title: format!("Point {}", order + 1),
            description: String::new(),
            hint: None,
            quest: None,
            coordinates,
            trigger_radius: DEFAULT_TRIGGER_RADIUS,
            interaction: Interaction::Proximity,
            challenge: PointChallenge::reach(DEFAULT_TRIGGER_RADIUS),
            qr_payload: None,
            overlay_map_id: None,
            camera: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoryWire")]
pub struct Story {
    pub id: String,
    pub title: String,
    pub description: String,
    pub mode: StoryMode,
    pub points: Vec<StoryPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
    pub created_at: Millis,
    pub updated_at: Millis,
    pub is_public: bool,
    pub author_id: String,
}

impl Story {
    pub fn new(id: String, title: String, description: String, author_id: String, now: Millis) -> Self {
        Story {
            id,
            title,
            description,
            mode: StoryMode::Guided,
            points: Vec::new(),
            region: None,
            created_at: now,
            updated_at: now,
            is_public: false,
            author_id,
        }
    }

    pub fn point(&self, id: &str) -> Option<&StoryPoint> {
        self.points.iter().find(|p| p.id == id)
    }

    /// Rewrite every point's `order` to its array position.
    pub fn densify_order(&mut self) {
        for (i, p) in self.points.iter_mut().enumerate() {
            p.order = i;
        }
    }
}

/// Wire form accepted when reading: tolerates the hunt-era `stops` key.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoryWire {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    mode: StoryMode,
    #[serde(default)]
    points: Option<Vec<StoryPoint>>,
    #[serde(default)]
    stops: Option<Vec<StoryPoint>>,
    #[serde(default)]
    region: Option<Region>,
    #[serde(default)]
    created_at: Millis,
    #[serde(default)]
    updated_at: Millis,
    #[serde(default)]
    is_public: bool,
    #[serde(default)]
    author_id: String,
}

impl From<StoryWire> for Story {
    fn from(w: StoryWire) -> Self {
        let mut points = w.points.or(w.stops).unwrap_or_default();
        points.sort_by_key(|p| p.order);
        let mut story = Story {
            id: w.id,
            title: w.title,
            description: w.description,
            mode: w.mode,
            points,
            region: w.region,
            created_at: w.created_at,
            updated_at: w.updated_at,
            is_public: w.is_public,
            author_id: w.author_id,
        };
        story.densify_order();
        story
    }
}

/// Persisted story library.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "StoryLibraryWire")]
pub struct StoryLibrary {
    pub stories: Vec<Story>,
}

#[derive(Deserialize)]
struct StoryLibraryWire {
    #[serde(default)]
    stories: Option<Vec<Story>>,
    #[serde(default)]
    hunts: Option<Vec<Story>>,
}

impl From<StoryLibraryWire> for StoryLibrary {
    fn from(w: StoryLibraryWire) -> Self {
        StoryLibrary {
            // An empty `stories` can come from merging over the default, so
            // a legacy `hunts` list still wins over it.
            stories: match (w.stories, w.hunts) {
                (Some(stories), _) if !stories.is_empty() => stories,
                (stories, hunts) => hunts.or(stories).unwrap_or_default(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoryProgressWire")]
pub struct StoryProgress {
    pub story_id: String,
    pub current_point_index: usize,
    #[serde(rename = "completedPoints")]
    pub completed_point_ids: Vec<String>,
    pub started_at: Millis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Millis>,
}

impl StoryProgress {
    pub fn new(story_id: String, now: Millis) -> Self {
        StoryProgress {
            story_id,
            current_point_index: 0,
            completed_point_ids: Vec::new(),
            started_at: now,
            completed_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoryProgressWire {
    story_id: Option<String>,
    hunt_id: Option<String>,
    current_point_index: Option<usize>,
    current_stop_index: Option<usize>,
    completed_points: Option<Vec<String>>,
    completed_stops: Option<Vec<String>>,
    #[serde(default)]
    started_at: Millis,
    #[serde(default)]
    completed_at: Option<Millis>,
}

impl From<StoryProgressWire> for StoryProgress {
    fn from(w: StoryProgressWire) -> Self {
        let mut completed: Vec<String> = Vec::new();
        for id in w.completed_points.or(w.completed_stops).unwrap_or_default() {
            if !completed.contains(&id) {
                completed.push(id);
            }
        }
        StoryProgress {
            story_id: w.story_id.or(w.hunt_id).unwrap_or_default(),
            current_point_index: w.current_point_index.or(w.current_stop_index).unwrap_or(0),
            completed_point_ids: completed,
            started_at: w.started_at,
            completed_at: w.completed_at,
        }
    }
}

/// Persisted player record: which story is active plus every progress record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoryPlayerState {
    pub active_story_id: Option<String>,
    pub progress: BTreeMap<String, StoryProgress>,
}

// ---------------------------------------------------------------------------
// Scenes
// ---------------------------------------------------------------------------

pub const STORY_DELAY_MIN: f64 = 1.0;
pub const STORY_DELAY_MAX: f64 = 60.0;
pub const STORY_DEFAULT_DELAY: f64 = 5.0;

/// One presentation step of a viewer story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoryScene {
    pub id: String,
    pub title: String,
    pub details: String,
    /// Seconds before autoplay advances.
    pub delay: f64,
    pub center: LonLat,
    pub zoom: f64,
    pub rotation: f64,
    pub basemap: String,
    pub overlay_id: Option<String>,
    pub opacity: f64,
    pub view_mode: ViewMode,
    pub side_ratio: f64,
    pub lens_radius: f64,
    pub visible_annotations: Vec<String>,
    pub hidden: bool,
}

impl Default for StoryScene {
    fn default() -> Self {
        let camera = CameraState::default();
        let view = ViewModeState::default();
        StoryScene {
            id: String::new(),
            title: String::new(),
            details: String::new(),
            delay: STORY_DEFAULT_DELAY,
            center: [camera.longitude, camera.latitude],
            zoom: camera.zoom,
            rotation: camera.rotation,
            basemap: DEFAULT_BASEMAP.to_string(),
            overlay_id: None,
            opacity: view.opacity,
            view_mode: view.mode,
            side_ratio: view.side_ratio,
            lens_radius: view.lens_radius,
            visible_annotations: Vec::new(),
            hidden: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Historical map catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapEntry {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// `[minLon, minLat, maxLon, maxLat]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<[f64; 4]>,
}

/// A saved annotation layer. `features` is a GeoJSON FeatureCollection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationSet {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_id: Option<String>,
    #[serde(default)]
    pub owner_id: String,
    pub features: serde_json::Value,
    #[serde(default)]
    pub created_at: Millis,
    #[serde(default)]
    pub updated_at: Millis,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_mode_normalizes_unknown() {
        assert_eq!(ViewMode::normalize("spy"), ViewMode::Spy);
        assert_eq!(ViewMode::normalize("side-y"), ViewMode::SideY);
        assert_eq!(ViewMode::normalize("bogus"), ViewMode::Overlay);
        let m: ViewMode = serde_json::from_str(r#""sideways""#).unwrap();
        assert_eq!(m, ViewMode::Overlay);
    }

    #[test]
    fn test_layer_preferences_schema() {
        let prefs = LayerPreferences::default();
        let json = serde_json::to_value(&prefs).unwrap();
        assert_eq!(json["basemap"], "g-streets");
        assert_eq!(json["overlayVisible"], true);
        assert_eq!(json["viewMode"], "overlay");
        assert_eq!(json["sideRatio"], 0.5);
        assert_eq!(json["lensRadius"], 150.0);
        assert_eq!(json["overlayOpacity"], 0.8);
    }

    #[test]
    fn test_layer_preferences_partial_record_fills_defaults() {
        let prefs: LayerPreferences =
            serde_json::from_str(r#"{"basemap":"g-satellite","viewMode":"spy"}"#).unwrap();
        assert_eq!(prefs.basemap, "g-satellite");
        assert_eq!(prefs.view.mode, ViewMode::Spy);
        assert!(prefs.overlay_visible);
        assert_eq!(prefs.view.lens_radius, 150.0);
    }

    #[test]
    fn test_story_reads_legacy_stops_and_densifies() {
        let json = r#"{
            "id": "hunt-1", "title": "Old hunt",
            "stops": [
                {"id": "b", "order": 5, "title": "B", "coordinates": [106.7, 10.7]},
                {"id": "a", "order": 2, "title": "A", "coordinates": [106.7, 10.8]}
            ],
            "createdAt": 1, "updatedAt": 2
        }"#;
        let story: Story = serde_json::from_str(json).unwrap();
        assert_eq!(story.points.len(), 2);
        assert_eq!(story.points[0].id, "a");
        assert_eq!(story.points[0].order, 0);
        assert_eq!(story.points[1].order, 1);
        assert_eq!(story.points[0].trigger_radius, DEFAULT_TRIGGER_RADIUS);
        assert_eq!(story.points[0].interaction, Interaction::Proximity);
    }

    #[test]
    fn test_story_serializes_canonical_names_only() {
        let story = Story::new("s".into(), "T".into(), String::new(), "u".into(), 10);
        let json = serde_json::to_value(&story).unwrap();
        assert!(json.get("points").is_some());
        assert!(json.get("stops").is_none());
        assert_eq!(json["authorId"], "u");
        assert_eq!(json["mode"], "guided");
    }

    #[test]
    fn test_library_reads_legacy_hunts_key() {
        let lib: StoryLibrary =
            serde_json::from_str(r#"{"hunts":[{"id":"h","title":"H","stops":[]}]}"#).unwrap();
        assert_eq!(lib.stories.len(), 1);
        let json = serde_json::to_value(&lib).unwrap();
        assert!(json.get("hunts").is_none());
    }

    #[test]
    fn test_library_with_both_keys_prefers_stories() {
        let lib: StoryLibrary = serde_json::from_str(
            r#"{"stories":[{"id":"new"}],"hunts":[{"id":"old"}]}"#,
        )
        .unwrap();
        assert_eq!(lib.stories[0].id, "new");
    }

    #[test]
    fn test_progress_reads_hunt_era_fields() {
        let json = r#"{"huntId":"h","currentStopIndex":2,"completedStops":["a","b","a"],"startedAt":5}"#;
        let p: StoryProgress = serde_json::from_str(json).unwrap();
        assert_eq!(p.story_id, "h");
        assert_eq!(p.current_point_index, 2);
        assert_eq!(p.completed_point_ids, vec!["a", "b"]);
        assert!(!p.is_finished());
    }

    #[test]
    fn test_new_point_defaults() {
        let p = StoryPoint::new("p".into(), 2, [1.0, 2.0]);
        assert_eq!(p.title, "Point 3");
        assert_eq!(p.challenge.kind, ChallengeKind::Reach);
        assert_eq!(p.challenge.trigger_radius, Some(DEFAULT_TRIGGER_RADIUS));
    }

    #[test]
    fn test_map_entry_deserializes() {
        let json = r#"{"id":"b8a452dfbc8eeee2","name":"Saigon 1882","type":"city","isFeatured":true,"year":1882,"bounds":[106.6,10.7,106.8,10.9]}"#;
        let m: MapEntry = serde_json::from_str(json).unwrap();
        assert_eq!(m.kind, "city");
        assert!(m.is_featured);
        assert_eq!(m.year, Some(1882));
    }
}
