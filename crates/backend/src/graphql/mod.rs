use std::sync::Arc;

use async_graphql::{Context, Enum, InputObject, Json, Object, SimpleObject, ID};
use vma_shared::contribute::{
    GeorefStatus, GeorefSubmission, LabelPin, LabelTask, LabelTaskStatus, PixelRegion,
};
use vma_shared::models::{
    self, ChallengeKind, Interaction, LonLat, Millis, StoryMode, DEFAULT_TRIGGER_RADIUS,
};

use crate::assets::Assets;
use crate::storage::Storage;

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
pub enum GqlInteraction {
    Proximity,
    Qr,
    Camera,
}

impl From<Interaction> for GqlInteraction {
    fn from(i: Interaction) -> Self {
        match i {
            Interaction::Proximity => GqlInteraction::Proximity,
            Interaction::Qr => GqlInteraction::Qr,
            Interaction::Camera => GqlInteraction::Camera,
        }
    }
}

impl From<GqlInteraction> for Interaction {
    fn from(i: GqlInteraction) -> Self {
        match i {
            GqlInteraction::Proximity => Interaction::Proximity,
            GqlInteraction::Qr => Interaction::Qr,
            GqlInteraction::Camera => Interaction::Camera,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
pub enum GqlChallengeKind {
    None,
    Question,
    Reach,
}

impl From<ChallengeKind> for GqlChallengeKind {
    fn from(k: ChallengeKind) -> Self {
        match k {
            ChallengeKind::None => GqlChallengeKind::None,
            ChallengeKind::Question => GqlChallengeKind::Question,
            ChallengeKind::Reach => GqlChallengeKind::Reach,
        }
    }
}

impl From<GqlChallengeKind> for ChallengeKind {
    fn from(k: GqlChallengeKind) -> Self {
        match k {
            GqlChallengeKind::None => ChallengeKind::None,
            GqlChallengeKind::Question => ChallengeKind::Question,
            GqlChallengeKind::Reach => ChallengeKind::Reach,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
pub enum GqlStoryMode {
    Guided,
    Adventure,
}

impl From<StoryMode> for GqlStoryMode {
    fn from(m: StoryMode) -> Self {
        match m {
            StoryMode::Guided => GqlStoryMode::Guided,
            StoryMode::Adventure => GqlStoryMode::Adventure,
        }
    }
}

impl From<GqlStoryMode> for StoryMode {
    fn from(m: GqlStoryMode) -> Self {
        match m {
            GqlStoryMode::Guided => StoryMode::Guided,
            GqlStoryMode::Adventure => StoryMode::Adventure,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
pub enum GqlGeorefStatus {
    Open,
    InProgress,
    ReviewNeeded,
    Approved,
    Rejected,
}

impl From<GeorefStatus> for GqlGeorefStatus {
    fn from(s: GeorefStatus) -> Self {
        match s {
            GeorefStatus::Open => GqlGeorefStatus::Open,
            GeorefStatus::InProgress => GqlGeorefStatus::InProgress,
            GeorefStatus::ReviewNeeded => GqlGeorefStatus::ReviewNeeded,
            GeorefStatus::Approved => GqlGeorefStatus::Approved,
            GeorefStatus::Rejected => GqlGeorefStatus::Rejected,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
pub enum GqlLabelTaskStatus {
    Open,
    InProgress,
    Consensus,
    Verified,
}

impl From<LabelTaskStatus> for GqlLabelTaskStatus {
    fn from(s: LabelTaskStatus) -> Self {
        match s {
            LabelTaskStatus::Open => GqlLabelTaskStatus::Open,
            LabelTaskStatus::InProgress => GqlLabelTaskStatus::InProgress,
            LabelTaskStatus::Consensus => GqlLabelTaskStatus::Consensus,
            LabelTaskStatus::Verified => GqlLabelTaskStatus::Verified,
        }
    }
}

impl From<GqlLabelTaskStatus> for LabelTaskStatus {
    fn from(s: GqlLabelTaskStatus) -> Self {
        match s {
            GqlLabelTaskStatus::Open => LabelTaskStatus::Open,
            GqlLabelTaskStatus::InProgress => LabelTaskStatus::InProgress,
            GqlLabelTaskStatus::Consensus => LabelTaskStatus::Consensus,
            GqlLabelTaskStatus::Verified => LabelTaskStatus::Verified,
        }
    }
}

// GraphQL output types

#[derive(SimpleObject)]
pub struct GqlMapEntry {
    pub id: ID,
    pub name: String,
    pub kind: String,
    pub summary: Option<String>,
    pub thumbnail: Option<String>,
    pub is_featured: bool,
    pub year: Option<i32>,
    /// `[minLon, minLat, maxLon, maxLat]`
    pub bounds: Option<Vec<f64>>,
}

impl From<&models::MapEntry> for GqlMapEntry {
    fn from(m: &models::MapEntry) -> Self {
        GqlMapEntry {
            id: ID(m.id.clone()),
            name: m.name.clone(),
            kind: m.kind.clone(),
            summary: m.summary.clone(),
            thumbnail: m.thumbnail.clone(),
            is_featured: m.is_featured,
            year: m.year,
            bounds: m.bounds.map(|b| b.to_vec()),
        }
    }
}

#[derive(SimpleObject)]
pub struct GqlChallenge {
    pub kind: GqlChallengeKind,
    pub question: Option<String>,
    pub answer: Option<String>,
    pub trigger_radius: Option<f64>,
}

#[derive(SimpleObject)]
pub struct GqlPointCamera {
    pub center: Vec<f64>,
    pub zoom: f64,
    pub rotation: Option<f64>,
}

#[derive(SimpleObject)]
pub struct GqlRegion {
    pub center: Vec<f64>,
    pub zoom: f64,
}

#[derive(SimpleObject)]
pub struct GqlStoryPoint {
    pub id: ID,
    pub order: u32,
    pub title: String,
    pub description: String,
    pub hint: Option<String>,
    pub quest: Option<String>,
    pub coordinates: Vec<f64>,
    pub trigger_radius: f64,
    pub interaction: GqlInteraction,
    pub challenge: GqlChallenge,
    pub qr_payload: Option<String>,
    pub overlay_map_id: Option<String>,
    pub camera: Option<GqlPointCamera>,
}

impl From<models::StoryPoint> for GqlStoryPoint {
    fn from(p: models::StoryPoint) -> Self {
        GqlStoryPoint {
            id: ID(p.id),
            order: p.order as u32,
            title: p.title,
            description: p.description,
            hint: p.hint,
            quest: p.quest,
            coordinates: p.coordinates.to_vec(),
            trigger_radius: p.trigger_radius,
            interaction: p.interaction.into(),
            challenge: GqlChallenge {
                kind: p.challenge.kind.into(),
                question: p.challenge.question,
                answer: p.challenge.answer,
                trigger_radius: p.challenge.trigger_radius,
            },
            qr_payload: p.qr_payload,
            overlay_map_id: p.overlay_map_id,
            camera: p.camera.map(|c| GqlPointCamera {
                center: c.center.to_vec(),
                zoom: c.zoom,
                rotation: c.rotation,
            }),
        }
    }
}

#[derive(SimpleObject)]
pub struct GqlStory {
    pub id: ID,
    pub title: String,
    pub description: String,
    pub mode: GqlStoryMode,
    pub points: Vec<GqlStoryPoint>,
    pub region: Option<GqlRegion>,
    pub created_at: u64,
    pub updated_at: u64,
    pub is_public: bool,
    pub author_id: String,
}

impl From<models::Story> for GqlStory {
    fn from(s: models::Story) -> Self {
        GqlStory {
            id: ID(s.id),
            title: s.title,
            description: s.description,
            mode: s.mode.into(),
            points: s.points.into_iter().map(GqlStoryPoint::from).collect(),
            region: s.region.map(|r| GqlRegion {
                center: r.center.to_vec(),
                zoom: r.zoom,
            }),
            created_at: s.created_at,
            updated_at: s.updated_at,
            is_public: s.is_public,
            author_id: s.author_id,
        }
    }
}

#[derive(SimpleObject)]
pub struct GqlProgress {
    pub story_id: ID,
    pub current_point_index: u32,
    pub completed_point_ids: Vec<String>,
    pub started_at: u64,
    pub completed_at: Option<u64>,
}

impl From<models::StoryProgress> for GqlProgress {
    fn from(p: models::StoryProgress) -> Self {
        GqlProgress {
            story_id: ID(p.story_id),
            current_point_index: p.current_point_index as u32,
            completed_point_ids: p.completed_point_ids,
            started_at: p.started_at,
            completed_at: p.completed_at,
        }
    }
}

#[derive(SimpleObject)]
pub struct GqlAnnotationSet {
    pub id: ID,
    pub title: String,
    pub map_id: Option<String>,
    pub owner_id: String,
    pub features: Json<serde_json::Value>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl From<models::AnnotationSet> for GqlAnnotationSet {
    fn from(a: models::AnnotationSet) -> Self {
        GqlAnnotationSet {
            id: ID(a.id),
            title: a.title,
            map_id: a.map_id,
            owner_id: a.owner_id,
            features: Json(a.features),
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

#[derive(SimpleObject)]
pub struct GqlGeorefSubmission {
    pub id: ID,
    pub source_url: String,
    pub name: String,
    pub description: Option<String>,
    pub status: GqlGeorefStatus,
    pub submitted_by: Option<String>,
    pub allmaps_id: Option<String>,
    pub admin_notes: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl From<GeorefSubmission> for GqlGeorefSubmission {
    fn from(g: GeorefSubmission) -> Self {
        GqlGeorefSubmission {
            id: ID(g.id),
            source_url: g.source_url,
            name: g.name,
            description: g.description,
            status: g.status.into(),
            submitted_by: g.submitted_by,
            allmaps_id: g.allmaps_id,
            admin_notes: g.admin_notes,
            created_at: g.created_at,
            updated_at: g.updated_at,
        }
    }
}

#[derive(SimpleObject)]
pub struct GqlPixelRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(SimpleObject)]
pub struct GqlLabelTask {
    pub id: ID,
    pub map_id: String,
    pub allmaps_id: String,
    pub region: GqlPixelRegion,
    pub status: GqlLabelTaskStatus,
    pub legend: Vec<String>,
    pub created_at: u64,
}

impl From<LabelTask> for GqlLabelTask {
    fn from(t: LabelTask) -> Self {
        GqlLabelTask {
            id: ID(t.id),
            map_id: t.map_id,
            allmaps_id: t.allmaps_id,
            region: GqlPixelRegion {
                x: t.region.x,
                y: t.region.y,
                width: t.region.width,
                height: t.region.height,
            },
            status: t.status.into(),
            legend: t.legend,
            created_at: t.created_at,
        }
    }
}

#[derive(SimpleObject)]
pub struct GqlLabelPin {
    pub id: ID,
    pub task_id: String,
    pub user_id: String,
    pub label: String,
    pub pixel_x: f64,
    pub pixel_y: f64,
    pub confidence: f64,
    pub data: Option<Json<serde_json::Value>>,
    pub created_at: u64,
}

impl From<LabelPin> for GqlLabelPin {
    fn from(p: LabelPin) -> Self {
        GqlLabelPin {
            id: ID(p.id),
            task_id: p.task_id,
            user_id: p.user_id,
            label: p.label,
            pixel_x: p.pixel_x,
            pixel_y: p.pixel_y,
            confidence: p.confidence,
            data: (!p.data.is_null()).then_some(Json(p.data)),
            created_at: p.created_at,
        }
    }
}

// Input types

#[derive(InputObject)]
pub struct ChallengeInput {
    pub kind: GqlChallengeKind,
    pub question: Option<String>,
    pub answer: Option<String>,
    pub trigger_radius: Option<f64>,
}

#[derive(InputObject)]
pub struct PointCameraInput {
    pub center: Vec<f64>,
    pub zoom: f64,
    pub rotation: Option<f64>,
}

#[derive(InputObject)]
pub struct RegionInput {
    pub center: Vec<f64>,
    pub zoom: f64,
}

#[derive(InputObject)]
pub struct StoryPointInput {
    pub id: ID,
    pub title: String,
    pub description: Option<String>,
    pub hint: Option<String>,
    pub quest: Option<String>,
    pub coordinates: Vec<f64>,
    pub trigger_radius: Option<f64>,
    pub interaction: Option<GqlInteraction>,
    pub challenge: Option<ChallengeInput>,
    pub qr_payload: Option<String>,
    pub overlay_map_id: Option<String>,
    pub camera: Option<PointCameraInput>,
}

#[derive(InputObject)]
pub struct SaveStoryInput {
    /// Client-generated; an existing id replaces that story.
    pub id: ID,
    pub title: String,
    pub description: Option<String>,
    pub mode: Option<GqlStoryMode>,
    pub points: Vec<StoryPointInput>,
    pub region: Option<RegionInput>,
    pub is_public: Option<bool>,
    pub author_id: String,
    pub created_at: Option<u64>,
    pub updated_at: Option<u64>,
}

#[derive(InputObject)]
pub struct ProgressInput {
    pub story_id: ID,
    pub current_point_index: u32,
    pub completed_point_ids: Vec<String>,
    pub started_at: u64,
    pub completed_at: Option<u64>,
}

#[derive(InputObject)]
pub struct SaveAnnotationSetInput {
    /// Omit to create a new set.
    pub id: Option<ID>,
    pub title: String,
    pub map_id: Option<String>,
    pub owner_id: String,
    pub features: Json<serde_json::Value>,
}

#[derive(InputObject)]
pub struct GeorefSubmissionInput {
    /// IIIF image or manifest URL of the scan.
    pub source_url: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(InputObject)]
pub struct PixelRegionInput {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(InputObject)]
pub struct LabelTaskInput {
    pub id: Option<ID>,
    pub map_id: String,
    pub allmaps_id: Option<String>,
    pub region: PixelRegionInput,
    pub legend: Option<Vec<String>>,
}

#[derive(InputObject)]
pub struct LabelPinInput {
    pub task_id: ID,
    pub user_id: String,
    pub label: String,
    pub pixel_x: f64,
    pub pixel_y: f64,
    pub confidence: Option<f64>,
    pub data: Option<Json<serde_json::Value>>,
}

fn now_millis() -> Millis {
    chrono::Utc::now().timestamp_millis().max(0) as Millis
}

fn lon_lat(field: &str, values: &[f64]) -> async_graphql::Result<LonLat> {
    match values {
        [lon, lat] if lon.is_finite() && lat.is_finite() => Ok([*lon, *lat]),
        _ => Err(async_graphql::Error::new(format!(
            "{field} must be two finite numbers [lon, lat]"
        ))),
    }
}

fn story_point(order: usize, input: StoryPointInput) -> async_graphql::Result<models::StoryPoint> {
    let coordinates = lon_lat("coordinates", &input.coordinates)?;
    let trigger_radius = input.trigger_radius.unwrap_or(DEFAULT_TRIGGER_RADIUS);
    if !(trigger_radius.is_finite() && trigger_radius > 0.0) {
        return Err(async_graphql::Error::new("triggerRadius must be positive"));
    }
    let camera = match input.camera {
        Some(c) => Some(models::PointCamera {
            center: lon_lat("camera.center", &c.center)?,
            zoom: c.zoom,
            rotation: c.rotation,
        }),
        None => None,
    };

    let mut point = models::StoryPoint::new(input.id.0, order, coordinates);
    point.title = input.title;
    point.description = input.description.unwrap_or_default();
    point.hint = input.hint;
    point.quest = input.quest;
    point.trigger_radius = trigger_radius;
    point.interaction = input.interaction.map(Interaction::from).unwrap_or_default();
    point.challenge = match input.challenge {
        Some(c) => models::PointChallenge {
            kind: c.kind.into(),
            question: c.question,
            answer: c.answer,
            trigger_radius: c.trigger_radius,
        },
        None => models::PointChallenge::reach(trigger_radius),
    };
    point.qr_payload = input.qr_payload;
    point.overlay_map_id = input.overlay_map_id;
    point.camera = camera;
    Ok(point)
}

fn is_feature_collection(value: &serde_json::Value) -> bool {
    value.get("type").and_then(|t| t.as_str()) == Some("FeatureCollection")
        && value.get("features").is_some_and(|f| f.is_array())
}

// Query root

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn maps(&self, ctx: &Context<'_>, featured_only: Option<bool>) -> async_graphql::Result<Vec<GqlMapEntry>> {
        let assets = ctx.data::<Arc<Assets>>()?;
        Ok(assets
            .maps
            .iter()
            .filter(|m| !featured_only.unwrap_or(false) || m.is_featured)
            .map(GqlMapEntry::from)
            .collect())
    }

    async fn stories(
        &self,
        ctx: &Context<'_>,
        author_id: Option<String>,
        public_only: Option<bool>,
    ) -> async_graphql::Result<Vec<GqlStory>> {
        let storage = ctx.data::<Arc<Storage>>()?;
        let stories = storage.list_stories().map_err(async_graphql::Error::new)?;
        Ok(stories
            .into_iter()
            .filter(|s| author_id.as_ref().map_or(true, |a| &s.author_id == a))
            .filter(|s| !public_only.unwrap_or(false) || s.is_public)
            .map(GqlStory::from)
            .collect())
    }

    async fn story(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<Option<GqlStory>> {
        let storage = ctx.data::<Arc<Storage>>()?;
        let story = storage.get_story(&id).map_err(async_graphql::Error::new)?;
        Ok(story.map(GqlStory::from))
    }

    async fn progress(&self, ctx: &Context<'_>, user_id: String) -> async_graphql::Result<Vec<GqlProgress>> {
        let storage = ctx.data::<Arc<Storage>>()?;
        let records = storage
            .list_progress(&user_id)
            .map_err(async_graphql::Error::new)?;
        Ok(records.into_iter().map(GqlProgress::from).collect())
    }

    async fn annotation_set(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<Option<GqlAnnotationSet>> {
        let storage = ctx.data::<Arc<Storage>>()?;
        let set = storage
            .get_annotation_set(&id)
            .map_err(async_graphql::Error::new)?;
        Ok(set.map(GqlAnnotationSet::from))
    }

    async fn favorites(&self, ctx: &Context<'_>, user_id: String) -> async_graphql::Result<Vec<String>> {
        let storage = ctx.data::<Arc<Storage>>()?;
        storage
            .list_favorites(&user_id)
            .map_err(async_graphql::Error::new)
    }

    /// Newest first.
    async fn georef_submissions(
        &self,
        ctx: &Context<'_>,
        open_only: Option<bool>,
    ) -> async_graphql::Result<Vec<GqlGeorefSubmission>> {
        let storage = ctx.data::<Arc<Storage>>()?;
        let submissions = storage
            .list_georefs(open_only.unwrap_or(true))
            .map_err(async_graphql::Error::new)?;
        Ok(submissions.into_iter().map(GqlGeorefSubmission::from).collect())
    }

    /// Oldest first.
    async fn label_tasks(
        &self,
        ctx: &Context<'_>,
        open_only: Option<bool>,
    ) -> async_graphql::Result<Vec<GqlLabelTask>> {
        let storage = ctx.data::<Arc<Storage>>()?;
        let tasks = storage
            .list_label_tasks(open_only.unwrap_or(true))
            .map_err(async_graphql::Error::new)?;
        Ok(tasks.into_iter().map(GqlLabelTask::from).collect())
    }

    async fn label_pins(&self, ctx: &Context<'_>, task_id: ID) -> async_graphql::Result<Vec<GqlLabelPin>> {
        let storage = ctx.data::<Arc<Storage>>()?;
        let pins = storage
            .list_label_pins(&task_id)
            .map_err(async_graphql::Error::new)?;
        Ok(pins.into_iter().map(GqlLabelPin::from).collect())
    }
}

// Mutation root

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn save_story(&self, ctx: &Context<'_>, input: SaveStoryInput) -> async_graphql::Result<GqlStory> {
        let storage = ctx.data::<Arc<Storage>>()?;
        let now = now_millis();
        let existing = storage.get_story(&input.id).map_err(async_graphql::Error::new)?;

        let region = match input.region {
            Some(r) => Some(models::Region {
                center: lon_lat("region.center", &r.center)?,
                zoom: r.zoom,
            }),
            None => None,
        };
        let points = input
            .points
            .into_iter()
            .enumerate()
            .map(|(order, p)| story_point(order, p))
            .collect::<async_graphql::Result<Vec<_>>>()?;

        // Client timestamps win; a story never appears to be edited before it was created.
        let updated_at = input.updated_at.unwrap_or(now);
        let created_at = existing
            .as_ref()
            .map(|s| s.created_at)
            .or(input.created_at)
            .unwrap_or_else(|| updated_at.min(now));
        let title = if input.title.trim().is_empty() {
            "New Story".to_string()
        } else {
            input.title
        };

        let mut story = models::Story::new(
            input.id.0,
            title,
            input.description.unwrap_or_default(),
            input.author_id,
            created_at,
        );
        story.mode = input.mode.map(StoryMode::from).unwrap_or_default();
        story.points = points;
        story.region = region;
        story.is_public = input.is_public.unwrap_or(false);
        story.updated_at = updated_at.max(created_at);
        story.densify_order();

        storage.save_story(&story).map_err(async_graphql::Error::new)?;
        tracing::debug!(story = %story.id, points = story.points.len(), "Saved story");

        Ok(GqlStory::from(story))
    }

    async fn delete_story(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        let storage = ctx.data::<Arc<Storage>>()?;
        storage.delete_story(&id).map_err(async_graphql::Error::new)
    }

    async fn save_progress(
        &self,
        ctx: &Context<'_>,
        user_id: String,
        input: ProgressInput,
    ) -> async_graphql::Result<GqlProgress> {
        let storage = ctx.data::<Arc<Storage>>()?;

        let mut completed: Vec<String> = Vec::new();
        for id in input.completed_point_ids {
            if !completed.contains(&id) {
                completed.push(id);
            }
        }
        let progress = models::StoryProgress {
            story_id: input.story_id.0,
            current_point_index: input.current_point_index as usize,
            completed_point_ids: completed,
            started_at: input.started_at,
            completed_at: input.completed_at,
        };

        storage
            .save_progress(&user_id, &progress)
            .map_err(async_graphql::Error::new)?;

        Ok(GqlProgress::from(progress))
    }

    async fn delete_progress(
        &self,
        ctx: &Context<'_>,
        user_id: String,
        story_id: ID,
    ) -> async_graphql::Result<bool> {
        let storage = ctx.data::<Arc<Storage>>()?;
        storage
            .delete_progress(&user_id, &story_id)
            .map_err(async_graphql::Error::new)
    }

    async fn save_annotation_set(
        &self,
        ctx: &Context<'_>,
        input: SaveAnnotationSetInput,
    ) -> async_graphql::Result<GqlAnnotationSet> {
        let storage = ctx.data::<Arc<Storage>>()?;
        let assets = ctx.data::<Arc<Assets>>()?;

        if !is_feature_collection(&input.features) {
            return Err(async_graphql::Error::new(
                "features must be a GeoJSON FeatureCollection",
            ));
        }
        if let Some(map_id) = &input.map_id {
            if !assets.accepts_map(map_id) {
                return Err(async_graphql::Error::new(format!("Unknown map: {}", map_id)));
            }
        }

        let now = now_millis();
        let id = input
            .id
            .map(|id| id.0)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let created_at = storage
            .get_annotation_set(&id)
            .map_err(async_graphql::Error::new)?
            .map(|existing| existing.created_at)
            .unwrap_or(now);

        let set = models::AnnotationSet {
            id,
            title: input.title,
            map_id: input.map_id,
            owner_id: input.owner_id,
            features: input.features.0,
            created_at,
            updated_at: now,
        };

        storage
            .save_annotation_set(&set)
            .map_err(async_graphql::Error::new)?;

        Ok(GqlAnnotationSet::from(set))
    }

    async fn delete_annotation_set(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        let storage = ctx.data::<Arc<Storage>>()?;
        storage
            .delete_annotation_set(&id)
            .map_err(async_graphql::Error::new)
    }

    /// Returns whether the map is now a favorite.
    async fn set_favorite(
        &self,
        ctx: &Context<'_>,
        user_id: String,
        map_id: String,
        favorite: bool,
    ) -> async_graphql::Result<bool> {
        let assets = ctx.data::<Arc<Assets>>()?;
        if !assets.accepts_map(&map_id) {
            return Err(async_graphql::Error::new(format!("Unknown map: {}", map_id)));
        }
        let storage = ctx.data::<Arc<Storage>>()?;
        storage
            .set_favorite(&user_id, &map_id, favorite)
            .map_err(async_graphql::Error::new)?;
        Ok(favorite)
    }

    async fn create_georef_submission(
        &self,
        ctx: &Context<'_>,
        input: GeorefSubmissionInput,
    ) -> async_graphql::Result<GqlGeorefSubmission> {
        let storage = ctx.data::<Arc<Storage>>()?;
        let submission = GeorefSubmission::new(
            uuid::Uuid::new_v4().to_string(),
            &input.source_url,
            &input.name,
            input.description,
            now_millis(),
        )
        .map_err(|e| async_graphql::Error::new(e.to_string()))?;
        storage.save_georef(&submission).map_err(async_graphql::Error::new)?;
        tracing::debug!(submission = %submission.id, "Created georef submission");
        Ok(GqlGeorefSubmission::from(submission))
    }

    async fn claim_georef_submission(
        &self,
        ctx: &Context<'_>,
        id: ID,
        user_id: String,
    ) -> async_graphql::Result<GqlGeorefSubmission> {
        let storage = ctx.data::<Arc<Storage>>()?;
        let mut submission = storage
            .get_georef(&id)
            .map_err(async_graphql::Error::new)?
            .ok_or_else(|| async_graphql::Error::new(format!("Unknown submission: {}", id.0)))?;
        submission
            .claim(&user_id, now_millis())
            .map_err(|e| async_graphql::Error::new(e.to_string()))?;
        storage.save_georef(&submission).map_err(async_graphql::Error::new)?;
        Ok(GqlGeorefSubmission::from(submission))
    }

    async fn submit_georef_for_review(
        &self,
        ctx: &Context<'_>,
        id: ID,
        user_id: String,
        allmaps_id: String,
    ) -> async_graphql::Result<GqlGeorefSubmission> {
        let storage = ctx.data::<Arc<Storage>>()?;
        let mut submission = storage
            .get_georef(&id)
            .map_err(async_graphql::Error::new)?
            .ok_or_else(|| async_graphql::Error::new(format!("Unknown submission: {}", id.0)))?;
        submission
            .submit_for_review(&user_id, &allmaps_id, now_millis())
            .map_err(|e| async_graphql::Error::new(e.to_string()))?;
        storage.save_georef(&submission).map_err(async_graphql::Error::new)?;
        Ok(GqlGeorefSubmission::from(submission))
    }

    async fn create_label_task(
        &self,
        ctx: &Context<'_>,
        input: LabelTaskInput,
    ) -> async_graphql::Result<GqlLabelTask> {
        let storage = ctx.data::<Arc<Storage>>()?;
        let assets = ctx.data::<Arc<Assets>>()?;
        if !assets.accepts_map(&input.map_id) {
            return Err(async_graphql::Error::new(format!("Unknown map: {}", input.map_id)));
        }
        let r = input.region;
        if !([r.x, r.y, r.width, r.height].iter().all(|v| v.is_finite()) && r.width > 0.0 && r.height > 0.0) {
            return Err(async_graphql::Error::new("region must have a positive size"));
        }

        let task = LabelTask {
            id: input
                .id
                .map(|id| id.0)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            map_id: input.map_id,
            allmaps_id: input.allmaps_id.unwrap_or_default(),
            region: PixelRegion {
                x: r.x,
                y: r.y,
                width: r.width,
                height: r.height,
            },
            status: LabelTaskStatus::Open,
            legend: input.legend.unwrap_or_default(),
            created_at: now_millis(),
        };
        storage.save_label_task(&task).map_err(async_graphql::Error::new)?;
        Ok(GqlLabelTask::from(task))
    }

    async fn set_label_task_status(
        &self,
        ctx: &Context<'_>,
        id: ID,
        status: GqlLabelTaskStatus,
    ) -> async_graphql::Result<GqlLabelTask> {
        let storage = ctx.data::<Arc<Storage>>()?;
        let mut task = storage
            .get_label_task(&id)
            .map_err(async_graphql::Error::new)?
            .ok_or_else(|| async_graphql::Error::new(format!("Unknown task: {}", id.0)))?;
        task.status = status.into();
        storage.save_label_task(&task).map_err(async_graphql::Error::new)?;
        Ok(GqlLabelTask::from(task))
    }

    /// The first pin on an open task moves it to in progress.
    async fn create_label_pin(
        &self,
        ctx: &Context<'_>,
        input: LabelPinInput,
    ) -> async_graphql::Result<GqlLabelPin> {
        let storage = ctx.data::<Arc<Storage>>()?;
        let mut task = storage
            .get_label_task(&input.task_id)
            .map_err(async_graphql::Error::new)?
            .ok_or_else(|| async_graphql::Error::new(format!("Unknown task: {}", input.task_id.0)))?;
        if !task.status.is_open() {
            return Err(async_graphql::Error::new("Task is no longer accepting labels"));
        }

        let pin = LabelPin {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: task.id.clone(),
            user_id: input.user_id,
            label: input.label.trim().to_string(),
            pixel_x: input.pixel_x,
            pixel_y: input.pixel_y,
            confidence: input.confidence.unwrap_or(1.0),
            data: input.data.map(|d| d.0).unwrap_or_default(),
            created_at: now_millis(),
        };
        pin.validate(&task).map_err(async_graphql::Error::new)?;
        storage.save_label_pin(&pin).map_err(async_graphql::Error::new)?;

        if task.status == LabelTaskStatus::Open {
            task.status = LabelTaskStatus::InProgress;
            storage.save_label_task(&task).map_err(async_graphql::Error::new)?;
        }
        Ok(GqlLabelPin::from(pin))
    }

    /// Only the pin's author may remove it.
    async fn delete_label_pin(
        &self,
        ctx: &Context<'_>,
        task_id: ID,
        pin_id: ID,
        user_id: String,
    ) -> async_graphql::Result<bool> {
        let storage = ctx.data::<Arc<Storage>>()?;
        let pins = storage
            .list_label_pins(&task_id)
            .map_err(async_graphql::Error::new)?;
        match pins.iter().find(|p| p.id == pin_id.0) {
            Some(pin) if pin.user_id != user_id => {
                Err(async_graphql::Error::new("Pin belongs to another contributor"))
            }
            Some(_) => storage
                .delete_label_pin(&task_id, &pin_id)
                .map_err(async_graphql::Error::new),
            None => Ok(false),
        }
    }
}

pub type Schema = async_graphql::Schema<QueryRoot, MutationRoot, async_graphql::EmptySubscription>;

pub fn build_schema(assets: Arc<Assets>, storage: Arc<Storage>) -> Schema {
    async_graphql::Schema::build(QueryRoot, MutationRoot, async_graphql::EmptySubscription)
        .data(assets)
        .data(storage)
        .finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> Assets {
        Assets {
            maps: serde_json::from_value(json!([
                {"id": "saigon-1965", "name": "Saigon 1965", "isFeatured": true},
                {"id": "hue-1968", "name": "Hue 1968"}
            ]))
            .unwrap(),
        }
    }

    fn schema() -> (tempfile::TempDir, Schema) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(&dir.path().join("test.redb")).unwrap();
        (dir, build_schema(Arc::new(catalog()), storage))
    }

    async fn run(schema: &Schema, query: &str) -> serde_json::Value {
        let res = schema.execute(query).await;
        assert!(res.errors.is_empty(), "unexpected errors: {:?}", res.errors);
        res.data.into_json().unwrap()
    }

    async fn run_err(schema: &Schema, query: &str) -> String {
        let res = schema.execute(query).await;
        assert!(!res.errors.is_empty(), "expected an error");
        res.errors[0].message.clone()
    }

    const SAVE_STORY: &str = r#"mutation {
        saveStory(input: {
            id: "story-1",
            title: "Old Quarter walk",
            authorId: "u1",
            isPublic: true,
            updatedAt: 50,
            points: [
                { id: "p-a", title: "Market", coordinates: [106.70, 10.77], triggerRadius: 25 },
                { id: "p-b", title: "Opera", coordinates: [106.71, 10.78], interaction: QR, qrPayload: "opera" }
            ]
        }) { id points { id order triggerRadius interaction } createdAt updatedAt }
    }"#;

    #[tokio::test]
    async fn test_maps_featured_filter() {
        let (_dir, schema) = schema();
        let all = run(&schema, "{ maps { id } }").await;
        assert_eq!(all["maps"].as_array().unwrap().len(), 2);
        let featured = run(&schema, "{ maps(featuredOnly: true) { id isFeatured } }").await;
        assert_eq!(featured["maps"], json!([{"id": "saigon-1965", "isFeatured": true}]));
    }

    #[tokio::test]
    async fn test_save_and_fetch_story() {
        let (_dir, schema) = schema();
        let saved = run(&schema, SAVE_STORY).await;
        assert_eq!(
            saved["saveStory"]["points"],
            json!([
                {"id": "p-a", "order": 0, "triggerRadius": 25.0, "interaction": "PROXIMITY"},
                {"id": "p-b", "order": 1, "triggerRadius": 10.0, "interaction": "QR"}
            ])
        );
        assert_eq!(saved["saveStory"]["updatedAt"], json!(50));
        assert_eq!(saved["saveStory"]["createdAt"], json!(50));

        let resaved = run(
            &schema,
            r#"mutation { saveStory(input: { id: "story-1", title: "Old Quarter walk", authorId: "u1", isPublic: true, updatedAt: 80, points: [] }) { createdAt updatedAt } }"#,
        )
        .await;
        assert_eq!(resaved["saveStory"], json!({"createdAt": 50, "updatedAt": 80}));

        let fetched = run(&schema, r#"{ story(id: "story-1") { title isPublic authorId } }"#).await;
        assert_eq!(
            fetched["story"],
            json!({"title": "Old Quarter walk", "isPublic": true, "authorId": "u1"})
        );

        let mine = run(&schema, r#"{ stories(authorId: "u1") { id } }"#).await;
        assert_eq!(mine["stories"].as_array().unwrap().len(), 1);
        let theirs = run(&schema, r#"{ stories(authorId: "u2") { id } }"#).await;
        assert!(theirs["stories"].as_array().unwrap().is_empty());

        let deleted = run(&schema, r#"mutation { deleteStory(id: "story-1") }"#).await;
        assert_eq!(deleted["deleteStory"], json!(true));
        let gone = run(&schema, r#"{ story(id: "story-1") { id } }"#).await;
        assert!(gone["story"].is_null());
    }

    #[tokio::test]
    async fn test_story_rejects_bad_coordinates() {
        let (_dir, schema) = schema();
        let msg = run_err(
            &schema,
            r#"mutation { saveStory(input: {
                id: "s", title: "t", authorId: "u",
                points: [{ id: "p", title: "x", coordinates: [106.7] }]
            }) { id } }"#,
        )
        .await;
        assert!(msg.contains("coordinates"));
    }

    #[tokio::test]
    async fn test_progress_per_user() {
        let (_dir, schema) = schema();
        run(
            &schema,
            r#"mutation { saveProgress(userId: "u1", input: {
                storyId: "story-1", currentPointIndex: 1,
                completedPointIds: ["p-a", "p-a"], startedAt: 10
            }) { storyId } }"#,
        )
        .await;

        let mine = run(&schema, r#"{ progress(userId: "u1") { storyId currentPointIndex completedPointIds } }"#).await;
        assert_eq!(
            mine["progress"],
            json!([{"storyId": "story-1", "currentPointIndex": 1, "completedPointIds": ["p-a"]}])
        );
        let other = run(&schema, r#"{ progress(userId: "u2") { storyId } }"#).await;
        assert!(other["progress"].as_array().unwrap().is_empty());

        let deleted = run(&schema, r#"mutation { deleteProgress(userId: "u1", storyId: "story-1") }"#).await;
        assert_eq!(deleted["deleteProgress"], json!(true));
    }

    #[tokio::test]
    async fn test_annotation_set_validation_and_round_trip() {
        let (_dir, schema) = schema();
        let msg = run_err(
            &schema,
            r#"mutation { saveAnnotationSet(input: {
                title: "x", ownerId: "u1", features: {type: "Feature"}
            }) { id } }"#,
        )
        .await;
        assert!(msg.contains("FeatureCollection"));

        let msg = run_err(
            &schema,
            r#"mutation { saveAnnotationSet(input: {
                title: "x", ownerId: "u1", mapId: "hanoi",
                features: {type: "FeatureCollection", features: []}
            }) { id } }"#,
        )
        .await;
        assert!(msg.contains("Unknown map"));

        let saved = run(
            &schema,
            r#"mutation { saveAnnotationSet(input: {
                id: "set-1", title: "Landmarks", ownerId: "u1", mapId: "hue-1968",
                features: {type: "FeatureCollection", features: []}
            }) { id title } }"#,
        )
        .await;
        assert_eq!(saved["saveAnnotationSet"], json!({"id": "set-1", "title": "Landmarks"}));

        let fetched = run(&schema, r#"{ annotationSet(id: "set-1") { mapId features } }"#).await;
        assert_eq!(fetched["annotationSet"]["mapId"], json!("hue-1968"));
        assert_eq!(fetched["annotationSet"]["features"]["type"], json!("FeatureCollection"));
    }

    #[tokio::test]
    async fn test_favorites() {
        let (_dir, schema) = schema();
        run(&schema, r#"mutation { setFavorite(userId: "u1", mapId: "hue-1968", favorite: true) }"#).await;
        let favs = run(&schema, r#"{ favorites(userId: "u1") }"#).await;
        assert_eq!(favs["favorites"], json!(["hue-1968"]));

        run(&schema, r#"mutation { setFavorite(userId: "u1", mapId: "hue-1968", favorite: false) }"#).await;
        let favs = run(&schema, r#"{ favorites(userId: "u1") }"#).await;
        assert_eq!(favs["favorites"], json!([]));

        let msg = run_err(&schema, r#"mutation { setFavorite(userId: "u1", mapId: "hanoi", favorite: true) }"#).await;
        assert!(msg.contains("Unknown map"));
    }

    #[tokio::test]
    async fn test_georef_submission_flow() {
        let (_dir, schema) = schema();
        let created = run(
            &schema,
            r#"mutation { createGeorefSubmission(input: {
                sourceUrl: "https://example.org/iiif/hue/info.json", name: "Hue sheet 6442"
            }) { id status } }"#,
        )
        .await;
        assert_eq!(created["createGeorefSubmission"]["status"], json!("OPEN"));
        let id = created["createGeorefSubmission"]["id"].as_str().unwrap().to_string();

        let claimed = run(
            &schema,
            &format!(r#"mutation {{ claimGeorefSubmission(id: "{id}", userId: "u1") {{ status submittedBy }} }}"#),
        )
        .await;
        assert_eq!(
            claimed["claimGeorefSubmission"],
            json!({"status": "IN_PROGRESS", "submittedBy": "u1"})
        );

        let msg = run_err(
            &schema,
            &format!(r#"mutation {{ submitGeorefForReview(id: "{id}", userId: "u2", allmapsId: "abc") {{ id }} }}"#),
        )
        .await;
        assert!(msg.contains("claimed by someone else"));

        run(
            &schema,
            &format!(r#"mutation {{ submitGeorefForReview(id: "{id}", userId: "u1", allmapsId: "abc") {{ id }} }}"#),
        )
        .await;
        let open = run(&schema, "{ georefSubmissions { id } }").await;
        assert!(open["georefSubmissions"].as_array().unwrap().is_empty());
        let all = run(&schema, "{ georefSubmissions(openOnly: false) { status allmapsId } }").await;
        assert_eq!(
            all["georefSubmissions"],
            json!([{"status": "REVIEW_NEEDED", "allmapsId": "abc"}])
        );
    }

    #[tokio::test]
    async fn test_label_task_and_pins() {
        let (_dir, schema) = schema();
        let msg = run_err(
            &schema,
            r#"mutation { createLabelTask(input: {
                mapId: "hanoi", region: {x: 0, y: 0, width: 10, height: 10}
            }) { id } }"#,
        )
        .await;
        assert!(msg.contains("Unknown map"));

        run(
            &schema,
            r#"mutation { createLabelTask(input: {
                id: "t1", mapId: "hue-1968", region: {x: 0, y: 0, width: 100, height: 100},
                legend: ["Citadel"]
            }) { id } }"#,
        )
        .await;

        let msg = run_err(
            &schema,
            r#"mutation { createLabelPin(input: {
                taskId: "t1", userId: "u1", label: "Citadel", pixelX: 500, pixelY: 5
            }) { id } }"#,
        )
        .await;
        assert!(msg.contains("outside"));

        let pin = run(
            &schema,
            r#"mutation { createLabelPin(input: {
                taskId: "t1", userId: "u1", label: " Citadel ", pixelX: 50, pixelY: 5,
                confidence: 0.5, data: {vi: "Kinh thành"}
            }) { id label confidence data } }"#,
        )
        .await;
        assert_eq!(pin["createLabelPin"]["label"], json!("Citadel"));
        assert_eq!(pin["createLabelPin"]["data"], json!({"vi": "Kinh thành"}));
        let pin_id = pin["createLabelPin"]["id"].as_str().unwrap().to_string();

        let tasks = run(&schema, "{ labelTasks { id status legend } }").await;
        assert_eq!(
            tasks["labelTasks"],
            json!([{"id": "t1", "status": "IN_PROGRESS", "legend": ["Citadel"]}])
        );

        let msg = run_err(
            &schema,
            &format!(r#"mutation {{ deleteLabelPin(taskId: "t1", pinId: "{pin_id}", userId: "u2") }}"#),
        )
        .await;
        assert!(msg.contains("another contributor"));
        let deleted = run(
            &schema,
            &format!(r#"mutation {{ deleteLabelPin(taskId: "t1", pinId: "{pin_id}", userId: "u1") }}"#),
        )
        .await;
        assert_eq!(deleted["deleteLabelPin"], json!(true));

        run(&schema, r#"mutation { setLabelTaskStatus(id: "t1", status: VERIFIED) { id } }"#).await;
        let open = run(&schema, "{ labelTasks { id } }").await;
        assert!(open["labelTasks"].as_array().unwrap().is_empty());
        let msg = run_err(
            &schema,
            r#"mutation { createLabelPin(input: {
                taskId: "t1", userId: "u1", label: "Citadel", pixelX: 5, pixelY: 5
            }) { id } }"#,
        )
        .await;
        assert!(msg.contains("no longer accepting"));
    }
}
