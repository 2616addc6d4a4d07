use std::rc::Rc;

use serde::{Deserialize, Serialize};
use vma_shared::annotation::AnnotationLayer;
use vma_shared::models::{AnnotationSet, MapEntry, Story, StoryProgress};
use vma_shared::notice::NoticeQueue;
use vma_shared::persist::RecordStore;
use vma_shared::search::{build_search_url, SearchResult, SEARCH_LIMIT};
use vma_shared::story::RemoteMirror;

pub const CATALOG_STORE: &str = "catalog";
pub const CATALOG_TTL_MS: u64 = 60 * 60 * 1000;

const STORY_FIELDS: &str = r#"
    id title description mode isPublic authorId createdAt updatedAt
    region { center zoom }
    points {
        id order title description hint quest coordinates triggerRadius
        interaction qrPayload overlayMapId
        challenge { type: kind question answer triggerRadius }
        camera { center zoom rotation }
    }
"#;

const PROGRESS_FIELDS: &str =
    "storyId currentPointIndex completedPoints: completedPointIds startedAt completedAt";

/// GraphQL enum literal for a lowercase model key (`qr` -> `QR`).
fn gql_enum<T: Serialize>(value: &T) -> serde_json::Value {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => serde_json::Value::String(s.to_uppercase()),
        _ => serde_json::Value::Null,
    }
}

/// Build the variables JSON for a saveStory mutation.
pub fn build_story_variables(story: &Story) -> serde_json::Value {
    let points: Vec<serde_json::Value> = story
        .points
        .iter()
        .map(|p| {
            serde_json::json!({
                "id": p.id,
                "title": p.title,
                "description": p.description,
                "hint": p.hint,
                "quest": p.quest,
                "coordinates": p.coordinates,
                "triggerRadius": p.trigger_radius,
                "interaction": gql_enum(&p.interaction),
                "challenge": {
                    "kind": gql_enum(&p.challenge.kind),
                    "question": p.challenge.question,
                    "answer": p.challenge.answer,
                    "triggerRadius": p.challenge.trigger_radius,
                },
                "qrPayload": p.qr_payload,
                "overlayMapId": p.overlay_map_id,
                "camera": p.camera.as_ref().map(|c| serde_json::json!({
                    "center": c.center,
                    "zoom": c.zoom,
                    "rotation": c.rotation,
                })),
            })
        })
        .collect();

    serde_json::json!({
        "input": {
            "id": story.id,
            "title": story.title,
            "description": story.description,
            "mode": gql_enum(&story.mode),
            "points": points,
            "region": story.region.as_ref().map(|r| serde_json::json!({
                "center": r.center,
                "zoom": r.zoom,
            })),
            "isPublic": story.is_public,
            "authorId": story.author_id,
            "createdAt": story.created_at,
            "updatedAt": story.updated_at,
        }
    })
}

/// Build the variables JSON for a saveProgress mutation.
pub fn build_progress_variables(user_id: &str, progress: &StoryProgress) -> serde_json::Value {
    serde_json::json!({
        "userId": user_id,
        "input": {
            "storyId": progress.story_id,
            "currentPointIndex": progress.current_point_index,
            "completedPointIds": progress.completed_point_ids,
            "startedAt": progress.started_at,
            "completedAt": progress.completed_at,
        }
    })
}

/// Build the variables JSON for a saveAnnotationSet mutation.
pub fn build_annotation_set_variables(
    id: Option<&str>,
    title: &str,
    map_id: Option<&str>,
    owner_id: &str,
    layer: &AnnotationLayer,
) -> serde_json::Value {
    serde_json::json!({
        "input": {
            "id": id,
            "title": title,
            "mapId": map_id,
            "ownerId": owner_id,
            "features": layer.to_feature_collection(),
        }
    })
}

/// Build a shareable story URL from origin and story ID.
pub fn build_story_url(origin: &str, story_id: &str, hunt: bool) -> String {
    let kind = if hunt { "hunt" } else { "story" };
    format!("{}/{}/{}", origin, kind, story_id)
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphQLRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQLResponse<T> {
    pub data: Option<T>,
    pub errors: Option<Vec<GraphQLError>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQLError {
    pub message: String,
}

impl<T> GraphQLResponse<T> {
    pub fn into_result(self) -> Result<T, String> {
        if let Some(errors) = self.errors {
            if let Some(first) = errors.into_iter().next() {
                return Err(first.message);
            }
        }
        self.data.ok_or_else(|| "No data returned".to_string())
    }
}

fn api_url() -> Result<String, String> {
    // Same origin as the page
    let origin = web_sys::window()
        .ok_or("no window")?
        .location()
        .origin()
        .map_err(|_| "no origin".to_string())?;
    Ok(format!("{}/graphql", origin))
}

async fn query<T: for<'de> Deserialize<'de>>(
    query_str: &str,
    variables: Option<serde_json::Value>,
) -> Result<T, String> {
    let req = GraphQLRequest {
        query: query_str.to_string(),
        variables,
    };

    let resp = reqwest::Client::new()
        .post(api_url()?)
        .json(&req)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let gql_resp: GraphQLResponse<T> = resp.json().await.map_err(|e| e.to_string())?;
    gql_resp.into_result()
}

// Response envelopes

#[derive(Deserialize)]
pub struct MapsResponse {
    pub maps: Vec<MapEntry>,
}

#[derive(Deserialize)]
pub struct StoriesResponse {
    pub stories: Vec<Story>,
}

#[derive(Deserialize)]
pub struct StoryResponse {
    pub story: Option<Story>,
}

#[derive(Deserialize)]
pub struct ProgressResponse {
    pub progress: Vec<StoryProgress>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationSetResponse {
    pub annotation_set: Option<AnnotationSet>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAnnotationSetResponse {
    pub save_annotation_set: AnnotationSet,
}

#[derive(Deserialize)]
pub struct FavoritesResponse {
    pub favorites: Vec<String>,
}

// API functions

pub async fn fetch_maps() -> Result<Vec<MapEntry>, String> {
    let resp: MapsResponse = query(
        r#"query { maps { id name type: kind summary thumbnail isFeatured year bounds } }"#,
        None,
    )
    .await?;
    Ok(resp.maps)
}

/// Catalog from the record cache when fresh, otherwise from the server.
pub async fn fetch_maps_cached(records: Rc<RecordStore>) -> Result<Vec<MapEntry>, String> {
    if let Some(maps) = records.get_if_valid::<Vec<MapEntry>>(CATALOG_STORE, "maps") {
        return Ok(maps);
    }
    let maps = fetch_maps().await?;
    records.set(CATALOG_STORE, "maps", &maps, CATALOG_TTL_MS);
    Ok(maps)
}

/// Geocode `query` with Nominatim. Callers go through `SearchSession` for
/// gating and caching.
pub async fn search_places(query: &str) -> Result<Vec<SearchResult>, String> {
    let resp = reqwest::Client::new()
        .get(build_search_url(query, SEARCH_LIMIT))
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|e| e.to_string())?;
    if !resp.status().is_success() {
        return Err(format!("search failed: {}", resp.status()));
    }
    resp.json().await.map_err(|e| e.to_string())
}

pub async fn fetch_stories(author_id: Option<&str>) -> Result<Vec<Story>, String> {
    let variables = serde_json::json!({ "authorId": author_id });
    let resp: StoriesResponse = query(
        &format!(
            "query Stories($authorId: String) {{ stories(authorId: $authorId) {{ {STORY_FIELDS} }} }}"
        ),
        Some(variables),
    )
    .await?;
    Ok(resp.stories)
}

pub async fn fetch_story(id: &str) -> Result<Option<Story>, String> {
    let variables = serde_json::json!({ "id": id });
    let resp: StoryResponse = query(
        &format!("query Story($id: ID!) {{ story(id: $id) {{ {STORY_FIELDS} }} }}"),
        Some(variables),
    )
    .await?;
    Ok(resp.story)
}

pub async fn save_story(story: &Story) -> Result<(), String> {
    let _: serde_json::Value = query(
        r#"mutation SaveStory($input: SaveStoryInput!) { saveStory(input: $input) { id } }"#,
        Some(build_story_variables(story)),
    )
    .await?;
    Ok(())
}

pub async fn delete_story(id: &str) -> Result<bool, String> {
    let resp: serde_json::Value = query(
        r#"mutation DeleteStory($id: ID!) { deleteStory(id: $id) }"#,
        Some(serde_json::json!({ "id": id })),
    )
    .await?;
    Ok(resp["deleteStory"].as_bool().unwrap_or(false))
}

pub async fn fetch_progress(user_id: &str) -> Result<Vec<StoryProgress>, String> {
    let resp: ProgressResponse = query(
        &format!("query Progress($userId: String!) {{ progress(userId: $userId) {{ {PROGRESS_FIELDS} }} }}"),
        Some(serde_json::json!({ "userId": user_id })),
    )
    .await?;
    Ok(resp.progress)
}

pub async fn save_progress(user_id: &str, progress: &StoryProgress) -> Result<(), String> {
    let _: serde_json::Value = query(
        r#"mutation SaveProgress($userId: String!, $input: ProgressInput!) {
            saveProgress(userId: $userId, input: $input) { storyId }
        }"#,
        Some(build_progress_variables(user_id, progress)),
    )
    .await?;
    Ok(())
}

pub async fn delete_progress(user_id: &str, story_id: &str) -> Result<bool, String> {
    let resp: serde_json::Value = query(
        r#"mutation DeleteProgress($userId: String!, $storyId: ID!) {
            deleteProgress(userId: $userId, storyId: $storyId)
        }"#,
        Some(serde_json::json!({ "userId": user_id, "storyId": story_id })),
    )
    .await?;
    Ok(resp["deleteProgress"].as_bool().unwrap_or(false))
}

pub async fn fetch_annotation_set(id: &str) -> Result<Option<AnnotationSet>, String> {
    let resp: AnnotationSetResponse = query(
        r#"query AnnotationSet($id: ID!) {
            annotationSet(id: $id) { id title mapId ownerId features createdAt updatedAt }
        }"#,
        Some(serde_json::json!({ "id": id })),
    )
    .await?;
    Ok(resp.annotation_set)
}

pub async fn save_annotation_set(variables: serde_json::Value) -> Result<AnnotationSet, String> {
    let resp: SaveAnnotationSetResponse = query(
        r#"mutation SaveAnnotationSet($input: SaveAnnotationSetInput!) {
            saveAnnotationSet(input: $input) { id title mapId ownerId features createdAt updatedAt }
        }"#,
        Some(variables),
    )
    .await?;
    Ok(resp.save_annotation_set)
}

pub async fn fetch_favorites(user_id: &str) -> Result<Vec<String>, String> {
    let resp: FavoritesResponse = query(
        r#"query Favorites($userId: String!) { favorites(userId: $userId) }"#,
        Some(serde_json::json!({ "userId": user_id })),
    )
    .await?;
    Ok(resp.favorites)
}

pub async fn set_favorite(user_id: &str, map_id: &str, favorite: bool) -> Result<bool, String> {
    let resp: serde_json::Value = query(
        r#"mutation SetFavorite($userId: String!, $mapId: String!, $favorite: Boolean!) {
            setFavorite(userId: $userId, mapId: $mapId, favorite: $favorite)
        }"#,
        Some(serde_json::json!({ "userId": user_id, "mapId": map_id, "favorite": favorite })),
    )
    .await?;
    Ok(resp["setFavorite"].as_bool().unwrap_or(favorite))
}

/// Mirrors story and progress writes to the server in the background.
/// Failures are logged and surfaced as warnings; local state is untouched.
pub struct ApiMirror {
    user_id: String,
    notices: NoticeQueue,
}

impl ApiMirror {
    pub fn new(user_id: impl Into<String>, notices: NoticeQueue) -> Self {
        ApiMirror {
            user_id: user_id.into(),
            notices,
        }
    }

    fn spawn<F>(&self, what: &'static str, fut: F)
    where
        F: std::future::Future<Output = Result<(), String>> + 'static,
    {
        let notices = self.notices.clone();
        wasm_bindgen_futures::spawn_local(async move {
            if let Err(e) = fut.await {
                tracing::warn!("sync {what} failed: {e}");
                notices.add_warning(format!("Saved locally; could not sync {what}"));
            }
        });
    }
}

impl RemoteMirror for ApiMirror {
    fn story_saved(&self, story: &Story) {
        let story = story.clone();
        self.spawn("story", async move { save_story(&story).await });
    }

    fn story_deleted(&self, story_id: &str) {
        let id = story_id.to_string();
        self.spawn("story", async move { delete_story(&id).await.map(|_| ()) });
    }

    fn progress_saved(&self, progress: &StoryProgress) {
        let user = self.user_id.clone();
        let progress = progress.clone();
        self.spawn("progress", async move { save_progress(&user, &progress).await });
    }

    fn progress_deleted(&self, story_id: &str) {
        let user = self.user_id.clone();
        let id = story_id.to_string();
        self.spawn("progress", async move {
            delete_progress(&user, &id).await.map(|_| ())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vma_shared::models::{Interaction, StoryMode, StoryPoint};

    fn story() -> Story {
        let mut s = Story::new("story-1".into(), "Walk".into(), String::new(), "u1".into(), 10);
        s.mode = StoryMode::Adventure;
        s.points.push(StoryPoint::new("p-a".into(), 0, [106.7, 10.77]));
        let mut qr = StoryPoint::new("p-b".into(), 1, [106.71, 10.78]);
        qr.interaction = Interaction::Qr;
        qr.qr_payload = Some("opera".into());
        s.points.push(qr);
        s
    }

    // --- GraphQL request serialization ---

    #[test]
    fn test_graphql_request_omits_null_variables() {
        let req = GraphQLRequest {
            query: "query { maps { id } }".to_string(),
            variables: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["query"], "query { maps { id } }");
        assert!(json.get("variables").is_none());
    }

    #[test]
    fn test_graphql_error_response() {
        let json = r#"{"data":null,"errors":[{"message":"Unknown map: hanoi"}]}"#;
        let resp: GraphQLResponse<FavoritesResponse> = serde_json::from_str(json).unwrap();
        assert_eq!(resp.into_result().err().unwrap(), "Unknown map: hanoi");
    }

    // --- Response deserialization ---

    #[test]
    fn test_maps_response_deserializes() {
        let json = r#"{"maps":[{"id":"hue-1968","name":"Hue 1968","type":"city","summary":null,"thumbnail":null,"isFeatured":true,"year":1968,"bounds":[107.5,16.4,107.65,16.5]}]}"#;
        let resp: MapsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.maps[0].kind, "city");
        assert_eq!(resp.maps[0].bounds, Some([107.5, 16.4, 107.65, 16.5]));
    }

    #[test]
    fn test_story_response_deserializes_uppercase_enums() {
        let json = r#"{"story":{
            "id":"story-1","title":"Walk","description":"","mode":"ADVENTURE","isPublic":false,
            "authorId":"u1","createdAt":1,"updatedAt":2,"region":null,
            "points":[{"id":"p-b","order":1,"title":"B","description":"","hint":null,"quest":null,
                "coordinates":[106.71,10.78],"triggerRadius":10.0,"interaction":"QR","qrPayload":"opera",
                "overlayMapId":null,"challenge":{"type":"NONE","question":null,"answer":null,"triggerRadius":null},
                "camera":null},
              {"id":"p-a","order":0,"title":"A","description":"","hint":null,"quest":null,
                "coordinates":[106.7,10.77],"triggerRadius":25.0,"interaction":"PROXIMITY","qrPayload":null,
                "overlayMapId":null,"challenge":{"type":"REACH","question":null,"answer":null,"triggerRadius":25.0},
                "camera":null}]
        }}"#;
        let resp: StoryResponse = serde_json::from_str(json).unwrap();
        let story = resp.story.unwrap();
        assert_eq!(story.mode, StoryMode::Adventure);
        assert_eq!(story.points[0].id, "p-a");
        assert_eq!(story.points[1].interaction, Interaction::Qr);
    }

    #[test]
    fn test_progress_response_deserializes() {
        let json = r#"{"progress":[{"storyId":"story-1","currentPointIndex":1,"completedPoints":["p-a"],"startedAt":5,"completedAt":null}]}"#;
        let resp: ProgressResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.progress[0].completed_point_ids, vec!["p-a"]);
        assert!(!resp.progress[0].is_finished());
    }

    // --- Variable builders ---

    #[test]
    fn test_build_story_variables() {
        let vars = build_story_variables(&story());
        let input = &vars["input"];
        assert_eq!(input["id"], "story-1");
        assert_eq!(input["mode"], "ADVENTURE");
        assert_eq!(input["points"][0]["coordinates"], json!([106.7, 10.77]));
        assert_eq!(input["points"][0]["challenge"]["kind"], "REACH");
        assert_eq!(input["points"][1]["interaction"], "QR");
        assert_eq!(input["points"][1]["qrPayload"], "opera");
        assert!(input["region"].is_null());
        assert_eq!(input["updatedAt"], 10);
    }

    #[test]
    fn test_build_progress_variables() {
        let mut progress = StoryProgress::new("story-1".into(), 7);
        progress.completed_point_ids.push("p-a".into());
        let vars = build_progress_variables("u1", &progress);
        assert_eq!(vars["userId"], "u1");
        assert_eq!(vars["input"]["completedPointIds"], json!(["p-a"]));
        assert!(vars["input"]["completedAt"].is_null());
    }

    #[test]
    fn test_build_annotation_set_variables() {
        let layer = AnnotationLayer::new();
        let vars = build_annotation_set_variables(None, "Notes", Some("hue-1968"), "u1", &layer);
        assert!(vars["input"]["id"].is_null());
        assert_eq!(vars["input"]["features"]["type"], "FeatureCollection");
        assert_eq!(vars["input"]["mapId"], "hue-1968");
    }

    // --- URL builder ---

    #[test]
    fn test_build_story_url() {
        assert_eq!(
            build_story_url("http://localhost:3000", "story-1", false),
            "http://localhost:3000/story/story-1"
        );
        assert_eq!(
            build_story_url("https://archive.example.com", "story-1", true),
            "https://archive.example.com/hunt/story-1"
        );
    }
}
