use std::path::{Path, PathBuf};
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use vma_shared::contribute::{GeorefSubmission, LabelPin, LabelTask};
use vma_shared::models::{AnnotationSet, Story, StoryProgress};

const STORIES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("stories");
/// Keyed `<user_id>/<story_id>`.
const PROGRESS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("progress");
const ANNOTATION_SETS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("annotation_sets");
/// Keyed `<user_id>/<map_id>`; the value is unused.
const FAVORITES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("favorites");
const GEOREF_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("georef_submissions");
const LABEL_TASKS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("label_tasks");
/// Keyed `<task_id>/<pin_id>`.
const LABEL_PINS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("label_pins");

pub struct Storage {
    db: Database,
    path: PathBuf,
}

fn user_key(user_id: &str, item_id: &str) -> String {
    format!("{user_id}/{item_id}")
}

/// Half-open key range covering every `<user_id>/...` key. `0` sorts
/// directly after `/`.
fn user_range(user_id: &str) -> (String, String) {
    (format!("{user_id}/"), format!("{user_id}0"))
}

impl Storage {
    pub fn open(path: &Path) -> Result<Arc<Self>, String> {
        let db = Database::create(path)
            .map_err(|e| format!("Failed to open database at {}: {}", path.display(), e))?;

        // Ensure tables exist
        let write_txn = db.begin_write().map_err(|e| e.to_string())?;
        for table in [
            STORIES_TABLE,
            PROGRESS_TABLE,
            ANNOTATION_SETS_TABLE,
            FAVORITES_TABLE,
            GEOREF_TABLE,
            LABEL_TASKS_TABLE,
            LABEL_PINS_TABLE,
        ] {
            write_txn.open_table(table).map_err(|e| e.to_string())?;
        }
        write_txn.commit().map_err(|e| e.to_string())?;

        Ok(Arc::new(Storage {
            db,
            path: path.to_path_buf(),
        }))
    }

    fn put<T: Serialize>(
        &self,
        def: TableDefinition<&str, &[u8]>,
        key: &str,
        value: &T,
    ) -> Result<(), String> {
        let json = serde_json::to_vec(value).map_err(|e| e.to_string())?;
        let write_txn = self.db.begin_write().map_err(|e| e.to_string())?;
        {
            let mut table = write_txn.open_table(def).map_err(|e| e.to_string())?;
            table
                .insert(key, json.as_slice())
                .map_err(|e| e.to_string())?;
        }
        write_txn.commit().map_err(|e| e.to_string())?;
        Ok(())
    }

    fn fetch<T: DeserializeOwned>(
        &self,
        def: TableDefinition<&str, &[u8]>,
        key: &str,
    ) -> Result<Option<T>, String> {
        let read_txn = self.db.begin_read().map_err(|e| e.to_string())?;
        let table = read_txn.open_table(def).map_err(|e| e.to_string())?;
        match table.get(key).map_err(|e| e.to_string())? {
            Some(value) => serde_json::from_slice(value.value())
                .map(Some)
                .map_err(|e| e.to_string()),
            None => Ok(None),
        }
    }

    fn remove(&self, def: TableDefinition<&str, &[u8]>, key: &str) -> Result<bool, String> {
        let write_txn = self.db.begin_write().map_err(|e| e.to_string())?;
        let removed = {
            let mut table = write_txn.open_table(def).map_err(|e| e.to_string())?;
            let result = table.remove(key).map_err(|e| e.to_string())?;
            result.is_some()
        };
        write_txn.commit().map_err(|e| e.to_string())?;
        Ok(removed)
    }

    /// Every value in `def`, or only those under `prefix_range`.
    fn scan<T: DeserializeOwned>(
        &self,
        def: TableDefinition<&str, &[u8]>,
        prefix_range: Option<(String, String)>,
    ) -> Result<Vec<(String, T)>, String> {
        let read_txn = self.db.begin_read().map_err(|e| e.to_string())?;
        let table = read_txn.open_table(def).map_err(|e| e.to_string())?;
        let iter = match &prefix_range {
            Some((start, end)) => table.range(start.as_str()..end.as_str()),
            None => table.iter(),
        }
        .map_err(|e| e.to_string())?;

        let mut out = Vec::new();
        for entry in iter {
            let (key, value) = entry.map_err(|e| e.to_string())?;
            match serde_json::from_slice::<T>(value.value()) {
                Ok(item) => out.push((key.value().to_string(), item)),
                Err(e) => tracing::warn!(key = key.value(), "skipping unreadable record: {e}"),
            }
        }
        Ok(out)
    }

    // Stories

    pub fn save_story(&self, story: &Story) -> Result<(), String> {
        self.put(STORIES_TABLE, &story.id, story)
    }

    pub fn get_story(&self, id: &str) -> Result<Option<Story>, String> {
        let mut story: Option<Story> = self.fetch(STORIES_TABLE, id)?;
        if let Some(story) = story.as_mut() {
            story.densify_order();
        }
        Ok(story)
    }

    pub fn list_stories(&self) -> Result<Vec<Story>, String> {
        let mut stories: Vec<Story> = self
            .scan(STORIES_TABLE, None)?
            .into_iter()
            .map(|(_, s)| s)
            .collect();
        stories.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(stories)
    }

    pub fn delete_story(&self, id: &str) -> Result<bool, String> {
        self.remove(STORIES_TABLE, id)
    }

    pub fn count_stories(&self) -> Result<u64, String> {
        let read_txn = self.db.begin_read().map_err(|e| e.to_string())?;
        let table = read_txn.open_table(STORIES_TABLE).map_err(|e| e.to_string())?;
        table.len().map_err(|e| e.to_string())
    }

    // Progress

    pub fn save_progress(&self, user_id: &str, progress: &StoryProgress) -> Result<(), String> {
        self.put(PROGRESS_TABLE, &user_key(user_id, &progress.story_id), progress)
    }

    pub fn list_progress(&self, user_id: &str) -> Result<Vec<StoryProgress>, String> {
        Ok(self
            .scan(PROGRESS_TABLE, Some(user_range(user_id)))?
            .into_iter()
            .map(|(_, p)| p)
            .collect())
    }

    pub fn delete_progress(&self, user_id: &str, story_id: &str) -> Result<bool, String> {
        self.remove(PROGRESS_TABLE, &user_key(user_id, story_id))
    }

    // Annotation sets

    pub fn save_annotation_set(&self, set: &AnnotationSet) -> Result<(), String> {
        self.put(ANNOTATION_SETS_TABLE, &set.id, set)
    }

    pub fn get_annotation_set(&self, id: &str) -> Result<Option<AnnotationSet>, String> {
        self.fetch(ANNOTATION_SETS_TABLE, id)
    }

    pub fn delete_annotation_set(&self, id: &str) -> Result<bool, String> {
        self.remove(ANNOTATION_SETS_TABLE, id)
    }

    // Favorites

    pub fn set_favorite(&self, user_id: &str, map_id: &str, favorite: bool) -> Result<bool, String> {
        let key = user_key(user_id, map_id);
        if favorite {
            self.put(FAVORITES_TABLE, &key, &true)?;
            Ok(true)
        } else {
            self.remove(FAVORITES_TABLE, &key)
        }
    }

    pub fn list_favorites(&self, user_id: &str) -> Result<Vec<String>, String> {
        let (prefix, _) = user_range(user_id);
        Ok(self
            .scan::<bool>(FAVORITES_TABLE, Some(user_range(user_id)))?
            .into_iter()
            .filter_map(|(key, _)| key.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }

    // Contributions

    pub fn save_georef(&self, submission: &GeorefSubmission) -> Result<(), String> {
        self.put(GEOREF_TABLE, &submission.id, submission)
    }

    pub fn get_georef(&self, id: &str) -> Result<Option<GeorefSubmission>, String> {
        self.fetch(GEOREF_TABLE, id)
    }

    /// Newest first.
    pub fn list_georefs(&self, open_only: bool) -> Result<Vec<GeorefSubmission>, String> {
        let mut out: Vec<GeorefSubmission> = self
            .scan(GEOREF_TABLE, None)?
            .into_iter()
            .map(|(_, s)| s)
            .filter(|s: &GeorefSubmission| !open_only || s.status.is_open())
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    pub fn save_label_task(&self, task: &LabelTask) -> Result<(), String> {
        self.put(LABEL_TASKS_TABLE, &task.id, task)
    }

    pub fn get_label_task(&self, id: &str) -> Result<Option<LabelTask>, String> {
        self.fetch(LABEL_TASKS_TABLE, id)
    }

    /// Oldest first, so the backlog is worked in order.
    pub fn list_label_tasks(&self, open_only: bool) -> Result<Vec<LabelTask>, String> {
        let mut out: Vec<LabelTask> = self
            .scan(LABEL_TASKS_TABLE, None)?
            .into_iter()
            .map(|(_, t)| t)
            .filter(|t: &LabelTask| !open_only || t.status.is_open())
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(out)
    }

    pub fn save_label_pin(&self, pin: &LabelPin) -> Result<(), String> {
        self.put(LABEL_PINS_TABLE, &user_key(&pin.task_id, &pin.id), pin)
    }

    pub fn list_label_pins(&self, task_id: &str) -> Result<Vec<LabelPin>, String> {
        let mut out: Vec<LabelPin> = self
            .scan(LABEL_PINS_TABLE, Some(user_range(task_id)))?
            .into_iter()
            .map(|(_, p)| p)
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(out)
    }

    pub fn delete_label_pin(&self, task_id: &str, pin_id: &str) -> Result<bool, String> {
        self.remove(LABEL_PINS_TABLE, &user_key(task_id, pin_id))
    }

    pub fn db_size_bytes(&self) -> Result<u64, String> {
        std::fs::metadata(&self.path)
            .map(|m| m.len())
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vma_shared::models::StoryPoint;

    fn temp_storage() -> (tempfile::TempDir, Arc<Storage>) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(&dir.path().join("test.redb")).unwrap();
        (dir, storage)
    }

    fn story(id: &str, updated_at: u64) -> Story {
        let mut s = Story::new(id.into(), format!("Story {id}"), String::new(), "u1".into(), 1);
        s.updated_at = updated_at;
        s.points.push(StoryPoint::new(format!("{id}-p0"), 0, [106.7, 10.77]));
        s
    }

    #[test]
    fn test_story_round_trip_and_delete() {
        let (_dir, storage) = temp_storage();
        storage.save_story(&story("a", 10)).unwrap();
        let loaded = storage.get_story("a").unwrap().unwrap();
        assert_eq!(loaded, story("a", 10));
        assert_eq!(storage.count_stories().unwrap(), 1);
        assert!(storage.delete_story("a").unwrap());
        assert!(!storage.delete_story("a").unwrap());
        assert!(storage.get_story("a").unwrap().is_none());
    }

    #[test]
    fn test_list_stories_newest_first() {
        let (_dir, storage) = temp_storage();
        storage.save_story(&story("old", 1)).unwrap();
        storage.save_story(&story("new", 5)).unwrap();
        let ids: Vec<String> = storage.list_stories().unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[test]
    fn test_progress_is_scoped_per_user() {
        let (_dir, storage) = temp_storage();
        storage.save_progress("alice", &StoryProgress::new("s1".into(), 1)).unwrap();
        storage.save_progress("alice", &StoryProgress::new("s2".into(), 2)).unwrap();
        storage.save_progress("alice2", &StoryProgress::new("s3".into(), 3)).unwrap();
        storage.save_progress("bob", &StoryProgress::new("s1".into(), 4)).unwrap();

        let alice: Vec<String> = storage
            .list_progress("alice")
            .unwrap()
            .into_iter()
            .map(|p| p.story_id)
            .collect();
        assert_eq!(alice, vec!["s1", "s2"]);

        assert!(storage.delete_progress("alice", "s1").unwrap());
        assert_eq!(storage.list_progress("alice").unwrap().len(), 1);
        assert_eq!(storage.list_progress("bob").unwrap().len(), 1);
    }

    #[test]
    fn test_annotation_set_round_trip() {
        let (_dir, storage) = temp_storage();
        let set = AnnotationSet {
            id: "set-1".into(),
            title: "Landmarks".into(),
            map_id: Some("map-1".into()),
            owner_id: "u1".into(),
            features: json!({"type": "FeatureCollection", "features": []}),
            created_at: 1,
            updated_at: 2,
        };
        storage.save_annotation_set(&set).unwrap();
        assert_eq!(storage.get_annotation_set("set-1").unwrap(), Some(set));
        assert!(storage.delete_annotation_set("set-1").unwrap());
        assert_eq!(storage.get_annotation_set("set-1").unwrap(), None);
    }

    #[test]
    fn test_favorites_toggle() {
        let (_dir, storage) = temp_storage();
        storage.set_favorite("u1", "m1", true).unwrap();
        storage.set_favorite("u1", "m2", true).unwrap();
        storage.set_favorite("u2", "m3", true).unwrap();
        assert_eq!(storage.list_favorites("u1").unwrap(), vec!["m1", "m2"]);
        assert!(storage.set_favorite("u1", "m1", false).unwrap());
        assert!(!storage.set_favorite("u1", "m1", false).unwrap());
        assert_eq!(storage.list_favorites("u1").unwrap(), vec!["m2"]);
    }

    #[test]
    fn test_georef_listing_filters_open_newest_first() {
        let (_dir, storage) = temp_storage();
        let mut old = GeorefSubmission::new("g1".into(), "https://x/1", "Sheet 1", None, 1).unwrap();
        let new = GeorefSubmission::new("g2".into(), "https://x/2", "Sheet 2", None, 5).unwrap();
        let mut done = GeorefSubmission::new("g3".into(), "https://x/3", "Sheet 3", None, 9).unwrap();
        old.claim("u1", 2).unwrap();
        done.claim("u1", 10).unwrap();
        done.submit_for_review("u1", "abc", 11).unwrap();
        for s in [&old, &new, &done] {
            storage.save_georef(s).unwrap();
        }

        let open: Vec<String> = storage.list_georefs(true).unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(open, vec!["g2", "g1"]);
        assert_eq!(storage.list_georefs(false).unwrap().len(), 3);
        assert_eq!(storage.get_georef("g1").unwrap(), Some(old));
    }

    #[test]
    fn test_label_pins_scoped_per_task() {
        use vma_shared::contribute::{LabelTaskStatus, PixelRegion};

        let (_dir, storage) = temp_storage();
        let task = LabelTask {
            id: "t1".into(),
            map_id: "m1".into(),
            allmaps_id: String::new(),
            region: PixelRegion { x: 0.0, y: 0.0, width: 10.0, height: 10.0 },
            status: LabelTaskStatus::Open,
            legend: vec![],
            created_at: 3,
        };
        let verified = LabelTask {
            id: "t0".into(),
            status: LabelTaskStatus::Verified,
            created_at: 1,
            ..task.clone()
        };
        storage.save_label_task(&task).unwrap();
        storage.save_label_task(&verified).unwrap();
        assert_eq!(storage.list_label_tasks(false).unwrap()[0].id, "t0");
        assert_eq!(storage.list_label_tasks(true).unwrap(), vec![task.clone()]);

        let pin = |id: &str, task_id: &str| LabelPin {
            id: id.into(),
            task_id: task_id.into(),
            user_id: "u1".into(),
            label: "Citadel".into(),
            pixel_x: 1.0,
            pixel_y: 1.0,
            confidence: 1.0,
            data: serde_json::Value::Null,
            created_at: 0,
        };
        storage.save_label_pin(&pin("p1", "t1")).unwrap();
        storage.save_label_pin(&pin("p2", "t10")).unwrap();
        assert_eq!(storage.list_label_pins("t1").unwrap().len(), 1);
        assert!(storage.delete_label_pin("t1", "p1").unwrap());
        assert!(storage.list_label_pins("t1").unwrap().is_empty());
        assert_eq!(storage.list_label_pins("t10").unwrap().len(), 1);
    }

    #[test]
    fn test_db_size_reported() {
        let (_dir, storage) = temp_storage();
        assert!(storage.db_size_bytes().unwrap() > 0);
    }
}
