//! Annotation features and the history entries that describe edits to them.
//!
//! [`AnnotationLayer`] is the live feature set. Every mutating call returns
//! the [`HistoryEntry`] describing it, which the caller pushes onto a
//! [`History`](crate::history::History). Undo/redo hand the entry back to
//! [`AnnotationLayer::apply_undo`] / [`AnnotationLayer::apply_redo`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::ids::random_id;

pub const DEFAULT_ANNOTATION_COLOR: &str = "#2563eb";
pub const UNTITLED: &str = "Untitled";

/// A drawn feature. `geometry` is a GeoJSON geometry object in EPSG:4326.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationFeature {
    pub id: String,
    pub geometry: Value,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub hidden: bool,
}

impl AnnotationFeature {
    pub fn new(geometry: Value) -> Self {
        let mut feature = AnnotationFeature {
            id: String::new(),
            geometry,
            label: String::new(),
            color: String::new(),
            details: String::new(),
            hidden: false,
        };
        ensure_defaults(&mut feature);
        feature
    }

    /// GeoJSON geometry type, or `Geometry` when unknown.
    pub fn geometry_type(&self) -> &str {
        self.geometry
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("Geometry")
    }

    pub fn field(&self, field: AnnotationField) -> Value {
        match field {
            AnnotationField::Label => json!(self.label),
            AnnotationField::Color => json!(self.color),
            AnnotationField::Details => json!(self.details),
            AnnotationField::Hidden => json!(self.hidden),
        }
    }

    /// Set one field from a JSON value of the matching type.
    pub fn set_field(&mut self, field: AnnotationField, value: &Value) -> bool {
        match (field, value) {
            (AnnotationField::Label, Value::String(s)) => self.label = s.clone(),
            (AnnotationField::Color, Value::String(s)) => self.color = s.clone(),
            (AnnotationField::Details, Value::String(s)) => self.details = s.clone(),
            (AnnotationField::Hidden, Value::Bool(b)) => self.hidden = *b,
            _ => return false,
        }
        true
    }
}

/// Assign an id once and fill label/color when empty.
pub fn ensure_defaults(feature: &mut AnnotationFeature) {
    if feature.id.is_empty() {
        feature.id = random_id("anno");
    }
    if feature.label.trim().is_empty() {
        feature.label = UNTITLED.to_string();
    }
    if feature.color.trim().is_empty() {
        feature.color = DEFAULT_ANNOTATION_COLOR.to_string();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationField {
    Label,
    Color,
    Details,
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: AnnotationField,
    pub before: Value,
    pub after: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum HistoryEntry {
    Add { snapshot: AnnotationFeature },
    Delete { snapshot: AnnotationFeature },
    Update { id: String, changes: Vec<FieldChange> },
    Geometry { before: AnnotationFeature, after: AnnotationFeature },
    /// `replaced` holds features the import overwrote by id.
    BulkAdd {
        snapshots: Vec<AnnotationFeature>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        replaced: Vec<AnnotationFeature>,
    },
    Clear { snapshots: Vec<AnnotationFeature> },
}

/// List row for the annotation panel.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationSummary {
    pub id: String,
    pub label: String,
    pub kind: String,
    pub color: String,
    pub details: String,
    pub hidden: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationLayer {
    features: Vec<AnnotationFeature>,
    selected_id: Option<String>,
}

impl AnnotationLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn features(&self) -> &[AnnotationFeature] {
        &self.features
    }

    pub fn get(&self, id: &str) -> Option<&AnnotationFeature> {
        self.features.iter().find(|f| f.id == id)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected_id.as_deref()
    }

    /// Select an existing feature, or clear the selection with `None`.
    pub fn select(&mut self, id: Option<&str>) {
        self.selected_id = id.filter(|id| self.get(id).is_some()).map(str::to_string);
    }

    pub fn add(&mut self, mut feature: AnnotationFeature) -> HistoryEntry {
        ensure_defaults(&mut feature);
        self.insert(feature.clone());
        HistoryEntry::Add { snapshot: feature }
    }

    pub fn remove(&mut self, id: &str) -> Option<HistoryEntry> {
        let snapshot = self.take(id)?;
        Some(HistoryEntry::Delete { snapshot })
    }

    /// Apply field edits; only real changes are recorded.
    pub fn update_fields(&mut self, id: &str, edits: &[(AnnotationField, Value)]) -> Option<HistoryEntry> {
        let feature = self.features.iter_mut().find(|f| f.id == id)?;
        let mut changes = Vec::new();
        for (field, after) in edits {
            let before = feature.field(*field);
            if before == *after {
                continue;
            }
            if feature.set_field(*field, after) {
                changes.push(FieldChange {
                    field: *field,
                    before,
                    after: after.clone(),
                });
            } else {
                debug!("ignoring {field:?} edit with wrong value type");
            }
        }
        (!changes.is_empty()).then(|| HistoryEntry::Update {
            id: id.to_string(),
            changes,
        })
    }

    pub fn replace_geometry(&mut self, id: &str, geometry: Value) -> Option<HistoryEntry> {
        let feature = self.features.iter_mut().find(|f| f.id == id)?;
        if feature.geometry == geometry {
            return None;
        }
        let before = feature.clone();
        feature.geometry = geometry;
        Some(HistoryEntry::Geometry {
            before,
            after: feature.clone(),
        })
    }

    pub fn bulk_add(&mut self, features: Vec<AnnotationFeature>) -> Option<HistoryEntry> {
        if features.is_empty() {
            return None;
        }
        let mut snapshots: Vec<AnnotationFeature> = Vec::with_capacity(features.len());
        let mut replaced = Vec::new();
        for mut feature in features {
            ensure_defaults(&mut feature);
            let seen = snapshots.iter().any(|s| s.id == feature.id);
            if let Some(existing) = self.get(&feature.id).filter(|_| !seen) {
                replaced.push(existing.clone());
            }
            self.insert(feature.clone());
            snapshots.push(feature);
        }
        Some(HistoryEntry::BulkAdd { snapshots, replaced })
    }

    pub fn clear(&mut self) -> Option<HistoryEntry> {
        if self.features.is_empty() {
            return None;
        }
        self.selected_id = None;
        Some(HistoryEntry::Clear {
            snapshots: std::mem::take(&mut self.features),
        })
    }

    pub fn apply_undo(&mut self, entry: &HistoryEntry) {
        match entry {
            HistoryEntry::Add { snapshot } => {
                self.take(&snapshot.id);
            }
            HistoryEntry::Delete { snapshot } => self.insert(snapshot.clone()),
            HistoryEntry::Update { id, changes } => self.set_changes(id, changes, |c| &c.before),
            HistoryEntry::Geometry { before, .. } => self.insert(before.clone()),
            HistoryEntry::BulkAdd { snapshots, replaced } => {
                for s in snapshots {
                    self.take(&s.id);
                }
                for r in replaced {
                    self.insert(r.clone());
                }
            }
            HistoryEntry::Clear { snapshots } => {
                for s in snapshots {
                    self.insert(s.clone());
                }
            }
        }
    }

    pub fn apply_redo(&mut self, entry: &HistoryEntry) {
        match entry {
            HistoryEntry::Add { snapshot } => self.insert(snapshot.clone()),
            HistoryEntry::Delete { snapshot } => {
                self.take(&snapshot.id);
            }
            HistoryEntry::Update { id, changes } => self.set_changes(id, changes, |c| &c.after),
            HistoryEntry::Geometry { after, .. } => self.insert(after.clone()),
            HistoryEntry::BulkAdd { snapshots, .. } => {
                for s in snapshots {
                    self.insert(s.clone());
                }
            }
            HistoryEntry::Clear { .. } => {
                self.features.clear();
                self.selected_id = None;
            }
        }
    }

    pub fn summaries(&self) -> Vec<AnnotationSummary> {
        self.features
            .iter()
            .map(|f| AnnotationSummary {
                id: f.id.clone(),
                label: f.label.clone(),
                kind: f.geometry_type().to_string(),
                color: f.color.clone(),
                details: f.details.clone(),
                hidden: f.hidden,
            })
            .collect()
    }

    /// Export as a GeoJSON FeatureCollection.
    pub fn to_feature_collection(&self) -> Value {
        let features: Vec<Value> = self
            .features
            .iter()
            .map(|f| {
                json!({
                    "type": "Feature",
                    "id": f.id,
                    "geometry": f.geometry,
                    "properties": {
                        "label": f.label,
                        "color": f.color,
                        "details": f.details,
                        "hidden": f.hidden,
                    }
                })
            })
            .collect();
        json!({ "type": "FeatureCollection", "features": features })
    }

    /// Read a FeatureCollection, skipping entries without a geometry object.
    pub fn from_feature_collection(value: &Value) -> Self {
        let features = value
            .get("features")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(parse_feature).collect())
            .unwrap_or_default();
        AnnotationLayer {
            features,
            selected_id: None,
        }
    }

    /// Insert, replacing any feature with the same id in place.
    fn insert(&mut self, feature: AnnotationFeature) {
        match self.features.iter_mut().find(|f| f.id == feature.id) {
            Some(slot) => *slot = feature,
            None => self.features.push(feature),
        }
    }

    fn take(&mut self, id: &str) -> Option<AnnotationFeature> {
        let index = self.features.iter().position(|f| f.id == id)?;
        if self.selected_id.as_deref() == Some(id) {
            self.selected_id = None;
        }
        Some(self.features.remove(index))
    }

    fn set_changes(&mut self, id: &str, changes: &[FieldChange], pick: impl Fn(&FieldChange) -> &Value) {
        if let Some(feature) = self.features.iter_mut().find(|f| f.id == id) {
            for change in changes {
                feature.set_field(change.field, pick(change));
            }
        }
    }
}

fn parse_feature(value: &Value) -> Option<AnnotationFeature> {
    let geometry = value.get("geometry").filter(|g| g.is_object())?.clone();
    let props = value.get("properties");
    let text = |key: &str| {
        props
            .and_then(|p| p.get(key))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let id = match value.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    let mut feature = AnnotationFeature {
        id,
        geometry,
        label: text("label"),
        color: text("color"),
        details: text("details"),
        hidden: props
            .and_then(|p| p.get("hidden"))
            .and_then(Value::as_bool)
            .unwrap_or(false),
    };
    ensure_defaults(&mut feature);
    Some(feature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::History;

    fn point(lon: f64, lat: f64) -> Value {
        json!({ "type": "Point", "coordinates": [lon, lat] })
    }

    #[test]
    fn test_new_feature_gets_defaults() {
        let f = AnnotationFeature::new(point(1.0, 2.0));
        assert!(f.id.starts_with("anno-"));
        assert_eq!(f.label, "Untitled");
        assert_eq!(f.color, "#2563eb");
        assert_eq!(f.geometry_type(), "Point");
    }

    #[test]
    fn test_ids_are_stable_once_assigned() {
        let mut layer = AnnotationLayer::new();
        let entry = layer.add(AnnotationFeature::new(point(0.0, 0.0)));
        let HistoryEntry::Add { snapshot } = entry else { panic!("expected add") };
        layer.update_fields(&snapshot.id, &[(AnnotationField::Label, json!("Market"))]);
        assert_eq!(layer.get(&snapshot.id).unwrap().label, "Market");
    }

    #[test]
    fn test_undo_redo_through_history() {
        let mut layer = AnnotationLayer::new();
        let mut history = History::new();

        let add = layer.add(AnnotationFeature::new(point(0.0, 0.0)));
        let id = match &add {
            HistoryEntry::Add { snapshot } => snapshot.id.clone(),
            _ => unreachable!(),
        };
        history.push(add);
        history.push(
            layer
                .update_fields(&id, &[(AnnotationField::Color, json!("#ff0000")), (AnnotationField::Hidden, json!(true))])
                .unwrap(),
        );
        history.push(layer.replace_geometry(&id, point(5.0, 5.0)).unwrap());

        let e = history.undo().unwrap();
        layer.apply_undo(&e);
        assert_eq!(layer.get(&id).unwrap().geometry, point(0.0, 0.0));

        let e = history.undo().unwrap();
        layer.apply_undo(&e);
        let f = layer.get(&id).unwrap();
        assert_eq!(f.color, "#2563eb");
        assert!(!f.hidden);

        let e = history.undo().unwrap();
        layer.apply_undo(&e);
        assert!(layer.is_empty());

        for _ in 0..3 {
            let e = history.redo().unwrap();
            layer.apply_redo(&e);
        }
        let f = layer.get(&id).unwrap();
        assert_eq!(f.color, "#ff0000");
        assert_eq!(f.geometry, point(5.0, 5.0));
    }

    #[test]
    fn test_noop_edits_produce_no_entry() {
        let mut layer = AnnotationLayer::new();
        let f = AnnotationFeature::new(point(0.0, 0.0));
        let id = f.id.clone();
        layer.add(f);
        assert!(layer.update_fields(&id, &[(AnnotationField::Label, json!("Untitled"))]).is_none());
        assert!(layer.update_fields(&id, &[(AnnotationField::Hidden, json!("yes"))]).is_none());
        assert!(layer.replace_geometry(&id, point(0.0, 0.0)).is_none());
        assert!(layer.remove("missing").is_none());
        assert!(layer.update_fields("missing", &[]).is_none());
    }

    #[test]
    fn test_remove_clear_and_bulk_add_reverse() {
        let mut layer = AnnotationLayer::new();
        let bulk = layer
            .bulk_add(vec![AnnotationFeature::new(point(0.0, 0.0)), AnnotationFeature::new(point(1.0, 1.0))])
            .unwrap();
        assert_eq!(layer.len(), 2);
        let first = layer.features()[0].id.clone();
        layer.select(Some(&first));

        let del = layer.remove(&first).unwrap();
        assert_eq!(layer.selected_id(), None);
        layer.apply_undo(&del);
        assert_eq!(layer.len(), 2);

        let clear = layer.clear().unwrap();
        assert!(layer.is_empty());
        assert!(layer.clear().is_none());
        layer.apply_undo(&clear);
        assert_eq!(layer.len(), 2);
        layer.apply_redo(&clear);
        assert!(layer.is_empty());

        layer.apply_redo(&bulk);
        assert_eq!(layer.len(), 2);
        layer.apply_undo(&bulk);
        assert!(layer.is_empty());
    }

    #[test]
    fn test_undo_import_restores_overwritten_feature() {
        let mut layer = AnnotationLayer::new();
        let mut original = AnnotationFeature::new(point(0.0, 0.0));
        original.id = "a".into();
        original.label = "Market".into();
        layer.add(original.clone());

        let mut incoming = AnnotationFeature::new(point(3.0, 3.0));
        incoming.id = "a".into();
        incoming.label = "Imported".into();
        let mut twice = incoming.clone();
        twice.label = "Imported again".into();
        let other = AnnotationFeature::new(point(4.0, 4.0));
        let other_id = other.id.clone();

        let bulk = layer.bulk_add(vec![incoming, twice, other]).unwrap();
        assert_eq!(layer.len(), 2);
        assert_eq!(layer.get("a").unwrap().label, "Imported again");

        layer.apply_undo(&bulk);
        assert_eq!(layer.len(), 1);
        assert_eq!(layer.get("a"), Some(&original));
        assert!(layer.get(&other_id).is_none());

        layer.apply_redo(&bulk);
        assert_eq!(layer.len(), 2);
        assert_eq!(layer.get("a").unwrap().label, "Imported again");
    }

    #[test]
    fn test_select_requires_existing_feature() {
        let mut layer = AnnotationLayer::new();
        layer.select(Some("ghost"));
        assert_eq!(layer.selected_id(), None);
    }

    #[test]
    fn test_feature_collection_round_trip() {
        let mut layer = AnnotationLayer::new();
        let mut f = AnnotationFeature::new(point(106.7, 10.77));
        f.label = "Opera House".into();
        f.hidden = true;
        layer.add(f.clone());
        let fc = layer.to_feature_collection();
        assert_eq!(fc["type"], "FeatureCollection");
        assert_eq!(fc["features"][0]["properties"]["label"], "Opera House");

        let restored = AnnotationLayer::from_feature_collection(&fc);
        assert_eq!(restored.features(), &[f]);
    }

    #[test]
    fn test_feature_collection_parse_skips_bad_entries() {
        let fc = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "geometry": null },
                { "type": "Feature", "id": 7, "geometry": { "type": "LineString", "coordinates": [] } },
                "junk"
            ]
        });
        let layer = AnnotationLayer::from_feature_collection(&fc);
        assert_eq!(layer.len(), 1);
        let s = &layer.summaries()[0];
        assert_eq!(s.id, "7");
        assert_eq!(s.kind, "LineString");
        assert_eq!(s.label, "Untitled");
        assert!(AnnotationLayer::from_feature_collection(&json!(null)).is_empty());
    }

    #[test]
    fn test_history_entry_wire_tags() {
        let entry = HistoryEntry::Update {
            id: "a".into(),
            changes: vec![FieldChange {
                field: AnnotationField::Label,
                before: json!("x"),
                after: json!("y"),
            }],
        };
        let v = serde_json::to_value(&entry).unwrap();
        assert_eq!(v["kind"], "update");
        assert_eq!(v["changes"][0]["field"], "label");
        let bulk = serde_json::to_value(HistoryEntry::BulkAdd {
            snapshots: vec![],
            replaced: vec![],
        }).unwrap();
        assert_eq!(bulk["kind"], "bulk-add");
    }
}
