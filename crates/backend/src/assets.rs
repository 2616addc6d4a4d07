use std::path::Path;

use vma_shared::models::MapEntry;

/// The historical map catalog, read once at startup from `maps.json`.
#[derive(Default)]
pub struct Assets {
    pub maps: Vec<MapEntry>,
}

impl Assets {
    pub fn load(assets_dir: &Path) -> Result<Self, String> {
        let maps_path = assets_dir.join("maps.json");

        let maps_data = std::fs::read_to_string(&maps_path)
            .map_err(|e| format!("Failed to read {}: {}", maps_path.display(), e))?;

        let maps: Vec<MapEntry> = serde_json::from_str(&maps_data)
            .map_err(|e| format!("Failed to parse maps.json: {}", e))?;

        let featured = maps.iter().filter(|m| m.is_featured).count();
        tracing::info!(maps = maps.len(), featured, "Loaded map catalog");

        Ok(Assets { maps })
    }

    pub fn find_map(&self, id: &str) -> Option<&MapEntry> {
        self.maps.iter().find(|m| m.id == id)
    }

    /// An empty catalog accepts any map id.
    pub fn accepts_map(&self, id: &str) -> bool {
        self.maps.is_empty() || self.find_map(id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPS: &str = r#"[
        {"id": "saigon-1965", "name": "Saigon 1965", "type": "city", "isFeatured": true, "year": 1965},
        {"id": "hue-1968", "name": "Hue 1968", "bounds": [107.5, 16.4, 107.65, 16.5]}
    ]"#;

    #[test]
    fn test_load_catalog() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("maps.json"), MAPS).unwrap();

        let assets = Assets::load(dir.path()).unwrap();
        assert_eq!(assets.maps.len(), 2);
        let saigon = assets.find_map("saigon-1965").unwrap();
        assert!(saigon.is_featured);
        assert_eq!(saigon.kind, "city");
        assert_eq!(assets.find_map("hue-1968").unwrap().bounds, Some([107.5, 16.4, 107.65, 16.5]));
        assert!(assets.find_map("hanoi").is_none());
    }

    #[test]
    fn test_missing_catalog_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Assets::load(dir.path()).err().unwrap();
        assert!(err.contains("maps.json"));
    }

    #[test]
    fn test_accepts_map() {
        assert!(Assets::default().accepts_map("anything"));
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("maps.json"), MAPS).unwrap();
        let assets = Assets::load(dir.path()).unwrap();
        assert!(assets.accepts_map("hue-1968"));
        assert!(!assets.accepts_map("hanoi"));
    }
}
