use std::path::PathBuf;

pub struct Config {
    pub port: u16,
    pub db_path: PathBuf,
    pub assets_dir: PathBuf,
    /// Built frontend bundle; `index.html` here backs the SPA routes.
    pub dist_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| format!("Invalid PORT {:?}: {}", raw, e))?,
            None => 3000,
        };
        let path = |key: &str, default: &str| {
            PathBuf::from(lookup(key).unwrap_or_else(|| default.to_string()))
        };

        Ok(Config {
            port,
            db_path: path("DB_PATH", "data/archive.redb"),
            assets_dir: path("ASSETS_DIR", "assets"),
            dist_dir: path("DIST_DIR", "dist"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_path, PathBuf::from("data/archive.redb"));
        assert_eq!(config.assets_dir, PathBuf::from("assets"));
        assert_eq!(config.dist_dir, PathBuf::from("dist"));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("DB_PATH", "/tmp/x.redb"),
            ("ASSETS_DIR", "/srv/assets"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_path, PathBuf::from("/tmp/x.redb"));
        assert_eq!(config.assets_dir, PathBuf::from("/srv/assets"));
    }

    #[test]
    fn test_bad_port() {
        assert!(Config::from_lookup(lookup(&[("PORT", "eighty")])).is_err());
    }
}
