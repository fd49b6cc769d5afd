//! Static assets served next to the temperature endpoints.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// A preloaded file and its content type.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub bytes: Bytes,
    pub content_type: String,
}

/// Lookup of static assets by request suffix (e.g. `/style.css`).
pub trait AssetStore: Send + Sync {
    /// Returns the asset registered under `path`, if any.
    fn get(&self, path: &str) -> Option<&Asset>;
}

/// Mapping of a request suffix to a file on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSpec {
    /// Suffix after the base URL, starting with `/`.
    pub route: String,
    /// File path, relative to the asset directory.
    pub file: String,
    /// Content type; inferred from the extension when absent.
    #[serde(default)]
    pub content_type: Option<String>,
}

impl AssetSpec {
    pub fn new(route: &str, file: &str) -> Self {
        Self {
            route: route.to_string(),
            file: file.to_string(),
            content_type: None,
        }
    }
}

/// In-memory asset store, loaded once at startup.
#[derive(Debug, Default, Clone)]
pub struct StaticAssets {
    entries: HashMap<String, Asset>,
}

impl StaticAssets {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every asset in `specs` from `dir`.
    ///
    /// Files that cannot be read are skipped with a warning so a missing
    /// dashboard file never keeps the API from starting.
    pub fn load(dir: &Path, specs: &[AssetSpec]) -> Self {
        let mut assets = Self::new();
        for spec in specs {
            let path = dir.join(&spec.file);
            match std::fs::read(&path) {
                Ok(data) => {
                    let content_type = spec
                        .content_type
                        .clone()
                        .unwrap_or_else(|| content_type_for(&spec.file).to_string());
                    debug!(
                        route = %spec.route,
                        path = %path.display(),
                        size = data.len(),
                        "Loaded static asset"
                    );
                    assets.insert(&spec.route, data, &content_type);
                }
                Err(e) => {
                    warn!(
                        route = %spec.route,
                        path = %path.display(),
                        error = %e,
                        "Skipping static asset"
                    );
                }
            }
        }
        assets
    }

    /// Registers an asset under `route`.
    pub fn insert(&mut self, route: &str, data: impl Into<Bytes>, content_type: &str) {
        self.entries.insert(
            route.to_string(),
            Asset {
                bytes: data.into(),
                content_type: content_type.to_string(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AssetStore for StaticAssets {
    fn get(&self, path: &str) -> Option<&Asset> {
        self.entries.get(path)
    }
}

/// Guesses a content type from a file name.
pub fn content_type_for(file: &str) -> &'static str {
    let extension = Path::new(file)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("js") => "text/javascript; charset=utf-8",
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("dist/chart.js"), "text/javascript; charset=utf-8");
        assert_eq!(content_type_for("test.html"), "text/html; charset=utf-8");
        assert_eq!(content_type_for("favicon.ICO"), "image/x-icon");
        assert_eq!(content_type_for("style.css"), "text/css; charset=utf-8");
        assert_eq!(content_type_for("blob"), "application/octet-stream");
    }

    #[test]
    fn test_insert_and_get() {
        let mut assets = StaticAssets::new();
        assets.insert("/style.css", "body {}", "text/css; charset=utf-8");

        let asset = assets.get("/style.css").unwrap();
        assert_eq!(asset.bytes, Bytes::from_static(b"body {}"));
        assert_eq!(asset.content_type, "text/css; charset=utf-8");
        assert!(assets.get("/missing.css").is_none());
    }

    #[test]
    fn test_load_skips_missing_files() {
        let dir = std::env::temp_dir().join(format!("cputemp-assets-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("test.html"), "<html></html>").unwrap();

        let specs = vec![
            AssetSpec::new("/test", "test.html"),
            AssetSpec::new("/favicon.ico", "favicon.ico"),
            AssetSpec {
                route: "/data".to_string(),
                file: "test.html".to_string(),
                content_type: Some("text/plain".to_string()),
            },
        ];
        let assets = StaticAssets::load(&dir, &specs);

        assert_eq!(assets.len(), 2);
        assert_eq!(
            assets.get("/test").unwrap().content_type,
            "text/html; charset=utf-8"
        );
        assert_eq!(assets.get("/data").unwrap().content_type, "text/plain");
        assert!(assets.get("/favicon.ico").is_none());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
