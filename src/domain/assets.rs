//! Mapping of logical client asset names to the URLs they are served from.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Logical name of the client entry script that takes over rendering.
pub const BOOTSTRAP_SCRIPT: &str = "main.js";
/// Logical name of the global stylesheet.
pub const MAIN_STYLESHEET: &str = "main.css";

/// Immutable asset manifest, loaded once at startup and shared by every request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct AssetManifest {
    entries: BTreeMap<String, String>,
}

impl AssetManifest {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(name, url)| (name.into(), url.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// URL of the client bootstrap script, if the manifest maps one.
    pub fn bootstrap_script(&self) -> Option<&str> {
        self.get(BOOTSTRAP_SCRIPT)
    }

    pub fn stylesheet(&self) -> Option<&str> {
        self.get(MAIN_STYLESHEET)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, url)| (name.as_str(), url.as_str()))
    }
}

impl Default for AssetManifest {
    fn default() -> Self {
        Self::new([(BOOTSTRAP_SCRIPT, "/main.js"), (MAIN_STYLESHEET, "/main.css")])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_manifest_maps_client_entry_points() {
        let manifest = AssetManifest::default();
        assert_eq!(manifest.bootstrap_script(), Some("/main.js"));
        assert_eq!(manifest.stylesheet(), Some("/main.css"));
        assert_eq!(manifest.iter().count(), 2);
    }

    #[test]
    fn manifest_deserializes_from_flat_json_object() {
        let manifest: AssetManifest =
            serde_json::from_str(r#"{"main.js": "/static/main.3f9a.js"}"#).expect("valid json");
        assert_eq!(manifest.bootstrap_script(), Some("/static/main.3f9a.js"));
        assert_eq!(manifest.stylesheet(), None);
    }
}
