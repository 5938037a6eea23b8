//! Session configuration.

use serde::Deserialize;

/// Tunables of a [`Session`](crate::session::Session).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Suffix identifying the entry document (matched case-insensitively).
    pub entry_document: String,
    /// Attributes whose values are treated as resource references.
    pub resource_attributes: Vec<String>,
    /// Rewrite documents before writing them into the surface.
    pub rewrite_documents: bool,
    /// Substitute quoted store paths inside inline scripts.
    pub rewrite_inline_scripts: bool,
    /// Tag whose `src` redirects the entry document to another in-store document.
    pub redirect_tag: String,
    pub network: NetworkConfig,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            entry_document: "index.html".to_string(),
            resource_attributes: ["src", "href", "poster", "data"]
                .into_iter()
                .map(String::from)
                .collect(),
            rewrite_documents: true,
            rewrite_inline_scripts: true,
            redirect_tag: "iwe".to_string(),
            network: NetworkConfig::default(),
        }
    }
}

impl FrameConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Settings for the real network primitives.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub timeout_secs: u64,
    pub max_retry: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retry: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FrameConfig::default();
        assert_eq!(config.entry_document, "index.html");
        assert_eq!(config.resource_attributes, ["src", "href", "poster", "data"]);
        assert!(config.rewrite_documents);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = FrameConfig::from_json(
            r#"{"entry_document": "main.html", "network": {"max_retry": 2}}"#,
        )
        .unwrap();
        assert_eq!(config.entry_document, "main.html");
        assert_eq!(config.network.max_retry, 2);
        assert_eq!(config.network.timeout_secs, 30);
        assert_eq!(config.redirect_tag, "iwe");
    }
}
