//! Coordinator configuration.
//!
//! The only startup knob is the set of enabled cohort tags. A processor whose
//! tag is not enabled is never instantiated.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tag given to processors that do not choose one.
pub const DEFAULT_TAG: &str = "Untagged";

/// Environment variable holding a comma-separated list of enabled tags.
pub const ENABLED_TAGS_ENV: &str = "ARMS_ENABLED_TAGS";

/// Startup configuration for a [`Coordinator`](crate::Coordinator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Cohort tags whose processors are instantiated.
    pub enabled_tags: Vec<String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            enabled_tags: vec![DEFAULT_TAG.to_string()],
        }
    }
}

impl CoordinatorConfig {
    /// A config with only [`DEFAULT_TAG`] enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A config with exactly the given tags enabled.
    #[must_use]
    pub fn with_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled_tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    /// Enable one more tag.
    #[must_use]
    pub fn enable(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.enabled_tags.contains(&tag) {
            self.enabled_tags.push(tag);
        }
        self
    }

    /// Returns `true` if processors tagged `tag` should be instantiated.
    #[must_use]
    pub fn is_enabled(&self, tag: &str) -> bool {
        self.enabled_tags.iter().any(|t| t == tag)
    }

    /// Parse a JSON config document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed input.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Read tags from [`ENABLED_TAGS_ENV`], falling back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var(ENABLED_TAGS_ENV)
            .map(|value| Self::parse_tag_list(&value))
            .unwrap_or_default()
    }

    /// Parse a comma-separated tag list. Blank entries are dropped; an
    /// entirely blank list yields the default config.
    #[must_use]
    pub fn parse_tag_list(value: &str) -> Self {
        let tags: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        if tags.is_empty() {
            Self::default()
        } else {
            Self { enabled_tags: tags }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_enables_untagged() {
        let config = CoordinatorConfig::default();
        assert!(config.is_enabled(DEFAULT_TAG));
        assert!(!config.is_enabled("debug"));
    }

    #[test]
    fn test_enable_is_idempotent() {
        let config = CoordinatorConfig::new().enable("debug").enable("debug");
        assert_eq!(config.enabled_tags, vec!["Untagged", "debug"]);
    }

    #[test]
    fn test_json_roundtrip_fields() {
        let config = CoordinatorConfig::from_json_str(r#"{"enabled_tags":["ai","render"]}"#).unwrap();
        assert!(config.is_enabled("ai"));
        assert!(!config.is_enabled(DEFAULT_TAG));
    }

    #[test]
    fn test_json_missing_field_uses_default() {
        let config = CoordinatorConfig::from_json_str("{}").unwrap();
        assert_eq!(config, CoordinatorConfig::default());
    }

    #[test]
    fn test_json_malformed() {
        assert!(matches!(
            CoordinatorConfig::from_json_str("{"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = CoordinatorConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_parse_tag_list() {
        let config = CoordinatorConfig::parse_tag_list(" Untagged, debug ,,");
        assert_eq!(config.enabled_tags, vec!["Untagged", "debug"]);
        assert_eq!(CoordinatorConfig::parse_tag_list(" , "), CoordinatorConfig::default());
    }
}
