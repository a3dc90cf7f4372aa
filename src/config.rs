//! Runtime configuration read from the environment.
//!
//! | Variable | Default |
//! |---|---|
//! | `FORUM_TREE_DATA` | `forum_tree_data` |
//! | `FORUM_TREE_TITLE` | `Phorum` |
//! | `FORUM_TREE_DEFAULT_TEMPLATE` | `emerald` |
//! | `FORUM_TREE_DEFAULT_LANGUAGE` | `english` |

use crate::error::{ForumError, Result};
use std::path::PathBuf;
use tracing::debug;

/// Default data directory name.
pub const DEFAULT_DATA_DIR: &str = "forum_tree_data";

/// Default site title, used as the name of the synthetic root node.
pub const DEFAULT_TITLE: &str = "Phorum";

/// Template used when neither the node nor its inheritance source sets one.
pub const DEFAULT_TEMPLATE: &str = "emerald";

/// Language used when neither the node nor its inheritance source sets one.
pub const DEFAULT_LANGUAGE: &str = "english";

const ENV_DATA_DIR: &str = "FORUM_TREE_DATA";
const ENV_TITLE: &str = "FORUM_TREE_TITLE";
const ENV_DEFAULT_TEMPLATE: &str = "FORUM_TREE_DEFAULT_TEMPLATE";
const ENV_DEFAULT_LANGUAGE: &str = "FORUM_TREE_DEFAULT_LANGUAGE";

/// Configuration shared by the storage backends, the tree service and the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForumConfig {
    /// Directory holding the RocksDB database.
    pub data_dir: PathBuf,
    /// Site title, shown as the name of the root node in forum paths.
    pub title: String,
    /// Schema default for the `template` field.
    pub default_template: String,
    /// Schema default for the `language` field.
    pub default_language: String,
}

impl Default for ForumConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            title: DEFAULT_TITLE.to_string(),
            default_template: DEFAULT_TEMPLATE.to_string(),
            default_language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl ForumConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// Unset variables fall back to their defaults. Variables that are set
    /// but blank are rejected, since an empty template or title would end up
    /// in every stored record.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let read = |key: &str, fallback: String| -> Result<String> {
            match lookup(key) {
                Some(value) if value.trim().is_empty() => Err(ForumError::config(format!(
                    "{} is set but empty",
                    key
                ))),
                Some(value) => Ok(value.trim().to_string()),
                None => Ok(fallback),
            }
        };

        let config = Self {
            data_dir: PathBuf::from(read(
                ENV_DATA_DIR,
                defaults.data_dir.to_string_lossy().into_owned(),
            )?),
            title: read(ENV_TITLE, defaults.title)?,
            default_template: read(ENV_DEFAULT_TEMPLATE, defaults.default_template)?,
            default_language: read(ENV_DEFAULT_LANGUAGE, defaults.default_language)?,
        };

        debug!(
            data_dir = %config.data_dir.display(),
            title = %config.title,
            template = %config.default_template,
            language = %config.default_language,
            "Loaded forum configuration"
        );

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_unset() {
        let config = ForumConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ForumConfig::default());
        assert_eq!(config.title, "Phorum");
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FORUM_TREE_DATA", "/var/lib/forums"),
            ("FORUM_TREE_TITLE", " My Board "),
            ("FORUM_TREE_DEFAULT_LANGUAGE", "dutch"),
        ]
        .into_iter()
        .collect();

        let config = ForumConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/forums"));
        assert_eq!(config.title, "My Board");
        assert_eq!(config.default_language, "dutch");
        assert_eq!(config.default_template, DEFAULT_TEMPLATE);
    }

    #[test]
    fn test_blank_value_rejected() {
        let result = ForumConfig::from_lookup(|k| {
            (k == "FORUM_TREE_TITLE").then(|| "   ".to_string())
        });
        assert!(matches!(result, Err(ForumError::Config(_))));
    }
}
