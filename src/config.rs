//! Configuration loading and management
//!
//! Handles parsing of `.dayplan.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::search::{FuzzySearch, SearchAlgorithm};
use crate::view::ViewKind;

/// Name of the config file at the planner root
pub const CONFIG_FILE: &str = ".dayplan.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Actor configuration
    #[serde(default)]
    pub actor: ActorConfig,

    /// Default view state
    #[serde(default)]
    pub view: ViewConfig,

    /// Fuzzy search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Suggestion configuration
    #[serde(default)]
    pub suggest: SuggestConfig,

    /// Analytics configuration
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Default list seeded on init
    #[serde(default)]
    pub lists: ListsConfig,

    /// Change event output
    #[serde(default)]
    pub events: EventsConfig,
}

/// Actor-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Default actor name when none specified
    #[serde(default = "default_actor")]
    pub default: String,
}

fn default_actor() -> String {
    "me".to_string()
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            default: default_actor(),
        }
    }
}

/// View defaults for `task ls`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default = "default_view")]
    pub default: ViewKind,

    #[serde(default = "default_true")]
    pub show_completed: bool,
}

fn default_view() -> ViewKind {
    ViewKind::Today
}

fn default_true() -> bool {
    true
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            default: default_view(),
            show_completed: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub algorithm: SearchAlgorithm,

    /// Maximum normalized distance still counted as a match
    #[serde(default = "default_search_threshold")]
    pub threshold: f64,
}

fn default_search_threshold() -> f64 {
    crate::search::DEFAULT_THRESHOLD
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            algorithm: SearchAlgorithm::default(),
            threshold: default_search_threshold(),
        }
    }
}

impl SearchConfig {
    pub fn build(&self) -> FuzzySearch {
        FuzzySearch::with_algorithm(self.algorithm, self.threshold)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestConfig {
    #[serde(default = "default_suggest_count")]
    pub count: usize,
}

fn default_suggest_count() -> usize {
    3
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            count: default_suggest_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Trailing window for the productivity trend, in days
    #[serde(default = "default_window_days")]
    pub window_days: u32,
}

fn default_window_days() -> u32 {
    30
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListsConfig {
    #[serde(default = "default_list_name")]
    pub default_name: String,

    #[serde(default = "default_list_color")]
    pub default_color: String,

    #[serde(default = "default_list_emoji")]
    pub default_emoji: String,
}

fn default_list_name() -> String {
    "Inbox".to_string()
}

fn default_list_color() -> String {
    "#EF4444".to_string()
}

fn default_list_emoji() -> String {
    "📥".to_string()
}

impl Default for ListsConfig {
    fn default() -> Self {
        Self {
            default_name: default_list_name(),
            default_color: default_list_color(),
            default_emoji: default_list_emoji(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventsConfig {
    /// `-` for stdout, otherwise a file path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

impl Config {
    /// Load configuration from a `.dayplan.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the planner root, or return defaults when absent
    pub fn load_from_root(root: &Path) -> Result<Self> {
        let config_path = Self::path_for(root);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn path_for(root: &Path) -> PathBuf {
        root.join(CONFIG_FILE)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.actor.default.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "actor.default cannot be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.search.threshold) {
            return Err(Error::InvalidConfig(format!(
                "search.threshold must be within 0.0..=1.0, got {}",
                self.search.threshold
            )));
        }
        if self.suggest.count == 0 {
            return Err(Error::InvalidConfig(
                "suggest.count must be > 0".to_string(),
            ));
        }
        if !(1..=366).contains(&self.analytics.window_days) {
            return Err(Error::InvalidConfig(format!(
                "analytics.window_days must be within 1..=366, got {}",
                self.analytics.window_days
            )));
        }
        if self.lists.default_name.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "lists.default_name cannot be empty".to_string(),
            ));
        }
        crate::model::validate_color(&self.lists.default_color)
            .map_err(|err| Error::InvalidConfig(format!("lists.default_color: {err}")))?;
        if let Some(destination) = &self.events.destination {
            if destination.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "events.destination cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
