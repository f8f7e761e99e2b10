//! Target configuration loading.
//!
//! A target config is a TOML file `<config_dir>/<name>.toml` merged with
//! `TUBESCOUT_`-prefixed environment variables (`__` separates nested keys,
//! e.g. `TUBESCOUT_OPTIONS__HEADLESS=false`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::types::{HarvestError, HarvestResult};

/// Environment variable prefix for config overrides.
pub const ENV_PREFIX: &str = "TUBESCOUT_";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Full configuration for one extraction target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Extractor type name, resolved through the extractor registry.
    #[serde(rename = "type")]
    pub kind: String,
    pub search: SearchConfig,
    pub selectors: SelectorConfig,
    pub options: OptionsConfig,
    pub output: OutputConfig,
}

/// How search URLs are built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    pub query_param: String,
    pub filter_param: String,
    /// Already percent-encoded; appended verbatim.
    pub filter_value: String,
    /// Origin used to absolutize relative result links.
    pub origin: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.youtube.com/results".to_string(),
            query_param: "search_query".to_string(),
            filter_param: "sp".to_string(),
            filter_value: "EgIQAg%3D%3D".to_string(),
            origin: "https://www.youtube.com".to_string(),
        }
    }
}

/// CSS selectors for the result container and its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub item_container: String,
    pub channel_name: String,
    pub channel_url: String,
    pub subscribers: String,
    pub video_count: String,
    pub description: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            item_container: "ytd-channel-renderer".to_string(),
            channel_name: "#text".to_string(),
            channel_url: "#main-link".to_string(),
            subscribers: "#subscribers".to_string(),
            video_count: "#video-count".to_string(),
            description: "#description".to_string(),
        }
    }
}

/// Browser and page-loading behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsConfig {
    pub headless: bool,
    /// Number of scroll-to-bottom steps after the results appear.
    pub max_scroll: u32,
    pub scroll_pause_ms: u64,
    /// How long to wait for the first result container.
    pub element_timeout_ms: u64,
    pub navigation_timeout_ms: u64,
    pub window_width: u32,
    pub window_height: u32,
    pub lang: String,
    pub user_agent: String,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            headless: true,
            max_scroll: 5,
            scroll_pause_ms: 2000,
            element_timeout_ms: 10_000,
            navigation_timeout_ms: 30_000,
            window_width: 1920,
            window_height: 1080,
            lang: "en-US".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl OptionsConfig {
    pub fn scroll_pause(&self) -> Duration {
        Duration::from_millis(self.scroll_pause_ms)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }
}

/// Structured output settings for the single-query path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: String,
    pub filename: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "csv".to_string(),
            filename: "channels".to_string(),
        }
    }
}

impl TargetConfig {
    /// Parse a config from a TOML string, without environment overrides.
    pub fn from_toml_str(toml: &str) -> HarvestResult<Self> {
        let mut config: Self = Figment::new().merge(Toml::string(toml)).extract()?;
        config.fill_kind();
        Ok(config)
    }

    fn fill_kind(&mut self) {
        if self.kind.trim().is_empty() {
            self.kind = "channel".to_string();
        }
    }
}

/// Loads named target configs from a directory.
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Path of the config file for `name`.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.config_dir.join(format!("{name}.toml"))
    }

    /// Load a config by name (file stem, without extension).
    pub fn load(&self, name: &str) -> HarvestResult<TargetConfig> {
        let path = self.path_for(name);
        if !path.exists() {
            return Err(HarvestError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        let mut config: TargetConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| HarvestError::Config(format!("{}: {e}", path.display())))?;
        config.fill_kind();

        tracing::debug!("Loaded config '{}' from {}", name, path.display());
        Ok(config)
    }

    /// List available config names, sorted.
    pub fn list_configs(&self) -> HarvestResult<Vec<String>> {
        if !self.config_dir.exists() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = std::fs::read_dir(&self.config_dir)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("toml"))
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .map(String::from)
            })
            .collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config = TargetConfig::from_toml_str("").unwrap();
        assert_eq!(config.kind, "channel");
        assert_eq!(config.search.query_param, "search_query");
        assert_eq!(config.selectors.item_container, "ytd-channel-renderer");
        assert!(config.options.headless);
        assert_eq!(config.options.max_scroll, 5);
        assert_eq!(config.output.format, "csv");
    }

    #[test]
    fn test_partial_override() {
        let config = TargetConfig::from_toml_str(
            r#"
            type = "channel"
            [options]
            headless = false
            max_scroll = 2
            scroll_pause_ms = 10
            [selectors]
            channel_url = "a.link"
            "#,
        )
        .unwrap();
        assert!(!config.options.headless);
        assert_eq!(config.options.max_scroll, 2);
        assert_eq!(config.options.scroll_pause(), Duration::from_millis(10));
        assert_eq!(config.selectors.channel_url, "a.link");
        // Untouched keys keep defaults.
        assert_eq!(config.selectors.subscribers, "#subscribers");
        assert_eq!(config.options.window_width, 1920);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = TargetConfig::from_toml_str("[options]\nmax_scroll = \"many\"").unwrap_err();
        assert!(matches!(err, HarvestError::Config(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new(dir.path());
        let err = loader.load("nope").unwrap_err();
        assert!(matches!(err, HarvestError::Config(_)));
    }

    #[test]
    fn test_load_and_list() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("channels.toml"), "type = \"channel\"\n").unwrap();
        std::fs::write(dir.path().join("other.toml"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let loader = ConfigLoader::new(dir.path());
        let config = loader.load("channels").unwrap();
        assert_eq!(config.kind, "channel");
        assert_eq!(loader.list_configs().unwrap(), vec!["channels", "other"]);
    }

    #[test]
    fn test_list_missing_dir() {
        let loader = ConfigLoader::new("/definitely/not/a/dir");
        assert!(loader.list_configs().unwrap().is_empty());
    }
}
