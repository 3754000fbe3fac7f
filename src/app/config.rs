//! Configuration Management

use crate::generator::replicate::{DEFAULT_API_BASE, DEFAULT_MODEL_VERSION, DEFAULT_TOKEN_ENV};
use crate::generator::{GenerationOptions, OutputFormat, ReplicateSettings, RetryPolicy};
use crate::grid::{GazeGrid, DEFAULT_INDEX_FILE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Gaze coordinate range
    #[serde(default)]
    pub grid: GridConfig,
    /// Where and how assets are written
    #[serde(default)]
    pub output: OutputConfig,
    /// Hosted model settings
    #[serde(default)]
    pub model: ModelConfig,
}

/// Grid configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Square output size in pixels
    pub size: u32,
    pub format: OutputFormat,
    pub index_file: String,
}

/// Model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub api_base: String,
    pub version: String,
    /// Environment variable holding the API token
    pub token_env: String,
    /// Head rotation at the edge of the pupil range
    pub head_rotation_deg: f64,
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub max_wait_secs: u64,
    pub max_retries: u32,
    /// Requests in flight at once
    pub concurrency: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            min: -15.0,
            max: 15.0,
            step: 3.0,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("gaze_output"),
            size: 256,
            format: OutputFormat::Webp,
            index_file: DEFAULT_INDEX_FILE.to_string(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            version: DEFAULT_MODEL_VERSION.to_string(),
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            head_rotation_deg: 10.0,
            timeout_secs: 120,
            poll_interval_ms: 1000,
            max_wait_secs: 300,
            max_retries: 3,
            concurrency: 1,
        }
    }
}

impl Config {
    /// Validate config values are within acceptable ranges.
    /// Returns Ok(()) if valid, or Err with a description of the first invalid field.
    pub fn validate(&self) -> Result<(), crate::Error> {
        // Grid bounds and step share the grid's own checks
        GazeGrid::new(self.grid.min, self.grid.max, self.grid.step)
            .map_err(|e| crate::Error::Config(e.to_string()))?;

        if self.output.size == 0 || self.output.size > 4096 {
            return Err(crate::Error::Config(format!(
                "output.size must be in [1, 4096], got {}", self.output.size
            )));
        }
        if self.output.index_file.trim().is_empty() {
            return Err(crate::Error::Config("output.index_file must not be empty".to_string()));
        }
        if self.model.api_base.trim().is_empty() {
            return Err(crate::Error::Config("model.api_base must not be empty".to_string()));
        }
        if self.model.version.trim().is_empty() {
            return Err(crate::Error::Config("model.version must not be empty".to_string()));
        }
        if self.model.token_env.trim().is_empty() {
            return Err(crate::Error::Config("model.token_env must not be empty".to_string()));
        }
        if !(0.0..=crate::generator::replicate::ROTATION_LIMIT_DEG).contains(&self.model.head_rotation_deg) {
            return Err(crate::Error::Config(format!(
                "model.head_rotation_deg must be in [0, 20], got {}", self.model.head_rotation_deg
            )));
        }
        if self.model.timeout_secs == 0 {
            return Err(crate::Error::Config("model.timeout_secs must be > 0".to_string()));
        }
        if self.model.poll_interval_ms == 0 {
            return Err(crate::Error::Config("model.poll_interval_ms must be > 0".to_string()));
        }
        if self.model.max_wait_secs == 0 {
            return Err(crate::Error::Config("model.max_wait_secs must be > 0".to_string()));
        }
        if self.model.max_retries == 0 {
            return Err(crate::Error::Config("model.max_retries must be >= 1".to_string()));
        }
        if self.model.concurrency == 0 || self.model.concurrency > 16 {
            return Err(crate::Error::Config(format!(
                "model.concurrency must be in [1, 16], got {}", self.model.concurrency
            )));
        }
        Ok(())
    }

    /// Load config from file
    pub fn load(path: &Path) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from default location
    pub fn load_default() -> Result<Self, crate::Error> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load from `path` if given, else the default location. An explicit
    /// path that does not exist yet yields the defaults.
    pub fn load_from(path: Option<&Path>) -> Result<Self, crate::Error> {
        match path {
            Some(p) if p.exists() => Self::load(p),
            Some(p) => {
                warn!(path = %p.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            None => Self::load_default(),
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<(), crate::Error> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".gaze_grid").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Generate TOML representation
    pub fn to_toml(&self) -> Result<String, crate::Error> {
        toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Read a `section.key` value
    pub fn get(&self, key: &str) -> Result<toml::Value, crate::Error> {
        let (section, field) = split_key(key)?;
        let table = toml::Value::try_from(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        table
            .get(section)
            .and_then(|s| s.get(field))
            .cloned()
            .ok_or_else(|| crate::Error::Config(format!("Unknown config key: {}", key)))
    }

    /// Set a `section.key` value from its command-line text.
    ///
    /// The text is parsed according to the type of the current value and the
    /// result must pass [`validate`](Self::validate); on error `self` is
    /// left unchanged.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<(), crate::Error> {
        let (section, field) = split_key(key)?;
        let current = self.get(key)?;
        let value = parse_like(&current, raw)
            .ok_or_else(|| crate::Error::Config(format!("Invalid value for {}: {}", key, raw)))?;

        let mut table = toml::Value::try_from(&*self).map_err(|e| crate::Error::Config(e.to_string()))?;
        if let Some(section_table) = table.get_mut(section).and_then(|s| s.as_table_mut()) {
            section_table.insert(field.to_string(), value);
        }
        let updated: Config = table
            .try_into()
            .map_err(|e: toml::de::Error| crate::Error::Config(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    pub fn grid(&self) -> Result<GazeGrid, crate::Error> {
        GazeGrid::new(self.grid.min, self.grid.max, self.grid.step)
    }

    pub fn generation_options(&self) -> GenerationOptions {
        let mut options = GenerationOptions::new(&self.output.dir);
        options.size = self.output.size;
        options.format = self.output.format;
        options.index_file = self.output.index_file.clone();
        options.concurrency = self.model.concurrency;
        options
    }

    pub fn replicate_settings(&self, token: impl Into<String>) -> ReplicateSettings {
        let mut settings = ReplicateSettings::new(token);
        settings.api_base = self.model.api_base.trim_end_matches('/').to_string();
        settings.model_version = self.model.version.clone();
        settings.head_rotation_deg = self.model.head_rotation_deg;
        settings.request_timeout = Duration::from_secs(self.model.timeout_secs);
        settings.poll_interval = Duration::from_millis(self.model.poll_interval_ms);
        settings.max_wait = Duration::from_secs(self.model.max_wait_secs);
        settings.retry = RetryPolicy {
            max_attempts: self.model.max_retries,
            ..RetryPolicy::default()
        };
        settings
    }
}

fn split_key(key: &str) -> Result<(&str, &str), crate::Error> {
    key.split_once('.')
        .filter(|(s, f)| !s.is_empty() && !f.is_empty())
        .ok_or_else(|| crate::Error::Config(format!("Config keys look like section.key, got {}", key)))
}

fn parse_like(current: &toml::Value, raw: &str) -> Option<toml::Value> {
    match current {
        toml::Value::Integer(_) => raw.parse::<i64>().ok().map(toml::Value::Integer),
        toml::Value::Float(_) => raw.parse::<f64>().ok().map(toml::Value::Float),
        toml::Value::Boolean(_) => raw.parse::<bool>().ok().map(toml::Value::Boolean),
        _ => Some(toml::Value::String(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.grid.step, 3.0);
        assert_eq!(config.output.size, 256);
        assert_eq!(config.output.format, OutputFormat::Webp);
        assert_eq!(config.model.token_env, "REPLICATE_API_TOKEN");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let toml = Config::default().to_toml().unwrap();
        assert!(toml.contains("[grid]"));
        assert!(toml.contains("[output]"));
        assert!(toml.contains("[model]"));
        assert!(toml.contains("format = \"webp\""));
    }

    #[test]
    fn test_default_path() {
        let path = Config::default_path();
        assert!(path.to_string_lossy().contains(".gaze_grid"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original = Config::default();
        original.grid.step = 2.5;
        original.output.format = OutputFormat::Png;
        original.model.concurrency = 4;

        original.save(&config_path).expect("Failed to save config");
        let loaded = Config::load(&config_path).expect("Failed to load config");
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load(Path::new("/tmp/nonexistent_gaze_config_12345.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_missing_explicit_path_uses_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = Config::load_from(Some(&temp_dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
[grid]
min = -10.0
max = 10.0
step = 5.0
"#,
        )
        .expect("partial config should deserialize");
        assert_eq!(config.grid.step, 5.0);
        assert_eq!(config.output, OutputConfig::default());
        assert_eq!(config.model, ModelConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_grid() {
        let mut config = Config::default();
        config.grid.step = 0.0;
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));

        let mut config = Config::default();
        config.grid.min = 20.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.grid.step = 1e-12;
        assert!(matches!(config.validate(), Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        let mut config = Config::default();
        config.output.size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.model.head_rotation_deg = 45.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.model.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.model.token_env = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_invalid_values() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("bad_config.toml");
        std::fs::write(
            &config_path,
            r#"
[grid]
min = -15.0
max = 15.0
step = -3.0
"#,
        )
        .expect("Failed to write config");
        assert!(Config::load(&config_path).is_err());
    }

    #[test]
    fn test_get_and_set_keys() {
        let mut config = Config::default();
        assert_eq!(config.get("grid.step").unwrap(), toml::Value::Float(3.0));

        config.set("grid.step", "5").unwrap();
        assert_eq!(config.grid.step, 5.0);

        config.set("output.size", "512").unwrap();
        assert_eq!(config.output.size, 512);

        config.set("output.format", "png").unwrap();
        assert_eq!(config.output.format, OutputFormat::Png);
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let mut config = Config::default();
        assert!(config.set("output.size", "big").is_err());
        assert!(config.set("output.format", "gif").is_err());
        assert!(config.set("model.concurrency", "0").is_err());
        assert!(config.set("nope", "1").is_err());
        assert!(config.set("grid.nope", "1").is_err());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_replicate_settings_from_config() {
        let mut config = Config::default();
        config.model.api_base = "http://127.0.0.1:9/v1/".to_string();
        config.model.max_retries = 5;
        config.model.poll_interval_ms = 50;

        let settings = config.replicate_settings("token");
        assert_eq!(settings.api_base, "http://127.0.0.1:9/v1");
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.poll_interval, Duration::from_millis(50));
        assert_eq!(settings.token, "token");
    }

    #[test]
    fn test_generation_options_from_config() {
        let mut config = Config::default();
        config.output.dir = PathBuf::from("faces");
        config.output.size = 128;
        let options = config.generation_options();
        assert_eq!(options.size, 128);
        assert_eq!(options.index_path(), PathBuf::from("faces/index.csv"));
    }
}
