use crate::config::layout_config::{LayoutConfig, LAYOUT_CONFIG_HEADER};
use crate::config::parser::{ConfigParseError, ConfigParser};
use crate::config::settings::{AppSettings, SettingsError};
use crate::models::Configuration;
use crate::services::title_matcher::title_matches;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

const CONFIG_PREFIX: &str = "config_";
const CONFIG_EXTENSION: &str = "toml";
const SETTINGS_FILE: &str = "settings.toml";
const LAYOUT_CONFIG_FILE: &str = "layout_config.toml";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Configuration '{name}' is invalid: {source}")]
    Configuration {
        name: String,
        #[source]
        source: ConfigParseError,
    },
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("Invalid configuration name '{0}'")]
    InvalidName(String),
    #[error("Configuration '{0}' does not exist")]
    NotFound(String),
}

#[derive(Debug, Clone)]
pub struct ConfigStoreConfig {
    pub base_dir: PathBuf,
}

impl Default for ConfigStoreConfig {
    fn default() -> Self {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            base_dir: base.join("ultrawide"),
        }
    }
}

/// A configuration loaded from disk, with the repairs made while parsing
#[derive(Debug, Clone)]
pub struct LoadedConfiguration {
    pub configuration: Configuration,
    pub warnings: Vec<String>,
}

/// File-backed store for layout configurations and application settings.
///
/// ```text
/// <base_dir>/configs/config_<name>.toml
/// <base_dir>/settings/settings.toml
/// <base_dir>/settings/layout_config.toml
/// ```
pub struct ConfigStore {
    config: ConfigStoreConfig,
}

impl ConfigStore {
    pub fn new(config: ConfigStoreConfig) -> Self {
        Self { config }
    }

    pub fn at(base_dir: impl Into<PathBuf>) -> Self {
        Self::new(ConfigStoreConfig {
            base_dir: base_dir.into(),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.config.base_dir
    }

    pub fn configs_dir(&self) -> PathBuf {
        self.config.base_dir.join("configs")
    }

    pub fn settings_dir(&self) -> PathBuf {
        self.config.base_dir.join("settings")
    }

    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(self.configs_dir())?;
        fs::create_dir_all(self.settings_dir())?;
        Ok(())
    }

    /// Names of stored configurations, sorted
    pub fn list_configurations(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.configs_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(CONFIG_EXTENSION) {
                continue;
            }
            let name = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.strip_prefix(CONFIG_PREFIX));
            if let Some(name) = name.filter(|name| !name.is_empty()) {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    pub fn load_configuration(&self, name: &str) -> Result<LoadedConfiguration, StoreError> {
        let path = self.configuration_path(name)?;
        if !path.exists() {
            return Err(StoreError::NotFound(name.to_string()));
        }

        let mut parser = ConfigParser::new();
        let configuration = parser
            .parse_file(name, &path)
            .map_err(|source| StoreError::Configuration {
                name: name.to_string(),
                source,
            })?;

        debug!(
            "Loaded configuration '{}' with {} entr(ies)",
            name,
            configuration.entries.len()
        );
        Ok(LoadedConfiguration {
            configuration,
            warnings: parser.warnings().to_vec(),
        })
    }

    /// Load every stored configuration in listing order, skipping broken files
    pub fn load_all(&self) -> Result<Vec<Configuration>, StoreError> {
        let mut configurations = Vec::new();
        for name in self.list_configurations()? {
            match self.load_configuration(&name) {
                Ok(loaded) => configurations.push(loaded.configuration),
                Err(err) => warn!("Skipping configuration '{}': {}", name, err),
            }
        }
        Ok(configurations)
    }

    /// Save with entries ordered left to right by x.
    ///
    /// When one entry's pattern contains another's, declaration order decides
    /// which entry claims a shared window, so the order is kept as given.
    pub fn save_configuration(&self, configuration: &Configuration) -> Result<PathBuf, StoreError> {
        let path = self.configuration_path(&configuration.name)?;

        let mut sorted = configuration.clone();
        if has_overlapping_patterns(&sorted) {
            debug!(
                "Keeping declaration order of '{}', its patterns overlap",
                configuration.name
            );
        } else {
            sorted.entries.sort_by_key(|entry| entry.position.x);
        }

        let content = ConfigParser::serialize_configuration(&sorted).map_err(|source| {
            StoreError::Configuration {
                name: configuration.name.clone(),
                source,
            }
        })?;
        write_atomic(&path, &content)?;

        info!("Saved configuration '{}' to {}", configuration.name, path.display());
        Ok(path)
    }

    /// Returns whether a file was removed
    pub fn delete_configuration(&self, name: &str) -> Result<bool, StoreError> {
        let path = self.configuration_path(name)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        info!("Deleted configuration '{}'", name);
        Ok(true)
    }

    /// Settings from disk, written with defaults on first use
    pub fn load_settings(&self) -> Result<AppSettings, StoreError> {
        let path = self.settings_dir().join(SETTINGS_FILE);
        if !path.exists() {
            let settings = AppSettings::default();
            self.save_settings(&settings)?;
            return Ok(settings);
        }

        let content = fs::read_to_string(path)?;
        let settings: AppSettings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &AppSettings) -> Result<(), StoreError> {
        settings.validate()?;
        let content = toml::to_string_pretty(settings)?;
        write_atomic(&self.settings_dir().join(SETTINGS_FILE), &content)?;
        Ok(())
    }

    /// Layout config from disk, created with a commented header when missing
    pub fn load_layout_config(&self) -> Result<LayoutConfig, StoreError> {
        let path = self.settings_dir().join(LAYOUT_CONFIG_FILE);
        if !path.exists() {
            write_atomic(&path, LAYOUT_CONFIG_HEADER)?;
            return Ok(LayoutConfig::default());
        }

        let content = fs::read_to_string(path)?;
        let (config, _warnings) = LayoutConfig::parse(&content)?;
        Ok(config)
    }

    fn configuration_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        let trimmed = name.trim();
        let hostile = |c: char| matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*');
        if trimmed.is_empty()
            || trimmed != name
            || name.contains("..")
            || name.chars().any(|c| hostile(c) || c.is_control())
        {
            return Err(StoreError::InvalidName(name.to_string()));
        }

        Ok(self
            .configs_dir()
            .join(format!("{}{}.{}", CONFIG_PREFIX, name, CONFIG_EXTENSION)))
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(ConfigStoreConfig::default())
    }
}

/// Write through a temporary file and rename it into place
fn write_atomic(path: &Path, content: &str) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content)?;
    fs::rename(temp_path, path)?;
    Ok(())
}

fn has_overlapping_patterns(configuration: &Configuration) -> bool {
    let entries = &configuration.entries;
    entries.iter().enumerate().any(|(index, entry)| {
        entries[index + 1..].iter().any(|other| {
            title_matches(&entry.name, &other.name) || title_matches(&other.name, &entry.name)
        })
    })
}
