use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Config file at {config_path} lists no spaces to convert")]
    NoSpaces { config_path: PathBuf },
}

/// Settings for a page conversion run.
///
/// ```toml
/// export_dir = "~/confluence-export"
/// output_dir = "/srv/moin/data/pages"
/// users_dir = "/srv/moin/data/user"
///
/// [spaces]
/// DOC = "Documentation"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Unpacked export holding `entities.xml` and `attachments/`.
    pub export_dir: PathBuf,
    /// MoinMoin `data/pages` directory.
    pub output_dir: PathBuf,
    /// MoinMoin `data/user` directory.
    pub users_dir: PathBuf,
    #[serde(default = "default_user")]
    pub default_user: String,
    #[serde(default = "default_comment")]
    pub comment: String,
    /// Text put above every page; `{date}` becomes the conversion time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_prefix: Option<String>,
    /// Old space key to new space key. Only these spaces are converted.
    #[serde(default)]
    pub spaces: BTreeMap<String, String>,
}

fn default_user() -> String {
    "unknown".to_string()
}

fn default_comment() -> String {
    "Converted from Confluence".to_string()
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        if config.spaces.is_empty() {
            return Err(ConfigError::NoSpaces {
                config_path: config_path.to_path_buf(),
            });
        }

        // Expand shell variables and tilde in the loaded paths
        for path in [
            &mut config.export_dir,
            &mut config.output_dir,
            &mut config.users_dir,
        ] {
            if let Some(expanded) = Self::expand_path(path) {
                *path = expanded;
            }
        }

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/confluence-moin");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    /// `entities.xml` inside the export directory.
    pub fn entities_path(&self) -> PathBuf {
        self.export_dir.join("entities.xml")
    }

    /// Old space keys, the spaces to convert.
    pub fn space_keys(&self) -> impl Iterator<Item = &str> {
        self.spaces.keys().map(String::as_str)
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}
