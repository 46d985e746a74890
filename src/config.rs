//! Settings for the cookie triage workflow.
//!
//! Layers, later ones winning: built-in defaults, then
//! `.cookie-triage/settings.toml` found by walking up from the current
//! directory, then `CT_` environment variables.
//!
//! # Environment Variables
//!
//! Nested keys are joined with a double underscore:
//! - `CT_CRAWLER__ENABLED=false` sets `crawler.enabled`
//! - `CT_STAGING__BACKEND=memory` sets `staging.backend`
//! - `CT_LOGGING__FILTER=cookie_triage=debug` sets `logging.filter`

use crate::error::{WorkflowError, WorkflowResult};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory holding settings, catalog and staged solutions
pub const CONFIG_DIR: &str = ".cookie-triage";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Workspace root directory (automatically detected)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(default)]
    pub staging: StagingConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CrawlerConfig {
    /// Found cookies are only triaged for projects the crawler runs on
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StagingBackend {
    /// Lost when the process exits
    Memory,
    /// One JSON file per project under `staging.directory`
    File,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StagingConfig {
    #[serde(default = "default_staging_backend")]
    pub backend: StagingBackend,

    #[serde(default = "default_staging_directory")]
    pub directory: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CatalogConfig {
    /// JSON catalog document used by the command line
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_filter")]
    pub filter: String,

    #[serde(default = "default_true")]
    pub ansi: bool,
}

fn default_version() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_staging_backend() -> StagingBackend {
    StagingBackend::File
}
fn default_staging_directory() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("staging")
}
fn default_catalog_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("catalog.json")
}
fn default_log_filter() -> String {
    "cookie_triage=info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            workspace_root: None,
            debug: false,
            crawler: CrawlerConfig::default(),
            staging: StagingConfig::default(),
            catalog: CatalogConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            backend: default_staging_backend(),
            directory: default_staging_directory(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            ansi: default_true(),
        }
    }
}

/// `CT_` variables with `__` as the nesting separator
fn env_provider() -> Env {
    Env::prefixed("CT_").map(|key| key.as_str().to_lowercase().replace("__", ".").into())
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));

        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            .merge(env_provider())
            .extract()
            .map_err(Box::new)
            .map(|mut settings: Settings| {
                if settings.workspace_root.is_none() {
                    settings.workspace_root = Self::workspace_root();
                }
                settings
            })
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(env_provider())
            .extract()
            .map_err(Box::new)
    }

    /// Find the settings file by looking for the config directory
    /// from the current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(CONFIG_DIR).join("settings.toml"))
    }

    /// Get the workspace root directory (where the config directory is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .find(|ancestor| ancestor.join(CONFIG_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Found cookies are not triaged while the crawler is switched off
    pub fn ensure_crawler_enabled(&self) -> WorkflowResult<()> {
        if self.crawler.enabled {
            Ok(())
        } else {
            Err(WorkflowError::CrawlerDisabled)
        }
    }

    /// Resolve a configured path against the workspace root
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.workspace_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file with helpful comments
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        Self::init_config_file_in(Path::new("."), force)
    }

    pub fn init_config_file_in(
        root: &Path,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = root.join(CONFIG_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = r#"# Cookie triage configuration

# Version of the configuration schema
version = 1

# Global debug mode
debug = false

[crawler]
# Found cookies are only triaged while the crawler is enabled
enabled = true

[staging]
# "file" keeps staged solutions between runs, "memory" drops them on exit
backend = "file"
directory = ".cookie-triage/staging"

[catalog]
# Catalog document (projects, categories, providers, cookies, crawl results)
path = ".cookie-triage/catalog.json"

[logging]
# tracing filter directive; RUST_LOG takes precedence
filter = "cookie_triage=info"
ansi = true
"#;

        std::fs::write(&config_path, template)?;
        Ok(config_path)
    }
}
