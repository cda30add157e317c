/*
 * Static application settings: which marker extension identifies a project, where the
 * examples repository lives, how storage is accessed on this platform. The settings
 * are read from `config.json` in the application's local configuration directory; a
 * missing file means "use the defaults".
 *
 * The `ConfigManagerOperations` trait keeps the storage location swappable so tests
 * can point it at a temporary directory. `SandboxLayout` describes the private data
 * folders that back the internal drive, the examples and the temporary projects.
 */
use crate::core::path_utils;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const APP_NAME: &str = "SketchDepot";
const CONFIG_FILENAME: &str = "config.json";

pub const DEFAULT_MARKER_EXTENSION: &str = "pde";
pub const DEFAULT_SKETCHBOOK_LOCATION: &str = "Sketchbook";
pub const EXAMPLES_REPO_URL: &str = "https://github.com/Calsign/APDE-Examples-Repo.git";
// A new branch is cut whenever the examples break backwards compatibility.
pub const EXAMPLES_REPO_BRANCH: &str = "v0.5.0";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Configuration file is malformed: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Could not determine the application directory for configuration")]
    NoConfigDirectory,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/*
 * How external storage is reached on this platform. `DirectPath` enumerates volumes
 * and addresses them by path; `Permissioned` only exposes a single tree root that the
 * user granted explicitly.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageAccessModel {
    #[default]
    DirectPath,
    Permissioned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app_name: String,
    pub marker_extension: String,
    pub default_sketchbook_location: String,
    pub examples_repo_url: String,
    pub examples_repo_branch: String,
    pub storage_access: StorageAccessModel,
    // Conventional public storage root; the volume containing it becomes primary.
    pub public_storage_root: Option<PathBuf>,
    // Explicit external volumes. When absent, removable disks are enumerated.
    pub external_volumes: Option<Vec<PathBuf>>,
    pub log_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            app_name: APP_NAME.to_string(),
            marker_extension: DEFAULT_MARKER_EXTENSION.to_string(),
            default_sketchbook_location: DEFAULT_SKETCHBOOK_LOCATION.to_string(),
            examples_repo_url: EXAMPLES_REPO_URL.to_string(),
            examples_repo_branch: EXAMPLES_REPO_BRANCH.to_string(),
            storage_access: StorageAccessModel::default(),
            public_storage_root: directories::UserDirs::new().map(|dirs| dirs.home_dir().to_path_buf()),
            external_volumes: None,
            log_file: None,
        }
    }
}

impl AppConfig {
    // Marker extension without a leading dot, lowercased for comparisons.
    pub fn normalized_marker_extension(&self) -> String {
        self.marker_extension
            .trim_start_matches('.')
            .to_ascii_lowercase()
    }
}

pub trait ConfigManagerOperations: Send + Sync {
    fn load_config(&self, app_name: &str) -> Result<AppConfig>;
    fn save_config(&self, app_name: &str, config: &AppConfig) -> Result<()>;
}

pub struct CoreConfigManager {}

impl CoreConfigManager {
    pub fn new() -> Self {
        CoreConfigManager {}
    }

    fn config_file(app_name: &str) -> Result<PathBuf> {
        let config_dir = path_utils::get_base_app_config_local_dir(app_name)
            .ok_or(ConfigError::NoConfigDirectory)?;
        Ok(config_dir.join(CONFIG_FILENAME))
    }
}

impl Default for CoreConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

pub fn load_config_from_file(file_path: &Path) -> Result<AppConfig> {
    if !file_path.exists() {
        log::debug!("CoreConfigManager: Config file {file_path:?} does not exist, using defaults.");
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(file_path)?;
    if contents.trim().is_empty() {
        log::debug!("CoreConfigManager: Config file {file_path:?} is empty, using defaults.");
        return Ok(AppConfig::default());
    }
    let config: AppConfig = serde_json::from_str(&contents)?;
    log::debug!("CoreConfigManager: Loaded configuration from {file_path:?}.");
    Ok(config)
}

pub fn save_config_to_file(file_path: &Path, config: &AppConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    fs::write(file_path, json)?;
    log::debug!("CoreConfigManager: Saved configuration to {file_path:?}.");
    Ok(())
}

impl ConfigManagerOperations for CoreConfigManager {
    fn load_config(&self, app_name: &str) -> Result<AppConfig> {
        log::trace!("CoreConfigManager: Loading configuration for app '{app_name}'");
        load_config_from_file(&Self::config_file(app_name)?)
    }

    fn save_config(&self, app_name: &str, config: &AppConfig) -> Result<()> {
        log::trace!("CoreConfigManager: Saving configuration for app '{app_name}'");
        save_config_to_file(&Self::config_file(app_name)?, config)
    }
}

/*
 * The application-private folders. All live under one base directory, which is the
 * platform's local data directory in production and a temporary directory in tests.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxLayout {
    base: PathBuf,
}

impl SandboxLayout {
    pub fn new(base: PathBuf) -> Self {
        SandboxLayout { base }
    }

    pub fn for_app(app_name: &str) -> Result<Self> {
        path_utils::get_base_app_data_local_dir(app_name)
            .map(SandboxLayout::new)
            .ok_or(ConfigError::NoConfigDirectory)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn internal_sketchbook_dir(&self) -> PathBuf {
        self.base.join("sketchbook")
    }

    pub fn starter_examples_dir(&self) -> PathBuf {
        self.base.join("examples")
    }

    pub fn examples_repo_dir(&self) -> PathBuf {
        self.base.join("examples_repo")
    }

    pub fn temporary_projects_dir(&self) -> PathBuf {
        self.base.join("temporary")
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.internal_sketchbook_dir(),
            self.starter_examples_dir(),
            self.temporary_projects_dir(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}
