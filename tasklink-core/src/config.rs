//! YAML configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.tasklink/
//!   config.yaml   (mode 0600)
//!   links.json    (identity map, owned by tasklink-sync)
//! ```
//!
//! Every function comes in two forms: `fn_at(home, …)` with an explicit home
//! (tests use a `TempDir`) and `fn(…)` which derives home from
//! `dirs::home_dir()` and delegates.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};

// ---------------------------------------------------------------------------
// 1. Options
// ---------------------------------------------------------------------------

/// Root configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// Seconds between timer-driven passes.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default)]
    pub gemini: GeminiOptions,
    #[serde(default)]
    pub purecm: PureCmOptions,
    /// Write the tracker URL of a mirror back onto the source task.
    #[serde(default = "default_true")]
    pub update_url: bool,
    /// One-shot: the next Gemini scan ignores project checkpoints.
    #[serde(default)]
    pub force_gemini_sync: bool,
    /// One-shot: the next PureCM scan ignores project checkpoints.
    #[serde(default)]
    pub force_purecm_sync: bool,
    /// Project names never synchronized, in either direction.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_projects: Vec<String>,
    /// Tasks owned by these users are not synchronized.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_users: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            gemini: GeminiOptions::default(),
            purecm: PureCmOptions::default(),
            update_url: true,
            force_gemini_sync: false,
            force_purecm_sync: false,
            excluded_projects: Vec::new(),
            excluded_users: Vec::new(),
        }
    }
}

impl Options {
    pub fn is_project_excluded(&self, name: &str) -> bool {
        self.excluded_projects.iter().any(|p| p == name)
    }

    pub fn is_user_excluded(&self, name: &str) -> bool {
        self.excluded_users.iter().any(|u| u == name)
    }

    /// Reject values that parse but cannot drive a sync.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "interval_secs",
                reason: "must be at least 1 second".into(),
            });
        }
        if self.purecm.priority_levels == 0 {
            return Err(ConfigError::Invalid {
                field: "purecm.priority_levels",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GeminiOptions {
    /// Base URL of the Gemini web application, e.g. `https://gemini.example.com`.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub project_creation: ProjectCreation,
    #[serde(default)]
    pub task_creation: CreationSelector,
    #[serde(default)]
    pub feature_creation: CreationSelector,
}

/// Project auto-creation on Gemini. New projects are copied from `template`,
/// or from the first project when no template is named.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectCreation {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

impl ProjectCreation {
    /// Template name, treating an empty string as absent.
    pub fn template_name(&self) -> Option<&str> {
        self.template.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Issue creation on Gemini. Type, status and severity are matched by
/// description; creation is off unless all three are present.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreationSelector {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_severity: Option<String>,
}

impl CreationSelector {
    /// `(type, status, severity)` when enabled and fully specified.
    pub fn selectors(&self) -> Option<(&str, &str, &str)> {
        if !self.enabled {
            return None;
        }
        Some((
            self.creation_type.as_deref()?,
            self.creation_status.as_deref()?,
            self.creation_severity.as_deref()?,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PureCmOptions {
    /// Base URL of the PureCM server's REST gateway.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_true")]
    pub project_creation: bool,
    #[serde(default = "default_true")]
    pub task_creation: bool,
    /// Number of priority levels; level 1 is the highest.
    #[serde(default = "default_priority_levels")]
    pub priority_levels: u16,
}

impl Default for PureCmOptions {
    fn default() -> Self {
        Self {
            url: String::new(),
            repository: String::new(),
            token: String::new(),
            project_creation: true,
            task_creation: true,
            priority_levels: default_priority_levels(),
        }
    }
}

fn default_interval() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_priority_levels() -> u16 {
    5
}

// ---------------------------------------------------------------------------
// 2. Paths
// ---------------------------------------------------------------------------

/// `<home>/.tasklink/`, created with mode `0700` when absent.
pub fn tasklink_dir_at(home: &Path) -> Result<PathBuf, ConfigError> {
    let dir = home.join(".tasklink");
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

/// `<home>/.tasklink/config.yaml`, pure.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".tasklink").join("config.yaml")
}

// ---------------------------------------------------------------------------
// 3. Load
// ---------------------------------------------------------------------------

/// Load and validate `<home>/.tasklink/config.yaml`.
///
/// Returns `ConfigError::NotFound` if absent and `ConfigError::Parse` (with
/// path and line context) if malformed.
pub fn load_at(home: &Path) -> Result<Options, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Err(ConfigError::NotFound { path });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let options: Options =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })?;
    options.validate()?;
    Ok(options)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Options, ConfigError> {
    load_at(&home()?)
}

// ---------------------------------------------------------------------------
// 4. Save (atomic)
// ---------------------------------------------------------------------------

/// Serialize → `config.yaml.tmp` → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, options: &Options) -> Result<(), ConfigError> {
    tasklink_dir_at(home)?;
    let path = config_path_at(home);
    let tmp_path = path.with_file_name("config.yaml.tmp");

    let yaml = serde_yaml::to_string(options)?;
    std::fs::write(&tmp_path, yaml).map_err(|e| io_err(&tmp_path, e))?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

/// `save_at` convenience wrapper.
pub fn save(options: &Options) -> Result<(), ConfigError> {
    save_at(&home()?, options)
}

/// Write `options` unless a config already exists, in which case the existing
/// one is loaded and returned unchanged.
pub fn init_at(home: &Path, options: &Options) -> Result<Options, ConfigError> {
    if config_path_at(home).exists() {
        return load_at(home);
    }
    options.validate()?;
    save_at(home, options)?;
    Ok(options.clone())
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
