//! # Configuration Structures
//!
//! Runtime settings for automatic configuration backup and reconciliation.
//!
//! All configuration structures:
//! - Use `serde` for serialization/deserialization
//! - Use `validator` for input validation
//! - Default to the conventional document layout under the host root

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

/// Top-level configuration.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Aggregates the backup scheduler settings, the document path layout and
/// the merge strategy selection.
///
/// ## Usage
/// ```rust,no_run
/// use config::AutoConfig;
///
/// let config = AutoConfig::default();
/// let paths = config.paths.resolve();
/// println!("Target document: {}", paths.target.display());
/// ```
///
/// ## Fields
/// - `backup`: Activation gate, coalescing window, queue capacity, layout
/// - `paths`: Document locations relative to the host root
/// - `merge`: Merge strategy name
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default, PartialEq)]
pub struct AutoConfig {
    #[serde(default)]
    #[validate(nested)]
    pub backup: BackupConfig,

    #[serde(default)]
    #[validate(nested)]
    pub paths: PathConfig,

    #[serde(default)]
    #[validate(nested)]
    pub merge: MergeConfig,
}

/// Backup scheduler configuration.
///
/// ## Fields
/// - `enabled`: Activation gate (default: false)
/// - `debounce_ms`: Coalescing window in milliseconds (default: 500)
/// - `queue_capacity`: Bounded signal queue size (default: 200)
/// - `layout`: Where backup documents are written (default: single file)
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct BackupConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_debounce_ms")]
    #[validate(range(min = 1, max = 60000))]
    pub debounce_ms: u64,

    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1, max = 10000))]
    pub queue_capacity: usize,

    #[serde(default)]
    #[validate(custom(function = "validate_layout"))]
    pub layout: BackupLayoutConfig,
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_queue_capacity() -> usize {
    200
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            debounce_ms: default_debounce_ms(),
            queue_capacity: default_queue_capacity(),
            layout: BackupLayoutConfig::default(),
        }
    }
}

impl BackupConfig {
    pub fn debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.debounce_ms)
    }
}

/// Backup document layout.
///
/// - `single`: one backup file, removed once folded into the target
/// - `versioned`: timestamped backups accumulate in `directory`; when
///   `retain` is non-zero only the newest `retain` are kept
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackupLayoutConfig {
    #[default]
    Single,
    Versioned {
        #[serde(default = "default_backup_dir")]
        directory: PathBuf,
        #[serde(default)]
        retain: usize,
    },
}

pub(crate) fn default_backup_dir() -> PathBuf {
    PathBuf::from("casc_backups")
}

fn validate_layout(layout: &BackupLayoutConfig) -> Result<(), validator::ValidationError> {
    match layout {
        BackupLayoutConfig::Versioned { directory, .. } if directory.as_os_str().is_empty() => {
            Err(validator::ValidationError::new("Empty backup directory"))
        }
        _ => Ok(()),
    }
}

/// Document locations, relative to `root` unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct PathConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Hand-edited document holding user customizations
    #[serde(default = "default_user_file")]
    #[validate(custom(function = "validate_relative_file"))]
    pub user_file: PathBuf,

    /// Export snapshot written by the backup scheduler
    #[serde(default = "default_backup_file")]
    #[validate(custom(function = "validate_relative_file"))]
    pub backup_file: PathBuf,

    /// Effective document regenerated on every cycle
    #[serde(default = "default_target_file")]
    #[validate(custom(function = "validate_relative_file"))]
    pub target_file: PathBuf,

    /// Where a delivered system document is staged at startup
    #[serde(default = "default_staged_system_file")]
    #[validate(custom(function = "validate_relative_file"))]
    pub staged_system_file: PathBuf,

    /// Freshly delivered system document picked up at startup
    #[serde(default)]
    pub incoming_file: Option<PathBuf>,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_user_file() -> PathBuf {
    PathBuf::from("jenkins.yaml")
}

fn default_backup_file() -> PathBuf {
    PathBuf::from("jenkins.backup.yaml")
}

fn default_target_file() -> PathBuf {
    PathBuf::from("casc_config_auto/jenkins.yaml")
}

fn default_staged_system_file() -> PathBuf {
    PathBuf::from("jenkins.yaml.d/system.yaml")
}

fn validate_relative_file(path: &Path) -> Result<(), validator::ValidationError> {
    if path.as_os_str().is_empty() || path.file_name().is_none() {
        return Err(validator::ValidationError::new("Path must name a file"));
    }
    Ok(())
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            user_file: default_user_file(),
            backup_file: default_backup_file(),
            target_file: default_target_file(),
            staged_system_file: default_staged_system_file(),
            incoming_file: None,
        }
    }
}

/// Paths joined onto the configured root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub root: PathBuf,
    pub user: PathBuf,
    pub backup: PathBuf,
    pub target: PathBuf,
    pub staged_system: PathBuf,
    pub incoming: Option<PathBuf>,
}

impl PathConfig {
    pub fn resolve(&self) -> ResolvedPaths {
        ResolvedPaths {
            root: self.root.clone(),
            user: self.root.join(&self.user_file),
            backup: self.root.join(&self.backup_file),
            target: self.root.join(&self.target_file),
            staged_system: self.root.join(&self.staged_system_file),
            incoming: self.incoming_file.as_ref().map(|p| self.root.join(p)),
        }
    }
}

/// Merge strategy selection.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct MergeConfig {
    #[serde(default = "default_strategy")]
    #[validate(custom(function = "validate_strategy"))]
    pub strategy: String,
}

fn default_strategy() -> String {
    merge::DeepMerge::NAME.to_string()
}

fn validate_strategy(value: &str) -> Result<(), validator::ValidationError> {
    match merge::strategy_for(value) {
        Some(_) => Ok(()),
        None => Err(validator::ValidationError::new("Unknown merge strategy")),
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
        }
    }
}
