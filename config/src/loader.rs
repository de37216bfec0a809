//! # Environment Variable Loader
//!
//! Loads configuration from environment variables, read once at process
//! start.
//!
//! # Naming Convention
//! - `CASC_AUTO_BACKUP*`: Backup scheduler settings
//! - `CASC_*_FILE`, `CASC_ROOT`: Document layout
//! - `CASC_MERGE_STRATEGY`: Merge strategy

use crate::config::{
    AutoConfig, BackupConfig, BackupLayoutConfig, MergeConfig, PathConfig, default_backup_dir,
};
use std::env;
use std::path::PathBuf;

/// Load configuration from environment variables.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Reads the activation gate and the deployment layout from the process
/// environment. Unset or unparsable numeric variables fall back to their
/// defaults.
///
/// ## Usage
/// ```rust,no_run
/// use config::load_from_env;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = load_from_env()?;
///     println!("Auto backup enabled: {}", config.backup.enabled);
///     Ok(())
/// }
/// ```
///
/// ## Environment Variables
/// ### Backup Settings (`CASC_AUTO_BACKUP*`)
/// - `CASC_AUTO_BACKUP`: Enables the scheduler only when exactly `"true"`
/// - `CASC_AUTO_BACKUP_DEBOUNCE_MS`: Coalescing window (default: 500)
/// - `CASC_AUTO_BACKUP_QUEUE_CAPACITY`: Queue size (default: 200)
/// - `CASC_AUTO_BACKUP_LAYOUT`: `single` or `versioned` (default: single)
/// - `CASC_AUTO_BACKUP_DIR`: Versioned backup directory (default:
///   "casc_backups")
/// - `CASC_AUTO_BACKUP_RETAIN`: Versioned backups kept, 0 keeps all
///   (default: 0)
///
/// ### Layout Settings
/// - `CASC_ROOT`: Host root directory (default: ".")
/// - `CASC_USER_FILE`: User document (default: "jenkins.yaml")
/// - `CASC_BACKUP_FILE`: Backup document (default: "jenkins.backup.yaml")
/// - `CASC_TARGET_FILE`: Effective document (default:
///   "casc_config_auto/jenkins.yaml")
/// - `CASC_STAGED_SYSTEM_FILE`: Staged system document (default:
///   "jenkins.yaml.d/system.yaml")
/// - `CASC_INCOMING_FILE`: Delivered system document (optional)
///
/// ### Merge Settings
/// - `CASC_MERGE_STRATEGY`: Strategy name (default: "deep-merge")
pub fn load_from_env() -> Result<AutoConfig, Box<dyn std::error::Error>> {
    Ok(AutoConfig {
        backup: load_backup_from_env()?,
        paths: load_paths_from_env()?,
        merge: load_merge_from_env()?,
    })
}

fn load_backup_from_env() -> Result<BackupConfig, Box<dyn std::error::Error>> {
    let defaults = BackupConfig::default();
    Ok(BackupConfig {
        enabled: env::var("CASC_AUTO_BACKUP").is_ok_and(|v| v == "true"),
        debounce_ms: parse_env("CASC_AUTO_BACKUP_DEBOUNCE_MS").unwrap_or(defaults.debounce_ms),
        queue_capacity: parse_env("CASC_AUTO_BACKUP_QUEUE_CAPACITY")
            .unwrap_or(defaults.queue_capacity),
        layout: load_layout_from_env()?,
    })
}

fn load_layout_from_env() -> Result<BackupLayoutConfig, Box<dyn std::error::Error>> {
    let kind = env::var("CASC_AUTO_BACKUP_LAYOUT").unwrap_or_else(|_| "single".to_string());
    match kind.as_str() {
        "single" => Ok(BackupLayoutConfig::Single),
        "versioned" => Ok(BackupLayoutConfig::Versioned {
            directory: env::var("CASC_AUTO_BACKUP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_backup_dir()),
            retain: parse_env("CASC_AUTO_BACKUP_RETAIN").unwrap_or(0),
        }),
        other => Err(format!("Unknown backup layout: {other}").into()),
    }
}

fn load_paths_from_env() -> Result<PathConfig, Box<dyn std::error::Error>> {
    let defaults = PathConfig::default();
    Ok(PathConfig {
        root: path_env("CASC_ROOT").unwrap_or(defaults.root),
        user_file: path_env("CASC_USER_FILE").unwrap_or(defaults.user_file),
        backup_file: path_env("CASC_BACKUP_FILE").unwrap_or(defaults.backup_file),
        target_file: path_env("CASC_TARGET_FILE").unwrap_or(defaults.target_file),
        staged_system_file: path_env("CASC_STAGED_SYSTEM_FILE")
            .unwrap_or(defaults.staged_system_file),
        incoming_file: path_env("CASC_INCOMING_FILE"),
    })
}

fn load_merge_from_env() -> Result<MergeConfig, Box<dyn std::error::Error>> {
    Ok(MergeConfig {
        strategy: env::var("CASC_MERGE_STRATEGY").unwrap_or_else(|_| MergeConfig::default().strategy),
    })
}

fn path_env(key: &str) -> Option<PathBuf> {
    env::var(key).ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}

fn parse_env<T>(key: &str) -> Result<T, Box<dyn std::error::Error>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(s) => s
            .parse::<T>()
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>),
        Err(e) => Err(Box::new(e) as Box<dyn std::error::Error>),
    }
}
