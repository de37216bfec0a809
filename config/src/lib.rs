//! # Configuration System
//!
//! Runtime configuration for automatic configuration backup.
//!
//! This crate provides:
//! - Configuration structures for the backup scheduler, document layout and
//!   merge strategy
//! - Environment variable loading (read once at process start)
//! - Configuration file loading (TOML/YAML)
//! - Configuration validation
//!
//! # Best Practices
//!
//! - Uses `validator` crate for input validation
//! - Follows 12-factor app configuration principles
//! - The scheduler stays off unless explicitly enabled

pub mod config;
pub mod file_loader;
pub mod loader;
pub mod validator;

pub use config::{
    AutoConfig, BackupConfig, BackupLayoutConfig, MergeConfig, PathConfig, ResolvedPaths,
};
pub use file_loader::{ConfigFileError, load_from_file, load_from_toml, load_from_yaml};
pub use loader::load_from_env;
pub use validator::validate;
pub use ::validator::Validate;
