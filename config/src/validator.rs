//! # Configuration Validation
//!
//! Validation for `AutoConfig` using the `validator` crate.

use crate::config::AutoConfig;
use validator::Validate;

/// Validate configuration structure.
///
/// # M-CANONICAL-DOCS
///
/// ## Validation Rules
/// ### Backup
/// - `debounce_ms`: 1-60000
/// - `queue_capacity`: 1-10000
/// - `layout`: a versioned layout needs a non-empty directory
///
/// ### Paths
/// - `user_file`, `backup_file`, `target_file`, `staged_system_file`: must
///   name a file
///
/// ### Merge
/// - `strategy`: must name a registered merge strategy
pub fn validate(config: &AutoConfig) -> Result<(), validator::ValidationErrors> {
    config.validate()
}
