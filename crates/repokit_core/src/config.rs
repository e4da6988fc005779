//! Repository configuration.
//!
//! Plain data with defaults; hosts may deserialize it from JSON or TOML.

use serde::{Deserialize, Serialize};

/// What `delete`/`delete_by_id` do when the target row does not exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingDeletePolicy {
    /// Succeed silently.
    #[default]
    Noop,
    /// Fail with `RepoError::NotFound`.
    Error,
}

impl MissingDeletePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Error => "error",
        }
    }
}

/// Behavior switches shared by every repository built from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub on_missing_delete: MissingDeletePolicy,
    /// Empty the unit of work's identity map after each bulk update.
    pub clear_after_bulk_update: bool,
    /// Largest accepted page or slice size.
    pub max_page_size: u64,
}

pub const DEFAULT_MAX_PAGE_SIZE: u64 = 2000;

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            on_missing_delete: MissingDeletePolicy::Noop,
            clear_after_bulk_update: false,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}
