//! Persistence layer.
//!
//! Two flat-JSON stores:
//! - [`ResponseArchive`]: raw gateway responses kept for audit/debugging,
//!   written under `<dir>/<category>/<category>_<status>_<timestamp>.json`.
//! - [`snapshots::SnapshotStore`]: dated snapshots of matches, markets and
//!   placed bets, plus the probability estimates loader.

pub mod snapshots;

use anyhow::{Context, Result};
use chrono::Utc;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub use snapshots::SnapshotStore;

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// Which endpoint family produced an archived response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCategory {
    Auth,
    Profile,
    Sports,
    Markets,
    Matches,
    Bets,
    Endpoints,
}

impl ResponseCategory {
    pub const ALL: &'static [ResponseCategory] = &[
        ResponseCategory::Auth,
        ResponseCategory::Profile,
        ResponseCategory::Sports,
        ResponseCategory::Markets,
        ResponseCategory::Matches,
        ResponseCategory::Bets,
        ResponseCategory::Endpoints,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseCategory::Auth => "auth",
            ResponseCategory::Profile => "profile",
            ResponseCategory::Sports => "sports",
            ResponseCategory::Markets => "markets",
            ResponseCategory::Matches => "matches",
            ResponseCategory::Bets => "bets",
            ResponseCategory::Endpoints => "endpoints",
        }
    }
}

impl fmt::Display for ResponseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseStatus {
    Success,
    Error,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Success => "success",
            ResponseStatus::Error => "error",
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

/// Sink for raw API responses.
///
/// Fire-and-forget: implementations must swallow their own failures so an
/// archive problem never fails the API call that produced the data.
#[cfg_attr(test, mockall::automock)]
pub trait ResponseArchive: Send + Sync {
    fn save(&self, data: &serde_json::Value, category: ResponseCategory, status: ResponseStatus);
}

/// Archive that discards everything (response saving disabled).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullArchive;

impl ResponseArchive for NullArchive {
    fn save(&self, _data: &serde_json::Value, _category: ResponseCategory, _status: ResponseStatus) {}
}

/// Archive writing pretty-printed JSON files, one per response.
#[derive(Debug, Clone)]
pub struct JsonFileArchive {
    base_dir: PathBuf,
}

impl JsonFileArchive {
    /// Create the archive, ensuring one subdirectory per category exists.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        for category in ResponseCategory::ALL {
            let dir = base_dir.join(category.as_str());
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create archive directory {}", dir.display()))?;
        }
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn write(
        &self,
        data: &serde_json::Value,
        category: ResponseCategory,
        status: ResponseStatus,
    ) -> Result<PathBuf> {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S_%3f");
        let dir = self.base_dir.join(category.as_str());
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create archive directory {}", dir.display()))?;
        let path = dir.join(format!("{category}_{status}_{timestamp}.json"));

        let json = serde_json::to_string_pretty(data).context("Failed to serialise response")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write response to {}", path.display()))?;
        Ok(path)
    }
}

impl ResponseArchive for JsonFileArchive {
    fn save(&self, data: &serde_json::Value, category: ResponseCategory, status: ResponseStatus) {
        match self.write(data, category, status) {
            Ok(path) => debug!(%category, %status, path = %path.display(), "Response archived"),
            Err(e) => warn!(%category, %status, error = %e, "Failed to archive response"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
