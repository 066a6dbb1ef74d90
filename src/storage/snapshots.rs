//! Dated JSON snapshots of fetched matches, markets and placed bets.
//!
//! Layout under the data directory:
//! - `matches/<YYYY-MM-DD>/matches.json`
//! - `markets/<YYYY-MM-DD>/<match_id>.json`
//! - `bets/<YYYY-MM-DD>/bet_<id>.json`

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::strategy::EstimateBook;
use crate::types::{BetResponse, Market, Match};

pub struct SnapshotStore {
    data_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        for sub in ["matches", "markets", "bets"] {
            let dir = data_dir.join(sub);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
        }
        info!(data_dir = %data_dir.display(), "Snapshot store ready");
        Ok(Self { data_dir })
    }

    fn dated(&self, kind: &str, date: NaiveDate) -> PathBuf {
        self.data_dir.join(kind).join(date.format("%Y-%m-%d").to_string())
    }

    /// Match ids end up in file names; keep them to a single path segment.
    fn file_stem(id: &str) -> String {
        urlencoding::encode(id).into_owned()
    }

    pub fn save_matches(&self, matches: &[Match], date: NaiveDate) -> Result<PathBuf> {
        let path = self.dated("matches", date).join("matches.json");
        write_json(&path, &matches)?;
        info!(count = matches.len(), path = %path.display(), "Saved matches");
        Ok(path)
    }

    /// Matches saved for `date`; empty when none were saved.
    pub fn load_matches(&self, date: NaiveDate) -> Result<Vec<Match>> {
        let path = self.dated("matches", date).join("matches.json");
        read_json_or_empty(&path)
    }

    pub fn save_match_markets(
        &self,
        match_id: &str,
        markets: &[Market],
        date: NaiveDate,
    ) -> Result<PathBuf> {
        let path = self
            .dated("markets", date)
            .join(format!("{}.json", Self::file_stem(match_id)));
        write_json(&path, &markets)?;
        info!(match_id, count = markets.len(), path = %path.display(), "Saved markets");
        Ok(path)
    }

    pub fn load_match_markets(&self, match_id: &str, date: NaiveDate) -> Result<Vec<Market>> {
        let path = self
            .dated("markets", date)
            .join(format!("{}.json", Self::file_stem(match_id)));
        read_json_or_empty(&path)
    }

    pub fn save_bet(&self, bet: &BetResponse, date: NaiveDate) -> Result<PathBuf> {
        let path = self
            .dated("bets", date)
            .join(format!("bet_{}.json", Self::file_stem(&bet.id)));
        write_json(&path, bet)?;
        info!(bet_id = %bet.id, path = %path.display(), "Saved bet");
        Ok(path)
    }

    pub fn load_bets(&self, date: NaiveDate) -> Result<Vec<BetResponse>> {
        let dir = self.dated("bets", date);
        if !dir.exists() {
            warn!(date = %date, "No bets found");
            return Ok(Vec::new());
        }

        let mut bets = Vec::new();
        let entries = std::fs::read_dir(&dir)
            .with_context(|| format!("Failed to list bets in {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            bets.push(read_json(&path)?);
        }
        Ok(bets)
    }

    /// Total stake of the bets saved for `date`.
    pub fn committed_stake(&self, date: NaiveDate) -> Result<Decimal> {
        Ok(self.load_bets(date)?.iter().map(|b| b.stake).sum())
    }
}

/// Load per-match probability estimates: `{match_id: {selection_name: p}}`.
pub fn load_estimates(path: &Path) -> Result<EstimateBook> {
    let book: EstimateBook = read_json(path)?;
    info!(path = %path.display(), matches = book.len(), "Loaded probability estimates");
    Ok(book)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value).context("Failed to serialise snapshot")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Failed to parse {}", path.display()))
}

fn read_json_or_empty<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        warn!(path = %path.display(), "No snapshot found");
        return Ok(Vec::new());
    }
    read_json(path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
