//! Shared types for the SharpXch client.
//!
//! Response shapes for each backoffice endpoint, the outbound bet payload,
//! and the error taxonomy used by the gateway and the value engine.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Parse a backoffice timestamp.
///
/// Accepts RFC 3339 (`2024-05-01T18:30:00Z`), naive ISO-8601
/// (`2024-05-01T18:30:00.123`, read as UTC) and bare dates.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn flexible_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognised timestamp: {raw}")))
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Account profile from `/backoffice/api/v2/clients/profile`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub email: Option<String>,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub currency: Vec<String>,
    pub available_to_bet: Decimal,
    #[serde(default)]
    pub exposure: Decimal,
    #[serde(deserialize_with = "flexible_timestamp")]
    pub joined_date: DateTime<Utc>,
    #[serde(default)]
    pub mfa_enabled: bool,
}

impl UserProfile {
    /// Display name: first + last, either one alone, or the username.
    pub fn full_name(&self) -> String {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (false, false) => format!("{} {}", self.first_name, self.last_name),
            (false, true) => self.first_name.clone(),
            (true, false) => self.last_name.clone(),
            (true, true) => self.username.clone(),
        }
    }

    pub fn primary_currency(&self) -> Option<&str> {
        self.currency.first().map(String::as_str)
    }
}

impl fmt::Display for UserProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | available: {} {} | member since {}",
            self.username,
            self.available_to_bet,
            self.primary_currency().unwrap_or(""),
            self.joined_date.format("%Y-%m-%d"),
        )
    }
}

// ---------------------------------------------------------------------------
// Sports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sport {
    pub id: i64,
    pub name: String,
}

/// Paged sports listing from `/backoffice/api/sports`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SportsResponse {
    #[serde(default)]
    pub content: Vec<Sport>,
}

impl SportsResponse {
    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Matches and markets
// ---------------------------------------------------------------------------

/// A sports fixture. Identity is `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: String,
    pub sport: String,
    pub competition: String,
    pub home_team: String,
    pub away_team: String,
    #[serde(deserialize_with = "flexible_timestamp")]
    pub start_time: DateTime<Utc>,
    pub status: String,
    #[serde(default)]
    pub score: Option<String>,
    #[serde(default)]
    pub markets: Option<serde_json::Value>,
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} vs {} [{} / {}] {}",
            self.home_team,
            self.away_team,
            self.sport,
            self.competition,
            self.start_time.format("%Y-%m-%d %H:%M"),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchesResponse {
    pub matches: Vec<Match>,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
}

/// A single wagerable outcome. Odds are decimal (European).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub id: String,
    pub market_id: String,
    pub name: String,
    pub odds: Decimal,
    pub status: String,
    #[serde(default)]
    pub result: Option<String>,
}

/// A betting market within a match; selections keep upstream order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    pub id: String,
    pub match_id: String,
    pub name: String,
    pub status: String,
    pub selections: Vec<Selection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketsResponse {
    pub match_id: String,
    pub markets: Vec<Market>,
}

// ---------------------------------------------------------------------------
// Bets
// ---------------------------------------------------------------------------

/// Outbound bet placement payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub selection_id: String,
    pub stake: Decimal,
    pub odds: Decimal,
}

impl fmt::Display for Bet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {} on {}", self.stake, self.odds, self.selection_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetResponse {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub selection_id: Option<String>,
    #[serde(default)]
    pub match_id: Option<String>,
    pub stake: Decimal,
    pub potential_return: Decimal,
    #[serde(deserialize_with = "flexible_timestamp")]
    pub placed_at: DateTime<Utc>,
    pub odds: Decimal,
    #[serde(default)]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

const BODY_SNIPPET_CHARS: usize = 200;

fn snippet(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_CHARS).collect()
}

/// Failures surfaced by the gateway and the value engine.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("authentication failed: no valid session")]
    Authentication,

    #[error("{endpoint} returned HTTP {status}: {}", snippet(.body))]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("malformed response from {endpoint}: {}", snippet(.raw_body))]
    MalformedResponse { endpoint: String, raw_body: String },

    #[error("network error calling {endpoint}: {message}")]
    Network { endpoint: String, message: String },

    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("invalid odds {0}: decimal odds must be greater than 1.0")]
    InvalidOdds(Decimal),

    #[error("risk limit exceeded: {0}")]
    RiskLimit(String),
}

impl ExchangeError {
    /// Whether a caller may retry the failed call (read endpoints only).
    pub fn is_retryable(&self) -> bool {
        match self {
            ExchangeError::Network { .. } | ExchangeError::Timeout { .. } => true,
            ExchangeError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// HTTP status for `Api` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            ExchangeError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
