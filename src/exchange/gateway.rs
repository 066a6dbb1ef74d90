//! Typed backoffice operations.
//!
//! Endpoints (all bearer-authenticated, JSON):
//! - `GET  /backoffice/api/v2/clients/profile`
//! - `GET  /backoffice/api/sports`
//! - `GET  /backoffice/api/matches[?sportId=]`
//! - `GET  /backoffice/api/markets/{matchId}`
//! - `POST /backoffice/api/bets`
//!
//! Reads are idempotent and may be retried by the caller. Bet placement is
//! sent exactly once per call and is never retried here. A 401 surfaces as
//! `ExchangeError::Api` and leaves the session untouched.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::session::SessionManager;
use super::{HttpRequest, HttpTransport, TransportError};
use crate::storage::{ResponseArchive, ResponseCategory, ResponseStatus};
use crate::types::{
    Bet, BetResponse, ExchangeError, MarketsResponse, MatchesResponse, SportsResponse,
    UserProfile,
};

pub const PROFILE_PATH: &str = "/backoffice/api/v2/clients/profile";
pub const SPORTS_PATH: &str = "/backoffice/api/sports";
pub const MATCHES_PATH: &str = "/backoffice/api/matches";
pub const MARKETS_PATH: &str = "/backoffice/api/markets";
pub const BETS_PATH: &str = "/backoffice/api/bets";

/// Authenticated client for the SharpXch backoffice.
pub struct ApiGateway {
    base_url: String,
    session: Arc<SessionManager>,
    transport: Arc<dyn HttpTransport>,
    archive: Arc<dyn ResponseArchive>,
}

impl ApiGateway {
    pub fn new(
        base_url: &str,
        session: Arc<SessionManager>,
        transport: Arc<dyn HttpTransport>,
        archive: Arc<dyn ResponseArchive>,
    ) -> Self {
        info!(base_url, "Initialised SharpXch gateway");
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            transport,
            archive,
        }
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn transport(&self) -> &dyn HttpTransport {
        self.transport.as_ref()
    }

    pub(crate) fn archive(&self) -> &dyn ResponseArchive {
        self.archive.as_ref()
    }

    // -- Operations --------------------------------------------------------

    pub async fn get_profile(&self) -> Result<UserProfile, ExchangeError> {
        let profile: UserProfile = self.get(PROFILE_PATH, ResponseCategory::Profile).await?;
        info!(username = %profile.username, "Retrieved user profile");
        Ok(profile)
    }

    pub async fn get_sport_details(&self) -> Result<SportsResponse, ExchangeError> {
        let sports: SportsResponse = self.get(SPORTS_PATH, ResponseCategory::Sports).await?;
        info!(count = sports.len(), "Retrieved sports data");
        Ok(sports)
    }

    /// Matches, optionally filtered by sport.
    pub async fn get_matches(&self, sport_id: Option<i64>) -> Result<MatchesResponse, ExchangeError> {
        let path = match sport_id {
            Some(id) => format!("{MATCHES_PATH}?sportId={id}"),
            None => MATCHES_PATH.to_string(),
        };
        let matches: MatchesResponse = self.get(&path, ResponseCategory::Matches).await?;
        info!(count = matches.matches.len(), sport_id = ?sport_id, "Retrieved matches");
        Ok(matches)
    }

    pub async fn get_markets(&self, match_id: &str) -> Result<MarketsResponse, ExchangeError> {
        let path = format!("{MARKETS_PATH}/{}", urlencoding::encode(match_id));
        let markets: MarketsResponse = self.get(&path, ResponseCategory::Markets).await?;
        info!(match_id, count = markets.markets.len(), "Retrieved markets");
        Ok(markets)
    }

    /// Place a bet. Sent exactly once; the caller decides what to do on
    /// failure, since a blind retry could double the stake.
    pub async fn place_bet(&self, bet: &Bet) -> Result<BetResponse, ExchangeError> {
        debug!(bet = %bet, "Placing bet");
        let request = HttpRequest::post_json(
            format!("{}{BETS_PATH}", self.base_url),
            serde_json::json!(bet),
        );
        let placed: BetResponse = self.call(BETS_PATH, request, ResponseCategory::Bets).await?;
        info!(bet_id = %placed.id, status = %placed.status, stake = %placed.stake, "Bet placed");
        Ok(placed)
    }

    // -- Request plumbing --------------------------------------------------

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        category: ResponseCategory,
    ) -> Result<T, ExchangeError> {
        let request = HttpRequest::get(format!("{}{path}", self.base_url));
        self.call(path, request, category).await
    }

    /// Authenticate, send, classify the status and decode the body.
    async fn call<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: HttpRequest,
        category: ResponseCategory,
    ) -> Result<T, ExchangeError> {
        let token = self
            .session
            .valid_token()
            .await
            .ok_or(ExchangeError::Authentication)?;
        let request = request.header("Authorization", format!("Bearer {token}"));
        let method = request.method.clone();

        let resp = self.transport.send(request).await.map_err(|e| {
            warn!(endpoint, error = %e, "Backoffice request failed");
            match e {
                TransportError::Timeout => ExchangeError::Timeout {
                    endpoint: endpoint.to_string(),
                },
                TransportError::Network(message) => ExchangeError::Network {
                    endpoint: endpoint.to_string(),
                    message,
                },
            }
        })?;
        debug!(%method, endpoint, status = resp.status, "Backoffice response");

        if !resp.is_success() {
            if let Ok(body) = serde_json::from_str::<serde_json::Value>(&resp.body) {
                self.archive.save(&body, category, ResponseStatus::Error);
            }
            warn!(endpoint, status = resp.status, "Backoffice returned an error status");
            return Err(ExchangeError::Api {
                endpoint: endpoint.to_string(),
                status: resp.status,
                body: resp.body,
            });
        }

        let malformed = |raw_body: String| ExchangeError::MalformedResponse {
            endpoint: endpoint.to_string(),
            raw_body,
        };

        let value: serde_json::Value = match serde_json::from_str(&resp.body) {
            Ok(value) => value,
            Err(e) => {
                error!(endpoint, error = %e, "Response is not valid JSON");
                return Err(malformed(resp.body));
            }
        };

        match T::deserialize(&value) {
            Ok(decoded) => {
                self.archive.save(&value, category, ResponseStatus::Success);
                Ok(decoded)
            }
            Err(e) => {
                error!(endpoint, error = %e, "Response has an unexpected shape");
                self.archive.save(&value, category, ResponseStatus::Error);
                Err(malformed(resp.body))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
