//! Authenticated session management.
//!
//! Auth: `POST {base_url}{auth_endpoint}` with `{"username", "password"}`,
//! answered by `{"access_token", "refresh_token"?, "expires_in"?}`.
//! Authenticated calls then send `Authorization: Bearer {access_token}`.
//!
//! A session counts as valid until five minutes before its expiry. The
//! session lives behind an async mutex that is held across the whole
//! check-then-login sequence, so concurrent callers never start more than
//! one login; callers queued behind a login re-check validity and reuse the
//! fresh token.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::{HttpRequest, HttpTransport};
use crate::storage::{ResponseArchive, ResponseCategory, ResponseStatus};

/// Tokens are refreshed this long before their reported expiry.
const SAFETY_MARGIN_SECS: i64 = 5 * 60;

/// Lifetime assumed when the auth response carries no `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME: std::time::Duration = std::time::Duration::from_secs(60 * 60);

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Account credentials. The password never appears in `Debug` output.
pub struct Credentials {
    username: String,
    password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::new(password.into()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Token state held against the backoffice API.
#[derive(Default)]
pub struct Session {
    token: Option<SecretString>,
    expiry: Option<DateTime<Utc>>,
    refresh_token: Option<SecretString>,
}

impl Session {
    /// Token present and `now` is before expiry minus the safety margin.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match (&self.token, self.expiry) {
            (Some(_), Some(expiry)) => now < expiry - Duration::seconds(SAFETY_MARGIN_SECS),
            _ => false,
        }
    }

    fn clear(&mut self) {
        self.token = None;
        self.expiry = None;
        self.refresh_token = None;
    }
}

/// Non-secret view of the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub authenticated: bool,
    pub expiry: Option<DateTime<Utc>>,
    pub has_refresh_token: bool,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Seconds; some servers send it as a float.
    #[serde(default)]
    expires_in: Option<f64>,
}

/// Token lifetime from a reported `expires_in`, or `default` when it is
/// absent or not representable.
fn lifetime_from(expires_in: Option<f64>, default: Duration) -> Duration {
    match expires_in {
        Some(secs) if secs.is_finite() => {
            // Saturating cast; an absurd value overflows later and falls back.
            Duration::try_milliseconds((secs * 1000.0) as i64).unwrap_or(default)
        }
        Some(secs) => {
            warn!(expires_in = secs, "Ignoring non-finite expires_in");
            default
        }
        None => default,
    }
}

/// Copy of an auth response body safe to archive.
fn redact_tokens(mut body: serde_json::Value) -> serde_json::Value {
    if let Some(obj) = body.as_object_mut() {
        for key in ["access_token", "refresh_token", "id_token"] {
            if let Some(value) = obj.get_mut(key) {
                *value = serde_json::Value::String("[REDACTED]".to_string());
            }
        }
    }
    body
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Owns the credentials and the single live [`Session`] of a client.
pub struct SessionManager {
    transport: Arc<dyn HttpTransport>,
    archive: Arc<dyn ResponseArchive>,
    auth_url: String,
    credentials: Credentials,
    token_lifetime: Duration,
    session: Mutex<Session>,
}

impl SessionManager {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        archive: Arc<dyn ResponseArchive>,
        base_url: &str,
        auth_endpoint: &str,
        credentials: Credentials,
    ) -> Self {
        Self {
            transport,
            archive,
            auth_url: format!("{}{}", base_url.trim_end_matches('/'), auth_endpoint),
            credentials,
            token_lifetime: Duration::seconds(DEFAULT_TOKEN_LIFETIME.as_secs() as i64),
            session: Mutex::new(Session::default()),
        }
    }

    /// Override the lifetime assumed when `expires_in` is absent.
    pub fn with_token_lifetime(mut self, lifetime: std::time::Duration) -> Self {
        self.token_lifetime = Duration::seconds(lifetime.as_secs() as i64);
        self
    }

    pub fn username(&self) -> &str {
        self.credentials.username()
    }

    /// True if the cached session is valid, otherwise try to log in.
    ///
    /// Makes no network call while the cached token is valid.
    pub async fn ensure_authenticated(&self) -> bool {
        self.valid_token().await.is_some()
    }

    /// Authenticate unconditionally, replacing any current session.
    ///
    /// Any failure clears the session and returns `false`.
    pub async fn login(&self) -> bool {
        let mut session = self.session.lock().await;
        self.authenticate(&mut session).await
    }

    pub async fn logout(&self) {
        self.session.lock().await.clear();
        info!(username = %self.credentials.username, "Logged out");
    }

    pub async fn session_info(&self) -> SessionInfo {
        let session = self.session.lock().await;
        SessionInfo {
            authenticated: session.is_valid_at(Utc::now()),
            expiry: session.expiry,
            has_refresh_token: session.refresh_token.is_some(),
        }
    }

    /// Bearer token for an authenticated call, logging in first if needed.
    pub(crate) async fn valid_token(&self) -> Option<String> {
        let mut session = self.session.lock().await;
        if !session.is_valid_at(Utc::now()) && !self.authenticate(&mut session).await {
            return None;
        }
        session.token.as_ref().map(|t| t.expose_secret().clone())
    }

    async fn authenticate(&self, session: &mut Session) -> bool {
        match self.request_token().await {
            Ok(grant) => {
                let now = Utc::now();
                let lifetime = lifetime_from(grant.expires_in, self.token_lifetime);
                let Some(expiry) = now
                    .checked_add_signed(lifetime)
                    .or_else(|| now.checked_add_signed(self.token_lifetime))
                else {
                    session.clear();
                    error!(username = %self.credentials.username, "Token expiry out of range");
                    return false;
                };

                session.token = grant.access_token.map(SecretString::new);
                session.refresh_token = grant.refresh_token.map(SecretString::new);
                session.expiry = Some(expiry);

                info!(username = %self.credentials.username, "Successfully logged in");
                debug!(expires_at = %expiry, "Token expiry");
                true
            }
            Err(e) => {
                session.clear();
                error!(username = %self.credentials.username, error = %e, "Login failed");
                false
            }
        }
    }

    async fn request_token(&self) -> Result<TokenResponse> {
        debug!(url = %self.auth_url, "Attempting login");

        let payload = serde_json::json!({
            "username": self.credentials.username,
            "password": self.credentials.password.expose_secret(),
        });
        let resp = self
            .transport
            .send(HttpRequest::post_json(&self.auth_url, payload))
            .await
            .context("Login request failed")?;

        if !resp.is_success() {
            if let Ok(body) = serde_json::from_str::<serde_json::Value>(&resp.body) {
                self.archive
                    .save(&body, ResponseCategory::Auth, ResponseStatus::Error);
            }
            anyhow::bail!("Login rejected with HTTP {}", resp.status);
        }

        let body: serde_json::Value =
            serde_json::from_str(&resp.body).context("Failed to parse login response")?;
        self.archive
            .save(&redact_tokens(body.clone()), ResponseCategory::Auth, ResponseStatus::Success);

        let grant: TokenResponse =
            serde_json::from_value(body).context("Unexpected login response shape")?;
        if grant.access_token.is_none() {
            anyhow::bail!("No access token in response");
        }
        Ok(grant)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
