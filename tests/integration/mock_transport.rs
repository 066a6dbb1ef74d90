//! Mock HTTP transport for integration testing.
//!
//! Scripted responses keyed by method and path, with every request
//! recorded for later inspection. All in-memory, no sockets.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sharpxch::exchange::{
    ApiGateway, Credentials, HttpRequest, HttpResponse, HttpTransport, SessionManager,
    TransportError,
};
use sharpxch::storage::{NullArchive, ResponseArchive};

pub const BASE_URL: &str = "https://backoffice.test";
pub const AUTH_PATH: &str = "/backoffice/connect/token";

type Scripted = Result<HttpResponse, TransportError>;

/// Deterministic stand-in for the backoffice.
///
/// Each route holds a queue of responses; the last one repeats once the
/// queue is down to a single entry. Unknown routes answer 404.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(String, String), VecDeque<Scripted>>>,
    requests: Mutex<Vec<HttpRequest>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every `send`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn respond(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.push(
            method,
            path,
            Ok(HttpResponse {
                status,
                body: body.to_string(),
            }),
        );
        self
    }

    pub fn respond_json(self, method: &str, path: &str, body: serde_json::Value) -> Self {
        let body = body.to_string();
        self.respond(method, path, 200, &body)
    }

    pub fn fail(self, method: &str, path: &str, error: TransportError) -> Self {
        self.push(method, path, Err(error));
        self
    }

    /// Standard successful login.
    pub fn with_login(self) -> Self {
        self.respond_json(
            "POST",
            AUTH_PATH,
            serde_json::json!({"access_token": "tok-1", "refresh_token": "ref-1", "expires_in": 3600}),
        )
    }

    fn push(&self, method: &str, path: &str, response: Scripted) {
        self.routes
            .lock()
            .unwrap()
            .entry((method.to_string(), path.to_string()))
            .or_default()
            .push_back(response);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests whose path (including query) equals `path`.
    pub fn calls_to(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| path_of(&r.url) == path)
            .count()
    }

    pub fn auth_calls(&self) -> usize {
        self.calls_to(AUTH_PATH)
    }

    pub fn total_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

fn path_of(url: &str) -> &str {
    url.strip_prefix(BASE_URL).unwrap_or(url)
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let key = (request.method.to_string(), path_of(&request.url).to_string());
        self.requests.lock().unwrap().push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => Ok(HttpResponse {
                status: 404,
                body: r#"{"error":"not found"}"#.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Wiring helpers
// ---------------------------------------------------------------------------

pub struct Harness {
    pub transport: Arc<MockTransport>,
    pub session: Arc<SessionManager>,
    pub gateway: Arc<ApiGateway>,
}

pub fn harness(transport: MockTransport) -> Harness {
    harness_with_archive(transport, Arc::new(NullArchive))
}

pub fn harness_with_archive(transport: MockTransport, archive: Arc<dyn ResponseArchive>) -> Harness {
    let transport = Arc::new(transport);
    let dyn_transport: Arc<dyn HttpTransport> = transport.clone();
    let session = Arc::new(SessionManager::new(
        dyn_transport.clone(),
        archive.clone(),
        BASE_URL,
        AUTH_PATH,
        Credentials::new("punter", "s3cret"),
    ));
    let gateway = Arc::new(ApiGateway::new(BASE_URL, session.clone(), dyn_transport, archive));
    Harness {
        transport,
        session,
        gateway,
    }
}

// ---------------------------------------------------------------------------
// Canned payloads
// ---------------------------------------------------------------------------

pub fn profile_json() -> serde_json::Value {
    serde_json::json!({
        "email": "punter@example.com",
        "username": "punter",
        "firstName": "Pat",
        "lastName": "Punter",
        "currency": ["EUR"],
        "availableToBet": 1250.5,
        "exposure": 0,
        "joinedDate": "2023-03-14T09:00:00Z",
        "mfaEnabled": false
    })
}

pub fn sports_json() -> serde_json::Value {
    serde_json::json!({"content": [{"id": 1, "name": "Soccer"}, {"id": 2, "name": "Tennis"}]})
}

pub fn matches_json(ids: &[&str]) -> serde_json::Value {
    let matches: Vec<_> = ids
        .iter()
        .map(|id| {
            serde_json::json!({
                "id": id,
                "sport": "Soccer",
                "competition": "Premier League",
                "homeTeam": "Arsenal",
                "awayTeam": "Chelsea",
                "startTime": "2024-05-04T15:00:00Z",
                "status": "SCHEDULED"
            })
        })
        .collect();
    serde_json::json!({"matches": matches, "count": ids.len(), "page": 1, "totalPages": 1})
}

pub fn markets_json(match_id: &str, home_odds: f64, away_odds: f64) -> serde_json::Value {
    serde_json::json!({
        "matchId": match_id,
        "markets": [{
            "id": format!("{match_id}-mr"),
            "matchId": match_id,
            "name": "Match Result",
            "status": "OPEN",
            "selections": [
                {"id": format!("{match_id}-h"), "marketId": format!("{match_id}-mr"), "name": "Arsenal", "odds": home_odds, "status": "ACTIVE"},
                {"id": format!("{match_id}-a"), "marketId": format!("{match_id}-mr"), "name": "Chelsea", "odds": away_odds, "status": "ACTIVE"}
            ]
        }]
    })
}

pub fn bet_json(id: &str, stake: f64, odds: f64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "status": "PLACED",
        "stake": stake,
        "potentialReturn": stake * odds,
        "placedAt": "2024-05-04T14:00:00Z",
        "odds": odds
    })
}
