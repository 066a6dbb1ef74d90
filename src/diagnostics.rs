//! Endpoint explorer.
//!
//! Tries a list of likely backoffice paths with the current session and
//! reports which ones answer. Used to map the API; not part of a normal run.

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::exchange::{ApiGateway, HttpRequest, TransportError};
use crate::storage::{ResponseCategory, ResponseStatus};
use crate::types::ExchangeError;

pub const CHECK_TIMEOUT: Duration = Duration::from_secs(10);

pub const CANDIDATE_PATHS: &[&str] = &[
    "/backoffice/api/sports",
    "/backoffice/api/matches",
    "/backoffice/api/events",
    "/backoffice/api/competitions",
    "/backoffice/api/markets",
    "/backoffice/api/odds",
    "/backoffice/api/bets",
    "/backoffice/api/account",
    "/backoffice/api/balance",
    "/backoffice/api/transactions",
    "/backoffice/api/user",
    "/backoffice/api/users/me",
    "/backoffice/api/profile",
];

/// Number of list items kept as a sample.
const SAMPLE_ITEMS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointCheck {
    /// `None` when no response came back.
    pub status: Option<u16>,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn sample_of(body: &str) -> Value {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(items)) => {
            Value::Array(items.into_iter().take(SAMPLE_ITEMS).collect())
        }
        Ok(other) => other,
        Err(_) => Value::String("Not JSON data".to_string()),
    }
}

/// Try every candidate path. Fails only if we cannot authenticate.
pub async fn explore_endpoints(
    gateway: &ApiGateway,
) -> Result<BTreeMap<String, EndpointCheck>, ExchangeError> {
    let token = gateway
        .session()
        .valid_token()
        .await
        .ok_or(ExchangeError::Authentication)?;

    let checks = CANDIDATE_PATHS.iter().map(|path| {
        let request = HttpRequest::get(format!("{}{path}", gateway.base_url()))
            .header("Authorization", format!("Bearer {token}"))
            .timeout(CHECK_TIMEOUT);
        async move {
            debug!(path, "Checking endpoint");
            let check = match gateway.transport().send(request).await {
                Ok(resp) => {
                    let available = resp.is_success();
                    EndpointCheck {
                        status: Some(resp.status),
                        available,
                        sample: available.then(|| sample_of(&resp.body)),
                        error: None,
                    }
                }
                Err(e) => EndpointCheck {
                    status: None,
                    available: false,
                    sample: None,
                    error: Some(match e {
                        TransportError::Timeout => "timed out".to_string(),
                        TransportError::Network(message) => message,
                    }),
                },
            };
            (path.to_string(), check)
        }
    });

    let results: BTreeMap<String, EndpointCheck> = join_all(checks).await.into_iter().collect();

    let summary = serde_json::to_value(&results).unwrap_or(Value::Null);
    gateway
        .archive()
        .save(&summary, ResponseCategory::Endpoints, ResponseStatus::Success);

    info!(
        checked = results.len(),
        available = results.values().filter(|p| p.available).count(),
        "Endpoint exploration complete"
    );
    Ok(results)
}
