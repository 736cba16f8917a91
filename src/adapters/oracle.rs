//! Results Oracle Adapter
//!
//! External source of truth for event outcomes. The loose upstream payload
//! is validated into a tagged result at this boundary; unrecognized shapes
//! are rejected here and never reach the engine.

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleStatus {
    Final,
    InProgress,
}

/// Validated oracle verdict. `winning_selection = None` on a Final result
/// means a push: no deterministic winner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleResult {
    pub status: OracleStatus,
    pub winning_selection: Option<String>,
}

impl OracleResult {
    pub fn final_result(winning_selection: Option<&str>) -> Self {
        Self {
            status: OracleStatus::Final,
            winning_selection: winning_selection.map(|s| s.to_string()),
        }
    }

    pub fn in_progress() -> Self {
        Self {
            status: OracleStatus::InProgress,
            winning_selection: None,
        }
    }
}

#[async_trait::async_trait]
pub trait OracleAdapter: Send + Sync {
    async fn get_result(&self, event_ref: &str) -> Result<OracleResult>;
}

/// Raw wire shape from the results feed, before validation.
#[derive(Debug, Deserialize)]
struct RawOraclePayload {
    status: String,
    #[serde(default)]
    winning_selection: Option<String>,
}

impl RawOraclePayload {
    fn validate(self) -> Result<OracleResult> {
        match self.status.as_str() {
            "final" => Ok(OracleResult {
                status: OracleStatus::Final,
                winning_selection: self.winning_selection,
            }),
            "in_progress" | "scheduled" => Ok(OracleResult::in_progress()),
            other => bail!("unrecognized oracle status: {:?}", other),
        }
    }
}

/// HTTP oracle client with a fixed per-call timeout.
pub struct HttpOracleAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOracleAdapter {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build oracle HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Event refs come from user-supplied descriptors, so they ride in a
    /// form-encoded query parameter rather than the URL path.
    fn results_request(&self, event_ref: &str) -> Result<reqwest::Request> {
        self.client
            .get(format!("{}/results", self.base_url))
            .query(&[("event_ref", event_ref)])
            .build()
            .context("Failed to build oracle request")
    }
}

#[async_trait::async_trait]
impl OracleAdapter for HttpOracleAdapter {
    async fn get_result(&self, event_ref: &str) -> Result<OracleResult> {
        debug!(event_ref, "Querying results oracle");

        let response = self
            .client
            .execute(self.results_request(event_ref)?)
            .await
            .context("Oracle request failed")?
            .error_for_status()
            .context("Oracle returned an error status")?;

        let payload: RawOraclePayload = response
            .json()
            .await
            .context("Oracle payload was not valid JSON")?;
        payload.validate()
    }
}

/// Fixed-results oracle for tests and paper runs. Events without a recorded
/// result report InProgress, matching the real feed before an event ends.
#[derive(Default)]
pub struct StaticOracleAdapter {
    results: Mutex<HashMap<String, OracleResult>>,
}

impl StaticOracleAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_result(&self, event_ref: &str, result: OracleResult) {
        self.results.lock().insert(event_ref.to_string(), result);
    }
}

#[async_trait::async_trait]
impl OracleAdapter for StaticOracleAdapter {
    async fn get_result(&self, event_ref: &str) -> Result<OracleResult> {
        Ok(self
            .results
            .lock()
            .get(event_ref)
            .cloned()
            .unwrap_or_else(OracleResult::in_progress))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_validation() {
        let final_win: RawOraclePayload =
            serde_json::from_str(r#"{"status":"final","winning_selection":"HOME"}"#).unwrap();
        let result = final_win.validate().unwrap();
        assert_eq!(result.status, OracleStatus::Final);
        assert_eq!(result.winning_selection.as_deref(), Some("HOME"));

        let push: RawOraclePayload = serde_json::from_str(r#"{"status":"final"}"#).unwrap();
        let result = push.validate().unwrap();
        assert_eq!(result.status, OracleStatus::Final);
        assert!(result.winning_selection.is_none());

        let live: RawOraclePayload =
            serde_json::from_str(r#"{"status":"in_progress"}"#).unwrap();
        assert_eq!(live.validate().unwrap().status, OracleStatus::InProgress);

        // Unknown statuses are rejected at the boundary
        let weird: RawOraclePayload =
            serde_json::from_str(r#"{"status":"abandoned"}"#).unwrap();
        assert!(weird.validate().is_err());
    }

    #[test]
    fn test_results_request_encodes_event_ref() {
        let oracle =
            HttpOracleAdapter::new("http://oracle.test/", Duration::from_secs(5)).unwrap();
        let request = oracle
            .results_request("epl/2026-05-01 arsenal?x=1")
            .unwrap();
        assert_eq!(request.url().path(), "/results");
        assert_eq!(
            request.url().query(),
            Some("event_ref=epl%2F2026-05-01+arsenal%3Fx%3D1")
        );
    }

    #[tokio::test]
    async fn test_static_oracle_defaults_to_in_progress() {
        let oracle = StaticOracleAdapter::new();
        let result = oracle.get_result("unknown-event").await.unwrap();
        assert_eq!(result.status, OracleStatus::InProgress);

        oracle.set_result("evt-1", OracleResult::final_result(Some("AWAY")));
        let result = oracle.get_result("evt-1").await.unwrap();
        assert_eq!(result.winning_selection.as_deref(), Some("AWAY"));
    }
}
