//! WebDriver HTTP client
//!
//! Command plumbing for one WebDriver session. A failed response's own
//! error and message are unwrapped from the wire envelope and surfaced as
//! the command's failure.

use serde_json::{json, Value};
use std::sync::Mutex;
use tracing::{debug, info};

use super::protocol::{WireError, WireResponse};
use crate::{Error, Result};

/// HTTP client bound to one driver endpoint
#[derive(Debug)]
pub struct WebDriverClient {
    http: reqwest::Client,
    base: String,
    session_id: Mutex<Option<String>>,
}

impl WebDriverClient {
    /// Create a client for a driver endpoint
    ///
    /// # Arguments
    /// * `base` - driver base URL (e.g., "http://localhost:9515")
    pub fn new<S: Into<String>>(base: S) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base: base.into().trim_end_matches('/').to_string(),
            session_id: Mutex::new(None),
        })
    }

    /// Driver base URL
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Whether a session is currently established
    pub fn has_session(&self) -> bool {
        self.session_id.lock().expect("session id poisoned").is_some()
    }

    fn session_path(&self, suffix: &str) -> Result<String> {
        let guard = self.session_id.lock().expect("session id poisoned");
        let session_id = guard
            .as_ref()
            .ok_or_else(|| Error::session("No WebDriver session established"))?;
        if suffix.is_empty() {
            Ok(format!("/session/{}", session_id))
        } else {
            Ok(format!("/session/{}/{}", session_id, suffix))
        }
    }

    async fn unwrap_response(&self, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::wire(format!("Failed to read response body: {}", e)))?;

        let envelope: WireResponse = serde_json::from_str(&body)
            .map_err(|e| Error::wire(format!("Unparseable response '{}': {}", body, e)))?;

        if !status.is_success() {
            let detail: WireError =
                serde_json::from_value(envelope.value.clone()).unwrap_or(WireError {
                    error: status.to_string(),
                    message: body,
                });
            return Err(classify_wire_error(detail));
        }

        Ok(envelope.value)
    }

    /// GET a session-scoped path
    pub async fn get(&self, suffix: &str) -> Result<Value> {
        let path = self.session_path(suffix)?;
        debug!("GET {}", path);
        let response = self
            .http
            .get(format!("{}{}", self.base, path))
            .send()
            .await
            .map_err(|e| Error::wire(format!("GET {} failed: {}", path, e)))?;
        self.unwrap_response(response).await
    }

    /// POST a session-scoped path
    pub async fn post(&self, suffix: &str, payload: Value) -> Result<Value> {
        let path = self.session_path(suffix)?;
        debug!("POST {}", path);
        let response = self
            .http
            .post(format!("{}{}", self.base, path))
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::wire(format!("POST {} failed: {}", path, e)))?;
        self.unwrap_response(response).await
    }

    /// Query the driver's readiness endpoint
    pub async fn status(&self) -> Result<Value> {
        let response = self
            .http
            .get(format!("{}/status", self.base))
            .send()
            .await
            .map_err(|e| Error::wire(format!("GET /status failed: {}", e)))?;
        self.unwrap_response(response).await
    }

    /// Establish a session with the given capabilities
    pub async fn new_session(&self, capabilities: Value) -> Result<String> {
        info!("Creating WebDriver session at {}", self.base);

        let response = self
            .http
            .post(format!("{}/session", self.base))
            .json(&json!({ "capabilities": { "alwaysMatch": capabilities } }))
            .send()
            .await
            .map_err(|e| Error::session(format!("Failed to create session: {}", e)))?;

        let value = self.unwrap_response(response).await?;
        let session_id = value
            .get("sessionId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::session("No sessionId in new-session response"))?
            .to_string();

        *self.session_id.lock().expect("session id poisoned") = Some(session_id.clone());
        Ok(session_id)
    }

    /// Tear down the current session
    pub async fn delete_session(&self) -> Result<()> {
        let path = self.session_path("")?;
        let response = self
            .http
            .delete(format!("{}{}", self.base, path))
            .send()
            .await
            .map_err(|e| Error::wire(format!("DELETE {} failed: {}", path, e)))?;
        let _ = self.unwrap_response(response).await?;
        *self.session_id.lock().expect("session id poisoned") = None;
        Ok(())
    }
}

/// Surface the driver's own failure under the matching taxonomy entry
fn classify_wire_error(detail: WireError) -> Error {
    match detail.error.as_str() {
        "no such element" | "stale element reference" => Error::ElementNotFound(detail.message),
        "timeout" | "script timeout" => Error::Timeout(detail.message),
        "invalid session id" | "session not created" => Error::Session(detail.message),
        _ => Error::Wire(format!("{}: {}", detail.error, detail.message)),
    }
}
