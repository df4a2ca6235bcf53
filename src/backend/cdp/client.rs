//! CDP client
//!
//! Typed Page/Runtime calls over a [`CdpConnection`]. Script failures are
//! unwrapped from the protocol response and surfaced with the page's own
//! exception text.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use super::connection::CdpConnection;
use super::types::EvaluateResponse;
use crate::{Error, Result};

/// High-level client for one CDP target
#[derive(Debug, Clone)]
pub struct CdpClient {
    connection: Arc<CdpConnection>,
}

impl CdpClient {
    /// Wrap an established connection
    pub fn new(connection: Arc<CdpConnection>) -> Self {
        Self { connection }
    }

    /// The underlying connection
    pub fn connection(&self) -> &Arc<CdpConnection> {
        &self.connection
    }

    /// Call a raw CDP method
    pub async fn call_method(&self, method: &str, params: Value) -> Result<Value> {
        self.connection.send_command(method, params).await
    }

    /// Enable a protocol domain
    pub async fn enable_domain(&self, domain: &str) -> Result<()> {
        let method = format!("{}.enable", domain);
        let _ = self.call_method(&method, json!({})).await?;
        Ok(())
    }

    /// Navigate and poll until the document settles
    ///
    /// readyState polling is more robust than load events here: the event
    /// can fire before the command's own response is matched.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        info!("Navigating to {}", url);

        let result = self
            .call_method("Page.navigate", json!({ "url": url }))
            .await?;
        if let Some(error_text) = result.get("errorText").and_then(|v| v.as_str()) {
            return Err(Error::navigation(format!("{}: {}", url, error_text)));
        }

        let max_attempts = 50;
        for attempt in 0..max_attempts {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            match self.evaluate("document.readyState", false).await {
                Ok(Value::String(state)) if state == "complete" => {
                    debug!("Page settled on attempt {}", attempt + 1);
                    return Ok(());
                }
                Ok(_) => {}
                Err(e) => debug!("readyState poll failed on attempt {}: {}", attempt + 1, e),
            }
        }

        info!("Page load polling exhausted; continuing anyway");
        Ok(())
    }

    /// Evaluate JavaScript, returning the result by value
    pub async fn evaluate(&self, script: &str, await_promise: bool) -> Result<Value> {
        let result = self
            .call_method(
                "Runtime.evaluate",
                json!({
                    "expression": script,
                    "awaitPromise": await_promise,
                    "returnByValue": true,
                }),
            )
            .await?;

        let response: EvaluateResponse = serde_json::from_value(result)
            .map_err(|e| Error::cdp(format!("Failed to parse evaluate response: {}", e)))?;

        if let Some(details) = response.exception_details {
            let text = details
                .get("exception")
                .and_then(|e| e.get("description"))
                .and_then(|d| d.as_str())
                .or_else(|| details.get("text").and_then(|t| t.as_str()))
                .unwrap_or("Unknown error");
            return Err(Error::script(text.to_string()));
        }

        Ok(response.result.value.unwrap_or(Value::Null))
    }

    /// Evaluate JavaScript, returning a remote object id
    ///
    /// Used when the result must stay in the page (e.g. resolving a node
    /// for `DOM.setFileInputFiles`).
    pub async fn evaluate_object(&self, script: &str) -> Result<String> {
        let result = self
            .call_method(
                "Runtime.evaluate",
                json!({
                    "expression": script,
                    "returnByValue": false,
                }),
            )
            .await?;

        let response: EvaluateResponse = serde_json::from_value(result)
            .map_err(|e| Error::cdp(format!("Failed to parse evaluate response: {}", e)))?;

        if response.exception_details.is_some() {
            return Err(Error::script("object evaluation raised".to_string()));
        }

        response
            .result
            .object_id
            .ok_or_else(|| Error::cdp("Evaluation produced no object id"))
    }

    /// Full markup of the current document
    pub async fn get_content(&self) -> Result<String> {
        match self
            .evaluate("document.documentElement.outerHTML", false)
            .await?
        {
            Value::String(html) => Ok(html),
            _ => Ok(String::new()),
        }
    }

    /// Reload the current page
    pub async fn reload(&self, ignore_cache: bool) -> Result<()> {
        let _ = self
            .call_method("Page.reload", json!({ "ignoreCache": ignore_cache }))
            .await?;
        Ok(())
    }

    /// Capture a PNG screenshot
    pub async fn screenshot(&self) -> Result<Vec<u8>> {
        let result = self
            .call_method("Page.captureScreenshot", json!({ "format": "png" }))
            .await?;

        let data = result
            .get("data")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::cdp("No data in screenshot result"))?;

        BASE64
            .decode(data)
            .map_err(|e| Error::cdp(format!("Failed to decode screenshot: {}", e)))
    }
}
