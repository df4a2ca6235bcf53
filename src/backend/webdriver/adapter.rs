//! Remote engine adapter
//!
//! Implements the [`Engine`] contract over the WebDriver wire protocol.
//! Node handles are the driver's own element references, valid for the
//! session until the page they belong to is replaced.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::client::WebDriverClient;
use super::protocol::{element_arg, element_id};
use super::service::{DriverKind, DriverService};
use crate::backend::traits::Engine;
use crate::browser::element::NodeHandle;
use crate::browser::locator::{Locator, Query};
use crate::{Error, Result};

const SET_TEXT_SCRIPT: &str = r#"
const el = arguments[0];
const text = arguments[1];
const tag = el.tagName.toLowerCase();
if (tag === 'input' || tag === 'textarea' || tag === 'select') {
    el.value = text;
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
} else {
    el.textContent = text;
}
"#;

const SELECTED_VALUES_SCRIPT: &str =
    "return Array.from(arguments[0].selectedOptions || []).map((o) => o.value);";

const SET_OPTION_SCRIPT: &str = r#"
const el = arguments[0];
const option = Array.from(el.options || []).find((o) => o.value === arguments[1]);
if (!option) return false;
option.selected = arguments[2];
el.dispatchEvent(new Event('change', { bubbles: true }));
return true;
"#;

/// WebDriver-backed remote engine
pub struct WebDriverEngine {
    client: WebDriverClient,
    service: Mutex<Option<DriverService>>,
    closed: AtomicBool,
}

impl WebDriverEngine {
    /// Spawn a vendor driver and open a browser session on it
    pub async fn launch(
        kind: DriverKind,
        executable: &Path,
        port: u16,
        headless: bool,
    ) -> Result<Self> {
        let service = DriverService::start(kind, executable, port).await?;
        let client = WebDriverClient::new(service.endpoint())?;

        let session_id = client.new_session(capabilities(kind, headless)).await?;
        info!("WebDriver session {} on {}", session_id, kind);

        Ok(Self {
            client,
            service: Mutex::new(Some(service)),
            closed: AtomicBool::new(false),
        })
    }

    /// Open a session on an already-running driver endpoint
    pub async fn attach(endpoint: &str) -> Result<Self> {
        let client = WebDriverClient::new(endpoint)?;
        let session_id = client.new_session(json!({})).await?;
        info!("WebDriver session {} on {}", session_id, endpoint);

        Ok(Self {
            client,
            service: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::session("WebDriver session is closed"));
        }
        Ok(())
    }

    /// Run a script with element arguments through the driver
    async fn script(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.client
            .post("execute/sync", json!({ "script": script, "args": args }))
            .await
    }

    async fn find_one_css(&self, selector: &str) -> Result<NodeHandle> {
        let value = self
            .client
            .post(
                "element",
                json!({ "using": "css selector", "value": selector }),
            )
            .await?;
        element_id(&value)
            .map(NodeHandle::new)
            .ok_or_else(|| Error::wire("No element reference in response"))
    }
}

/// Session capabilities for a browser family
fn capabilities(kind: DriverKind, headless: bool) -> Value {
    let mut caps = json!({ "browserName": kind.browser_name() });

    if headless {
        match kind {
            DriverKind::Chrome => {
                caps["goog:chromeOptions"] = json!({
                    "args": ["--headless=new", "--no-sandbox", "--disable-dev-shm-usage"]
                });
            }
            DriverKind::Edge => {
                caps["ms:edgeOptions"] = json!({ "args": ["--headless=new"] });
            }
            DriverKind::Firefox => {
                caps["moz:firefoxOptions"] = json!({ "args": ["-headless"] });
            }
            // Opera and Safari drivers have no headless switch here.
            DriverKind::Opera | DriverKind::Safari => {}
        }
    }

    caps
}

#[async_trait]
impl Engine for WebDriverEngine {
    fn name(&self) -> &str {
        "remote"
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.ensure_open()?;
        let _ = self.client.post("url", json!({ "url": url })).await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        self.ensure_open()?;
        let value = self.client.get("url").await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::wire("URL was not a string"))
    }

    async fn title(&self) -> Result<String> {
        self.ensure_open()?;
        let value = self.client.get("title").await?;
        Ok(value.as_str().unwrap_or("").to_string())
    }

    async fn source(&self) -> Result<String> {
        self.ensure_open()?;
        let value = self.client.get("source").await?;
        Ok(value.as_str().unwrap_or("").to_string())
    }

    async fn execute_script(&self, script: &str) -> Result<Value> {
        self.ensure_open()?;
        self.script(script, Vec::new()).await
    }

    async fn switch_frame(&self, name: Option<&str>) -> Result<()> {
        self.ensure_open()?;
        match name {
            Some(frame_name) => {
                let selector = format!(
                    "iframe[name=\"{0}\"], frame[name=\"{0}\"]",
                    frame_name.replace('"', "\\\"")
                );
                let frame = self
                    .find_one_css(&selector)
                    .await
                    .map_err(|_| Error::element_not_found(format!("frame '{}'", frame_name)))?;
                let _ = self
                    .client
                    .post("frame", json!({ "id": element_arg(frame.as_str()) }))
                    .await?;
            }
            None => {
                let _ = self.client.post("frame", json!({ "id": null })).await?;
            }
        }
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.ensure_open()?;
        let _ = self.client.post("refresh", json!({})).await?;
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.ensure_open()?;
        let value = self.client.get("screenshot").await?;
        let data = value
            .as_str()
            .ok_or_else(|| Error::wire("Screenshot payload was not a string"))?;
        BASE64
            .decode(data)
            .map_err(|e| Error::wire(format!("Failed to decode screenshot: {}", e)))
    }

    async fn body(&self) -> Result<NodeHandle> {
        self.ensure_open()?;
        self.find_one_css("body").await
    }

    async fn find(&self, scope: &NodeHandle, locator: &Locator) -> Result<Vec<NodeHandle>> {
        self.ensure_open()?;
        let (using, value) = match locator.to_query() {
            Query::XPath(xpath) => ("xpath", xpath),
            Query::Css(css) => ("css selector", css),
        };
        let found = self
            .client
            .post(
                &format!("element/{}/elements", scope),
                json!({ "using": using, "value": value }),
            )
            .await?;

        Ok(found
            .as_array()
            .map(|matches| {
                matches
                    .iter()
                    .filter_map(element_id)
                    .map(NodeHandle::new)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn children(&self, node: &NodeHandle) -> Result<Vec<NodeHandle>> {
        self.ensure_open()?;
        let found = self
            .client
            .post(
                &format!("element/{}/elements", node),
                json!({ "using": "xpath", "value": "./*" }),
            )
            .await?;
        Ok(found
            .as_array()
            .map(|matches| {
                matches
                    .iter()
                    .filter_map(element_id)
                    .map(NodeHandle::new)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn parent(&self, node: &NodeHandle) -> Result<Option<NodeHandle>> {
        self.ensure_open()?;
        let result = self
            .client
            .post(
                &format!("element/{}/element", node),
                json!({ "using": "xpath", "value": ".." }),
            )
            .await;
        match result {
            Ok(value) => Ok(element_id(&value).map(NodeHandle::new)),
            Err(Error::ElementNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn tag_name(&self, node: &NodeHandle) -> Result<String> {
        self.ensure_open()?;
        let value = self.client.get(&format!("element/{}/name", node)).await?;
        Ok(value.as_str().unwrap_or("").to_ascii_lowercase())
    }

    async fn attribute(&self, node: &NodeHandle, name: &str) -> Result<Option<String>> {
        self.ensure_open()?;
        let value = self
            .client
            .get(&format!("element/{}/attribute/{}", node, name))
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn set_attribute(&self, node: &NodeHandle, name: &str, value: &str) -> Result<()> {
        self.ensure_open()?;
        let _ = self
            .script(
                "arguments[0].setAttribute(arguments[1], arguments[2]);",
                vec![element_arg(node.as_str()), json!(name), json!(value)],
            )
            .await?;
        Ok(())
    }

    async fn text(&self, node: &NodeHandle) -> Result<String> {
        self.ensure_open()?;
        let value = self.client.get(&format!("element/{}/text", node)).await?;
        Ok(value.as_str().unwrap_or("").to_string())
    }

    async fn set_text(&self, node: &NodeHandle, text: &str) -> Result<()> {
        self.ensure_open()?;
        let _ = self
            .script(
                SET_TEXT_SCRIPT,
                vec![element_arg(node.as_str()), json!(text)],
            )
            .await?;
        Ok(())
    }

    async fn focus(&self, node: &NodeHandle) -> Result<()> {
        self.ensure_open()?;
        let _ = self
            .script(
                "arguments[0].focus();",
                vec![element_arg(node.as_str())],
            )
            .await?;
        Ok(())
    }

    async fn click(&self, node: &NodeHandle) -> Result<()> {
        self.ensure_open()?;
        let _ = self
            .client
            .post(&format!("element/{}/click", node), json!({}))
            .await?;
        Ok(())
    }

    async fn selected_values(&self, node: &NodeHandle) -> Result<Vec<String>> {
        self.ensure_open()?;
        let value = self
            .script(SELECTED_VALUES_SCRIPT, vec![element_arg(node.as_str())])
            .await?;
        Ok(value
            .as_array()
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn set_option_selected(
        &self,
        node: &NodeHandle,
        value: &str,
        selected: bool,
    ) -> Result<()> {
        self.ensure_open()?;
        let found = self
            .script(
                SET_OPTION_SCRIPT,
                vec![element_arg(node.as_str()), json!(value), json!(selected)],
            )
            .await?;
        if found.as_bool() != Some(true) {
            return Err(Error::element_not_found(format!("option '{}'", value)));
        }
        Ok(())
    }

    async fn upload_file(&self, node: &NodeHandle, path: &Path) -> Result<()> {
        self.ensure_open()?;
        let _ = self
            .client
            .post(
                &format!("element/{}/value", node),
                json!({ "text": path.display().to_string() }),
            )
            .await?;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::Relaxed) {
            return Ok(());
        }

        if self.client.has_session() {
            if let Err(e) = self.client.delete_session().await {
                warn!("Session teardown failed: {}", e);
            }
        }

        if let Some(mut service) = self.service.lock().await.take() {
            service.stop().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_headless_chrome() {
        let caps = capabilities(DriverKind::Chrome, true);
        assert_eq!(caps["browserName"], "chrome");
        assert!(caps["goog:chromeOptions"]["args"]
            .as_array()
            .unwrap()
            .iter()
            .any(|a| a == "--headless=new"));
    }

    #[test]
    fn test_capabilities_headful_has_no_options() {
        let caps = capabilities(DriverKind::Chrome, false);
        assert!(caps.get("goog:chromeOptions").is_none());
    }

    #[test]
    fn test_capabilities_safari_ignores_headless() {
        let caps = capabilities(DriverKind::Safari, true);
        assert_eq!(caps["browserName"], "safari");
        assert_eq!(caps.as_object().unwrap().len(), 1);
    }
}
