//! Headless engine adapter
//!
//! Implements the [`Engine`] contract over a CDP target. Node handles are
//! keys into a registry the adapter injects into the page: every script
//! bootstraps `window.__droverReg` idempotently and registers each element
//! it touches under a stable integer id. The registry dies with the page,
//! which is exactly the lifetime the facade assumes for handles.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use super::client::CdpClient;
use super::connection::CdpConnection;
use crate::backend::traits::Engine;
use crate::browser::element::NodeHandle;
use crate::browser::locator::{escape_js_str, Locator, Query};
use crate::{Error, Result};

/// CDP-backed headless engine
pub struct CdpEngine {
    client: CdpClient,
    /// Name of the frame scripts are scoped to; `None` means top document
    frame: Mutex<Option<String>>,
}

impl CdpEngine {
    /// Attach to a browser exposing a DevTools endpoint
    ///
    /// Creates a fresh page target via the HTTP API and connects to its
    /// WebSocket.
    ///
    /// # Arguments
    /// * `endpoint` - DevTools endpoint (e.g., "ws://localhost:9222")
    pub async fn attach(endpoint: &str) -> Result<Self> {
        info!("Attaching headless engine to {}", endpoint);

        let http_endpoint = endpoint
            .replace("ws://", "http://")
            .replace("wss://", "https://");

        let http = reqwest::Client::new();
        let response = http
            .put(format!("{}/json/new?about:blank", http_endpoint))
            .send()
            .await
            .map_err(|e| {
                Error::session(format!(
                    "Failed to reach DevTools endpoint {} (is the browser running with \
                     --remote-debugging-port?): {}",
                    endpoint, e
                ))
            })?;

        let body = response
            .text()
            .await
            .map_err(|e| Error::session(format!("Failed to read target response: {}", e)))?;
        let target: Value = serde_json::from_str(&body)
            .map_err(|e| Error::session(format!("Unexpected target response '{}': {}", body, e)))?;

        let ws_url = target
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::session("No webSocketDebuggerUrl in target response"))?;

        let connection = CdpConnection::connect(ws_url).await?;
        let client = CdpClient::new(connection);
        client.enable_domain("Page").await?;
        client.enable_domain("Runtime").await?;

        Ok(Self {
            client,
            frame: Mutex::new(None),
        })
    }

    /// Wrap an already-connected client
    pub fn from_client(client: CdpClient) -> Self {
        Self {
            client,
            frame: Mutex::new(None),
        }
    }

    fn node_id(handle: &NodeHandle) -> Result<u64> {
        handle
            .as_str()
            .parse()
            .map_err(|_| Error::internal(format!("foreign handle {}", handle)))
    }

    /// Assemble a script with the registry/frame prelude
    fn wrap_script(&self, body: &str) -> String {
        wrap_script(
            self.frame.lock().expect("frame state poisoned").as_deref(),
            body,
        )
    }

    /// Run a whole-document script body and unwrap its `{{ value }}` result
    async fn run(&self, body: &str) -> Result<Value> {
        let script = self.wrap_script(body);
        let value = self.client.evaluate(&script, false).await?;
        Ok(value.get("value").cloned().unwrap_or(Value::Null))
    }

    /// Run a script body against one registered node
    ///
    /// The body sees the element as `el`. A handle whose node is gone from
    /// the registry reads as a missing element.
    async fn node_op(&self, node: &NodeHandle, body: &str) -> Result<Value> {
        let id = Self::node_id(node)?;
        let script = self.wrap_script(&format!(
            "const el = grab({id}); if (!el) return {{ stale: true }}; {body}"
        ));
        let value = self.client.evaluate(&script, false).await?;
        if value
            .get("stale")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
        {
            return Err(Error::element_not_found(format!("node {}", node)));
        }
        Ok(value.get("value").cloned().unwrap_or(Value::Null))
    }

    fn handles_from(value: Value) -> Result<Vec<NodeHandle>> {
        handles_from(value)
    }
}

/// Build the registry/frame prelude around a script body
///
/// Every script re-creates the registry if the page lost it, and resolves
/// `doc` to the scoped frame's document (same-origin only) or the top
/// document.
fn wrap_script(frame: Option<&str>, body: &str) -> String {
    let frame_literal = match frame {
        Some(name) => format!("'{}'", escape_js_str(name)),
        None => "null".to_string(),
    };

    format!(
        r#"(() => {{
const reg = (window.__droverReg = window.__droverReg || {{ seq: 0, nodes: new Map() }});
const frameName = {frame_literal};
let doc = document;
if (frameName) {{
    const holder = document.querySelector('iframe[name="' + frameName + '"], frame[name="' + frameName + '"]');
    if (holder && holder.contentDocument) doc = holder.contentDocument;
}}
const keep = (el) => {{
    if (!el.__droverId) {{ el.__droverId = ++reg.seq; reg.nodes.set(el.__droverId, el); }}
    return el.__droverId;
}};
const grab = (id) => reg.nodes.get(id) || null;
{body}
}})()"#
    )
}

fn handles_from(value: Value) -> Result<Vec<NodeHandle>> {
    value
        .as_array()
        .map(|ids| {
            ids.iter()
                .filter_map(|id| id.as_u64())
                .map(|id| NodeHandle::new(id.to_string()))
                .collect()
        })
        .ok_or_else(|| Error::cdp("Expected an array of node ids"))
}

#[async_trait]
impl Engine for CdpEngine {
    fn name(&self) -> &str {
        "headless"
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.client.navigate(url).await
    }

    async fn current_url(&self) -> Result<String> {
        match self.client.evaluate("window.location.href", false).await? {
            Value::String(url) => Ok(url),
            other => Err(Error::cdp(format!("Unexpected location value: {}", other))),
        }
    }

    async fn title(&self) -> Result<String> {
        match self.client.evaluate("document.title", false).await? {
            Value::String(title) => Ok(title),
            _ => Ok(String::new()),
        }
    }

    async fn source(&self) -> Result<String> {
        match self.run("return { value: doc.documentElement.outerHTML };").await? {
            Value::String(html) => Ok(html),
            _ => Ok(String::new()),
        }
    }

    async fn execute_script(&self, script: &str) -> Result<Value> {
        self.client.evaluate(script, true).await
    }

    async fn switch_frame(&self, name: Option<&str>) -> Result<()> {
        match name {
            Some(frame_name) => {
                let probe = format!(
                    r#"const holder = document.querySelector('iframe[name="{0}"], frame[name="{0}"]');
return {{ value: !!(holder && holder.contentDocument) }};"#,
                    escape_js_str(frame_name)
                );
                let reachable = self
                    .run(&probe)
                    .await?
                    .as_bool()
                    .unwrap_or(false);
                if !reachable {
                    return Err(Error::element_not_found(format!("frame '{}'", frame_name)));
                }
                *self.frame.lock().expect("frame state poisoned") = Some(frame_name.to_string());
            }
            None => {
                *self.frame.lock().expect("frame state poisoned") = None;
            }
        }
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.client.reload(false).await
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.client.screenshot().await
    }

    async fn body(&self) -> Result<NodeHandle> {
        let value = self.run("return { value: keep(doc.body) };").await?;
        value
            .as_u64()
            .map(|id| NodeHandle::new(id.to_string()))
            .ok_or_else(|| Error::cdp("Body registration returned no id"))
    }

    async fn find(&self, scope: &NodeHandle, locator: &Locator) -> Result<Vec<NodeHandle>> {
        let body = match locator.to_query() {
            Query::XPath(xpath) => format!(
                r#"const res = doc.evaluate('{}', el, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
const out = [];
for (let i = 0; i < res.snapshotLength; i++) {{ out.push(keep(res.snapshotItem(i))); }}
return {{ value: out }};"#,
                escape_js_str(&xpath)
            ),
            Query::Css(css) => format!(
                r#"const out = [];
el.querySelectorAll('{}').forEach((found) => out.push(keep(found)));
return {{ value: out }};"#,
                escape_js_str(&css)
            ),
        };
        let value = self.node_op(scope, &body).await?;
        Self::handles_from(value)
    }

    async fn children(&self, node: &NodeHandle) -> Result<Vec<NodeHandle>> {
        let value = self
            .node_op(node, "return { value: Array.from(el.children).map(keep) };")
            .await?;
        Self::handles_from(value)
    }

    async fn parent(&self, node: &NodeHandle) -> Result<Option<NodeHandle>> {
        let value = self
            .node_op(
                node,
                "const p = el.parentElement; return { value: p ? keep(p) : null };",
            )
            .await?;
        Ok(value.as_u64().map(|id| NodeHandle::new(id.to_string())))
    }

    async fn tag_name(&self, node: &NodeHandle) -> Result<String> {
        let value = self
            .node_op(node, "return { value: el.tagName.toLowerCase() };")
            .await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::cdp("Tag name was not a string"))
    }

    async fn attribute(&self, node: &NodeHandle, name: &str) -> Result<Option<String>> {
        let body = format!(
            "return {{ value: el.getAttribute('{}') }};",
            escape_js_str(name)
        );
        let value = self.node_op(node, &body).await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn set_attribute(&self, node: &NodeHandle, name: &str, value: &str) -> Result<()> {
        let body = format!(
            "el.setAttribute('{}', '{}'); return {{ value: true }};",
            escape_js_str(name),
            escape_js_str(value)
        );
        self.node_op(node, &body).await?;
        Ok(())
    }

    async fn text(&self, node: &NodeHandle) -> Result<String> {
        let value = self
            .node_op(node, "return { value: el.textContent || '' };")
            .await?;
        Ok(value.as_str().unwrap_or("").to_string())
    }

    async fn set_text(&self, node: &NodeHandle, text: &str) -> Result<()> {
        let body = format!(
            r#"const tag = el.tagName.toLowerCase();
if (tag === 'input' || tag === 'textarea' || tag === 'select') {{
    el.value = '{0}';
    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
}} else {{
    el.textContent = '{0}';
}}
return {{ value: true }};"#,
            escape_js_str(text)
        );
        self.node_op(node, &body).await?;
        Ok(())
    }

    async fn focus(&self, node: &NodeHandle) -> Result<()> {
        self.node_op(node, "el.focus(); return { value: true };")
            .await?;
        Ok(())
    }

    async fn click(&self, node: &NodeHandle) -> Result<()> {
        self.node_op(node, "el.click(); return { value: true };")
            .await?;
        Ok(())
    }

    async fn selected_values(&self, node: &NodeHandle) -> Result<Vec<String>> {
        let value = self
            .node_op(
                node,
                "return { value: Array.from(el.selectedOptions || []).map((o) => o.value) };",
            )
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
        let body = format!(
            r#"const option = Array.from(el.options || []).find((o) => o.value === '{}');
if (!option) return {{ value: false }};
option.selected = {};
el.dispatchEvent(new Event('change', {{ bubbles: true }}));
return {{ value: true }};"#,
            escape_js_str(value),
            selected
        );
        let found = self.node_op(node, &body).await?;
        if found.as_bool() != Some(true) {
            return Err(Error::element_not_found(format!("option '{}'", value)));
        }
        Ok(())
    }

    async fn upload_file(&self, node: &NodeHandle, path: &Path) -> Result<()> {
        let id = Self::node_id(node)?;

        // The registry entry must be resolved to a protocol node before
        // DOM.setFileInputFiles can target it.
        let script = self.wrap_script(&format!("return grab({id});"));
        let object_id = self.client.evaluate_object(&script).await?;

        let _ = self
            .client
            .call_method("DOM.getDocument", json!({ "depth": 0 }))
            .await?;
        let node_info = self
            .client
            .call_method("DOM.requestNode", json!({ "objectId": object_id }))
            .await?;
        let node_id = node_info
            .get("nodeId")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| Error::cdp("DOM.requestNode returned no nodeId"))?;

        debug!("Uploading {} into node {}", path.display(), node_id);
        let _ = self
            .client
            .call_method(
                "DOM.setFileInputFiles",
                json!({
                    "files": [path.display().to_string()],
                    "nodeId": node_id,
                }),
            )
            .await?;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        !self.client.connection().is_active()
    }

    async fn close(&self) -> Result<()> {
        self.client.connection().close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wrap_script_top_document() {
        let script = wrap_script(None, "return { value: 1 };");
        assert!(script.contains("window.__droverReg"));
        assert!(script.contains("const frameName = null;"));
    }

    #[test]
    fn test_wrap_script_frame_scoped() {
        let script = wrap_script(Some("content"), "return { value: 1 };");
        assert!(script.contains("const frameName = 'content';"));
        assert!(script.contains("contentDocument"));
    }

    #[test]
    fn test_handles_from_array() {
        let handles = handles_from(json!([3, 7, 11])).unwrap();
        assert_eq!(handles.len(), 3);
        assert_eq!(handles[0].as_str(), "3");
    }

    #[test]
    fn test_handles_from_non_array() {
        assert!(handles_from(json!("nope")).is_err());
    }
}
