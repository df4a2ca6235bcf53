//! Engine contract
//!
//! The single abstraction every automation backend implements. The two
//! concrete engines are wire-incompatible (raw CDP over a WebSocket versus
//! the W3C WebDriver HTTP protocol) but must be observably identical
//! through this trait; the facade in [`crate::browser`] depends on nothing
//! else.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use crate::browser::element::NodeHandle;
use crate::browser::locator::Locator;
use crate::Result;

/// One automation backend session
///
/// Whole-session operations act on the current page; node operations take
/// the opaque handles the engine itself produced. Handles are only
/// meaningful for the engine that issued them, and only until the next
/// DOM-snapshot boundary (navigation, script execution, frame switch,
/// reload).
#[async_trait]
pub trait Engine: Send + Sync {
    /// Short backend name ("headless", "remote", ...)
    fn name(&self) -> &str;

    /// Navigate the current page to a URL
    async fn navigate(&self, url: &str) -> Result<()>;

    /// URL of the current page
    async fn current_url(&self) -> Result<String>;

    /// Title of the current page
    async fn title(&self) -> Result<String>;

    /// Full markup of the current page
    async fn source(&self) -> Result<String>;

    /// Evaluate JavaScript in the current page
    async fn execute_script(&self, script: &str) -> Result<Value>;

    /// Re-target subsequent operations at a named frame, or at the top
    /// document when `name` is `None`
    async fn switch_frame(&self, name: Option<&str>) -> Result<()>;

    /// Reload the current page
    async fn reload(&self) -> Result<()>;

    /// Capture a PNG screenshot of the current page
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// Handle of the current document's body element
    async fn body(&self) -> Result<NodeHandle>;

    /// Descendants of `scope` matching the locator, in document order
    async fn find(&self, scope: &NodeHandle, locator: &Locator) -> Result<Vec<NodeHandle>>;

    /// Direct child elements, in document order
    async fn children(&self, node: &NodeHandle) -> Result<Vec<NodeHandle>>;

    /// Parent element, `None` at the document root
    async fn parent(&self, node: &NodeHandle) -> Result<Option<NodeHandle>>;

    /// Lower-cased tag name
    async fn tag_name(&self, node: &NodeHandle) -> Result<String>;

    /// Attribute value, `None` when the attribute is absent
    async fn attribute(&self, node: &NodeHandle, name: &str) -> Result<Option<String>>;

    /// Set an attribute value
    async fn set_attribute(&self, node: &NodeHandle, name: &str, value: &str) -> Result<()>;

    /// Visible text content
    async fn text(&self, node: &NodeHandle) -> Result<String>;

    /// Replace the element's text; form controls receive it as their value
    async fn set_text(&self, node: &NodeHandle, text: &str) -> Result<()>;

    /// Give the element input focus
    async fn focus(&self, node: &NodeHandle) -> Result<()>;

    /// Click the element
    async fn click(&self, node: &NodeHandle) -> Result<()>;

    /// Values of the currently selected options of a `<select>`
    async fn selected_values(&self, node: &NodeHandle) -> Result<Vec<String>>;

    /// Select or deselect the option with the given value
    async fn set_option_selected(
        &self,
        node: &NodeHandle,
        value: &str,
        selected: bool,
    ) -> Result<()>;

    /// Attach a local file to a file input
    async fn upload_file(&self, node: &NodeHandle, path: &Path) -> Result<()>;

    /// Whether the session has been closed
    fn is_closed(&self) -> bool;

    /// Release the backend session
    async fn close(&self) -> Result<()>;
}
