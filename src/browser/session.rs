//! Browser facade
//!
//! One caller-visible surface over any [`Engine`]. The facade owns the
//! element identity cache and the working selection set, and enforces the
//! DOM-snapshot rules: navigation, script execution, frame switches and
//! reloads drop every cached wrapper and reset the selection to `[body]`,
//! because engine handles may be recycled for unrelated nodes afterwards.
//!
//! Failure policy: whole-session operations catch, log and degrade so a
//! long automation run survives an occasionally unstable page; per-element
//! operations propagate errors to the immediate caller. Nothing retries.

use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::traits::Engine;
use crate::browser::element::{Element, ElementCache, NodeHandle};
use crate::browser::locator::Locator;
use crate::Result;

/// Cadence of the polling wait primitives
const WAIT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Backend-agnostic browser session
pub struct Browser {
    id: Uuid,
    engine: Arc<dyn Engine>,
    elements: Mutex<ElementCache>,
    selection: Mutex<Vec<Element>>,
}

impl Browser {
    /// Wrap an engine session in a facade
    ///
    /// The initial selection is the current document's body.
    pub async fn new(engine: Arc<dyn Engine>) -> Self {
        let browser = Self {
            id: Uuid::new_v4(),
            engine,
            elements: Mutex::new(ElementCache::new()),
            selection: Mutex::new(Vec::new()),
        };
        browser.reset_after_snapshot().await;
        browser
    }

    /// Facade instance id, used in logs
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The engine this facade drives
    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// Resolve a handle through the identity cache
    fn element(&self, handle: NodeHandle) -> Element {
        self.elements.lock().expect("element cache poisoned").resolve(handle)
    }

    fn resolve_all(&self, handles: Vec<NodeHandle>) -> Vec<Element> {
        let mut cache = self.elements.lock().expect("element cache poisoned");
        handles.into_iter().map(|h| cache.resolve(h)).collect()
    }

    /// Drop the whole cache and reset the selection to `[body]`
    ///
    /// Partial invalidation would be unsafe: handles may be recycled for
    /// unrelated nodes after any snapshot boundary.
    async fn reset_after_snapshot(&self) {
        self.elements.lock().expect("element cache poisoned").clear();

        let body = match self.engine.body().await {
            Ok(handle) => Some(self.element(handle)),
            Err(e) => {
                warn!(session = %self.id, "body lookup failed after snapshot change: {}", e);
                None
            }
        };

        let mut selection = self.selection.lock().expect("selection poisoned");
        selection.clear();
        if let Some(body) = body {
            selection.push(body);
        }
    }

    // ------------------------------------------------------------------
    // Whole-session operations (degrade-and-log)
    // ------------------------------------------------------------------

    /// Navigate to a URL
    ///
    /// Clears the element cache and resets the selection to `[body]`.
    pub async fn load(&self, url: &str) {
        debug!(session = %self.id, "loading {}", url);
        if let Err(e) = self.engine.navigate(url).await {
            warn!(session = %self.id, "navigation to {} failed: {}", url, e);
        }
        self.reset_after_snapshot().await;
    }

    /// URL of the current page, or `None` if the engine could not say
    pub async fn current_url(&self) -> Option<String> {
        match self.engine.current_url().await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(session = %self.id, "current_url failed: {}", e);
                None
            }
        }
    }

    /// Title of the current page, or `None` if the engine could not say
    pub async fn title(&self) -> Option<String> {
        match self.engine.title().await {
            Ok(title) => Some(title),
            Err(e) => {
                warn!(session = %self.id, "title read failed: {}", e);
                None
            }
        }
    }

    /// Markup of the current page, or `None` if the engine could not say
    pub async fn source(&self) -> Option<String> {
        match self.engine.source().await {
            Ok(source) => Some(source),
            Err(e) => {
                warn!(session = %self.id, "source read failed: {}", e);
                None
            }
        }
    }

    /// Execute JavaScript in the current page
    ///
    /// The script may have mutated the DOM arbitrarily, so this clears the
    /// element cache and resets the selection to `[body]` even when the
    /// script itself failed.
    pub async fn execute_script(&self, script: &str) -> Option<Value> {
        let result = match self.engine.execute_script(script).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(session = %self.id, "script execution failed: {}", e);
                None
            }
        };
        self.reset_after_snapshot().await;
        result
    }

    /// Switch to a named frame, or back to the top document
    ///
    /// Clears the element cache and resets the selection to the target
    /// document's `[body]`.
    pub async fn switch_frame(&self, name: Option<&str>) {
        if let Err(e) = self.engine.switch_frame(name).await {
            warn!(session = %self.id, "frame switch to {:?} failed: {}", name, e);
        }
        self.reset_after_snapshot().await;
    }

    /// Reload the current page
    ///
    /// A snapshot boundary like [`load`](Self::load).
    pub async fn reload(&self) {
        if let Err(e) = self.engine.reload().await {
            warn!(session = %self.id, "reload failed: {}", e);
        }
        self.reset_after_snapshot().await;
    }

    /// Capture a PNG screenshot, or `None` if the engine could not
    pub async fn screenshot(&self) -> Option<Vec<u8>> {
        match self.engine.screenshot().await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(session = %self.id, "screenshot failed: {}", e);
                None
            }
        }
    }

    /// Release the backend session
    ///
    /// Cached wrappers are not touched; they are moot once the session is
    /// closed.
    pub async fn close(&self) {
        if let Err(e) = self.engine.close().await {
            warn!(session = %self.id, "close failed: {}", e);
        }
    }

    /// Whether the backend session has been released
    pub fn is_closed(&self) -> bool {
        self.engine.is_closed()
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// The current working selection
    pub fn selection(&self) -> Vec<Element> {
        self.selection.lock().expect("selection poisoned").clone()
    }

    /// Reset the selection to `[body]`, then narrow by the locator
    pub async fn select_elements(&self, locator: &Locator) -> Result<Vec<Element>> {
        let body = self.element(self.engine.body().await?);
        self.narrow(vec![body], locator).await
    }

    /// Narrow the current selection by the locator
    ///
    /// Each selected element's subtree is searched; the selection is
    /// replaced by the union of matches. Ancestors are never introduced.
    pub async fn select_more_elements(&self, locator: &Locator) -> Result<Vec<Element>> {
        let current = self.selection();
        self.narrow(current, locator).await
    }

    async fn narrow(&self, scope: Vec<Element>, locator: &Locator) -> Result<Vec<Element>> {
        let mut matches = Vec::new();
        for element in &scope {
            matches.extend(self.engine.find(element.handle(), locator).await?);
        }
        let elements = self.resolve_all(matches);
        *self.selection.lock().expect("selection poisoned") = elements.clone();
        Ok(elements)
    }

    // ------------------------------------------------------------------
    // Element access
    // ------------------------------------------------------------------

    /// Every descendant of `parent` (or of the document body), depth-first
    ///
    /// Materialized eagerly: traversal cost is dominated by per-node engine
    /// calls either way. A failure mid-traversal returns whatever was
    /// collected rather than aborting.
    pub async fn all_elements(&self, parent: Option<&Element>) -> Vec<Element> {
        let root = match parent {
            Some(element) => element.handle().clone(),
            None => match self.engine.body().await {
                Ok(handle) => handle,
                Err(e) => {
                    warn!(session = %self.id, "body lookup failed: {}", e);
                    return Vec::new();
                }
            },
        };

        let mut stack = match self.engine.children(&root).await {
            Ok(mut children) => {
                children.reverse();
                children
            }
            Err(e) => {
                warn!(session = %self.id, "descendant traversal failed at the root: {}", e);
                return Vec::new();
            }
        };

        let mut collected = Vec::new();
        while let Some(handle) = stack.pop() {
            collected.push(handle.clone());
            match self.engine.children(&handle).await {
                Ok(children) => {
                    for child in children.iter().rev() {
                        stack.push(child.clone());
                    }
                }
                Err(e) => {
                    debug!(session = %self.id, "descendant traversal stopped early: {}", e);
                    break;
                }
            }
        }
        self.resolve_all(collected)
    }

    /// Parent of an element, `None` at the document root
    pub async fn parent(&self, element: &Element) -> Result<Option<Element>> {
        Ok(self
            .engine
            .parent(element.handle())
            .await?
            .map(|handle| self.element(handle)))
    }

    /// Direct children of an element
    pub async fn children(&self, element: &Element) -> Result<Vec<Element>> {
        let handles = self.engine.children(element.handle()).await?;
        Ok(self.resolve_all(handles))
    }

    /// Lower-cased tag name
    pub async fn tag_name(&self, element: &Element) -> Result<String> {
        self.engine.tag_name(element.handle()).await
    }

    /// Attribute value, `None` when absent
    pub async fn attribute(&self, element: &Element, name: &str) -> Result<Option<String>> {
        self.engine.attribute(element.handle(), name).await
    }

    /// Set an attribute value
    pub async fn set_attribute(&self, element: &Element, name: &str, value: &str) -> Result<()> {
        self.engine.set_attribute(element.handle(), name, value).await
    }

    /// Visible text content
    pub async fn text(&self, element: &Element) -> Result<String> {
        self.engine.text(element.handle()).await
    }

    /// Replace the element's text; form controls receive it as their value
    pub async fn set_text(&self, element: &Element, text: &str) -> Result<()> {
        self.engine.set_text(element.handle(), text).await
    }

    /// Give the element input focus
    pub async fn focus(&self, element: &Element) -> Result<()> {
        self.engine.focus(element.handle()).await
    }

    /// Click the element
    pub async fn click(&self, element: &Element) -> Result<()> {
        self.engine.click(element.handle()).await
    }

    /// Values of the selected options of a `<select>`
    pub async fn selected_values(&self, element: &Element) -> Result<Vec<String>> {
        self.engine.selected_values(element.handle()).await
    }

    /// Select or deselect the option with the given value
    pub async fn set_option_selected(
        &self,
        element: &Element,
        value: &str,
        selected: bool,
    ) -> Result<()> {
        self.engine
            .set_option_selected(element.handle(), value, selected)
            .await
    }

    /// Attach a local file to a file input
    pub async fn upload_file(&self, element: &Element, path: &Path) -> Result<()> {
        self.engine.upload_file(element.handle(), path).await
    }

    // ------------------------------------------------------------------
    // Polling waits
    // ------------------------------------------------------------------

    /// Wait until the locator matches somewhere under `body`
    ///
    /// Polls at a fixed cadence, re-running the full search each iteration.
    /// Returns in all cases (condition met, engine closed, or deadline
    /// reached) without distinguishing them; re-check the condition after
    /// the call if the distinction matters. Errors during a poll iteration
    /// count as "not yet".
    pub async fn wait_for_found(&self, locator: &Locator, timeout_secs: u64) {
        self.wait_until(locator, timeout_secs, |count| count > 0).await;
    }

    /// Wait until the locator no longer matches anywhere under `body`
    ///
    /// Same contract as [`wait_for_found`](Self::wait_for_found).
    pub async fn wait_for_lost(&self, locator: &Locator, timeout_secs: u64) {
        self.wait_until(locator, timeout_secs, |count| count == 0).await;
    }

    async fn wait_until<F>(&self, locator: &Locator, timeout_secs: u64, satisfied: F)
    where
        F: Fn(usize) -> bool,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_secs);
        loop {
            if self.engine.is_closed() {
                debug!(session = %self.id, "wait aborted: engine closed");
                return;
            }

            match self.search_from_body(locator).await {
                Ok(count) if satisfied(count) => return,
                Ok(_) => {}
                Err(e) => {
                    // Transient page instability reads as "not yet".
                    debug!(session = %self.id, "wait poll failed: {}", e);
                }
            }

            if tokio::time::Instant::now() >= deadline {
                debug!(session = %self.id, "wait deadline reached for {}", locator);
                return;
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    async fn search_from_body(&self, locator: &Locator) -> Result<usize> {
        let body = self.engine.body().await?;
        Ok(self.engine.find(&body, locator).await?.len())
    }
}

impl std::fmt::Debug for Browser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Browser")
            .field("id", &self.id)
            .field("engine", &self.engine.name())
            .finish()
    }
}
