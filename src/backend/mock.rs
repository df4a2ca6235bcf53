//! Mock engine for testing
//!
//! An in-memory node table implementing the full [`Engine`] contract, used
//! by unit and integration tests in place of a real backend. Locator
//! matching is structural; tests can mutate the tree while a wait primitive
//! is polling, and can inject failures per node.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::backend::traits::Engine;
use crate::browser::element::NodeHandle;
use crate::browser::locator::Locator;
use crate::{Error, Result};

/// Declarative node description for building a mock DOM
#[derive(Debug, Clone, Default)]
pub struct NodeSpec {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    pub fn new<S: Into<String>>(tag: S) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn attr<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn text<S: Into<String>>(mut self, text: S) -> Self {
        self.text = text.into();
        self
    }

    pub fn child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug)]
struct MockNode {
    tag: String,
    attrs: HashMap<String, String>,
    text: String,
    parent: Option<usize>,
    children: Vec<usize>,
}

#[derive(Debug, Default)]
struct MockState {
    nodes: HashMap<usize, MockNode>,
    next_id: usize,
    current_url: Option<String>,
    scripts: Vec<String>,
    frame: Option<String>,
    fail_children: HashSet<usize>,
}

impl MockState {
    fn insert(&mut self, spec: NodeSpec, parent: Option<usize>) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(
            id,
            MockNode {
                tag: spec.tag,
                attrs: spec.attrs.into_iter().collect(),
                text: spec.text,
                parent,
                children: Vec::new(),
            },
        );
        if let Some(parent_id) = parent {
            if let Some(parent_node) = self.nodes.get_mut(&parent_id) {
                parent_node.children.push(id);
            }
        }
        for child in spec.children {
            self.insert(child, Some(id));
        }
        id
    }

    fn subtree_text(&self, id: usize) -> String {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(&current) {
                out.push_str(&node.text);
                for child in node.children.iter().rev() {
                    stack.push(*child);
                }
            }
        }
        out
    }

    fn descendants(&self, scope: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self
            .nodes
            .get(&scope)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(node) = self.nodes.get(&current) {
                for child in node.children.iter().rev() {
                    stack.push(*child);
                }
            }
        }
        out
    }

    fn matches(&self, id: usize, locator: &Locator) -> Result<bool> {
        let node = self
            .nodes
            .get(&id)
            .ok_or_else(|| Error::element_not_found(format!("node {}", id)))?;

        Ok(match locator {
            Locator::Attribute { name, value } => node.attrs.get(name) == Some(value),
            Locator::Tag { name, text } => {
                node.tag == *name
                    && text
                        .as_ref()
                        .map(|fragment| self.subtree_text(id).contains(fragment))
                        .unwrap_or(true)
            }
            Locator::Css(selector) => self.matches_simple_css(node, selector)?,
            Locator::XPath(expression) => self.matches_simple_xpath(node, expression)?,
        })
    }

    /// Tag, `#id`, `.class` and `tag.class` forms; enough for tests
    fn matches_simple_css(&self, node: &MockNode, selector: &str) -> Result<bool> {
        if let Some(id) = selector.strip_prefix('#') {
            return Ok(node.attrs.get("id").map(String::as_str) == Some(id));
        }
        if let Some(class) = selector.strip_prefix('.') {
            return Ok(self.has_class(node, class));
        }
        if let Some((tag, class)) = selector.split_once('.') {
            return Ok(node.tag == tag && self.has_class(node, class));
        }
        if selector.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Ok(node.tag == selector);
        }
        Err(Error::internal(format!(
            "mock engine does not understand css selector '{}'",
            selector
        )))
    }

    fn has_class(&self, node: &MockNode, class: &str) -> bool {
        node.attrs
            .get("class")
            .map(|classes| classes.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    /// `.//tag` and `.//*[@name='value']` forms; enough for tests
    fn matches_simple_xpath(&self, node: &MockNode, expression: &str) -> Result<bool> {
        let rest = expression.strip_prefix(".//").ok_or_else(|| {
            Error::internal(format!(
                "mock engine does not understand xpath '{}'",
                expression
            ))
        })?;

        if let Some(predicate) = rest.strip_prefix("*[@").and_then(|p| p.strip_suffix(']')) {
            if let Some((name, quoted)) = predicate.split_once('=') {
                let value = quoted.trim_matches(|c| c == '\'' || c == '"');
                return Ok(node.attrs.get(name).map(String::as_str) == Some(value));
            }
        }
        if rest.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Ok(node.tag == rest);
        }
        Err(Error::internal(format!(
            "mock engine does not understand xpath '{}'",
            expression
        )))
    }
}

/// In-memory engine used by tests
pub struct MockEngine {
    state: Mutex<MockState>,
    closed: AtomicBool,
    body_id: usize,
}

impl MockEngine {
    /// Build a mock engine whose body has the given children
    pub fn new(children: Vec<NodeSpec>) -> Self {
        let mut state = MockState::default();
        let body_id = state.insert(NodeSpec::new("body"), None);
        for child in children {
            state.insert(child, Some(body_id));
        }
        Self {
            state: Mutex::new(state),
            closed: AtomicBool::new(false),
            body_id,
        }
    }

    /// Empty-page mock engine
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    fn parse(handle: &NodeHandle) -> Result<usize> {
        handle
            .as_str()
            .parse()
            .map_err(|_| Error::internal(format!("foreign handle {}", handle)))
    }

    fn handle(id: usize) -> NodeHandle {
        NodeHandle::new(id.to_string())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(Error::session("mock engine is closed"));
        }
        Ok(())
    }

    /// Attach a subtree under an existing node while the session runs
    pub fn add_node(&self, parent: &NodeHandle, spec: NodeSpec) -> Result<NodeHandle> {
        let parent_id = Self::parse(parent)?;
        let mut state = self.state.lock().expect("mock state poisoned");
        let id = state.insert(spec, Some(parent_id));
        Ok(Self::handle(id))
    }

    /// Detach a node (and its subtree) from the tree
    pub fn remove_node(&self, node: &NodeHandle) -> Result<()> {
        let id = Self::parse(node)?;
        let mut state = self.state.lock().expect("mock state poisoned");
        let parent = state.nodes.get(&id).and_then(|n| n.parent);
        if let Some(parent_id) = parent {
            if let Some(parent_node) = state.nodes.get_mut(&parent_id) {
                parent_node.children.retain(|c| *c != id);
            }
        }
        let mut doomed = vec![id];
        doomed.extend(state.descendants(id));
        for dead in doomed {
            state.nodes.remove(&dead);
        }
        Ok(())
    }

    /// Make `children()` fail for one node, for partial-traversal tests
    pub fn fail_children_of(&self, node: &NodeHandle) -> Result<()> {
        let id = Self::parse(node)?;
        self.state
            .lock()
            .expect("mock state poisoned")
            .fail_children
            .insert(id);
        Ok(())
    }

    /// The frame the session is currently switched to
    pub fn current_frame(&self) -> Option<String> {
        self.state
            .lock()
            .expect("mock state poisoned")
            .frame
            .clone()
    }

    /// The most recently loaded URL
    pub fn last_url(&self) -> Option<String> {
        self.state
            .lock()
            .expect("mock state poisoned")
            .current_url
            .clone()
    }

    /// Scripts executed so far
    pub fn script_log(&self) -> Vec<String> {
        self.state
            .lock()
            .expect("mock state poisoned")
            .scripts
            .clone()
    }
}

#[async_trait]
impl Engine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.ensure_open()?;
        self.state.lock().expect("mock state poisoned").current_url = Some(url.to_string());
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        self.ensure_open()?;
        Ok(self
            .state
            .lock()
            .expect("mock state poisoned")
            .current_url
            .clone()
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn title(&self) -> Result<String> {
        self.ensure_open()?;
        Ok("Mock Page".to_string())
    }

    async fn source(&self) -> Result<String> {
        self.ensure_open()?;
        Ok("<html><body></body></html>".to_string())
    }

    async fn execute_script(&self, script: &str) -> Result<Value> {
        self.ensure_open()?;
        self.state
            .lock()
            .expect("mock state poisoned")
            .scripts
            .push(script.to_string());
        Ok(Value::Null)
    }

    async fn switch_frame(&self, name: Option<&str>) -> Result<()> {
        self.ensure_open()?;
        self.state.lock().expect("mock state poisoned").frame = name.map(str::to_string);
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.ensure_open()
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.ensure_open()?;
        // Minimal PNG header, enough for callers that only sniff the magic
        Ok(vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A])
    }

    async fn body(&self) -> Result<NodeHandle> {
        self.ensure_open()?;
        Ok(Self::handle(self.body_id))
    }

    async fn find(&self, scope: &NodeHandle, locator: &Locator) -> Result<Vec<NodeHandle>> {
        self.ensure_open()?;
        let scope_id = Self::parse(scope)?;
        let state = self.state.lock().expect("mock state poisoned");
        if !state.nodes.contains_key(&scope_id) {
            return Err(Error::element_not_found(format!("node {}", scope_id)));
        }
        let mut out = Vec::new();
        for id in state.descendants(scope_id) {
            if state.matches(id, locator)? {
                out.push(Self::handle(id));
            }
        }
        Ok(out)
    }

    async fn children(&self, node: &NodeHandle) -> Result<Vec<NodeHandle>> {
        self.ensure_open()?;
        let id = Self::parse(node)?;
        let state = self.state.lock().expect("mock state poisoned");
        if state.fail_children.contains(&id) {
            return Err(Error::internal("injected children failure"));
        }
        state
            .nodes
            .get(&id)
            .map(|n| n.children.iter().map(|c| Self::handle(*c)).collect())
            .ok_or_else(|| Error::element_not_found(format!("node {}", id)))
    }

    async fn parent(&self, node: &NodeHandle) -> Result<Option<NodeHandle>> {
        self.ensure_open()?;
        let id = Self::parse(node)?;
        let state = self.state.lock().expect("mock state poisoned");
        state
            .nodes
            .get(&id)
            .map(|n| n.parent.map(Self::handle))
            .ok_or_else(|| Error::element_not_found(format!("node {}", id)))
    }

    async fn tag_name(&self, node: &NodeHandle) -> Result<String> {
        self.ensure_open()?;
        let id = Self::parse(node)?;
        let state = self.state.lock().expect("mock state poisoned");
        state
            .nodes
            .get(&id)
            .map(|n| n.tag.clone())
            .ok_or_else(|| Error::element_not_found(format!("node {}", id)))
    }

    async fn attribute(&self, node: &NodeHandle, name: &str) -> Result<Option<String>> {
        self.ensure_open()?;
        let id = Self::parse(node)?;
        let state = self.state.lock().expect("mock state poisoned");
        state
            .nodes
            .get(&id)
            .map(|n| n.attrs.get(name).cloned())
            .ok_or_else(|| Error::element_not_found(format!("node {}", id)))
    }

    async fn set_attribute(&self, node: &NodeHandle, name: &str, value: &str) -> Result<()> {
        self.ensure_open()?;
        let id = Self::parse(node)?;
        let mut state = self.state.lock().expect("mock state poisoned");
        state
            .nodes
            .get_mut(&id)
            .map(|n| {
                n.attrs.insert(name.to_string(), value.to_string());
            })
            .ok_or_else(|| Error::element_not_found(format!("node {}", id)))
    }

    async fn text(&self, node: &NodeHandle) -> Result<String> {
        self.ensure_open()?;
        let id = Self::parse(node)?;
        let state = self.state.lock().expect("mock state poisoned");
        if !state.nodes.contains_key(&id) {
            return Err(Error::element_not_found(format!("node {}", id)));
        }
        Ok(state.subtree_text(id))
    }

    async fn set_text(&self, node: &NodeHandle, text: &str) -> Result<()> {
        self.ensure_open()?;
        let id = Self::parse(node)?;
        let mut state = self.state.lock().expect("mock state poisoned");
        state
            .nodes
            .get_mut(&id)
            .map(|n| n.text = text.to_string())
            .ok_or_else(|| Error::element_not_found(format!("node {}", id)))
    }

    async fn focus(&self, node: &NodeHandle) -> Result<()> {
        self.ensure_open()?;
        Self::parse(node).map(|_| ())
    }

    async fn click(&self, node: &NodeHandle) -> Result<()> {
        self.ensure_open()?;
        let id = Self::parse(node)?;
        let mut state = self.state.lock().expect("mock state poisoned");
        state
            .nodes
            .get_mut(&id)
            .map(|n| {
                let clicks = n
                    .attrs
                    .get("data-clicks")
                    .and_then(|c| c.parse::<u32>().ok())
                    .unwrap_or(0);
                n.attrs
                    .insert("data-clicks".to_string(), (clicks + 1).to_string());
            })
            .ok_or_else(|| Error::element_not_found(format!("node {}", id)))
    }

    async fn selected_values(&self, node: &NodeHandle) -> Result<Vec<String>> {
        self.ensure_open()?;
        let id = Self::parse(node)?;
        let state = self.state.lock().expect("mock state poisoned");
        let select = state
            .nodes
            .get(&id)
            .ok_or_else(|| Error::element_not_found(format!("node {}", id)))?;
        let mut values = Vec::new();
        for child in &select.children {
            if let Some(option) = state.nodes.get(child) {
                if option.tag == "option" && option.attrs.contains_key("selected") {
                    if let Some(value) = option.attrs.get("value") {
                        values.push(value.clone());
                    }
                }
            }
        }
        Ok(values)
    }

    async fn set_option_selected(
        &self,
        node: &NodeHandle,
        value: &str,
        selected: bool,
    ) -> Result<()> {
        self.ensure_open()?;
        let id = Self::parse(node)?;
        let mut state = self.state.lock().expect("mock state poisoned");
        let options: Vec<usize> = state
            .nodes
            .get(&id)
            .ok_or_else(|| Error::element_not_found(format!("node {}", id)))?
            .children
            .clone();
        for child in options {
            let is_match = state
                .nodes
                .get(&child)
                .map(|n| n.tag == "option" && n.attrs.get("value").map(String::as_str) == Some(value))
                .unwrap_or(false);
            if is_match {
                let option = state.nodes.get_mut(&child).expect("option vanished");
                if selected {
                    option.attrs.insert("selected".to_string(), String::new());
                } else {
                    option.attrs.remove("selected");
                }
                return Ok(());
            }
        }
        Err(Error::element_not_found(format!("option '{}'", value)))
    }

    async fn upload_file(&self, node: &NodeHandle, path: &Path) -> Result<()> {
        self.ensure_open()?;
        let id = Self::parse(node)?;
        let mut state = self.state.lock().expect("mock state poisoned");
        state
            .nodes
            .get_mut(&id)
            .map(|n| {
                n.attrs
                    .insert("value".to_string(), path.display().to_string());
            })
            .ok_or_else(|| Error::element_not_found(format!("node {}", id)))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MockEngine {
        MockEngine::new(vec![
            NodeSpec::new("div").attr("id", "main").child(
                NodeSpec::new("input")
                    .attr("name", "q")
                    .attr("type", "text"),
            ),
            NodeSpec::new("a").text("next page"),
        ])
    }

    #[tokio::test]
    async fn test_find_by_attribute() {
        let engine = sample();
        let body = engine.body().await.unwrap();
        let found = engine
            .find(&body, &Locator::attribute("name", "q"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(engine.tag_name(&found[0]).await.unwrap(), "input");
    }

    #[tokio::test]
    async fn test_find_by_tag_with_text() {
        let engine = sample();
        let body = engine.body().await.unwrap();
        let found = engine
            .find(&body, &Locator::tag_with_text("a", "next"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        let none = engine
            .find(&body, &Locator::tag_with_text("a", "previous"))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_scoped_search_excludes_outside() {
        let engine = sample();
        let body = engine.body().await.unwrap();
        let main = engine
            .find(&body, &Locator::attribute("id", "main"))
            .await
            .unwrap();
        let anchors = engine.find(&main[0], &Locator::tag("a")).await.unwrap();
        assert!(anchors.is_empty());
    }

    #[tokio::test]
    async fn test_closed_engine_rejects_calls() {
        let engine = sample();
        engine.close().await.unwrap();
        assert!(engine.is_closed());
        assert!(engine.body().await.is_err());
        assert!(engine.navigate("https://example.com").await.is_err());
    }

    #[tokio::test]
    async fn test_select_option_state() {
        let engine = MockEngine::new(vec![NodeSpec::new("select")
            .attr("name", "color")
            .child(NodeSpec::new("option").attr("value", "red"))
            .child(NodeSpec::new("option").attr("value", "blue").attr("selected", ""))]);
        let body = engine.body().await.unwrap();
        let select = engine.find(&body, &Locator::tag("select")).await.unwrap();

        assert_eq!(
            engine.selected_values(&select[0]).await.unwrap(),
            vec!["blue".to_string()]
        );

        engine
            .set_option_selected(&select[0], "red", true)
            .await
            .unwrap();
        engine
            .set_option_selected(&select[0], "blue", false)
            .await
            .unwrap();
        assert_eq!(
            engine.selected_values(&select[0]).await.unwrap(),
            vec!["red".to_string()]
        );
    }
}
