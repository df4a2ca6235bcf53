//! Element identity layer
//!
//! Maps one engine node handle to exactly one stable wrapper per facade
//! instance. Wrappers are created lazily and destroyed only in bulk: the
//! whole cache is dropped whenever the DOM snapshot may have changed,
//! because engine handles are not guaranteed stable or unique across
//! snapshots.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Opaque reference to a DOM node owned by the underlying engine
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeHandle(String);

impl NodeHandle {
    /// Wrap a raw engine node id
    pub fn new<S: Into<String>>(raw: S) -> Self {
        Self(raw.into())
    }

    /// The raw engine-side id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A DOM element as seen by callers
///
/// Wraps exactly one engine node handle. Nothing else is stored: tag name,
/// attributes and text are always read live from the engine through the
/// owning [`Browser`](crate::browser::session::Browser).
#[derive(Debug, Clone)]
pub struct Element {
    inner: Arc<NodeHandle>,
}

impl Element {
    pub(crate) fn new(handle: NodeHandle) -> Self {
        Self {
            inner: Arc::new(handle),
        }
    }

    /// The engine node handle this element wraps
    pub fn handle(&self) -> &NodeHandle {
        &self.inner
    }

    /// Whether two values are the same cached wrapper, not merely wrappers
    /// around equal handles
    pub fn same(&self, other: &Element) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Per-facade element cache
///
/// Lookups either return the stored wrapper or construct, store and return
/// a new one. There is no per-entry eviction.
#[derive(Debug, Default)]
pub struct ElementCache {
    entries: HashMap<NodeHandle, Element>,
}

impl ElementCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache hit returns the existing wrapper; miss constructs and stores
    pub fn resolve(&mut self, handle: NodeHandle) -> Element {
        if let Some(existing) = self.entries.get(&handle) {
            return existing.clone();
        }
        let element = Element::new(handle.clone());
        self.entries.insert(handle, element.clone());
        element
    }

    /// Drop every wrapper at once
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_returns_same_wrapper() {
        let mut cache = ElementCache::new();
        let a = cache.resolve(NodeHandle::new("n1"));
        let b = cache.resolve(NodeHandle::new("n1"));

        assert!(a.same(&b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_distinct_handles_distinct_wrappers() {
        let mut cache = ElementCache::new();
        let a = cache.resolve(NodeHandle::new("n1"));
        let b = cache.resolve(NodeHandle::new("n2"));

        assert!(!a.same(&b));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_clear_forgets_wrappers() {
        let mut cache = ElementCache::new();
        let before = cache.resolve(NodeHandle::new("n1"));
        cache.clear();
        assert!(cache.is_empty());

        let after = cache.resolve(NodeHandle::new("n1"));
        assert!(!before.same(&after));
        assert_eq!(before.handle(), after.handle());
    }
}
