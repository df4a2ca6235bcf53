//! Engine registry
//!
//! Resolves automation engines by name at runtime. Each entry is an async
//! factory producing a ready engine session from a [`LaunchSpec`]; the
//! built-in entries are the two shipped backends. Asking for a name nobody
//! registered is the capability-resolution failure of this crate; there
//! is no compile-time dependency from callers to any concrete backend.

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::backend::cdp::CdpEngine;
use crate::backend::traits::Engine;
use crate::backend::webdriver::service::{discover_driver, DriverKind};
use crate::backend::webdriver::WebDriverEngine;
use crate::{Error, Result};

/// Construction inputs for an engine
///
/// Carries the driver binding explicitly: the chosen kind and executable
/// travel with the spec instead of through any process-wide property.
#[derive(Debug, Clone, Default)]
pub struct LaunchSpec {
    /// Endpoint of an already-running engine to attach to
    pub endpoint: Option<String>,
    /// Directory scanned for vendor driver executables
    pub driver_dir: Option<PathBuf>,
    /// Explicit vendor driver executable
    pub driver_path: Option<PathBuf>,
    /// Browser family; detected from the executable filename when omitted
    pub kind: Option<DriverKind>,
    /// Port the vendor driver is told to listen on (0 = default)
    pub port: u16,
    /// Run the browser without a visible window
    pub headless: bool,
}

const DEFAULT_DRIVER_PORT: u16 = 9515;

impl LaunchSpec {
    pub fn new() -> Self {
        Self {
            headless: true,
            ..Default::default()
        }
    }

    pub fn endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn driver_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.driver_dir = Some(dir.into());
        self
    }

    pub fn driver_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.driver_path = Some(path.into());
        self
    }

    pub fn kind(mut self, kind: DriverKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    fn effective_port(&self) -> u16 {
        if self.port == 0 {
            DEFAULT_DRIVER_PORT
        } else {
            self.port
        }
    }
}

type EngineFactory =
    Arc<dyn Fn(LaunchSpec) -> BoxFuture<'static, Result<Arc<dyn Engine>>> + Send + Sync>;

/// Name → engine factory map
pub struct EngineRegistry {
    factories: HashMap<String, EngineFactory>,
}

impl EngineRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry with the two shipped backends
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("headless", |spec: LaunchSpec| async move {
            let endpoint = spec.endpoint.ok_or_else(|| {
                Error::configuration(
                    "headless engine needs an endpoint (e.g. ws://localhost:9222)",
                )
            })?;
            let engine = CdpEngine::attach(&endpoint).await?;
            Ok(Arc::new(engine) as Arc<dyn Engine>)
        });
        registry.register("remote", |spec: LaunchSpec| async move {
            if let Some(endpoint) = &spec.endpoint {
                let engine = WebDriverEngine::attach(endpoint).await?;
                return Ok(Arc::new(engine) as Arc<dyn Engine>);
            }

            let (kind, executable) = if let Some(path) = &spec.driver_path {
                let kind = spec
                    .kind
                    .or_else(|| DriverKind::from_executable(path))
                    .ok_or_else(|| {
                        Error::driver_not_found(format!(
                            "Cannot tell the driver kind from {}",
                            path.display()
                        ))
                    })?;
                (kind, path.clone())
            } else if let Some(dir) = &spec.driver_dir {
                let (detected, path) = discover_driver(dir)?;
                (spec.kind.unwrap_or(detected), path)
            } else {
                return Err(Error::configuration(
                    "remote engine needs a driver path, a driver directory, or an endpoint",
                ));
            };

            let engine =
                WebDriverEngine::launch(kind, &executable, spec.effective_port(), spec.headless)
                    .await?;
            Ok(Arc::new(engine) as Arc<dyn Engine>)
        });
        registry
    }

    /// Register a factory under a name, replacing any previous entry
    pub fn register<F, Fut>(&mut self, name: &str, factory: F)
    where
        F: Fn(LaunchSpec) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Arc<dyn Engine>>> + Send + 'static,
    {
        self.factories.insert(
            name.to_string(),
            Arc::new(move |spec| Box::pin(factory(spec))),
        );
    }

    /// Whether a name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolve a name and build an engine from the spec
    pub async fn launch(&self, name: &str, spec: LaunchSpec) -> Result<Arc<dyn Engine>> {
        let factory = self
            .factories
            .get(name)
            .cloned()
            .ok_or_else(|| Error::engine_not_found(name))?;

        info!("Launching '{}' engine", name);
        factory(spec).await
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
