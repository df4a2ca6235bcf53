//! Vendor driver process management
//!
//! Knows the five supported browser families, recognizes their driver
//! executables by filename, and owns the spawned driver process for the
//! lifetime of a session.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::client::WebDriverClient;
use crate::{Error, Result};

/// Browser families the remote engine can drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    Chrome,
    Firefox,
    Edge,
    Opera,
    Safari,
}

/// Driver executable stem → browser family
static DRIVER_EXECUTABLES: phf::Map<&'static str, DriverKind> = phf::phf_map! {
    "chromedriver" => DriverKind::Chrome,
    "geckodriver" => DriverKind::Firefox,
    "msedgedriver" => DriverKind::Edge,
    "edgedriver" => DriverKind::Edge,
    "operadriver" => DriverKind::Opera,
    "safaridriver" => DriverKind::Safari,
};

impl DriverKind {
    /// Detect the family from a driver executable's filename
    pub fn from_executable(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_str()?.to_ascii_lowercase();
        if let Some(kind) = DRIVER_EXECUTABLES.get(stem.as_str()) {
            return Some(*kind);
        }
        // Versioned names like "chromedriver-120" still identify a family.
        DRIVER_EXECUTABLES
            .entries()
            .find(|(name, _)| stem.contains(*name))
            .map(|(_, kind)| *kind)
    }

    /// The browserName capability the driver matches on
    pub fn browser_name(&self) -> &'static str {
        match self {
            DriverKind::Chrome => "chrome",
            DriverKind::Firefox => "firefox",
            DriverKind::Edge => "MicrosoftEdge",
            DriverKind::Opera => "opera",
            DriverKind::Safari => "safari",
        }
    }

    /// Command-line arguments that bind the driver to a port
    pub fn port_args(&self, port: u16) -> Vec<String> {
        match self {
            DriverKind::Chrome | DriverKind::Edge | DriverKind::Opera => {
                vec![format!("--port={}", port)]
            }
            DriverKind::Firefox => vec!["--port".to_string(), port.to_string()],
            DriverKind::Safari => vec!["-p".to_string(), port.to_string()],
        }
    }
}

impl std::fmt::Display for DriverKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.browser_name())
    }
}

/// Find a recognized driver executable in a directory
pub fn discover_driver(dir: &Path) -> Result<(DriverKind, PathBuf)> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| Error::driver_not_found(format!("Cannot read {}: {}", dir.display(), e)))?;

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(kind) = DriverKind::from_executable(&path) {
            debug!("Discovered {} driver at {}", kind, path.display());
            return Ok((kind, path));
        }
    }

    Err(Error::driver_not_found(format!(
        "No known driver executable in {}",
        dir.display()
    )))
}

/// A spawned (or attached) vendor driver process
#[derive(Debug)]
pub struct DriverService {
    endpoint: String,
    child: Option<Child>,
}

impl DriverService {
    /// Spawn a driver executable and wait until it answers `/status`
    pub async fn start(kind: DriverKind, executable: &Path, port: u16) -> Result<Self> {
        info!(
            "Starting {} driver: {} on port {}",
            kind,
            executable.display(),
            port
        );

        let child = Command::new(executable)
            .args(kind.port_args(port))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::driver_not_found(format!(
                    "Failed to spawn {}: {}",
                    executable.display(),
                    e
                ))
            })?;

        let service = Self {
            endpoint: format!("http://localhost:{}", port),
            child: Some(child),
        };
        service.await_ready().await?;
        Ok(service)
    }

    /// Attach to an already-running driver endpoint
    pub fn attach<S: Into<String>>(endpoint: S) -> Self {
        Self {
            endpoint: endpoint.into(),
            child: None,
        }
    }

    /// The driver's HTTP endpoint
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Poll `/status` until the driver reports ready
    async fn await_ready(&self) -> Result<()> {
        let client = WebDriverClient::new(&self.endpoint)?;
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);

        loop {
            match client.status().await {
                Ok(value) => {
                    let ready = value
                        .get("ready")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(true);
                    if ready {
                        debug!("Driver at {} is ready", self.endpoint);
                        return Ok(());
                    }
                }
                Err(e) => debug!("Driver not answering yet: {}", e),
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::timeout(format!(
                    "Driver at {} did not become ready",
                    self.endpoint
                )));
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    /// Terminate the driver process, if this service spawned one
    pub async fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill driver process: {}", e);
            }
        }
    }
}
