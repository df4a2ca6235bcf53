//! Unified error types for Drover

use thiserror::Error;

/// Unified Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for Drover
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket errors
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// CDP protocol errors
    #[error("CDP error: {0}")]
    Cdp(String),

    /// WebDriver wire protocol errors
    #[error("WebDriver error: {0}")]
    Wire(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Requested engine is not registered
    #[error("Engine not registered: {0}")]
    EngineNotFound(String),

    /// No usable vendor driver executable was found
    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    /// Backend session is gone or was never established
    #[error("Session error: {0}")]
    Session(String),

    /// Element not found
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Timeout
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// Caller-initiated abandonment; terminal, not a failure
    #[error("Cancelled")]
    Cancelled,

    /// Navigation failed
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Script execution failed
    #[error("Script execution failed: {0}")]
    Script(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new WebSocket error
    pub fn websocket<S: Into<String>>(msg: S) -> Self {
        Error::WebSocket(msg.into())
    }

    /// Create a new CDP error
    pub fn cdp<S: Into<String>>(msg: S) -> Self {
        Error::Cdp(msg.into())
    }

    /// Create a new WebDriver wire error
    pub fn wire<S: Into<String>>(msg: S) -> Self {
        Error::Wire(msg.into())
    }

    /// Create a new engine-not-registered error
    pub fn engine_not_found<S: Into<String>>(name: S) -> Self {
        Error::EngineNotFound(name.into())
    }

    /// Create a new driver-not-found error
    pub fn driver_not_found<S: Into<String>>(msg: S) -> Self {
        Error::DriverNotFound(msg.into())
    }

    /// Create a new session error
    pub fn session<S: Into<String>>(msg: S) -> Self {
        Error::Session(msg.into())
    }

    /// Create a new element not found error
    pub fn element_not_found<S: Into<String>>(what: S) -> Self {
        Error::ElementNotFound(what.into())
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Error::Timeout(msg.into())
    }

    /// Create a new navigation error
    pub fn navigation<S: Into<String>>(msg: S) -> Self {
        Error::Navigation(msg.into())
    }

    /// Create a new script execution error
    pub fn script<S: Into<String>>(msg: S) -> Self {
        Error::Script(msg.into())
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Whether this error is the timeout kind
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}
