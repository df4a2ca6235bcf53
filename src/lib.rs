//! Drover: backend-agnostic browser automation
//!
//! This library drives either of two incompatible automation engines, a
//! headless CDP-driven browser or a real browser behind a vendor WebDriver
//! process, through one `Engine` contract, and runs ordered automation
//! tasks against it with per-step timeouts via the flow scheduler.

pub mod error;
pub mod config;

pub mod backend;
pub mod browser;
pub mod flow;

// Re-exports
pub use error::{Error, Result};

pub use backend::registry::{EngineRegistry, LaunchSpec};
pub use backend::traits::Engine;
pub use browser::element::{Element, NodeHandle};
pub use browser::locator::Locator;
pub use browser::session::Browser;
pub use flow::scheduler::{Flow, FlowHandle, FlowOptions, FlowOutcome};
pub use flow::task::{FlowTask, TaskContext};

/// Drover library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
