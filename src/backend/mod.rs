//! Automation engine backends
//!
//! The `Engine` contract plus its concrete implementations: the headless
//! CDP adapter, the WebDriver remote-control adapter, a mock engine for
//! tests, and the registry that resolves engines by name at runtime.

pub mod cdp;
pub mod mock;
pub mod registry;
pub mod traits;
pub mod webdriver;

pub use registry::{EngineRegistry, LaunchSpec};
pub use traits::Engine;
