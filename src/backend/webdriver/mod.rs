//! Remote engine: W3C WebDriver protocol
//!
//! Drives a real browser through its vendor driver process (chromedriver,
//! geckodriver, msedgedriver, operadriver, safaridriver) over the
//! WebDriver HTTP wire protocol.

pub mod adapter;
pub mod client;
pub mod protocol;
pub mod service;

pub use adapter::WebDriverEngine;
pub use client::WebDriverClient;
pub use service::{DriverKind, DriverService};
