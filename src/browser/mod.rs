//! Caller-visible automation surface
//!
//! The `Browser` facade, the `Element` identity layer, and the locator
//! vocabulary shared by every backend.

pub mod element;
pub mod locator;
pub mod session;

pub use element::{Element, NodeHandle};
pub use locator::Locator;
pub use session::Browser;
