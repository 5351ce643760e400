//! Render-side integration: dependency tracking and the backend seam.

pub mod bridge;
pub mod dependency;

pub use bridge::{RenderBackend, RenderBridge};
pub use dependency::RenderDependencyGraph;
