/// Shader module - source registry and hot-reload handoff.

pub mod registry;

pub use registry::*;
