//! Configuration Management
//!
//! Unified configuration system with hierarchical resolution:
//! 1. Built-in defaults
//! 2. Project config (pipeline.toml)
//! 3. Environment variables (PIPELINE_*)

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::*;
