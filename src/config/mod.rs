//! Configuration management
//!
//! Storage locations and the sealing difficulty, read from defaults, an
//! optional TOML file and environment variables.

pub mod settings;

pub use settings::{Config, DEFAULT_DIFFICULTY};
