//! Parsing and validation of `states.toml` configuration files.
//!
//! This crate reads the optional project configuration and produces a
//! strongly-typed [`StatesConfig`]: the action timing policies of the
//! simulator, the autoplay clock period, and the limits of the machine
//! verifier. Every section and field has a default.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use types::*;
