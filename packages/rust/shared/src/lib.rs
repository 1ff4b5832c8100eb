//! Shared types, error model, and configuration for GrantLens.
//!
//! This crate is the foundation depended on by all other GrantLens crates.
//! It provides:
//! - [`GrantLensError`], the unified error type
//! - The canonical [`Grant`] record and [`normalize`]
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BatchPolicy, CatalogConfig, DisplayConfig, ModelConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{GrantLensError, Result};
pub use types::{Grant, format_usd, normalize};
