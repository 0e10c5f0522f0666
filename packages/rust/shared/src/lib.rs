//! Shared types, error model, and configuration for DocHub.
//!
//! This crate is the foundation depended on by all other DocHub crates.
//! It provides:
//! - [`DocHubError`], the unified error type
//! - Domain identifiers ([`JobId`], [`PageId`])
//! - Configuration ([`AppConfig`], [`ConversionOptions`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CodeBlockStyle, ConversionOptions, DefaultsConfig, EmphasisMarker, LineBreaks,
    ListMarker, UnsupportedBlockPolicy, config_dir, config_file_path, init_config, load_config,
    load_config_from,
};
pub use error::{DocHubError, ParseErrorKind, Result};
pub use types::{JobId, PageId};
