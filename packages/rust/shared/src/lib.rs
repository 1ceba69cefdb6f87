//! Shared types, error model, and configuration for the docset builder.
//!
//! This crate is the foundation depended on by all other poshdocset crates.
//! It provides:
//! - [`DocsetError`]: the unified error type
//! - Domain types ([`ContentToc`], [`ModuleRecord`], [`CommandRecord`], [`ThemeResource`])
//! - Configuration ([`AppConfig`], [`RunConfig`], config loading)

pub mod config;
pub mod error;
pub mod paths;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, HttpConfig, RendererConfig, RunConfig, RunOverrides, SiteConfig,
    SUPPORTED_VERSIONS, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{DocsetError, Result};
pub use types::{
    CommandRecord, ContentToc, EntryType, ModuleRecord, RESERVED_LABELS, ThemeResource,
    TocDocument, TocNode, is_reserved_label,
};
