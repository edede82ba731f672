//! Shared types, error model, and configuration for ClientIntel.
//!
//! This crate is the foundation depended on by all other ClientIntel crates.
//! It provides:
//! - [`ClientIntelError`]: the unified error type
//! - Domain types ([`ClientRecord`], [`ParsedInsight`], [`TagVocabulary`], [`EnrichedRecord`])
//! - Configuration ([`AppConfig`], credential and config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ColumnsConfig, Credentials, ModelConfig, PipelineConfig, SearchConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, load_credentials,
    load_credentials_with, parse_url,
};
pub use error::{ClientIntelError, Result};
pub use types::{
    ClientRecord, DEFAULT_CONFIDENCE, DEFAULT_EMAIL, DEFAULT_LOW_CONFIDENCE_TAG, DEFAULT_SUMMARY,
    DEFAULT_TAGS, EnrichedRecord, ParsedInsight, RunId, TagFlags, TagVocabulary,
};
