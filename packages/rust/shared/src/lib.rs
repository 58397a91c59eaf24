//! Shared types, error model, and configuration for docsift.
//!
//! This crate is the foundation depended on by all other docsift crates.
//! It provides:
//! - [`DocsiftError`] — the unified error type
//! - Wire types for the stage contracts ([`DocumentBatch`], [`ProcessedBatch`], ...)
//! - Configuration ([`AppConfig`], [`ChunkingConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ChunkingConfig, ProcessingConfig, RetrievalConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{DocsiftError, Result};
pub use types::{
    DocumentBatch, DocumentKind, ErrorEnvelope, IncomingBatch, ProcessedBatch, ProcessedDocument,
    RetrievedDocument, RunId, SearchHit, StructuredQuery, TextChunk, UNKNOWN_URL, to_pretty_json,
};
