//! # cmirror Core
//!
//! Pattern-driven translation of a C++ corpus into a plain C mirror:
//! - Syntax layer over tree-sitter's C++ grammar
//! - Patch abstraction and the concrete patches
//! - Whole-corpus template instantiation collector
//! - Translation engine with priority-based conflict resolution
//! - File translator driven by a JSON configuration
//!
//! Collection runs over the complete corpus before any file is rewritten,
//! because a template's call sites may live in files other than its
//! definition. The resulting [`TemplateInstances`] snapshot is read-only.

#![warn(clippy::all)]

pub mod collector;
pub mod config;
pub mod engine;
pub mod file_translator;
pub mod patch;
pub mod patches;
pub mod syntax;

use std::path::PathBuf;

// Re-export commonly used types
pub use collector::{CollectorError, TemplateCollector, TemplateInstances, TemplateRefInstance};
pub use config::{FileMapping, PatchConfig, PatchKind, TranslatorConfig};
pub use engine::{Claim, TranslationEngine};
pub use file_translator::{FileTranslator, TranslationSummary};
pub use patch::{Patch, PatchStats};
pub use syntax::{Capture, Captures, CppSyntax, SourceUnit};

/// cmirror version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for cmirror components
pub fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "cmirror_core={default_level},cmirror={default_level}"
                ))
            }),
        )
        .with_target(false)
        .init();
}

/// Error types for translation
#[derive(thiserror::Error, Debug)]
pub enum TranslateError {
    /// File could not be read or written
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The C++ grammar is incompatible with the linked tree-sitter runtime
    #[error("Failed to load C++ grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    /// A patch's search pattern does not compile
    #[error("Invalid search pattern for patch {patch}: {source}")]
    Query {
        patch: String,
        #[source]
        source: tree_sitter::QueryError,
    },

    /// The parser returned no tree
    #[error("Parse error: {0}")]
    Parse(String),

    /// Collector snapshot error
    #[error(transparent)]
    Collector(#[from] CollectorError),

    /// Two patches of equal priority claim the identical span
    #[error(
        "Patches {first} and {second} share priority {priority} and both claim bytes {start}..{end}"
    )]
    AmbiguousClaim {
        first: String,
        second: String,
        priority: u32,
        start: usize,
        end: usize,
    },

    /// The patch set keeps producing edits
    #[error("Translation did not converge after {0} iterations")]
    IterationLimit(usize),

    /// Captured text is not valid UTF-8
    #[error("Invalid UTF-8 in source: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Configuration file could not be decoded
    #[error("Configuration decode error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration is structurally invalid
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TranslateError {
    /// Attach a path to an I/O error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for translation operations
pub type Result<T> = std::result::Result<T, TranslateError>;
