//! cctld-crawler: a focused-domain web crawler
//!
//! This crate implements a crawler restricted to a national top-level domain family.
//! Pages flow through a frontier, a bounded fetch pool, a link extractor and a
//! structural classifier, and the pipeline shuts itself down once it goes quiet.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Stage '{stage}' did not acknowledge shutdown within {timeout_ms}ms")]
    ShutdownTimeout { stage: &'static str, timeout_ms: u64 },

    #[error("Stage '{stage}' terminated abnormally: {message}")]
    StageFailed { stage: &'static str, message: String },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

// Re-export commonly used types
pub use config::Config;
pub use crawler::{crawl, Crawler};
pub use output::CrawlReport;
pub use state::TerminationPhase;
pub use url::{DomainFilter, SuffixList, SuffixResolver};
