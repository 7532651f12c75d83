//! Configuration module
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key has a default, so an empty file describes the stock `.pt` crawl.
//!
//! # Example
//!
//! ```no_run
//! use cctld_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawler.toml")).unwrap();
//! println!("Fetch workers: {}", config.crawler.max_concurrent_fetches);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ClassifierConfig, Config, CrawlerConfig, FilterConfig, OutputConfig, TerminationConfig,
    DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_ALLOWED_SITES, DEFAULT_ALLOWED_SUFFIXES,
    DEFAULT_KEYWORDS, DEFAULT_SEEDS,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
