//! Configuration module for Quillscout
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section is optional; a missing file section falls back to its defaults.
//!
//! # Example
//!
//! ```no_run
//! use quillscout::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("quillscout.toml")).unwrap();
//! println!("Site profiles: {}", config.sites.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, ExtractionConfig, LightweightConfig, MonitorConfig, OutputConfig,
    RenderingConfig, ScoringWeights, SelectionConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
