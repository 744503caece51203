//! Configuration module for Geocrawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use geocrawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("geocrawl.toml")).unwrap();
//! println!("Lookups go to {}", config.lookup.base_url);
//! ```

mod parser;
pub mod template;
mod types;
mod validation;

// Re-export types
pub use types::{BatchConfig, Config, LookupConfig, StorageBackend, StorageConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
