//! Core library for shipmark.
//!
//! This crate provides the foundational types and functionality used by the
//! `shipmark` CLI and any downstream consumers.
//!
//! # Modules
//!
//! - [`changelog`] - Changelog rendering and splicing
//! - [`commits`] - Conventional commit parsing and grouping
//! - [`config`] - Configuration loading and management
//! - [`document`] - Format-preserving YAML editing
//! - [`error`] - Error types and result aliases
//! - [`files`] - Version file handlers and the handler registry
//! - [`git`] - Git operations for release workflows
//! - [`provider`] - Hosted release providers (GitHub, GitLab)
//! - [`release`] - Release planning and execution
//! - [`version`] - Semantic version model and bump arithmetic
//!
//! # Quick Start
//!
//! ```no_run
//! use shipmark_core::{Config, ConfigLoader};
//!
//! let config = ConfigLoader::new()
//!     .with_project_search(".")
//!     .load()
//!     .expect("Failed to load configuration");
//!
//! println!("Tag prefix: {}", config.version.tag_prefix);
//! ```
#![deny(unsafe_code)]

pub mod changelog;

pub mod commits;

pub mod config;

pub mod document;

pub mod error;

pub mod files;

pub mod git;

pub mod provider;

pub mod release;

pub mod version;

pub use config::{Config, ConfigLoader, LogLevel};

pub use error::{ConfigError, ConfigResult};
