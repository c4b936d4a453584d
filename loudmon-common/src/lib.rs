//! # Loudmon Common Library
//!
//! Shared code for the loudmon tools:
//! - Error type used at configuration boundaries
//! - TOML configuration file discovery, loading and writing
//! - Logging configuration section
//! - Timestamp utilities

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
