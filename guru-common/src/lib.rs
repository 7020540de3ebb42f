//! # Guru Common Library
//!
//! Shared code for the Guru image-analysis services:
//! - Common error types
//! - Configuration loading and resolution

pub mod config;
pub mod error;

pub use error::{Error, Result};
