//! # keytag Common Library
//!
//! Shared code for the key-tagging service and its clients:
//! - Wire protocol message types
//! - Configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod protocol;

pub use error::{Error, Result};
