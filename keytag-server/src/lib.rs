//! keytag-server library interface
//!
//! Exposes the tag adapter and the stdio server for the binary and for integration tests.

pub mod logging;
pub mod server;
pub mod tagging;

pub use crate::server::{ServerReport, ServerState, TaggingServer};
pub use crate::tagging::{FileTagger, TagError, TagFormat, TagWriter};
