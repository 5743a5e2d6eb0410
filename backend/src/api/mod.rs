//! HTTP API module.
//!
//! Log broadcasting used across the crate, plus the dry-run validation server.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::*;
pub use server::{router, start_server};
pub use types::*;
