pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod lanes;
pub mod report;
pub mod security;
pub mod sync;
pub mod test_utils;
pub mod utils;

pub use error::{Result, VetError};

/// Package version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
