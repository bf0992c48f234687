//! # quill-core
//!
//! Core crate for the Quill plugin host. Contains the configuration
//! schema and loader, and the unified error system shared by the host,
//! the CLI, and plugin crates.
//!
//! This crate has **no** internal dependencies on other Quill crates.

pub mod config;
pub mod error;
pub mod result;

pub use config::AppConfig;
pub use error::AppError;
pub use result::AppResult;
