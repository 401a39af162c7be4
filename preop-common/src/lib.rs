//! # Preop Common Library
//!
//! Shared code for the preoperational-inspection service:
//! - Error taxonomy
//! - Configuration and data-root resolution
//! - Database initialization and row models

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
