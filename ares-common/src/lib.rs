//! # ares common library
//!
//! Shared code for the ares crates:
//! - Common error and result types
//! - TOML configuration model and resolution

pub mod config;
pub mod error;

pub use error::{Error, Result};
