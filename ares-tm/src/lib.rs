//! ares-tm library interface
//!
//! Resolves artist credits from relation graphs and free-text tags into one
//! deduplicated set of artists, and reconciles that set with the artist
//! customization store.

pub mod error;
pub mod models;
pub mod registry;
pub mod services;
pub mod types;
pub mod workflow;

pub use crate::error::{Result, TrackManagerError};
pub use crate::registry::IdentityRegistry;
pub use crate::workflow::{Track, TrackManager};
