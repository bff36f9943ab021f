//! Track workflow
//!
//! [`TrackManager`] drives a session: load files, pull customizations,
//! reconcile with the store, write the resolved credits back.

pub mod track;
pub mod track_manager;

pub use track::{Track, ARTIST_SEPARATOR};
pub use track_manager::{normalize_path, LoadReport, TrackManager};
