//! SQLite scene store.
//!
//! This crate persists scenes and their detections in a two-table relational
//! schema. All public operations are async: each call acquires one pooled
//! connection on a blocking worker for the duration of the call. Writes are
//! single statements or one batch transaction; nothing spans calls.

pub mod error;
mod pool;
mod store;

pub use error::{StoreError, StoreResult};
pub use store::{SceneStore, DEFAULT_CONFIDENCE_THRESHOLD};
