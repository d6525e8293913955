//! Repository layer for database access.
//!
//! This module implements the Repository Pattern to abstract all database interactions,
//! creating a clean and maintainable data access layer.

pub mod qc_project;
pub mod raw_media;

pub use qc_project::*;
pub use raw_media::*;
