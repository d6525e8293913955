//! Database models for video-qc.
//!
//! These models map directly to the database schema and handle
//! serialization/deserialization of JSON fields.

pub mod qc_project;
pub mod raw_media;

pub use qc_project::*;
pub use raw_media::*;

/// Offset pagination for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Pagination {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }

    /// Build from a 1-based page number and page size.
    pub fn from_page(page: u32, per_page: u32) -> Self {
        let page = page.max(1);
        Self {
            limit: per_page,
            offset: (page - 1).saturating_mul(per_page),
        }
    }
}
