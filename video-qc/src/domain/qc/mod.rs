//! QC project domain types.

pub mod entity;
pub mod status;

pub use entity::{HistoryEntry, Issue, QcProject};
pub use status::{QcStatus, WorkerStatus};
