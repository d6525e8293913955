//! Domain layer for video-qc.
//!
//! This module contains the QC project state machine and the raw media
//! records it mirrors progress onto.

pub mod media;
pub mod qc;

pub use media::{QcMirror, QcProcessingStatus, QcProgressType, RawMedia, UploadStatus};
pub use qc::{HistoryEntry, Issue, QcProject, QcStatus, WorkerStatus};
