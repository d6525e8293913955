//! Service layer module.
//!
//! This module provides the service container that wires repositories,
//! queue, storage and launcher into the QC service.

pub mod container;

pub use container::ServiceContainer;
