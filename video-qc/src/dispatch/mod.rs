//! Dispatch of QC requests to worker tasks.

mod consumer;
pub mod resources;

pub use consumer::QcRequestConsumer;
pub use resources::{ResourceTier, SizingConfig, TaskResources, TierSpec};
