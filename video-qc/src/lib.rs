//! video-qc library crate.
//!
//! This module exposes the core functionality for integration testing.

pub mod api;
pub mod config;
pub mod database;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod launcher;
pub mod logging;
pub mod qc;
pub mod queue;
pub mod services;
pub mod storage;
pub mod utils;

pub use error::{Error, Result};
