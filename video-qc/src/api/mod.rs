//! REST API server module.
//!
//! Exposes the QC project endpoints, the worker progress webhook and health
//! probes.

pub mod error;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;

pub use server::{ApiServer, ApiServerConfig, AppState};
