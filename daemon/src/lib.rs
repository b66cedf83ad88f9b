//! modelctl_daemon - HTTP server for model lifecycle orchestration
//!
//! This crate provides the daemon server that:
//! - Exposes the model catalog and its lifecycle states
//! - Drives downloads and load/unload against external services
//! - Serves resource metrics, history and threshold alerts

pub mod api;
pub mod loader;
pub mod server;
pub mod state;

pub use loader::{LoadCoordinator, LoadError};
pub use server::run_server;
pub use state::AppState;
