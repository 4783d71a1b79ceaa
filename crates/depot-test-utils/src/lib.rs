//! Shared test utilities for the depot workspace.
//!
//! This crate provides standardised store fixtures so crate test suites do
//! not each rebuild them. It is a dev-dependency only and never published.
//!
//! # Modules
//!
//! - [`store`]: [`TestDepot`] builder around a temporary store root
//! - [`trace`]: opt-in log output for tests

pub mod store;
pub mod trace;

pub use store::{TestDepot, write_artifact};
pub use trace::init_tracing;
