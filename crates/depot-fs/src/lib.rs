//! Filesystem layer for the depot package store
//!
//! Provides normalized path handling, atomic I/O, name validation and the
//! content signature used to detect divergence between index and disk.

pub mod config;
pub mod constants;
pub mod error;
pub mod io;
pub mod path;
pub mod signature;

pub use config::ConfigStore;
pub use constants::StorePath;
pub use error::{Error, Result};
pub use path::{NormalizedPath, validate_path_identifier};
pub use signature::{compute_signature, is_signature};
