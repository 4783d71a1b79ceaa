//! Store engine for the depot package store
//!
//! A store root holds three things that must stay in agreement:
//!
//! ```text
//! <root>/
//!   .lock             advisory lock side-file (present while held)
//!   registry.toml     the registry index document
//!   namespaces/       the artifact tree
//!   config.toml       optional lock tuning
//! ```
//!
//! This crate provides:
//!
//! - **Lock manager**: cross-process mutual exclusion with stale-holder reclaim
//! - **Registry index**: the single document naming every published version
//! - **Package store**: the namespace/package/version directory tree
//! - **Resolver**: exact `name@version` lookup across an ordered namespace list
//! - **Verify / prune**: detection and repair of index/disk divergence
//!
//! [`Depot`] ties them together for one store root.
//!
//! # Example
//!
//! ```no_run
//! use depot_core::{Depot, PublishRequest, StoreConfig};
//!
//! fn example() -> depot_core::Result<()> {
//!     let depot = Depot::new(StoreConfig::new("/tmp/depot"));
//!     depot.publish(&PublishRequest::new("global", "@scope/lib", "1.0.0", "./dist"))?;
//!     let hit = depot.resolve_specifier("@scope/lib@1.0.0", &["team", "global"])?;
//!     assert!(hit.is_found());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod depot;
pub mod error;
pub mod lock;
pub mod names;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod verify;

pub use config::StoreConfig;
pub use depot::{Depot, PublishOutcome, PublishRequest, StoreStats};
pub use error::{Error, Result};
pub use lock::{
    Contention, FixedLiveness, LockGuard, LockInfo, LockManager, LockOptions, LivenessCheck,
    StaleReason, SystemLiveness,
};
pub use names::PRIVILEGED_NAMESPACE;
pub use registry::{Registry, RegistryIndex, VersionEntry};
pub use resolver::{PackageSpec, Resolution, Resolver, parse_specifier};
pub use store::PackageStore;
pub use verify::{
    PruneOptions, PruneReport, Repair, VerifyOptions, VerifyReport, VerifyStatus, VersionRef,
};
