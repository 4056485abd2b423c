//! Patch construction for secret injection.
//!
//! Builders return typed [`PatchDocument`] fragments that the admission
//! evaluator concatenates in order:
//! 1. init containers + shared secret volume
//! 2. per-container mounts (and the optional location env var)
//!
//! The sidecar builder is an alternate, standalone strategy.

pub mod annotations;
pub mod error;
pub mod guard;
pub mod init_containers;
pub mod main_containers;
pub mod patch;
pub mod sidecar;

pub use annotations::{DEFAULT_ANNOTATION_PREFIX, SecretReference, scan};
pub use error::InjectionError;
pub use guard::{Sentinel, already_injected};
pub use init_containers::{INIT_CONTAINER_PREFIX, SECRET_VOLUME_NAME};
pub use main_containers::{MountStrategy, PathMode, SECRET_LOCATION_ENV};
pub use patch::PatchDocument;
pub use sidecar::SIDECAR_CONTAINER_NAME;
