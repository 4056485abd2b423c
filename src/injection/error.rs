//! Error types for patch construction.

use thiserror::Error;

/// Error type for building injection patches
#[derive(Error, Debug)]
pub enum InjectionError {
    /// The builder was handed nothing to inject. An empty fragment would
    /// produce a degenerate patch, so callers must check before building.
    #[error("Malformed patch: {0}")]
    MalformedPatch(String),

    /// A Kubernetes object could not be converted into a patch value
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = InjectionError> = std::result::Result<T, E>;
