//! Per-request admission errors.
//!
//! None of these reach the transport: each is turned into a denied
//! [`AdmissionResponse`] whose status code separates malformed requests (4xx)
//! from webhook misconfiguration (5xx).

use thiserror::Error;

use super::review::{AdmissionResponse, GroupVersionResource};
use crate::injection::InjectionError;

#[derive(Error, Debug)]
pub enum AdmissionError {
    /// The request targets a different API resource
    #[error("expect resource to be {expected}, got {actual}")]
    ResourceMismatch {
        expected: GroupVersionResource,
        actual: GroupVersionResource,
    },

    #[error("admission request carries no object")]
    MissingObject,

    /// The raw object is not the expected type
    #[error("failed to decode {kind}: {source}")]
    Decode {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A required setting is missing for the requested strategy
    #[error("{0}")]
    Configuration(String),

    #[error("failed to build patch: {0}")]
    Patch(#[from] InjectionError),
}

impl AdmissionError {
    /// Status code reported in the admission response
    pub fn status_code(&self) -> u16 {
        match self {
            AdmissionError::ResourceMismatch { .. }
            | AdmissionError::MissingObject
            | AdmissionError::Decode { .. } => 400,
            AdmissionError::Configuration(_) | AdmissionError::Patch(_) => 500,
        }
    }

    /// Machine-readable reason, also used as a metrics label
    pub fn reason(&self) -> &'static str {
        match self {
            AdmissionError::ResourceMismatch { .. } => "ResourceMismatch",
            AdmissionError::MissingObject => "MissingObject",
            AdmissionError::Decode { .. } => "DecodeError",
            AdmissionError::Configuration(_) => "ConfigurationError",
            AdmissionError::Patch(_) => "MalformedPatch",
        }
    }

    /// Denied response for request `uid`
    pub fn into_response(self, uid: &str) -> AdmissionResponse {
        AdmissionResponse::failure(
            uid,
            self.status_code(),
            &self.to_string(),
            Some(self.reason()),
        )
    }
}
