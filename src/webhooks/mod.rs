//! Admission webhooks for pods.
//!
//! - `/pods`, `/pods/attach`: built-in deny rules (see [`policies`])
//! - `/mutating-pods`: annotation-driven secret injection
//! - `/mutating-pods-sidecar`: fixed sidecar injection

pub mod error;
pub mod evaluator;
pub mod policies;
pub mod review;
mod server;

pub use error::AdmissionError;
pub use evaluator::{AdmissionEvaluator, MutationStrategy};
pub use policies::{PodVerdict, ValidationContext, ValidationResult};
pub use review::{AdmissionRequest, AdmissionResponse, AdmissionReview, AdmissionReviewResponse};
pub use server::{
    WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookError, WebhookState,
    create_webhook_router, run_webhook_server,
};
