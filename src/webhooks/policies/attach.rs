//! Pod attach policy.
//!
//! Denies `kubectl attach to-be-attached-pod -i -c container1` and nothing
//! else. Request-level checks (pod name, resource) are done by the evaluator.

use super::ValidationResult;
use crate::webhooks::review::PodAttachOptions;

/// Pod the attach rule applies to
pub const ATTACH_POD_NAME: &str = "to-be-attached-pod";
/// Container that may not be attached to interactively
pub const ATTACH_CONTAINER_NAME: &str = "container1";

pub const ATTACH_DENIED_REASON: &str = "AttachDenied";

pub fn validate_attach(options: &PodAttachOptions) -> ValidationResult {
    let interactive = options.stdin.unwrap_or(false);
    let container = options.container.as_deref();

    if interactive && container == Some(ATTACH_CONTAINER_NAME) {
        return ValidationResult::denied(
            ATTACH_DENIED_REASON,
            &format!("attaching to pod '{}' is not allowed", ATTACH_POD_NAME),
        );
    }
    ValidationResult::allowed()
}
