//! Container name policy.

use super::{DISALLOW_MARKER, ValidationContext, ValidationResult};

pub const UNWANTED_CONTAINER_REASON: &str = "UnwantedContainerName";

/// Deny pods with a container whose name contains `webhook-disallow`
pub fn validate_container_names(ctx: &ValidationContext<'_>) -> ValidationResult {
    let offending: Vec<&str> = ctx
        .container_names()
        .filter(|name| name.contains(DISALLOW_MARKER))
        .collect();

    if offending.is_empty() {
        return ValidationResult::allowed();
    }

    ValidationResult::denied(
        UNWANTED_CONTAINER_REASON,
        &format!(
            "the pod contains unwanted container name ({})",
            offending.join(", ")
        ),
    )
}
