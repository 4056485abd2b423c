//! E2E test label policy.
//!
//! `webhook-e2e-test=webhook-disallow` is rejected outright.
//! `webhook-e2e-test=wait-forever` is rejected and flags the verdict so the
//! evaluator can withhold the response (when that hook is enabled).

use super::{DISALLOW_MARKER, E2E_TEST_LABEL, ValidationContext, ValidationResult};

pub const WAIT_FOREVER_VALUE: &str = "wait-forever";

pub const UNWANTED_LABEL_REASON: &str = "UnwantedLabel";
pub const WAIT_FOREVER_REASON: &str = "WaitForever";

pub fn validate_disallow_label(ctx: &ValidationContext<'_>) -> ValidationResult {
    match ctx.label(E2E_TEST_LABEL) {
        Some(DISALLOW_MARKER) => ValidationResult::denied(
            UNWANTED_LABEL_REASON,
            "the pod contains unwanted label",
        ),
        _ => ValidationResult::allowed(),
    }
}

pub fn validate_wait_forever(ctx: &ValidationContext<'_>) -> ValidationResult {
    match ctx.label(E2E_TEST_LABEL) {
        Some(WAIT_FOREVER_VALUE) => ValidationResult::denied(
            WAIT_FOREVER_REASON,
            "the pod response should not be sent",
        ),
        _ => ValidationResult::allowed(),
    }
}
