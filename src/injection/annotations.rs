//! Secret-reference annotation scanning.
//!
//! Pods opt into injection with annotations of the form `<prefix>/<name>`.
//! The value is never read here; the injected init container resolves it at
//! pod start through a field reference to the annotation key.

use std::collections::BTreeMap;

/// Default annotation namespace
pub const DEFAULT_ANNOTATION_PREFIX: &str = "secrets.k8s.aws";

/// Name of the reserved annotation that toggles the injector
pub const INJECTOR_TOGGLE_NAME: &str = "sidecarInjectorWebhook";

/// A pod annotation that names a secret to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretReference {
    /// Annotation key, e.g. `secrets.k8s.aws/db-password`
    pub annotation: String,
    /// Annotation value (the secret ARN), logged at debug on injection
    pub value: String,
}

/// Full key of the toggle annotation for `prefix`
pub fn toggle_key(prefix: &str) -> String {
    format!("{}/{}", prefix, INJECTOR_TOGGLE_NAME)
}

/// Select the secret-reference annotations.
///
/// Keys containing `prefix` qualify, except the toggle key. Results are in
/// key order.
pub fn scan(annotations: &BTreeMap<String, String>, prefix: &str) -> Vec<SecretReference> {
    let toggle = toggle_key(prefix);
    annotations
        .iter()
        .filter(|(key, _)| key.contains(prefix) && **key != toggle)
        .map(|(key, value)| SecretReference {
            annotation: key.clone(),
            value: value.clone(),
        })
        .collect()
}
