//! Built-in deny rules for pod admission.
//!
//! Every rule runs; all denials are reported together in one message.
//!
//! - `labels`: e2e test label values (`webhook-disallow`, `wait-forever`)
//! - `containers`: container names containing `webhook-disallow`
//! - `attach`: interactive attach to the sentinel container

pub mod attach;
pub mod containers;
pub mod labels;

use k8s_openapi::api::core::v1::Pod;

/// Label whose value selects an e2e test behavior
pub const E2E_TEST_LABEL: &str = "webhook-e2e-test";
/// Marker for disallowed labels and container names
pub const DISALLOW_MARKER: &str = "webhook-disallow";

/// Result of a single policy check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Whether the validation passed
    pub allowed: bool,
    /// Reason for denial (if not allowed)
    pub reason: Option<String>,
    /// Detailed message (if not allowed)
    pub message: Option<String>,
}

impl ValidationResult {
    /// Create an allowed result
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            message: None,
        }
    }

    /// Create a denied result
    pub fn denied(reason: &str, message: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
        }
    }
}

/// Context for pod validation
pub struct ValidationContext<'a> {
    /// The pod being admitted
    pub pod: &'a Pod,
}

impl<'a> ValidationContext<'a> {
    pub fn new(pod: &'a Pod) -> Self {
        Self { pod }
    }

    /// Value of label `key`, if set
    pub fn label(&self, key: &str) -> Option<&str> {
        self.pod
            .metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(key))
            .map(String::as_str)
    }

    /// Names of the pod's main containers
    pub fn container_names(&self) -> impl Iterator<Item = &str> {
        self.pod
            .spec
            .iter()
            .flat_map(|spec| spec.containers.iter())
            .map(|c| c.name.as_str())
    }
}

/// Combined outcome of all pod policies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodVerdict {
    /// Failed checks, in evaluation order
    pub denials: Vec<ValidationResult>,
    /// The pod asked for its admission response to be withheld
    pub suspend: bool,
}

impl PodVerdict {
    pub fn allowed(&self) -> bool {
        self.denials.is_empty()
    }

    /// All denial messages, `;`-terminated and joined
    pub fn message(&self) -> Option<String> {
        if self.allowed() {
            return None;
        }
        let joined: String = self
            .denials
            .iter()
            .filter_map(|d| d.message.as_deref())
            .map(|m| format!("{}; ", m))
            .collect();
        Some(joined.trim().to_string())
    }

    /// Reason of the first denial
    pub fn reason(&self) -> Option<&str> {
        self.denials.first().and_then(|d| d.reason.as_deref())
    }
}

/// Run every pod policy
pub fn validate_all(ctx: &ValidationContext<'_>) -> PodVerdict {
    let mut verdict = PodVerdict::default();

    let policies: [fn(&ValidationContext<'_>) -> ValidationResult; 3] = [
        labels::validate_disallow_label,
        labels::validate_wait_forever,
        containers::validate_container_names,
    ];

    for policy in policies {
        let result = policy(ctx);
        if !result.allowed {
            verdict.denials.push(result);
        }
    }

    verdict.suspend = verdict
        .denials
        .iter()
        .any(|d| d.reason.as_deref() == Some(labels::WAIT_FOREVER_REASON));
    verdict
}
