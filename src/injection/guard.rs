//! Double-injection guard.

use k8s_openapi::api::core::v1::Container;

/// How a container name is compared against the marker of a previous injection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel<'a> {
    /// Name equals the marker
    Exact(&'a str),
    /// Name starts with the marker (numbered containers)
    Prefix(&'a str),
}

impl Sentinel<'_> {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Sentinel::Exact(marker) => name == *marker,
            Sentinel::Prefix(marker) => name.starts_with(marker),
        }
    }
}

/// Whether any container carries the marker of an earlier mutation
pub fn already_injected(containers: &[Container], sentinel: Sentinel<'_>) -> bool {
    containers.iter().any(|c| sentinel.matches(&c.name))
}
