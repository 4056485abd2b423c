//! Admission decisions.
//!
//! [`AdmissionEvaluator`] turns one [`AdmissionRequest`] into one
//! [`AdmissionResponse`]. Every failure, including malformed requests and
//! missing configuration, is reported inside the response rather than as a
//! transport error.

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use super::error::AdmissionError;
use super::policies::attach::{ATTACH_POD_NAME, validate_attach};
use super::policies::{PodVerdict, ValidationContext, ValidationResult, validate_all};
use super::review::{
    AdmissionRequest, AdmissionResponse, GroupVersionResource, PodAttachOptions,
};
use crate::config::InjectorConfig;
use crate::injection::{
    INIT_CONTAINER_PREFIX, PatchDocument, SIDECAR_CONTAINER_NAME, Sentinel, already_injected,
    init_containers, main_containers, scan, sidecar,
};

/// Sub-resource of `kubectl attach` requests
pub const ATTACH_SUBRESOURCE: &str = "attach";

/// Message returned when the sidecar strategy runs without an image
pub const NO_SIDECAR_IMAGE_MESSAGE: &str = "No image specified by the sidecar-image parameter";
/// Message returned when the annotation strategy runs without an image
pub const NO_INIT_IMAGE_MESSAGE: &str =
    "No image specified by the init-image or sidecar-image parameter";

/// How a pod is mutated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationStrategy {
    /// Init containers per secret annotation, plus mounts in every container
    AnnotationDriven,
    /// A single fixed sidecar container
    SidecarOnly,
}

impl MutationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationStrategy::AnnotationDriven => "annotation-driven",
            MutationStrategy::SidecarOnly => "sidecar-only",
        }
    }
}

impl std::fmt::Display for MutationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stateless admission engine, cheap to clone and share across requests
#[derive(Debug, Clone)]
pub struct AdmissionEvaluator {
    config: Arc<InjectorConfig>,
}

impl AdmissionEvaluator {
    pub fn new(config: Arc<InjectorConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InjectorConfig {
        &self.config
    }

    /// Apply the built-in deny rules to a pod.
    ///
    /// With the wait-forever hook enabled, a pod labeled
    /// `webhook-e2e-test=wait-forever` never gets a response: the returned
    /// future stays pending until the caller drops it.
    pub async fn evaluate_pod_admission(&self, req: &AdmissionRequest) -> AdmissionResponse {
        let (response, suspend) = self.check_pod_admission(req);
        if suspend && self.config.hooks().wait_forever {
            warn!(uid = %req.uid, "Withholding admission response (wait-forever hook)");
            std::future::pending::<()>().await;
        }
        response
    }

    /// Synchronous part of [`Self::evaluate_pod_admission`].
    ///
    /// Returns the response and whether the pod asked for it to be withheld.
    pub fn check_pod_admission(&self, req: &AdmissionRequest) -> (AdmissionResponse, bool) {
        let verdict = match admit_pod(req) {
            Ok(verdict) => verdict,
            Err(e) => return (reject(req, e), false),
        };

        match verdict.message() {
            None => {
                debug!(uid = %req.uid, name = ?req.name, "Pod admitted");
                (AdmissionResponse::allow(&req.uid), false)
            }
            Some(message) => {
                warn!(
                    uid = %req.uid,
                    namespace = ?req.namespace,
                    message = %message,
                    "Pod admission denied"
                );
                (
                    AdmissionResponse::deny(&req.uid, &message, verdict.reason()),
                    verdict.suspend,
                )
            }
        }
    }

    /// Deny interactive attach to the sentinel pod's `container1`
    pub fn evaluate_pod_attach_admission(&self, req: &AdmissionRequest) -> AdmissionResponse {
        if req.name.as_deref() != Some(ATTACH_POD_NAME) {
            debug!(uid = %req.uid, name = ?req.name, "Attach allowed (not the guarded pod)");
            return AdmissionResponse::allow(&req.uid);
        }

        let result = match check_attach(req) {
            Ok(result) => result,
            Err(e) => return reject(req, e),
        };

        if result.allowed {
            AdmissionResponse::allow(&req.uid)
        } else {
            let message = result.message.unwrap_or_default();
            warn!(uid = %req.uid, message = %message, "Attach denied");
            AdmissionResponse::deny(&req.uid, &message, result.reason.as_deref())
        }
    }

    /// Inject secret machinery into a pod using `strategy`
    pub fn evaluate_pod_mutation(
        &self,
        req: &AdmissionRequest,
        strategy: MutationStrategy,
    ) -> AdmissionResponse {
        match self.mutate_pod(req, strategy) {
            Ok(response) => response,
            Err(e) => reject(req, e),
        }
    }

    fn mutate_pod(
        &self,
        req: &AdmissionRequest,
        strategy: MutationStrategy,
    ) -> Result<AdmissionResponse, AdmissionError> {
        // Checked before touching the request so a misconfigured sidecar
        // webhook fails every call the same way
        if strategy == MutationStrategy::SidecarOnly && self.config.sidecar_image().is_none() {
            return Err(AdmissionError::Configuration(
                NO_SIDECAR_IMAGE_MESSAGE.to_string(),
            ));
        }

        expect_pods(req)?;
        let pod: Pod = decode(req, "Pod")?;

        if !self.should_patch(&pod, strategy) {
            debug!(uid = %req.uid, strategy = %strategy, "No patch required");
            return Ok(AdmissionResponse::allow(&req.uid));
        }

        let patch = self.build_patch(&pod, strategy)?;
        info!(
            uid = %req.uid,
            namespace = ?req.namespace,
            strategy = %strategy,
            patch_ops = patch.len(),
            "Pod mutated"
        );
        Ok(AdmissionResponse::allow(&req.uid).with_patch(&patch)?)
    }

    /// Whether `pod` still needs mutating under `strategy`
    pub fn should_patch(&self, pod: &Pod, strategy: MutationStrategy) -> bool {
        let Some(spec) = pod.spec.as_ref() else {
            return false;
        };

        match strategy {
            MutationStrategy::AnnotationDriven => {
                let init_containers = spec.init_containers.as_deref().unwrap_or_default();
                if already_injected(init_containers, Sentinel::Prefix(INIT_CONTAINER_PREFIX)) {
                    return false;
                }
                !scan(annotations(pod), self.config.annotation_prefix()).is_empty()
            }
            MutationStrategy::SidecarOnly => {
                !already_injected(&spec.containers, Sentinel::Exact(SIDECAR_CONTAINER_NAME))
            }
        }
    }

    /// Build the full patch for `pod`.
    ///
    /// Does not consult the idempotency guard; call [`Self::should_patch`]
    /// first.
    pub fn build_patch(
        &self,
        pod: &Pod,
        strategy: MutationStrategy,
    ) -> Result<PatchDocument, AdmissionError> {
        let Some(spec) = pod.spec.as_ref() else {
            return Ok(PatchDocument::new());
        };

        match strategy {
            MutationStrategy::AnnotationDriven => {
                let image = self.config.init_image().ok_or_else(|| {
                    AdmissionError::Configuration(NO_INIT_IMAGE_MESSAGE.to_string())
                })?;
                let references = scan(annotations(pod), self.config.annotation_prefix());
                for reference in &references {
                    debug!(
                        annotation = %reference.annotation,
                        secret = %reference.value,
                        "Injecting secret reference"
                    );
                }

                let mut patch = init_containers::build(&references, image, spec)?;

                let strategy = self.config.mount_strategy();
                let mount_path = strategy.mount_path();
                debug!(
                    mount_path = %mount_path,
                    secrets = references.len(),
                    "Mounting secrets"
                );
                patch.extend(main_containers::build(
                    &spec.containers,
                    &mount_path,
                    strategy,
                )?);
                Ok(patch)
            }
            MutationStrategy::SidecarOnly => {
                let image = self.config.sidecar_image().ok_or_else(|| {
                    AdmissionError::Configuration(NO_SIDECAR_IMAGE_MESSAGE.to_string())
                })?;
                Ok(sidecar::build(image, spec)?)
            }
        }
    }
}

fn admit_pod(req: &AdmissionRequest) -> Result<PodVerdict, AdmissionError> {
    expect_pods(req)?;
    let pod: Pod = decode(req, "Pod")?;
    Ok(validate_all(&ValidationContext::new(&pod)))
}

fn check_attach(req: &AdmissionRequest) -> Result<ValidationResult, AdmissionError> {
    expect_pods(req)?;
    // Only `pods/attach` carries attach options. Any other (or no)
    // sub-resource is a different request and passes untouched.
    if req.sub_resource.as_deref() != Some(ATTACH_SUBRESOURCE) {
        debug!(uid = %req.uid, subresource = ?req.sub_resource, "Not an attach request");
        return Ok(ValidationResult::allowed());
    }
    let options: PodAttachOptions = decode(req, "PodAttachOptions")?;
    Ok(validate_attach(&options))
}

fn expect_pods(req: &AdmissionRequest) -> Result<(), AdmissionError> {
    let expected = GroupVersionResource::pods();
    if req.resource != expected {
        return Err(AdmissionError::ResourceMismatch {
            expected,
            actual: req.resource.clone(),
        });
    }
    Ok(())
}

fn decode<T: DeserializeOwned>(
    req: &AdmissionRequest,
    kind: &'static str,
) -> Result<T, AdmissionError> {
    let object = req.object.as_ref().ok_or(AdmissionError::MissingObject)?;
    T::deserialize(object).map_err(|source| AdmissionError::Decode { kind, source })
}

fn annotations(pod: &Pod) -> &BTreeMap<String, String> {
    static EMPTY: BTreeMap<String, String> = BTreeMap::new();
    pod.metadata.annotations.as_ref().unwrap_or(&EMPTY)
}

fn reject(req: &AdmissionRequest, e: AdmissionError) -> AdmissionResponse {
    error!(
        uid = %req.uid,
        operation = %req.operation,
        reason = e.reason(),
        error = %e,
        "Admission request rejected"
    );
    e.into_response(&req.uid)
}
