//! Fixed sidecar injection.

use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, PodSpec, ResourceRequirements, Volume, VolumeMount,
};

use super::error::Result;
use super::patch::{PatchDocument, pointer};

/// Name of the injected sidecar; doubles as the idempotency marker
pub const SIDECAR_CONTAINER_NAME: &str = "webhook-added-sidecar";
/// Volume the sidecar mounts
pub const SIDECAR_VOLUME_NAME: &str = "vol";
pub const SIDECAR_MOUNT_PATH: &str = "/tmp";

pub fn sidecar_container(image: &str) -> Container {
    Container {
        name: SIDECAR_CONTAINER_NAME.to_string(),
        image: Some(image.to_string()),
        volume_mounts: Some(vec![VolumeMount {
            name: SIDECAR_VOLUME_NAME.to_string(),
            mount_path: SIDECAR_MOUNT_PATH.to_string(),
            ..Default::default()
        }]),
        resources: Some(ResourceRequirements::default()),
        ..Default::default()
    }
}

fn sidecar_volume() -> Volume {
    Volume {
        name: SIDECAR_VOLUME_NAME.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    }
}

/// Append the sidecar, declaring its volume when the pod lacks one.
pub fn build(image: &str, spec: &PodSpec) -> Result<PatchDocument> {
    let mut patch = PatchDocument::new();

    match &spec.volumes {
        Some(volumes) if volumes.iter().any(|v| v.name == SIDECAR_VOLUME_NAME) => {}
        Some(_) => patch.add(pointer(["spec", "volumes", "-"]), &sidecar_volume())?,
        None => patch.add(pointer(["spec", "volumes"]), &vec![sidecar_volume()])?,
    }

    patch.add(pointer(["spec", "containers", "-"]), &sidecar_container(image))?;
    Ok(patch)
}
