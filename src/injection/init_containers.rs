//! Init-container injection.
//!
//! Each secret reference becomes one init container that fetches the secret
//! into a shared in-memory volume before the main containers start.

use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, EnvVar, EnvVarSource, ObjectFieldSelector, PodSpec,
    ResourceRequirements, Volume, VolumeMount,
};

use super::annotations::SecretReference;
use super::error::{InjectionError, Result};
use super::patch::{PatchDocument, pointer};

/// Name prefix of injected init containers; the index is appended
pub const INIT_CONTAINER_PREFIX: &str = "secrets-init-container";
/// Shared in-memory volume the secrets are written to
pub const SECRET_VOLUME_NAME: &str = "secret-vol";
/// Mount path of the secret volume inside init containers
pub const INIT_MOUNT_PATH: &str = "/tmp";
/// Environment variable the fetcher reads the secret ARN from
pub const SECRET_ARN_ENV: &str = "SECRET_ARN";

/// `secrets-init-container-<index>`
pub fn init_container_name(index: usize) -> String {
    format!("{}-{}", INIT_CONTAINER_PREFIX, index)
}

/// Field path exposing the value of `annotation` to the container
pub fn annotation_field_path(annotation: &str) -> String {
    format!("metadata.annotations['{}']", annotation)
}

/// Init container that resolves the secret named by `annotation`
pub fn secret_init_container(image: &str, index: usize, annotation: &str) -> Container {
    Container {
        name: init_container_name(index),
        image: Some(image.to_string()),
        volume_mounts: Some(vec![VolumeMount {
            name: SECRET_VOLUME_NAME.to_string(),
            mount_path: INIT_MOUNT_PATH.to_string(),
            ..Default::default()
        }]),
        env: Some(vec![EnvVar {
            name: SECRET_ARN_ENV.to_string(),
            value_from: Some(EnvVarSource {
                field_ref: Some(ObjectFieldSelector {
                    field_path: annotation_field_path(annotation),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]),
        resources: Some(ResourceRequirements::default()),
        ..Default::default()
    }
}

/// The `emptyDir` volume backed by memory (tmpfs)
pub fn secret_volume() -> Volume {
    Volume {
        name: SECRET_VOLUME_NAME.to_string(),
        empty_dir: Some(EmptyDirVolumeSource {
            medium: Some("Memory".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build the init-container and volume operations for `references`.
///
/// Fails with [`InjectionError::MalformedPatch`] when there is nothing to
/// inject.
pub fn build(references: &[SecretReference], image: &str, spec: &PodSpec) -> Result<PatchDocument> {
    if references.is_empty() {
        return Err(InjectionError::MalformedPatch(
            "no secret references to inject".to_string(),
        ));
    }

    let containers: Vec<Container> = references
        .iter()
        .enumerate()
        .map(|(index, reference)| secret_init_container(image, index, &reference.annotation))
        .collect();

    let mut patch = PatchDocument::new();

    let has_init_containers = spec
        .init_containers
        .as_ref()
        .is_some_and(|c| !c.is_empty());
    if has_init_containers {
        // Adding the whole array would replace the pod's own init containers
        for container in &containers {
            patch.add(pointer(["spec", "initContainers", "-"]), container)?;
        }
    } else {
        patch.add(pointer(["spec", "initContainers"]), &containers)?;
    }

    if spec.volumes.is_some() {
        patch.add(pointer(["spec", "volumes", "-"]), &secret_volume())?;
    } else {
        patch.add(pointer(["spec", "volumes"]), &vec![secret_volume()])?;
    }

    Ok(patch)
}
