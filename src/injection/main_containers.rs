//! Secret volume mounts for the pod's main containers.
//!
//! The mount path is randomized per admission request so the secret file's
//! location cannot be predicted by a local-file-inclusion attacker. The legacy
//! fixed path is still selectable.

use std::fmt;
use std::str::FromStr;

use k8s_openapi::api::core::v1::{Container, EnvVar, VolumeMount};
use uuid::Uuid;

use super::error::Result;
use super::init_containers::SECRET_VOLUME_NAME;
use super::patch::{PatchDocument, pointer};

/// Environment variable pointing application code at the mount path
pub const SECRET_LOCATION_ENV: &str = "SEC_LOC";
/// Directory under which the secret volume is mounted
pub const MOUNT_PATH_ROOT: &str = "/tmp";

/// How the per-container mount path is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathMode {
    /// `/tmp/<uuid>`, fresh for every admission request
    #[default]
    Randomized,
    /// `/tmp` (legacy)
    Fixed,
}

impl fmt::Display for PathMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathMode::Randomized => write!(f, "randomized"),
            PathMode::Fixed => write!(f, "fixed"),
        }
    }
}

impl FromStr for PathMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "randomized" | "random" => Ok(PathMode::Randomized),
            "fixed" => Ok(PathMode::Fixed),
            other => Err(format!(
                "unknown mount path mode '{}', expected 'randomized' or 'fixed'",
                other
            )),
        }
    }
}

/// Mount strategy for main containers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountStrategy {
    pub path_mode: PathMode,
    /// Also add [`SECRET_LOCATION_ENV`] to every container
    pub inject_env_var: bool,
}

impl Default for MountStrategy {
    fn default() -> Self {
        Self {
            path_mode: PathMode::Randomized,
            inject_env_var: true,
        }
    }
}

impl MountStrategy {
    /// Mount path for one admission request.
    ///
    /// Call once per request and reuse the result for every container.
    pub fn mount_path(&self) -> String {
        match self.path_mode {
            PathMode::Randomized => format!("{}/{}", MOUNT_PATH_ROOT, Uuid::new_v4()),
            PathMode::Fixed => MOUNT_PATH_ROOT.to_string(),
        }
    }
}

/// Mount the secret volume at `mount_path` in every container, by index.
pub fn build(
    containers: &[Container],
    mount_path: &str,
    strategy: &MountStrategy,
) -> Result<PatchDocument> {
    let mount = VolumeMount {
        name: SECRET_VOLUME_NAME.to_string(),
        mount_path: mount_path.to_string(),
        ..Default::default()
    };
    let env = EnvVar {
        name: SECRET_LOCATION_ENV.to_string(),
        value: Some(mount_path.to_string()),
        ..Default::default()
    };

    let mut patch = PatchDocument::new();
    for (index, container) in containers.iter().enumerate() {
        let index = index.to_string();

        if container.volume_mounts.is_some() {
            patch.add(
                pointer(["spec", "containers", index.as_str(), "volumeMounts", "-"]),
                &mount,
            )?;
        } else {
            patch.add(
                pointer(["spec", "containers", index.as_str(), "volumeMounts"]),
                &vec![mount.clone()],
            )?;
        }

        if strategy.inject_env_var {
            if container.env.is_some() {
                patch.add(pointer(["spec", "containers", index.as_str(), "env", "-"]), &env)?;
            } else {
                patch.add(
                    pointer(["spec", "containers", index.as_str(), "env"]),
                    &vec![env.clone()],
                )?;
            }
        }
    }

    Ok(patch)
}
