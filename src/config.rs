//! Startup configuration.
//!
//! Command-line flags (with environment fallbacks) are parsed once in `main`
//! and turned into an immutable [`InjectorConfig`] shared by every request.

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use thiserror::Error;

use crate::health::HEALTH_PORT;
use crate::injection::{DEFAULT_ANNOTATION_PREFIX, MountStrategy, PathMode};
use crate::webhooks::{WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT};

/// Invalid startup configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("annotation prefix '{0}' must not contain '/'")]
    InvalidPrefix(String),
}

/// Command-line arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "secrets-injector-webhook", version, about)]
pub struct Args {
    /// Image of the injected sidecar; also used for init containers unless
    /// --init-image is set
    #[arg(long, env = "SIDECAR_IMAGE")]
    pub sidecar_image: Option<String>,

    /// Image of the secret-fetching init containers
    #[arg(long, env = "INIT_CONTAINER_IMAGE")]
    pub init_image: Option<String>,

    /// Annotation namespace marking secret references
    #[arg(long, env = "ANNOTATION_PREFIX", default_value = DEFAULT_ANNOTATION_PREFIX)]
    pub annotation_prefix: String,

    /// Mount path mode for main containers: randomized or fixed
    #[arg(long, env = "MOUNT_PATH_MODE", default_value_t = PathMode::Randomized)]
    pub mount_path_mode: PathMode,

    /// Add SEC_LOC pointing at the secret mount to every main container
    #[arg(
        long,
        env = "INJECT_SECRET_LOCATION_ENV",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub inject_secret_location_env: bool,

    /// Never answer pods labeled webhook-e2e-test=wait-forever (e2e timeout tests only)
    #[arg(long, env = "ENABLE_WAIT_FOREVER_HOOK")]
    pub enable_wait_forever_hook: bool,

    /// PEM certificate served by the webhook
    #[arg(long, env = "TLS_CERT_FILE", default_value = WEBHOOK_CERT_PATH)]
    pub tls_cert_file: PathBuf,

    /// PEM private key matching --tls-cert-file
    #[arg(long, env = "TLS_PRIVATE_KEY_FILE", default_value = WEBHOOK_KEY_PATH)]
    pub tls_private_key_file: PathBuf,

    /// HTTPS port of the admission endpoints
    #[arg(long, env = "WEBHOOK_PORT", default_value_t = WEBHOOK_PORT)]
    pub port: u16,

    /// HTTP port of the probe and metrics endpoints
    #[arg(long, env = "HEALTH_PORT", default_value_t = HEALTH_PORT)]
    pub health_port: u16,
}

/// Hooks that only make sense in end-to-end test clusters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestHooks {
    /// Suspend admission of pods labeled `webhook-e2e-test=wait-forever`
    pub wait_forever: bool,
}

/// Immutable engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectorConfig {
    sidecar_image: Option<String>,
    init_image: Option<String>,
    annotation_prefix: String,
    mount_strategy: MountStrategy,
    hooks: TestHooks,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            sidecar_image: None,
            init_image: None,
            annotation_prefix: DEFAULT_ANNOTATION_PREFIX.to_string(),
            mount_strategy: MountStrategy::default(),
            hooks: TestHooks::default(),
        }
    }
}

impl InjectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_sidecar_image(mut self, image: impl Into<String>) -> Self {
        self.sidecar_image = Some(image.into());
        self
    }

    #[must_use]
    pub fn with_init_image(mut self, image: impl Into<String>) -> Self {
        self.init_image = Some(image.into());
        self
    }

    #[must_use]
    pub fn with_annotation_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.annotation_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_mount_strategy(mut self, strategy: MountStrategy) -> Self {
        self.mount_strategy = strategy;
        self
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: TestHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn sidecar_image(&self) -> Option<&str> {
        self.sidecar_image.as_deref()
    }

    /// Init-container image, falling back to the sidecar image
    pub fn init_image(&self) -> Option<&str> {
        self.init_image.as_deref().or(self.sidecar_image.as_deref())
    }

    pub fn annotation_prefix(&self) -> &str {
        &self.annotation_prefix
    }

    pub fn mount_strategy(&self) -> &MountStrategy {
        &self.mount_strategy
    }

    pub fn hooks(&self) -> TestHooks {
        self.hooks
    }

    /// Reject values that would make every request misbehave
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sidecar_image.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::Empty("sidecar image"));
        }
        if self.init_image.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::Empty("init container image"));
        }
        if self.annotation_prefix.is_empty() {
            return Err(ConfigError::Empty("annotation prefix"));
        }
        if self.annotation_prefix.contains('/') {
            return Err(ConfigError::InvalidPrefix(self.annotation_prefix.clone()));
        }
        Ok(())
    }
}

impl TryFrom<&Args> for InjectorConfig {
    type Error = ConfigError;

    fn try_from(args: &Args) -> Result<Self, Self::Error> {
        let config = Self {
            sidecar_image: args.sidecar_image.clone(),
            init_image: args.init_image.clone(),
            annotation_prefix: args.annotation_prefix.clone(),
            mount_strategy: MountStrategy {
                path_mode: args.mount_path_mode,
                inject_env_var: args.inject_secret_location_env,
            },
            hooks: TestHooks {
                wait_forever: args.enable_wait_forever_hook,
            },
        };
        config.validate()?;
        Ok(config)
    }
}
