//! secrets-injector-webhook library crate
//!
//! Exports the admission engine, patch builders, configuration and the
//! HTTPS/health servers that host them.

pub mod config;
pub mod health;
pub mod injection;
pub mod webhooks;

pub use config::{Args, ConfigError, InjectorConfig, TestHooks};
pub use health::HealthState;
pub use injection::{MountStrategy, PatchDocument, PathMode};
pub use webhooks::{
    AdmissionEvaluator, MutationStrategy, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT,
    WebhookError, WebhookState, run_webhook_server,
};
