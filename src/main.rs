//! secrets-injector-webhook - mutating admission webhook that injects
//! secret-retrieval containers into pods.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Parses configuration from flags and environment
//! - Starts the health server and the TLS webhook server

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use secrets_injector_webhook::health::{HealthState, run_health_server};
use secrets_injector_webhook::{
    AdmissionEvaluator, Args, InjectorConfig, WebhookState, run_webhook_server,
};

/// Grace period for in-flight admissions to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install the TLS crypto provider before any TLS operations
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
        && rustls::crypto::CryptoProvider::get_default().is_none()
    {
        return Err("Failed to install rustls crypto provider and no provider is available".into());
    }

    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("secrets_injector_webhook=info".parse()?),
        )
        .json()
        .init();

    let args = Args::parse();
    let evaluator = AdmissionEvaluator::new(Arc::new(InjectorConfig::try_from(&args)?));

    let config = evaluator.config();
    info!(
        sidecar_image = ?config.sidecar_image(),
        init_image = ?config.init_image(),
        annotation_prefix = %config.annotation_prefix(),
        mount_path_mode = %config.mount_strategy().path_mode,
        inject_env_var = config.mount_strategy().inject_env_var,
        wait_forever_hook = config.hooks().wait_forever,
        "Starting secrets-injector-webhook"
    );

    // Create shared health state
    let health_state = Arc::new(HealthState::new());

    let health_handle = {
        let health_state = health_state.clone();
        let port = args.health_port;
        tokio::spawn(async move { run_health_server(health_state, port).await })
    };

    let webhook_handle = {
        let state = Arc::new(WebhookState::new(
            evaluator,
            health_state.clone(),
        ));
        let cert = args.tls_cert_file.clone();
        let key = args.tls_private_key_file.clone();
        let port = args.port;
        tokio::spawn(async move { run_webhook_server(state, &cert, &key, port).await })
    };

    tokio::select! {
        // Readiness and metrics are served here; losing it is fatal
        result = health_handle => {
            match result {
                Ok(Ok(())) => {
                    error!("Health server stopped unexpectedly");
                    return Err("health server stopped".into());
                }
                Ok(Err(e)) => {
                    error!("Health server error: {}", e);
                    return Err(e.into());
                }
                Err(e) => {
                    error!("Health server task panicked: {}", e);
                    return Err(e.into());
                }
            }
        }
        result = webhook_handle => {
            match result {
                Ok(Ok(())) => info!("Webhook server stopped"),
                Ok(Err(e)) => {
                    error!("Webhook server error: {}", e);
                    return Err(e.into());
                }
                Err(e) => {
                    error!("Webhook server task panicked: {}", e);
                    return Err(e.into());
                }
            }
        }
        // Handle graceful shutdown on SIGTERM or SIGINT
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            // Mark as not ready so the Service stops routing admissions here
            health_state.set_ready(false).await;
            info!("Marked webhook as not ready");

            info!(
                "Waiting {}s for in-flight admissions to complete...",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;

            info!("Grace period complete, shutting down");
        }
    }

    info!("Webhook stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the webhook cannot shut down
/// gracefully without them.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
