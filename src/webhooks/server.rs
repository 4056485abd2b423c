//! Admission webhook server.
//!
//! Provides HTTPS endpoints for Kubernetes admission webhooks:
//! - `/pods` - built-in deny rules for pods
//! - `/pods/attach` - deny rule for `kubectl attach`
//! - `/mutating-pods` - annotation-driven secret injection
//! - `/mutating-pods-sidecar` - fixed sidecar injection
//!
//! To enable webhooks:
//! 1. Issue a serving certificate (e.g. with cert-manager)
//! 2. Create a MutatingWebhookConfiguration (and a ValidatingWebhookConfiguration
//!    for the deny rules) pointing at this service
//! 3. Mount the TLS certificate secret at /etc/webhook/certs/

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use axum_server::Handle;
use tracing::{debug, error, info};

use super::evaluator::{AdmissionEvaluator, MutationStrategy};
use super::review::{
    AdmissionRequest, AdmissionResponse, AdmissionReview, AdmissionReviewResponse,
};
use crate::health::HealthState;

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 8443;

/// Shared state for webhook handlers
pub struct WebhookState {
    pub evaluator: AdmissionEvaluator,
    pub health: Arc<HealthState>,
}

impl WebhookState {
    pub fn new(evaluator: AdmissionEvaluator, health: Arc<HealthState>) -> Self {
        Self { evaluator, health }
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/pods", post(admit_pods))
        .route("/pods/attach", post(admit_pods_attach))
        .route("/mutating-pods", post(mutate_pods))
        .route("/mutating-pods-sidecar", post(mutate_pods_sidecar))
        .with_state(state)
}

type ReviewReply = (StatusCode, Json<AdmissionReviewResponse>);

/// Pull the request out of a review, or build the 400 reply
fn extract_request(
    webhook: &str,
    review: AdmissionReview,
) -> Result<AdmissionRequest, ReviewReply> {
    match review.request {
        Some(request) => {
            debug!(
                webhook,
                uid = %request.uid,
                operation = %request.operation,
                namespace = ?request.namespace,
                name = ?request.name,
                "Processing admission request"
            );
            Ok(request)
        }
        None => {
            error!(webhook, "AdmissionReview carries no request");
            let response = AdmissionResponse::failure(
                "",
                400,
                "Invalid AdmissionReview: missing request",
                Some("InvalidRequest"),
            );
            Err((StatusCode::BAD_REQUEST, Json(response.into_review())))
        }
    }
}

/// Record metrics for a finished admission and wrap the response
fn finish(
    state: &WebhookState,
    webhook: &str,
    started: Instant,
    response: AdmissionResponse,
) -> ReviewReply {
    let metrics = &state.health.metrics;
    metrics.record_admission(webhook, response.allowed, started.elapsed().as_secs_f64());
    if response.patch.is_some() {
        metrics.record_patch(webhook);
    }
    if let Some(status) = response.status.as_ref().filter(|s| s.code != 403) {
        metrics.record_error(webhook, status.reason.as_deref().unwrap_or("Unknown"));
    }
    (StatusCode::OK, Json(response.into_review()))
}

async fn admit_pods(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview>,
) -> impl IntoResponse {
    const WEBHOOK: &str = "pods";
    let started = Instant::now();
    let request = match extract_request(WEBHOOK, review) {
        Ok(request) => request,
        Err(reply) => return reply,
    };
    let response = state.evaluator.evaluate_pod_admission(&request).await;
    finish(&state, WEBHOOK, started, response)
}

async fn admit_pods_attach(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview>,
) -> impl IntoResponse {
    const WEBHOOK: &str = "pods-attach";
    let started = Instant::now();
    let request = match extract_request(WEBHOOK, review) {
        Ok(request) => request,
        Err(reply) => return reply,
    };
    let response = state.evaluator.evaluate_pod_attach_admission(&request);
    finish(&state, WEBHOOK, started, response)
}

async fn mutate_pods(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview>,
) -> impl IntoResponse {
    mutate(&state, "mutating-pods", review, MutationStrategy::AnnotationDriven)
}

async fn mutate_pods_sidecar(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview>,
) -> impl IntoResponse {
    mutate(&state, "mutating-pods-sidecar", review, MutationStrategy::SidecarOnly)
}

fn mutate(
    state: &WebhookState,
    webhook: &str,
    review: AdmissionReview,
    strategy: MutationStrategy,
) -> ReviewReply {
    let started = Instant::now();
    let request = match extract_request(webhook, review) {
        Ok(request) => request,
        Err(reply) => return reply,
    };
    let response = state.evaluator.evaluate_pod_mutation(&request, strategy);
    finish(state, webhook, started, response)
}

/// Errors that can occur when running the webhook server
#[derive(Debug)]
pub enum WebhookError {
    /// TLS configuration error
    TlsConfig(String),
    /// Server error
    Server(String),
}

impl std::fmt::Display for WebhookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebhookError::TlsConfig(msg) => write!(f, "TLS configuration error: {}", msg),
            WebhookError::Server(msg) => write!(f, "Webhook server error: {}", msg),
        }
    }
}

impl std::error::Error for WebhookError {}

/// Mark the health state ready once the server behind `handle` is bound
///
/// Stays not-ready if the server stops before it starts listening.
async fn ready_when_listening(handle: Handle, health: Arc<HealthState>) {
    match handle.listening().await {
        Some(addr) => {
            info!(%addr, "Webhook server listening with TLS");
            health.set_ready(true).await;
        }
        None => error!("Webhook server stopped before listening"),
    }
}

/// Run the webhook server with TLS
///
/// Binds to `0.0.0.0:<port>` and marks the health state ready once the
/// listener is bound.
///
/// # Arguments
/// * `state` - Evaluator and health state shared by all handlers
/// * `cert_path` - Path to TLS certificate file (PEM format)
/// * `key_path` - Path to TLS private key file (PEM format)
/// * `port` - HTTPS port
pub async fn run_webhook_server(
    state: Arc<WebhookState>,
    cert_path: &Path,
    key_path: &Path,
    port: u16,
) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;

    let health = Arc::clone(&state.health);
    let app = create_webhook_router(state);

    let config = RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let handle = Handle::new();
    tokio::spawn(ready_when_listening(handle.clone(), health));

    axum_server::bind_rustls(addr, config)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}
