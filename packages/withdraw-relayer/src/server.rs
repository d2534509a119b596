//! HTTP server: the withdraw endpoint plus health and metrics

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use eyre::eyre;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::approval::ApprovalState;
use crate::relay::{RelayError, WithdrawRelay};

/// Prometheus metrics
pub struct Metrics {
    pub withdrawals_succeeded_total: IntCounter,
    pub withdrawals_rejected_total: IntCounter,
    /// Rejections labelled by reason (see [`RelayError::reason`])
    pub withdrawals_rejected_by_reason: IntCounterVec,
    pub chain_call_failures_total: IntCounter,
    /// -1 failed, 0 unchecked, 1 checking, 2 approved
    pub approval_state: IntGauge,
    pub registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let withdrawals_succeeded_total = IntCounter::new(
            "withdraw_relayer_withdrawals_succeeded_total",
            "Withdrawals relayed with a successful receipt",
        )
        .expect("constant metric name is valid");

        let withdrawals_rejected_total = IntCounter::new(
            "withdraw_relayer_withdrawals_rejected_total",
            "Withdraw requests that did not produce a withdrawal",
        )
        .expect("constant metric name is valid");

        let withdrawals_rejected_by_reason = IntCounterVec::new(
            Opts::new(
                "withdraw_relayer_withdrawals_rejected_by_reason_total",
                "Withdraw requests rejected, by reason",
            ),
            &["reason"],
        )
        .expect("constant metric name is valid");

        let chain_call_failures_total = IntCounter::new(
            "withdraw_relayer_chain_call_failures_total",
            "Withdraw contract calls that failed, reverted or timed out",
        )
        .expect("constant metric name is valid");

        let approval_state = IntGauge::new(
            "withdraw_relayer_approval_state",
            "Token approval state (-1 failed, 0 unchecked, 1 checking, 2 approved)",
        )
        .expect("constant metric name is valid");

        registry
            .register(Box::new(withdrawals_succeeded_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(withdrawals_rejected_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(withdrawals_rejected_by_reason.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(chain_call_failures_total.clone()))
            .expect("metric registration must not be called twice");
        registry
            .register(Box::new(approval_state.clone()))
            .expect("metric registration must not be called twice");

        Self {
            withdrawals_succeeded_total,
            withdrawals_rejected_total,
            withdrawals_rejected_by_reason,
            chain_call_failures_total,
            approval_state,
            registry,
        }
    }

    fn record(&self, result: &Result<impl Sized, RelayError>) {
        match result {
            Ok(_) => self.withdrawals_succeeded_total.inc(),
            Err(e) => {
                self.withdrawals_rejected_total.inc();
                self.withdrawals_rejected_by_reason
                    .with_label_values(&[e.reason()])
                    .inc();
                if matches!(e, RelayError::ChainCallFailed(_)) {
                    self.chain_call_failures_total.inc();
                }
            }
        }
    }
}

/// Combined app state
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<WithdrawRelay>,
    pub metrics: Arc<Metrics>,
    pub relayer_address: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            RelayError::InvalidRequest(_) | RelayError::InvalidAmount(_) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            RelayError::InvalidSignature
            | RelayError::SignerMismatch { .. }
            | RelayError::ExpiredClaim { .. } => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
            }
            RelayError::ReplayedClaim => {
                (StatusCode::CONFLICT, Json(json!({ "error": message }))).into_response()
            }
            RelayError::ApprovalFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Token approval failed", "details": message })),
            )
                .into_response(),
            RelayError::ChainCallFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Withdraw failed", "details": message })),
            )
                .into_response(),
        }
    }
}

async fn withdraw(State(state): State<AppState>, body: Bytes) -> Response {
    let result = state.relay.handle_withdraw(&body).await;
    state.metrics.record(&result);

    match result {
        Ok(receipt) => Json(receipt).into_response(),
        Err(e) => {
            warn!(reason = e.reason(), error = %e, "Withdraw request rejected");
            e.into_response()
        }
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub approval_state: ApprovalState,
    pub relayer_address: String,
    pub withdrawals_succeeded: u64,
    pub withdrawals_rejected: u64,
}

/// Health check endpoint handler
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        approval_state: state.relay.gate().state(),
        relayer_address: state.relayer_address.clone(),
        withdrawals_succeeded: state.metrics.withdrawals_succeeded_total.get(),
        withdrawals_rejected: state.metrics.withdrawals_rejected_total.get(),
    })
}

/// Liveness probe (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Readiness probe: ready once the token approval is in place
async fn readiness(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.relay.gate().state() == ApprovalState::Approved {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT_READY")
    }
}

/// Prometheus metrics endpoint
async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    state
        .metrics
        .approval_state
        .set(state.relay.gate().state().as_gauge());

    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry.gather();
    let mut buffer = Vec::new();

    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response();
    }

    match Response::builder()
        .header(header::CONTENT_TYPE, encoder.format_type())
        .body(axum::body::Body::from(buffer))
    {
        Ok(resp) => resp,
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to build metrics response",
        )
            .into_response(),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/withdraw", post(withdraw))
        .route("/health", get(health_check))
        .route("/healthz", get(liveness))
        .route("/readyz", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn start_server(
    bind_address: &str,
    port: u16,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> eyre::Result<()> {
    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .map_err(|e| eyre!("Invalid bind address {}:{}: {}", bind_address, port, e))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Withdraw relayer listening on {}", listener.local_addr()?);
    info!("  POST /withdraw - Relay a signed withdrawal claim");
    info!("  /health  - Full health status (JSON)");
    info!("  /metrics - Prometheus metrics");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::ApprovalError;
    use axum::body::to_bytes;

    async fn status_and_body(err: RelayError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_client_errors_map_to_4xx() {
        let (status, body) = status_and_body(RelayError::InvalidRequest("bad".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("bad"));
        assert!(body.get("details").is_none());

        let (status, _) = status_and_body(RelayError::InvalidAmount("x".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        for err in [
            RelayError::InvalidSignature,
            RelayError::SignerMismatch {
                signer: "rA".into(),
                account: "rB".into(),
            },
            RelayError::ExpiredClaim {
                timestamp: 0,
                age_ms: 360_000,
            },
        ] {
            let (status, _) = status_and_body(err).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }

        let (status, _) = status_and_body(RelayError::ReplayedClaim).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_server_errors_carry_details() {
        let (status, body) = status_and_body(RelayError::ApprovalFailed(
            ApprovalError::AllowanceQuery("rpc down".into()),
        ))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Token approval failed");
        assert!(body["details"].as_str().unwrap().contains("rpc down"));

        let (status, body) =
            status_and_body(RelayError::ChainCallFailed("nonce too low".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["details"].as_str().unwrap().contains("nonce too low"));
    }

    #[test]
    fn test_metrics_record_outcomes() {
        let metrics = Metrics::new();
        metrics.record(&Ok::<(), RelayError>(()));
        metrics.record(&Err::<(), _>(RelayError::ReplayedClaim));
        metrics.record(&Err::<(), _>(RelayError::ChainCallFailed("boom".into())));

        assert_eq!(metrics.withdrawals_succeeded_total.get(), 1);
        assert_eq!(metrics.withdrawals_rejected_total.get(), 2);
        assert_eq!(metrics.chain_call_failures_total.get(), 1);
        assert_eq!(
            metrics
                .withdrawals_rejected_by_reason
                .with_label_values(&["replayed_claim"])
                .get(),
            1
        );
    }

    #[test]
    fn test_metrics_registry_gathers() {
        let metrics = Metrics::new();
        metrics.approval_state.set(2);
        let families = metrics.registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "withdraw_relayer_approval_state"));
    }
}
