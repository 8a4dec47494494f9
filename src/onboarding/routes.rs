//! REST + WebSocket endpoints driving one onboarding wizard session.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::model::FormSnapshot;
use super::otp::OtpChannel;
use super::session::{NextOutcome, VERIFYING_LABEL, WizardSession};
use super::state::{FlowMode, StepKey};
use crate::error::{Error, OtpError, SubmissionError};

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub session: Arc<WizardSession>,
}

/// Build the onboarding router.
pub fn onboarding_routes(session: Arc<WizardSession>) -> Router {
    let state = OnboardingRouteState { session };

    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .route("/api/onboarding/status", get(get_status))
        .route(
            "/api/onboarding/snapshot",
            get(get_snapshot).put(put_snapshot),
        )
        .route("/api/onboarding/start", post(start))
        .route("/api/onboarding/step", post(go_to_step))
        .route("/api/onboarding/next", post(next))
        .route("/api/onboarding/submit", post(submit))
        .route("/api/onboarding/otp/{channel}/send", post(send_otp))
        .route("/api/onboarding/otp/{channel}/verify", post(verify_otp))
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({"error": message.into()}))).into_response()
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "marketplace-onboarding"
    }))
}

// ── WebSocket ───────────────────────────────────────────────────────────

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<OnboardingRouteState>,
) -> impl IntoResponse {
    info!("WebSocket observer connecting");
    ws.on_upgrade(|socket| handle_socket(socket, state.session))
}

async fn send_status(socket: &mut WebSocket, session: &WizardSession) -> bool {
    let status = session.status().await;
    let msg = serde_json::json!({"type": "sync", "status": status});
    socket
        .send(Message::Text(msg.to_string().into()))
        .await
        .is_ok()
}

async fn handle_socket(mut socket: WebSocket, session: Arc<WizardSession>) {
    // Subscribe before the initial sync so nothing slips between them
    let mut rx = session.subscribe();

    if !send_status(&mut socket, &session).await {
        warn!("Failed to send initial sync, observer disconnected");
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if let Ok(json) = serde_json::to_string(&event) {
                            if socket.send(Message::Text(json.into())).await.is_err() {
                                debug!("Observer disconnected during send");
                                break;
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "WS observer lagged behind session events");
                        if !send_status(&mut socket, &session).await {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        debug!("Session event channel closed");
                        break;
                    }
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket observer disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket connection closed");
}

// ── REST ────────────────────────────────────────────────────────────────

/// GET /api/onboarding/status
///
/// Current step, mode, versions, and per-step completion.
async fn get_status(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    Json(state.session.status().await)
}

/// GET /api/onboarding/snapshot
async fn get_snapshot(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    Json(state.session.snapshot().await)
}

/// PUT /api/onboarding/snapshot
///
/// Replaces the form contents with what the UI holds. Verification flags
/// are kept server-side.
async fn put_snapshot(
    State(state): State<OnboardingRouteState>,
    Json(snapshot): Json<FormSnapshot>,
) -> Response {
    match state.session.apply_client_snapshot(snapshot).await {
        Ok(()) => Json(state.session.status().await).into_response(),
        Err(e @ Error::ReadOnly) => error_response(StatusCode::CONFLICT, e.to_string()),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartRequest {
    mode: FlowMode,
    company_id: Option<String>,
    location_id: Option<String>,
}

/// POST /api/onboarding/start
///
/// `add` starts fresh; `edit` and `view` load a saved onboarding.
async fn start(
    State(state): State<OnboardingRouteState>,
    Json(req): Json<StartRequest>,
) -> Response {
    let result = match (req.mode, req.company_id, req.location_id) {
        (FlowMode::Add, _, _) => {
            state.session.start_new().await;
            Ok(())
        }
        (mode, Some(company_id), Some(location_id)) => {
            state
                .session
                .open(&company_id, &location_id, mode == FlowMode::View)
                .await
        }
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "companyId and locationId are required to edit or view an onboarding",
            );
        }
    };

    match result {
        Ok(()) => Json(state.session.status().await).into_response(),
        Err(e) => error_response(StatusCode::BAD_GATEWAY, e.to_string()),
    }
}

#[derive(Deserialize)]
struct StepRequest {
    step: StepKey,
}

/// POST /api/onboarding/step
async fn go_to_step(
    State(state): State<OnboardingRouteState>,
    Json(req): Json<StepRequest>,
) -> Response {
    match state.session.go_to(req.step).await {
        Ok(_) => Json(state.session.status().await).into_response(),
        Err(blocked) => (StatusCode::CONFLICT, Json(blocked)).into_response(),
    }
}

/// POST /api/onboarding/next
async fn next(State(state): State<OnboardingRouteState>) -> Response {
    let outcome = state.session.next().await;
    let status = match &outcome {
        NextOutcome::Advanced { .. } | NextOutcome::Submitted { .. } => StatusCode::OK,
        NextOutcome::Invalid { .. }
        | NextOutcome::VerificationFailed { .. }
        | NextOutcome::SubmissionFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        NextOutcome::Busy => {
            return error_response(StatusCode::CONFLICT, VERIFYING_LABEL);
        }
        NextOutcome::Stale | NextOutcome::NoFurtherStep => StatusCode::CONFLICT,
    };
    (status, Json(outcome)).into_response()
}

/// POST /api/onboarding/submit
async fn submit(State(state): State<OnboardingRouteState>) -> Response {
    match state.session.submit().await {
        Ok(receipt) => Json(receipt).into_response(),
        Err(SubmissionError::Invalid { errors }) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(NextOutcome::Invalid { errors }),
        )
            .into_response(),
        Err(e) => {
            let status = match &e {
                SubmissionError::ReadOnly
                | SubmissionError::InProgress
                | SubmissionError::StepNotReached { .. } => StatusCode::CONFLICT,
                SubmissionError::Incomplete(_)
                | SubmissionError::Invalid { .. }
                | SubmissionError::Rejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                SubmissionError::Transport(_) => StatusCode::BAD_GATEWAY,
            };
            error_response(status, e.to_string())
        }
    }
}

fn otp_error_response(e: OtpError) -> Response {
    let status = match &e {
        OtpError::MissingTarget { .. } | OtpError::Rejected { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        OtpError::TargetChanged { .. } => StatusCode::CONFLICT,
        OtpError::Api(_) => StatusCode::BAD_GATEWAY,
    };
    error_response(status, e.to_string())
}

/// POST /api/onboarding/otp/{channel}/send
async fn send_otp(
    State(state): State<OnboardingRouteState>,
    Path(channel): Path<String>,
) -> Response {
    let channel = match channel.parse::<OtpChannel>() {
        Ok(c) => c,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };
    match state.session.send_otp(channel).await {
        Ok(()) => Json(serde_json::json!({"sent": true})).into_response(),
        Err(e) => otp_error_response(e),
    }
}

#[derive(Deserialize)]
struct VerifyOtpRequest {
    otp: String,
}

/// POST /api/onboarding/otp/{channel}/verify
async fn verify_otp(
    State(state): State<OnboardingRouteState>,
    Path(channel): Path<String>,
    Json(req): Json<VerifyOtpRequest>,
) -> Response {
    let channel = match channel.parse::<OtpChannel>() {
        Ok(c) => c,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };
    match state.session.verify_otp(channel, &req.otp).await {
        Ok(()) => Json(serde_json::json!({"verified": true})).into_response(),
        Err(e) => otp_error_response(e),
    }
}
