use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Config;
use crate::errors::AppError;
use crate::models::{LeadForm, SubmitLeadResponse};
use crate::services::{EmailGeneratorService, NotificationService};
use crate::session::SessionStore;
use crate::storage::LeadStorage;
use crate::submission::{SubmissionGuard, SubmissionOutcome, SubmissionPipeline};

/// Shared application state.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Postgres-backed lead storage.
    pub storage: LeadStorage,
    /// Language-model client for confirmation email content.
    pub generator: EmailGeneratorService,
    /// Email delivery client.
    pub notifier: NotificationService,
    /// Per-session submission state.
    pub sessions: SessionStore,
    /// Guard against concurrent duplicate submissions per session.
    pub guard: SubmissionGuard,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "lead-capture-api",
            "version": "0.1.0"
        })),
    )
}

/// Lead submission endpoint.
///
/// Runs the full pipeline for one form submission. Returns 201 when the
/// lead reached the durability boundary (including degraded success where
/// the confirmation email failed), 400 with per-field errors on invalid
/// input, 409 when a submission for the same session is still in flight.
pub async fn submit_lead(
    State(state): State<Arc<AppState>>,
    Json(form): Json<LeadForm>,
) -> Result<(StatusCode, Json<SubmitLeadResponse>), AppError> {
    let session_id = form
        .session_id
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    tracing::info!("Received lead submission for session {}", session_id);

    // First submit for a session wins; concurrent repeats are rejected,
    // not queued.
    state.guard.begin(&session_id).await?;

    let mut session = state.sessions.load(&session_id).await;
    let pipeline = SubmissionPipeline::new(&state.storage, &state.generator, &state.notifier);
    let result = pipeline.submit(&form, &session_id, &mut session).await;

    // Session state is written back only when the pipeline recorded it;
    // failed attempts leave the session exactly as it was.
    if result.is_ok() {
        state.sessions.save(&session_id, session).await;
    }
    state.guard.finish(&session_id).await;

    let outcome = result?;
    let message = match &outcome {
        SubmissionOutcome::Success { .. } => {
            "Lead captured and confirmation email sent".to_string()
        }
        SubmissionOutcome::Degraded { .. } => {
            "Lead captured; confirmation email pending".to_string()
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(SubmitLeadResponse {
            success: true,
            message,
            lead_id: outcome.record().id,
            session_id,
            email_status: outcome.email_status(),
        }),
    ))
}

/// Session state endpoint: what this session has submitted so far.
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let session = state
        .sessions
        .get(&session_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Unknown session: {}", session_id)))?;

    Ok(Json(json!({
        "session_id": session_id,
        "submitted": session.submitted,
        "leads": session.leads,
    })))
}
