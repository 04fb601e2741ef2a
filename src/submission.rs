//! Submission orchestrator.
//!
//! One submission is a strict sequential chain:
//! validate -> persist -> generate email -> dispatch -> record session state.
//! Persistence is the durability boundary: a failed insert halts the
//! pipeline and nothing downstream runs. Generation and dispatch failures
//! after that point are non-fatal; the lead is already saved, so the user
//! sees a degraded success instead of a rollback. Session state is recorded
//! exactly once, after every external call has resolved.

use crate::errors::AppError;
use crate::models::{Lead, LeadForm, LeadRecord, NewLead};
use crate::services::{EmailGeneratorService, NotificationService};
use crate::session::SessionState;
use crate::storage::LeadStore;
use crate::validation::{normalize_industry, validate_lead_form};
use moka::future::Cache;
use std::fmt;
use std::time::Duration;

/// Stages of one submission attempt, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStage {
    Validating,
    Persisting,
    GeneratingEmail,
    Dispatching,
    Recording,
}

impl fmt::Display for SubmissionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmissionStage::Validating => "validating",
            SubmissionStage::Persisting => "persisting",
            SubmissionStage::GeneratingEmail => "generating_email",
            SubmissionStage::Dispatching => "dispatching",
            SubmissionStage::Recording => "recording",
        };
        write!(f, "{}", name)
    }
}

/// Terminal outcome of a submission that reached the durability boundary.
#[derive(Debug, Clone)]
pub enum SubmissionOutcome {
    /// Every stage succeeded.
    Success { record: LeadRecord },
    /// The lead is saved, but the confirmation email never went out.
    /// `stage` names the step that failed.
    Degraded {
        record: LeadRecord,
        stage: SubmissionStage,
        detail: String,
    },
}

impl SubmissionOutcome {
    pub fn record(&self) -> &LeadRecord {
        match self {
            SubmissionOutcome::Success { record } => record,
            SubmissionOutcome::Degraded { record, .. } => record,
        }
    }

    /// User-facing note about the confirmation email.
    pub fn email_status(&self) -> String {
        match self {
            SubmissionOutcome::Success { .. } => "sent".to_string(),
            SubmissionOutcome::Degraded { stage, .. } => format!(
                "Your submission is saved; the confirmation email may be delayed (failed while {})",
                stage
            ),
        }
    }
}

/// Rejects a second submit for a session while one is still in flight, so
/// rapid repeated triggers cannot duplicate external calls. The atomic
/// entry insert decides the winner; the TTL is a backstop against entries
/// leaked by a crashed task.
pub struct SubmissionGuard {
    in_flight: Cache<String, i64>,
}

impl SubmissionGuard {
    pub fn new() -> Self {
        let in_flight = Cache::builder()
            .time_to_live(Duration::from_secs(300))
            .max_capacity(10_000)
            .build();
        Self { in_flight }
    }

    /// Claim a session for the current submission. The first caller wins;
    /// every other caller gets `SubmissionInFlight` until `finish` runs.
    pub async fn begin(&self, session_id: &str) -> Result<(), AppError> {
        let now = chrono::Utc::now().timestamp();
        let entry = self
            .in_flight
            .entry(session_id.to_string())
            .or_insert(now)
            .await;

        if !entry.is_fresh() {
            let seconds_ago = now - entry.value();
            tracing::warn!(
                "Duplicate submission blocked for session {} (in flight for {}s)",
                session_id,
                seconds_ago
            );
            return Err(AppError::SubmissionInFlight(session_id.to_string()));
        }

        tracing::debug!("Session {} claimed for submission", session_id);
        Ok(())
    }

    /// Release the session after the attempt resolved, success or not.
    pub async fn finish(&self, session_id: &str) {
        self.in_flight.invalidate(session_id).await;
    }
}

impl Default for SubmissionGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Coordinates the adapters in fixed order for one submission attempt.
pub struct SubmissionPipeline<'a, S: LeadStore> {
    store: &'a S,
    generator: &'a EmailGeneratorService,
    notifier: &'a NotificationService,
}

impl<'a, S: LeadStore> SubmissionPipeline<'a, S> {
    pub fn new(
        store: &'a S,
        generator: &'a EmailGeneratorService,
        notifier: &'a NotificationService,
    ) -> Self {
        Self {
            store,
            generator,
            notifier,
        }
    }

    /// Run one submission attempt against an owned session state.
    ///
    /// Exactly one persistence call and exactly one generation call are
    /// issued per invocation; dispatch runs at most once and never when
    /// generation failed. The caller must hold the session's
    /// [`SubmissionGuard`] claim for the duration of this call.
    pub async fn submit(
        &self,
        form: &LeadForm,
        session_id: &str,
        session: &mut SessionState,
    ) -> Result<SubmissionOutcome, AppError> {
        // Validating: no external service is contacted for invalid input
        tracing::debug!("Submission for session {}: validating", session_id);
        let validation = validate_lead_form(form);
        if !validation.valid {
            tracing::info!(
                "Submission rejected for session {}: {} invalid field(s)",
                session_id,
                validation.errors.len()
            );
            return Err(AppError::Validation(validation.errors));
        }

        let name = form.name.as_deref().map(str::trim).unwrap_or_default();
        let email = form.email.as_deref().map(str::trim).unwrap_or_default();
        let new_lead = NewLead {
            name: name.to_string(),
            email: email.to_lowercase(),
            industry: normalize_industry(form.industry.as_deref()),
            session_id: Some(session_id.to_string()),
        };

        // Persisting: the durability boundary. A failure halts the pipeline
        // here; no email is generated or sent for a lead that is not saved.
        tracing::debug!("Submission for session {}: persisting", session_id);
        let record = self.store.insert_lead(&new_lead).await?;

        // GeneratingEmail: invoked exactly once per submission
        tracing::debug!("Submission for session {}: generating email", session_id);
        let outcome = match self
            .generator
            .generate(&record.name, &record.industry)
            .await
        {
            Ok(content) => {
                // Dispatching: only reached with generated content in hand
                tracing::debug!("Submission for session {}: dispatching", session_id);
                match self.notifier.send(&record.email, &content).await {
                    Ok(()) => SubmissionOutcome::Success {
                        record: record.clone(),
                    },
                    Err(e) => {
                        tracing::warn!(
                            "Confirmation dispatch failed for lead {} (lead is saved): {}",
                            record.id,
                            e
                        );
                        SubmissionOutcome::Degraded {
                            record: record.clone(),
                            stage: SubmissionStage::Dispatching,
                            detail: e.to_string(),
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Email generation failed for lead {} (lead is saved, dispatch skipped): {}",
                    record.id,
                    e
                );
                SubmissionOutcome::Degraded {
                    record: record.clone(),
                    stage: SubmissionStage::GeneratingEmail,
                    detail: e.to_string(),
                }
            }
        };

        // Recording: exactly once, after all external calls have resolved.
        // Session state only ever reflects submissions that reached the
        // durability boundary.
        session.add_lead(Lead::from(&record));
        session.set_submitted(true);
        tracing::info!(
            "Submission recorded for session {}: lead {} ({})",
            session_id,
            record.id,
            outcome.email_status()
        );

        Ok(outcome)
    }
}
