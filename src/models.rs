use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Sentinel industry used when the form leaves the field blank.
pub const DEFAULT_INDUSTRY: &str = "Other";

// ============ Database Models ============

/// A lead row as persisted in the `leads` table.
///
/// The server assigns `id` and the timestamps; `industry` falls back to
/// [`DEFAULT_INDUSTRY`] when the form did not provide one.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LeadRecord {
    /// Unique identifier for the lead.
    pub id: Uuid,
    /// Name the prospect entered in the form.
    pub name: String,
    /// Contact email address.
    pub email: String,
    /// Industry, defaulted to "Other" when unspecified.
    pub industry: String,
    /// When the submission reached the durability boundary.
    pub submitted_at: DateTime<Utc>,
    /// Browser session that produced this lead, when known.
    pub session_id: Option<String>,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
    /// Timestamp of last update.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Fields for a lead insert. Built by the orchestrator after validation;
/// never constructed before the input passed the validator.
#[derive(Debug, Clone)]
pub struct NewLead {
    pub name: String,
    pub email: String,
    pub industry: String,
    pub session_id: Option<String>,
}

// ============ Session Models ============

/// A captured lead as tracked inside one browser session. Immutable after
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    /// Name the prospect entered in the form.
    pub name: String,
    /// Contact email address.
    pub email: String,
    /// Industry, defaulted to "Other" when unspecified.
    pub industry: String,
    /// When the submission was persisted.
    pub submitted_at: DateTime<Utc>,
}

impl From<&LeadRecord> for Lead {
    fn from(record: &LeadRecord) -> Self {
        Self {
            name: record.name.clone(),
            email: record.email.clone(),
            industry: record.industry.clone(),
            submitted_at: record.submitted_at,
        }
    }
}

// ============ API Request/Response Models ============

/// Request payload for submitting a lead form.
#[derive(Debug, Clone, Deserialize)]
pub struct LeadForm {
    /// Name of the prospect.
    pub name: Option<String>,
    /// Email address of the prospect.
    pub email: Option<String>,
    /// Industry the prospect works in (optional).
    pub industry: Option<String>,
    /// Session identifier from the client; generated server-side when absent.
    pub session_id: Option<String>,
}

/// Response payload for a lead submission.
#[derive(Debug, Serialize)]
pub struct SubmitLeadResponse {
    /// Whether the lead was saved.
    pub success: bool,
    /// Message describing the result.
    pub message: String,
    /// ID of the persisted lead.
    pub lead_id: Uuid,
    /// Session identifier (echoed or server-generated).
    pub session_id: String,
    /// Outcome of the confirmation email: "sent", or a note describing why
    /// it could not be delivered yet.
    pub email_status: String,
}

// ============ Validation ============

/// Outcome of validating one submission attempt. Transient: produced and
/// consumed within a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Whether all fields passed.
    pub valid: bool,
    /// Field name -> error message for every failing field.
    pub errors: std::collections::BTreeMap<String, String>,
}
