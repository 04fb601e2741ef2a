//! Persistence adapter for leads.
//!
//! One remote write per insert, no automatic retry: the orchestrator decides
//! what happens next from the result. The `leads` table assigns `id`,
//! `submitted_at` and the audit timestamps server-side, and defaults
//! `industry` to 'Other'.

use crate::errors::{AppError, ResultExt};
use crate::models::{LeadRecord, NewLead};
use sqlx::PgPool;

/// Seam between the orchestrator and the relational store, so the pipeline
/// can be exercised without Postgres.
#[allow(async_fn_in_trait)]
pub trait LeadStore {
    /// Insert one lead. Issues exactly one remote write.
    async fn insert_lead(&self, lead: &NewLead) -> Result<LeadRecord, AppError>;
}

/// Postgres-backed lead storage.
pub struct LeadStorage {
    pool: PgPool,
}

impl LeadStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl LeadStore for LeadStorage {
    async fn insert_lead(&self, lead: &NewLead) -> Result<LeadRecord, AppError> {
        let record = sqlx::query_as::<_, LeadRecord>(
            r#"
            INSERT INTO leads (name, email, industry, session_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, industry, submitted_at, session_id,
                      created_at, updated_at
            "#,
        )
        .bind(&lead.name)
        .bind(&lead.email)
        .bind(&lead.industry)
        .bind(&lead.session_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert lead")?;

        tracing::info!("Lead persisted: {} ({})", record.id, record.email);
        Ok(record)
    }
}
