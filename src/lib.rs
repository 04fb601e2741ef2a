//! Lead Capture API Library
//!
//! This library provides the core functionality for the lead capture
//! service: form validation, lead persistence, AI-generated confirmation
//! email content, outbound email dispatch, and session-local submission
//! state, coordinated by a single submission pipeline.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models.
//! - `services`: External service clients (completion API, email delivery).
//! - `session`: Session-local submission state.
//! - `storage`: Lead persistence.
//! - `submission`: The submission orchestrator and re-entrancy guard.
//! - `validation`: Pure form validation.

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod session;
pub mod storage;
pub mod submission;
pub mod validation;
