//! Pure validation for the lead form.
//!
//! Deterministic and side-effect free: identical input always produces an
//! identical [`ValidationResult`], and nothing external is touched. The
//! orchestrator runs this before any network call.

use crate::models::{LeadForm, ValidationResult, DEFAULT_INDUSTRY};
use regex::Regex;
use std::collections::BTreeMap;

/// Validate email address format.
///
/// Checks for:
/// - Basic shape (minimum length, contains @ and .)
/// - RFC 5322 simplified address syntax
pub fn is_valid_email(email: &str) -> bool {
    // Basic checks
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    // RFC 5322 simplified email regex
    // Matches: local@domain.tld
    let email_regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();

    email_regex.is_match(email)
}

/// Resolve the industry field: trimmed form value, or the "Other" sentinel
/// when the field is absent or blank. Industry never fails validation.
pub fn normalize_industry(industry: Option<&str>) -> String {
    match industry.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => DEFAULT_INDUSTRY.to_string(),
    }
}

/// Validate raw form fields.
///
/// Rules: name required and non-blank; email required and must match a
/// standard address syntax; industry optional.
pub fn validate_lead_form(form: &LeadForm) -> ValidationResult {
    let mut errors = BTreeMap::new();

    match form.name.as_deref().map(str::trim) {
        None | Some("") => {
            errors.insert("name".to_string(), "Name is required".to_string());
        }
        Some(_) => {}
    }

    match form.email.as_deref().map(str::trim) {
        None | Some("") => {
            errors.insert("email".to_string(), "Email is required".to_string());
        }
        Some(email) => {
            if !is_valid_email(email) {
                errors.insert(
                    "email".to_string(),
                    "Email address is not valid".to_string(),
                );
            }
        }
    }

    ValidationResult {
        valid: errors.is_empty(),
        errors,
    }
}
