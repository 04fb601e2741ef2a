//! External service adapters: email content generation (language model) and
//! outbound email delivery. Thin pass-throughs with error capture only; the
//! orchestrator interprets the results.

use crate::config::Config;
use crate::errors::AppError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

// ============ Email Content Generation (language model) ============

/// One ranked completion candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionChoice {
    pub index: Option<u32>,
    pub message: CompletionMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionMessage {
    pub content: String,
}

/// Ranked list of completion candidates returned by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub choices: Vec<CompletionChoice>,
}

pub struct EmailGeneratorService {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl EmailGeneratorService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.openai_base_url.clone(),
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
        }
    }

    /// Generate personalized confirmation email content for a lead.
    ///
    /// Candidate-selection contract: the provider returns a ranked list and
    /// only the top-ranked candidate (index 0) is consumed. An empty list is
    /// an error, never an out-of-range access.
    pub async fn generate(&self, name: &str, industry: &str) -> Result<String, AppError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let prompt = format!(
            "Write a short, warm confirmation email in HTML for {name}, \
             who just signed up through our lead form and works in the \
             {industry} industry. Thank them for their interest, mention \
             their industry once, and say we will be in touch shortly. \
             No subject line, body HTML only."
        );

        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });

        tracing::info!("Requesting email content for lead: {}", name);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalApiError(format!("Completion request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Completion API returned status {}: {}",
                status, error_text
            )));
        }

        let completion: CompletionResponse = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse completion response: {}", e))
        })?;

        // Top-ranked candidate only; empty list is an error
        let content = completion
            .choices
            .first()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or_else(|| {
                AppError::ExternalApiError("Completion API returned no candidates".to_string())
            })?;

        if content.is_empty() {
            return Err(AppError::ExternalApiError(
                "Completion API returned an empty candidate".to_string(),
            ));
        }

        tracing::info!("Email content generated for lead: {}", name);
        Ok(content)
    }
}

// ============ Email Delivery ============

#[derive(Debug, Clone, Deserialize)]
pub struct SendEmailResponse {
    pub id: Option<String>,
}

pub struct NotificationService {
    client: Client,
    base_url: String,
    api_key: String,
    from: String,
}

impl NotificationService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.resend_base_url.clone(),
            api_key: config.resend_api_key.clone(),
            from: config.email_from.clone(),
        }
    }

    /// Send the generated confirmation content to the lead's address.
    /// One outbound call per successful generation.
    pub async fn send(&self, recipient: &str, html_body: &str) -> Result<(), AppError> {
        let url = format!("{}/emails", self.base_url);

        let payload = json!({
            "from": self.from,
            "to": [recipient],
            "subject": "Thanks for signing up",
            "html": html_body,
        });

        tracing::info!("Dispatching confirmation email to: {}", recipient);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Email dispatch failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Email API returned status {}: {}",
                status, error_text
            )));
        }

        let ack: SendEmailResponse = response.json().await.unwrap_or(SendEmailResponse { id: None });
        tracing::info!(
            "Confirmation email accepted for {} (delivery id: {})",
            recipient,
            ack.id.as_deref().unwrap_or("unknown")
        );

        Ok(())
    }
}
