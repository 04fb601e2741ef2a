/// Integration tests for the submission pipeline with mocked external APIs.
/// The completion and email delivery providers run on wiremock servers and
/// the lead store is an in-memory counting fake, so every call-count and
/// ordering guarantee of the pipeline can be asserted without touching real
/// services.
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lead_capture_api::config::Config;
use lead_capture_api::errors::AppError;
use lead_capture_api::models::{LeadForm, LeadRecord, NewLead};
use lead_capture_api::services::{EmailGeneratorService, NotificationService};
use lead_capture_api::session::SessionState;
use lead_capture_api::storage::LeadStore;
use lead_capture_api::submission::{SubmissionGuard, SubmissionOutcome, SubmissionStage, SubmissionPipeline};

/// Helper function to create test config pointing at mock servers
fn create_test_config(openai_base_url: String, resend_base_url: String) -> Config {
    Config {
        database_url: "postgresql://test".to_string(),
        port: 8080,
        openai_api_key: "test_openai_key".to_string(),
        openai_base_url,
        openai_model: "test-model".to_string(),
        resend_api_key: "test_resend_key".to_string(),
        resend_base_url,
        email_from: "Test <test@example.com>".to_string(),
    }
}

/// In-memory lead store that counts inserts and can be told to fail.
struct InMemoryLeadStore {
    inserts: AtomicUsize,
    fail: bool,
}

impl InMemoryLeadStore {
    fn new() -> Self {
        Self {
            inserts: AtomicUsize::new(0),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            inserts: AtomicUsize::new(0),
            fail: true,
        }
    }

    fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }
}

impl LeadStore for InMemoryLeadStore {
    async fn insert_lead(&self, lead: &NewLead) -> Result<LeadRecord, AppError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::DatabaseError(sqlx::Error::PoolClosed));
        }
        Ok(LeadRecord {
            id: Uuid::new_v4(),
            name: lead.name.clone(),
            email: lead.email.clone(),
            industry: lead.industry.clone(),
            submitted_at: Utc::now(),
            session_id: lead.session_id.clone(),
            created_at: Utc::now(),
            updated_at: None,
        })
    }
}

fn form(name: &str, email: &str, industry: Option<&str>) -> LeadForm {
    LeadForm {
        name: Some(name.to_string()),
        email: Some(email.to_string()),
        industry: industry.map(String::from),
        session_id: None,
    }
}

fn completion_body(candidates: &[&str]) -> serde_json::Value {
    let choices: Vec<serde_json::Value> = candidates
        .iter()
        .enumerate()
        .map(|(i, content)| {
            serde_json::json!({
                "index": i,
                "message": { "role": "assistant", "content": content }
            })
        })
        .collect();
    serde_json::json!({ "choices": choices })
}

async fn mount_completion_ok(server: &MockServer, candidates: &[&str], expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(candidates)))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_delivery_ok(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "email_1" })),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn valid_submission_runs_each_stage_exactly_once() {
    let llm = MockServer::start().await;
    let mail = MockServer::start().await;
    mount_completion_ok(&llm, &["<p>Welcome Ana</p>"], 1).await;
    mount_delivery_ok(&mail, 1).await;

    let config = create_test_config(llm.uri(), mail.uri());
    let store = InMemoryLeadStore::new();
    let generator = EmailGeneratorService::new(&config);
    let notifier = NotificationService::new(&config);
    let pipeline = SubmissionPipeline::new(&store, &generator, &notifier);

    let mut session = SessionState::default();
    let outcome = pipeline
        .submit(&form("Ana", "ana@x.com", Some("Retail")), "s1", &mut session)
        .await
        .unwrap();

    assert!(matches!(outcome, SubmissionOutcome::Success { .. }));
    let record = outcome.record();
    assert_eq!(record.name, "Ana");
    assert_eq!(record.email, "ana@x.com");
    assert_eq!(record.industry, "Retail");
    assert_eq!(record.session_id.as_deref(), Some("s1"));

    // Exactly one insert, and the session reflects exactly one submission
    assert_eq!(store.insert_count(), 1);
    assert!(session.submitted);
    assert_eq!(session.leads.len(), 1);
    assert_eq!(session.leads[0].name, "Ana");
}

#[tokio::test]
async fn only_the_top_ranked_candidate_is_dispatched() {
    let llm = MockServer::start().await;
    let mail = MockServer::start().await;
    mount_completion_ok(&llm, &["top pick", "runner up"], 1).await;

    // Delivery mock only matches a body carrying the first candidate; a
    // request with the second candidate would 404 and degrade the outcome.
    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(body_partial_json(serde_json::json!({ "html": "top pick" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "email_1" })),
        )
        .expect(1)
        .mount(&mail)
        .await;

    let config = create_test_config(llm.uri(), mail.uri());
    let store = InMemoryLeadStore::new();
    let generator = EmailGeneratorService::new(&config);
    let notifier = NotificationService::new(&config);
    let pipeline = SubmissionPipeline::new(&store, &generator, &notifier);

    let mut session = SessionState::default();
    let outcome = pipeline
        .submit(&form("Ana", "ana@x.com", None), "s1", &mut session)
        .await
        .unwrap();

    assert!(matches!(outcome, SubmissionOutcome::Success { .. }));
}

#[tokio::test]
async fn missing_industry_defaults_to_other() {
    let llm = MockServer::start().await;
    let mail = MockServer::start().await;
    mount_completion_ok(&llm, &["hello"], 1).await;
    mount_delivery_ok(&mail, 1).await;

    let config = create_test_config(llm.uri(), mail.uri());
    let store = InMemoryLeadStore::new();
    let generator = EmailGeneratorService::new(&config);
    let notifier = NotificationService::new(&config);
    let pipeline = SubmissionPipeline::new(&store, &generator, &notifier);

    let mut session = SessionState::default();
    let outcome = pipeline
        .submit(&form("Ana", "ana@x.com", None), "s1", &mut session)
        .await
        .unwrap();

    assert_eq!(outcome.record().industry, "Other");
}

#[tokio::test]
async fn invalid_input_makes_zero_external_calls() {
    let llm = MockServer::start().await;
    let mail = MockServer::start().await;
    mount_completion_ok(&llm, &["never used"], 0).await;
    mount_delivery_ok(&mail, 0).await;

    let config = create_test_config(llm.uri(), mail.uri());
    let store = InMemoryLeadStore::new();
    let generator = EmailGeneratorService::new(&config);
    let notifier = NotificationService::new(&config);
    let pipeline = SubmissionPipeline::new(&store, &generator, &notifier);

    let mut session = SessionState::default();
    let result = pipeline
        .submit(&form("", "bad", None), "s1", &mut session)
        .await;

    match result {
        Err(AppError::Validation(errors)) => {
            assert_eq!(errors.len(), 2);
            assert!(errors.contains_key("name"));
            assert!(errors.contains_key("email"));
        }
        other => panic!("expected validation failure, got {:?}", other.map(|o| o.email_status())),
    }

    // No insert, no session change
    assert_eq!(store.insert_count(), 0);
    assert!(!session.submitted);
    assert!(session.leads.is_empty());
}

#[tokio::test]
async fn persistence_failure_halts_pipeline_and_leaves_session_unchanged() {
    let llm = MockServer::start().await;
    let mail = MockServer::start().await;
    mount_completion_ok(&llm, &["never used"], 0).await;
    mount_delivery_ok(&mail, 0).await;

    let config = create_test_config(llm.uri(), mail.uri());
    let store = InMemoryLeadStore::failing();
    let generator = EmailGeneratorService::new(&config);
    let notifier = NotificationService::new(&config);
    let pipeline = SubmissionPipeline::new(&store, &generator, &notifier);

    let mut session = SessionState::default();
    let result = pipeline
        .submit(&form("Ana", "ana@x.com", Some("Retail")), "s1", &mut session)
        .await;

    assert!(matches!(result, Err(AppError::DatabaseError(_))));
    // One insert attempt was made, then nothing downstream ran
    assert_eq!(store.insert_count(), 1);
    assert!(!session.submitted);
    assert!(session.leads.is_empty());
}

#[tokio::test]
async fn generation_failure_is_degraded_success_and_skips_dispatch() {
    let llm = MockServer::start().await;
    let mail = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("provider down"))
        .expect(1)
        .mount(&llm)
        .await;
    mount_delivery_ok(&mail, 0).await;

    let config = create_test_config(llm.uri(), mail.uri());
    let store = InMemoryLeadStore::new();
    let generator = EmailGeneratorService::new(&config);
    let notifier = NotificationService::new(&config);
    let pipeline = SubmissionPipeline::new(&store, &generator, &notifier);

    let mut session = SessionState::default();
    let outcome = pipeline
        .submit(&form("Ana", "ana@x.com", None), "s1", &mut session)
        .await
        .unwrap();

    match &outcome {
        SubmissionOutcome::Degraded { stage, .. } => {
            assert_eq!(*stage, SubmissionStage::GeneratingEmail);
        }
        other => panic!("expected degraded outcome, got {:?}", other),
    }

    // The lead is durable and the session records it exactly once
    assert_eq!(store.insert_count(), 1);
    assert!(session.submitted);
    assert_eq!(session.leads.len(), 1);
}

#[tokio::test]
async fn empty_candidate_list_is_a_generation_failure() {
    let llm = MockServer::start().await;
    let mail = MockServer::start().await;
    mount_completion_ok(&llm, &[], 1).await;
    mount_delivery_ok(&mail, 0).await;

    let config = create_test_config(llm.uri(), mail.uri());
    let store = InMemoryLeadStore::new();
    let generator = EmailGeneratorService::new(&config);
    let notifier = NotificationService::new(&config);
    let pipeline = SubmissionPipeline::new(&store, &generator, &notifier);

    let mut session = SessionState::default();
    let outcome = pipeline
        .submit(&form("Ana", "ana@x.com", None), "s1", &mut session)
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        SubmissionOutcome::Degraded {
            stage: SubmissionStage::GeneratingEmail,
            ..
        }
    ));
    assert_eq!(session.leads.len(), 1);
}

#[tokio::test]
async fn dispatch_failure_is_degraded_success_and_still_records() {
    let llm = MockServer::start().await;
    let mail = MockServer::start().await;
    mount_completion_ok(&llm, &["<p>hi</p>"], 1).await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(500).set_body_string("delivery down"))
        .expect(1)
        .mount(&mail)
        .await;

    let config = create_test_config(llm.uri(), mail.uri());
    let store = InMemoryLeadStore::new();
    let generator = EmailGeneratorService::new(&config);
    let notifier = NotificationService::new(&config);
    let pipeline = SubmissionPipeline::new(&store, &generator, &notifier);

    let mut session = SessionState::default();
    let outcome = pipeline
        .submit(&form("Ana", "ana@x.com", None), "s1", &mut session)
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        SubmissionOutcome::Degraded {
            stage: SubmissionStage::Dispatching,
            ..
        }
    ));
    assert_eq!(store.insert_count(), 1);
    assert!(session.submitted);
    assert_eq!(session.leads.len(), 1);
}

#[tokio::test]
async fn concurrent_resubmission_is_rejected_not_duplicated() {
    let llm = MockServer::start().await;
    let mail = MockServer::start().await;
    mount_completion_ok(&llm, &["hello"], 1).await;
    mount_delivery_ok(&mail, 1).await;

    let config = create_test_config(llm.uri(), mail.uri());
    let store = InMemoryLeadStore::new();
    let generator = EmailGeneratorService::new(&config);
    let notifier = NotificationService::new(&config);
    let pipeline = SubmissionPipeline::new(&store, &generator, &notifier);
    let guard = SubmissionGuard::new();

    // First request claims the session
    guard.begin("s1").await.unwrap();

    // A racing repeat click is rejected before any stage runs
    assert!(matches!(
        guard.begin("s1").await,
        Err(AppError::SubmissionInFlight(_))
    ));

    let mut session = SessionState::default();
    let outcome = pipeline
        .submit(&form("Ana", "ana@x.com", None), "s1", &mut session)
        .await
        .unwrap();
    guard.finish("s1").await;

    assert!(matches!(outcome, SubmissionOutcome::Success { .. }));
    // Only the winning request produced external calls
    assert_eq!(store.insert_count(), 1);
    assert_eq!(session.leads.len(), 1);

    // Once resolved, the session can submit again
    guard.begin("s1").await.unwrap();
}
