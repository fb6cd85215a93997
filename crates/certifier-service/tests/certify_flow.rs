//! End-to-end tests for the certifier service
//!
//! Requests go through `evaluate_request`, the HTTP router and the framed
//! transport, and the issued artifacts are verified against the policy key.

mod common;

use base64::{engine::general_purpose::STANDARD, Engine};
use std::collections::HashSet;
use std::sync::Arc;

use certifier_core::{
    AdmissionCredential, Clause, CoseSigned, Purpose, SignedCredential, SignedPlatformRule,
};
use certifier_service::{
    api::ReadyResponse, evaluate_request, request_framed, serve_framed, EventLog, EventOutcome,
    FileEventLog, MemoryEventLog, TrustStatus,
};
use common::Fixture;

fn admission_credential(fx: &Fixture, bytes: &[u8]) -> AdmissionCredential {
    let signed = SignedCredential::from_bytes(bytes).unwrap();
    fx.admin.public_key().verify(&signed).unwrap()
}

// =============================================================================
// Evaluation
// =============================================================================

#[tokio::test]
async fn test_platform_attestation_issues_admission_credential() {
    let fx = Fixture::new();
    let state = fx.state(fx.full_policy());
    let request = fx.request("platform-attestation-only", fx.platform_package());

    let response = evaluate_request(&state, &request).await;

    assert_eq!(response.status, TrustStatus::Succeeded);
    assert_eq!(response.requesting_enclave_tag, "relying-enclave");
    assert_eq!(response.providing_enclave_tag, "app-enclave");

    let bytes = response.artifact_bytes().unwrap().unwrap();
    let credential = admission_credential(&fx, &bytes);
    assert!(credential.subject.same_key(&fx.enclave.entity()));
    assert_eq!(credential.label, format!("Measured-{}", fx.measurement.to_hex()));
    assert_eq!(credential.purpose, Purpose::Authentication);
    assert_eq!(credential.serial_number, 1_000);
    assert!(credential.validity.is_current());
}

#[tokio::test]
async fn test_missing_measurement_policy_fails_without_artifact() {
    let fx = Fixture::new();
    let state = fx.state(vec![fx.platform_key_policy(&fx.platform)]);
    let request = fx.request("platform-attestation-only", fx.platform_package());

    let response = evaluate_request(&state, &request).await;

    assert_eq!(response.status, TrustStatus::Failed);
    assert!(response.artifact.is_none());

    let events = state.events.recent(10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event.outcome, EventOutcome::Failed);
    assert!(events[0].event.message.starts_with("policy-not-found"));
}

#[tokio::test]
async fn test_sev_attestation_issues_platform_rule() {
    let fx = Fixture::new();
    let state = fx.state(fx.full_policy());
    let request = fx
        .request("sev-evidence", fx.sev_package())
        .with_purpose("attestation");

    let response = evaluate_request(&state, &request).await;
    assert!(response.is_success());

    let bytes = response.artifact_bytes().unwrap().unwrap();
    let signed = SignedPlatformRule::from_bytes(&bytes).unwrap();
    let rule = fx.admin.public_key().verify(&signed).unwrap();
    assert_eq!(
        rule.statement,
        Clause::says(fx.admin.entity(), Clause::trusted_for_attestation(fx.enclave.entity()))
    );
}

#[tokio::test]
async fn test_unknown_evidence_type_fails() {
    let fx = Fixture::new();
    let state = fx.state(fx.full_policy());
    let request = fx.request("bogus-format", fx.platform_package());

    let response = evaluate_request(&state, &request).await;

    assert_eq!(response.status, TrustStatus::Failed);
    assert!(response.artifact.is_none());
    let events = state.events.recent(1).await.unwrap();
    assert!(events[0].event.message.starts_with("malformed-evidence"));
}

#[tokio::test]
async fn test_oe_evidence_succeeds() {
    let fx = Fixture::new();
    let state = fx.state(fx.full_policy());

    let response = evaluate_request(&state, &fx.request("oe-evidence", fx.oe_package())).await;
    assert!(response.is_success());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_get_unique_serials() {
    let fx = Fixture::new();
    let state = fx.state(fx.full_policy());
    let request = fx.request("platform-attestation-only", fx.platform_package());

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let state = Arc::clone(&state);
            let request = request.clone();
            tokio::spawn(async move { evaluate_request(&state, &request).await })
        })
        .collect();

    let mut serials = HashSet::new();
    for handle in handles {
        let response = handle.await.unwrap();
        let bytes = response.artifact_bytes().unwrap().unwrap();
        let credential = admission_credential(&fx, &bytes);
        assert!(serials.insert(credential.serial_number), "duplicate serial");
    }
    assert_eq!(serials.len(), 32);
    assert_eq!(state.events.count().await.unwrap(), 32);
}

// =============================================================================
// Event log
// =============================================================================

#[tokio::test]
async fn test_file_event_log_records_payloads() {
    let fx = Fixture::new();
    let dir = tempfile::tempdir().unwrap();
    let events: Arc<dyn EventLog> = Arc::new(FileEventLog::open(dir.path()).await.unwrap());
    let state = fx.state_with_events(fx.full_policy(), events);

    let request = fx.request("platform-attestation-only", fx.platform_package());
    let response = evaluate_request(&state, &request).await;
    evaluate_request(&state, &fx.request("bogus-format", fx.platform_package())).await;

    let logged_request: serde_json::Value =
        serde_json::from_slice(&std::fs::read(dir.path().join("request-1")).unwrap()).unwrap();
    assert_eq!(logged_request["submitted_evidence_type"], "platform-attestation-only");

    let logged_response: certifier_service::TrustResponse =
        serde_json::from_slice(&std::fs::read(dir.path().join("response-1")).unwrap()).unwrap();
    assert_eq!(logged_response, response);

    let index = std::fs::read_to_string(dir.path().join("events.log")).unwrap();
    assert_eq!(index.lines().count(), 2);

    let recent = state.events.recent(10).await.unwrap();
    assert_eq!(recent[0].event.outcome, EventOutcome::Succeeded);
    assert_eq!(recent[1].event.outcome, EventOutcome::Failed);
}

// =============================================================================
// HTTP
// =============================================================================

async fn start_server(state: Arc<certifier_service::AppState>) -> String {
    let app = certifier_service::create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_http_health_and_ready() {
    let fx = Fixture::new();
    let base = start_server(fx.state(fx.full_policy())).await;
    let client = reqwest::Client::new();

    let health: serde_json::Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let ready: ReadyResponse = client
        .get(format!("{}/ready", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(ready.ready);
    assert_eq!(ready.policy_kid, "policy-key");
    assert_eq!(ready.measurement_policies, 1);
    assert_eq!(ready.platform_key_policies, 2);
    assert_eq!(ready.events_recorded, 0);
}

#[tokio::test]
async fn test_http_not_ready_without_measurement_policy() {
    let fx = Fixture::new();
    let base = start_server(fx.state(Vec::new())).await;

    let ready: ReadyResponse = reqwest::get(format!("{}/ready", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(!ready.ready);
    assert_eq!(ready.policy_statements, 0);
}

#[tokio::test]
async fn test_http_policy_key() {
    let fx = Fixture::new();
    let base = start_server(fx.state(fx.full_policy())).await;

    let key: certifier_service::api::handlers::PolicyKeyResponse =
        reqwest::get(format!("{}/v1/policy/key", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

    assert_eq!(key.kid, "policy-key");
    assert_eq!(key.algorithm, "EdDSA");
    assert_eq!(STANDARD.decode(&key.public_key).unwrap(), fx.admin.public_key().to_bytes());
}

#[tokio::test]
async fn test_http_certify() {
    let fx = Fixture::new();
    let state = fx.state(fx.full_policy());
    let base = start_server(Arc::clone(&state)).await;
    let client = reqwest::Client::new();

    let request = fx.request("platform-attestation-only", fx.platform_package());
    let response = client
        .post(format!("{}/v1/certify", base))
        .json(&request)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: certifier_service::TrustResponse = response.json().await.unwrap();
    assert!(body.is_success());
    let bytes = body.artifact_bytes().unwrap().unwrap();
    assert!(CoseSigned::<AdmissionCredential>::from_bytes(&bytes).is_ok());

    let events: serde_json::Value = client
        .get(format!("{}/v1/events?limit=5", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(events["count"], 1);
    assert_eq!(events["events"][0]["outcome"], "succeeded");
}

#[tokio::test]
async fn test_http_failed_certification_is_not_an_http_error() {
    let fx = Fixture::new();
    let base = start_server(fx.state(Vec::new())).await;

    let request = fx.request("platform-attestation-only", fx.platform_package());
    let response = reqwest::Client::new()
        .post(format!("{}/v1/certify", base))
        .json(&request)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "failed");
    assert!(body.get("artifact").is_none());
}

#[tokio::test]
async fn test_http_rejects_bad_bodies() {
    let fx = Fixture::new();
    let base = start_server(fx.state(fx.full_policy())).await;
    let client = reqwest::Client::new();

    let empty_tag = fx.request("  ", fx.platform_package());
    let response = client
        .post(format!("{}/v1/certify", base))
        .json(&empty_tag)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "BAD_REQUEST");

    let response = client
        .post(format!("{}/v1/certify", base))
        .json(&serde_json::json!({"requesting_enclave_tag": "x"}))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_client_error());

    let response = client
        .get(format!("{}/v1/events?limit=100000", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

// =============================================================================
// Framed transport
// =============================================================================

#[tokio::test]
async fn test_framed_roundtrip() {
    let fx = Fixture::new();
    let state = fx.state(fx.full_policy());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve_framed(listener, Arc::clone(&state)));

    let request = fx
        .request("sev-platform-attestation-only", fx.sev_package())
        .with_purpose("attestation");
    let response = request_framed(addr, &request).await.unwrap();
    assert!(response.is_success());

    let failing = fx.request("gramine-evidence", fx.platform_package());
    let response = request_framed(addr, &failing).await.unwrap();
    assert_eq!(response.status, TrustStatus::Failed);

    assert_eq!(state.events.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_framed_garbage_drops_connection() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let fx = Fixture::new();
    let state = fx.state(fx.full_policy());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve_framed(listener, Arc::clone(&state)));

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream.write_all(&5u32.to_be_bytes()).await.unwrap();
    stream.write_all(b"nope!").await.unwrap();

    let mut buf = Vec::new();
    let read = stream.read_to_end(&mut buf).await.unwrap_or(0);
    assert_eq!(read, 0);
    assert_eq!(state.events.count().await.unwrap(), 0);

    // the listener keeps serving
    let response = request_framed(addr, &fx.request("oe-evidence", fx.oe_package()))
        .await
        .unwrap();
    assert!(response.is_success());
}

#[tokio::test]
async fn test_shared_event_log_sees_requests() {
    let fx = Fixture::new();
    let events: Arc<dyn EventLog> = Arc::new(MemoryEventLog::new());
    let state = fx.state_with_events(fx.full_policy(), Arc::clone(&events));

    evaluate_request(&state, &fx.request("oe-evidence", fx.oe_package())).await;
    assert_eq!(events.count().await.unwrap(), 1);
}
