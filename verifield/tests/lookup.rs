//! Remote lookup behaviour observed through a form session.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Reply, ScriptedTransport, advance, email_query, session, session_with};
use serde_json::{Value, json};
use verifield::error::TransportError;
use verifield::fields::{EmailField, TextField};
use verifield::lookup::{LookupPhase, LookupSource, LookupValues};
use verifield::schema::{FieldSchema, FormSettings};
use verifield::state::{FieldUpdate, LookupStatus};
use verifield::value::FieldKey;

const REJECTED: &str = "This doesn't seem to be a valid email address. Please check again.";

// =============================================================================
// Debounce
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_burst_of_edits_sends_one_request() {
    let transport = ScriptedTransport::new();
    let mut session = session(&transport);
    let email = session.mount(FieldSchema::new("email"), &EmailField).unwrap();

    for value in ["a@b.c", "a@b.co", "a@b.com"] {
        email.input(value).unwrap();
        advance(100).await;
    }
    assert_eq!(transport.request_count(), 0);

    advance(1_000).await;
    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].query, email_query("a@b.com"));
    assert_eq!(requests[0].generation, 1);
    assert_eq!(
        requests[0].url(),
        "https://cms.example/neverbounce/validate-single?_format=json&email=a%40b.com"
    );
}

#[tokio::test(start_paused = true)]
async fn test_phase_follows_cycle() {
    let transport = ScriptedTransport::new();
    transport.reply_email("a@b.com", Reply::verified().after(Duration::from_secs(1)));
    let mut session = session(&transport);
    let email = session.mount(FieldSchema::new("email"), &EmailField).unwrap();
    let coordinator = session.lookup("email").unwrap();

    assert_eq!(coordinator.phase(), LookupPhase::Idle);
    email.input("a@b.com").unwrap();
    assert_eq!(coordinator.phase(), LookupPhase::Armed);

    advance(500).await;
    assert_eq!(coordinator.phase(), LookupPhase::InFlight);

    advance(1_000).await;
    assert_eq!(coordinator.phase(), LookupPhase::Settled);
    assert!(!session.lookups_pending());
}

#[tokio::test(start_paused = true)]
async fn test_mount_with_eligible_value_arms() {
    let transport = ScriptedTransport::new();
    let mut session = session(&transport);
    session
        .mount_with_value(FieldSchema::new("email"), &EmailField, "a@b.com")
        .unwrap();

    session.settle().await;
    assert_eq!(transport.request_count(), 1);
    assert_eq!(
        session.store().get("email").unwrap().lookup(),
        LookupStatus::Verified
    );
}

// =============================================================================
// Eligibility
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_malformed_email_never_dispatches() {
    let transport = ScriptedTransport::new();
    let mut session = session(&transport);
    let email = session.mount(FieldSchema::new("email"), &EmailField).unwrap();

    email.input("not-an-email").unwrap();
    email.blur().unwrap();
    assert_eq!(session.lookup("email").unwrap().phase(), LookupPhase::Idle);

    advance(5_000).await;
    assert_eq!(transport.request_count(), 0);

    let report = email.report();
    assert!(!report.valid);
    assert!(!report.success);
    assert_eq!(report.hints, vec!["\"not-an-email\" isn't an Email.".to_string()]);
    assert_eq!(report.lookup, LookupStatus::Unknown);
}

#[tokio::test(start_paused = true)]
async fn test_clearing_value_disarms() {
    let transport = ScriptedTransport::new();
    let mut session = session(&transport);
    let email = session.mount(FieldSchema::new("email"), &EmailField).unwrap();

    email.input("a@b.com").unwrap();
    advance(100).await;
    email.input("").unwrap();
    assert_eq!(session.lookup("email").unwrap().phase(), LookupPhase::Idle);

    advance(2_000).await;
    assert_eq!(transport.request_count(), 0);
}

// =============================================================================
// Outcomes
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_verified_address_is_success() {
    let transport = ScriptedTransport::new();
    let mut session = session(&transport);
    let email = session
        .mount(FieldSchema::new("email").required(), &EmailField)
        .unwrap();

    email.input("a@b.com").unwrap();
    email.blur().unwrap();
    // Lookup not settled yet: valid would hide an unverified address.
    assert!(!email.is_success());

    session.settle().await;
    let report = email.report();
    assert!(report.valid);
    assert!(report.success);
    assert!(report.hints.is_empty());
    assert_eq!(report.lookup, LookupStatus::Verified);
}

#[tokio::test(start_paused = true)]
async fn test_undeliverable_address_shows_remote_hint_only() {
    let transport = ScriptedTransport::new();
    transport.reply_email("x@y.com", Reply::invalid());
    let mut session = session(&transport);
    let email = session.mount(FieldSchema::new("email"), &EmailField).unwrap();

    email.input("x@y.com").unwrap();
    email.blur().unwrap();
    session.settle().await;

    let report = email.report();
    assert!(!report.valid);
    assert!(!report.success);
    assert_eq!(report.lookup, LookupStatus::Rejected);
    assert_eq!(report.hints, vec![REJECTED.to_string()]);
    assert!(!report.verification_unavailable());
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_is_unavailable_without_retry() {
    let transport = ScriptedTransport::new();
    transport.reply_email(
        "a@b.com",
        Reply::error(TransportError::Network("connection refused".to_string())),
    );
    let settings = FormSettings::new(common::BASE_URL)
        .with_message("neverBounceUnavailable", "We could not verify this address.");
    let mut session = session_with(settings, &transport);
    let email = session.mount(FieldSchema::new("email"), &EmailField).unwrap();

    email.input("a@b.com").unwrap();
    email.blur().unwrap();
    session.settle().await;
    advance(60_000).await;

    assert_eq!(transport.request_count(), 1);
    let report = email.report();
    assert_eq!(report.lookup, LookupStatus::Unavailable);
    assert!(report.verification_unavailable());
    assert!(!report.success);
    assert_eq!(
        report.hints,
        vec!["We could not verify this address.".to_string()]
    );

    // The next edit is the retry.
    email.input("a@b.co").unwrap();
    advance(1_000).await;
    assert_eq!(transport.request_count(), 2);
    assert_eq!(email.report().lookup, LookupStatus::Verified);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_payload_is_unavailable() {
    let transport = ScriptedTransport::new();
    transport.reply_email("a@b.com", Reply::payload(json!({ "success": false })));
    let mut session = session(&transport);
    let email = session.mount(FieldSchema::new("email"), &EmailField).unwrap();

    email.input("a@b.com").unwrap();
    session.settle().await;
    assert_eq!(email.report().lookup, LookupStatus::Unavailable);
}

#[tokio::test(start_paused = true)]
async fn test_slow_service_times_out() {
    let transport = ScriptedTransport::new();
    transport.reply_email("a@b.com", Reply::verified().after(Duration::from_secs(60)));
    let mut session = session(&transport);
    let email = session.mount(FieldSchema::new("email"), &EmailField).unwrap();

    email.input("a@b.com").unwrap();
    advance(5_000).await;
    assert_eq!(session.lookup("email").unwrap().phase(), LookupPhase::InFlight);

    advance(10_000).await;
    assert_eq!(email.report().lookup, LookupStatus::Unavailable);
    assert_eq!(transport.request_count(), 1);
}

// =============================================================================
// Stale responses
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_out_of_order_response_is_discarded() {
    let transport = ScriptedTransport::new();
    transport.reply_email("slow@b.com", Reply::invalid().after(Duration::from_secs(3)));
    transport.reply_email("fast@b.com", Reply::verified().after(Duration::from_millis(10)));
    let mut session = session(&transport);
    let email = session.mount(FieldSchema::new("email"), &EmailField).unwrap();

    email.input("slow@b.com").unwrap();
    advance(500).await;
    email.input("fast@b.com").unwrap();
    advance(500).await;
    assert_eq!(email.report().lookup, LookupStatus::Verified);

    // The first response lands long after the second.
    advance(5_000).await;
    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].generation, 1);
    assert_eq!(requests[1].generation, 2);
    assert_eq!(email.report().lookup, LookupStatus::Verified);
    assert_eq!(email.value().as_str(), Some("fast@b.com"));
}

#[tokio::test(start_paused = true)]
async fn test_edit_while_in_flight_rearms() {
    let transport = ScriptedTransport::new();
    transport.reply_email("a@b.com", Reply::invalid().after(Duration::from_secs(1)));
    let mut session = session(&transport);
    let email = session.mount(FieldSchema::new("email"), &EmailField).unwrap();
    let mut phases = session.lookup("email").unwrap().watch_phase();

    email.input("a@b.com").unwrap();
    phases
        .wait_for(|phase| *phase == LookupPhase::InFlight)
        .await
        .unwrap();

    email.input("c@d.com").unwrap();
    assert_eq!(*phases.borrow(), LookupPhase::Armed);
    assert_eq!(email.report().lookup, LookupStatus::Unknown);

    session.settle().await;
    advance(2_000).await;
    assert_eq!(transport.request_count(), 2);
    assert_eq!(email.report().lookup, LookupStatus::Verified);
}

#[tokio::test(start_paused = true)]
async fn test_unmount_abandons_in_flight_lookup() {
    let transport = ScriptedTransport::new();
    transport.reply_email("a@b.com", Reply::verified().after(Duration::from_secs(1)));
    let mut session = session(&transport);
    let email = session.mount(FieldSchema::new("email"), &EmailField).unwrap();

    email.input("a@b.com").unwrap();
    advance(500).await;
    assert_eq!(transport.request_count(), 1);

    session.unmount("email").unwrap();
    advance(2_000).await;
    assert!(session.store().get("email").is_none());
    assert!(session.lookup("email").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_close_abandons_pending_lookups() {
    let transport = ScriptedTransport::new();
    let mut session = session(&transport);
    let email = session.mount(FieldSchema::new("email"), &EmailField).unwrap();

    email.input("a@b.com").unwrap();
    session.close();
    advance(2_000).await;
    assert_eq!(transport.request_count(), 0);
    assert_eq!(email.report().lookup, LookupStatus::Unknown);
}

// =============================================================================
// Multi-field lookups
// =============================================================================

/// Postal code checked against the selected country.
struct PostalCode;

impl LookupSource for PostalCode {
    fn endpoint(&self) -> String {
        "https://cms.example/postal/validate?".to_string()
    }

    fn inputs(&self) -> Vec<FieldKey> {
        vec![FieldKey::from("zip"), FieldKey::from("country")]
    }

    fn accepts(&self, values: &LookupValues) -> bool {
        !values.text("country").is_empty()
    }

    fn query(&self, values: &LookupValues) -> String {
        format!("zip={}&country={}", values.text("zip"), values.text("country"))
    }

    fn check_response(&self, payload: &Value) -> bool {
        payload.get("success").and_then(Value::as_bool) == Some(true)
    }

    fn is_successful(&self, payload: &Value) -> bool {
        payload.get("valid").and_then(Value::as_bool) == Some(true)
    }
}

#[tokio::test(start_paused = true)]
async fn test_other_input_edit_resets_and_rearms() {
    let transport = ScriptedTransport::new();
    transport.reply(
        "zip=1000&country=BE",
        Reply::payload(json!({ "success": true, "valid": true })),
    );
    transport.reply(
        "zip=1000&country=NL",
        Reply::payload(json!({ "success": true, "valid": false })),
    );
    let mut session = session(&transport);
    session
        .mount(FieldSchema::new("country"), &TextField::new())
        .unwrap();
    let zip = session.mount(FieldSchema::new("zip"), &TextField::new()).unwrap();
    session.attach_lookup("zip", Arc::new(PostalCode)).unwrap();

    zip.input("1000").unwrap();
    assert_eq!(session.lookup("zip").unwrap().phase(), LookupPhase::Idle);

    session
        .store()
        .set("country", FieldUpdate::new().value("BE"))
        .unwrap();
    session.settle().await;
    assert_eq!(zip.report().lookup, LookupStatus::Verified);

    session
        .store()
        .set("country", FieldUpdate::new().value("NL"))
        .unwrap();
    assert_eq!(zip.report().lookup, LookupStatus::Unknown);

    session.settle().await;
    assert_eq!(zip.report().lookup, LookupStatus::Rejected);
    let queries: Vec<String> = transport.requests().into_iter().map(|r| r.query).collect();
    assert_eq!(queries, vec!["zip=1000&country=BE", "zip=1000&country=NL"]);
}

#[tokio::test(start_paused = true)]
async fn test_remounted_input_still_drives_lookup() {
    let transport = ScriptedTransport::new();
    transport.reply(
        "zip=1000&country=BE",
        Reply::payload(json!({ "success": true, "valid": true })),
    );
    transport.reply(
        "zip=1000&country=NL",
        Reply::payload(json!({ "success": true, "valid": false })),
    );
    let mut session = session(&transport);
    session
        .mount_with_value(FieldSchema::new("country"), &TextField::new(), "BE")
        .unwrap();
    let zip = session.mount(FieldSchema::new("zip"), &TextField::new()).unwrap();
    session.attach_lookup("zip", Arc::new(PostalCode)).unwrap();
    zip.input("1000").unwrap();
    session.settle().await;
    assert_eq!(zip.report().lookup, LookupStatus::Verified);

    // The outcome was built from the unmounted country.
    session.unmount("country").unwrap();
    assert_eq!(zip.report().lookup, LookupStatus::Unknown);
    assert_eq!(session.lookup("zip").unwrap().phase(), LookupPhase::Idle);

    let country = session
        .mount(FieldSchema::new("country"), &TextField::new())
        .unwrap();
    country.input("NL").unwrap();
    assert_eq!(session.lookup("zip").unwrap().phase(), LookupPhase::Armed);

    session.settle().await;
    assert_eq!(zip.report().lookup, LookupStatus::Rejected);
    let queries: Vec<String> = transport.requests().into_iter().map(|r| r.query).collect();
    assert_eq!(queries, vec!["zip=1000&country=BE", "zip=1000&country=NL"]);
}

#[tokio::test(start_paused = true)]
async fn test_remounted_input_with_value_rearms() {
    let transport = ScriptedTransport::new();
    let mut session = session(&transport);
    let zip = session.mount(FieldSchema::new("zip"), &TextField::new()).unwrap();
    session.attach_lookup("zip", Arc::new(PostalCode)).unwrap();
    zip.input("1000").unwrap();
    assert_eq!(session.lookup("zip").unwrap().phase(), LookupPhase::Idle);

    session
        .mount_with_value(FieldSchema::new("country"), &TextField::new(), "BE")
        .unwrap();
    assert_eq!(session.lookup("zip").unwrap().phase(), LookupPhase::Armed);

    session.settle().await;
    assert_eq!(transport.request_count(), 1);
}
