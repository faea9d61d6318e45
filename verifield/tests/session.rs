//! Form session lifecycle, aggregation and whole-form validation.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{ScriptedTransport, session};
use regex::Regex;
use verifield::error::{SessionError, StoreError};
use verifield::fields::{EmailField, RadioField, TextField};
use verifield::rules;
use verifield::schema::{FieldSchema, FormSettings};
use verifield::session::FormSession;
use verifield::state::{FieldUpdate, LookupStatus};
use verifield::value::{FieldKey, FieldValue};

fn plain_session() -> FormSession {
    common::init_logging();
    FormSession::new(FormSettings::new(common::BASE_URL))
}

// =============================================================================
// Mounting
// =============================================================================

#[test]
fn test_duplicate_mount_is_rejected() {
    let mut session = plain_session();
    session
        .mount(FieldSchema::new("name"), &TextField::new())
        .unwrap();
    let err = session
        .mount(FieldSchema::new("name"), &TextField::new())
        .unwrap_err();
    assert_eq!(err, SessionError::DuplicateField(FieldKey::from("name")));
}

#[test]
fn test_lookup_field_needs_transport() {
    let mut session = plain_session();
    let err = session
        .mount(FieldSchema::new("email"), &EmailField)
        .unwrap_err();
    assert_eq!(err, SessionError::MissingTransport(FieldKey::from("email")));
    assert!(session.field("email").is_none());
}

#[test]
fn test_unknown_field() {
    let mut session = plain_session();
    assert_eq!(
        session.unmount("ghost").unwrap_err(),
        SessionError::UnknownField(FieldKey::from("ghost"))
    );
    assert!(session.field("ghost").is_none());
}

#[test]
fn test_rules_are_namespaced_by_key() {
    let transport = ScriptedTransport::new();
    let mut session = session(&transport);
    session
        .mount(FieldSchema::new("work").required(), &EmailField)
        .unwrap();
    session
        .mount(FieldSchema::new("home"), &EmailField)
        .unwrap();

    assert_eq!(
        session.registry().rules_for("work"),
        vec!["required_work", "email_work", "email_neverbounce_work"]
    );
    assert_eq!(
        session.registry().rules_for("home"),
        vec!["email_home", "email_neverbounce_home"]
    );
}

#[test]
fn test_remount_keeps_rules_and_resets_state() {
    let mut session = plain_session();
    let name = session
        .mount(FieldSchema::new("name").required(), &TextField::new())
        .unwrap();
    name.input("Ferris").unwrap();
    name.blur().unwrap();

    session.unmount("name").unwrap();
    assert_eq!(session.registry().rules_for("name"), vec!["required_name"]);
    assert!(name.is_valid());
    assert_eq!(name.value(), FieldValue::Unset);
    assert_eq!(name.input("x").unwrap_err(), StoreError::UnknownField(FieldKey::from("name")));

    let name = session
        .mount(FieldSchema::new("name").required(), &TextField::new())
        .unwrap();
    assert_eq!(session.registry().rules_for("name"), vec!["required_name"]);
    assert!(!name.state().unwrap().is_blurred());
    assert!(name.is_valid());
}

// =============================================================================
// Gating and hints
// =============================================================================

#[test]
fn test_required_waits_for_blur() {
    let mut session = plain_session();
    let name = session
        .mount(
            FieldSchema::new("name")
                .required()
                .with_message("requiredError", "Tell us your name"),
            &TextField::new(),
        )
        .unwrap();

    assert!(name.is_valid());
    name.blur().unwrap();
    assert!(!name.is_valid());
    assert_eq!(name.active_hints(), vec!["Tell us your name".to_string()]);

    name.input("Ferris").unwrap();
    assert!(name.is_valid());
    assert!(name.active_hints().is_empty());
    // No lookup-bearing rules: never a success.
    assert!(!name.is_success());
}

#[test]
fn test_text_constraints() {
    let mut session = plain_session();
    let code = session
        .mount(
            FieldSchema::new("code"),
            &TextField::new()
                .pattern(Regex::new(r"^\d+$").unwrap())
                .max_length(4),
        )
        .unwrap();

    code.input("12a45").unwrap();
    assert!(code.is_valid());

    code.blur().unwrap();
    assert_eq!(
        code.active_hints(),
        vec![
            "\"12a45\" doesn't match the expected format.".to_string(),
            "Please enter at most 4 characters.".to_string(),
        ]
    );

    code.input("1234").unwrap();
    assert!(code.is_valid());
}

#[test]
fn test_radio_applies_without_blur() {
    let mut session = plain_session();
    let color = session
        .mount(
            FieldSchema::new("color")
                .with_option("red", "Red")
                .with_option("blue", "Blue"),
            &RadioField,
        )
        .unwrap();

    color.input("green").unwrap();
    assert_eq!(
        color.active_hints(),
        vec!["\"green\" is not an available option.".to_string()]
    );
    color.input("blue").unwrap();
    assert!(color.is_valid());
}

#[test]
fn test_form_level_message_defaults() {
    let settings = FormSettings::new(common::BASE_URL).with_message("requiredError", "Required");
    let mut session = FormSession::new(settings);
    let a = session
        .mount(FieldSchema::new("a").required(), &TextField::new())
        .unwrap();
    let b = session
        .mount(
            FieldSchema::new("b")
                .required()
                .with_message("requiredError", "B is required"),
            &TextField::new(),
        )
        .unwrap();

    a.blur().unwrap();
    b.blur().unwrap();
    assert_eq!(a.active_hints(), vec!["Required".to_string()]);
    assert_eq!(b.active_hints(), vec!["B is required".to_string()]);
}

#[test]
fn test_cross_field_rule() {
    let mut session = plain_session();
    session
        .mount(FieldSchema::new("password"), &TextField::new())
        .unwrap();
    let confirm = session
        .mount(FieldSchema::new("confirm"), &TextField::new())
        .unwrap();
    session.registry().register(
        "confirm",
        "matches_confirm",
        verifield::rule::Rule::new(|cx| cx.get("password").map(|p| p.value()) == Some(cx.value()))
            .reads(["password"])
            .hint("Passwords do not match.")
            .when(rules::blurred_and_filled),
    );

    session
        .store()
        .set("password", FieldUpdate::new().value("hunter2"))
        .unwrap();
    confirm.input("hunter3").unwrap();
    confirm.blur().unwrap();
    assert!(!confirm.is_valid());

    session
        .store()
        .set("password", FieldUpdate::new().value("hunter3"))
        .unwrap();
    assert!(confirm.is_valid());
}

// =============================================================================
// Notifications
// =============================================================================

#[test]
fn test_subscribers_see_committed_changes() {
    let mut session = plain_session();
    let name = session
        .mount(FieldSchema::new("name").required(), &TextField::new())
        .unwrap();
    let renders = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&renders);
    let id = name.subscribe(move |_, state, changes| {
        assert!(changes.value);
        assert_eq!(state.value().as_str(), Some("Ferris"));
        seen.fetch_add(1, Ordering::SeqCst);
    });

    name.input("Ferris").unwrap();
    name.input("Ferris").unwrap();
    assert_eq!(renders.load(Ordering::SeqCst), 1);

    name.unsubscribe(id);
    name.input("Crab").unwrap();
    assert_eq!(renders.load(Ordering::SeqCst), 1);
}

#[test]
fn test_wakeup_collects_changed_fields() {
    let mut session = plain_session();
    let (tx, mut rx) = verifield::wakeup::channel();
    session.install_wakeup(tx);
    let a = session.mount(FieldSchema::new("a"), &TextField::new()).unwrap();
    let b = session.mount(FieldSchema::new("b"), &TextField::new()).unwrap();

    a.input("1").unwrap();
    a.input("2").unwrap();
    b.blur().unwrap();

    let changed: Vec<FieldKey> = rx.drain().into_iter().collect();
    assert_eq!(changed, vec![FieldKey::from("a"), FieldKey::from("b")]);
}

// =============================================================================
// Whole-form validation
// =============================================================================

#[test]
fn test_validate_blurs_and_reports_in_mount_order() {
    let mut session = plain_session();
    session
        .mount(FieldSchema::new("name").required(), &TextField::new())
        .unwrap();
    session
        .mount(
            FieldSchema::new("color").with_option("red", "Red"),
            &RadioField,
        )
        .unwrap();
    session
        .mount(
            FieldSchema::new("zip").required(),
            &TextField::new().min_length(4),
        )
        .unwrap();
    session.field("zip").unwrap().input("12").unwrap();

    let result = session.validate();
    assert!(result.is_invalid());
    let errors: Vec<(&str, &str)> = result
        .errors()
        .iter()
        .map(|e| (e.field.as_str(), e.message.as_str()))
        .collect();
    assert_eq!(
        errors,
        vec![
            ("name", "This field is required."),
            ("zip", "Please enter at least 4 characters."),
        ]
    );
    assert_eq!(result.first_invalid_field(), Some(&FieldKey::from("name")));
    assert!(session.field("color").unwrap().state().unwrap().is_blurred());
}

#[tokio::test(start_paused = true)]
async fn test_validate_waits_for_nothing_but_reports_unverified_email() {
    let transport = ScriptedTransport::new();
    let mut session = session(&transport);
    let email = session.mount(FieldSchema::new("email"), &EmailField).unwrap();
    email.input("a@b.com").unwrap();

    let result = session.validate();
    assert_eq!(result.errors().len(), 1);
    assert_eq!(result.errors()[0].field, FieldKey::from("email"));

    session.settle().await;
    assert!(session.validate().is_valid());
    assert_eq!(email.report().lookup, LookupStatus::Verified);
}
