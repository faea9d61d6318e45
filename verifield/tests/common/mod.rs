//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use simplelog::{Config, LevelFilter, TestLogger};
use verifield::error::TransportError;
use verifield::lookup::{LookupConfig, LookupRequest, Transport};
use verifield::schema::FormSettings;
use verifield::session::FormSession;

pub const BASE_URL: &str = "https://cms.example";

/// Quiescence window used by the fixtures.
pub const DEBOUNCE: Duration = Duration::from_millis(300);

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = TestLogger::init(LevelFilter::Debug, Config::default());
}

/// What the scripted service answers for one query.
#[derive(Debug, Clone)]
pub struct Reply {
    pub delay: Duration,
    pub outcome: Result<Value, TransportError>,
}

impl Reply {
    pub fn verified() -> Self {
        Self::payload(json!({ "success": true, "result": 0 }))
    }

    pub fn invalid() -> Self {
        Self::payload(json!({ "success": true, "result": 1 }))
    }

    pub fn payload(payload: Value) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Ok(payload),
        }
    }

    pub fn error(err: TransportError) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: Err(err),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Transport answering from a script, keyed by query fragment.
///
/// Unscripted queries are answered as verified without delay.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<String, Reply>>,
    requests: Mutex<Vec<LookupRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Script the reply for a raw query fragment.
    pub fn reply(&self, query: impl Into<String>, reply: Reply) {
        self.replies.lock().unwrap().insert(query.into(), reply);
    }

    /// Script the reply for an email lookup.
    pub fn reply_email(&self, email: &str, reply: Reply) {
        self.reply(email_query(email), reply);
    }

    /// Requests received so far, in dispatch order.
    pub fn requests(&self) -> Vec<LookupRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn perform_lookup(&self, request: &LookupRequest) -> Result<Value, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(&request.query)
            .cloned()
            .unwrap_or_else(Reply::verified);
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.outcome
    }
}

/// Query fragment an email field sends for `email`.
pub fn email_query(email: &str) -> String {
    format!("&email={}", urlencoding::encode(email))
}

/// Session wired to `transport` with the fixture debounce.
pub fn session(transport: &Arc<ScriptedTransport>) -> FormSession {
    session_with(FormSettings::new(BASE_URL), transport)
}

pub fn session_with(settings: FormSettings, transport: &Arc<ScriptedTransport>) -> FormSession {
    init_logging();
    FormSession::new(settings)
        .with_shared_transport(transport.clone())
        .with_lookup_config(LookupConfig::default().with_debounce(DEBOUNCE))
}

/// Advance the paused clock.
pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
