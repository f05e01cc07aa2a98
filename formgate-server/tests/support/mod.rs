//! Test fixtures: an app with stubbed transports and a throwaway audit
//! file, plus request and body helpers.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::Request;
use axum::http::header::CONTENT_TYPE;
use formgate_common::Config;
use formgate_common::audit::AuditLog;
use formgate_delivery::{Mailer, OutboundMessage, Transport, TransportError};
use formgate_guard::{Guard, MemoryRateStore};
use formgate_server::AppState;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;

pub struct StubTransport {
    name: &'static str,
    succeed: bool,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Transport for StubTransport {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn send(&self, _message: &OutboundMessage) -> Result<(), TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.succeed {
            Ok(())
        } else {
            Err(TransportError(format!("{} refused", self.name)))
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub api_calls: Arc<AtomicUsize>,
    pub smtp_calls: Arc<AtomicUsize>,
    pub audit_path: PathBuf,
    _dir: TempDir,
}

impl TestApp {
    pub fn deliveries(&self) -> usize {
        self.api_calls.load(Ordering::SeqCst) + self.smtp_calls.load(Ordering::SeqCst)
    }

    pub fn audit_lines(&self) -> Vec<Value> {
        let content = std::fs::read_to_string(&self.audit_path).unwrap_or_default();
        content
            .lines()
            .map(|line| serde_json::from_str(line).expect("audit line is valid JSON"))
            .collect()
    }
}

/// Build an app whose transports are stubs with the given outcomes.
pub fn test_app(api_ok: bool, smtp_ok: bool, tweak: impl FnOnce(&mut Config)) -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let audit_path = dir.path().join("audit.log");

    let mut config = Config::default();
    config.identity.site_name = "Example".to_string();
    config.identity.sender_name = "Example Forms".to_string();
    config.identity.sender_email = "noreply@example.com".to_string();
    config.identity.to = vec!["inbox@example.com".to_string()];
    config.logging.audit_log_path.clone_from(&audit_path);
    tweak(&mut config);

    let api_calls = Arc::new(AtomicUsize::new(0));
    let smtp_calls = Arc::new(AtomicUsize::new(0));
    let transports: Vec<Box<dyn Transport>> = vec![
        Box::new(StubTransport {
            name: "api",
            succeed: api_ok,
            calls: Arc::clone(&api_calls),
        }),
        Box::new(StubTransport {
            name: "smtp",
            succeed: smtp_ok,
            calls: Arc::clone(&smtp_calls),
        }),
    ];

    let store = Arc::new(MemoryRateStore::new(Duration::from_secs(
        config.anti_abuse.rate_window_secs,
    )));
    let guard = Arc::new(Guard::new(config.anti_abuse.clone(), store));
    let audit = AuditLog::new(&config.logging);

    let state = AppState {
        config: Arc::new(config),
        guard,
        mailer: Arc::new(Mailer::new(transports)),
        audit,
    };

    TestApp {
        router: formgate_server::router(state),
        api_calls,
        smtp_calls,
        audit_path,
        _dir: dir,
    }
}

/// A well-formed urlencoded submission body, rendered `age` seconds ago.
pub fn form_body(age: i64) -> String {
    let ts = chrono::Utc::now().timestamp() - age;
    format!("name=Ada&email=ada%40example.com&message=hello+there&ts={ts}")
}

pub fn post_form(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/submit")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("x-forwarded-for", "203.0.113.7")
        .body(Body::from(body))
        .expect("request")
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("response body is JSON")
}
