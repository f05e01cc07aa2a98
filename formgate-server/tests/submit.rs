//! End-to-end tests of the submission endpoint over an in-process
//! router, with both transports stubbed out.

mod support;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::json;
use tower::ServiceExt;

use support::{body_json, form_body, post_form, test_app};

#[tokio::test]
async fn valid_submission_is_delivered_and_audited() {
    let app = test_app(true, true, |_| {});

    let response = app.router.clone().oneshot(post_form(form_body(60))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "ok": true }));
    assert_eq!(app.api_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(app.smtp_calls.load(std::sync::atomic::Ordering::SeqCst), 0);

    let lines = app.audit_lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["event"], json!("submission_accepted"));
    assert_eq!(lines[0]["outcome"], json!("ok"));
    assert_eq!(lines[0]["transport"], json!("api"));
    assert_eq!(lines[0]["client"], json!("203.0.113.7"));
    assert_eq!(lines[0]["fields"]["email"], json!("ada@example.com"));
}

#[tokio::test]
async fn honeypot_trip_gets_a_decoy_success_and_no_delivery() {
    let app = test_app(true, true, |_| {});

    let body = format!("{}&website=http%3A%2F%2Fspam.example", form_body(60));
    let response = app.router.clone().oneshot(post_form(body)).await.unwrap();

    // Indistinguishable on the wire from a real acceptance.
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "ok": true }));
    assert_eq!(app.deliveries(), 0);

    let lines = app.audit_lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["event"], json!("honeypot_tripped"));
    assert_eq!(lines[0]["outcome"], json!("ok"));
}

#[tokio::test]
async fn api_failure_falls_back_to_smtp() {
    let app = test_app(false, true, |_| {});

    let response = app.router.clone().oneshot(post_form(form_body(60))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.api_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(app.smtp_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(app.audit_lines()[0]["transport"], json!("smtp"));
}

#[tokio::test]
async fn both_transports_failing_is_a_500() {
    let app = test_app(false, false, |_| {});

    let response = app.router.clone().oneshot(post_form(form_body(60))).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["ok"], json!(false));
    assert!(body["error"].as_str().unwrap().contains("api refused"));
    assert_eq!(app.audit_lines()[0]["event"], json!("delivery_failed"));
}

#[tokio::test]
async fn rate_limit_rejects_after_the_configured_budget() {
    let app = test_app(true, true, |config| {
        config.anti_abuse.rate_max = 2;
    });

    for _ in 0..2 {
        let response = app.router.clone().oneshot(post_form(form_body(60))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.router.clone().oneshot(post_form(form_body(60))).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        body_json(response).await,
        json!({ "ok": false, "error": "rate_limited" })
    );

    let lines = app.audit_lines();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2]["event"], json!("abuse_rejected"));
}

#[tokio::test]
async fn too_fast_submission_is_rejected() {
    let app = test_app(true, true, |_| {});

    let response = app.router.clone().oneshot(post_form(form_body(0))).await.unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        body_json(response).await,
        json!({ "ok": false, "error": "too_fast" })
    );
    assert_eq!(app.deliveries(), 0);
}

#[tokio::test]
async fn exactly_minimum_elapsed_time_passes() {
    let app = test_app(true, true, |_| {});

    // Default minimum is 3 seconds; a form rendered exactly that long
    // ago is on the accepted side of the boundary.
    let response = app.router.clone().oneshot(post_form(form_body(3))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn invalid_email_is_rejected() {
    let app = test_app(true, true, |_| {});

    let ts = chrono::Utc::now().timestamp() - 60;
    let body = format!("email=not-an-address&message=hello&ts={ts}");
    let response = app.router.clone().oneshot(post_form(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({ "ok": false, "error": "invalid_email" })
    );
    assert_eq!(app.audit_lines()[0]["event"], json!("client_rejected"));
}

#[tokio::test]
async fn disposable_domain_is_rejected() {
    let app = test_app(true, true, |_| {});

    let ts = chrono::Utc::now().timestamp() - 60;
    let body = format!("email=bot%40mailinator.com&message=hello&ts={ts}");
    let response = app.router.clone().oneshot(post_form(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({ "ok": false, "error": "disposable_email_blocked" })
    );
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let app = test_app(true, true, |_| {});

    let ts = chrono::Utc::now().timestamp() - 60;
    let body = format!("email=ada%40example.com&message=+++&ts={ts}");
    let response = app.router.clone().oneshot(post_form(body)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({ "ok": false, "error": "empty_message" })
    );
    assert_eq!(app.deliveries(), 0);
}

#[tokio::test]
async fn origin_mismatch_is_forbidden() {
    let app = test_app(true, true, |_| {});

    let request = Request::builder()
        .method("POST")
        .uri("/submit")
        .header("content-type", "application/x-www-form-urlencoded")
        .header("host", "forms.example.com")
        .header("origin", "https://evil.example.net")
        .body(Body::from(form_body(60)))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await,
        json!({ "ok": false, "error": "forbidden" })
    );
    assert_eq!(app.audit_lines()[0]["event"], json!("abuse_rejected"));
}

#[tokio::test]
async fn disallowed_attachment_type_is_rejected_before_delivery() {
    let app = test_app(true, true, |_| {});

    let ts = chrono::Utc::now().timestamp() - 60;
    let boundary = "XFORMGATEBOUNDARY";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"email\"\r\n\r\n\
         ada@example.com\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"message\"\r\n\r\n\
         hello\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"ts\"\r\n\r\n\
         {ts}\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"upload\"; filename=\"tool.exe\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n\
         MZbinary\r\n\
         --{boundary}--\r\n"
    );

    let request = Request::builder()
        .method("POST")
        .uri("/submit")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({ "ok": false, "error": "attachment_type" })
    );
    assert_eq!(app.deliveries(), 0);
}

#[tokio::test]
async fn multipart_submission_with_allowed_attachment_is_delivered() {
    let app = test_app(true, true, |_| {});

    let ts = chrono::Utc::now().timestamp() - 60;
    let boundary = "XFORMGATEBOUNDARY";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"email\"\r\n\r\n\
         ada@example.com\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"message\"\r\n\r\n\
         see attachment\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"ts\"\r\n\r\n\
         {ts}\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"upload\"; filename=\"notes.txt\"\r\n\
         Content-Type: text/plain\r\n\r\n\
         some notes\r\n\
         --{boundary}--\r\n"
    );

    let request = Request::builder()
        .method("POST")
        .uri("/submit")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.deliveries(), 1);

    let lines = app.audit_lines();
    assert_eq!(lines[0]["fields"]["attachments"][0]["name"], json!("notes.txt"));
    assert_eq!(lines[0]["fields"]["attachments"][0]["size"], json!(10));
}

#[tokio::test]
async fn oversized_multipart_body_is_rejected_as_too_large() {
    let app = test_app(true, true, |config| {
        config.anti_abuse.max_attachment_bytes = 1024;
    });

    let ts = chrono::Utc::now().timestamp() - 60;
    let boundary = "XFORMGATEBOUNDARY";
    // Past the 1 KiB attachment cap plus the router's slack on top of it.
    let oversized = "x".repeat(2 * 1024 * 1024);
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"email\"\r\n\r\n\
         ada@example.com\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"message\"\r\n\r\n\
         hello\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"ts\"\r\n\r\n\
         {ts}\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"upload\"; filename=\"big.txt\"\r\n\
         Content-Type: text/plain\r\n\r\n\
         {oversized}\r\n\
         --{boundary}--\r\n"
    );

    let request = Request::builder()
        .method("POST")
        .uri("/submit")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        json!({ "ok": false, "error": "attachment_too_large" })
    );
    assert_eq!(app.deliveries(), 0);
}

#[tokio::test]
async fn direct_client_is_keyed_by_peer_address() {
    use std::net::SocketAddr;

    use axum::extract::ConnectInfo;

    let app = test_app(true, true, |_| {});

    let peer = SocketAddr::from(([198, 51, 100, 4], 55555));
    let request = Request::builder()
        .method("POST")
        .uri("/submit")
        .header("content-type", "application/x-www-form-urlencoded")
        .extension(ConnectInfo(peer))
        .body(Body::from(form_body(60)))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.audit_lines()[0]["client"], json!("198.51.100.4"));
}

#[tokio::test]
async fn non_post_method_is_405() {
    let app = test_app(true, true, |_| {});

    let request = Request::builder()
        .method("GET")
        .uri("/submit")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        body_json(response).await,
        json!({ "ok": false, "error": "method_not_allowed" })
    );
}

#[tokio::test]
async fn missing_recipient_is_a_config_error() {
    let app = test_app(true, true, |config| {
        config.identity.to.clear();
    });

    let response = app.router.clone().oneshot(post_form(form_body(60))).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        json!({ "ok": false, "error": "recipient_missing" })
    );
    assert_eq!(app.audit_lines()[0]["event"], json!("config_error"));
}

#[tokio::test]
async fn redacted_fields_are_masked_in_the_audit_log() {
    let app = test_app(true, true, |config| {
        config.logging.redact_fields = vec!["message".to_string()];
    });

    let response = app.router.clone().oneshot(post_form(form_body(60))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let lines = app.audit_lines();
    assert_eq!(lines[0]["fields"]["message"], json!("[REDACTED]"));
    assert_eq!(lines[0]["fields"]["email"], json!("ada@example.com"));
}

#[tokio::test]
async fn healthz_responds() {
    let app = test_app(true, true, |_| {});

    let request = Request::builder()
        .method("GET")
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
