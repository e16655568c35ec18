//! Notifier delivery through the in-memory mailer.

use std::sync::Arc;

use imgpromote_core::{JobStatus, PromotionRequest, PromotionResult, PromotionStep, RunLog};
use imgpromote_notify::fakes::MemoryMailer;
use imgpromote_notify::{
    CorrelationMetadata, NotificationPayload, NotifyError, Notifier, Templates,
};
use tracing_test::traced_test;

fn metadata() -> CorrelationMetadata {
    CorrelationMetadata {
        release_link: "https://tickets.example.com/browse/REL-99".to_string(),
        job_url: "https://ci.example.com/job/promote/7".to_string(),
        build_info: "promote #7".to_string(),
        dry_run_status: "NO".to_string(),
        parameters_json: r#"{"TAGGING_OPTION":"LATEST_PROMOTE"}"#.to_string(),
    }
}

fn results() -> Vec<PromotionResult> {
    let ok = PromotionRequest::new("api", "latest", "stable", "reg", false);
    let bad = PromotionRequest::new("web", "latest", "stable", "reg", false);
    vec![
        PromotionResult::success(&ok, "Promoted reg/api:latest to reg/api:stable", 5),
        PromotionResult::failure(&bad, Some(PromotionStep::Pull), "pull failed after 3 attempt(s)", 5),
    ]
}

fn payload() -> NotificationPayload {
    NotificationPayload::from_results(results(), vec!["team@example.com".to_string()], metadata())
}

#[tokio::test]
async fn test_failure_report_attaches_run_log() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log_path = dir.path().join("promote.log");
    let log = RunLog::open(&log_path).expect("open log");
    log.error("web: pull failed after 3 attempt(s)");

    let mailer = Arc::new(MemoryMailer::new());
    let notifier = Notifier::new(mailer.clone(), "jenkins@localhost");

    let receipt = notifier
        .notify(&payload().with_log_file(&log_path))
        .await
        .expect("notify");

    assert_eq!(receipt.subject, "[FAILURE] Docker Tagging Job: REL-99");
    assert_eq!(receipt.attachments, vec!["promote.log"]);
    assert!(receipt.skipped.is_empty());

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    let email = &sent[0];
    assert_eq!(email.to, vec!["team@example.com"]);
    assert!(email.html.contains("Image Promotion Failed"));
    assert!(email.html.contains("<strong>Tagging Option:</strong> LATEST_PROMOTE"));
    let body = String::from_utf8_lossy(&email.attachments[0].body);
    assert!(body.contains("ERROR web: pull failed"));
}

#[traced_test]
#[tokio::test]
async fn test_missing_log_is_skipped_and_still_sent() {
    let mailer = Arc::new(MemoryMailer::new());
    let notifier = Notifier::new(mailer.clone(), "jenkins@localhost");

    let receipt = notifier
        .notify(&payload().with_log_file("/nonexistent/promote.log"))
        .await
        .expect("notify");

    assert!(receipt.attachments.is_empty());
    assert_eq!(receipt.skipped.len(), 1);
    assert_eq!(mailer.sent_count(), 1);
    assert!(logs_contain("log attachment skipped"));
    assert!(logs_contain("notification.sent"));
}

#[tokio::test]
async fn test_missing_template_still_delivers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mailer = Arc::new(MemoryMailer::new());
    let notifier = Notifier::new(mailer.clone(), "jenkins@localhost")
        .with_templates(Templates::from_dir(dir.path()));

    notifier.notify(&payload()).await.expect("notify");

    let sent = mailer.sent();
    assert_eq!(sent[0].html, "<h1>Error: Template email_failure.html not found!</h1>");
}

#[tokio::test]
async fn test_logo_file_is_inline_and_referenced_by_cid() {
    let dir = tempfile::tempdir().expect("tempdir");
    let logo = dir.path().join("logo.png");
    std::fs::write(&logo, [0x89, b'P', b'N', b'G']).expect("write logo");

    let mailer = Arc::new(MemoryMailer::new());
    let notifier = Notifier::new(mailer.clone(), "jenkins@localhost")
        .with_logo_url("https://example.com/logo.png")
        .with_logo_file(&logo);

    let receipt = notifier
        .notify(&payload().with_status(JobStatus::Success))
        .await
        .expect("notify");

    assert_eq!(receipt.attachments, vec!["logo.png"]);
    let email = &mailer.sent()[0];
    assert!(email.html.contains("src=\"cid:logo\""));
    assert!(!email.html.contains("https://example.com/logo.png"));
    assert_eq!(email.attachments[0].content_id.as_deref(), Some("logo"));
    assert_eq!(email.attachments[0].content_type, "image/png");
}

#[tokio::test]
async fn test_logo_url_used_without_file() {
    let mailer = Arc::new(MemoryMailer::new());
    let notifier = Notifier::new(mailer.clone(), "jenkins@localhost")
        .with_logo_url("https://example.com/logo.png");

    notifier.notify(&payload()).await.expect("notify");
    assert!(mailer.sent()[0].html.contains("https://example.com/logo.png"));
}

#[tokio::test]
async fn test_empty_recipients_is_an_error() {
    let mailer = Arc::new(MemoryMailer::new());
    let notifier = Notifier::new(mailer.clone(), "jenkins@localhost");

    let payload = NotificationPayload::from_results(results(), Vec::new(), metadata());
    let err = notifier.notify(&payload).await.unwrap_err();

    assert!(matches!(err, NotifyError::NoRecipients));
    assert_eq!(mailer.sent_count(), 0);
}

#[tokio::test]
async fn test_delivery_failure_is_returned() {
    let notifier = Notifier::new(Arc::new(MemoryMailer::failing("relay refused")), "jenkins@localhost");
    let err = notifier.notify(&payload()).await.unwrap_err();
    assert!(matches!(err, NotifyError::Transport(_)));
    assert!(err.to_string().contains("relay refused"));
}
