use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use skyhooks::handler::{create_router, HandlerState};
use skyhooks::{
    CallbackHandle, ContainerConfig, InMemoryPointerStore, ManualScheduler, PostbackVerifier, WebhookContainer,
};
use tower::ServiceExt;

fn setup() -> (WebhookContainer, Arc<ManualScheduler>) {
    let scheduler = Arc::new(ManualScheduler::new());
    let container = WebhookContainer::with_scheduler(
        ContainerConfig::default(),
        Arc::new(InMemoryPointerStore::new()),
        scheduler.clone(),
    )
    .unwrap();
    (container, scheduler)
}

async fn post(app: Router, body: &str, headers: &[(String, String)]) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json");
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }

    let response = app
        .oneshot(request.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn postback_notifies_registered_account() {
    let (container, scheduler) = setup();
    container.register(&"acct1".into(), CallbackHandle::new(|_| {}), "http://x/hook", None);
    let app = create_router(HandlerState::new(container));

    let (status, body) = post(app, r#"{"data": {"v": 1}, "keys": "acct1"}"#, &[]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "notified": true}));
    assert_eq!(scheduler.pending(), 1);
}

#[tokio::test]
async fn postback_without_subscribers_still_succeeds() {
    let (container, scheduler) = setup();
    let app = create_router(HandlerState::new(container));

    let (status, body) = post(app, r#"{"data": 1, "keys": "acct1"}"#, &[]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "notified": false}));
    assert_eq!(scheduler.pending(), 0);
}

#[tokio::test]
async fn postback_after_unregister_reports_nobody_notified() {
    let (container, scheduler) = setup();
    let cb = CallbackHandle::new(|_| {});
    container.register(&"acct1".into(), cb.clone(), "http://x/hook", None);
    container.unregister(&"acct1".into(), &cb, "http://x/hook", None);
    let app = create_router(HandlerState::new(container));

    let (status, body) = post(app, r#"{"data": {"v": 2}, "keys": "acct1"}"#, &[]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "notified": false}));
    assert_eq!(scheduler.pending(), 0);
}

#[tokio::test]
async fn compound_keys_reach_user_bucket() {
    let (container, scheduler) = setup();
    container.register(&"acct1".into(), CallbackHandle::new(|_| {}), "http://x/hook", Some(&"user1".into()));
    let app = create_router(HandlerState::new(container));

    let (status, _) = post(
        app,
        r#"{"data": "x", "keys": {"accountId": "acct1", "userId": "user1"}}"#,
        &[],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(scheduler.pending(), 2);
}

#[tokio::test]
async fn malformed_postback_is_rejected_before_notify() {
    let (container, scheduler) = setup();
    container.register(&"acct1".into(), CallbackHandle::new(|_| {}), "http://x/hook", None);
    let app = create_router(HandlerState::new(container));

    let (status, body) = post(app.clone(), r#"{"keys": "acct1"}"#, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    let (status, _) = post(app, r#"{"data": 1}"#, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(scheduler.pending(), 0);
}

#[tokio::test]
async fn signed_postbacks_are_verified() {
    let (container, scheduler) = setup();
    container.register(&"acct1".into(), CallbackHandle::new(|_| {}), "http://x/hook", None);
    let verifier = PostbackVerifier::new("s3cret");
    let app = create_router(HandlerState::new(container).with_verifier(verifier.clone()));

    let body = r#"{"data": 1, "keys": "acct1"}"#;
    let (status, response) = post(app.clone(), body, &[]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(response["code"], "UNAUTHORIZED");
    assert_eq!(scheduler.pending(), 0);

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let signed = verifier.sign(body.as_bytes(), now);
    let (status, response) = post(app, body, &signed).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["notified"], true);
    assert_eq!(scheduler.pending(), 1);
}

#[tokio::test]
async fn health_reports_bucket_counts() {
    let (container, _) = setup();
    container.register(&"acct1".into(), CallbackHandle::new(|_| {}), "http://x/hook", Some(&"u1".into()));
    let app = create_router(HandlerState::new(container));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({"status": "ok", "accounts": 1, "users": 1}));
}
