use std::sync::Arc;

use serde_json::json;
use skyhooks::{AccountId, CallbackHandle, ContainerConfig, InMemoryPointerStore, WebhookContainer};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = Arc::new(InMemoryPointerStore::new());
    let container = WebhookContainer::new(ContainerConfig::default(), store)
        .expect("running inside a tokio runtime");

    let account: AccountId = "5f2b6c1e9d3a4b7c8e0f1a2b".into();
    let callback = CallbackHandle::new(|payload| println!("notified: {payload}"));

    if let Err(err) = container
        .register(&account, callback.clone(), "https://example.com/hook", None)
        .await
    {
        eprintln!("pointer not persisted: {err}");
    }

    let notified = container.notify(&account, json!({"id": 123}), None);
    println!("anyone notified: {notified}");

    // Let the scheduled callback run before tearing down.
    tokio::task::yield_now().await;

    if let Some(signal) = container.unregister(&account, &callback, "https://example.com/hook", None) {
        let _ = signal.await;
    }
}
