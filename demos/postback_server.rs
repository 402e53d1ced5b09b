use std::sync::Arc;

use skyhooks::handler::{create_router, HandlerState};
use skyhooks::{CallbackHandle, ContainerConfig, InMemoryPointerStore, PostbackVerifier, WebhookContainer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let listen = std::env::var("SKYHOOKS_LISTEN").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let container = WebhookContainer::new(ContainerConfig::default(), Arc::new(InMemoryPointerStore::new()))?;

    container.register(
        &"acct1".into(),
        CallbackHandle::new(|payload| info!(%payload, "acct1 callback fired")),
        "http://localhost/hook",
        None,
    );

    let mut state = HandlerState::new(container);
    if let Ok(secret) = std::env::var("SKYHOOKS_SECRET") {
        state = state.with_verifier(PostbackVerifier::new(secret));
    }

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    info!("postback endpoint listening on {}", listen);
    axum::serve(listener, create_router(state)).await?;

    Ok(())
}
