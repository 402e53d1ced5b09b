//! HTTP endpoint receiving notification postbacks.
//!
//! Senders POST `{"data": <payload>, "keys": <keys>}` where `keys` is an
//! account id or `{"accountId": .., "userId": ..}`. The handler turns that
//! into a single [`WebhookContainer::notify`] call.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::container::WebhookContainer;
use crate::signing::{PostbackVerifier, VerificationError};
use crate::telemetry::metric_inc;
use crate::types::{AccountId, Payload, UserId};

pub const DEFAULT_POSTBACK_PATH: &str = "/webhook";

/// State shared across all routes.
#[derive(Clone)]
pub struct HandlerState {
    pub container: WebhookContainer,
    pub verifier: Option<Arc<PostbackVerifier>>,
}

impl HandlerState {
    pub fn new(container: WebhookContainer) -> Self {
        Self {
            container,
            verifier: None,
        }
    }

    /// Require every postback to carry a valid signature.
    pub fn with_verifier(mut self, verifier: PostbackVerifier) -> Self {
        self.verifier = Some(Arc::new(verifier));
        self
    }
}

/// Who a postback is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PostbackKeys {
    Account(AccountId),
    Scoped {
        #[serde(rename = "accountId")]
        account_id: AccountId,
        #[serde(rename = "userId", default)]
        user_id: Option<UserId>,
    },
}

impl PostbackKeys {
    pub fn account_id(&self) -> &AccountId {
        match self {
            PostbackKeys::Account(account_id) => account_id,
            PostbackKeys::Scoped { account_id, .. } => account_id,
        }
    }

    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            PostbackKeys::Account(_) => None,
            PostbackKeys::Scoped { user_id, .. } => user_id.as_ref(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Postback {
    data: Payload,
    keys: PostbackKeys,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostbackResponse {
    pub status: String,
    pub notified: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub accounts: usize,
    pub users: usize,
}

/// Handler error type.
#[derive(Debug)]
pub enum AppError {
    /// Body is not a well-formed postback.
    BadRequest(String),
    /// Signature verification failed.
    Unauthorized(VerificationError),
}

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: bool,
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            AppError::Unauthorized(err) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", err.to_string()),
        };

        let body = ErrorResponse {
            error: true,
            code: code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("invalid postback: {}", err))
    }
}

/// Router serving postbacks on [`DEFAULT_POSTBACK_PATH`].
pub fn create_router(state: HandlerState) -> Router {
    create_router_at(DEFAULT_POSTBACK_PATH, state)
}

pub fn create_router_at(path: &str, state: HandlerState) -> Router {
    Router::new()
        .route(path, post(receive_postback))
        .route("/health", get(health_check))
        .with_state(state)
}

async fn receive_postback(
    State(state): State<HandlerState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<PostbackResponse>, AppError> {
    if let Some(verifier) = &state.verifier {
        let pairs = headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)));
        verifier.verify_now(pairs, &body).map_err(|err| {
            metric_inc("skyhooks.postback.rejected");
            tracing::warn!(error = %err, "rejected unsigned or mis-signed postback");
            AppError::Unauthorized(err)
        })?;
    }

    let postback: Postback = serde_json::from_slice(&body)?;
    tracing::info!(keys = ?postback.keys, "received webhook postback");

    let notified = state.container.notify(
        postback.keys.account_id(),
        postback.data,
        postback.keys.user_id(),
    );

    Ok(Json(PostbackResponse {
        status: "ok".to_string(),
        notified,
    }))
}

async fn health_check(State(state): State<HandlerState>) -> Json<HealthResponse> {
    let stats = state.container.stats();
    Json(HealthResponse {
        status: "ok".to_string(),
        accounts: stats.accounts,
        users: stats.users,
    })
}
