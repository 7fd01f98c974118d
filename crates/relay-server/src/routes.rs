use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use relay_core::{
    ALL_LIMITED_MESSAGE, DispatchResult, ErrorBody, GenerateResponse, RateLimitedBody,
    RelayError,
};
use relay_dispatch::{Dispatcher, ModelClient};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

pub const HEALTH_ROUTE: &str = "/api/health";
pub const METHOD_NOT_ALLOWED_MESSAGE: &str = "Method not allowed";
pub const MALFORMED_PROMPT_MESSAGE: &str = "Missing or invalid \"prompt\".";

/// Build the relay router: the generation endpoint at `route` (POST only)
/// plus a health probe.
pub fn router<C: ModelClient + 'static>(dispatcher: Arc<Dispatcher<C>>, route: &str) -> Router {
    Router::new()
        .route(route, post(generate::<C>).fallback(method_not_allowed))
        .route(HEALTH_ROUTE, get(health::<C>))
        .with_state(dispatcher)
}

async fn generate<C: ModelClient + 'static>(
    State(dispatcher): State<Arc<Dispatcher<C>>>,
    body: Bytes,
) -> Response {
    let prompt = match extract_prompt(&body) {
        Ok(prompt) => prompt,
        Err(error) => {
            warn!(bytes = body.len(), error = %error, "Rejecting generation request");
            return error_response(StatusCode::BAD_REQUEST, MALFORMED_PROMPT_MESSAGE);
        }
    };
    info!(prompt_chars = prompt.len(), "Received generation request");

    let result = dispatcher.dispatch(&prompt).await;
    debug!(outcome = result.kind(), "Dispatch finished");
    dispatch_response(result)
}

/// Map one dispatch outcome onto the wire contract.
fn dispatch_response(result: DispatchResult) -> Response {
    match result {
        DispatchResult::Ok { text } => {
            (StatusCode::OK, Json(GenerateResponse { text })).into_response()
        }
        DispatchResult::AllLimited {
            retry_after_seconds,
        } => (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, retry_after_seconds.to_string())],
            Json(RateLimitedBody {
                error: ALL_LIMITED_MESSAGE.to_string(),
                retry_delay: retry_after_seconds,
            }),
        )
            .into_response(),
        DispatchResult::Error { message } => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, message)
        }
    }
}

/// The body's `prompt` field, which must be a non-empty string.
fn extract_prompt(body: &[u8]) -> Result<String, RelayError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| RelayError::MalformedRequest(format!("body is not JSON: {e}")))?;
    let prompt = value
        .get("prompt")
        .ok_or_else(|| RelayError::MalformedRequest("\"prompt\" is missing".into()))?
        .as_str()
        .ok_or_else(|| RelayError::MalformedRequest("\"prompt\" is not a string".into()))?;
    if prompt.is_empty() {
        return Err(RelayError::MalformedRequest("\"prompt\" is empty".into()));
    }
    Ok(prompt.to_string())
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST")],
        Json(ErrorBody {
            error: METHOD_NOT_ALLOWED_MESSAGE.to_string(),
        }),
    )
        .into_response()
}

async fn health<C: ModelClient + 'static>(
    State(dispatcher): State<Arc<Dispatcher<C>>>,
) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "credentials": dispatcher.pool().len(),
    }))
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
