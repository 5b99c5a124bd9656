//! Chat completion handler.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pandaverse_types::ChatReply;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::response;
use crate::server::AppState;

pub const MESSAGE_REQUIRED: &str = "Message is required";

/// POST /api/chat
///
/// Body: `{"message": "...", "model"?: "...", "provider"?: "..."}`.
///
/// The body is inspected as raw JSON so that a missing, null, non-string, or
/// empty `message` is reported as 400 rather than a deserialization error.
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            debug!(%rejection, "Rejected unreadable chat body");
            return response::bad_request(MESSAGE_REQUIRED).into_response();
        }
    };

    let Some(message) = body
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
    else {
        return response::bad_request(MESSAGE_REQUIRED).into_response();
    };
    let model = body.get("model").and_then(Value::as_str);
    let provider = body.get("provider").and_then(Value::as_str);

    let route = state.router.resolve(model, provider);
    info!(?route, message_len = message.len(), "Chat API request");

    match state.router.dispatch(&route, message.to_string()).await {
        Ok(reply) => {
            debug!(reply_len = reply.len(), "Chat API response");
            (StatusCode::OK, Json(ChatReply { reply })).into_response()
        }
        Err(e) => {
            error!(error = %e, ?route, "Chat API error");
            response::internal_error(e.user_message()).into_response()
        }
    }
}
