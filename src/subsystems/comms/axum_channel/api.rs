//! Axum handlers.
//!
//! Each handler receives [`AxumState`] via [`axum::extract::State`] and
//! returns an axum [`Response`]. Every error body is `{"error": "<message>"}`.

use axum::{
    Json,
    body::Bytes,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error, warn};

use super::AxumState;

const IMAGE_FIELD: &str = "image";
const NO_IMAGE: &str = "No image provided";
const CHAT_FIELDS_REQUIRED: &str = "Message and predicted_class are required";

// ── Request types ─────────────────────────────────────────────────────────────

/// Fields stay untyped: any truthy JSON value is accepted and stringified.
#[derive(Deserialize)]
pub(super) struct ChatRequest {
    #[serde(default)]
    message: Value,
    #[serde(default)]
    predicted_class: Value,
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Build a JSON error response body.
fn json_error(msg: impl std::fmt::Display) -> Json<serde_json::Value> {
    Json(json!({ "error": format!("{msg}") }))
}

/// Text of a truthy JSON value; `None` for null, false, zero and empty values.
/// Strings are taken verbatim, anything else as its JSON text.
fn truthy_text(value: Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Array(a) if a.is_empty() => None,
        Value::Object(o) if o.is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// First non-empty `image` field: `(bytes, client file name)`.
async fn read_image_field(
    mut multipart: Multipart,
) -> Result<Option<(Bytes, Option<String>)>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        return Ok(Some((bytes, file_name)));
    }
    Ok(None)
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// POST /analyse/
pub(super) async fn analyse(
    State(state): State<AxumState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let multipart = match multipart {
        Ok(m) => m,
        Err(e) => {
            warn!(channel_id = %state.channel_id, "analyse: rejected body: {e}");
            return (StatusCode::BAD_REQUEST, json_error(NO_IMAGE)).into_response();
        }
    };

    let (image, file_name) = match read_image_field(multipart).await {
        Ok(Some(upload)) => upload,
        Ok(None) => {
            debug!(channel_id = %state.channel_id, "analyse: no image field");
            return (StatusCode::BAD_REQUEST, json_error(NO_IMAGE)).into_response();
        }
        Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            warn!(channel_id = %state.channel_id, "analyse: upload too large: {e}");
            return (StatusCode::PAYLOAD_TOO_LARGE, json_error(e.body_text())).into_response();
        }
        Err(e) => {
            warn!(channel_id = %state.channel_id, "analyse: malformed multipart: {e}");
            return (StatusCode::BAD_REQUEST, json_error(NO_IMAGE)).into_response();
        }
    };

    debug!(
        channel_id = %state.channel_id,
        bytes = image.len(),
        ?file_name,
        "analyse: received image"
    );

    match state.comms.analyse(image.clone(), file_name).await {
        Ok(analysis) => (
            StatusCode::OK,
            Json(json!({
                "predicted_class": analysis.prediction.label,
                "original_image": STANDARD.encode(&image),
                "segmented_image": STANDARD.encode(&analysis.segmented_png),
            })),
        )
            .into_response(),
        Err(e) => {
            error!(channel_id = %state.channel_id, error = %e, "analyse failed");
            (StatusCode::INTERNAL_SERVER_ERROR, json_error(e)).into_response()
        }
    }
}

/// POST /chatbot/
pub(super) async fn chatbot(
    State(state): State<AxumState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let req = match body {
        Ok(Json(req)) => req,
        Err(e) => {
            warn!(channel_id = %state.channel_id, "chatbot: rejected body: {e}");
            return (StatusCode::BAD_REQUEST, json_error(CHAT_FIELDS_REQUIRED)).into_response();
        }
    };

    let message = truthy_text(req.message);
    let predicted_class = truthy_text(req.predicted_class);
    let (Some(message), Some(predicted_class)) = (message, predicted_class) else {
        return (StatusCode::BAD_REQUEST, json_error(CHAT_FIELDS_REQUIRED)).into_response();
    };

    match state.comms.chat(message, predicted_class).await {
        Ok(reply) => (StatusCode::OK, Json(json!({ "response": reply }))).into_response(),
        Err(e) => {
            error!(channel_id = %state.channel_id, error = %e, "chatbot failed");
            (StatusCode::INTERNAL_SERVER_ERROR, json_error(e)).into_response()
        }
    }
}

/// GET /health/
pub(super) async fn health(State(state): State<AxumState>) -> Response {
    let (healthy, subsystems) = state.comms.health().await;
    (
        StatusCode::OK,
        Json(json!({
            "healthy": healthy,
            "records": state.comms.records_enabled(),
            "subsystems": subsystems,
        })),
    )
        .into_response()
}
