//! JSON endpoints.

pub mod error;

use axum::{Json, Router, extract::State, routing::post};
use bytes::Bytes;
use serde::Serialize;

use crate::application::comments::CommentPayload;

use self::error::ApiError;
use super::HttpState;

#[derive(Debug, Serialize)]
pub struct CommentCreated {
    pub message: &'static str,
    pub id: String,
}

pub fn build_api_router() -> Router<HttpState> {
    Router::new().route("/api/createComment", post(create_comment))
}

/// `POST /api/createComment`. The body is parsed as JSON whatever its
/// declared content type; browsers posting a bare string send `text/plain`.
async fn create_comment(
    State(state): State<HttpState>,
    body: Bytes,
) -> Result<Json<CommentCreated>, ApiError> {
    let payload: CommentPayload = serde_json::from_slice(&body).map_err(|err| {
        ApiError::bad_request(
            "Request body must be a JSON object",
            Some(err.to_string()),
        )
    })?;

    let id = state.comments.submit(payload).await?;

    Ok(Json(CommentCreated {
        message: "Comment submitted",
        id,
    }))
}
