use super::state::AppState;
use crate::error::{quota_headers, AppError};
use crate::llm::contract::MAX_RATING;
use crate::store::{DeleteOutcome, SavedPost, SavedPostId};
use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Streams model output as plain text while it is generated.
pub async fn generate_posts_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let caller = state.identify(&headers);
    let generation = state.gateway.generate_from_body(caller.as_ref(), &body).await?;

    let request_id = generation.request_id;
    let chunks = generation.stream.map(move |chunk| {
        if let Err(err) = &chunk {
            warn!(%request_id, error = %err, "generation stream aborted");
        }
        chunk
    });

    let mut response = Response::new(Body::from_stream(chunks));
    let response_headers = response.headers_mut();
    response_headers.extend(quota_headers(&generation.quota));
    response_headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    Ok(response)
}

pub async fn list_saved_posts_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<SavedPost>>, AppError> {
    let owner = state.require_user(&headers)?;
    let posts = state.store.list_saved_posts(&owner).await?;
    Ok(Json(posts))
}

#[derive(Deserialize)]
struct CreateSavedPost {
    body: String,
    #[serde(default)]
    rating: Option<u8>,
}

pub async fn create_saved_post_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let owner = state.require_user(&headers)?;

    let payload: CreateSavedPost = serde_json::from_slice(&body)
        .map_err(|e| AppError::invalid("body", format!("expected {{\"body\", \"rating\"}} ({e})")))?;
    if payload.body.trim().is_empty() {
        return Err(AppError::invalid("body", "must not be empty"));
    }
    if payload.rating.is_some_and(|r| r > MAX_RATING) {
        return Err(AppError::invalid("rating", format!("must be 0-{MAX_RATING}")));
    }

    let saved = state
        .store
        .create_saved_post(&owner, &payload.body, payload.rating)
        .await?;
    info!(owner = %owner, id = saved.id, "saved post created");
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn delete_saved_post_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<SavedPostId>,
) -> Result<StatusCode, AppError> {
    let owner = state.require_user(&headers)?;
    match state.store.delete_saved_post(&owner, id).await? {
        DeleteOutcome::Deleted => Ok(StatusCode::NO_CONTENT),
        DeleteOutcome::NotFound => Err(AppError::NotFound),
        DeleteOutcome::Forbidden => Err(AppError::Forbidden),
    }
}
