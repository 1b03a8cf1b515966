use crate::llm::{ContractError, LLMError};
use crate::ratelimit::{RateLimitDecision, RateLimitError};
use crate::store::StoreError;
use axum::{
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

pub const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

const RETRY_LATER: &str = "Something went wrong on our side. Please try again in a moment.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Quota exceeded: {} of {} requests left", .0.remaining, .0.limit)]
    QuotaExceeded(RateLimitDecision),

    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("Generation failed: {0}")]
    UpstreamGeneration(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Not found")]
    NotFound,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl AppError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        AppError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::QuotaExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            AppError::UpstreamGeneration(_) => StatusCode::BAD_GATEWAY,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// `X-RateLimit-*` headers for a decision, reset in epoch milliseconds.
pub fn quota_headers(decision: &RateLimitDecision) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(RATE_LIMIT_RESET, HeaderValue::from(decision.reset_at_ms));
    headers
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            AppError::QuotaExceeded(decision) => {
                let message = format!(
                    "Sorry, you can only generate {} batches of posts per day. {} left; try again after the reset time.",
                    decision.limit, decision.remaining
                );
                (status, quota_headers(&decision), Json(json!({ "message": message }))).into_response()
            }
            AppError::InvalidInput { field, reason } => {
                (status, Json(json!({ "error": format!("Invalid {field}: {reason}"), "field": field })))
                    .into_response()
            }
            AppError::UpstreamGeneration(detail) => {
                warn!(detail = %detail, "generation failure returned to caller");
                (status, Json(json!({ "error": RETRY_LATER }))).into_response()
            }
            AppError::StoreUnavailable(detail) => {
                error!(detail = %detail, "store failure returned to caller");
                (status, Json(json!({ "error": RETRY_LATER }))).into_response()
            }
            other => (status, Json(json!({ "error": other.to_string() }))).into_response(),
        }
    }
}

impl From<RateLimitError> for AppError {
    fn from(err: RateLimitError) -> Self {
        AppError::StoreUnavailable(err.to_string())
    }
}

impl From<LLMError> for AppError {
    fn from(err: LLMError) -> Self {
        AppError::UpstreamGeneration(err.to_string())
    }
}

impl From<ContractError> for AppError {
    fn from(err: ContractError) -> Self {
        AppError::UpstreamGeneration(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unauthorized => AppError::Unauthorized,
            StoreError::Rejected(reason) => AppError::invalid("request", reason),
            other => AppError::StoreUnavailable(other.to_string()),
        }
    }
}
