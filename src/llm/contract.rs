//! Output contract between the model and the caller.
//!
//! The prompt commits the model to a single JSON object:
//! `{ "posts": [ { "content": string, "rating": string|number }, ... ] }`
//! with exactly [`POSTS_PER_BATCH`] entries. Nothing else is accepted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const POSTS_PER_BATCH: usize = 9;
pub const MAX_RATING: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub content: String,
    pub rating: u8,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ContractError {
    #[error("model output is not valid JSON: {0}")]
    NotJson(String),

    #[error("model output is missing the \"posts\" array")]
    MissingPosts,

    #[error("expected {expected} posts, got {actual}")]
    WrongCount { expected: usize, actual: usize },

    #[error("post {index}: {reason}")]
    InvalidPost { index: usize, reason: String },
}

#[derive(Deserialize)]
struct RawBatch {
    posts: Option<Vec<RawPost>>,
}

#[derive(Deserialize)]
struct RawPost {
    content: Option<Value>,
    rating: Option<Value>,
}

pub fn parse_post_batch(text: &str) -> Result<Vec<Post>, ContractError> {
    let raw: RawBatch = serde_json::from_str(text.trim())
        .map_err(|e| ContractError::NotJson(e.to_string()))?;

    let posts = raw.posts.ok_or(ContractError::MissingPosts)?;
    if posts.len() != POSTS_PER_BATCH {
        return Err(ContractError::WrongCount {
            expected: POSTS_PER_BATCH,
            actual: posts.len(),
        });
    }

    posts
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            let invalid = |reason: &str| ContractError::InvalidPost {
                index,
                reason: reason.to_string(),
            };

            let content = match raw.content {
                Some(Value::String(s)) if !s.trim().is_empty() => s,
                Some(Value::String(_)) => return Err(invalid("content is empty")),
                _ => return Err(invalid("content must be a string")),
            };
            let rating = raw
                .rating
                .as_ref()
                .and_then(parse_rating)
                .ok_or_else(|| invalid("rating must be 0-10"))?;

            Ok(Post { content, rating })
        })
        .collect()
}

/// `8`, `"8"` and `"8/10"` are all the same rating.
fn parse_rating(value: &Value) -> Option<u8> {
    let n = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => {
            let s = s.trim();
            let digits = s.strip_suffix("/10").map(str::trim_end).unwrap_or(s);
            digits.parse::<u64>().ok()?
        }
        _ => return None,
    };
    u8::try_from(n).ok().filter(|r| *r <= MAX_RATING)
}
