//! # Generation service
//!
//! The language model is an external collaborator reached through the
//! [`CompletionService`] trait. It receives one prompt and answers with a
//! stream of text chunks that the gateway forwards to the caller as they
//! arrive.
//!
//! - `anthropic`: streaming client for the Messages API (server-sent events)
//! - `contract`: strict parser for the one output shape the prompt asks for
//!
//! ```text
//! prompt → CompletionService::stream → TextStream → caller → contract::parse_post_batch
//! ```

pub mod anthropic;
pub mod contract;

use async_trait::async_trait;
use futures::stream::BoxStream;

pub use anthropic::AnthropicClient;
pub use contract::{parse_post_batch, ContractError, Post, POSTS_PER_BATCH};

/// Incremental model output. The stream ends after the last chunk, or with
/// exactly one error item when the upstream fails mid-way.
pub type TextStream = BoxStream<'static, Result<String, LLMError>>;

#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("generation service answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("generation service timed out")]
    Timeout,

    #[error("could not reach generation service: {0}")]
    Transport(String),

    #[error("generation service reported an error: {0}")]
    Upstream(String),

    #[error("generation stream ended before completion")]
    Disconnected,

    #[error("unreadable event from generation service: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for LLMError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LLMError::Timeout
        } else if let Some(status) = err.status() {
            LLMError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            LLMError::Transport(err.to_string())
        }
    }
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Starts one generation. Resolves once the upstream accepted the
    /// request; chunks then arrive through the returned stream.
    async fn stream(&self, prompt: String) -> Result<TextStream, LLMError>;
}
