//! # Generation gateway
//!
//! Orchestrates one generation request, in this order:
//!
//! ```text
//! identity? → RateLimiter::admit → validate topic → sample corpus
//!           → PromptBuilder::build → CompletionService::stream → caller
//! ```
//!
//! Admission comes before validation, so a malformed request still costs a
//! slot. Quota counts attempts: a failed or abandoned stream does not give
//! the slot back.

pub mod request;

pub use request::{GenerationRequest, MAX_TOPIC_CHARS};

use crate::corpus::{Corpus, SampledCorpus, Sampler};
use crate::error::AppError;
use crate::identity::UserId;
use crate::llm::{parse_post_batch, CompletionService, Post};
use crate::prompt::{render_prior_selections, PromptBuilder};
use crate::ratelimit::{RateLimitDecision, RateLimiter};
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use tracing::{debug, field, info, instrument, warn, Span};
use uuid::Uuid;

pub type GenerationStream = BoxStream<'static, Result<String, AppError>>;

/// An admitted, running generation.
pub struct Generation {
    pub request_id: Uuid,
    pub quota: RateLimitDecision,
    pub stream: GenerationStream,
}

pub struct GenerationGateway {
    limiter: Arc<RateLimiter>,
    corpus: Arc<Corpus>,
    sampler: Sampler,
    prompts: PromptBuilder,
    model: Arc<dyn CompletionService>,
}

impl GenerationGateway {
    pub fn new(
        limiter: Arc<RateLimiter>,
        corpus: Arc<Corpus>,
        model: Arc<dyn CompletionService>,
    ) -> Self {
        Self {
            limiter,
            corpus,
            sampler: Sampler::default(),
            prompts: PromptBuilder::default(),
            model,
        }
    }

    pub fn with_prompt_builder(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub async fn generate(
        &self,
        identity: Option<&UserId>,
        request: GenerationRequest,
    ) -> Result<Generation, AppError> {
        self.run(identity, move || Ok(request)).await
    }

    /// Like [`generate`](Self::generate), but decodes the raw body only
    /// after the caller has been admitted.
    pub async fn generate_from_body(
        &self,
        identity: Option<&UserId>,
        body: &[u8],
    ) -> Result<Generation, AppError> {
        self.run(identity, || GenerationRequest::from_json(body)).await
    }

    #[instrument(skip_all, fields(request_id = field::Empty, user = field::Empty))]
    async fn run<F>(&self, identity: Option<&UserId>, decode: F) -> Result<Generation, AppError>
    where
        F: FnOnce() -> Result<GenerationRequest, AppError>,
    {
        let request_id = Uuid::new_v4();
        Span::current().record("request_id", field::display(request_id));

        let user = identity.ok_or(AppError::Unauthorized)?;
        Span::current().record("user", field::display(user));

        let quota = self.limiter.admit(user).await?;
        if !quota.allowed {
            info!(limit = quota.limit, reset_at_ms = quota.reset_at_ms, "quota exceeded");
            return Err(AppError::QuotaExceeded(quota));
        }

        let request = decode()?;
        request.validate()?;

        let sampled = self.sample();
        let prior = render_prior_selections(&request.prior_selections);
        let prompt = self
            .prompts
            .build(&request.topic, &sampled.hooks, &sampled.examples, prior.as_deref());
        debug!(topic = %request.topic, prompt_len = prompt.len(), "prompt assembled");

        let stream = self.model.stream(prompt).await.map_err(|e| {
            warn!(error = %e, "generation service refused the request");
            AppError::from(e)
        })?;

        info!(remaining = quota.remaining, "generation started");
        Ok(Generation {
            request_id,
            quota,
            stream: stream.map(|chunk| chunk.map_err(AppError::from)).boxed(),
        })
    }

    // Fresh thread-local randomness per request; the rng never crosses an await.
    fn sample(&self) -> SampledCorpus {
        let mut rng = rand::thread_rng();
        self.corpus.sample(&self.sampler, &mut rng)
    }
}

/// Buffers a finished stream and parses the post batch out of it.
pub async fn collect_posts(mut stream: GenerationStream) -> Result<Vec<Post>, AppError> {
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        text.push_str(&chunk?);
    }
    Ok(parse_post_batch(&text)?)
}

#[cfg(test)]
mod tests;
