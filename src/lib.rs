pub mod config;
pub mod corpus;
pub mod error;
pub mod favorites;
pub mod gateway;
pub mod http;
pub mod identity;
pub mod llm;
pub mod prompt;
pub mod ratelimit;
pub mod store;

use anyhow::Context;
use config::{Config, IdentityMode};
use corpus::Corpus;
use gateway::GenerationGateway;
use http::AppState;
use identity::{ForwardedIdentity, IdentityProvider, TokenIdentity};
use llm::{AnthropicClient, CompletionService};
use ratelimit::{CounterStore, MemoryCounterStore, RateLimiter, RedisCounterStore};
use std::sync::Arc;
use std::time::Duration;
use store::{file::FileStore, SavedPostStore};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "hookline=info,hookline_lib=info";

pub async fn run() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    fmt().with_env_filter(filter).init();

    let config = Config::load().context("loading configuration")?;
    info!(?config, "configuration loaded");

    let state = build_state(&config).await?;
    http::serve(state, &config.server).await
}

pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let counters: Arc<dyn CounterStore> = match &config.rate_limit.redis_url {
        Some(url) => {
            let timeout = Duration::from_millis(config.rate_limit.store_timeout_ms);
            let store = RedisCounterStore::connect(url, timeout)
                .await
                .context("connecting to the rate-limit store")?;
            info!("rate limiting backed by redis");
            Arc::new(store)
        }
        None => {
            warn!("no redis_url configured; rate limits are per process and reset on restart");
            Arc::new(MemoryCounterStore::new())
        }
    };
    let limiter = Arc::new(RateLimiter::new(counters, &config.rate_limit));

    let corpus = match &config.corpus.path {
        Some(path) => Corpus::from_toml_file(path).context("loading corpus")?,
        None => Corpus::builtin(),
    };
    info!(
        hooks = corpus.hooks.len(),
        examples = corpus.examples.len(),
        "corpus ready"
    );

    let model: Arc<dyn CompletionService> = Arc::new(
        AnthropicClient::new(config.generation.clone()).context("building generation client")?,
    );
    let gateway = GenerationGateway::new(limiter, Arc::new(corpus), model);

    std::fs::create_dir_all(&config.storage.data_dir).with_context(|| {
        format!("creating data dir {}", config.storage.data_dir.display())
    })?;
    let saved_posts = FileStore::open(&config.storage.saved_posts_log())
        .context("opening saved-post log")?;
    let store: Arc<dyn SavedPostStore> = Arc::new(saved_posts);

    let identity: Arc<dyn IdentityProvider> = match config.identity.mode {
        IdentityMode::Forwarded => Arc::new(ForwardedIdentity),
        IdentityMode::Tokens => Arc::new(TokenIdentity::new(&config.identity.tokens)),
    };

    Ok(AppState {
        gateway: Arc::new(gateway),
        store,
        identity,
    })
}
