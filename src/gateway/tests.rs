use super::*;
use crate::config::RateLimitConfig;
use crate::llm::{LLMError, TextStream, POSTS_PER_BATCH};
use crate::prompt::templates::{HOOKS_HEADING, SECTION_DIVIDER};
use crate::ratelimit::MemoryCounterStore;
use async_trait::async_trait;
use futures::stream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const TOPIC: &str = "protein timing for muscle growth";

/// Records every prompt and replays a scripted response.
#[derive(Default)]
struct ScriptedModel {
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    chunks: Vec<Result<String, ()>>,
    refuse: bool,
}

impl ScriptedModel {
    fn answering(text: &str) -> Self {
        let mid = text.len() / 2;
        Self {
            chunks: vec![Ok(text[..mid].to_string()), Ok(text[mid..].to_string())],
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl CompletionService for ScriptedModel {
    async fn stream(&self, prompt: String) -> Result<TextStream, LLMError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt);
        if self.refuse {
            return Err(LLMError::Status {
                status: 529,
                body: "overloaded".into(),
            });
        }
        let items: Vec<Result<String, LLMError>> = self
            .chunks
            .iter()
            .map(|c| c.clone().map_err(|_| LLMError::Disconnected))
            .collect();
        Ok(stream::iter(items).boxed())
    }
}

fn valid_batch() -> String {
    let post = r#"{"content":"Eat protein.\n\nTrain hard.","rating":"8/10"}"#;
    format!(r#"{{"posts":[{}]}}"#, vec![post; POSTS_PER_BATCH].join(","))
}

fn gateway(model: Arc<ScriptedModel>) -> GenerationGateway {
    let limiter = RateLimiter::new(Arc::new(MemoryCounterStore::new()), &RateLimitConfig::default());
    GenerationGateway::new(Arc::new(limiter), Arc::new(Corpus::builtin()), model)
}

fn user(id: &str) -> UserId {
    UserId::parse(id).unwrap()
}

fn hook_count(prompt: &str) -> usize {
    let start = prompt.find(HOOKS_HEADING).unwrap() + HOOKS_HEADING.len();
    let section = &prompt[start..];
    let section = &section[..section.find(SECTION_DIVIDER).unwrap()];
    section.matches("\n* ").count() + 1
}

#[tokio::test]
async fn fresh_user_is_admitted_and_stream_is_forwarded() {
    let model = Arc::new(ScriptedModel::answering(&valid_batch()));
    let gateway = gateway(model.clone());

    let generation = gateway
        .generate(Some(&user("new_user")), GenerationRequest::new(TOPIC))
        .await
        .unwrap();

    assert!(generation.quota.allowed);
    assert_eq!(generation.quota.remaining, 9);
    assert_eq!(model.calls(), 1);

    let prompt = model.last_prompt();
    assert!(prompt.contains(TOPIC));
    let hooks = hook_count(&prompt);
    assert!((14..=20).contains(&hooks), "sampled {hooks} hooks");

    let posts = collect_posts(generation.stream).await.unwrap();
    assert_eq!(posts.len(), POSTS_PER_BATCH);
    assert_eq!(posts[0].rating, 8);
}

#[tokio::test]
async fn chunks_arrive_unbuffered() {
    let model = Arc::new(ScriptedModel::answering("abcdef"));
    let generation = gateway(model)
        .generate(Some(&user("u1")), GenerationRequest::new(TOPIC))
        .await
        .unwrap();
    let chunks: Vec<String> = generation.stream.map(|c| c.unwrap()).collect().await;
    assert_eq!(chunks, vec!["abc", "def"]);
}

#[tokio::test]
async fn missing_identity_is_unauthorized() {
    let model = Arc::new(ScriptedModel::answering(&valid_batch()));
    let result = gateway(model.clone())
        .generate(None, GenerationRequest::new(TOPIC))
        .await;
    assert!(matches!(result, Err(AppError::Unauthorized)));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn eleventh_request_never_reaches_the_model() {
    let model = Arc::new(ScriptedModel::answering(&valid_batch()));
    let gateway = gateway(model.clone());
    let heavy = user("heavy_user");

    for _ in 0..10 {
        gateway
            .generate(Some(&heavy), GenerationRequest::new(TOPIC))
            .await
            .unwrap();
    }
    let calls_before = model.calls();

    match gateway.generate(Some(&heavy), GenerationRequest::new(TOPIC)).await {
        Err(AppError::QuotaExceeded(decision)) => {
            assert_eq!(decision.remaining, 0);
            assert_eq!(decision.limit, 10);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("eleventh request admitted"),
    }
    assert_eq!(model.calls(), calls_before);
}

#[tokio::test]
async fn invalid_topic_is_rejected_after_admission() {
    let model = Arc::new(ScriptedModel::answering(&valid_batch()));
    let gateway = gateway(model.clone());
    let caller = user("sloppy");

    let result = gateway
        .generate_from_body(Some(&caller), br#"{"topic": "   "}"#)
        .await;
    assert!(matches!(result, Err(AppError::InvalidInput { field: "topic", .. })));
    assert_eq!(model.calls(), 0);

    // the rejected attempt still used a slot
    let next = gateway
        .generate(Some(&caller), GenerationRequest::new(TOPIC))
        .await
        .unwrap();
    assert_eq!(next.quota.remaining, 8);
}

#[tokio::test]
async fn prior_selections_reach_the_prompt() {
    let model = Arc::new(ScriptedModel::answering(&valid_batch()));
    let request = GenerationRequest::new(TOPIC)
        .with_prior_selections(vec!["A post the user loved.".into()]);
    gateway(model.clone())
        .generate(Some(&user("fan")), request)
        .await
        .unwrap();
    assert!(model.last_prompt().contains("A post the user loved."));
}

#[tokio::test]
async fn model_refusal_keeps_the_slot_consumed() {
    let model = Arc::new(ScriptedModel {
        refuse: true,
        ..ScriptedModel::default()
    });
    let limiter = Arc::new(RateLimiter::new(
        Arc::new(MemoryCounterStore::new()),
        &RateLimitConfig::default(),
    ));
    let gateway = GenerationGateway::new(limiter.clone(), Arc::new(Corpus::builtin()), model.clone());
    let caller = user("unlucky");

    let result = gateway.generate(Some(&caller), GenerationRequest::new(TOPIC)).await;
    assert!(matches!(result, Err(AppError::UpstreamGeneration(_))));
    assert_eq!(model.calls(), 1);

    // one slot for the failed attempt, one for this probe
    assert_eq!(limiter.admit(&caller).await.unwrap().remaining, 8);
}

#[tokio::test]
async fn mid_stream_failure_is_terminal_error() {
    let model = Arc::new(ScriptedModel {
        chunks: vec![Ok("{\"posts\":[".into()), Err(())],
        ..ScriptedModel::default()
    });
    let generation = gateway(model)
        .generate(Some(&user("u2")), GenerationRequest::new(TOPIC))
        .await
        .unwrap();
    assert!(matches!(
        collect_posts(generation.stream).await,
        Err(AppError::UpstreamGeneration(_))
    ));
}

#[tokio::test]
async fn malformed_model_output_is_upstream_failure() {
    let model = Arc::new(ScriptedModel::answering("<posts><post>nope</post></posts>"));
    let generation = gateway(model)
        .generate(Some(&user("u3")), GenerationRequest::new(TOPIC))
        .await
        .unwrap();
    assert!(matches!(
        collect_posts(generation.stream).await,
        Err(AppError::UpstreamGeneration(_))
    ));
}

#[test]
fn decodes_current_and_legacy_field_names() {
    let current = GenerationRequest::from_json(
        br#"{"topic":"sleep","priorSelections":["one","two"]}"#,
    )
    .unwrap();
    assert_eq!(current.topic, "sleep");
    assert_eq!(current.prior_selections, vec!["one", "two"]);

    let legacy =
        GenerationRequest::from_json(br#"{"userInput":"sleep","selectedPosts":"a favourite"}"#)
            .unwrap();
    assert_eq!(legacy.topic, "sleep");
    assert_eq!(legacy.prior_selections, vec!["a favourite"]);
}

#[test]
fn unwraps_prompt_envelope_once() {
    let body = br#"{"prompt":"{\"userInput\":\"hydration\"}"}"#;
    assert_eq!(GenerationRequest::from_json(body).unwrap().topic, "hydration");

    let bad = br#"{"prompt":"not json"}"#;
    assert!(matches!(
        GenerationRequest::from_json(bad),
        Err(AppError::InvalidInput { field: "prompt", .. })
    ));
}

#[test]
fn decode_errors_name_the_field() {
    let field_of = |raw: &[u8]| match GenerationRequest::from_json(raw) {
        Err(AppError::InvalidInput { field, .. }) => field,
        other => panic!("expected InvalidInput, got {other:?}"),
    };
    assert_eq!(field_of(b"not json"), "body");
    assert_eq!(field_of(b"[1,2]"), "body");
    assert_eq!(field_of(br#"{}"#), "topic");
    assert_eq!(field_of(br#"{"topic":42}"#), "topic");
    assert_eq!(field_of(br#"{"topic":""}"#), "topic");
    assert_eq!(field_of(br#"{"topic":"x","priorSelections":[1]}"#), "priorSelections");
    assert_eq!(field_of(br#"{"topic":"x","priorSelections":{}}"#), "priorSelections");

    let long = format!(r#"{{"topic":"{}"}}"#, "a".repeat(MAX_TOPIC_CHARS + 1));
    assert_eq!(field_of(long.as_bytes()), "topic");
}
