use super::{CompletionService, LLMError, TextStream};
use crate::config::GenerationConfig;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const API_VERSION: &str = "2023-06-01";

#[derive(Serialize, Debug)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize, Debug)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
    messages: Vec<Message<'a>>,
}

/// Streaming client for the Anthropic Messages API.
pub struct AnthropicClient {
    client: Client,
    config: GenerationConfig,
}

impl AnthropicClient {
    pub fn new(config: GenerationConfig) -> Result<Self, LLMError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LLMError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl CompletionService for AnthropicClient {
    #[instrument(skip(self, prompt), fields(model = %self.config.model, prompt_len = prompt.len()))]
    async fn stream(&self, prompt: String) -> Result<TextStream, LLMError> {
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream: true,
            messages: vec![Message {
                role: "user",
                content: &prompt,
            }],
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            warn!(status = status.as_u16(), "generation request rejected");
            return Err(LLMError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!("generation stream opened");
        let bytes = response.bytes_stream().map(|chunk| chunk.map_err(LLMError::from));
        Ok(decode_event_stream(bytes.boxed()))
    }
}

/// One server-sent event, `event:` and `data:` lines already joined.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental SSE framer. Bytes go in as they arrive from the socket;
/// complete events come out once their terminating blank line is seen.
#[derive(Default)]
pub(crate) struct SseDecoder {
    buffer: BytesMut,
    current: Option<SseEvent>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line = self.buffer.split_to(pos + 1);
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(&['\n', '\r'][..]);
            self.feed_line(line, &mut events);
        }
        events
    }

    fn feed_line(&mut self, line: &str, events: &mut Vec<SseEvent>) {
        if line.is_empty() {
            if let Some(event) = self.current.take() {
                events.push(event);
            }
            return;
        }
        if line.starts_with(':') {
            return;
        }
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        let event = self.current.get_or_insert_with(SseEvent::default);
        match field {
            "event" => event.event = Some(value.to_string()),
            "data" => {
                if !event.data.is_empty() {
                    event.data.push('\n');
                }
                event.data.push_str(value);
            }
            _ => {}
        }
    }
}

#[derive(Deserialize)]
struct Delta {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Frame {
    ContentBlockDelta { delta: Delta },
    MessageStop,
    Error { error: ErrorBody },
    #[serde(other)]
    Other,
}

enum Step {
    Text(String),
    Stop,
    Fail(LLMError),
    Skip,
}

fn interpret(event: SseEvent) -> Step {
    if event.data.is_empty() {
        return Step::Skip;
    }
    match serde_json::from_str::<Frame>(&event.data) {
        Ok(Frame::ContentBlockDelta { delta }) if delta.kind == "text_delta" => {
            Step::Text(delta.text)
        }
        Ok(Frame::ContentBlockDelta { .. }) | Ok(Frame::Other) => Step::Skip,
        Ok(Frame::MessageStop) => Step::Stop,
        Ok(Frame::Error { error }) => Step::Fail(LLMError::Upstream(error.message)),
        Err(e) => Step::Fail(LLMError::Decode(e.to_string())),
    }
}

struct DecodeState {
    body: BoxStream<'static, Result<Bytes, LLMError>>,
    decoder: SseDecoder,
    queued: VecDeque<Result<String, LLMError>>,
    finished: bool,
}

/// Turns a raw SSE byte stream into text deltas. The stream ends cleanly on
/// `message_stop`; any other ending yields a single terminal error.
pub(crate) fn decode_event_stream(body: BoxStream<'static, Result<Bytes, LLMError>>) -> TextStream {
    let state = DecodeState {
        body,
        decoder: SseDecoder::default(),
        queued: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.queued.pop_front() {
                if item.is_err() {
                    st.finished = true;
                    st.queued.clear();
                }
                return Some((item, st));
            }
            if st.finished {
                return None;
            }
            match st.body.next().await {
                Some(Ok(bytes)) => {
                    for event in st.decoder.push(&bytes) {
                        match interpret(event) {
                            Step::Text(text) if text.is_empty() => {}
                            Step::Text(text) => st.queued.push_back(Ok(text)),
                            Step::Skip => {}
                            Step::Stop => {
                                st.finished = true;
                                break;
                            }
                            Step::Fail(err) => {
                                st.queued.push_back(Err(err));
                                break;
                            }
                        }
                    }
                }
                Some(Err(err)) => st.queued.push_back(Err(err)),
                None => st.queued.push_back(Err(LLMError::Disconnected)),
            }
        }
    })
    .boxed()
}
