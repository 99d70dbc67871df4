//! OpenAI Chat Completions API driver.
//!
//! This module implements the [`LlmDriver`] trait for the OpenAI Chat Completions
//! API (`/v1/chat/completions`), supporting streaming responses and tool calls.

use std::collections::BTreeMap;

use anyhow::Context;
use futures::{Stream, StreamExt};

use crate::normalized::NormalizedEvent;

use super::{LlmDriver, LlmRequest, LlmSettings};

/// Accumulated state for a streaming tool call.
#[derive(Debug, Default)]
struct ToolAccum {
    id: Option<String>,
    name: Option<String>,
    args: String,
}

/// Turns `data:` payloads of a Chat Completions SSE stream into events.
#[derive(Debug, Default)]
struct ChunkParser {
    tool_accum: BTreeMap<usize, ToolAccum>,
    tool_calls_emitted: bool,
}

impl ChunkParser {
    fn feed(&mut self, data: &str) -> anyhow::Result<Vec<NormalizedEvent>> {
        let mut events = Vec::new();

        if data == "[DONE]" {
            events.extend(self.finish());
            events.push(NormalizedEvent::Done);
            return Ok(events);
        }

        let v: serde_json::Value =
            serde_json::from_str(data).context("invalid chat completion chunk")?;
        let choice = &v["choices"][0];
        let delta = &choice["delta"];

        // Assistant text delta
        if let Some(s) = delta.get("content").and_then(|x| x.as_str()) {
            if !s.is_empty() {
                events.push(NormalizedEvent::MessageDelta {
                    text: s.to_string(),
                });
            }
        }

        // Tool calls streaming deltas
        if let Some(arr) = delta.get("tool_calls").and_then(|x| x.as_array()) {
            for tc in arr {
                let idx = tc.get("index").and_then(serde_json::Value::as_u64).unwrap_or(0) as usize;
                let id = tc.get("id").and_then(|x| x.as_str()).map(ToString::to_string);
                let function = tc.get("function");
                let name = function
                    .and_then(|f| f.get("name"))
                    .and_then(|x| x.as_str())
                    .map(ToString::to_string);
                let args_delta = function.and_then(|f| f.get("arguments")).and_then(|x| {
                    x.as_str()
                        .map(ToString::to_string)
                        .or_else(|| (!x.is_null()).then(|| x.to_string()))
                });

                let entry = self.tool_accum.entry(idx).or_default();
                if entry.id.is_none() {
                    entry.id.clone_from(&id);
                }
                if entry.name.is_none() {
                    entry.name.clone_from(&name);
                }
                if let Some(ad) = &args_delta {
                    entry.args.push_str(ad);
                }

                events.push(NormalizedEvent::ToolCallDelta {
                    call_index: idx,
                    id,
                    name,
                    arguments_delta: args_delta,
                });
            }
        }

        // Completion boundary: signal tool phase via finish_reason
        if choice.get("finish_reason").and_then(|x| x.as_str()) == Some("tool_calls") {
            events.extend(self.finish());
        }

        Ok(events)
    }

    /// Emit assembled tool calls once.
    fn finish(&mut self) -> Vec<NormalizedEvent> {
        if self.tool_calls_emitted {
            return Vec::new();
        }
        self.tool_calls_emitted = true;

        self.tool_accum
            .iter()
            .filter_map(|(idx, a)| {
                let name = a.name.clone()?;
                Some(NormalizedEvent::ToolCallComplete {
                    call_index: *idx,
                    id: a.id.clone().unwrap_or_else(|| format!("call_{idx}")),
                    name,
                    arguments_json: a.args.clone(),
                })
            })
            .collect()
    }
}

/// Driver for the OpenAI Chat Completions API.
///
/// Connects to `/v1/chat/completions` and streams responses as
/// [`NormalizedEvent`]s.
#[derive(Clone)]
pub struct ChatCompletionsDriver {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl std::fmt::Debug for ChatCompletionsDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsDriver")
            .field("base_url", &self.settings.base_url)
            .field("model", &self.settings.model)
            .finish_non_exhaustive()
    }
}

impl ChatCompletionsDriver {
    /// Create a new Chat Completions driver with the given settings.
    #[must_use]
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    fn request_body(&self, req: LlmRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.settings.model,
            "stream": true,
            "messages": req.messages,
            "temperature": req.options.temperature,
        });
        if !req.tools.is_empty() {
            body["tools"] = serde_json::Value::Array(req.tools);
        }
        if let Some(max_tokens) = req.options.max_tokens {
            body["max_tokens"] = serde_json::Value::from(max_tokens);
        }
        body
    }
}

#[async_trait::async_trait]
impl LlmDriver for ChatCompletionsDriver {
    async fn stream(
        &self,
        req: LlmRequest,
    ) -> anyhow::Result<std::pin::Pin<Box<dyn Stream<Item = anyhow::Result<NormalizedEvent>> + Send>>>
    {
        let url = format!(
            "{}/v1/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );
        let body = self.request_body(req);

        let mut rb = self.http.post(&url).json(&body);
        if let Some(k) = &self.settings.api_key {
            rb = rb.bearer_auth(k);
        }

        let resp = rb
            .send()
            .await
            .with_context(|| format!("failed to reach LLM endpoint {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            anyhow::bail!("LLM endpoint returned {status}: {detail}");
        }
        let byte_stream = resp.bytes_stream();

        let out = async_stream::try_stream! {
            let mut frames = SseFrames::default();
            let mut parser = ChunkParser::default();

            futures::pin_mut!(byte_stream);
            while let Some(chunk) = byte_stream.next().await {
                let chunk = chunk?;
                for data in frames.push(&chunk) {
                    for event in parser.feed(&data)? {
                        yield event;
                    }
                }
            }

            // A final frame without a trailing blank line
            for data in frames.finish() {
                for event in parser.feed(&data)? {
                    yield event;
                }
            }

            // Providers that end the stream without [DONE] or a tool_calls finish reason
            for event in parser.finish() {
                yield event;
            }
        };

        Ok(Box::pin(out))
    }
}

/// Splits an SSE byte stream into frames and extracts their `data:` payloads.
///
/// Frames end at a blank line, written as `\n\n` or `\r\n\r\n`.
#[derive(Debug, Default)]
struct SseFrames {
    buf: Vec<u8>,
}

impl SseFrames {
    /// Append bytes and return the payloads of every completed frame.
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some((pos, len)) = find_frame_end(&self.buf) {
            let frame = self.buf.drain(..pos + len).collect::<Vec<_>>();
            payloads.extend(data_lines(&frame[..pos]));
        }
        payloads
    }

    /// Payloads of whatever is left once the stream has ended.
    fn finish(&mut self) -> Vec<String> {
        let rest = std::mem::take(&mut self.buf);
        data_lines(&rest)
    }
}

fn data_lines(frame: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(frame)
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.trim().to_string())
        .filter(|data| !data.is_empty())
        .collect()
}

/// Find the earliest blank-line frame terminator: `(position, length)`.
fn find_frame_end(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|pos| (pos, 2));
    let crlf = buf
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| (pos, 4));

    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if b.0 < a.0 { b } else { a }),
        (a, b) => a.or(b),
    }
}
