//! Groq adapter (OpenAI-compatible chat completions wire format).
//!
//! Handles streaming SSE responses, tool-call deltas, and rate-limit
//! backoff. Transient 429s are retried with exponential backoff + jitter
//! (honoring a server-supplied `retry-after`); daily-quota exhaustion is
//! surfaced immediately as `Error::RateLimited { daily: true }` with no
//! retry. A malformed tool-call generation (HTTP 400 `tool_use_failed`)
//! is retried once.

use std::time::Duration;

use rand::Rng;
use serde_json::Value;

use fw_domain::config::LlmConfig;
use fw_domain::error::{Error, Result};
use fw_domain::stream::{BoxStream, StreamEvent, Usage};
use fw_domain::tool::{ToolCall, ToolDefinition};

use crate::traits::{ChatRequest, ChatResponse, LlmClient};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Retry policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub(crate) struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: f64,
}

impl RetryPolicy {
    fn from_config(cfg: &LlmConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            base_delay: Duration::from_millis(cfg.base_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            jitter: cfg.jitter,
        }
    }

    /// Delay before the next retry. A server-supplied `retry-after` wins
    /// (capped at `max_delay`); otherwise exponential backoff with jitter.
    pub(crate) fn delay(&self, attempt: u32, retry_after: Option<f64>) -> Duration {
        if let Some(secs) = retry_after {
            return Duration::from_secs_f64(secs.max(0.0)).min(self.max_delay);
        }

        let exp = self
            .base_delay
            .saturating_mul(2_u32.saturating_pow(attempt))
            .min(self.max_delay);

        if self.jitter <= 0.0 {
            return exp;
        }
        let spread = exp.as_secs_f64() * self.jitter;
        let offset = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_secs_f64((exp.as_secs_f64() + offset).max(0.0))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct GroqClient {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl GroqClient {
    /// Build a client from config; the API key is read from the
    /// environment variable named by `cfg.api_key_env`.
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&cfg.api_key_env)
            .map_err(|_| Error::Auth(format!("{} is not set", cfg.api_key_env)))?;
        Ok(Self::new(cfg, api_key))
    }

    pub fn new(cfg: &LlmConfig, api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
            retry: RetryPolicy::from_config(cfg),
            client,
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_chat_body(&self, req: &ChatRequest, stream: bool) -> Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": req.messages,
            "temperature": req.temperature.unwrap_or(self.temperature),
            "stream": stream,
        });

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_wire).collect();
            body["tools"] = Value::Array(tools);
        }
        if let Some(max) = req.max_tokens.or(self.max_tokens) {
            body["max_tokens"] = serde_json::json!(max);
        }
        if stream {
            body["stream_options"] = serde_json::json!({"include_usage": true});
        }
        body
    }
}

fn tool_to_wire(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error classification
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What to do with a non-success HTTP status.
enum Failure {
    /// Transient rate limit, eligible for backoff.
    Transient { retry_after: Option<f64> },
    /// The model produced a malformed tool call; retried once.
    ToolCall(String),
    Fatal(Error),
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<f64> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<f64>().ok())
}

/// Daily-quota rejections mention the per-day window in the error body
/// (e.g. "Limit 100000 tokens per day" / TPD / RPD).
fn is_daily_quota(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("per day") || lower.contains("tpd") || lower.contains("rpd")
}

fn classify_failure(
    status: reqwest::StatusCode,
    retry_after: Option<f64>,
    body: &str,
) -> Failure {
    use reqwest::StatusCode;

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            if is_daily_quota(body) {
                Failure::Fatal(Error::RateLimited {
                    retry_after,
                    daily: true,
                })
            } else {
                Failure::Transient { retry_after }
            }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Failure::Fatal(Error::Auth(format!("HTTP {}: {}", status.as_u16(), body)))
        }
        StatusCode::BAD_REQUEST if body.contains("tool_use_failed") => {
            Failure::ToolCall(body.to_string())
        }
        _ => Failure::Fatal(Error::Provider {
            provider: "groq".into(),
            message: format!("HTTP {} - {}", status.as_u16(), body),
        }),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SSE payload parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

/// Parse one SSE `data:` payload into stream events.
fn parse_sse_data(data: &str) -> Vec<Result<StreamEvent>> {
    if data.trim() == "[DONE]" {
        return vec![Ok(StreamEvent::Done {
            finish_reason: Some("stop".into()),
            usage: None,
        })];
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    let choice = v
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first());

    // Usage-only chunk (stream_options.include_usage).
    let Some(choice) = choice else {
        if let Some(usage) = v.get("usage").and_then(parse_usage) {
            return vec![Ok(StreamEvent::Done {
                finish_reason: None,
                usage: Some(usage),
            })];
        }
        return Vec::new();
    };

    let mut events = Vec::new();
    let delta = choice.get("delta").unwrap_or(&Value::Null);

    // Tool call deltas, keyed by index. A delta may carry any subset of
    // {id, function.name, function.arguments}.
    if let Some(tc_arr) = delta.get("tool_calls").and_then(|v| v.as_array()) {
        for tc in tc_arr {
            let index = tc.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
            let id = tc
                .get("id")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            let name = tc
                .get("function")
                .and_then(|f| f.get("name"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            let arguments = tc
                .get("function")
                .and_then(|f| f.get("arguments"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            events.push(Ok(StreamEvent::ToolCallDelta {
                index,
                id,
                name,
                arguments,
            }));
        }
    }

    // Text content delta.
    if let Some(text) = delta.get("content").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            events.push(Ok(StreamEvent::Token {
                text: text.to_string(),
            }));
        }
    }

    // Finish reason terminates the choice.
    if let Some(fr) = choice.get("finish_reason").and_then(|f| f.as_str()) {
        let usage = v.get("usage").and_then(parse_usage);
        events.push(Ok(StreamEvent::Done {
            finish_reason: Some(fr.to_string()),
            usage,
        }));
    }

    events
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Non-streaming response parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_chat_response(body: &Value) -> Result<ChatResponse> {
    let choice = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first())
        .ok_or_else(|| Error::Provider {
            provider: "groq".into(),
            message: "no choices in response".into(),
        })?;

    let message = choice.get("message").ok_or_else(|| Error::Provider {
        provider: "groq".into(),
        message: "no message in choice".into(),
    })?;

    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let tool_calls = message
        .get("tool_calls")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|tc| {
                    let id = tc.get("id")?.as_str()?;
                    let func = tc.get("function")?;
                    let name = func.get("name")?.as_str()?;
                    let arguments = func.get("arguments")?.as_str().unwrap_or("{}");
                    Some(ToolCall::new(id, name, arguments))
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ChatResponse {
        content,
        tool_calls,
        finish_reason: choice
            .get("finish_reason")
            .and_then(|v| v.as_str())
            .map(String::from),
        usage: body.get("usage").and_then(parse_usage),
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmClient for GroqClient {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let url = self.chat_url();
        let body = self.build_chat_body(req, false);
        let mut attempt: u32 = 0;
        let mut tool_call_retried = false;

        loop {
            tracing::debug!(url = %url, attempt, "groq chat request");
            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| Error::Http(e.to_string()))?;

            let status = resp.status();
            let retry_after = parse_retry_after(resp.headers());
            let text = resp
                .text()
                .await
                .map_err(|e| Error::Http(e.to_string()))?;

            if status.is_success() {
                let json: Value = serde_json::from_str(&text)?;
                return parse_chat_response(&json);
            }

            match classify_failure(status, retry_after, &text) {
                Failure::Transient { retry_after } => {
                    if attempt >= self.retry.max_retries {
                        return Err(Error::RateLimited {
                            retry_after,
                            daily: false,
                        });
                    }
                    let delay = self.retry.delay(attempt, retry_after);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "groq rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Failure::ToolCall(detail) => {
                    if tool_call_retried {
                        return Err(Error::ToolCallGeneration(detail));
                    }
                    tracing::warn!("groq tool call generation failed, retrying once");
                    tool_call_retried = true;
                }
                Failure::Fatal(err) => return Err(err),
            }
        }
    }

    async fn chat_stream(
        &self,
        req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = self.chat_url();
        let body = self.build_chat_body(req, true);
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        let retry = self.retry.clone();

        let stream = async_stream::stream! {
            use futures_util::StreamExt;

            let mut attempt: u32 = 0;
            let mut tool_call_retried = false;

            let response = loop {
                tracing::debug!(url = %url, attempt, "groq stream request");
                let sent = client
                    .post(&url)
                    .bearer_auth(&api_key)
                    .json(&body)
                    .send()
                    .await;

                let resp = match sent {
                    Ok(r) => r,
                    Err(e) => {
                        yield Err(Error::Http(e.to_string()));
                        return;
                    }
                };

                let status = resp.status();
                if status.is_success() {
                    break resp;
                }

                let retry_after = parse_retry_after(resp.headers());
                let text = resp.text().await.unwrap_or_default();

                match classify_failure(status, retry_after, &text) {
                    Failure::Transient { retry_after } => {
                        if attempt >= retry.max_retries {
                            yield Err(Error::RateLimited { retry_after, daily: false });
                            return;
                        }
                        let delay = retry.delay(attempt, retry_after);
                        attempt += 1;
                        yield Ok(StreamEvent::RateLimit {
                            attempt,
                            max_attempts: retry.max_retries,
                            retry_after,
                        });
                        tokio::time::sleep(delay).await;
                    }
                    Failure::ToolCall(detail) => {
                        if tool_call_retried {
                            yield Err(Error::ToolCallGeneration(detail));
                            return;
                        }
                        tracing::warn!("groq tool call generation failed, retrying once");
                        tool_call_retried = true;
                    }
                    Failure::Fatal(err) => {
                        yield Err(err);
                        return;
                    }
                }
            };

            let mut inner = crate::sse::sse_response_stream(response, parse_sse_data);
            while let Some(event) = inner.next().await {
                yield event;
            }
        };

        Ok(Box::pin(stream))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
