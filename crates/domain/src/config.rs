//! Typed configuration, loaded from `farewatch.toml`.
//!
//! Every field has a serde default so a missing section or a partial file
//! still yields a fully-populated config.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub trips: TripsConfig,
}

impl Config {
    /// Sanity-check tunable ranges. Returns human-readable issues; the
    /// caller decides whether to warn or abort.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !(0.0..=1.0).contains(&self.llm.jitter) {
            issues.push(format!(
                "llm.jitter must be within [0, 1], got {}",
                self.llm.jitter
            ));
        }
        if self.llm.max_delay_ms < self.llm.base_delay_ms {
            issues.push(format!(
                "llm.max_delay_ms ({}) is below llm.base_delay_ms ({})",
                self.llm.max_delay_ms, self.llm.base_delay_ms
            ));
        }
        if self.chat.max_utterance_chars == 0 {
            issues.push("chat.max_utterance_chars must be at least 1".into());
        }
        issues
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: d_port(),
        }
    }
}

fn d_host() -> String {
    "127.0.0.1".into()
}

fn d_port() -> u16 {
    8600
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// State directory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Directory holding persisted state (conversation snapshot file).
    #[serde(default = "d_state_path")]
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: d_state_path(),
        }
    }
}

fn d_state_path() -> PathBuf {
    PathBuf::from("./state")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Environment variable holding the API key.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default = "d_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Retry attempts on transient rate limits.
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
    #[serde(default = "d_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "d_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Jitter factor (0-1) applied to backoff delays.
    #[serde(default = "d_jitter")]
    pub jitter: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: d_api_key_env(),
            base_url: d_base_url(),
            model: d_model(),
            temperature: d_temperature(),
            max_tokens: None,
            max_retries: d_max_retries(),
            base_delay_ms: d_base_delay_ms(),
            max_delay_ms: d_max_delay_ms(),
            jitter: d_jitter(),
        }
    }
}

fn d_api_key_env() -> String {
    "GROQ_API_KEY".into()
}

fn d_base_url() -> String {
    "https://api.groq.com/openai/v1".into()
}

fn d_model() -> String {
    "llama-3.3-70b-versatile".into()
}

fn d_temperature() -> f32 {
    0.7
}

fn d_max_retries() -> u32 {
    3
}

fn d_base_delay_ms() -> u64 {
    1_000
}

fn d_max_delay_ms() -> u64 {
    60_000
}

fn d_jitter() -> f64 {
    0.1
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chat loop limits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Upper bound for the context-window selection, system prompt included.
    #[serde(default = "d_max_context_tokens")]
    pub max_context_tokens: usize,
    /// Pruning target applied after each turn.
    #[serde(default = "d_max_messages")]
    pub max_messages_per_conversation: usize,
    /// Oldest-conversation eviction threshold on new-conversation creation.
    #[serde(default = "d_max_conversations")]
    pub max_conversations_per_user: usize,
    /// Hard cap on LLM rounds per utterance.
    #[serde(default = "d_max_tool_rounds")]
    pub max_tool_rounds: u32,
    /// Per-tool invocation cap per utterance.
    #[serde(default = "d_max_tool_retries")]
    pub max_tool_retries: u32,
    #[serde(default = "d_max_utterance_chars")]
    pub max_utterance_chars: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: d_max_context_tokens(),
            max_messages_per_conversation: d_max_messages(),
            max_conversations_per_user: d_max_conversations(),
            max_tool_rounds: d_max_tool_rounds(),
            max_tool_retries: d_max_tool_retries(),
            max_utterance_chars: d_max_utterance_chars(),
        }
    }
}

fn d_max_context_tokens() -> usize {
    8_000
}

fn d_max_messages() -> usize {
    100
}

fn d_max_conversations() -> usize {
    20
}

fn d_max_tool_rounds() -> u32 {
    10
}

fn d_max_tool_retries() -> u32 {
    3
}

fn d_max_utterance_chars() -> usize {
    10_000
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trip tracking
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripsConfig {
    #[serde(default = "d_max_trips")]
    pub max_trips_per_user: usize,
}

impl Default for TripsConfig {
    fn default() -> Self {
        Self {
            max_trips_per_user: d_max_trips(),
        }
    }
}

fn d_max_trips() -> usize {
    25
}
