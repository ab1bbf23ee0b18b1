/// Shared error type used across all Farewatch crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("auth: {0}")]
    Auth(String),

    /// The LLM backend rejected the request because of rate limiting.
    /// `daily` distinguishes a hard daily-quota exhaustion (never retried)
    /// from a transient per-minute limit.
    #[error("rate limited (daily quota: {daily})")]
    RateLimited {
        retry_after: Option<f64>,
        daily: bool,
    },

    /// The model failed to produce a well-formed tool call.
    #[error("tool call generation failed: {0}")]
    ToolCallGeneration(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True when this error came out of the LLM daily quota.
    pub fn is_daily_quota(&self) -> bool {
        matches!(self, Error::RateLimited { daily: true, .. })
    }
}
