//! LLM client layer: the provider-agnostic [`LlmClient`] trait, the Groq
//! (OpenAI-compatible) adapter, shared SSE plumbing, and the token
//! estimator used for context-window budgeting.

pub mod groq;
pub mod sse;
pub mod token;
pub mod traits;

pub use groq::GroqClient;
pub use token::TokenEstimator;
pub use traits::{ChatRequest, ChatResponse, LlmClient};
