//! Chat runtime — scope validation, prompt building, and the streaming
//! orchestration loop that ties the LLM, tool router, and conversation
//! store into one deterministic turn.

pub mod prompts;
pub mod scope;
pub mod turn;

pub use turn::{run_chat, run_elicitation, ChatInput, ElicitationInput};
