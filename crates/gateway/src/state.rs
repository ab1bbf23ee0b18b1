use std::sync::Arc;

use fw_conversations::ConversationStore;
use fw_domain::config::Config;
use fw_providers::LlmClient;
use fw_tools::{ToolRouter, TripStore};

/// Shared application state passed to all API handlers.
///
/// Everything is injected at startup; there are no global singletons and
/// the tool registry is read-only once serving begins.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub llm: Arc<dyn LlmClient>,
    pub conversations: Arc<ConversationStore>,
    pub trips: Arc<TripStore>,
    pub router: Arc<ToolRouter>,
}
