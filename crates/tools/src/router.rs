//! Central tool router.
//!
//! Dispatch pipeline for one LLM-generated tool invocation:
//! lookup → sanitize → audit the attempt → validate against the catalog
//! schema → run the handler → audit the outcome. Handlers never see
//! unsanitized input, and a validation failure never reaches a handler.
//!
//! The registry is filled at startup and read-only while serving; the
//! router keeps no per-user state, so nothing can leak across users.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use uuid::Uuid;

use fw_domain::error::Result;
use fw_domain::tool::ToolResult;

use crate::audit::AuditLogger;
use crate::catalog;
use crate::sanitizer;
use crate::trips::TripStore;

/// Capability implemented by every tool.
///
/// `args` are sanitized and validated before a handler sees them.
/// Handlers scope all persistence queries by `user_id`; an `Err` return
/// is converted by the router into a failed [`ToolResult`], so the chat
/// loop only ever observes values.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    async fn execute(
        &self,
        args: &Map<String, Value>,
        user_id: Uuid,
        trips: &TripStore,
    ) -> Result<ToolResult>;
}

pub struct ToolRouter {
    tools: HashMap<String, Arc<dyn ToolHandler>>,
    audit: AuditLogger,
}

impl Default for ToolRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRouter {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            audit: AuditLogger,
        }
    }

    /// Register a handler. Registration happens at startup only; the
    /// router is immutable once serving.
    pub fn register(&mut self, tool_name: impl Into<String>, handler: Arc<dyn ToolHandler>) {
        let tool_name = tool_name.into();
        tracing::debug!(tool = %tool_name, "registered tool");
        self.tools.insert(tool_name, handler);
    }

    pub fn is_registered(&self, tool_name: &str) -> bool {
        self.tools.contains_key(tool_name)
    }

    pub fn registered_tools(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Execute a tool with already-parsed arguments.
    pub async fn execute(
        &self,
        tool_name: &str,
        arguments: Map<String, Value>,
        user_id: Uuid,
        trips: &TripStore,
    ) -> ToolResult {
        tracing::info!(tool = %tool_name, user = %user_id, "executing tool");

        let Some(handler) = self.tools.get(tool_name) else {
            tracing::warn!(tool = %tool_name, "tool not found");
            self.audit
                .tool_failure(user_id, tool_name, &arguments, "Tool not found");
            return ToolResult::failure(format!("Tool not found: {tool_name}"));
        };

        // Sanitize before anything else so validation and handlers see
        // clean input.
        let sanitized = sanitizer::sanitize(&arguments);
        if sanitized.was_modified {
            self.audit.input_sanitized(
                user_id,
                tool_name,
                &sanitized.sanitized_fields,
                &sanitized.detected_patterns,
            );
        }
        let arguments = sanitized.data;

        self.audit.tool_call(user_id, tool_name, &arguments);

        // Handlers registered without a published schema skip validation
        // but still went through sanitization and audit.
        if let Some(schema) = catalog::schema_for(tool_name) {
            let errors = crate::schema::validate_args(schema, &arguments);
            if !errors.is_empty() {
                let message = format!("Invalid arguments for tool '{tool_name}'");
                tracing::warn!(tool = %tool_name, ?errors, "tool argument validation failed");
                self.audit
                    .tool_failure(user_id, tool_name, &arguments, &message);
                let mut details = Map::new();
                details.insert(
                    "errors".into(),
                    Value::Array(errors.into_iter().map(Value::String).collect()),
                );
                return ToolResult::failure_with(message, details);
            }
        } else {
            tracing::debug!(tool = %tool_name, "no schema published, skipping validation");
        }

        let result = match handler.execute(&arguments, user_id, trips).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(tool = %tool_name, error = %e, "tool execution failed");
                ToolResult::failure(format!("Tool execution failed: {e}"))
            }
        };

        if result.success {
            self.audit.tool_success(
                user_id,
                tool_name,
                &arguments,
                result.data.as_ref().unwrap_or(&Map::new()),
            );
        } else {
            self.audit.tool_failure(
                user_id,
                tool_name,
                &arguments,
                result.error.as_deref().unwrap_or("Unknown error"),
            );
        }
        result
    }

    /// Execute a tool whose arguments arrive as the raw JSON string the
    /// LLM produced.
    pub async fn execute_from_json(
        &self,
        tool_name: &str,
        arguments_json: &str,
        user_id: Uuid,
        trips: &TripStore,
    ) -> ToolResult {
        let parsed: Value = match serde_json::from_str(arguments_json) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(tool = %tool_name, error = %e, "tool arguments are not valid JSON");
                return ToolResult::failure(format!("Invalid JSON in tool arguments: {e}"));
            }
        };

        let arguments = match parsed {
            // Tools without parameters commonly get `null`.
            Value::Null => Map::new(),
            Value::Object(map) => map,
            _ => return ToolResult::failure("Tool arguments must be a JSON object"),
        };

        self.execute(tool_name, arguments, user_id, trips).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use fw_domain::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts invocations and echoes the args back.
    struct EchoTool {
        calls: AtomicUsize,
    }

    impl EchoTool {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl ToolHandler for EchoTool {
        async fn execute(
            &self,
            args: &Map<String, Value>,
            _user_id: Uuid,
            _trips: &TripStore,
        ) -> Result<ToolResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ToolResult::success(args.clone()))
        }
    }

    struct FailingTool;

    #[async_trait::async_trait]
    impl ToolHandler for FailingTool {
        async fn execute(
            &self,
            _args: &Map<String, Value>,
            _user_id: Uuid,
            _trips: &TripStore,
        ) -> Result<ToolResult> {
            Err(Error::Other("backend exploded".into()))
        }
    }

    fn router_with(name: &str, handler: Arc<dyn ToolHandler>) -> ToolRouter {
        let mut router = ToolRouter::new();
        router.register(name, handler);
        router
    }

    #[tokio::test]
    async fn unknown_tool_returns_not_found() {
        let router = ToolRouter::new();
        let trips = TripStore::new();
        let result = router
            .execute("warp_drive", Map::new(), Uuid::new_v4(), &trips)
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Tool not found: warp_drive"));
    }

    #[tokio::test]
    async fn validation_failure_never_reaches_handler() {
        let echo = EchoTool::new();
        let router = router_with("list_trips", echo.clone());
        let trips = TripStore::new();

        let mut args = Map::new();
        args.insert("status".into(), Value::String("sideways".into()));
        let result = router
            .execute("list_trips", args, Uuid::new_v4(), &trips)
            .await;

        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Invalid arguments for tool 'list_trips'")
        );
        let errors = &result.data.as_ref().unwrap()["errors"];
        assert!(errors[0].as_str().unwrap().starts_with("status:"));
        assert_eq!(echo.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn handler_error_becomes_failed_result() {
        let router = router_with("list_trips", Arc::new(FailingTool));
        let trips = TripStore::new();
        let result = router
            .execute("list_trips", Map::new(), Uuid::new_v4(), &trips)
            .await;
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Tool execution failed: backend exploded")
        );
    }

    #[tokio::test]
    async fn unpublished_schema_skips_validation_only() {
        let echo = EchoTool::new();
        let router = router_with("experimental_tool", echo.clone());
        let trips = TripStore::new();

        let mut args = Map::new();
        args.insert("whatever".into(), Value::String("goes".into()));
        let result = router
            .execute("experimental_tool", args, Uuid::new_v4(), &trips)
            .await;
        assert!(result.success);
        assert_eq!(echo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn arguments_are_sanitized_before_the_handler() {
        let echo = EchoTool::new();
        let router = router_with("experimental_tool", echo.clone());
        let trips = TripStore::new();

        let mut args = Map::new();
        args.insert("note".into(), Value::String("DROP TABLE trips".into()));
        let result = router
            .execute("experimental_tool", args, Uuid::new_v4(), &trips)
            .await;

        let echoed = result.data.unwrap();
        let note = echoed["note"].as_str().unwrap();
        assert!(!note.to_uppercase().contains("DROP"));
    }

    #[tokio::test]
    async fn invalid_json_arguments() {
        let router = router_with("list_trips", EchoTool::new());
        let trips = TripStore::new();
        let result = router
            .execute_from_json("list_trips", "{not json", Uuid::new_v4(), &trips)
            .await;
        assert!(!result.success);
        assert!(result
            .error
            .unwrap()
            .starts_with("Invalid JSON in tool arguments:"));
    }

    #[tokio::test]
    async fn null_arguments_become_empty_object() {
        let echo = EchoTool::new();
        let router = router_with("list_trips", echo.clone());
        let trips = TripStore::new();
        let result = router
            .execute_from_json("list_trips", "null", Uuid::new_v4(), &trips)
            .await;
        assert!(result.success);
        assert_eq!(echo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_object_arguments_rejected() {
        let router = router_with("list_trips", EchoTool::new());
        let trips = TripStore::new();
        let result = router
            .execute_from_json("list_trips", "[1,2,3]", Uuid::new_v4(), &trips)
            .await;
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Tool arguments must be a JSON object")
        );
    }
}
