//! Price-refresh trigger tools.
//!
//! The refresh workflow itself runs in an external engine; these tools
//! only claim the per-user refresh lock and hand the workflow id to a
//! [`RefreshTrigger`]. The default trigger logs the request for an
//! out-of-process worker to pick up.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use fw_domain::error::Result;
use fw_domain::tool::ToolResult;

use crate::handlers::parse_trip_id;
use crate::router::ToolHandler;
use crate::trips::{TripStatus, TripStore};

/// Contract with the external workflow engine.
#[async_trait::async_trait]
pub trait RefreshTrigger: Send + Sync {
    async fn start_refresh_all(&self, user_id: Uuid, workflow_id: &str) -> Result<()>;
    async fn start_refresh_trip(
        &self,
        user_id: Uuid,
        trip_id: Uuid,
        workflow_id: &str,
    ) -> Result<()>;
}

/// Default trigger: record the request and let the worker poll it up.
pub struct LoggingRefreshTrigger;

#[async_trait::async_trait]
impl RefreshTrigger for LoggingRefreshTrigger {
    async fn start_refresh_all(&self, user_id: Uuid, workflow_id: &str) -> Result<()> {
        tracing::info!(user = %user_id, workflow_id, "refresh-all workflow requested");
        Ok(())
    }

    async fn start_refresh_trip(
        &self,
        user_id: Uuid,
        trip_id: Uuid,
        workflow_id: &str,
    ) -> Result<()> {
        tracing::info!(user = %user_id, trip = %trip_id, workflow_id, "trip refresh workflow requested");
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// refresh_all_trip_prices
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct RefreshAllTripPricesTool {
    trigger: Arc<dyn RefreshTrigger>,
}

impl RefreshAllTripPricesTool {
    pub fn new(trigger: Arc<dyn RefreshTrigger>) -> Self {
        Self { trigger }
    }
}

#[async_trait::async_trait]
impl ToolHandler for RefreshAllTripPricesTool {
    async fn execute(
        &self,
        _args: &Map<String, Value>,
        user_id: Uuid,
        trips: &TripStore,
    ) -> Result<ToolResult> {
        let workflow_id = format!("refresh-{user_id}-{}", Utc::now().timestamp_millis());

        if let Err(existing) = trips.begin_refresh(user_id, &workflow_id) {
            return Ok(ToolResult::failure(format!(
                "A refresh is already in progress. Please wait. (ID: {existing})"
            )));
        }

        if let Err(e) = self.trigger.start_refresh_all(user_id, &workflow_id).await {
            trips.end_refresh(user_id);
            return Ok(ToolResult::failure(format!(
                "Failed to start refresh workflow: {e}"
            )));
        }

        let mut data = Map::new();
        data.insert(
            "message".into(),
            Value::String("Refreshing prices for all active trips...".into()),
        );
        data.insert("workflow_id".into(), Value::String(workflow_id));
        Ok(ToolResult::success(data))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// refresh_trip_prices
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct RefreshTripPricesTool {
    trigger: Arc<dyn RefreshTrigger>,
}

impl RefreshTripPricesTool {
    pub fn new(trigger: Arc<dyn RefreshTrigger>) -> Self {
        Self { trigger }
    }
}

#[async_trait::async_trait]
impl ToolHandler for RefreshTripPricesTool {
    async fn execute(
        &self,
        args: &Map<String, Value>,
        user_id: Uuid,
        trips: &TripStore,
    ) -> Result<ToolResult> {
        let trip_id = match parse_trip_id(args) {
            Ok(id) => id,
            Err(r) => return Ok(r),
        };

        let Some(trip) = trips.get(trip_id, user_id) else {
            return Ok(ToolResult::failure("Trip not found"));
        };
        if trip.status != TripStatus::Active {
            return Ok(ToolResult::failure(format!(
                "Trip '{}' is {}. Resume it before refreshing prices.",
                trip.name,
                trip.status.as_str()
            )));
        }

        let workflow_id = format!("refresh-trip-{trip_id}-{}", Utc::now().timestamp_millis());
        if let Err(e) = self
            .trigger
            .start_refresh_trip(user_id, trip_id, &workflow_id)
            .await
        {
            return Ok(ToolResult::failure(format!(
                "Failed to start refresh workflow: {e}"
            )));
        }

        let mut data = Map::new();
        data.insert(
            "message".into(),
            Value::String(format!("Refreshing prices for '{}'...", trip.name)),
        );
        data.insert("trip_id".into(), Value::String(trip_id.to_string()));
        data.insert("workflow_id".into(), Value::String(workflow_id));
        Ok(ToolResult::success(data))
    }
}
