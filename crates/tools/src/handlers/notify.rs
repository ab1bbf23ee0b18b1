//! Price-alert threshold tool.

use serde_json::{Map, Value};
use uuid::Uuid;

use fw_domain::error::Result;
use fw_domain::tool::ToolResult;

use crate::handlers::{arg_str, parse_trip_id};
use crate::router::ToolHandler;
use crate::trips::{NotificationRule, ThresholdType, TripStore};

pub struct SetNotificationTool;

#[async_trait::async_trait]
impl ToolHandler for SetNotificationTool {
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

        let Some(threshold_value) = args.get("threshold_value").and_then(Value::as_f64) else {
            return Ok(ToolResult::failure("threshold_value is required"));
        };
        if threshold_value < 0.0 {
            return Ok(ToolResult::failure("threshold_value must be non-negative"));
        }

        let threshold_type = arg_str(args, "threshold_type")
            .map(ThresholdType::parse_or_default)
            .unwrap_or(ThresholdType::TripTotal);

        let rule = NotificationRule {
            threshold_value,
            threshold_type,
        };
        let Some(trip) = trips.set_notification(trip_id, user_id, rule) else {
            return Ok(ToolResult::failure("Trip not found"));
        };

        let mut data = Map::new();
        data.insert("trip_id".into(), Value::String(trip.id.to_string()));
        data.insert(
            "threshold_value".into(),
            serde_json::json!(threshold_value),
        );
        data.insert(
            "threshold_type".into(),
            Value::String(threshold_type.as_str().into()),
        );
        data.insert(
            "message".into(),
            Value::String(format!(
                "Alert set for '{}': notify when {} drops below {:.2}",
                trip.name,
                threshold_type.as_str(),
                threshold_value
            )),
        );
        Ok(ToolResult::success(data))
    }
}
