//! Concrete tool handlers behind the router.

pub mod notify;
pub mod refresh;
pub mod trips;

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::{Map, Value};
use uuid::Uuid;

use fw_domain::tool::ToolResult;

use crate::router::ToolRouter;
use crate::search::{SearchFlightsTool, SearchHotelsTool, SearchProvider};

/// Register the full tool catalog against a router.
pub fn register_all(
    router: &mut ToolRouter,
    max_trips_per_user: usize,
    refresh: Arc<dyn refresh::RefreshTrigger>,
    search: Arc<dyn SearchProvider>,
) {
    router.register(
        "create_trip",
        Arc::new(trips::CreateTripTool::new(max_trips_per_user)),
    );
    router.register("delete_trip", Arc::new(trips::DeleteTripTool));
    router.register("list_trips", Arc::new(trips::ListTripsTool));
    router.register("get_trip_details", Arc::new(trips::GetTripDetailsTool));
    router.register("set_notification", Arc::new(notify::SetNotificationTool));
    router.register("pause_trip", Arc::new(trips::PauseTripTool));
    router.register("resume_trip", Arc::new(trips::ResumeTripTool));
    router.register(
        "refresh_all_trip_prices",
        Arc::new(refresh::RefreshAllTripPricesTool::new(refresh.clone())),
    );
    router.register(
        "refresh_trip_prices",
        Arc::new(refresh::RefreshTripPricesTool::new(refresh)),
    );
    router.register(
        "search_flights",
        Arc::new(SearchFlightsTool::new(search.clone())),
    );
    router.register("search_hotels", Arc::new(SearchHotelsTool::new(search)));

    tracing::info!(count = router.registered_tools().len(), "registered tools");
}

// ── Shared argument helpers ────────────────────────────────────────

pub(crate) fn arg_str<'a>(args: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

/// Parse the `trip_id` argument. Schema validation already checked the
/// UUID format when the field was present, so failures here are reported
/// in tool-error wording.
pub(crate) fn parse_trip_id(args: &Map<String, Value>) -> Result<Uuid, ToolResult> {
    let Some(raw) = arg_str(args, "trip_id") else {
        return Err(ToolResult::failure("trip_id is required"));
    };
    Uuid::parse_str(raw)
        .map_err(|_| ToolResult::failure(format!("Invalid trip_id format: {raw}")))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, ToolResult> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        ToolResult::failure(format!("Invalid date format: {raw}. Use YYYY-MM-DD"))
    })
}
