//! Trip management tools: create (with elicitation), delete, list,
//! details, pause, resume.

use serde_json::{Map, Value};
use uuid::Uuid;

use fw_domain::error::Result;
use fw_domain::tool::ToolResult;

use crate::handlers::{arg_str, parse_date, parse_trip_id};
use crate::router::ToolHandler;
use crate::trips::{NewTrip, NotificationRule, ThresholdType, Trip, TripStatus, TripStore};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// create_trip
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Fields that must be present before a trip can be created. Missing
/// ones turn the call into an elicitation request instead of a failure,
/// so the caller can collect them through a form.
const REQUIRED_FIELDS: &[&str] = &[
    "name",
    "origin_airport",
    "destination_code",
    "depart_date",
    "return_date",
];

const ELICITATION_COMPONENT: &str = "create-trip-form";

pub struct CreateTripTool {
    max_trips_per_user: usize,
}

impl CreateTripTool {
    pub fn new(max_trips_per_user: usize) -> Self {
        Self { max_trips_per_user }
    }

    /// Missing-field check that powers conversational trip creation
    /// ("create a trip to Seattle" → form with the rest prefilled).
    fn elicitation_needed(args: &Map<String, Value>) -> Option<ToolResult> {
        let missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|field| !is_provided(args.get(**field)))
            .map(|f| f.to_string())
            .collect();

        if missing.is_empty() {
            return None;
        }

        // Everything usable the model already supplied gets prefilled,
        // optional preferences included.
        let prefilled: Map<String, Value> = args
            .iter()
            .filter(|(_, v)| is_provided(Some(v)))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut data = Map::new();
        data.insert("needs_elicitation".into(), Value::Bool(true));
        data.insert(
            "component".into(),
            Value::String(ELICITATION_COMPONENT.into()),
        );
        data.insert("prefilled".into(), Value::Object(prefilled));
        data.insert(
            "missing_fields".into(),
            Value::Array(missing.into_iter().map(Value::String).collect()),
        );
        Some(ToolResult::success(data))
    }
}

fn is_provided(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

#[async_trait::async_trait]
impl ToolHandler for CreateTripTool {
    async fn execute(
        &self,
        args: &Map<String, Value>,
        user_id: Uuid,
        trips: &TripStore,
    ) -> Result<ToolResult> {
        if let Some(elicitation) = Self::elicitation_needed(args) {
            return Ok(elicitation);
        }

        if trips.count(user_id) >= self.max_trips_per_user {
            return Ok(ToolResult::failure(format!(
                "Trip limit reached ({})",
                self.max_trips_per_user
            )));
        }

        let name = arg_str(args, "name").unwrap_or_default().to_string();
        if trips.name_exists(user_id, &name) {
            return Ok(ToolResult::failure(format!(
                "A trip named '{name}' already exists"
            )));
        }

        let depart_date = match parse_date(arg_str(args, "depart_date").unwrap_or_default()) {
            Ok(d) => d,
            Err(r) => return Ok(r),
        };
        let return_date = match parse_date(arg_str(args, "return_date").unwrap_or_default()) {
            Ok(d) => d,
            Err(r) => return Ok(r),
        };
        if return_date < depart_date {
            return Ok(ToolResult::failure(
                "return_date must be on or after depart_date",
            ));
        }

        let notification = args
            .get("notification_threshold")
            .and_then(Value::as_f64)
            .map(|threshold_value| NotificationRule {
                threshold_value,
                threshold_type: arg_str(args, "threshold_type")
                    .map(ThresholdType::parse_or_default)
                    .unwrap_or(ThresholdType::TripTotal),
            });

        let trip = trips.create(
            user_id,
            NewTrip {
                name,
                origin_airport: arg_str(args, "origin_airport")
                    .unwrap_or_default()
                    .to_uppercase(),
                destination_code: arg_str(args, "destination_code")
                    .unwrap_or_default()
                    .to_uppercase(),
                depart_date,
                return_date,
                adults: args
                    .get("adults")
                    .and_then(Value::as_u64)
                    .unwrap_or(1) as u32,
                is_round_trip: args
                    .get("is_round_trip")
                    .and_then(Value::as_bool)
                    .unwrap_or(true),
                notification,
            },
        );

        let mut data = Map::new();
        data.insert("trip_id".into(), Value::String(trip.id.to_string()));
        data.insert("name".into(), Value::String(trip.name.clone()));
        data.insert("origin".into(), Value::String(trip.origin_airport.clone()));
        data.insert(
            "destination".into(),
            Value::String(trip.destination_code.clone()),
        );
        data.insert(
            "dates".into(),
            Value::String(format!("{} to {}", trip.depart_date, trip.return_date)),
        );
        data.insert(
            "message".into(),
            Value::String(format!(
                "Created trip '{}'. Call refresh_trip_prices to fetch initial prices.",
                trip.name
            )),
        );
        Ok(ToolResult::success(data))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// delete_trip / list_trips / get_trip_details
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct DeleteTripTool;

#[async_trait::async_trait]
impl ToolHandler for DeleteTripTool {
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
        trips.delete(trip_id, user_id);

        let mut data = Map::new();
        data.insert("deleted".into(), Value::Bool(true));
        data.insert("trip_id".into(), Value::String(trip_id.to_string()));
        data.insert(
            "message".into(),
            Value::String(format!("Deleted trip '{}'", trip.name)),
        );
        Ok(ToolResult::success(data))
    }
}

pub struct ListTripsTool;

#[async_trait::async_trait]
impl ToolHandler for ListTripsTool {
    async fn execute(
        &self,
        args: &Map<String, Value>,
        user_id: Uuid,
        trips: &TripStore,
    ) -> Result<ToolResult> {
        let status = arg_str(args, "status").and_then(TripStatus::parse);
        let listed = trips.list(user_id, status);

        let entries: Vec<Value> = listed.iter().map(trip_summary).collect();
        let mut data = Map::new();
        data.insert("count".into(), Value::Number(entries.len().into()));
        data.insert("trips".into(), Value::Array(entries));
        Ok(ToolResult::success(data))
    }
}

fn trip_summary(trip: &Trip) -> Value {
    serde_json::json!({
        "id": trip.id.to_string(),
        "name": trip.name,
        "route": format!("{} → {}", trip.origin_airport, trip.destination_code),
        "dates": format!("{} - {}", trip.depart_date, trip.return_date),
        "status": trip.status.as_str(),
        "current_price": trip.latest_total_price,
    })
}

pub struct GetTripDetailsTool;

#[async_trait::async_trait]
impl ToolHandler for GetTripDetailsTool {
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

        let details = serde_json::json!({
            "id": trip.id.to_string(),
            "name": trip.name,
            "origin_airport": trip.origin_airport,
            "destination_code": trip.destination_code,
            "depart_date": trip.depart_date.to_string(),
            "return_date": trip.return_date.to_string(),
            "adults": trip.adults,
            "is_round_trip": trip.is_round_trip,
            "status": trip.status.as_str(),
            "notification": trip.notification.map(|n| serde_json::json!({
                "threshold_value": n.threshold_value,
                "threshold_type": n.threshold_type.as_str(),
            })),
            "current_price": trip.latest_total_price,
        });

        let mut data = Map::new();
        data.insert("trip".into(), details);
        Ok(ToolResult::success(data))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// pause_trip / resume_trip
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct PauseTripTool;

#[async_trait::async_trait]
impl ToolHandler for PauseTripTool {
    async fn execute(
        &self,
        args: &Map<String, Value>,
        user_id: Uuid,
        trips: &TripStore,
    ) -> Result<ToolResult> {
        Ok(set_trip_status(args, user_id, trips, TripStatus::Paused))
    }
}

pub struct ResumeTripTool;

#[async_trait::async_trait]
impl ToolHandler for ResumeTripTool {
    async fn execute(
        &self,
        args: &Map<String, Value>,
        user_id: Uuid,
        trips: &TripStore,
    ) -> Result<ToolResult> {
        Ok(set_trip_status(args, user_id, trips, TripStatus::Active))
    }
}

fn set_trip_status(
    args: &Map<String, Value>,
    user_id: Uuid,
    trips: &TripStore,
    status: TripStatus,
) -> ToolResult {
    let trip_id = match parse_trip_id(args) {
        Ok(id) => id,
        Err(r) => return r,
    };
    let Some(trip) = trips.set_status(trip_id, user_id, status) else {
        return ToolResult::failure("Trip not found");
    };

    let verb = match status {
        TripStatus::Paused => "Paused",
        _ => "Resumed",
    };
    let mut data = Map::new();
    data.insert("trip_id".into(), Value::String(trip.id.to_string()));
    data.insert("status".into(), Value::String(trip.status.as_str().into()));
    data.insert(
        "message".into(),
        Value::String(format!("{verb} price tracking for '{}'", trip.name)),
    );
    ToolResult::success(data)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn full_args() -> Map<String, Value> {
        obj(json!({
            "name": "Maui",
            "origin_airport": "sfo",
            "destination_code": "ogg",
            "depart_date": "2026-09-01",
            "return_date": "2026-09-10",
            "adults": 2
        }))
    }

    #[tokio::test]
    async fn create_with_all_fields_persists_trip() {
        let store = TripStore::new();
        let user = Uuid::new_v4();
        let tool = CreateTripTool::new(25);

        let result = tool.execute(&full_args(), user, &store).await.unwrap();
        assert!(result.success);
        assert!(!result.is_elicitation());

        let data = result.data.unwrap();
        assert_eq!(data["origin"], json!("SFO"));
        assert_eq!(data["destination"], json!("OGG"));

        let trips = store.list(user, None);
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].status, TripStatus::Active);
    }

    #[tokio::test]
    async fn create_with_missing_fields_requests_elicitation() {
        let store = TripStore::new();
        let tool = CreateTripTool::new(25);
        let args = obj(json!({"name": "X", "origin_airport": "  "}));

        let result = tool
            .execute(&args, Uuid::new_v4(), &store)
            .await
            .unwrap();
        assert!(result.is_elicitation());

        let data = result.data.unwrap();
        assert_eq!(data["component"], json!("create-trip-form"));
        // Whitespace-only strings count as missing and are not prefilled.
        assert_eq!(data["prefilled"], json!({"name": "X"}));
        let missing: Vec<&str> = data["missing_fields"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(
            missing,
            vec![
                "origin_airport",
                "destination_code",
                "depart_date",
                "return_date"
            ]
        );
        assert_eq!(store.count(Uuid::new_v4()), 0);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_name_and_limit() {
        let store = TripStore::new();
        let user = Uuid::new_v4();
        let tool = CreateTripTool::new(1);

        assert!(tool.execute(&full_args(), user, &store).await.unwrap().success);

        let dup = tool.execute(&full_args(), user, &store).await.unwrap();
        assert!(!dup.success);
        assert!(dup.error.unwrap().contains("Trip limit reached"));

        let tool = CreateTripTool::new(25);
        let dup = tool.execute(&full_args(), user, &store).await.unwrap();
        assert!(!dup.success);
        assert!(dup.error.unwrap().contains("already exists"));
    }

    #[tokio::test]
    async fn create_rejects_inverted_dates() {
        let store = TripStore::new();
        let tool = CreateTripTool::new(25);
        let mut args = full_args();
        args.insert("return_date".into(), json!("2026-08-01"));

        let result = tool
            .execute(&args, Uuid::new_v4(), &store)
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("on or after"));
    }

    #[tokio::test]
    async fn list_trips_empty_and_filtered() {
        let store = TripStore::new();
        let user = Uuid::new_v4();

        let result = ListTripsTool
            .execute(&Map::new(), user, &store)
            .await
            .unwrap();
        let data = result.data.unwrap();
        assert_eq!(data["count"], json!(0));
        assert_eq!(data["trips"], json!([]));

        CreateTripTool::new(25)
            .execute(&full_args(), user, &store)
            .await
            .unwrap();
        let result = ListTripsTool
            .execute(&obj(json!({"status": "paused"})), user, &store)
            .await
            .unwrap();
        assert_eq!(result.data.unwrap()["count"], json!(0));
    }

    #[tokio::test]
    async fn details_delete_and_ownership() {
        let store = TripStore::new();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        let created = CreateTripTool::new(25)
            .execute(&full_args(), owner, &store)
            .await
            .unwrap();
        let trip_id = created.data.unwrap()["trip_id"].as_str().unwrap().to_string();
        let args = obj(json!({"trip_id": trip_id}));

        let details = GetTripDetailsTool
            .execute(&args, owner, &store)
            .await
            .unwrap();
        assert_eq!(details.data.unwrap()["trip"]["name"], json!("Maui"));

        // Another user sees not-found, not someone else's trip.
        let foreign = GetTripDetailsTool
            .execute(&args, stranger, &store)
            .await
            .unwrap();
        assert!(!foreign.success);
        assert_eq!(foreign.error.as_deref(), Some("Trip not found"));

        let deleted = DeleteTripTool.execute(&args, owner, &store).await.unwrap();
        assert!(deleted.success);
        assert_eq!(store.count(owner), 0);
    }

    #[tokio::test]
    async fn pause_and_resume_cycle() {
        let store = TripStore::new();
        let user = Uuid::new_v4();
        let created = CreateTripTool::new(25)
            .execute(&full_args(), user, &store)
            .await
            .unwrap();
        let trip_id = created.data.unwrap()["trip_id"].as_str().unwrap().to_string();
        let args = obj(json!({"trip_id": trip_id}));

        let paused = PauseTripTool.execute(&args, user, &store).await.unwrap();
        assert_eq!(paused.data.unwrap()["status"], json!("paused"));

        let resumed = ResumeTripTool.execute(&args, user, &store).await.unwrap();
        assert_eq!(resumed.data.unwrap()["status"], json!("active"));
    }

    #[tokio::test]
    async fn bad_trip_id_format() {
        let store = TripStore::new();
        let args = obj(json!({"trip_id": "not-a-uuid"}));
        let result = DeleteTripTool
            .execute(&args, Uuid::new_v4(), &store)
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Invalid trip_id format"));
    }
}
