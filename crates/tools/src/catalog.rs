//! Static tool catalog: the schemas advertised to the LLM.
//!
//! Built once at startup; the router validates sanitized arguments
//! against these schemas before touching a handler. `create_trip`
//! deliberately marks no field as required — missing fields are handled
//! by the elicitation protocol inside the handler, not by validation.

use std::sync::LazyLock;

use serde_json::Value;

use fw_domain::tool::ToolDefinition;

static CATALOG: LazyLock<Vec<ToolDefinition>> = LazyLock::new(build_catalog);

/// Every tool definition, in registration order.
pub fn definitions() -> &'static [ToolDefinition] {
    &CATALOG
}

/// Parameter schema for a tool, if it publishes one.
pub fn schema_for(name: &str) -> Option<&'static Value> {
    CATALOG
        .iter()
        .find(|t| t.name == name)
        .map(|t| &t.parameters)
}

fn def(name: &str, description: &str, parameters: Value) -> ToolDefinition {
    ToolDefinition {
        name: name.into(),
        description: description.into(),
        parameters,
    }
}

fn build_catalog() -> Vec<ToolDefinition> {
    vec![
        def(
            "create_trip",
            "Create a new vacation price tracking trip. Sets up monitoring for \
             flights and hotels between the specified locations and dates. New \
             trips start 'active'. After creating a trip, call refresh_trip_prices \
             with the returned trip_id to fetch initial prices.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "minLength": 1, "maxLength": 100, "description": "Trip name, unique per user" },
                    "origin_airport": { "type": "string", "pattern": "^[A-Za-z]{3}$", "description": "IATA code of the departure airport" },
                    "destination_code": { "type": "string", "pattern": "^[A-Za-z]{3}$", "description": "IATA code of the destination" },
                    "depart_date": { "type": "string", "format": "date" },
                    "return_date": { "type": "string", "format": "date" },
                    "adults": { "type": "integer", "minimum": 1, "maximum": 9 },
                    "is_round_trip": { "type": "boolean" },
                    "cabin": { "type": "string", "enum": ["economy", "premium_economy", "business", "first"] },
                    "notification_threshold": { "type": "number", "minimum": 0, "description": "Alert when total price drops below this" }
                },
                "required": []
            }),
        ),
        def(
            "delete_trip",
            "Delete a trip and stop tracking its prices. This cannot be undone.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "trip_id": { "type": "string", "format": "uuid" }
                },
                "required": ["trip_id"]
            }),
        ),
        def(
            "list_trips",
            "List all vacation trips being tracked for the current user. Returns \
             trip names, routes, dates, status, and current prices.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "status": { "type": "string", "enum": ["active", "paused", "error"], "description": "Optional status filter" }
                },
                "required": []
            }),
        ),
        def(
            "get_trip_details",
            "Get full details for one trip: route, dates, travelers, status, \
             notification threshold, and the latest tracked price.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "trip_id": { "type": "string", "format": "uuid" }
                },
                "required": ["trip_id"]
            }),
        ),
        def(
            "set_notification",
            "Set or update the price alert threshold for a trip. The user is \
             notified when the tracked price drops below the threshold.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "trip_id": { "type": "string", "format": "uuid" },
                    "threshold_value": { "type": "number", "minimum": 0 },
                    "threshold_type": { "type": "string", "enum": ["trip_total", "flight_total", "hotel_total"] }
                },
                "required": ["trip_id", "threshold_value"]
            }),
        ),
        def(
            "pause_trip",
            "Pause price tracking for a trip. No refreshes or alerts run while \
             paused.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "trip_id": { "type": "string", "format": "uuid" }
                },
                "required": ["trip_id"]
            }),
        ),
        def(
            "resume_trip",
            "Resume price tracking for a paused trip.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "trip_id": { "type": "string", "format": "uuid" }
                },
                "required": ["trip_id"]
            }),
        ),
        def(
            "refresh_all_trip_prices",
            "Trigger an immediate price refresh for ALL active trips. Fetches the \
             latest flight and hotel prices for every active trip.",
            serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        ),
        def(
            "refresh_trip_prices",
            "Trigger an immediate price refresh for a SPECIFIC trip. The trip \
             must be active (not paused).",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "trip_id": { "type": "string", "format": "uuid" }
                },
                "required": ["trip_id"]
            }),
        ),
        def(
            "search_flights",
            "Search one-off flight offers between two airports without creating \
             a trip. Returns a list of priced itineraries.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "origin": { "type": "string", "pattern": "^[A-Za-z]{3}$" },
                    "destination": { "type": "string", "pattern": "^[A-Za-z]{3}$" },
                    "depart_date": { "type": "string", "format": "date" },
                    "return_date": { "type": "string", "format": "date" },
                    "adults": { "type": "integer", "minimum": 1, "maximum": 9 }
                },
                "required": ["origin", "destination", "depart_date"]
            }),
        ),
        def(
            "search_hotels",
            "Search hotel offers in a city without creating a trip. Returns a \
             list of priced stays.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "city_code": { "type": "string", "pattern": "^[A-Za-z]{3}$" },
                    "check_in": { "type": "string", "format": "date" },
                    "check_out": { "type": "string", "format": "date" },
                    "rooms": { "type": "integer", "minimum": 1, "maximum": 8 }
                },
                "required": ["city_code", "check_in", "check_out"]
            }),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_the_advertised_tools() {
        let names: Vec<&str> = definitions().iter().map(|d| d.name.as_str()).collect();
        for expected in [
            "create_trip",
            "delete_trip",
            "list_trips",
            "get_trip_details",
            "set_notification",
            "pause_trip",
            "resume_trip",
            "refresh_all_trip_prices",
            "refresh_trip_prices",
            "search_flights",
            "search_hotels",
        ] {
            assert!(names.contains(&expected), "missing tool {expected}");
        }
    }

    #[test]
    fn schemas_are_objects_with_properties() {
        for tool in definitions() {
            assert_eq!(tool.parameters["type"], "object", "{}", tool.name);
            assert!(tool.parameters["properties"].is_object(), "{}", tool.name);
            assert!(tool.parameters["required"].is_array(), "{}", tool.name);
        }
    }

    #[test]
    fn create_trip_requires_nothing_up_front() {
        // Missing fields flow through to the handler's elicitation check.
        let schema = schema_for("create_trip").unwrap();
        assert!(schema["required"].as_array().unwrap().is_empty());
    }

    #[test]
    fn schema_lookup_misses_unknown_tools() {
        assert!(schema_for("launch_rocket").is_none());
    }
}
