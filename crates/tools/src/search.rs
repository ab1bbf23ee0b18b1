//! One-off flight/hotel search tools.
//!
//! Provider adapters (Amadeus, Kiwi, …) live outside this crate behind
//! the [`SearchProvider`] trait. Deployments without a configured
//! provider register [`UnconfiguredSearch`], which turns every query
//! into a clear tool failure instead of a stream abort.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::{Map, Value};
use uuid::Uuid;

use fw_domain::error::{Error, Result};
use fw_domain::tool::ToolResult;

use crate::handlers::{arg_str, parse_date};
use crate::router::ToolHandler;
use crate::trips::TripStore;

#[derive(Debug, Clone)]
pub struct FlightQuery {
    pub origin: String,
    pub destination: String,
    pub depart_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub adults: u32,
}

#[derive(Debug, Clone)]
pub struct HotelQuery {
    pub city_code: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub rooms: u32,
}

/// External search adapter contract. Implementations return a JSON array
/// of offers in their own shape; the tools pass it through opaquely.
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search_flights(&self, query: &FlightQuery, user_id: Uuid) -> Result<Vec<Value>>;
    async fn search_hotels(&self, query: &HotelQuery, user_id: Uuid) -> Result<Vec<Value>>;
}

/// Placeholder provider for deployments without search credentials.
pub struct UnconfiguredSearch;

#[async_trait::async_trait]
impl SearchProvider for UnconfiguredSearch {
    async fn search_flights(&self, _query: &FlightQuery, _user_id: Uuid) -> Result<Vec<Value>> {
        Err(Error::Other(
            "no flight search provider is configured".into(),
        ))
    }

    async fn search_hotels(&self, _query: &HotelQuery, _user_id: Uuid) -> Result<Vec<Value>> {
        Err(Error::Other("no hotel search provider is configured".into()))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// search_flights
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SearchFlightsTool {
    provider: Arc<dyn SearchProvider>,
}

impl SearchFlightsTool {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait::async_trait]
impl ToolHandler for SearchFlightsTool {
    async fn execute(
        &self,
        args: &Map<String, Value>,
        user_id: Uuid,
        _trips: &TripStore,
    ) -> Result<ToolResult> {
        let depart_date = match parse_date(arg_str(args, "depart_date").unwrap_or_default()) {
            Ok(d) => d,
            Err(r) => return Ok(r),
        };
        let return_date = match arg_str(args, "return_date") {
            Some(raw) => match parse_date(raw) {
                Ok(d) => Some(d),
                Err(r) => return Ok(r),
            },
            None => None,
        };

        let query = FlightQuery {
            origin: arg_str(args, "origin").unwrap_or_default().to_uppercase(),
            destination: arg_str(args, "destination")
                .unwrap_or_default()
                .to_uppercase(),
            depart_date,
            return_date,
            adults: args.get("adults").and_then(Value::as_u64).unwrap_or(1) as u32,
        };

        match self.provider.search_flights(&query, user_id).await {
            Ok(offers) => {
                let mut data = Map::new();
                data.insert("count".into(), Value::Number(offers.len().into()));
                data.insert("offers".into(), Value::Array(offers));
                Ok(ToolResult::success(data))
            }
            Err(e) => Ok(ToolResult::failure(format!(
                "Flight search is unavailable: {e}"
            ))),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// search_hotels
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SearchHotelsTool {
    provider: Arc<dyn SearchProvider>,
}

impl SearchHotelsTool {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait::async_trait]
impl ToolHandler for SearchHotelsTool {
    async fn execute(
        &self,
        args: &Map<String, Value>,
        user_id: Uuid,
        _trips: &TripStore,
    ) -> Result<ToolResult> {
        let check_in = match parse_date(arg_str(args, "check_in").unwrap_or_default()) {
            Ok(d) => d,
            Err(r) => return Ok(r),
        };
        let check_out = match parse_date(arg_str(args, "check_out").unwrap_or_default()) {
            Ok(d) => d,
            Err(r) => return Ok(r),
        };
        if check_out <= check_in {
            return Ok(ToolResult::failure("check_out must be after check_in"));
        }

        let query = HotelQuery {
            city_code: arg_str(args, "city_code")
                .unwrap_or_default()
                .to_uppercase(),
            check_in,
            check_out,
            rooms: args.get("rooms").and_then(Value::as_u64).unwrap_or(1) as u32,
        };

        match self.provider.search_hotels(&query, user_id).await {
            Ok(offers) => {
                let mut data = Map::new();
                data.insert("count".into(), Value::Number(offers.len().into()));
                data.insert("offers".into(), Value::Array(offers));
                Ok(ToolResult::success(data))
            }
            Err(e) => Ok(ToolResult::failure(format!(
                "Hotel search is unavailable: {e}"
            ))),
        }
    }
}
