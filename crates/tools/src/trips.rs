//! In-memory trip store.
//!
//! Domain persistence for the tool handlers: trips, notification rules,
//! and the per-user refresh lock. Every query is scoped by the owning
//! user. The price-refresh workflow itself runs out of process; the store
//! only tracks the lock that keeps one refresh in flight per user.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How long a refresh lock is honored before it is considered stale.
const REFRESH_LOCK_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    Active,
    Paused,
    Error,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Active => "active",
            TripStatus::Paused => "paused",
            TripStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(TripStatus::Active),
            "paused" => Some(TripStatus::Paused),
            "error" => Some(TripStatus::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdType {
    TripTotal,
    FlightTotal,
    HotelTotal,
}

impl ThresholdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThresholdType::TripTotal => "trip_total",
            ThresholdType::FlightTotal => "flight_total",
            ThresholdType::HotelTotal => "hotel_total",
        }
    }

    /// Unknown strings fall back to the trip total.
    pub fn parse_or_default(s: &str) -> Self {
        match s {
            "flight_total" => ThresholdType::FlightTotal,
            "hotel_total" => ThresholdType::HotelTotal,
            _ => ThresholdType::TripTotal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NotificationRule {
    pub threshold_value: f64,
    pub threshold_type: ThresholdType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub origin_airport: String,
    pub destination_code: String,
    pub depart_date: NaiveDate,
    pub return_date: NaiveDate,
    pub adults: u32,
    pub is_round_trip: bool,
    pub status: TripStatus,
    pub notification: Option<NotificationRule>,
    /// Latest tracked total price, updated by the refresh workflow.
    pub latest_total_price: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Input for trip creation; the store assigns id, status, and timestamp.
#[derive(Debug, Clone)]
pub struct NewTrip {
    pub name: String,
    pub origin_airport: String,
    pub destination_code: String,
    pub depart_date: NaiveDate,
    pub return_date: NaiveDate,
    pub adults: u32,
    pub is_round_trip: bool,
    pub notification: Option<NotificationRule>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct TripStore {
    trips: RwLock<HashMap<Uuid, Trip>>,
    refresh_locks: Mutex<HashMap<Uuid, (String, Instant)>>,
}

impl Default for TripStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TripStore {
    pub fn new() -> Self {
        Self {
            trips: RwLock::new(HashMap::new()),
            refresh_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn create(&self, user_id: Uuid, new_trip: NewTrip) -> Trip {
        let trip = Trip {
            id: Uuid::new_v4(),
            user_id,
            name: new_trip.name,
            origin_airport: new_trip.origin_airport,
            destination_code: new_trip.destination_code,
            depart_date: new_trip.depart_date,
            return_date: new_trip.return_date,
            adults: new_trip.adults,
            is_round_trip: new_trip.is_round_trip,
            status: TripStatus::Active,
            notification: new_trip.notification,
            latest_total_price: None,
            created_at: Utc::now(),
        };
        self.trips.write().insert(trip.id, trip.clone());
        trip
    }

    pub fn get(&self, id: Uuid, user_id: Uuid) -> Option<Trip> {
        self.trips
            .read()
            .get(&id)
            .filter(|t| t.user_id == user_id)
            .cloned()
    }

    /// Trips for a user, newest first, optionally filtered by status.
    pub fn list(&self, user_id: Uuid, status: Option<TripStatus>) -> Vec<Trip> {
        let mut trips: Vec<Trip> = self
            .trips
            .read()
            .values()
            .filter(|t| t.user_id == user_id)
            .filter(|t| status.is_none_or(|s| t.status == s))
            .cloned()
            .collect();
        trips.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        trips
    }

    pub fn count(&self, user_id: Uuid) -> usize {
        self.trips
            .read()
            .values()
            .filter(|t| t.user_id == user_id)
            .count()
    }

    pub fn name_exists(&self, user_id: Uuid, name: &str) -> bool {
        self.trips
            .read()
            .values()
            .any(|t| t.user_id == user_id && t.name == name)
    }

    pub fn delete(&self, id: Uuid, user_id: Uuid) -> bool {
        let mut trips = self.trips.write();
        if trips.get(&id).is_some_and(|t| t.user_id == user_id) {
            trips.remove(&id);
            true
        } else {
            false
        }
    }

    pub fn set_status(&self, id: Uuid, user_id: Uuid, status: TripStatus) -> Option<Trip> {
        let mut trips = self.trips.write();
        let trip = trips.get_mut(&id).filter(|t| t.user_id == user_id)?;
        trip.status = status;
        Some(trip.clone())
    }

    pub fn set_notification(
        &self,
        id: Uuid,
        user_id: Uuid,
        rule: NotificationRule,
    ) -> Option<Trip> {
        let mut trips = self.trips.write();
        let trip = trips.get_mut(&id).filter(|t| t.user_id == user_id)?;
        trip.notification = Some(rule);
        Some(trip.clone())
    }

    /// Record a price observation (called by the refresh workflow's
    /// ingestion path and by tests).
    pub fn record_price(&self, id: Uuid, total_price: f64) -> bool {
        let mut trips = self.trips.write();
        match trips.get_mut(&id) {
            Some(trip) => {
                trip.latest_total_price = Some(total_price);
                true
            }
            None => false,
        }
    }

    // ── Refresh lock ───────────────────────────────────────────────

    /// Claim the per-user refresh lock. Returns the id of the refresh
    /// already in flight when the lock is held and fresh.
    pub fn begin_refresh(&self, user_id: Uuid, workflow_id: &str) -> Result<(), String> {
        let mut locks = self.refresh_locks.lock();
        if let Some((existing, claimed_at)) = locks.get(&user_id) {
            if claimed_at.elapsed() < REFRESH_LOCK_TTL {
                return Err(existing.clone());
            }
        }
        locks.insert(user_id, (workflow_id.to_string(), Instant::now()));
        Ok(())
    }

    /// Release the refresh lock (trigger failed or workflow reported in).
    pub fn end_refresh(&self, user_id: Uuid) {
        self.refresh_locks.lock().remove(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_trip(name: &str) -> NewTrip {
        NewTrip {
            name: name.into(),
            origin_airport: "SFO".into(),
            destination_code: "HNL".into(),
            depart_date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            return_date: NaiveDate::from_ymd_opt(2026, 9, 10).unwrap(),
            adults: 2,
            is_round_trip: true,
            notification: None,
        }
    }

    #[test]
    fn create_and_get_scoped_by_owner() {
        let store = TripStore::new();
        let owner = Uuid::new_v4();
        let trip = store.create(owner, new_trip("Maui"));
        assert_eq!(trip.status, TripStatus::Active);
        assert!(store.get(trip.id, owner).is_some());
        assert!(store.get(trip.id, Uuid::new_v4()).is_none());
    }

    #[test]
    fn list_filters_by_status() {
        let store = TripStore::new();
        let user = Uuid::new_v4();
        let a = store.create(user, new_trip("a"));
        let _b = store.create(user, new_trip("b"));
        store.set_status(a.id, user, TripStatus::Paused);

        assert_eq!(store.list(user, None).len(), 2);
        let paused = store.list(user, Some(TripStatus::Paused));
        assert_eq!(paused.len(), 1);
        assert_eq!(paused[0].id, a.id);
    }

    #[test]
    fn delete_checks_owner() {
        let store = TripStore::new();
        let owner = Uuid::new_v4();
        let trip = store.create(owner, new_trip("x"));
        assert!(!store.delete(trip.id, Uuid::new_v4()));
        assert!(store.delete(trip.id, owner));
        assert_eq!(store.count(owner), 0);
    }

    #[test]
    fn duplicate_names_detected_per_user() {
        let store = TripStore::new();
        let user = Uuid::new_v4();
        store.create(user, new_trip("Maui"));
        assert!(store.name_exists(user, "Maui"));
        assert!(!store.name_exists(user, "Kauai"));
        assert!(!store.name_exists(Uuid::new_v4(), "Maui"));
    }

    #[test]
    fn refresh_lock_is_exclusive_per_user() {
        let store = TripStore::new();
        let user = Uuid::new_v4();
        assert!(store.begin_refresh(user, "wf-1").is_ok());
        assert_eq!(store.begin_refresh(user, "wf-2"), Err("wf-1".into()));
        // Another user is unaffected.
        assert!(store.begin_refresh(Uuid::new_v4(), "wf-3").is_ok());

        store.end_refresh(user);
        assert!(store.begin_refresh(user, "wf-4").is_ok());
    }

    #[test]
    fn record_price_updates_latest() {
        let store = TripStore::new();
        let user = Uuid::new_v4();
        let trip = store.create(user, new_trip("p"));
        assert!(store.record_price(trip.id, 1432.50));
        assert_eq!(
            store.get(trip.id, user).unwrap().latest_total_price,
            Some(1432.50)
        );
        assert!(!store.record_price(Uuid::new_v4(), 1.0));
    }
}
