use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckinStatus {
    CheckedIn,
    CheckedOut,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CheckinRecord {
    pub id: u64,
    pub employee_id: u64,
    pub client_id: u64,
    pub latitude: f64,
    pub longitude: f64,
    /// Kilometers, rounded to 2 decimals
    pub distance_from_client: f64,
    pub notes: Option<String>,
    pub status: CheckinStatus,
    #[schema(example = "2026-01-01T09:00:00Z", format = "date-time", value_type = String)]
    pub checkin_time: DateTime<Utc>,
    #[schema(example = "2026-01-01T17:30:00Z", format = "date-time", value_type = Option<String>)]
    pub checkout_time: Option<DateTime<Utc>>,
}

/// Row to insert; the store assigns the id and the status is always `checked_in`.
#[derive(Debug, Clone)]
pub struct NewCheckin {
    pub employee_id: u64,
    pub client_id: u64,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_from_client: f64,
    pub notes: Option<String>,
    pub checkin_time: DateTime<Utc>,
}

/// A check-in joined with the client it was made at.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[schema(example = json!({
    "id": 41,
    "employee_id": 7,
    "client_id": 3,
    "latitude": 28.4601,
    "longitude": 77.0270,
    "distance_from_client": 0.08,
    "notes": "Quarterly review",
    "status": "checked_out",
    "checkin_time": "2026-01-01T09:00:00Z",
    "checkout_time": "2026-01-01T11:30:00Z",
    "client_name": "Acme Traders",
    "client_address": "12 Mall Road, Gurugram"
}))]
pub struct CheckinWithClient {
    #[serde(flatten)]
    pub checkin: CheckinRecord,
    pub client_name: String,
    pub client_address: Option<String>,
}
