use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::model::checkin::CheckinWithClient;
use crate::utils::geo::round_to;

const PLACEHOLDER: &str = "-";
const ONGOING: &str = "Ongoing";

/// One display-ready row of the history table.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct HistoryRow {
    pub id: u64,
    #[schema(example = "2026-01-01")]
    pub date: String,
    pub client_name: String,
    #[schema(example = "12 Mall Road, Gurugram")]
    pub client_address: String,
    #[schema(example = "09:00:00")]
    pub checkin_time: String,
    #[schema(example = "11:30:00")]
    pub checkout_time: String,
    #[schema(example = "2.5h")]
    pub duration: String,
    #[schema(example = "0.08 km")]
    pub distance: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct HistorySummary {
    #[schema(example = 12)]
    pub total_checkins: usize,
    /// Completed sessions only, one decimal
    #[schema(example = 31.5)]
    pub total_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct HistoryReport {
    pub summary: HistorySummary,
    pub rows: Vec<HistoryRow>,
}

/// Hours between check-in and checkout; `None` while the session is open.
pub fn session_hours(checkin: DateTime<Utc>, checkout: Option<DateTime<Utc>>) -> Option<f64> {
    checkout.map(|out| (out - checkin).num_seconds() as f64 / 3600.0)
}

fn format_duration(hours: Option<f64>) -> String {
    match hours {
        Some(h) => format!("{:.1}h", h),
        None => ONGOING.to_string(),
    }
}

fn or_placeholder(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.to_string(),
        _ => PLACEHOLDER.to_string(),
    }
}

impl From<&CheckinWithClient> for HistoryRow {
    fn from(row: &CheckinWithClient) -> Self {
        let c = &row.checkin;
        Self {
            id: c.id,
            date: c.checkin_time.format("%Y-%m-%d").to_string(),
            client_name: row.client_name.clone(),
            client_address: or_placeholder(row.client_address.as_deref()),
            checkin_time: c.checkin_time.format("%H:%M:%S").to_string(),
            checkout_time: c
                .checkout_time
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
            duration: format_duration(session_hours(c.checkin_time, c.checkout_time)),
            distance: if c.distance_from_client > 0.0 {
                format!("{:.2} km", c.distance_from_client)
            } else {
                PLACEHOLDER.to_string()
            },
            notes: or_placeholder(c.notes.as_deref()),
        }
    }
}

pub fn summarize(rows: &[CheckinWithClient]) -> HistorySummary {
    let hours: f64 = rows
        .iter()
        .filter_map(|r| session_hours(r.checkin.checkin_time, r.checkin.checkout_time))
        .sum();

    HistorySummary {
        total_checkins: rows.len(),
        total_hours: round_to(hours, 1),
    }
}

pub fn build_report(rows: &[CheckinWithClient]) -> HistoryReport {
    HistoryReport {
        summary: summarize(rows),
        rows: rows.iter().map(HistoryRow::from).collect(),
    }
}
