use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use thiserror::Error;
use utoipa::IntoParams;

use crate::model::checkin::{CheckinRecord, CheckinWithClient, NewCheckin};
use crate::model::client::Client;

#[cfg(test)]
pub mod memory;
pub mod mysql;

pub use mysql::MySqlCheckinStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Insert hit the one-active-check-in-per-employee constraint.
    #[error("employee {0} already has an active check-in")]
    ActiveCheckinExists(u64),

    #[error("unreadable row: {0}")]
    CorruptRow(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Inclusive bounds on the calendar date (UTC) of `checkin_time`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryFilter {
    /// Earliest check-in date, `YYYY-MM-DD`
    #[param(value_type = Option<String>, format = "date", example = "2026-01-01")]
    pub start_date: Option<NaiveDate>,
    /// Latest check-in date, `YYYY-MM-DD`
    #[param(value_type = Option<String>, format = "date", example = "2026-01-31")]
    pub end_date: Option<NaiveDate>,
}

/// Persistence operations used by the check-in workflow.
#[async_trait]
pub trait CheckinStore: Send + Sync {
    async fn list_clients(&self) -> StoreResult<Vec<Client>>;

    async fn list_assigned_clients(&self, employee_id: u64) -> StoreResult<Vec<Client>>;

    async fn find_client(&self, client_id: u64) -> StoreResult<Option<Client>>;

    async fn is_assigned(&self, employee_id: u64, client_id: u64) -> StoreResult<bool>;

    /// The employee's record with status `checked_in`, if any.
    async fn find_active(&self, employee_id: u64) -> StoreResult<Option<CheckinRecord>>;

    /// Returns the new record id.
    async fn insert_checkin(&self, checkin: NewCheckin) -> StoreResult<u64>;

    /// Flips an active record to `checked_out`. `false` if it was not active.
    async fn mark_checked_out(&self, checkin_id: u64, at: DateTime<Utc>) -> StoreResult<bool>;

    /// Newest first.
    async fn history(
        &self,
        employee_id: u64,
        filter: &HistoryFilter,
    ) -> StoreResult<Vec<CheckinWithClient>>;

    async fn active_with_client(&self, employee_id: u64) -> StoreResult<Option<CheckinWithClient>>;
}
