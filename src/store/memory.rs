use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Mutex;

use super::{CheckinStore, HistoryFilter, StoreError, StoreResult};
use crate::model::checkin::{CheckinRecord, CheckinStatus, CheckinWithClient, NewCheckin};
use crate::model::client::Client;

/// Same semantics as `DATE(checkin_time) BETWEEN start AND end` in MySQL.
fn in_range(filter: &HistoryFilter, at: DateTime<Utc>) -> bool {
    let day = at.date_naive();
    filter.start_date.is_none_or(|start| day >= start)
        && filter.end_date.is_none_or(|end| day <= end)
}

#[derive(Default)]
struct Tables {
    clients: Vec<Client>,
    assignments: HashSet<(u64, u64)>,
    checkins: Vec<CheckinRecord>,
}

/// `CheckinStore` backed by vectors, with the same one-active-session
/// constraint the MySQL schema enforces.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn with_clients(clients: Vec<Client>) -> Self {
        let store = Self::default();
        store.tables.lock().unwrap().clients = clients;
        store
    }

    pub fn assign(&self, employee_id: u64, client_id: u64) {
        self.tables
            .lock()
            .unwrap()
            .assignments
            .insert((employee_id, client_id));
    }

    pub fn checkins(&self) -> Vec<CheckinRecord> {
        self.tables.lock().unwrap().checkins.clone()
    }

    /// Seeds a record as-is, bypassing the workflow.
    pub fn push_checkin(&self, record: CheckinRecord) {
        self.tables.lock().unwrap().checkins.push(record);
    }

    fn join(tables: &Tables, record: &CheckinRecord) -> Option<CheckinWithClient> {
        let client = tables.clients.iter().find(|c| c.id == record.client_id)?;
        Some(CheckinWithClient {
            checkin: record.clone(),
            client_name: client.name.clone(),
            client_address: client.address.clone(),
        })
    }
}

#[async_trait]
impl CheckinStore for MemoryStore {
    async fn list_clients(&self) -> StoreResult<Vec<Client>> {
        let mut clients = self.tables.lock().unwrap().clients.clone();
        clients.sort_by_key(|c| c.id);
        Ok(clients)
    }

    async fn list_assigned_clients(&self, employee_id: u64) -> StoreResult<Vec<Client>> {
        let tables = self.tables.lock().unwrap();
        let mut clients: Vec<Client> = tables
            .clients
            .iter()
            .filter(|c| tables.assignments.contains(&(employee_id, c.id)))
            .cloned()
            .collect();
        clients.sort_by_key(|c| c.id);
        Ok(clients)
    }

    async fn find_client(&self, client_id: u64) -> StoreResult<Option<Client>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.clients.iter().find(|c| c.id == client_id).cloned())
    }

    async fn is_assigned(&self, employee_id: u64, client_id: u64) -> StoreResult<bool> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.assignments.contains(&(employee_id, client_id)))
    }

    async fn find_active(&self, employee_id: u64) -> StoreResult<Option<CheckinRecord>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .checkins
            .iter()
            .find(|r| r.employee_id == employee_id && r.status == CheckinStatus::CheckedIn)
            .cloned())
    }

    async fn insert_checkin(&self, checkin: NewCheckin) -> StoreResult<u64> {
        let mut tables = self.tables.lock().unwrap();
        let taken = tables
            .checkins
            .iter()
            .any(|r| r.employee_id == checkin.employee_id && r.status == CheckinStatus::CheckedIn);
        if taken {
            return Err(StoreError::ActiveCheckinExists(checkin.employee_id));
        }

        let id = tables.checkins.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        tables.checkins.push(CheckinRecord {
            id,
            employee_id: checkin.employee_id,
            client_id: checkin.client_id,
            latitude: checkin.latitude,
            longitude: checkin.longitude,
            distance_from_client: checkin.distance_from_client,
            notes: checkin.notes,
            status: CheckinStatus::CheckedIn,
            checkin_time: checkin.checkin_time,
            checkout_time: None,
        });
        Ok(id)
    }

    async fn mark_checked_out(&self, checkin_id: u64, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut tables = self.tables.lock().unwrap();
        match tables
            .checkins
            .iter_mut()
            .find(|r| r.id == checkin_id && r.status == CheckinStatus::CheckedIn)
        {
            Some(record) => {
                record.status = CheckinStatus::CheckedOut;
                record.checkout_time = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn history(
        &self,
        employee_id: u64,
        filter: &HistoryFilter,
    ) -> StoreResult<Vec<CheckinWithClient>> {
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<CheckinWithClient> = tables
            .checkins
            .iter()
            .filter(|r| r.employee_id == employee_id && in_range(filter, r.checkin_time))
            .filter_map(|r| Self::join(&tables, r))
            .collect();
        rows.sort_by(|a, b| {
            (b.checkin.checkin_time, b.checkin.id).cmp(&(a.checkin.checkin_time, a.checkin.id))
        });
        Ok(rows)
    }

    async fn active_with_client(&self, employee_id: u64) -> StoreResult<Option<CheckinWithClient>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .checkins
            .iter()
            .filter(|r| r.employee_id == employee_id && r.status == CheckinStatus::CheckedIn)
            .max_by_key(|r| r.checkin_time)
            .and_then(|r| Self::join(&tables, r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    #[test]
    fn date_bounds_are_inclusive() {
        let filter = HistoryFilter {
            start_date: NaiveDate::from_ymd_opt(2026, 3, 1),
            end_date: NaiveDate::from_ymd_opt(2026, 3, 2),
        };
        let at = |d, h| Utc.with_ymd_and_hms(2026, 3, d, h, 0, 0).unwrap();

        assert!(!in_range(&filter, at(1, 0) - chrono::Duration::seconds(1)));
        assert!(in_range(&filter, at(1, 0)));
        assert!(in_range(&filter, at(2, 23)));
        assert!(!in_range(&filter, at(3, 0)));
        assert!(in_range(&HistoryFilter::default(), at(9, 12)));
    }
}
