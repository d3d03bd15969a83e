use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, MySqlPool};
use std::str::FromStr;
use tracing::debug;

use super::{CheckinStore, HistoryFilter, StoreError, StoreResult};
use crate::model::checkin::{CheckinRecord, CheckinStatus, CheckinWithClient, NewCheckin};
use crate::model::client::Client;

const CHECKIN_COLUMNS: &str = r#"
    ch.id, ch.employee_id, ch.client_id, ch.latitude, ch.longitude,
    ch.distance_from_client, ch.notes, ch.status, ch.checkin_time, ch.checkout_time
"#;

#[derive(FromRow)]
struct CheckinRow {
    id: u64,
    employee_id: u64,
    client_id: u64,
    latitude: f64,
    longitude: f64,
    distance_from_client: f64,
    notes: Option<String>,
    status: String,
    checkin_time: DateTime<Utc>,
    checkout_time: Option<DateTime<Utc>>,
}

#[derive(FromRow)]
struct CheckinClientRow {
    #[sqlx(flatten)]
    checkin: CheckinRow,
    client_name: String,
    client_address: Option<String>,
}

impl TryFrom<CheckinRow> for CheckinRecord {
    type Error = StoreError;

    fn try_from(row: CheckinRow) -> Result<Self, Self::Error> {
        let status = CheckinStatus::from_str(&row.status).map_err(|_| {
            StoreError::CorruptRow(format!("checkin {} has status {:?}", row.id, row.status))
        })?;

        Ok(CheckinRecord {
            id: row.id,
            employee_id: row.employee_id,
            client_id: row.client_id,
            latitude: row.latitude,
            longitude: row.longitude,
            distance_from_client: row.distance_from_client,
            notes: row.notes,
            status,
            checkin_time: row.checkin_time,
            checkout_time: row.checkout_time,
        })
    }
}

impl TryFrom<CheckinClientRow> for CheckinWithClient {
    type Error = StoreError;

    fn try_from(row: CheckinClientRow) -> Result<Self, Self::Error> {
        Ok(CheckinWithClient {
            checkin: row.checkin.try_into()?,
            client_name: row.client_name,
            client_address: row.client_address,
        })
    }
}

#[derive(Clone)]
pub struct MySqlCheckinStore {
    pool: MySqlPool,
}

impl MySqlCheckinStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckinStore for MySqlCheckinStore {
    async fn list_clients(&self) -> StoreResult<Vec<Client>> {
        let clients = sqlx::query_as::<_, Client>(
            "SELECT id, name, address, latitude, longitude FROM clients ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(clients)
    }

    async fn list_assigned_clients(&self, employee_id: u64) -> StoreResult<Vec<Client>> {
        let clients = sqlx::query_as::<_, Client>(
            r#"
            SELECT c.id, c.name, c.address, c.latitude, c.longitude
            FROM clients c
            INNER JOIN employee_clients ec ON c.id = ec.client_id
            WHERE ec.employee_id = ?
            ORDER BY c.id
            "#,
        )
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(clients)
    }

    async fn find_client(&self, client_id: u64) -> StoreResult<Option<Client>> {
        let client = sqlx::query_as::<_, Client>(
            "SELECT id, name, address, latitude, longitude FROM clients WHERE id = ?",
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(client)
    }

    async fn is_assigned(&self, employee_id: u64, client_id: u64) -> StoreResult<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM employee_clients WHERE employee_id = ? AND client_id = ?",
        )
        .bind(employee_id)
        .bind(client_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn find_active(&self, employee_id: u64) -> StoreResult<Option<CheckinRecord>> {
        let sql = format!(
            "SELECT {CHECKIN_COLUMNS} FROM checkins ch WHERE ch.employee_id = ? AND ch.status = 'checked_in' LIMIT 1"
        );
        sqlx::query_as::<_, CheckinRow>(&sql)
            .bind(employee_id)
            .fetch_optional(&self.pool)
            .await?
            .map(CheckinRecord::try_from)
            .transpose()
    }

    async fn insert_checkin(&self, checkin: NewCheckin) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO checkins
                (employee_id, client_id, latitude, longitude, distance_from_client, notes, status, checkin_time)
            VALUES (?, ?, ?, ?, ?, ?, 'checked_in', ?)
            "#,
        )
        .bind(checkin.employee_id)
        .bind(checkin.client_id)
        .bind(checkin.latitude)
        .bind(checkin.longitude)
        .bind(checkin.distance_from_client)
        .bind(&checkin.notes)
        .bind(checkin.checkin_time)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.last_insert_id()),
            Err(e) => {
                // uq_checkins_active_employee
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_unique_violation() {
                        return Err(StoreError::ActiveCheckinExists(checkin.employee_id));
                    }
                }
                Err(e.into())
            }
        }
    }

    async fn mark_checked_out(&self, checkin_id: u64, at: DateTime<Utc>) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE checkins
            SET status = 'checked_out', checkout_time = ?
            WHERE id = ?
            AND status = 'checked_in'
            "#,
        )
        .bind(at)
        .bind(checkin_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn history(
        &self,
        employee_id: u64,
        filter: &HistoryFilter,
    ) -> StoreResult<Vec<CheckinWithClient>> {
        let mut where_sql = String::from(" WHERE ch.employee_id = ?");
        let mut dates: Vec<NaiveDate> = Vec::new();

        if let Some(start) = filter.start_date {
            where_sql.push_str(" AND DATE(ch.checkin_time) >= ?");
            dates.push(start);
        }
        if let Some(end) = filter.end_date {
            where_sql.push_str(" AND DATE(ch.checkin_time) <= ?");
            dates.push(end);
        }

        let sql = format!(
            r#"
            SELECT {CHECKIN_COLUMNS}, c.name AS client_name, c.address AS client_address
            FROM checkins ch
            INNER JOIN clients c ON ch.client_id = c.id
            {where_sql}
            ORDER BY ch.checkin_time DESC, ch.id DESC
            "#
        );
        debug!(sql = %sql, employee_id, ?filter, "Fetching check-in history");

        let mut query = sqlx::query_as::<_, CheckinClientRow>(&sql).bind(employee_id);
        for date in dates {
            query = query.bind(date);
        }

        query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(CheckinWithClient::try_from)
            .collect()
    }

    async fn active_with_client(&self, employee_id: u64) -> StoreResult<Option<CheckinWithClient>> {
        let sql = format!(
            r#"
            SELECT {CHECKIN_COLUMNS}, c.name AS client_name, c.address AS client_address
            FROM checkins ch
            INNER JOIN clients c ON ch.client_id = c.id
            WHERE ch.employee_id = ? AND ch.status = 'checked_in'
            ORDER BY ch.checkin_time DESC
            LIMIT 1
            "#
        );
        sqlx::query_as::<_, CheckinClientRow>(&sql)
            .bind(employee_id)
            .fetch_optional(&self.pool)
            .await?
            .map(CheckinWithClient::try_from)
            .transpose()
    }
}
