//! Check-in workflow: each step is a terminal failure point, checked in order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::model::checkin::{CheckinWithClient, NewCheckin};
use crate::model::client::Client;
use crate::store::{CheckinStore, HistoryFilter, StoreError};
use crate::utils::geo::distance_km;

pub const MSG_CHECKED_IN: &str = "Checked in successfully";
pub const MSG_ALREADY_ACTIVE: &str = "You already have an active check-in. Please checkout first.";
pub const MSG_NO_ACTIVE: &str = "No active check-in found";

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateCheckin {
    #[schema(example = 3)]
    pub client_id: Option<u64>,
    #[schema(example = 28.4601)]
    pub latitude: Option<f64>,
    #[schema(example = 77.0270)]
    pub longitude: Option<f64>,
    #[schema(example = "Quarterly review")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CheckinReceipt {
    #[schema(example = 41)]
    pub id: u64,
    /// Kilometers from the client's registered location
    #[schema(example = 0.74)]
    pub distance: f64,
    /// Present when the check-in was made far from the client
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "You are 0.74km away from client location")]
    pub warning: Option<String>,
}

#[derive(Debug)]
pub struct CheckinOutcome {
    pub message: String,
    pub receipt: CheckinReceipt,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CheckoutReceipt {
    #[schema(example = 41)]
    pub id: u64,
    #[schema(example = "2026-01-01T17:30:00Z", format = "date-time", value_type = String)]
    pub checkout_time: DateTime<Utc>,
}

/// Clients the actor may check in to: all of them for managers, otherwise
/// only assigned ones.
pub async fn list_clients(
    store: &dyn CheckinStore,
    actor: &AuthUser,
) -> Result<Vec<Client>, ApiError> {
    let clients = if actor.is_manager() {
        store.list_clients().await
    } else {
        store.list_assigned_clients(actor.user_id).await
    };
    clients.map_err(ApiError::persistence("Failed to fetch clients"))
}

pub async fn create_checkin(
    store: &dyn CheckinStore,
    actor: &AuthUser,
    payload: CreateCheckin,
    warning_distance_km: f64,
    now: DateTime<Utc>,
) -> Result<CheckinOutcome, ApiError> {
    let (Some(client_id), Some(latitude), Some(longitude)) =
        (payload.client_id, payload.latitude, payload.longitude)
    else {
        return Err(ApiError::Validation("Client and location data required".into()));
    };

    let client = store
        .find_client(client_id)
        .await
        .map_err(ApiError::persistence("Check-in failed"))?
        .ok_or_else(|| ApiError::NotFound("Client not found".into()))?;

    if !actor.is_manager() {
        let assigned = store
            .is_assigned(actor.user_id, client_id)
            .await
            .map_err(ApiError::persistence("Check-in failed"))?;
        if !assigned {
            warn!(employee_id = actor.user_id, client_id, "Check-in to unassigned client");
            return Err(ApiError::Forbidden("You are not assigned to this client".into()));
        }
    }

    let active = store
        .find_active(actor.user_id)
        .await
        .map_err(ApiError::persistence("Check-in failed"))?;
    if active.is_some() {
        return Err(ApiError::Conflict(MSG_ALREADY_ACTIVE.into()));
    }

    let distance = distance_km(latitude, longitude, client.latitude, client.longitude);
    let warning = (distance > warning_distance_km)
        .then(|| format!("You are {distance}km away from client location"));

    let id = store
        .insert_checkin(NewCheckin {
            employee_id: actor.user_id,
            client_id,
            latitude,
            longitude,
            distance_from_client: distance,
            notes: payload.notes.filter(|n| !n.trim().is_empty()),
            checkin_time: now,
        })
        .await
        .map_err(|e| match e {
            // lost the race against a concurrent check-in
            StoreError::ActiveCheckinExists(_) => ApiError::Conflict(MSG_ALREADY_ACTIVE.into()),
            other => ApiError::persistence("Check-in failed")(other),
        })?;

    info!(checkin_id = id, employee_id = actor.user_id, client_id, distance, "Checked in");

    let message = match &warning {
        Some(w) => format!("{MSG_CHECKED_IN} (Warning: {w})"),
        None => MSG_CHECKED_IN.to_string(),
    };

    Ok(CheckinOutcome {
        message,
        receipt: CheckinReceipt {
            id,
            distance,
            warning,
        },
    })
}

/// Closes the actor's active check-in.
pub async fn checkout(
    store: &dyn CheckinStore,
    actor: &AuthUser,
    now: DateTime<Utc>,
) -> Result<CheckoutReceipt, ApiError> {
    let active = store
        .find_active(actor.user_id)
        .await
        .map_err(ApiError::persistence("Checkout failed"))?
        .ok_or_else(|| ApiError::NotFound(MSG_NO_ACTIVE.into()))?;

    let closed = store
        .mark_checked_out(active.id, now)
        .await
        .map_err(ApiError::persistence("Checkout failed"))?;
    if !closed {
        return Err(ApiError::NotFound(MSG_NO_ACTIVE.into()));
    }

    info!(checkin_id = active.id, employee_id = actor.user_id, "Checked out");

    Ok(CheckoutReceipt {
        id: active.id,
        checkout_time: now,
    })
}

pub async fn history(
    store: &dyn CheckinStore,
    actor: &AuthUser,
    filter: &HistoryFilter,
) -> Result<Vec<CheckinWithClient>, ApiError> {
    if let (Some(start), Some(end)) = (filter.start_date, filter.end_date) {
        if start > end {
            return Err(ApiError::Validation("start_date cannot be after end_date".into()));
        }
    }

    store
        .history(actor.user_id, filter)
        .await
        .map_err(ApiError::persistence("Failed to fetch history"))
}

pub async fn active(
    store: &dyn CheckinStore,
    actor: &AuthUser,
) -> Result<Option<CheckinWithClient>, ApiError> {
    store
        .active_with_client(actor.user_id)
        .await
        .map_err(ApiError::persistence("Failed to fetch active check-in"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::checkin::CheckinStatus;
    use crate::model::role::Role;
    use crate::store::memory::MemoryStore;
    use chrono::{Duration, NaiveDate, TimeZone};

    const WARN_KM: f64 = 0.5;

    fn employee(id: u64) -> AuthUser {
        AuthUser {
            user_id: id,
            username: format!("emp{id}"),
            role: Role::Employee,
        }
    }

    fn manager(id: u64) -> AuthUser {
        AuthUser {
            user_id: id,
            username: format!("mgr{id}"),
            role: Role::Manager,
        }
    }

    fn store() -> MemoryStore {
        let store = MemoryStore::with_clients(vec![
            Client {
                id: 1,
                name: "Acme Traders".into(),
                address: Some("12 Mall Road".into()),
                latitude: 28.4595,
                longitude: 77.0266,
            },
            Client {
                id: 2,
                name: "Globex".into(),
                address: None,
                latitude: 19.0760,
                longitude: 72.8777,
            },
        ]);
        store.assign(10, 1);
        store
    }

    fn at_client_1() -> CreateCheckin {
        CreateCheckin {
            client_id: Some(1),
            latitude: Some(28.4596),
            longitude: Some(77.0267),
            notes: Some("Quarterly review".into()),
        }
    }

    fn t(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    #[actix_rt::test]
    async fn missing_fields_are_rejected() {
        let store = store();
        for payload in [
            CreateCheckin { client_id: None, ..at_client_1() },
            CreateCheckin { latitude: None, ..at_client_1() },
            CreateCheckin { longitude: None, ..at_client_1() },
        ] {
            let err = create_checkin(&store, &employee(10), payload, WARN_KM, t(1, 9))
                .await
                .unwrap_err();
            assert!(matches!(err, ApiError::Validation(_)), "{err:?}");
        }
        assert!(store.checkins().is_empty());
    }

    #[actix_rt::test]
    async fn zero_coordinates_are_not_missing() {
        let store = store();
        let payload = CreateCheckin {
            latitude: Some(0.0),
            longitude: Some(0.0),
            ..at_client_1()
        };
        let outcome = create_checkin(&store, &employee(10), payload, WARN_KM, t(1, 9))
            .await
            .unwrap();
        assert!(outcome.receipt.warning.is_some());
    }

    #[actix_rt::test]
    async fn unknown_client_is_not_found() {
        let store = store();
        let payload = CreateCheckin { client_id: Some(99), ..at_client_1() };
        let err = create_checkin(&store, &manager(1), payload, WARN_KM, t(1, 9))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "Client not found"));
    }

    #[actix_rt::test]
    async fn employee_needs_assignment() {
        let store = store();
        let payload = CreateCheckin { client_id: Some(2), ..at_client_1() };
        let err = create_checkin(&store, &employee(10), payload, WARN_KM, t(1, 9))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        // assigned to client 1, but a different employee
        let err = create_checkin(&store, &employee(11), at_client_1(), WARN_KM, t(1, 9))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[actix_rt::test]
    async fn manager_skips_assignment() {
        let store = store();
        let payload = CreateCheckin { client_id: Some(2), ..at_client_1() };
        let outcome = create_checkin(&store, &manager(1), payload, WARN_KM, t(1, 9))
            .await
            .unwrap();
        assert_eq!(store.checkins().len(), 1);
        assert_eq!(store.checkins()[0].id, outcome.receipt.id);
    }

    #[actix_rt::test]
    async fn nearby_checkin_has_no_warning() {
        let store = store();
        let outcome = create_checkin(&store, &employee(10), at_client_1(), WARN_KM, t(1, 9))
            .await
            .unwrap();

        assert_eq!(outcome.message, MSG_CHECKED_IN);
        assert_eq!(outcome.receipt.distance, 0.01);
        assert_eq!(outcome.receipt.warning, None);

        let saved = &store.checkins()[0];
        assert_eq!(saved.status, CheckinStatus::CheckedIn);
        assert_eq!(saved.employee_id, 10);
        assert_eq!(saved.distance_from_client, 0.01);
        assert_eq!(saved.notes.as_deref(), Some("Quarterly review"));
        assert_eq!(saved.checkin_time, t(1, 9));
        assert_eq!(saved.checkout_time, None);
    }

    #[actix_rt::test]
    async fn far_checkin_warns_but_succeeds() {
        let store = store();
        // ~1.11 km north of client 1
        let payload = CreateCheckin {
            latitude: Some(28.4695),
            longitude: Some(77.0266),
            notes: Some("   ".into()),
            ..at_client_1()
        };
        let outcome = create_checkin(&store, &employee(10), payload, WARN_KM, t(1, 9))
            .await
            .unwrap();

        assert_eq!(outcome.receipt.distance, 1.11);
        assert_eq!(
            outcome.message,
            "Checked in successfully (Warning: You are 1.11km away from client location)"
        );
        assert_eq!(
            outcome.receipt.warning.as_deref(),
            Some("You are 1.11km away from client location")
        );
        assert_eq!(store.checkins()[0].notes, None);
    }

    #[actix_rt::test]
    async fn warning_threshold_is_configurable() {
        let store = store();
        let payload = CreateCheckin {
            latitude: Some(28.4695),
            longitude: Some(77.0266),
            ..at_client_1()
        };
        let outcome = create_checkin(&store, &employee(10), payload, 2.0, t(1, 9))
            .await
            .unwrap();
        assert_eq!(outcome.receipt.warning, None);
    }

    #[actix_rt::test]
    async fn second_checkin_conflicts_regardless_of_input() {
        let store = store();
        create_checkin(&store, &manager(1), at_client_1(), WARN_KM, t(1, 9))
            .await
            .unwrap();

        let other_client = CreateCheckin { client_id: Some(2), ..at_client_1() };
        let err = create_checkin(&store, &manager(1), other_client, WARN_KM, t(1, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(ref m) if m == MSG_ALREADY_ACTIVE));
        assert_eq!(store.checkins().len(), 1);
    }

    /// Passes the `find_active` pre-check, then loses the insert to a
    /// concurrent check-in already stored for the same employee.
    struct RacingStore(MemoryStore);

    #[async_trait::async_trait]
    impl CheckinStore for RacingStore {
        async fn list_clients(&self) -> crate::store::StoreResult<Vec<Client>> {
            self.0.list_clients().await
        }

        async fn list_assigned_clients(
            &self,
            employee_id: u64,
        ) -> crate::store::StoreResult<Vec<Client>> {
            self.0.list_assigned_clients(employee_id).await
        }

        async fn find_client(&self, client_id: u64) -> crate::store::StoreResult<Option<Client>> {
            self.0.find_client(client_id).await
        }

        async fn is_assigned(
            &self,
            employee_id: u64,
            client_id: u64,
        ) -> crate::store::StoreResult<bool> {
            self.0.is_assigned(employee_id, client_id).await
        }

        async fn find_active(
            &self,
            _employee_id: u64,
        ) -> crate::store::StoreResult<Option<crate::model::checkin::CheckinRecord>> {
            Ok(None)
        }

        async fn insert_checkin(&self, checkin: NewCheckin) -> crate::store::StoreResult<u64> {
            self.0.insert_checkin(checkin).await
        }

        async fn mark_checked_out(
            &self,
            checkin_id: u64,
            at: DateTime<Utc>,
        ) -> crate::store::StoreResult<bool> {
            self.0.mark_checked_out(checkin_id, at).await
        }

        async fn history(
            &self,
            employee_id: u64,
            filter: &HistoryFilter,
        ) -> crate::store::StoreResult<Vec<CheckinWithClient>> {
            self.0.history(employee_id, filter).await
        }

        async fn active_with_client(
            &self,
            employee_id: u64,
        ) -> crate::store::StoreResult<Option<CheckinWithClient>> {
            self.0.active_with_client(employee_id).await
        }
    }

    #[actix_rt::test]
    async fn lost_insert_race_is_conflict() {
        use actix_web::{ResponseError, http::StatusCode};

        let store = RacingStore(store());
        create_checkin(&store, &employee(10), at_client_1(), WARN_KM, t(1, 9))
            .await
            .unwrap();

        let err = create_checkin(&store, &employee(10), at_client_1(), WARN_KM, t(1, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(ref m) if m == MSG_ALREADY_ACTIVE));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(store.0.checkins().len(), 1);
    }

    #[actix_rt::test]
    async fn store_rejects_second_active_session() {
        let store = store();
        store.push_checkin(crate::model::checkin::CheckinRecord {
            id: 5,
            employee_id: 10,
            client_id: 1,
            latitude: 0.0,
            longitude: 0.0,
            distance_from_client: 0.0,
            notes: None,
            status: CheckinStatus::CheckedIn,
            checkin_time: t(1, 8),
            checkout_time: None,
        });
        let err = store
            .insert_checkin(NewCheckin {
                employee_id: 10,
                client_id: 1,
                latitude: 0.0,
                longitude: 0.0,
                distance_from_client: 0.0,
                notes: None,
                checkin_time: t(1, 9),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ActiveCheckinExists(10)));
    }

    #[actix_rt::test]
    async fn checkout_without_record_is_not_found() {
        let store = store();
        let err = checkout(&store, &employee(10), t(1, 17)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(ref m) if m == MSG_NO_ACTIVE));
    }

    #[actix_rt::test]
    async fn checkout_closes_active_record() {
        let store = store();
        let outcome = create_checkin(&store, &employee(10), at_client_1(), WARN_KM, t(1, 9))
            .await
            .unwrap();

        let receipt = checkout(&store, &employee(10), t(1, 17)).await.unwrap();
        assert_eq!(receipt.id, outcome.receipt.id);
        assert_eq!(receipt.checkout_time, t(1, 17));

        let saved = &store.checkins()[0];
        assert_eq!(saved.status, CheckinStatus::CheckedOut);
        assert_eq!(saved.checkout_time, Some(t(1, 17)));

        // nothing active any more
        let err = checkout(&store, &employee(10), t(1, 18)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        // and a fresh check-in is allowed again
        create_checkin(&store, &employee(10), at_client_1(), WARN_KM, t(2, 9))
            .await
            .unwrap();
    }

    #[actix_rt::test]
    async fn checkout_only_touches_own_session() {
        let store = store();
        create_checkin(&store, &manager(1), at_client_1(), WARN_KM, t(1, 9))
            .await
            .unwrap();
        let err = checkout(&store, &employee(10), t(1, 17)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(store.checkins()[0].status, CheckinStatus::CheckedIn);
    }

    #[actix_rt::test]
    async fn clients_depend_on_role() {
        let store = store();
        let all = list_clients(&store, &manager(1)).await.unwrap();
        assert_eq!(all.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 2]);

        let assigned = list_clients(&store, &employee(10)).await.unwrap();
        assert_eq!(assigned.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1]);

        assert!(list_clients(&store, &employee(11)).await.unwrap().is_empty());
    }

    async fn seed_three_days(store: &MemoryStore, actor: &AuthUser) {
        for day in 1..=3 {
            create_checkin(store, actor, at_client_1(), WARN_KM, t(day, 9))
                .await
                .unwrap();
            checkout(store, actor, t(day, 9) + Duration::minutes(90))
                .await
                .unwrap();
        }
    }

    #[actix_rt::test]
    async fn history_is_newest_first_and_joined() {
        let store = store();
        let actor = employee(10);
        seed_three_days(&store, &actor).await;

        let rows = history(&store, &actor, &HistoryFilter::default()).await.unwrap();
        let days: Vec<_> = rows.iter().map(|r| r.checkin.checkin_time).collect();
        assert_eq!(days, vec![t(3, 9), t(2, 9), t(1, 9)]);
        assert!(rows.iter().all(|r| r.client_name == "Acme Traders"));
        assert_eq!(rows[0].client_address.as_deref(), Some("12 Mall Road"));

        // other employees see nothing
        assert!(
            history(&store, &employee(11), &HistoryFilter::default())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[actix_rt::test]
    async fn history_date_filters_are_inclusive() {
        let store = store();
        let actor = employee(10);
        seed_three_days(&store, &actor).await;

        let filter = HistoryFilter {
            start_date: NaiveDate::from_ymd_opt(2026, 3, 2),
            end_date: NaiveDate::from_ymd_opt(2026, 3, 3),
        };
        let rows = history(&store, &actor, &filter).await.unwrap();
        assert_eq!(rows.len(), 2);

        let only_start = HistoryFilter {
            start_date: NaiveDate::from_ymd_opt(2026, 3, 3),
            end_date: None,
        };
        assert_eq!(history(&store, &actor, &only_start).await.unwrap().len(), 1);
    }

    #[actix_rt::test]
    async fn inverted_range_is_rejected() {
        let store = store();
        let filter = HistoryFilter {
            start_date: NaiveDate::from_ymd_opt(2026, 3, 5),
            end_date: NaiveDate::from_ymd_opt(2026, 3, 1),
        };
        let err = history(&store, &employee(10), &filter).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[actix_rt::test]
    async fn active_follows_session_state() {
        let store = store();
        let actor = employee(10);
        assert_eq!(active(&store, &actor).await.unwrap(), None);

        create_checkin(&store, &actor, at_client_1(), WARN_KM, t(1, 9))
            .await
            .unwrap();
        let current = active(&store, &actor).await.unwrap().unwrap();
        assert_eq!(current.client_name, "Acme Traders");
        assert_eq!(current.checkin.status, CheckinStatus::CheckedIn);

        checkout(&store, &actor, t(1, 12)).await.unwrap();
        assert_eq!(active(&store, &actor).await.unwrap(), None);
    }
}
