use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::ApiError,
    models::ApiResponse,
    service::checkin::{self as workflow, CreateCheckin},
    store::{CheckinStore, HistoryFilter},
    utils::history_report::build_report,
};
use actix_web::{HttpResponse, web};
use chrono::Utc;
use tracing::instrument;

/// Clients available to the caller
#[utoipa::path(
    get,
    path = "/api/checkin/clients",
    responses(
        (status = 200, description = "All clients for managers, assigned clients for employees", body = Object, example = json!({
            "success": true,
            "data": [{"id": 3, "name": "Acme Traders", "address": "12 Mall Road, Gurugram", "latitude": 28.4595, "longitude": 77.0266}]
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Failed to fetch clients")
    ),
    security(("bearer_auth" = [])),
    tag = "Check-in"
)]
#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn list_clients(
    auth: AuthUser,
    store: web::Data<dyn CheckinStore>,
) -> Result<HttpResponse, ApiError> {
    let clients = workflow::list_clients(store.get_ref(), &auth).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(clients)))
}

/// Check in at a client
#[utoipa::path(
    post,
    path = "/api/checkin",
    request_body = CreateCheckin,
    responses(
        (status = 201, description = "Checked in; message carries a warning when far from the client", body = Object, example = json!({
            "success": true,
            "message": "Checked in successfully (Warning: You are 0.74km away from client location)",
            "data": {"id": 41, "distance": 0.74, "warning": "You are 0.74km away from client location"}
        })),
        (status = 400, description = "Client and location data required"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "You are not assigned to this client"),
        (status = 404, description = "Client not found"),
        (status = 409, description = "You already have an active check-in"),
        (status = 500, description = "Check-in failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Check-in"
)]
#[instrument(skip_all, fields(user_id = auth.user_id, user = %auth.username, client_id = ?payload.client_id))]
pub async fn create_checkin(
    auth: AuthUser,
    store: web::Data<dyn CheckinStore>,
    config: web::Data<Config>,
    payload: web::Json<CreateCheckin>,
) -> Result<HttpResponse, ApiError> {
    let outcome = workflow::create_checkin(
        store.get_ref(),
        &auth,
        payload.into_inner(),
        config.distance_warning_km,
        Utc::now(),
    )
    .await?;

    Ok(HttpResponse::Created().json(ApiResponse::ok_with_message(
        outcome.message,
        outcome.receipt,
    )))
}

/// Check out of the active check-in
#[utoipa::path(
    put,
    path = "/api/checkin/checkout",
    responses(
        (status = 200, description = "Checked out successfully", body = Object, example = json!({
            "success": true,
            "message": "Checked out successfully",
            "data": {"id": 41, "checkout_time": "2026-01-01T17:30:00Z"}
        })),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No active check-in found"),
        (status = 500, description = "Checkout failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Check-in"
)]
#[instrument(skip_all, fields(user_id = auth.user_id, user = %auth.username))]
pub async fn checkout(
    auth: AuthUser,
    store: web::Data<dyn CheckinStore>,
) -> Result<HttpResponse, ApiError> {
    let receipt = workflow::checkout(store.get_ref(), &auth, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok_with_message(
        "Checked out successfully",
        receipt,
    )))
}

/// Check-in history, newest first
#[utoipa::path(
    get,
    path = "/api/checkin/history",
    params(HistoryFilter),
    responses(
        (status = 200, description = "Check-ins joined with client name and address", body = Object, example = json!({
            "success": true,
            "data": [{
                "id": 41, "employee_id": 7, "client_id": 3,
                "latitude": 28.4601, "longitude": 77.0270, "distance_from_client": 0.08,
                "notes": null, "status": "checked_out",
                "checkin_time": "2026-01-01T09:00:00Z", "checkout_time": "2026-01-01T11:30:00Z",
                "client_name": "Acme Traders", "client_address": "12 Mall Road, Gurugram"
            }]
        })),
        (status = 400, description = "Invalid date filter"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Failed to fetch history")
    ),
    security(("bearer_auth" = [])),
    tag = "Check-in"
)]
#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn history(
    auth: AuthUser,
    store: web::Data<dyn CheckinStore>,
    query: web::Query<HistoryFilter>,
) -> Result<HttpResponse, ApiError> {
    let rows = workflow::history(store.get_ref(), &auth, &query).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(rows)))
}

/// History formatted for display, with totals
#[utoipa::path(
    get,
    path = "/api/checkin/history/report",
    params(HistoryFilter),
    responses(
        (status = 200, description = "Formatted rows plus total check-ins and hours", body = Object, example = json!({
            "success": true,
            "data": {
                "summary": {"total_checkins": 1, "total_hours": 2.5},
                "rows": [{
                    "id": 41, "date": "2026-01-01", "client_name": "Acme Traders",
                    "client_address": "12 Mall Road, Gurugram", "checkin_time": "09:00:00",
                    "checkout_time": "11:30:00", "duration": "2.5h", "distance": "0.08 km", "notes": "-"
                }]
            }
        })),
        (status = 400, description = "Invalid date filter"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Failed to fetch history")
    ),
    security(("bearer_auth" = [])),
    tag = "Check-in"
)]
#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn history_report(
    auth: AuthUser,
    store: web::Data<dyn CheckinStore>,
    query: web::Query<HistoryFilter>,
) -> Result<HttpResponse, ApiError> {
    let rows = workflow::history(store.get_ref(), &auth, &query).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(build_report(&rows))))
}

/// The caller's active check-in, or null
#[utoipa::path(
    get,
    path = "/api/checkin/active",
    responses(
        (status = 200, description = "Active check-in joined with client name, or null", body = Object, example = json!({
            "success": true,
            "data": null
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Failed to fetch active check-in")
    ),
    security(("bearer_auth" = [])),
    tag = "Check-in"
)]
#[instrument(skip_all, fields(user_id = auth.user_id))]
pub async fn active(
    auth: AuthUser,
    store: web::Data<dyn CheckinStore>,
) -> Result<HttpResponse, ApiError> {
    let current = workflow::active(store.get_ref(), &auth).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(current)))
}
