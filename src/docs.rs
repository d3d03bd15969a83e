use crate::model::checkin::{CheckinRecord, CheckinStatus, CheckinWithClient};
use crate::model::client::Client;
use crate::model::role::Role;
use crate::model::user::UserProfile;
use crate::models::{LoginReqDto, LoginResponse, RegisterReqDto};
use crate::service::checkin::{CheckinReceipt, CheckoutReceipt, CreateCheckin};
use crate::utils::history_report::{HistoryReport, HistoryRow, HistorySummary};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Field Check-in API",
        version = "1.0.0",
        description = r#"
## Field Check-in Tracker

Employees check in at client sites and check out when the visit ends.

- **Clients**: managers see every client, employees only the ones assigned to them
- **Check-in**: records the caller's position and its distance from the client (haversine, km).
  Far-away check-ins succeed with a warning.
- **Checkout**: closes the caller's active check-in
- **History**: past check-ins with optional date filters, plus a display-ready report with totals

Only one check-in per employee can be active at a time.

All responses use the envelope `{ "success": bool, "message"?: string, "data"?: any }`.
Protected endpoints require a JWT bearer token from `/auth/login`.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,

        crate::api::checkin::list_clients,
        crate::api::checkin::create_checkin,
        crate::api::checkin::checkout,
        crate::api::checkin::history,
        crate::api::checkin::history_report,
        crate::api::checkin::active
    ),
    components(
        schemas(
            RegisterReqDto,
            LoginReqDto,
            LoginResponse,
            UserProfile,
            Role,
            Client,
            CreateCheckin,
            CheckinReceipt,
            CheckoutReceipt,
            CheckinStatus,
            CheckinRecord,
            CheckinWithClient,
            HistoryReport,
            HistoryRow,
            HistorySummary
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Auth", description = "Registration and login"),
        (name = "Check-in", description = "Client visits: check-in, checkout, history"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
