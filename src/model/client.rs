use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 3,
        "name": "Acme Traders",
        "address": "12 Mall Road, Gurugram",
        "latitude": 28.4595,
        "longitude": 77.0266
    })
)]
pub struct Client {
    pub id: u64,
    pub name: String,
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}
