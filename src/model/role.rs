use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// Stored as lowercase text in `users.role` and carried in the JWT claims.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Manager,
    Employee,
}

impl Role {
    /// Managers see every client and skip the assignment check.
    pub fn is_manager(&self) -> bool {
        *self == Role::Manager
    }
}
