use serde::Serialize;
use utoipa::ToSchema;

use super::role::Role;

#[derive(Debug, Clone)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Public view of a user, returned by login/register.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserProfile {
    #[schema(example = 7)]
    pub id: u64,
    #[schema(example = "Jane Doe")]
    pub name: String,
    #[schema(example = "jane@company.com")]
    pub email: String,
    pub role: Role,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}
