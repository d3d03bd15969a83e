use crate::{error::ApiError, model::role::Role};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};

/// The authenticated actor of a request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,
}

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    /// Reads the actor `auth_middleware` stored on the request.
    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| ApiError::Unauthorized("Access token required".into())),
        )
    }
}

impl From<crate::models::Claims> for AuthUser {
    fn from(claims: crate::models::Claims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.sub,
            role: claims.role,
        }
    }
}

impl AuthUser {
    pub fn is_manager(&self) -> bool {
        self.role.is_manager()
    }
}
