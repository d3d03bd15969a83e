use crate::{
    auth::{
        jwt::generate_access_token,
        password::{hash_password, verify_password},
    },
    config::Config,
    error::ApiError,
    model::{role::Role, user::User, user::UserProfile},
    models::{ApiResponse, LoginReqDto, LoginResponse, RegisterReqDto, UserSql},
};
use actix_web::{HttpResponse, web};
use sqlx::MySqlPool;
use std::str::FromStr;
use tracing::{debug, error, info, instrument};

impl TryFrom<UserSql> for User {
    type Error = ApiError;

    fn try_from(row: UserSql) -> Result<Self, Self::Error> {
        let role = Role::from_str(&row.role).map_err(|_| {
            error!(user_id = row.id, role = %row.role, "Unknown role in users table");
            ApiError::Internal("Login failed")
        })?;
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            password: row.password,
            role,
        })
    }
}

/// Register a new employee account
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterReqDto,
    responses(
        (status = 201, description = "Registered", body = Object, example = json!({
            "success": true,
            "message": "User registered successfully",
            "data": {"id": 7, "name": "Jane Doe", "email": "jane@company.com", "role": "employee"}
        })),
        (status = 400, description = "Missing fields"),
        (status = 409, description = "Email already registered")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_register", skip(pool, user), fields(email = %user.email))]
pub async fn register(
    user: web::Json<RegisterReqDto>,
    pool: web::Data<MySqlPool>,
) -> Result<HttpResponse, ApiError> {
    let name = user.name.trim();
    let email = user.email.trim().to_lowercase();

    if name.is_empty() || email.is_empty() || user.password.is_empty() {
        return Err(ApiError::Validation("Name, email and password are required".into()));
    }

    let hashed = hash_password(&user.password).map_err(|e| {
        error!(error = %e, "Password hashing failed");
        ApiError::Internal("Failed to register user")
    })?;

    let result = sqlx::query("INSERT INTO users (name, email, password, role) VALUES (?, ?, ?, ?)")
        .bind(name)
        .bind(&email)
        .bind(&hashed)
        .bind(Role::Employee.to_string())
        .execute(pool.get_ref())
        .await;

    let id = match result {
        Ok(done) => done.last_insert_id(),
        Err(e) => {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().as_deref() == Some("23000") {
                    return Err(ApiError::Conflict("Email already registered".into()));
                }
            }
            error!(error = %e, "Failed to insert user");
            return Err(ApiError::Internal("Failed to register user"));
        }
    };

    info!(user_id = id, "User registered");

    Ok(HttpResponse::Created().json(ApiResponse::ok_with_message(
        "User registered successfully",
        UserProfile {
            id,
            name: name.to_string(),
            email,
            role: Role::Employee,
        },
    )))
}

/// Exchange credentials for an access token
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Missing credentials"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_login", skip(pool, config, user), fields(email = %user.email))]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    info!("Login request received");

    if user.email.trim().is_empty() || user.password.is_empty() {
        return Err(ApiError::Validation("Email and password required".into()));
    }

    debug!("Fetching user from database");

    let db_user: User = match sqlx::query_as::<_, UserSql>(
        r#"
        SELECT id, name, email, password, role
        FROM users
        WHERE email = ?
        "#,
    )
    .bind(user.email.trim().to_lowercase())
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(row)) => row.try_into()?,
        Ok(None) => {
            info!("Invalid credentials: user not found");
            return Err(ApiError::Unauthorized("Invalid credentials".into()));
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return Err(ApiError::Internal("Login failed"));
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let access_token = generate_access_token(
        db_user.id,
        db_user.name.clone(),
        db_user.role,
        &config.jwt_secret,
        config.access_token_ttl,
    )
    .map_err(|e| {
        error!(error = %e, "Failed to sign access token");
        ApiError::Internal("Login failed")
    })?;

    info!(user_id = db_user.id, "Login successful");

    Ok(HttpResponse::Ok().json(ApiResponse::ok(LoginResponse {
        access_token,
        user: UserProfile::from(&db_user),
    })))
}
