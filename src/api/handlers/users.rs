//! Role-based user management endpoints.
//!
//! Flow Overview:
//! 1) The request authenticator has already attached a Principal; the access
//!    policy guarantees it carries USER or ADMIN for every route here.
//! 2) Enforce ownership and role rules for the requested user id.
//! 3) Perform the read or write against the store.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{error, info_span, instrument, Instrument};
use utoipa::ToSchema;

use super::auth::password::hash_password;
use super::auth::principal::{Principal, Role};
use super::auth::storage::unique_violation;
use super::validate_user_payload;

/// Public view of a user; the password hash is never serialized.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
}

#[derive(ToSchema, Deserialize)]
pub struct UserUpdateRequest {
    username: String,
    password: String,
    email: String,
}

#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "List all users (admin only)", body = [UserResponse]),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Forbidden"),
    ),
    tag = "users"
)]
#[instrument(skip(principal, pool))]
pub async fn list_users(
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
) -> Response {
    if !principal.is_admin() {
        return StatusCode::FORBIDDEN.into_response();
    }

    match fetch_user_list(&pool).await {
        Ok(users) => (StatusCode::OK, Json(users)).into_response(),
        Err(err) => {
            error!("Failed to list users: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    params(
        ("id" = i64, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "User detail (admin, or the owner)", body = UserResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "User not found"),
    ),
    tag = "users"
)]
#[instrument(skip(principal, pool))]
pub async fn get_user(
    Path(id): Path<i64>,
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
) -> Response {
    // USER may read only its own profile; ADMIN may read any.
    if !principal.is_admin() && principal.user_id != id {
        return StatusCode::FORBIDDEN.into_response();
    }

    match fetch_user(&pool, id).await {
        Ok(Some(user)) => (StatusCode::OK, Json(user)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to fetch user {id}: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    params(
        ("id" = i64, Path, description = "User id")
    ),
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "User updated successfully", body = String),
        (status = 400, description = "Validation failure or duplicate username/email", body = String),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Forbidden", body = String),
        (status = 404, description = "User not found"),
    ),
    tag = "users"
)]
#[instrument(skip(principal, pool, payload))]
pub async fn update_user(
    Path(id): Path<i64>,
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
    payload: Option<Json<UserUpdateRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match apply_update(&pool, &principal, id, &request).await {
        Ok(()) => (StatusCode::OK, "User updated successfully".to_string()).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(
        ("id" = i64, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "User deleted successfully", body = String),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Forbidden", body = String),
    ),
    tag = "users"
)]
#[instrument(skip(principal, pool))]
pub async fn delete_user(
    Path(id): Path<i64>,
    Extension(principal): Extension<Principal>,
    pool: Extension<PgPool>,
) -> Response {
    if !principal.is_admin() {
        return (
            StatusCode::FORBIDDEN,
            "Only ADMIN can delete users.".to_string(),
        )
            .into_response();
    }

    match delete_user_record(&pool, id).await {
        // Deleting an absent id is a no-op, not an error.
        Ok(_) => (StatusCode::OK, "User deleted successfully".to_string()).into_response(),
        Err(err) => {
            error!("Failed to delete user {id}: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Debug)]
enum ServiceError {
    Forbidden(&'static str),
    NotFound,
    BadRequest(String),
    Database(sqlx::Error),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            Self::Forbidden(message) => (StatusCode::FORBIDDEN, message).into_response(),
            Self::NotFound => StatusCode::NOT_FOUND.into_response(),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::Database(err) => {
                error!("Failed to handle user request: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

async fn apply_update(
    pool: &PgPool,
    principal: &Principal,
    id: i64,
    request: &UserUpdateRequest,
) -> Result<(), ServiceError> {
    let errors = validate_user_payload(&request.username, &request.password, &request.email);
    if !errors.is_empty() {
        return Err(ServiceError::BadRequest(errors.join(", ")));
    }

    // USER may update only itself; ADMIN may update anyone.
    if !principal.is_admin() && principal.user_id != id {
        return Err(ServiceError::Forbidden(
            "You are not allowed to update this user.",
        ));
    }

    // The password is always re-hashed on update.
    let password_hash = hash_password(&request.password).map_err(|err| {
        error!("Failed to hash password: {err}");
        ServiceError::BadRequest("Invalid password".to_string())
    })?;

    let email = request.email.trim().to_lowercase();
    let rows = update_user_record(pool, id, &request.username, &password_hash, &email)
        .await
        .map_err(|err| {
            if let Some(constraint) = unique_violation(&err) {
                let message = if constraint.contains("email") {
                    "Email is already registered."
                } else {
                    "Username is already taken."
                };
                ServiceError::BadRequest(message.to_string())
            } else {
                ServiceError::Database(err)
            }
        })?;

    if rows == 0 {
        return Err(ServiceError::NotFound);
    }

    Ok(())
}

async fn fetch_user(pool: &PgPool, id: i64) -> anyhow::Result<Option<UserResponse>> {
    let query = "SELECT id, username, email, role FROM users WHERE id = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    row.map(|row| user_from_row(&row)).transpose()
}

async fn fetch_user_list(pool: &PgPool) -> anyhow::Result<Vec<UserResponse>> {
    let query = "SELECT id, username, email, role FROM users ORDER BY id";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query).fetch_all(pool).instrument(span).await?;
    rows.iter().map(user_from_row).collect()
}

fn user_from_row(row: &PgRow) -> anyhow::Result<UserResponse> {
    use anyhow::Context;

    let role: String = row.try_get("role")?;
    let role =
        Role::parse(&role).with_context(|| format!("unknown role in users table: {role}"))?;
    Ok(UserResponse {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        role,
    })
}

async fn update_user_record(
    pool: &PgPool,
    id: i64,
    username: &str,
    password_hash: &str,
    email: &str,
) -> Result<u64, sqlx::Error> {
    let query = "UPDATE users SET username = $1, password = $2, email = $3, updated_at = NOW() \
                 WHERE id = $4";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(username)
        .bind(password_hash)
        .bind(email)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(result.rows_affected())
}

async fn delete_user_record(pool: &PgPool, id: i64) -> Result<u64, sqlx::Error> {
    let query = "DELETE FROM users WHERE id = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(result.rows_affected())
}
