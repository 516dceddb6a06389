//! Public registration endpoint.
//!
//! Every account created here starts with the USER role; elevation happens
//! out of band. Duplicate usernames and emails are rejected with the same
//! messages whether caught by the pre-checks or by the uniqueness
//! constraints racing a concurrent registration.

use axum::{extract::Extension, http::StatusCode, Json};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{error, info_span, instrument, Instrument};
use utoipa::ToSchema;

use super::auth::password::hash_password;
use super::auth::principal::Role;
use super::auth::storage::unique_violation;
use super::validate_user_payload;

#[derive(ToSchema, Deserialize)]
pub struct RegisterRequest {
    username: String,
    password: String,
    email: String,
}

#[utoipa::path(
    post,
    path = "/users/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "User registered successfully", body = String),
        (status = 400, description = "Validation failure or duplicate username/email", body = String),
        (status = 500, description = "Unexpected failure during registration", body = String),
    ),
    tag = "users"
)]
#[instrument(skip(pool, payload))]
pub async fn register(
    pool: Extension<PgPool>,
    payload: Option<Json<RegisterRequest>>,
) -> (StatusCode, String) {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string());
    };

    let errors = validate_user_payload(&request.username, &request.password, &request.email);
    if !errors.is_empty() {
        return (StatusCode::BAD_REQUEST, errors.join(", "));
    }

    let email = request.email.trim().to_lowercase();

    match username_exists(&pool, &request.username).await {
        Ok(true) => {
            return (
                StatusCode::BAD_REQUEST,
                "Username is already taken.".to_string(),
            )
        }
        Ok(false) => (),
        Err(err) => {
            error!("Failed to check username availability: {err}");
            return registration_error();
        }
    }

    match email_exists(&pool, &email).await {
        Ok(true) => {
            return (
                StatusCode::BAD_REQUEST,
                "Email is already registered.".to_string(),
            )
        }
        Ok(false) => (),
        Err(err) => {
            error!("Failed to check email availability: {err}");
            return registration_error();
        }
    }

    let password_hash = match hash_password(&request.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return registration_error();
        }
    };

    match insert_user(&pool, &request.username, &password_hash, &email, Role::User).await {
        Ok(()) => (
            StatusCode::OK,
            "User registered successfully".to_string(),
        ),
        Err(err) => {
            if let Some(constraint) = unique_violation(&err) {
                let message = if constraint.contains("email") {
                    "Email is already registered."
                } else {
                    "Username is already taken."
                };
                return (StatusCode::BAD_REQUEST, message.to_string());
            }
            error!("Failed to insert user: {err}");
            registration_error()
        }
    }
}

fn registration_error() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "An error occurred during registration".to_string(),
    )
}

async fn username_exists(pool: &PgPool, username: &str) -> Result<bool, sqlx::Error> {
    let query = "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1) AS exists";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row: (bool,) = sqlx::query_as(query)
        .bind(username)
        .fetch_one(pool)
        .instrument(span)
        .await?;
    Ok(row.0)
}

async fn email_exists(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
    let query = "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1) AS exists";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row: (bool,) = sqlx::query_as(query)
        .bind(email)
        .fetch_one(pool)
        .instrument(span)
        .await?;
    Ok(row.0)
}

async fn insert_user(
    pool: &PgPool,
    username: &str,
    password_hash: &str,
    email: &str,
    role: Role,
) -> Result<(), sqlx::Error> {
    let query = "INSERT INTO users (username, password, email, role) VALUES ($1, $2, $3, $4)";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(username)
        .bind(password_hash)
        .bind(email)
        .bind(role.as_str())
        .execute(pool)
        .instrument(span)
        .await?;
    Ok(())
}
