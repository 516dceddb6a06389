//! Authentication endpoint: credentials in, signed token out.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, instrument, warn};
use utoipa::ToSchema;

use super::auth::verifier::VerifyError;
use super::auth::AuthState;

#[derive(ToSchema, Deserialize)]
pub struct AuthenticationRequest {
    username: String,
    password: String,
}

#[derive(ToSchema, Serialize, Deserialize)]
pub struct AuthenticationResponse {
    pub token: String,
    pub authorities: Vec<String>,
}

#[utoipa::path(
    post,
    path = "/authenticate",
    request_body = AuthenticationRequest,
    responses(
        (status = 200, description = "Authentication successful", body = AuthenticationResponse),
        (status = 400, description = "Blank or missing credentials", body = String),
        (status = 401, description = "Invalid username or password", body = String),
        (status = 500, description = "Unexpected failure during authentication", body = String),
    ),
    tag = "auth"
)]
#[instrument(skip(state, payload))]
pub async fn authenticate(
    Extension(state): Extension<Arc<AuthState>>,
    payload: Option<Json<AuthenticationRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    let mut errors = Vec::new();
    if request.username.trim().is_empty() {
        errors.push("Username is mandatory");
    }
    if request.password.trim().is_empty() {
        errors.push("Password is mandatory");
    }
    if !errors.is_empty() {
        return (StatusCode::BAD_REQUEST, errors.join(", ")).into_response();
    }

    let record = match state
        .verifier()
        .verify(&request.username, &request.password)
        .await
    {
        Ok(record) => record,
        Err(VerifyError::InvalidCredentials) => {
            warn!(username = %request.username, "Authentication failed");
            return (
                StatusCode::UNAUTHORIZED,
                "Invalid username or password".to_string(),
            )
                .into_response();
        }
        Err(VerifyError::Unavailable(err)) => {
            error!("Authentication backend failure: {err:#}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An error occurred during authentication".to_string(),
            )
                .into_response();
        }
    };

    let token = match state
        .codec()
        .issue(&record.username, &[record.role], Utc::now().timestamp())
    {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to issue token: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An error occurred during authentication".to_string(),
            )
                .into_response();
        }
    };

    // The authorities list lets clients gate UI without decoding the token.
    let response = AuthenticationResponse {
        token,
        authorities: vec![record.role.authority().to_string()],
    };

    (StatusCode::OK, Json(response)).into_response()
}
