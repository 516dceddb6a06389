//! Per-request authentication filter and access enforcement.
//!
//! Flow Overview:
//! 1) `authenticate_request` runs once per request, before any handler. It
//!    extracts the bearer token, validates it against a freshly loaded user
//!    record, and attaches a [`Principal`] to the request extensions. It
//!    never rejects a request itself.
//! 2) `enforce_access` consults the [`AccessPolicy`] with whatever principal
//!    step 1 attached and turns missing or insufficient identity into a
//!    uniform 401/403.
//!
//! Keeping token parsing and the access decision in separate layers means a
//! bad token and a missing token end up on the same downstream path.

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::policy::Decision;
use super::principal::Principal;
use super::state::AuthState;
use super::storage::UserRecord;
use super::token;

/// Authentication filter: derives a [`Principal`] from the bearer token.
///
/// Runs exactly once per request and is idempotent if re-entered: an already
/// attached principal is never overwritten or cleared. The request is always
/// forwarded exactly once, whatever the outcome; the raw token and password
/// never reach the logs.
pub async fn authenticate_request(
    State(state): State<Arc<AuthState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let uri = request.uri().path().to_string();
    let bearer = extract_bearer(request.headers()).map(str::to_string);

    info!(uri = %uri, has_authorization = bearer.is_some(), "Incoming request");

    if request.extensions().get::<Principal>().is_none() {
        if let Some(token_str) = bearer {
            if let Some(principal) = resolve_principal(&state, &token_str, &uri).await {
                request.extensions_mut().insert(principal);
            }
        }
    }

    next.run(request).await
}

async fn resolve_principal(state: &AuthState, token_str: &str, uri: &str) -> Option<Principal> {
    let now = Utc::now().timestamp();

    let subject = match state.codec().extract_subject(token_str, now) {
        Ok(subject) => subject,
        Err(token::Error::Expired) => {
            warn!(uri = %uri, "Token expired");
            return None;
        }
        Err(err) => {
            warn!(uri = %uri, "Rejected malformed token: {err}");
            return None;
        }
    };

    debug!(uri = %uri, subject = %subject, "Token subject extracted");

    let record = match state.store().find_by_username(&subject).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            warn!(subject = %subject, "Token subject no longer exists");
            return None;
        }
        Err(err) => {
            error!("Failed to load user for token validation: {err:#}");
            return None;
        }
    };

    if !state.codec().validate(token_str, &record.username, now) {
        warn!(subject = %subject, "Token failed validation");
        return None;
    }

    debug!(subject = %subject, "Token validated, principal attached");

    Some(principal_from(&record))
}

// Roles come from the freshly loaded record, not from the token claims.
fn principal_from(record: &UserRecord) -> Principal {
    Principal {
        user_id: record.id,
        username: record.username.clone(),
        roles: vec![record.role],
    }
}

/// Access enforcement: applies the route policy to the attached principal.
pub async fn enforce_access(
    State(state): State<Arc<AuthState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let decision = state
        .policy()
        .evaluate(request.uri().path(), request.extensions().get::<Principal>());

    match decision {
        Decision::Granted => next.run(request).await,
        Decision::Unauthorized => {
            debug!(uri = %request.uri().path(), "Denied unauthenticated request");
            StatusCode::UNAUTHORIZED.into_response()
        }
        Decision::Forbidden => {
            debug!(uri = %request.uri().path(), "Denied request with insufficient role");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::principal::Role;
    use crate::api::handlers::auth::state::AuthConfig;
    use crate::api::handlers::auth::storage::testing::{record, MemoryStore};
    use axum::http::HeaderValue;
    use axum::{middleware::from_fn, middleware::from_fn_with_state, routing::get, Extension, Router};
    use secrecy::SecretString;
    use tower::ServiceExt;

    const TEST_KEY: &str = "test-signing-key-with-enough-entropy-for-hs256";

    fn test_state() -> Arc<AuthState> {
        let store = MemoryStore::new(vec![
            record(1, "root", "unused-hash", Role::Admin),
            record(2, "alice", "unused-hash", Role::User),
        ]);
        Arc::new(AuthState::new(
            AuthConfig::new(SecretString::from(TEST_KEY.to_string())),
            Arc::new(store),
        ))
    }

    async fn probe(principal: Option<Extension<Principal>>) -> String {
        match principal {
            Some(Extension(principal)) => format!(
                "{}:{}",
                principal.username,
                principal.authorities().join(",")
            ),
            None => "anonymous".to_string(),
        }
    }

    fn auth_only_router(state: Arc<AuthState>) -> Router {
        Router::new()
            .route("/probe", get(probe))
            .layer(from_fn_with_state(state, authenticate_request))
    }

    async fn send(router: Router, authorization: Option<&str>) -> (StatusCode, String) {
        let mut builder = Request::builder().uri("/probe");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        let request = builder.body(Body::empty()).expect("request builds");
        let response = router.oneshot(request).await.expect("router responds");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    fn issue(state: &AuthState, subject: &str, roles: &[Role]) -> String {
        state
            .codec()
            .issue(subject, roles, Utc::now().timestamp())
            .expect("token issues")
    }

    #[tokio::test]
    async fn missing_header_passes_through_anonymous() {
        let state = test_state();
        let (status, body) = send(auth_only_router(state), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");
    }

    #[tokio::test]
    async fn non_bearer_header_passes_through_anonymous() {
        let state = test_state();
        let (status, body) = send(
            auth_only_router(state),
            Some("Basic YWxpY2U6cGFzc3dvcmQ="),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");
    }

    #[tokio::test]
    async fn valid_token_attaches_the_principal() {
        let state = test_state();
        let token = issue(&state, "alice", &[Role::User]);
        let (status, body) =
            send(auth_only_router(state), Some(&format!("Bearer {token}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "alice:ROLE_USER");
    }

    #[tokio::test]
    async fn principal_roles_come_from_the_store_not_the_token() {
        // Token for root was issued with USER frozen in; the store says ADMIN.
        let state = test_state();
        let token = issue(&state, "root", &[Role::User]);
        let (status, body) =
            send(auth_only_router(state), Some(&format!("Bearer {token}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "root:ROLE_ADMIN");
    }

    #[tokio::test]
    async fn garbage_token_passes_through_anonymous() {
        let state = test_state();
        let (status, body) =
            send(auth_only_router(state), Some("Bearer not-a-token")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");
    }

    #[tokio::test]
    async fn expired_token_passes_through_anonymous() {
        let state = test_state();
        let expired = state
            .codec()
            .issue(
                "alice",
                &[Role::User],
                Utc::now().timestamp() - 2 * token::DEFAULT_TOKEN_TTL_SECONDS,
            )
            .expect("token issues");
        let (status, body) =
            send(auth_only_router(state), Some(&format!("Bearer {expired}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");
    }

    #[tokio::test]
    async fn token_for_a_deleted_user_passes_through_anonymous() {
        let state = test_state();
        let token = issue(&state, "ghost", &[Role::User]);
        let (status, body) =
            send(auth_only_router(state), Some(&format!("Bearer {token}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anonymous");
    }

    #[tokio::test]
    async fn existing_principal_is_never_overwritten() {
        async fn preset(mut request: Request<Body>, next: Next) -> Response {
            request.extensions_mut().insert(Principal {
                user_id: 99,
                username: "preset".to_string(),
                roles: vec![Role::Admin],
            });
            next.run(request).await
        }

        let state = test_state();
        let token = issue(&state, "alice", &[Role::User]);
        let router = Router::new()
            .route("/probe", get(probe))
            .layer(from_fn_with_state(state, authenticate_request))
            // Outermost layer runs first, so the preset principal is already
            // attached when the authenticator re-enters.
            .layer(from_fn(preset));

        let request = Request::builder()
            .uri("/probe")
            .header(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}")).expect("header builds"),
            )
            .body(Body::empty())
            .expect("request builds");
        let response = router.oneshot(request).await.expect("router responds");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        assert_eq!(String::from_utf8_lossy(&bytes), "preset:ROLE_ADMIN");
    }
}
