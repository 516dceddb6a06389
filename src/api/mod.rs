//! HTTP surface: router assembly and server lifecycle.

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, X_FRAME_OPTIONS},
        HeaderName, HeaderValue, Method, Request,
    },
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Router,
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::{SetRequestHeaderLayer, SetResponseHeaderLayer},
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa::OpenApi;

pub mod handlers;

use handlers::auth::middleware::{authenticate_request, enforce_access};
use handlers::auth::storage::PgUserStore;
use handlers::auth::{AuthConfig, AuthState};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::authenticate::authenticate,
        handlers::user_register::register,
        handlers::users::list_users,
        handlers::users::get_user,
        handlers::users::update_user,
        handlers::users::delete_user,
    ),
    components(schemas(
        handlers::health::Health,
        handlers::authenticate::AuthenticationRequest,
        handlers::authenticate::AuthenticationResponse,
        handlers::user_register::RegisterRequest,
        handlers::users::UserResponse,
        handlers::users::UserUpdateRequest,
    )),
    tags(
        (name = "gardisto", description = "User management and stateless authentication API")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Build the application router around shared auth state and the pool.
///
/// The authenticator layer runs before the access-policy layer, which runs
/// before any handler; neither creates sessions, so every request is checked
/// fresh.
#[must_use]
pub fn router(state: Arc<AuthState>, pool: PgPool) -> Router {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_origin(Any);

    Router::new()
        .route("/authenticate", post(handlers::authenticate))
        .route("/users/register", post(handlers::register))
        .route("/users", get(handlers::users::list_users))
        .route(
            "/users/:id",
            get(handlers::users::get_user)
                .put(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        // Frame embedding is allowed for the diagnostic endpoint only; this
        // is a narrow legacy-console exemption, not a general relaxation.
        .route(
            "/health",
            get(handlers::health).layer(SetResponseHeaderLayer::if_not_present(
                X_FRAME_OPTIONS,
                HeaderValue::from_static("SAMEORIGIN"),
            )),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(state.clone()))
                .layer(Extension(pool))
                .layer(from_fn_with_state(state.clone(), authenticate_request))
                .layer(from_fn_with_state(state, enforce_access)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, config: AuthConfig) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    let store = Arc::new(PgUserStore::new(pool.clone()));
    let state = Arc::new(AuthState::new(config, store));

    let app = router(state, pool);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Gracefully shutdown");
    }
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
