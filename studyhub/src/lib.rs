//! # studyhub: Q&A and study groups for students
//!
//! `studyhub` is the backend of a student learning platform. Students ask
//! questions, answer them and vote on both. Platform admins open study groups;
//! students join public groups directly or ask to join private ones, and
//! members talk in a group chat that updates live.
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum). Handlers in
//! [`api`] authenticate the caller ([`auth`]), apply the rules in
//! [`services`], and read and write through the [`store::Store`] trait. The
//! production store is PostgreSQL ([`db`], [`store::PgStore`]); an in-memory
//! store serves tests and demos.
//!
//! Vote totals and answer counts are maintained by database triggers. Chat
//! messages fire a `NOTIFY` on insert; a single background listener per
//! process ([`realtime::MessageListener`]) fans them out to every open chat
//! stream through a broadcast channel.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use studyhub::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = studyhub::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     studyhub::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     Application::new(config)
//!         .await?
//!         .serve(async {
//!             tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!         })
//!         .await
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod openapi;
pub mod realtime;
pub mod services;
pub mod store;
pub mod telemetry;
#[cfg(test)]
mod test_utils;
pub mod types;

use crate::{
    auth::password,
    config::CorsOrigin,
    db::models::users::UserCreateDBRequest,
    openapi::ApiDoc,
    realtime::{MessageEvents, MessageListener},
    store::{InMemoryStore, PgStore, SharedStore, Store},
    types::{AppRole, abbrev_uuid},
};
use axum::{
    Json, Router,
    http::{self, HeaderValue},
    routing::{get, patch, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::sync::Arc;
use tokio::{net::TcpListener, sync::broadcast};
use tokio_util::sync::{CancellationToken, DropGuard};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{GroupId, QuestionId, UserId};

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .store(store)
///     .message_events(events)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub store: SharedStore,
    /// Sender side of the chat event channel; each stream subscribes to it
    pub message_events: MessageEvents,
    /// Cancelled when the server starts draining. Open chat streams end on it.
    #[builder(default)]
    pub shutdown_token: CancellationToken,
}

/// Get the studyhub database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Make sure the configured admin account exists and holds the `admin` role.
///
/// An existing account is promoted, and its password replaced when one is
/// given. A missing account is only created when a password is configured,
/// since every account needs one to log in. Returns the admin's id, if any.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(store: &dyn Store, email: &str, password: Option<&str>) -> anyhow::Result<Option<UserId>> {
    let email = email.trim().to_lowercase();
    let password_hash = match password {
        Some(pwd) => Some(password::hash_in_background(pwd.to_string()).await?),
        None => None,
    };

    if let Some(existing) = store.get_user_by_email(&email).await? {
        store.grant_role(existing.id, AppRole::Admin).await?;
        if let Some(password_hash) = password_hash {
            store.set_password(existing.id, &password_hash).await?;
        }
        debug!("Admin user {} already exists", abbrev_uuid(&existing.id));
        return Ok(Some(existing.id));
    }

    let Some(password_hash) = password_hash else {
        warn!("Admin user {} does not exist and no admin_password is configured, skipping", email);
        return Ok(None);
    };

    let created = store
        .create_user(&UserCreateDBRequest {
            email,
            password_hash,
            roles: vec![AppRole::User, AppRole::Admin],
        })
        .await?;
    info!("Created admin user {}", abbrev_uuid(&created.id));
    Ok(Some(created.id))
}

/// Connect the configured store, run migrations, and seed the admin user.
/// Returns the store, the chat event channel, and the pool when Postgres is used.
async fn setup_store(config: &Config) -> anyhow::Result<(SharedStore, MessageEvents, Option<PgPool>)> {
    let (message_events, _) = broadcast::channel(config.realtime.channel_capacity);

    let (store, pool): (SharedStore, Option<PgPool>) = match &config.database {
        config::DatabaseConfig::Postgres { url, max_connections } => {
            info!("Using postgres database");
            let pool = PgPoolOptions::new().max_connections(*max_connections).connect(url).await?;
            migrator().run(&pool).await?;
            (Arc::new(PgStore::new(pool.clone())), Some(pool))
        }
        config::DatabaseConfig::Memory => {
            warn!("Using in-memory store: data will be lost on shutdown");
            (Arc::new(InMemoryStore::new(message_events.clone())), None)
        }
    };

    create_initial_admin_user(store.as_ref(), &config.admin_email, config.admin_password.as_deref())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {}", e))?;

    Ok((store, message_events, pool))
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.auth.security.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            // Url serializes with a trailing slash that browsers never send
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([http::Method::GET, http::Method::POST, http::Method::PUT, http::Method::PATCH])
        .allow_headers([http::header::CONTENT_TYPE, http::header::AUTHORIZATION])
        .allow_credentials(config.auth.security.cors.allow_credentials)
        .expose_headers(vec![http::header::LOCATION]);

    if let Some(max_age) = config.auth.security.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router.
///
/// - `/authentication/*`: register, login, logout
/// - `/api/v1/*`: the authenticated API (plus the public `/subjects`)
/// - `/docs` and `/openapi.json`: API documentation
/// - `/healthz`, and `/internal/metrics` when metrics are enabled
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let auth_routes = Router::new()
        .route("/authentication/register", post(api::handlers::auth::register))
        .route("/authentication/login", post(api::handlers::auth::login))
        .route("/authentication/logout", post(api::handlers::auth::logout))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/users/current", get(api::handlers::users::get_current_user))
        .route("/profile", get(api::handlers::profiles::get_profile))
        .route("/profile", axum::routing::put(api::handlers::profiles::update_profile))
        .route("/subjects", get(api::handlers::subjects::list_vocabularies))
        // Questions, answers and votes
        .route("/questions", get(api::handlers::questions::list_questions))
        .route("/questions", post(api::handlers::questions::create_question))
        .route("/questions/{id}", get(api::handlers::questions::get_question))
        .route("/questions/{id}/answers", post(api::handlers::questions::create_answer))
        .route("/questions/{id}/votes", post(api::handlers::questions::vote_question))
        .route("/answers/{id}/votes", post(api::handlers::questions::vote_answer))
        // Study groups and memberships
        .route("/groups", get(api::handlers::groups::list_groups))
        .route("/groups", post(api::handlers::groups::create_group))
        .route("/groups/{id}", get(api::handlers::groups::get_group))
        .route("/groups/{id}/members", get(api::handlers::groups::list_members))
        .route("/groups/{id}/join", post(api::handlers::groups::join_group))
        .route("/groups/{id}/join-requests", get(api::handlers::groups::list_join_requests))
        .route("/groups/{id}/join-requests", post(api::handlers::groups::create_join_request))
        .route(
            "/groups/{id}/join-requests/{request_id}",
            patch(api::handlers::groups::review_join_request),
        )
        // Group chat
        .route("/groups/{id}/messages", get(api::handlers::messages::list_messages))
        .route("/groups/{id}/messages", post(api::handlers::messages::create_message))
        .route("/groups/{id}/messages/stream", get(api::handlers::messages::stream_messages))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(auth_routes)
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let cors_layer = create_cors_layer(&state.config)?;
    let mut router = router.layer(cors_layer);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(move || async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Background tasks that run alongside the HTTP server.
///
/// Today this is the chat message listener, started only with the Postgres
/// store. Dropping the struct cancels the shutdown token through `drop_guard`.
pub struct BackgroundServices {
    background_tasks: Vec<tokio::task::JoinHandle<()>>,
    shutdown_token: CancellationToken,
    // Pub so that we can disarm it if we want to
    pub drop_guard: Option<DropGuard>,
}

impl BackgroundServices {
    /// Gracefully shutdown all background tasks
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();
        for handle in self.background_tasks {
            let _ = handle.await;
        }
    }
}

fn setup_background_services(
    pool: Option<PgPool>,
    message_events: MessageEvents,
    config: &Config,
    shutdown_token: CancellationToken,
) -> BackgroundServices {
    let drop_guard = shutdown_token.clone().drop_guard();
    let mut background_tasks = Vec::new();

    if let Some(pool) = pool {
        let listener = MessageListener::new(pool, message_events, config.realtime.reconnect_delay);
        let listener_shutdown = shutdown_token.clone();
        background_tasks.push(tokio::spawn(async move {
            if let Err(e) = listener.run(listener_shutdown).await {
                tracing::error!("Chat message listener error: {}", e);
            }
        }));
    } else {
        debug!("No database pool, the in-memory store publishes chat events itself");
    }

    BackgroundServices {
        background_tasks,
        shutdown_token,
        drop_guard: Some(drop_guard),
    }
}

/// The assembled server: router, state and background services.
pub struct Application {
    router: Router,
    app_state: AppState,
    config: Config,
    pool: Option<PgPool>,
    bg_services: BackgroundServices,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting studyhub with configuration: {:#?}", config);

        let (store, message_events, pool) = setup_store(&config).await?;

        let shutdown_token = CancellationToken::new();
        let app_state = AppState::builder()
            .config(config.clone())
            .store(store)
            .message_events(message_events.clone())
            .shutdown_token(shutdown_token.child_token())
            .build();
        let bg_services = setup_background_services(pool.clone(), message_events, &config, shutdown_token);
        let router = build_router(&app_state)?;

        Ok(Self {
            router,
            app_state,
            config,
            pool,
            bg_services,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.app_state
    }

    #[cfg(test)]
    pub fn into_test_server(self) -> (axum_test::TestServer, BackgroundServices) {
        let server = axum_test::TestServer::new(self.router).expect("Failed to create test server");
        (server, self.bg_services)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "studyhub listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        // Chat streams never finish on their own, so end them before axum drains
        let streams_token = self.app_state.shutdown_token.clone();
        let shutdown = async move {
            shutdown.await;
            info!("Shutdown requested, closing open chat streams");
            streams_token.cancel();
        };
        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        self.bg_services.shutdown().await;

        if let Some(pool) = self.pool {
            info!("Closing database connections...");
            pool.close().await;
        }

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{api::models::auth::AuthResponse, test_utils::create_test_config};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_initial_admin_user_is_created_and_promoted() {
        let (events, _) = broadcast::channel(4);
        let store = InMemoryStore::new(events);

        // No password and no account: nothing to do
        assert_eq!(create_initial_admin_user(&store, "admin@example.com", None).await.unwrap(), None);
        assert!(store.get_user_by_email("admin@example.com").await.unwrap().is_none());

        let id = create_initial_admin_user(&store, "Admin@Example.com", Some("first-password"))
            .await
            .unwrap()
            .unwrap();
        let admin = store.get_user(id).await.unwrap().unwrap();
        assert!(admin.is_admin());
        assert!(password::verify_string("first-password", &admin.password_hash).unwrap());

        // An existing plain user is promoted and keeps their id
        let student = store.seed_user("student@example.com").await;
        let promoted = create_initial_admin_user(&store, "student@example.com", None).await.unwrap();
        assert_eq!(promoted, Some(student.id));
        assert!(store.get_user(student.id).await.unwrap().unwrap().is_admin());

        // Re-running with a new password replaces it
        create_initial_admin_user(&store, "admin@example.com", Some("second-password"))
            .await
            .unwrap();
        let admin = store.get_user(id).await.unwrap().unwrap();
        assert!(password::verify_string("second-password", &admin.password_hash).unwrap());
    }

    #[test_log::test(tokio::test)]
    async fn test_application_with_memory_store() {
        let mut config = create_test_config();
        config.admin_email = "root@example.com".to_string();
        config.admin_password = Some("root-password".to_string());

        let app = Application::new(config).await.unwrap();
        let seeded = app.state().store.get_user_by_email("root@example.com").await.unwrap();
        assert!(seeded.is_some_and(|u| u.is_admin()));
        let (server, bg_services) = app.into_test_server();

        server.get("/healthz").await.assert_text("OK");
        server.get("/docs").await.assert_status_ok();
        let openapi = server.get("/openapi.json").await;
        openapi.assert_status_ok();
        assert!(openapi.text().contains("/api/v1/groups"));

        let response = server
            .post("/authentication/login")
            .json(&json!({"email": "root@example.com", "password": "root-password"}))
            .await;
        response.assert_status_ok();
        let body: AuthResponse = response.json();
        assert!(body.user.is_admin);

        server.get("/api/v1/groups").await.assert_status(StatusCode::UNAUTHORIZED);
        server.get("/internal/metrics").await.assert_status(StatusCode::NOT_FOUND);

        bg_services.shutdown().await;
    }

    #[test_log::test(tokio::test)]
    async fn test_serve_shuts_down_with_open_chat_stream() {
        use crate::db::models::groups::StudyGroupCreateDBRequest;
        use crate::test_utils::{bearer, seed_user};
        use std::time::Duration;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Reserve a free port, then hand it to the server
        let reserved = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = reserved.local_addr().unwrap();
        drop(reserved);
        let mut config = create_test_config();
        config.port = addr.port();

        let app = Application::new(config).await.unwrap();
        let state = app.state().clone();
        let admin = seed_user(&state, "host@example.com", &[AppRole::User, AppRole::Admin]).await;
        let group = state
            .store
            .create_group_with_admin(&StudyGroupCreateDBRequest {
                name: "Late night calculus".to_string(),
                description: None,
                subject: "Math".to_string(),
                created_by: admin.id,
                is_public: true,
                member_limit: 20,
            })
            .await
            .unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(app.serve(async move {
            let _ = shutdown_rx.await;
        }));

        let mut client = None;
        for _ in 0..50 {
            match tokio::net::TcpStream::connect(addr).await {
                Ok(stream) => {
                    client = Some(stream);
                    break;
                }
                Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
            }
        }
        let mut client = client.expect("server never started listening");
        let request = format!(
            "GET /api/v1/groups/{}/messages/stream HTTP/1.1\r\nHost: localhost\r\nAccept: text/event-stream\r\nAuthorization: {}\r\n\r\n",
            group.id,
            bearer(&state, &admin)
        );
        client.write_all(request.as_bytes()).await.unwrap();

        let mut buf = vec![0u8; 1024];
        let read = tokio::time::timeout(Duration::from_secs(5), client.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert!(String::from_utf8_lossy(&buf[..read]).starts_with("HTTP/1.1 200 OK"));

        shutdown_tx.send(()).unwrap();
        let finished = tokio::time::timeout(Duration::from_secs(5), server).await;
        assert!(finished.is_ok(), "serve did not return while a chat stream was open");
        finished.unwrap().unwrap().unwrap();
        drop(client);
    }

    #[tokio::test]
    async fn test_build_router_with_metrics_enabled() {
        let mut config = create_test_config();
        config.enable_metrics = true;

        let app = Application::new(config).await.unwrap();
        let (server, _bg_services) = app.into_test_server();

        server.get("/healthz").await.assert_status_ok();
        let metrics = server.get("/internal/metrics").await;
        metrics.assert_status_ok();
    }

    #[test]
    fn test_cors_layer_accepts_configured_origins() {
        let mut config = create_test_config();
        config.auth.security.cors.allowed_origins = vec![
            CorsOrigin::Url("http://localhost:5173".parse().unwrap()),
            CorsOrigin::Url("https://studyhub.example.com".parse().unwrap()),
        ];
        assert!(create_cors_layer(&config).is_ok());
    }
}
