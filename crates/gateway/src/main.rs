//! Minjok Journal API Gateway
//!
//! The HTTP entry point for the journal.
//! Handles:
//! - Session resolution (cookie or bearer token) and the current-user cache
//! - Rate limiting
//! - Request routing to the journal services
//! - Observability (logging, metrics, request ids)

mod extract;
mod handlers;
mod middleware;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::HeaderName,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use minjok_common::{
    auth::{IdentityProvider, JwtManager},
    cache::{self, ProfileCache},
    config::AppConfig,
    db::{ensure_schema, DbPool, Repository},
    errors::AppError,
    metrics,
    services::{JournalSettings, Services},
    storage,
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{signal, sync::Notify};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub services: Services,
    pub identity: Arc<dyn IdentityProvider>,
    pub profile_cache: Arc<dyn ProfileCache>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;
    let config = Arc::new(config);

    init_tracing(&config);
    info!(
        service = %config.observability.service_name,
        "Starting Minjok Journal API Gateway v{}",
        minjok_common::VERSION
    );

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .set_buckets(metrics::LATENCY_BUCKETS)?
            .with_http_listener(addr)
            .install()?;
        info!("Metrics exporter listening on {}", addr);
    }
    metrics::register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    if config.database.auto_migrate {
        ensure_schema(db.write()).await?;
    }

    let secret = config.auth.jwt_secret.clone().ok_or_else(|| AppError::Configuration {
        message: "auth.jwt_secret is required".to_string(),
    })?;
    let identity: Arc<dyn IdentityProvider> =
        Arc::new(JwtManager::new(&secret, config.auth.jwt_expiration_secs));

    let store = storage::from_config(&config.storage)?;
    info!(backend = store.backend_name(), "Object storage ready");

    let profile_cache = cache::from_settings(&config.cache).await?;

    let services = Services::new(
        Repository::new(db.clone()),
        store,
        JournalSettings::from(&config.journal),
    );

    // Create app state
    let state = AppState {
        config: config.clone(),
        db,
        services,
        identity,
        profile_cache,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Open connections get `shutdown_timeout` to drain once a signal arrives
    let draining = Arc::new(Notify::new());
    let signalled = draining.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            signalled.notify_one();
        })
        .into_future();

    let drain_limit = config.shutdown_timeout();
    tokio::select! {
        result = server => result?,
        _ = async {
            draining.notified().await;
            tokio::time::sleep(drain_limit).await;
        } => warn!(
            timeout_secs = drain_limit.as_secs(),
            "Shutdown timeout elapsed, dropping open connections"
        ),
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let id_header = request_id_header(&state.config);
    let request_id = SetRequestIdLayer::new(id_header.clone(), MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::new(id_header.clone());

    let service = state.config.observability.service_name.clone();
    let trace = TraceLayer::new_for_http().make_span_with(move |request: &Request| {
        let request_id = request
            .headers()
            .get(&id_header)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        info_span!(
            "request",
            service = %service,
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    });

    let max_body = state.config.server.max_upload_bytes;
    let timeout = state.config.request_timeout();

    // API routes
    let api_routes = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Profiles
        .route("/me", get(handlers::profiles::me).patch(handlers::profiles::update_me))
        .route("/profiles", get(handlers::profiles::list_profiles))
        .route("/profiles/search", get(handlers::profiles::search_profiles))
        .route("/profiles/{id}/roles", patch(handlers::profiles::update_roles))

        // Papers
        .route("/papers", get(handlers::papers::list_published).post(handlers::papers::create_paper))
        .route("/papers/mine", get(handlers::papers::list_own))
        .route(
            "/papers/{id}",
            get(handlers::papers::get_paper)
                .patch(handlers::papers::update_paper)
                .delete(handlers::papers::delete_paper),
        )
        .route("/papers/{id}/authors", get(handlers::papers::co_authors))
        .route("/papers/{id}/submit", post(handlers::papers::submit_paper))
        .route("/papers/{id}/publish", post(handlers::papers::publish_paper))
        .route("/papers/{id}/unpublish", post(handlers::papers::unpublish_paper))

        // Versions
        .route(
            "/papers/{id}/versions",
            get(handlers::versions::list_versions).post(handlers::versions::upload_version),
        )

        // Comments
        .route(
            "/papers/{id}/comments",
            get(handlers::comments::list_comments).post(handlers::comments::post_comment),
        )
        .route(
            "/comments/{id}",
            patch(handlers::comments::edit_comment).delete(handlers::comments::delete_comment),
        )

        // Board
        .route("/board", get(handlers::board::list_posts).post(handlers::board::create_post))
        .route(
            "/board/{id}",
            get(handlers::board::get_post)
                .patch(handlers::board::update_post)
                .delete(handlers::board::delete_post),
        )
        .route(
            "/board/{id}/comments",
            get(handlers::board::list_comments).post(handlers::board::post_comment),
        )
        .route("/board/comments/{id}", axum::routing::delete(handlers::board::delete_comment))

        // Q&A
        .route("/qna", get(handlers::qna::list_questions).post(handlers::qna::ask_question))
        .route(
            "/qna/{id}",
            get(handlers::qna::get_question)
                .patch(handlers::qna::update_question)
                .delete(handlers::qna::delete_question),
        )
        .route("/qna/{id}/replies", post(handlers::qna::post_reply))
        .route("/qna/replies/{id}", axum::routing::delete(handlers::qna::delete_reply))

        // Issues
        .route("/issues", get(handlers::issues::list_issues).post(handlers::issues::create_issue))
        .route("/issues/available-papers", get(handlers::issues::available_papers))
        .route(
            "/issues/{id}",
            get(handlers::issues::get_issue).delete(handlers::issues::delete_issue),
        )
        .route("/issues/{id}/release", post(handlers::issues::release_issue))

        // Volumes
        .route("/volumes", get(handlers::volumes::list_volumes).post(handlers::volumes::create_volume))
        .route("/volumes/available-issues", get(handlers::volumes::available_issues))
        .route(
            "/volumes/{id}",
            get(handlers::volumes::get_volume).delete(handlers::volumes::delete_volume),
        );

    let mut app = Router::new().nest("/api", api_routes);

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            state.config.rate_limit.requests_per_second,
            state.config.rate_limit.burst,
        );
        app = app.layer(from_fn_with_state(limiter, middleware::rate_limit::rate_limit));
    }

    // Compose the app
    app.layer(from_fn(middleware::metrics::track_requests))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(TimeoutLayer::new(timeout))
        .layer(trace)
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Configured request id header, falling back to `x-request-id`
fn request_id_header(config: &AppConfig) -> HeaderName {
    let name = &config.observability.request_id_header;
    HeaderName::try_from(name.as_str()).unwrap_or_else(|e| {
        warn!(header = %name, error = %e, "Invalid request id header, using x-request-id");
        HeaderName::from_static("x-request-id")
    })
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use minjok_common::{
        cache::{CachedUser, DisabledProfileCache},
        config::CacheBackend,
        db::models::{AdminType, Role},
        errors::Result,
        policy::Actor,
        storage::MemoryObjectStore,
    };
    use sea_orm::{ConnectOptions, Database};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;
    use uuid::Uuid;

    const SECRET: &str = "test-secret-key-for-testing-only";

    struct TestApp {
        router: Router,
        repo: Repository,
        tokens: JwtManager,
    }

    impl TestApp {
        async fn new() -> Self {
            Self::with(AppConfig::default(), Arc::new(DisabledProfileCache)).await
        }

        async fn with(mut config: AppConfig, profile_cache: Arc<dyn ProfileCache>) -> Self {
            let mut opts = ConnectOptions::new("sqlite::memory:");
            opts.max_connections(1).min_connections(1).sqlx_logging(false);
            let conn = Database::connect(opts).await.unwrap();
            ensure_schema(&conn).await.unwrap();

            let db = DbPool::from_connection(conn);
            let repo = Repository::new(db.clone());

            config.rate_limit.enabled = false;
            let config = Arc::new(config);

            let settings = JournalSettings {
                version_cooldown: Duration::from_secs(5),
                ..JournalSettings::default()
            };

            let state = AppState {
                config,
                db,
                services: Services::new(repo.clone(), Arc::new(MemoryObjectStore::new()), settings),
                identity: Arc::new(JwtManager::new(SECRET, 3600)),
                profile_cache,
            };

            Self {
                router: create_router(state),
                repo,
                tokens: JwtManager::new(SECRET, 3600),
            }
        }

        async fn user(&self, role: Role, admin_type: AdminType) -> (Actor, String) {
            let id = Uuid::new_v4();
            let email = format!("{}@example.com", id.simple());
            let profile = self
                .repo
                .create_profile(id, email.clone(), "Test User".to_string(), role, admin_type)
                .await
                .unwrap();
            let token = self.tokens.generate_token(id, &email, Some(role)).unwrap();
            (Actor::from(&profile), token)
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, body)
        }
    }

    fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("sb-access-token={}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn version_upload(uri: &str, token: &str, file_name: &str) -> Request<Body> {
        let boundary = "journal-test-boundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"notes\"\r\n\r\nfirst draft\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\n\
             Content-Type: application/pdf\r\n\r\n%PDF-1.7 body\r\n--{b}--\r\n",
            b = boundary,
            f = file_name
        );

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_probes() {
        let app = TestApp::new().await;

        let (status, body) = app.send(get_request("/api/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = app.send(get_request("/api/ready", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["database"]["status"], "up");
    }

    /// Shared cache whose server is gone
    struct UnreachableCache;

    #[async_trait::async_trait]
    impl ProfileCache for UnreachableCache {
        async fn get(&self, _token: &str) -> Result<Option<CachedUser>> {
            Ok(None)
        }

        async fn put(&self, _token: &str, _user: &CachedUser) -> Result<()> {
            Ok(())
        }

        async fn invalidate(&self, _token: &str) -> Result<()> {
            Ok(())
        }

        async fn ping(&self) -> Result<()> {
            Err(AppError::CacheError {
                message: "connection refused".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_ready_checks_shared_cache() {
        let mut config = AppConfig::default();
        config.cache.backend = CacheBackend::Redis;
        let app = TestApp::with(config, Arc::new(UnreachableCache)).await;

        let (status, body) = app.send(get_request("/api/ready", None)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "not_ready");
        assert_eq!(body["checks"]["database"]["status"], "up");
        assert_eq!(body["checks"]["cache"]["status"], "down");

        // a process-local cache has nothing to check
        let app = TestApp::new().await;
        let (_, body) = app.send(get_request("/api/ready", None)).await;
        assert!(body["checks"].get("cache").is_none());
    }

    #[tokio::test]
    async fn test_request_id_header_is_configurable() {
        let mut config = AppConfig::default();
        config.observability.request_id_header = "X-Trace-Id".to_string();
        let app = TestApp::with(config, Arc::new(DisabledProfileCache)).await;

        let request = Request::builder()
            .uri("/api/health")
            .header("x-trace-id", "trace-123")
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.headers()["x-trace-id"], "trace-123");

        let response = app
            .router
            .clone()
            .oneshot(get_request("/api/health", None))
            .await
            .unwrap();
        assert!(response.headers().contains_key("x-trace-id"));
        assert!(!response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_malformed_input_gets_typed_errors() {
        let app = TestApp::new().await;
        let (_, author) = app.user(Role::Prof, AdminType::User).await;

        let (status, body) = app
            .send(json_request("POST", "/api/papers", Some(&author), json!({})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["field"], "title");

        let (status, body) = app.send(get_request("/api/papers/not-a-uuid", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, body) = app.send(get_request("/api/papers?page=first", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        // versions are multipart only
        let uri = format!("/api/papers/{}/versions", Uuid::new_v4());
        let (status, body) = app
            .send(json_request("POST", &uri, Some(&author), json!({ "file": "x" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_writes_require_a_session() {
        let app = TestApp::new().await;

        let (status, body) = app
            .send(json_request("POST", "/api/papers", None, json!({ "title": "T" })))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");

        let (status, _) = app
            .send(json_request("POST", "/api/papers", Some("not-a-jwt"), json!({ "title": "T" })))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_paper_flow_over_http() {
        let app = TestApp::new().await;
        let (_, author) = app.user(Role::Prof, AdminType::User).await;
        let (_, reader) = app.user(Role::Mentee, AdminType::User).await;

        let (status, body) = app
            .send(json_request(
                "POST",
                "/api/papers",
                Some(&author),
                json!({ "title": "Hangul typography", "description": "Draft" }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "draft");
        let id = body["id"].as_str().unwrap().to_string();

        // drafts are hidden from everyone else
        let (status, _) = app.send(get_request(&format!("/api/papers/{}", id), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, body) = app
            .send(get_request(&format!("/api/papers/{}", id), Some(&author)))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["authors"].as_array().unwrap().len(), 1);

        let versions = format!("/api/papers/{}/versions", id);
        let (status, body) = app.send(version_upload(&versions, &author, "paper v1.pdf")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["version_number"], 1);
        assert!(body["file_url"].as_str().unwrap().ends_with("/v1/paper_v1.pdf"));

        let (status, body) = app.send(version_upload(&versions, &author, "paper.pdf")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["code"], "THROTTLED");

        let (status, body) = app
            .send(json_request("POST", &format!("/api/papers/{}/publish", id), Some(&author), json!({ "title": "T" })))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "INVALID_TRANSITION");

        let (status, _) = app
            .send(json_request("POST", &format!("/api/papers/{}/submit", id), Some(&reader), json!({})))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .send(json_request("POST", &format!("/api/papers/{}/submit", id), Some(&author), json!({})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "in_review");

        let (status, body) = app
            .send(json_request(
                "POST",
                &format!("/api/papers/{}/publish", id),
                Some(&author),
                json!({ "title": "Hangul typography, revised" }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "published");

        let (status, body) = app
            .send(json_request(
                "POST",
                &format!("/api/papers/{}/comments", id),
                Some(&reader),
                json!({ "content": "Great read" }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["content"], "Great read");

        let (status, body) = app.send(get_request("/api/papers?q=HANGUL", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);

        let (status, body) = app
            .send(get_request(&format!("/api/papers/{}/comments", id), None))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_qna_reply_requires_mentor() {
        let app = TestApp::new().await;
        let (_, mentee) = app.user(Role::Mentee, AdminType::User).await;
        let (_, mentor) = app.user(Role::Mentor, AdminType::User).await;

        let (status, body) = app
            .send(json_request("POST", "/api/qna", Some(&mentee), json!({ "title": "Q", "content": "?" })))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_str().unwrap().to_string();

        let replies = format!("/api/qna/{}/replies", id);
        let (status, body) = app
            .send(json_request("POST", &replies, Some(&mentee), json!({ "content": "self" })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");

        let (status, _) = app
            .send(json_request("POST", &replies, Some(&mentor), json!({ "content": "answer" })))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, body) = app.send(get_request("/api/qna", None)).await;
        assert_eq!(body["items"][0]["reply_count"], 1);
    }

    #[tokio::test]
    async fn test_profile_endpoints() {
        let app = TestApp::new().await;
        let (me, token) = app.user(Role::Mentee, AdminType::User).await;
        let (_, admin) = app.user(Role::Admin, AdminType::Admin).await;

        let (status, body) = app.send(get_request("/api/me", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], me.id.to_string());

        let (status, body) = app
            .send(json_request("PATCH", "/api/me", Some(&token), json!({ "intro": "Hello" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["intro"], "Hello");

        let (status, _) = app.send(get_request("/api/profiles", Some(&token))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let roles = format!("/api/profiles/{}/roles", me.id);
        let (status, body) = app
            .send(json_request("PATCH", &roles, Some(&admin), json!({ "role": "mentor" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role_type"], "mentor");
    }
}
