/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use trustledger_api::{app::{build_router, AppState}, config::Config};
/// use trustledger_shared::store::memory::MemoryStore;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let state = AppState::new(Arc::new(MemoryStore::new()), config);
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer};
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use chrono::Duration;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use trustledger_shared::{
    auth::{
        middleware::create_session_middleware,
        session::{JwtSessionStore, SessionRegistry, SessionStore},
    },
    ledger::{identity::IdentityAllocator, service::Ledger},
    store::RecordStore,
};

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Ledger use cases over the record store
    pub ledger: Ledger,

    /// Session issuing and validation
    pub sessions: Arc<dyn SessionStore>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates new application state over a store that also keeps sessions
    pub fn new<S>(store: Arc<S>, config: Config) -> Self
    where
        S: RecordStore + SessionRegistry + 'static,
    {
        let ledger = Ledger::new(
            store.clone(),
            IdentityAllocator::new(config.ledger.member_code_prefix.clone()),
            config.ledger.default_annual_tax,
        );
        let sessions = JwtSessionStore::new(
            config.session.secret.clone(),
            Duration::hours(config.session.ttl_hours),
            store,
        );

        Self {
            ledger,
            sessions: Arc::new(sessions),
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                        # Health check (public)
/// └── /api/
///     ├── /auth/login                # public
///     ├── /auth/{logout,change-password,reset-password}
///     ├── /members[/me|/statistics|/:id|/:id/children]
///     ├── /children[/:id]
///     ├── /payments[/mine|/statistics|/recent|/:id]
///     ├── /bank-accounts[/:id]
///     └── /dashboard/{stats,recent-members}
/// ```
///
/// Everything under `/api` except login requires a session. Role checks
/// (admin or owner) happen in the handlers.
///
/// # Middleware Stack
///
/// Applied in order (outermost first):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Session authentication (protected routes only)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Login is the only public API route
    let public_routes = Router::new().route("/auth/login", post(routes::auth::login));

    let protected_routes = Router::new()
        .route("/auth/logout", post(routes::auth::logout))
        .route("/auth/change-password", post(routes::auth::change_password))
        .route("/auth/reset-password", post(routes::auth::reset_password))
        .route(
            "/members",
            get(routes::members::list_members).post(routes::members::create_member),
        )
        .route("/members/me", get(routes::members::my_profile))
        .route("/members/statistics", get(routes::members::member_statistics))
        .route(
            "/members/:id",
            get(routes::members::get_member)
                .put(routes::members::update_member)
                .delete(routes::members::delete_member),
        )
        .route("/members/:id/children", post(routes::children::add_child))
        .route("/children", get(routes::children::list_children))
        .route(
            "/children/:id",
            get(routes::children::get_child)
                .put(routes::children::update_child)
                .delete(routes::children::delete_child),
        )
        .route(
            "/payments",
            get(routes::payments::list_payments).post(routes::payments::record_payment),
        )
        .route("/payments/mine", get(routes::payments::my_payments))
        .route("/payments/statistics", get(routes::payments::payment_statistics))
        .route("/payments/recent", get(routes::payments::recent_payments))
        .route(
            "/payments/:id",
            get(routes::payments::get_payment).put(routes::payments::update_payment),
        )
        .route(
            "/bank-accounts",
            get(routes::bank_accounts::list_bank_accounts).post(routes::bank_accounts::create_bank_account),
        )
        .route(
            "/bank-accounts/:id",
            get(routes::bank_accounts::get_bank_account)
                .put(routes::bank_accounts::update_bank_account)
                .delete(routes::bank_accounts::delete_bank_account),
        )
        .route("/dashboard/stats", get(routes::dashboard::stats))
        .route("/dashboard/recent-members", get(routes::dashboard::recent_members))
        .layer(middleware::from_fn(create_session_middleware(state.sessions.clone())));

    let api_routes = Router::new().merge(public_routes).merge(protected_routes);

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    let production = state.config.api.production;

    Router::new()
        .merge(health_routes)
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(production))
        .with_state(state)
}
