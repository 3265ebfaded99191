//! # Second Factor Server
//!
//! HTTP front end for the second step of a two-step login. The password step
//! (outside this server) leaves `pending_user_id` in the session; the routes
//! below accept a security key assertion, a backup code, or a TOTP token and
//! promote that id to `user_id`.

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use second_factor_server::config::Config;
use second_factor_server::handlers::health::health_check;
use second_factor_server::handlers::second_factor::*;
use second_factor_server::middleware::auth::require_pending_user;
use second_factor_server::state::AppState;
use time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main application entry point
///
/// 1. Sets up logging
/// 2. Loads configuration from environment variables
/// 3. Connects to the database and builds the verifiers
/// 4. Configures HTTP sessions, which carry the pending login and the
///    outstanding WebAuthn challenge between requests
/// 5. Sets up the routes and middleware
/// 6. Starts the HTTP server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing/logging
    // Default: info level for dependencies, debug level for this crate
    // Can be overridden with the RUST_LOG environment variable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,second_factor_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment variables and .env file
    // This includes the database URL, bind address, relying party and app id
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded: {:?}", config);

    // Initialize application state
    // Connects to the database, runs the credential migrations and builds
    // the WebAuthn, backup code and TOTP verifiers shared by all handlers
    let app_state = AppState::new(&config).await?;
    tracing::info!("Application state initialized");

    // Configure session store using SQLite
    // The browser only holds a session ID cookie; the pending user id, the
    // outstanding challenge and the verified user id live server-side
    let session_store = SqliteStore::new(app_state.db.clone());
    // Run migrations to create the session table
    session_store.migrate().await?;

    // Configure session expiry: 24 hours of inactivity
    // An abandoned login also drops its pending user and challenge with it
    let session_layer = SessionManagerLayer::new(session_store)
        .with_expiry(Expiry::OnInactivity(Duration::hours(24)));

    // Configure CORS (Cross-Origin Resource Sharing)
    // Lets the login page call the API when it is served from another origin
    // TODO: restrict to RP_ORIGIN once the login page is served from a fixed origin
    let cors = CorsLayer::new()
        .allow_origin(Any)      // Allow requests from any origin
        .allow_methods(Any)     // Allow all HTTP methods
        .allow_headers(Any);    // Allow all request headers

    // Build the second-factor routes
    // Wrapped with require_pending_user: a session that has not passed the
    // password step gets 401 Unauthorized before any verifier runs
    let second_factor_routes = Router::new()
        .route("/api/second-factor/webauthn/challenge", post(webauthn_challenge))
        .route("/api/second-factor/webauthn", post(webauthn_verify))
        .route("/api/second-factor/backup-code", post(backup_code_verify))
        .route("/api/second-factor/totp", post(totp_verify))
        .layer(axum_middleware::from_fn(require_pending_user))
        .with_state(app_state.clone());

    // Build main application router
    let app = Router::new()
        // Health check endpoint - useful for monitoring and load balancers
        .route("/health", get(health_check))
        // Where the session stands: pending second factor or logged in
        .route("/api/second-factor/status", post(status))
        // Challenge issuance and the three verification endpoints
        .merge(second_factor_routes)
        // Apply middleware layers (the last one added runs first):
        // TraceLayer logs the request, CorsLayer answers preflights, then
        // the session layer loads the session for the handlers
        .layer(session_layer)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // Attach shared application state (pool, challenge generator, verifiers)
        .with_state(app_state);

    // Start the HTTP server on the configured host and port (default: 127.0.0.1:8000)

    let bind_addr = config.bind_address();
    tracing::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
