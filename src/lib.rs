//! Documentation of the weekly prescription service for a school guidance office.
//!
//! Once per calendar week a staff member describes a trending issue, the
//! service asks a language model for interventions, and the structured answer
//! is kept in a small JSON history.
//!
//!
//!
//! # Request Flow
//! - Bearer token is resolved to a principal (see [`auth`])
//! - Admission check: at most one prescription per week (see [`admission`])
//! - Prompt is rendered from the issue and optional context (see [`prompt`])
//! - Single call to the model, no retries (see [`gateway`])
//! - Reply is sanitized and parsed into a [`models::Solution`] (see [`parse`])
//! - Record is inserted into the history if the week is still free (see [`history`])
//!
//!
//!
//! # Routes
//!
//! All under `/api/prescriptions`, bearer token required.
//!
//! | Method | Path | Result |
//! |--------|------|--------|
//! | GET | `/check-availability` | whether a prescription can be created now |
//! | GET | `/this-week` | this week's prescription, if any |
//! | GET | `/history` | every prescription, newest first |
//! | POST | `/prescribe` | `{ issue, context? }` creates this week's prescription |
//!
//! `GET /health` is open.
//!
//!
//!
//! # Weeks
//! - Monday 00:00:00.000 to Sunday 23:59:59.999, server local time
//! - Identified by ISO 8601 week, key `"{year}-W{week}"`
//! - A failed model call or unparseable reply does not use up the week
//!
//!
//!
//! # Setup
//!
//! Secrets are read from `/run/secrets/<NAME>`, falling back to the environment.
//! ```sh
//! export ANTHROPIC_API_KEY=sk-...
//! export AUTH_TOKENS="dev-token:counselor-1:counselor"
//! RUST_LOG=info cargo run
//! ```
//!
//! Check availability.
//! ```sh
//! curl -H "Authorization: Bearer dev-token" http://localhost:1111/api/prescriptions/check-availability
//! ```
//!
//! Create this week's prescription.
//! ```sh
//! curl -X POST -H "Authorization: Bearer dev-token" -H "Content-Type: application/json" \
//!   -d '{"issue":"Rising absenteeism in Grade 10","context":{"grade":"10","caseCount":14}}' \
//!   http://localhost:1111/api/prescriptions/prescribe
//! ```
use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tokio::{net::TcpListener, signal::ctrl_c};
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod admission;
pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod history;
pub mod models;
pub mod parse;
pub mod prompt;
pub mod routes;
pub mod service;
pub mod state;
pub mod week;

use auth::require_principal;
use routes::{
    check_availability_handler, health_handler, history_handler, prescribe_handler,
    this_week_handler,
};
use state::AppState;

pub async fn start_server() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = AppState::new().await?;

    info!("Starting server...");

    let app = app(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");

    Ok(())
}

pub fn app(state: Arc<AppState>) -> Router {
    let prescriptions = Router::new()
        .route("/check-availability", get(check_availability_handler))
        .route("/this-week", get(this_week_handler))
        .route("/history", get(history_handler))
        .route("/prescribe", post(prescribe_handler))
        .route_layer(from_fn_with_state(state.clone(), require_principal));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/prescriptions", prescriptions)
        .layer(cors(state.config.cors_origin.as_deref()))
        .with_state(state)
}

fn cors(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    match origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => layer.allow_origin(origin),
        Some(Err(e)) => {
            warn!("Invalid CORS_ORIGIN ({e}), allowing any origin");
            layer.allow_origin(Any)
        }
        None => layer.allow_origin(Any),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
