//! HTTP front end for formgate.
//!
//! A single POST endpoint accepts untrusted form submissions, runs them
//! through the anti-abuse guard, and hands validated messages to the
//! mailer. Every request is answered with a small JSON body and logged
//! to the audit trail; see [`handler`] for the orchestration.

pub mod error;
pub mod extract;
pub mod handler;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use formgate_common::Config;
use formgate_common::audit::AuditLog;
use formgate_delivery::Mailer;
use formgate_guard::{Guard, MemoryRateStore};
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;

pub use error::RequestError;

/// Shared per-process state, cloned into every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub guard: Arc<Guard>,
    pub mailer: Arc<Mailer>,
    pub audit: AuditLog,
}

impl AppState {
    /// Assemble the state from a loaded configuration: in-memory rate
    /// store, guard, transport chain, and audit writer.
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        let store = Arc::new(MemoryRateStore::new(Duration::from_secs(
            config.anti_abuse.rate_window_secs,
        )));
        let guard = Arc::new(Guard::new(config.anti_abuse.clone(), store));
        let mailer = Arc::new(Mailer::from_config(&config.transport, &config.identity));
        let audit = AuditLog::new(&config.logging);

        Self {
            config: Arc::new(config),
            guard,
            mailer,
            audit,
        }
    }
}

/// Build the router: the submission endpoint, a 405 for other methods on
/// it, and a liveness probe.
#[must_use]
pub fn router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);
    let body_limit = state.config.anti_abuse.max_attachment_bytes + 1024 * 1024;
    let submit_path = state.config.server.submit_path.clone();

    Router::new()
        .route(
            &submit_path,
            post(handler::submit).fallback(handler::method_not_allowed),
        )
        .route("/healthz", get(handler::healthz))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::new(timeout))
        .with_state(state)
}

/// Serve until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if binding or serving fails.
pub async fn serve(
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let address = state.config.server.listen_address.clone();
    let listener = TcpListener::bind(&address).await?;
    tracing::info!(%address, "submission endpoint bound");

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    tracing::info!("submission endpoint stopped");
    Ok(())
}
