//! Process entry point: load the configuration, assemble the state, and
//! serve until interrupted.

use formgate_common::{Config, logging};
use formgate_server::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let path = Config::find_file()?;
    tracing::info!(path = %path.display(), "loading configuration");
    let config = Config::load(&path)?;

    let state = AppState::from_config(config);
    formgate_server::serve(state, shutdown_signal()).await?;

    tracing::info!("shut down cleanly");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => tracing::info!("received SIGINT"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
