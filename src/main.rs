use std::net::SocketAddr;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use storefront::config::Config;
use storefront::store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("STOREFRONT_LOG").unwrap_or_else(|_| "info".into()))
        .with(fmt::layer().json())
        .init();

    let cfg = Config::load().inspect_err(|e| tracing::error!(error = %e, "invalid configuration"))?;

    // Connect to Postgres and run migrations
    let pool = store::pool::connect(&cfg).await?;

    // Seed the first admin on an empty database
    store::bootstrap::run(
        &pool,
        cfg.admin_email.as_deref(),
        cfg.admin_password.as_deref(),
    )
    .await?;

    let addr: SocketAddr = cfg.listen.parse()?;
    let shutdown_grace = cfg.shutdown_grace;
    let app = storefront::app(store::AppState::new(pool.clone(), cfg));

    tracing::info!(%addr, "starting storefront");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let cancel = CancellationToken::new();
    let mut server = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(cancel.cancelled_owned())
                .await
        }
    });

    tokio::select! {
        result = &mut server => {
            // Server exited without a signal; surface its error.
            result??;
        }
        () = shutdown_signal() => {
            cancel.cancel();
            match tokio::time::timeout(shutdown_grace, &mut server).await {
                Ok(result) => result??,
                Err(_) => {
                    tracing::warn!(grace = ?shutdown_grace, "drain timed out, aborting in-flight requests");
                    server.abort();
                }
            }
        }
    }

    pool.close().await;
    tracing::info!("storefront stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
