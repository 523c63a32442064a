//! axumサーバー起動・シャットダウンハンドリング

use crate::activity::ActivityEntry;
use crate::AppState;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

/// アドレスをバインドし、Ctrl+C / SIGTERM まで待機する
pub async fn run(state: AppState, bind_addr: &str) -> io::Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    serve(state, listener, shutdown_signal()).await
}

/// バインド済みのリスナーでサーバーを起動し、`shutdown` の完了で停止する
pub async fn serve<F>(state: AppState, listener: TcpListener, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local_addr = listener.local_addr()?;

    state
        .activity
        .record(ActivityEntry::Startup {
            addr: local_addr.to_string(),
        })
        .await;

    let app = crate::api::create_app(state);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// シャットダウンシグナルを待機
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}
