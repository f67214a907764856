//! Health server lifecycle.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use relay_common::error::AppError;

use crate::routes::create_router;
use crate::state::AppState;

/// Liveness HTTP server running in a background task.
pub struct HealthServer {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl HealthServer {
    /// Bind `addr` and start serving.
    pub async fn start(addr: SocketAddr, state: AppState) -> Result<Self, AppError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::Internal(format!("failed to bind health server on {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| AppError::Internal(e.to_string()))?;

        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        let app = create_router(state);

        let handle = tokio::spawn(async move {
            tracing::info!(addr = %local_addr, "Health server listening");
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Health server failed");
            }
        });

        Ok(Self {
            local_addr,
            shutdown,
            handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait at most `grace` for open ones.
    pub async fn stop(self, grace: Duration) {
        self.shutdown.cancel();

        let mut handle = self.handle;
        match tokio::time::timeout(grace, &mut handle).await {
            Ok(Ok(())) => tracing::info!("Health server stopped"),
            Ok(Err(e)) => tracing::error!(error = %e, "Health server task failed"),
            Err(_) => {
                tracing::warn!(
                    grace_secs = grace.as_secs_f64(),
                    "Health server forced to shut down"
                );
                handle.abort();
            }
        }
    }
}
