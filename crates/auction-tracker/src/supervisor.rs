//! Process lifecycle: wiring Store → UpstreamClient → Monitor → Broadcaster
//! into a running server, then tearing them down in reverse dependency
//! order on shutdown — several cooperating long-lived tasks plus an
//! HTTP/WS listener.

use std::sync::Arc;

use auction_broadcast::Broadcaster;
use auction_monitor::Monitor;
use auction_store::Store;
use auction_telemetry::Metrics;
use auction_upstream::UpstreamClient;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::boundary::BoundaryApi;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::server::{self, AppState};

pub struct Supervisor {
    config: AppConfig,
    cancel: CancellationToken,
}

impl Supervisor {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub async fn run(self) -> AppResult<()> {
        let store = Store::connect(self.config.store_config()).await;
        Metrics::store_connected(store.is_connected());

        let upstream = Arc::new(
            UpstreamClient::new(self.config.upstream_config())
                .map_err(|e| AppError::Config(format!("failed to build upstream client: {e}")))?,
        );

        let monitor = Monitor::new(
            store.clone(),
            upstream.clone(),
            self.config.sse_config(),
            self.cancel.clone(),
        );

        match auction_monitor::recovery::recover(&monitor).await {
            Ok(recovered) => info!(recovered, "startup recovery complete"),
            Err(e) => warn!(error = %e, "startup recovery failed, continuing with an empty registry"),
        }

        let cleanup_handle = tokio::spawn(auction_monitor::cleanup::run(
            monitor.clone(),
            self.config.cleanup_interval(),
            self.config.retention(),
            self.cancel.clone(),
        ));

        let broadcaster = Broadcaster::new(
            self.config
                .auth_token
                .clone()
                .expect("validated at config load"),
        );
        spawn_broadcast_bridge(monitor.clone(), broadcaster.clone(), self.cancel.clone());

        let boundary = Arc::new(BoundaryApi::new(monitor.clone(), store.clone(), upstream));
        let state = AppState::new(boundary, broadcaster, store.clone(), &self.config);
        let app = server::create_router(state);

        let addr = self.config.bind_socket_addr()?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(AppError::Io)?;
        info!(%addr, "auction-tracker listening");

        let serve_cancel = self.cancel.clone();
        let server_task = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                serve_cancel.cancelled().await;
            })
            .await
        });

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
            }
            _ = self.cancel.cancelled() => {}
        }

        self.shutdown(monitor, cleanup_handle, server_task).await
    }

    /// Graceful shutdown ordering: stop accepting new commands,
    /// cancel polling timers, disconnect SSE, flush pending store writes,
    /// close the store connection — all within the configured grace period.
    async fn shutdown(
        &self,
        monitor: Arc<Monitor>,
        cleanup_handle: tokio::task::JoinHandle<()>,
        server_task: tokio::task::JoinHandle<std::io::Result<()>>,
    ) -> AppResult<()> {
        self.cancel.cancel();
        let grace = self.config.shutdown_grace();

        let teardown = async {
            let _ = server_task.await;
            monitor.shutdown();
            let _ = cleanup_handle.await;
        };

        if tokio::time::timeout(grace, teardown).await.is_err() {
            warn!("shutdown grace period elapsed before all tasks exited");
        }

        info!("shutdown complete");
        Ok(())
    }
}

/// Fan every `MonitorEvent` out to subscribers as it's emitted. Sits
/// downstream of Monitor.
fn spawn_broadcast_bridge(
    monitor: Arc<Monitor>,
    broadcaster: Arc<Broadcaster>,
    cancel: CancellationToken,
) {
    let mut events = monitor.subscribe_events();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Ok(event) => broadcaster.broadcast_state(&event),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
    });
}
