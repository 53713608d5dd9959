//! Binds Axum's router to a TCP listener and drives it through the
//! graceful-shutdown lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use gateway_config::schema::GatewayConfig;
use tracing::info;

use crate::shutdown::{GracefulServer, ShutdownConfig, ShutdownCoordinator};
use crate::state::AppState;

/// Server bind/lifecycle settings, mirrored from `GatewayConfig::server`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub addr: SocketAddr,
    /// Graceful-shutdown tuning.
    pub shutdown: ShutdownConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            shutdown: ShutdownConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Build server settings from the loaded gateway configuration.
    #[must_use]
    pub fn from_gateway_config(config: &GatewayConfig) -> Self {
        let ip: std::net::IpAddr = config.server.host.parse().unwrap_or_else(|_| [0, 0, 0, 0].into());
        Self {
            addr: SocketAddr::from((ip, config.server.port)),
            shutdown: ShutdownConfig {
                drain_timeout: std::time::Duration::from_millis(config.server.drain_ms),
                ..ShutdownConfig::default()
            },
        }
    }
}

/// The bound HTTP server: owns the listener address and the shutdown
/// coordinator driving `AppState`'s drain accounting.
pub struct Server {
    config: ServerConfig,
    graceful: GracefulServer,
}

impl Server {
    /// Construct a server, allocating its own [`ShutdownCoordinator`] up
    /// front so the caller can wire it into [`AppState`] before `run`.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let graceful = GracefulServer::new(config.shutdown.clone());
        Self { config, graceful }
    }

    /// The shutdown coordinator this server drives -- pass to
    /// `AppState::builder().shutdown(...)` so requests admitted through
    /// `AppState` are drained by the same coordinator that triggers it.
    #[must_use]
    pub fn coordinator(&self) -> Arc<ShutdownCoordinator> {
        self.graceful.coordinator()
    }

    /// Bind and serve `router` until a shutdown signal arrives, then drain
    /// in-flight requests before returning the triggering reason (e.g.
    /// `"sigterm"`, `"ctrl+c"`) -- see [`crate::shutdown::is_interrupt_reason`]
    /// for mapping that to a process exit code.
    ///
    /// # Errors
    /// Returns an error if the listener cannot be bound or the server
    /// exits abnormally.
    pub async fn run(
        self,
        router: axum::Router,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.config.addr;
        info!(%addr, "binding gateway server");

        self.graceful
            .run_until_shutdown(move |coordinator| async move {
                let listener = tokio::net::TcpListener::bind(addr).await?;
                axum::serve(listener, router.into_make_service())
                    .with_graceful_shutdown(async move {
                        coordinator.shutdown_signal().await;
                    })
                    .await?;
                Ok(())
            })
            .await
    }
}
