//! Process lifecycle: logging, startup ordering, graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing_subscriber::{fmt, EnvFilter};

use tallyline_core::error::{Result, TallyError};

use crate::app_state::AppState;
use crate::config::GatewayConfig;
use crate::ingest::{self, ListenerHandle};
use crate::obs::MetricRegistry;
use crate::router;

/// Install the fmt subscriber. `RUST_LOG` wins; defaults to `info`.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}

/// Wait for Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Running gateway: ingestion listeners plus the scrape server.
pub struct Gateway {
    state: AppState,
    listeners: Vec<ListenerHandle>,
    scrape_addr: SocketAddr,
    http_stop: oneshot::Sender<()>,
    http_task: JoinHandle<std::io::Result<()>>,
}

impl Gateway {
    /// Start everything in order: registry, schema registration, ingestion
    /// binds, scrape bind. Any failure aborts startup and whatever was
    /// already bound is released.
    pub async fn start(cfg: GatewayConfig) -> Result<Self> {
        let registry = Arc::new(MetricRegistry::new());

        let prepared = ingest::prepare(&cfg.listeners, &registry)?;
        let scrape_listen = cfg.scrape.listen_addr()?;

        let listeners = ingest::start(prepared).await?;

        let http = TcpListener::bind(scrape_listen)
            .await
            .map_err(|source| TallyError::Bind {
                addr: scrape_listen,
                source,
            })?;
        let scrape_addr = http.local_addr().map_err(|source| TallyError::Bind {
            addr: scrape_listen,
            source,
        })?;

        let state = AppState::new(cfg, registry);
        let app = router::build_router(state.clone());

        tracing::info!(%scrape_addr, path = %state.cfg().scrape.path, "scrape endpoint starting");

        let (http_stop, stop_rx) = oneshot::channel::<()>();
        let http_task = tokio::spawn(async move {
            axum::serve(http, app)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.await;
                })
                .await
        });

        Ok(Self {
            state,
            listeners,
            scrape_addr,
            http_stop,
            http_task,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn registry(&self) -> Arc<MetricRegistry> {
        self.state.registry()
    }

    pub fn scrape_addr(&self) -> SocketAddr {
        self.scrape_addr
    }

    pub fn listeners(&self) -> &[ListenerHandle] {
        &self.listeners
    }

    /// Address of a listener by name.
    pub fn listener_addr(&self, name: &str) -> Option<SocketAddr> {
        self.listeners
            .iter()
            .find(|l| l.name() == name)
            .map(ListenerHandle::local_addr)
    }

    /// Drain: report not-ready, stop accepting producers, then stop the
    /// scrape server. Live ingestion connections are left to finish.
    pub async fn shutdown(self) -> Result<()> {
        self.state.set_draining();
        tracing::info!("draining");

        for l in self.listeners {
            l.shutdown().await;
        }

        let _ = self.http_stop.send(());
        match self.http_task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TallyError::Internal(format!("scrape server failed: {e}"))),
            Err(e) => Err(TallyError::Internal(format!("scrape server task failed: {e}"))),
        }
    }
}
