//! Ingestion accept loop.
//!
//! One task per accepted connection, unbounded, with no idle timeout. The
//! loop never waits on a connection task. Stopping the listener closes the
//! listening socket only; connections already accepted run until their peer
//! closes or I/O fails.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

use tallyline_core::error::{Result, TallyError};

use crate::ingest::connection::IngestConnection;
use crate::ingest::schema::LineSchema;
use crate::ingest::stats::IngestStats;

pub struct IngestListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    schema: Arc<LineSchema>,
    stats: Arc<IngestStats>,
}

impl IngestListener {
    /// Bind `addr`. A bind error is returned as-is and never retried.
    pub async fn bind(
        addr: SocketAddr,
        schema: Arc<LineSchema>,
        stats: Arc<IngestStats>,
    ) -> Result<Self> {
        let bind_err = |source| TallyError::Bind { addr, source };
        let listener = TcpListener::bind(addr).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        tracing::info!(listener = schema.listener(), %local_addr, "ingestion listener bound");
        Ok(Self {
            listener,
            local_addr,
            schema,
            stats,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run the accept loop on its own task.
    pub fn spawn(self) -> ListenerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let local_addr = self.local_addr;
        let name = self.schema.listener().to_string();
        let task = tokio::spawn(self.run(stop_rx));
        ListenerHandle {
            name,
            local_addr,
            stop_tx,
            task,
        }
    }

    /// Accept until `stop` flips to `true` or its sender is dropped.
    pub async fn run(self, mut stop: watch::Receiver<bool>) {
        let name = self.schema.listener().to_string();

        loop {
            tokio::select! {
                biased;

                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }

                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.dispatch(stream, peer),
                        Err(e) => {
                            self.stats.accept_failures.increment(1);
                            let e = TallyError::Accept(e);
                            tracing::warn!(listener = %name, code = e.kind().as_str(), error = %e, "accept failed");
                        }
                    }
                }
            }
        }

        tracing::info!(listener = %name, local_addr = %self.local_addr, "ingestion listener stopped");
        // `self.listener` drops here, closing the socket.
    }

    fn dispatch(&self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        self.stats.accepted.increment(1);
        let span = tracing::info_span!("conn", listener = self.schema.listener(), %peer);
        let conn = IngestConnection::new(stream, Arc::clone(&self.schema), Arc::clone(&self.stats));

        tokio::spawn(
            async move {
                tracing::debug!("connection opened");
                match conn.run().await {
                    Ok(summary) => tracing::debug!(
                        applied = summary.applied,
                        skipped = summary.skipped,
                        rejected = summary.rejected,
                        "connection closed by peer"
                    ),
                    Err(e) => tracing::warn!(code = e.kind().as_str(), error = %e, "connection closed"),
                }
            }
            .instrument(span),
        );
    }
}

/// Running accept loop.
///
/// Dropping the handle stops the loop as well.
#[derive(Debug)]
pub struct ListenerHandle {
    name: String,
    local_addr: SocketAddr,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Close the listening socket. Accepted connections are not affected.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Stop and wait for the accept loop to exit.
    pub async fn shutdown(self) {
        self.stop();
        if let Err(e) = self.task.await {
            tracing::error!(listener = %self.name, error = %e, "accept loop panicked");
        }
    }
}
