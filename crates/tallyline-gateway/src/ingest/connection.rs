//! One accepted ingestion connection.
//!
//! `Open -> (ReadLine)* -> Closed`. Valid lines update the schema's gauges and
//! then its line counter; empty lines are skipped; malformed lines are logged
//! and discarded. Only end-of-stream or an I/O error closes the connection.
//! The stream is owned by the connection and dropped on every exit path.
//! Gauges are left as they are when the connection closes.

use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use tallyline_core::error::{Result, TallyError};
use tallyline_core::protocol::frame::{self, LineFramer};
use tallyline_core::protocol::line::{parse_line, ParsedLine};

use crate::config::IngestMode;
use crate::ingest::schema::LineSchema;
use crate::ingest::stats::{ActiveGuard, IngestStats};

const READ_CHUNK: usize = 4 * 1024;

/// Line tallies for one connection.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConnSummary {
    pub applied: u64,
    pub skipped: u64,
    pub rejected: u64,
}

pub struct IngestConnection<S> {
    stream: S,
    schema: Arc<LineSchema>,
    stats: Arc<IngestStats>,
    buf: BytesMut,
    summary: ConnSummary,
}

impl<S> IngestConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, schema: Arc<LineSchema>, stats: Arc<IngestStats>) -> Self {
        Self {
            stream,
            schema,
            stats,
            buf: BytesMut::with_capacity(READ_CHUNK),
            summary: ConnSummary::default(),
        }
    }

    /// Read and apply lines until the peer closes (`Ok`) or I/O fails
    /// (`ConnectionIo`).
    pub async fn run(mut self) -> Result<ConnSummary> {
        let stats = Arc::clone(&self.stats);
        let _active = ActiveGuard::enter(&stats.active);

        let res = self.pump().await;
        stats.connection_lines.record(self.summary.applied as f64);
        res.map(|()| self.summary)
    }

    async fn pump(&mut self) -> Result<()> {
        let mut framer = LineFramer::default();
        loop {
            while let Some(line) = framer.next_line(&mut self.buf) {
                self.handle_line(&line).await?;
            }

            self.buf.reserve(READ_CHUNK);
            let n = self
                .stream
                .read_buf(&mut self.buf)
                .await
                .map_err(TallyError::ConnectionIo)?;
            if n == 0 {
                if let Some(line) = frame::take_trailing(&mut self.buf) {
                    self.handle_line(&line).await?;
                }
                return Ok(());
            }
        }
    }

    async fn handle_line(&mut self, raw: &[u8]) -> Result<()> {
        match parse_line(raw, self.schema.kinds()) {
            Ok(ParsedLine::Empty) => self.summary.skipped += 1,
            Ok(ParsedLine::Values(values)) => {
                tracing::trace!(?values, "line applied");
                self.schema.apply(&values);
                self.summary.applied += 1;
            }
            Err(e) => {
                self.stats.parse_failures.increment(1);
                self.summary.rejected += 1;
                let e = TallyError::from(e);
                tracing::warn!(
                    code = e.kind().as_str(),
                    error = %e,
                    line = %String::from_utf8_lossy(raw).trim_end(),
                    "line discarded"
                );
            }
        }

        if self.schema.mode() == IngestMode::EchoAck {
            self.stream
                .write_all(self.schema.ack())
                .await
                .map_err(TallyError::ConnectionIo)?;
        }
        Ok(())
    }
}
