//! Line-delimited JSON transport over a pair of byte streams
//!
//! Used for the engine subprocess (its stdin/stdout) and for `hr serve`,
//! where this process's own stdin/stdout is the panel channel.

use std::io;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use super::{InboundSink, Transport, TransportError, TransportId};
use crate::protocol::Envelope;

/// Inbound lines longer than this are discarded without being buffered
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

pub struct StdioTransport {
    id: TransportId,
    out_tx: mpsc::UnboundedSender<String>,
    alive: Arc<watch::Sender<bool>>,
}

impl StdioTransport {
    /// Start reader and writer tasks over the given streams
    ///
    /// EOF on the reader or a failed write marks the transport dead and
    /// reports it through the sink.
    pub fn spawn<R, W>(reader: R, writer: W, sink: InboundSink) -> Arc<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let id = sink.transport_id();
        let alive = Arc::new(watch::Sender::new(true));
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        tokio::spawn(read_loop(reader, sink.clone(), alive.clone()));
        tokio::spawn(write_loop(writer, out_rx, sink, alive.clone()));

        Arc::new(Self { id, out_tx, alive })
    }

    /// Resolves once the transport has died
    pub async fn closed(&self) {
        let mut rx = self.alive.subscribe();
        let _ = rx.wait_for(|alive| !*alive).await;
    }
}

impl Transport for StdioTransport {
    fn id(&self) -> TransportId {
        self.id
    }

    fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        if !self.is_alive() {
            return Err(TransportError::Closed);
        }
        let line = envelope.to_line()?;
        self.out_tx.send(line).map_err(|_| TransportError::Closed)
    }

    fn is_alive(&self) -> bool {
        *self.alive.borrow()
    }
}

/// Read one `\n`-terminated line into `buf`, holding at most `max` bytes
///
/// Returns `None` at EOF, `Some(false)` when the line was longer than `max`
/// (the rest of it is skipped and `buf` is left empty), `Some(true)` otherwise.
async fn read_line_bounded<R>(reader: &mut R, buf: &mut Vec<u8>, max: usize) -> io::Result<Option<bool>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut oversized = false;
    let mut seen_any = false;
    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            if !seen_any {
                return Ok(None);
            }
            break;
        }
        seen_any = true;

        let (line_part, done) = match chunk.iter().position(|&b| b == b'\n') {
            Some(pos) => (&chunk[..pos], true),
            None => (chunk, false),
        };
        if !oversized {
            if buf.len() + line_part.len() > max {
                oversized = true;
                buf.clear();
            } else {
                buf.extend_from_slice(line_part);
            }
        }

        let used = line_part.len() + usize::from(done);
        reader.consume(used);
        if done {
            break;
        }
    }
    Ok(Some(!oversized))
}

async fn read_loop<R>(reader: R, sink: InboundSink, alive: Arc<watch::Sender<bool>>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        match read_line_bounded(&mut reader, &mut buf, MAX_LINE_BYTES).await {
            Ok(Some(true)) => {
                let line = buf.trim_ascii();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_slice::<Value>(line) {
                    Ok(raw) => {
                        if !sink.deliver(raw) {
                            debug!(peer = %sink.peer(), "read_loop: router gone, stopping");
                            break;
                        }
                    }
                    Err(e) => warn!(peer = %sink.peer(), error = %e, "Dropping undecodable line"),
                }
            }
            Ok(Some(false)) => {
                warn!(peer = %sink.peer(), max = MAX_LINE_BYTES, "Dropping oversized message");
            }
            Ok(None) => {
                debug!(peer = %sink.peer(), "read_loop: EOF");
                break;
            }
            Err(e) => {
                warn!(peer = %sink.peer(), error = %e, "read_loop: read failed");
                break;
            }
        }
    }
    alive.send_replace(false);
    sink.closed();
}

async fn write_loop<W>(
    mut writer: W,
    mut out_rx: mpsc::UnboundedReceiver<String>,
    sink: InboundSink,
    alive: Arc<watch::Sender<bool>>,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = out_rx.recv().await {
        let result: io::Result<()> = async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = result {
            warn!(peer = %sink.peer(), error = %e, "write_loop: write failed");
            alive.send_replace(false);
            sink.closed();
            return;
        }
    }
    debug!(peer = %sink.peer(), "write_loop: transport dropped");
}
