//! TCP status link
//!
//! A writer task drains an unbounded command channel into the socket, so
//! `send_line` never blocks the playback tick. A reader task splits incoming
//! bytes into lines, parses them, and posts snapshots into the mailbox.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::{StatusSink, TransportError};
use crate::status;
use crate::sync::SnapshotMailbox;

/// Longest status line kept in memory; longer lines are skipped up to their newline
const MAX_LINE_BYTES: usize = 4096;

/// Commands sent to the writer task
#[derive(Debug)]
enum LinkCommand {
    Send(String),
    Shutdown,
}

/// Connected status channel with its reader and writer tasks
pub struct StatusLink {
    addr: String,
    command_tx: mpsc::UnboundedSender<LinkCommand>,
    connected: Arc<AtomicBool>,
    reader_cancel: Option<oneshot::Sender<()>>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl StatusLink {
    /// Connect and start the reader and writer tasks on the current runtime.
    /// Parsed snapshots from the peer land in `mailbox`.
    pub async fn connect(host: &str, port: u16, mailbox: SnapshotMailbox) -> Result<Self, TransportError> {
        let addr = format!("{}:{}", host, port);
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| TransportError::Connect {
                addr: addr.clone(),
                source,
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Status link: failed to set TCP_NODELAY: {}", e);
        }

        let (read_half, write_half) = stream.into_split();
        let connected = Arc::new(AtomicBool::new(true));
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let writer = tokio::spawn(write_loop(
            write_half,
            command_rx,
            Arc::clone(&connected),
            addr.clone(),
        ));
        let reader = tokio::spawn(read_loop(
            read_half,
            cancel_rx,
            mailbox,
            Arc::clone(&connected),
            addr.clone(),
        ));

        info!("Status link connected to {}", addr);

        Ok(Self {
            addr,
            command_tx,
            connected,
            reader_cancel: Some(cancel_tx),
            reader: Some(reader),
            writer: Some(writer),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Stop both tasks and wait for them to return. Lines queued before the
    /// call are still written.
    pub async fn shutdown(mut self) {
        let _ = self.command_tx.send(LinkCommand::Shutdown);
        if let Some(cancel) = self.reader_cancel.take() {
            let _ = cancel.send(());
        }

        for task in [self.writer.take(), self.reader.take()].into_iter().flatten() {
            if let Err(e) = task.await {
                warn!("Status link task for {} ended abnormally: {}", self.addr, e);
            }
        }

        self.connected.store(false, Ordering::SeqCst);
        debug!("Status link to {} shut down", self.addr);
    }
}

impl StatusSink for StatusLink {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send_line(&self, line: &str) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }

        let mut line = line.to_string();
        if !line.ends_with('\n') {
            line.push('\n');
        }
        self.command_tx
            .send(LinkCommand::Send(line))
            .map_err(|_| TransportError::Closed)
    }
}

/// Flip the link to disconnected, warning only on the first loss
fn mark_disconnected(connected: &AtomicBool, addr: &str, reason: &str) {
    if connected.swap(false, Ordering::SeqCst) {
        warn!("Status link to {} lost: {}", addr, reason);
    }
}

async fn write_loop(
    mut write_half: OwnedWriteHalf,
    mut command_rx: mpsc::UnboundedReceiver<LinkCommand>,
    connected: Arc<AtomicBool>,
    addr: String,
) {
    while let Some(command) = command_rx.recv().await {
        match command {
            LinkCommand::Send(line) => {
                if let Err(e) = write_half.write_all(line.as_bytes()).await {
                    mark_disconnected(&connected, &addr, &e.to_string());
                    break;
                }
                trace!("Status link: sent {}", line.trim_end());
            }
            LinkCommand::Shutdown => break,
        }
    }
    let _ = write_half.shutdown().await;
}

#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    Line,
    TooLong,
    Closed,
}

/// Read one line into `buf`, never buffering more than `MAX_LINE_BYTES`.
/// An oversized line is consumed through its newline and reported as `TooLong`.
async fn read_capped_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let read = (&mut *reader).take(MAX_LINE_BYTES as u64).read_until(b'\n', buf).await?;
    if read == 0 {
        return Ok(LineRead::Closed);
    }
    if buf.last() == Some(&b'\n') || read < MAX_LINE_BYTES {
        return Ok(LineRead::Line);
    }

    buf.clear();
    loop {
        let (newline, available) = {
            let chunk = reader.fill_buf().await?;
            (chunk.iter().position(|&b| b == b'\n'), chunk.len())
        };
        match newline {
            Some(at) => {
                reader.consume(at + 1);
                return Ok(LineRead::TooLong);
            }
            None if available == 0 => return Ok(LineRead::Closed),
            None => reader.consume(available),
        }
    }
}

async fn read_loop(
    read_half: OwnedReadHalf,
    mut cancel_rx: oneshot::Receiver<()>,
    mailbox: SnapshotMailbox,
    connected: Arc<AtomicBool>,
    addr: String,
) {
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::with_capacity(256);

    loop {
        tokio::select! {
            _ = &mut cancel_rx => {
                debug!("Status link reader for {} stopping", addr);
                break;
            }
            read = read_capped_line(&mut reader, &mut buf) => match read {
                Ok(LineRead::Closed) => {
                    mark_disconnected(&connected, &addr, "closed by peer");
                    break;
                }
                Ok(LineRead::TooLong) => {
                    debug!("Status link: dropped line longer than {} bytes", MAX_LINE_BYTES);
                }
                Ok(LineRead::Line) => {
                    let line = String::from_utf8_lossy(&buf);
                    match status::parse_line(&line) {
                        Ok(snapshot) => {
                            if mailbox.post(snapshot) {
                                trace!("Status link: replaced an unconsumed snapshot");
                            }
                        }
                        Err(rejection) => trace!("Status link: dropped line ({})", rejection),
                    }
                }
                Err(e) => {
                    mark_disconnected(&connected, &addr, &e.to_string());
                    break;
                }
            }
        }
    }
}
