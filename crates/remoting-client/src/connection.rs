//! One TCP connection to a name server or broker.

use crate::codec::{encode_frame, read_frame};
use crate::command::RemotingCommand;
use crate::error::RemotingError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type Pending = Arc<Mutex<Waiters>>;

/// Requests waiting for a response. Once `closed` is set no new waiter is
/// registered.
#[derive(Default)]
struct Waiters {
    by_opaque: HashMap<i32, oneshot::Sender<RemotingCommand>>,
    closed: bool,
}

/// A multiplexed request/response connection.
///
/// Requests carry a connection-unique `opaque` id; a background reader task
/// hands each response to the request waiting on the same id.
pub struct Connection {
    addr: String,
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    pending: Pending,
    next_opaque: AtomicI32,
    reader: JoinHandle<()>,
}

impl Connection {
    /// Open a connection to `addr` (`host:port`).
    pub async fn connect(addr: &str, connect_timeout: Duration) -> Result<Self, RemotingError> {
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| RemotingError::Timeout {
                millis: connect_timeout.as_millis() as u64,
            })??;
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        let pending: Pending = Arc::new(Mutex::new(Waiters::default()));
        let reader = tokio::spawn(read_loop(
            addr.to_string(),
            read_half,
            Arc::clone(&pending),
        ));

        debug!("Connected to {addr}");
        Ok(Self {
            addr: addr.to_string(),
            writer: tokio::sync::Mutex::new(write_half),
            pending,
            next_opaque: AtomicI32::new(1),
            reader,
        })
    }

    /// Send a request and wait for its response, bounded by `timeout`.
    pub async fn invoke(
        &self,
        mut request: RemotingCommand,
        timeout: Duration,
    ) -> Result<RemotingCommand, RemotingError> {
        let opaque = self.next_opaque.fetch_add(1, Ordering::Relaxed);
        request.opaque = opaque;

        let (tx, rx) = oneshot::channel();
        {
            let mut waiters = lock(&self.pending);
            if waiters.closed {
                return Err(RemotingError::ConnectionClosed(self.addr.clone()));
            }
            waiters.by_opaque.insert(opaque, tx);
        }

        let exchange = async {
            self.write(&request).await?;
            rx.await
                .map_err(|_| RemotingError::ConnectionClosed(self.addr.clone()))
        };

        let outcome = match tokio::time::timeout(timeout, exchange).await {
            Ok(outcome) => outcome,
            Err(_) => Err(RemotingError::Timeout {
                millis: timeout.as_millis() as u64,
            }),
        };
        if outcome.is_err() {
            lock(&self.pending).by_opaque.remove(&opaque);
        }
        outcome
    }

    /// Send a request flagged oneway; no response is expected.
    pub async fn invoke_oneway(&self, mut request: RemotingCommand) -> Result<(), RemotingError> {
        if lock(&self.pending).closed {
            return Err(RemotingError::ConnectionClosed(self.addr.clone()));
        }
        request.opaque = self.next_opaque.fetch_add(1, Ordering::Relaxed);
        request.mark_oneway();
        self.write(&request).await
    }

    async fn write(&self, cmd: &RemotingCommand) -> Result<(), RemotingError> {
        let frame = encode_frame(cmd)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Stop the reader, fail pending requests and close the stream.
    pub async fn close(&self) {
        self.reader.abort();
        lock(&self.pending).close();
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            debug!("Error closing connection to {}: {e}", self.addr);
        }
        debug!("Closed connection to {}", self.addr);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(addr: String, read_half: OwnedReadHalf, pending: Pending) {
    let mut reader = BufReader::new(read_half);
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(cmd)) if cmd.is_response() => {
                let waiter = lock(&pending).by_opaque.remove(&cmd.opaque);
                match waiter {
                    Some(tx) => {
                        // The requester may have timed out already.
                        let _ = tx.send(cmd);
                    }
                    None => warn!(
                        "Dropping response with unknown opaque {} from {addr}",
                        cmd.opaque
                    ),
                }
            }
            Ok(Some(cmd)) => {
                debug!("Ignoring server request code {} from {addr}", cmd.code);
            }
            Ok(None) => {
                debug!("Connection to {addr} closed by peer");
                break;
            }
            Err(e) => {
                warn!("Failed to read from {addr}: {e}");
                break;
            }
        }
    }
    lock(&pending).close();
}

impl Waiters {
    /// Refuse new waiters and fail every pending one with ConnectionClosed.
    fn close(&mut self) {
        self.closed = true;
        self.by_opaque.clear();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
