//! TcpFramePublisher - fan-out over TCP
//!
//! One listener, any number of subscribers. Every connection has its own
//! bounded outbound queue (`send_hwm`) drained by a writer task, so a slow
//! or stalled subscriber only loses its own messages and never delays
//! `send` for anyone else.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::{Bytes, BytesMut};
use contracts::{ContractError, FrameSink, KeepaliveConfig, SendReport, TransportConfig, WireMessage};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

use crate::envelope;
use crate::keepalive::configure_stream;

/// Configuration for TcpFramePublisher
#[derive(Debug, Clone)]
pub struct TcpPublisherConfig {
    /// Outbound queue depth per subscriber
    pub send_hwm: usize,
    /// Keep-alive settings for accepted sockets
    pub keepalive: KeepaliveConfig,
    /// Largest envelope body accepted by `send`
    pub max_message_bytes: usize,
}

impl Default for TcpPublisherConfig {
    fn default() -> Self {
        Self::from(&TransportConfig::default())
    }
}

impl From<&TransportConfig> for TcpPublisherConfig {
    fn from(config: &TransportConfig) -> Self {
        Self {
            send_hwm: config.send_hwm.max(1),
            keepalive: config.keepalive,
            max_message_bytes: config.max_message_bytes,
        }
    }
}

struct ClientHandle {
    peer: SocketAddr,
    tx: mpsc::Sender<Bytes>,
}

type ClientList = Arc<Mutex<Vec<ClientHandle>>>;

fn lock_clients(clients: &ClientList) -> MutexGuard<'_, Vec<ClientHandle>> {
    clients.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Publishing end of the TCP transport
pub struct TcpFramePublisher {
    name: String,
    local_addr: SocketAddr,
    config: TcpPublisherConfig,
    clients: ClientList,
    cancel: CancellationToken,
    accept_task: Option<JoinHandle<()>>,
    writers: TaskTracker,
    buffer: BytesMut,
}

impl TcpFramePublisher {
    /// Bind the listener and start accepting subscribers
    ///
    /// # Errors
    /// `ContractError::TransportUnavailable` if the address cannot be bound.
    #[instrument(name = "tcp_publisher_bind", skip(config))]
    pub async fn bind(addr: &str, config: TcpPublisherConfig) -> Result<Self, ContractError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ContractError::transport_unavailable(addr, e.to_string()))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ContractError::transport_unavailable(addr, e.to_string()))?;

        let clients: ClientList = Arc::new(Mutex::new(Vec::new()));
        let cancel = CancellationToken::new();
        let writers = TaskTracker::new();

        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&clients),
            config.clone(),
            writers.clone(),
            cancel.clone(),
        ));

        info!(addr = %local_addr, send_hwm = config.send_hwm, "TCP publisher listening");

        Ok(Self {
            name: format!("tcp-pub://{local_addr}"),
            local_addr,
            config,
            clients,
            cancel,
            accept_task: Some(accept_task),
            writers,
            buffer: BytesMut::new(),
        })
    }

    /// Actual bound address (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Connected subscribers
    pub fn client_count(&self) -> usize {
        lock_clients(&self.clients).len()
    }

    fn offer(&self, data: Bytes) -> SendReport {
        let mut report = SendReport::default();
        lock_clients(&self.clients).retain(|client| match client.tx.try_send(data.clone()) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                report.dropped += 1;
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(peer = %client.peer, "Subscriber gone, removing");
                false
            }
        });
        report
    }
}

impl FrameSink for TcpFramePublisher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&mut self, message: WireMessage) -> Result<SendReport, ContractError> {
        if self.cancel.is_cancelled() {
            return Err(ContractError::transport_closed(&self.name));
        }

        let data = envelope::encode(&message, &mut self.buffer)
            .map_err(|e| ContractError::transport_send(&self.name, e.to_string()))?;
        if data.len() - 4 > self.config.max_message_bytes {
            return Err(ContractError::transport_send(
                &self.name,
                format!(
                    "message of {} bytes exceeds limit {}",
                    data.len(),
                    self.config.max_message_bytes
                ),
            ));
        }

        Ok(self.offer(data))
    }

    #[instrument(name = "tcp_publisher_close", skip(self), fields(addr = %self.local_addr))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.cancel.cancel();
        // Dropping the senders ends every writer task
        lock_clients(&self.clients).clear();
        if let Some(task) = self.accept_task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Accept task ended abnormally");
            }
        }
        // Writers stuck on a full socket see the cancellation too
        self.writers.close();
        self.writers.wait().await;
        debug!("TCP publisher closed");
        Ok(())
    }
}

impl Drop for TcpFramePublisher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn accept_loop(
    listener: TcpListener,
    clients: ClientList,
    config: TcpPublisherConfig,
    writers: TaskTracker,
    cancel: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                if let Err(e) = configure_stream(&stream, &config.keepalive) {
                    warn!(peer = %peer, error = %e, "Failed to set socket options");
                }
                let (tx, rx) = mpsc::channel(config.send_hwm);
                writers.spawn(client_writer(stream, peer, rx, cancel.child_token()));
                lock_clients(&clients).push(ClientHandle { peer, tx });
                info!(peer = %peer, "Subscriber connected");
            }
            Err(e) => {
                // Typically EMFILE; back off briefly instead of spinning
                warn!(error = %e, "Accept failed");
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
        }
    }
    debug!("Accept loop stopped");
}

/// Drain one subscriber's queue onto its socket
///
/// Also watches the read half: subscribers never send, so any read
/// completion means the peer closed or the connection broke.
async fn client_writer(
    stream: TcpStream,
    peer: SocketAddr,
    mut rx: mpsc::Receiver<Bytes>,
    cancel: CancellationToken,
) {
    let (mut reader, mut writer) = stream.into_split();
    let mut scratch = [0u8; 64];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            read = reader.read(&mut scratch) => {
                match read {
                    Ok(0) => {
                        debug!(peer = %peer, "Subscriber closed connection");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!(peer = %peer, error = %e, "Subscriber connection error");
                        break;
                    }
                }
            }
            data = rx.recv() => {
                let Some(data) = data else { break };
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    written = writer.write_all(&data) => {
                        if let Err(e) = written {
                            info!(peer = %peer, error = %e, "Subscriber write failed, disconnecting");
                            break;
                        }
                    }
                }
            }
        }
    }
    info!(peer = %peer, "Subscriber disconnected");
}
