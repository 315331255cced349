//! TcpFrameSubscriber - connect, read, conflate
//!
//! A background reader task moves messages from the socket into an
//! [`Inbox`]; the consumer polls the inbox. When the connection drops the
//! reader keeps reconnecting until the subscriber is closed, so a publisher
//! restart is invisible apart from the gap in data.

use std::sync::Arc;
use std::time::Duration;

use contracts::{
    ContractError, FrameSource, InboxMode, KeepaliveConfig, TransportConfig, WireMessage,
};
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::envelope::{self, EnvelopeError};
use crate::inbox::{Inbox, InboxStats};
use crate::keepalive::configure_stream;

/// Configuration for TcpFrameSubscriber
#[derive(Debug, Clone)]
pub struct TcpSubscriberConfig {
    /// Receive buffering policy
    pub inbox: InboxMode,
    /// Keep-alive settings
    pub keepalive: KeepaliveConfig,
    /// Largest envelope body accepted; larger ones drop the connection
    pub max_message_bytes: usize,
    /// Bound on each connect attempt
    pub connect_timeout: Duration,
    /// Pause between reconnect attempts
    pub reconnect_interval: Duration,
}

impl Default for TcpSubscriberConfig {
    fn default() -> Self {
        Self::from(&TransportConfig::default())
    }
}

impl From<&TransportConfig> for TcpSubscriberConfig {
    fn from(config: &TransportConfig) -> Self {
        Self {
            inbox: config.inbox,
            keepalive: config.keepalive,
            max_message_bytes: config.max_message_bytes,
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            reconnect_interval: Duration::from_millis(config.reconnect_interval_ms),
        }
    }
}

/// Receiving end of the TCP transport
pub struct TcpFrameSubscriber {
    name: String,
    inbox: Arc<Inbox>,
    cancel: CancellationToken,
    reader_task: Option<JoinHandle<()>>,
}

impl TcpFrameSubscriber {
    /// Connect to a publisher
    ///
    /// # Errors
    /// `ContractError::TransportUnavailable` if the first connection attempt fails.
    #[instrument(name = "tcp_subscriber_connect", skip(config))]
    pub async fn connect(endpoint: &str, config: TcpSubscriberConfig) -> Result<Self, ContractError> {
        let stream = connect_once(endpoint, &config)
            .await
            .map_err(|e| ContractError::transport_unavailable(endpoint, e.to_string()))?;

        let inbox = Arc::new(Inbox::new(config.inbox));
        let cancel = CancellationToken::new();
        let reader_task = tokio::spawn(reader_loop(
            stream,
            endpoint.to_string(),
            config,
            Arc::clone(&inbox),
            cancel.clone(),
        ));

        info!(endpoint = %endpoint, "TCP subscriber connected");

        Ok(Self {
            name: format!("tcp-sub://{endpoint}"),
            inbox,
            cancel,
            reader_task: Some(reader_task),
        })
    }

    /// Inbox counters (replaced / dropped by conflation)
    pub fn inbox_stats(&self) -> InboxStats {
        self.inbox.stats()
    }
}

impl FrameSource for TcpFrameSubscriber {
    fn name(&self) -> &str {
        &self.name
    }

    async fn recv_timeout(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<WireMessage>, ContractError> {
        self.inbox
            .pop_timeout(timeout)
            .await
            .map_err(|_| ContractError::transport_closed(&self.name))
    }

    fn try_recv(&mut self) -> Result<Option<WireMessage>, ContractError> {
        self.inbox
            .try_pop()
            .map_err(|_| ContractError::transport_closed(&self.name))
    }

    fn ready_len(&self) -> usize {
        self.inbox.len()
    }

    #[instrument(name = "tcp_subscriber_close", skip(self), fields(name = %self.name))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.cancel.cancel();
        self.inbox.close();
        if let Some(task) = self.reader_task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Reader task ended abnormally");
            }
        }
        debug!("TCP subscriber closed");
        Ok(())
    }
}

impl Drop for TcpFrameSubscriber {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.inbox.close();
    }
}

async fn connect_once(endpoint: &str, config: &TcpSubscriberConfig) -> std::io::Result<TcpStream> {
    let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(endpoint))
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"))??;
    configure_stream(&stream, &config.keepalive)?;
    Ok(stream)
}

async fn reader_loop(
    mut stream: TcpStream,
    endpoint: String,
    config: TcpSubscriberConfig,
    inbox: Arc<Inbox>,
    cancel: CancellationToken,
) {
    'session: loop {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => break 'session,
            outcome = read_until_error(&mut stream, &inbox, config.max_message_bytes) => outcome,
        };
        match outcome {
            Ok(()) => info!(endpoint = %endpoint, "Publisher closed connection"),
            Err(e) => warn!(endpoint = %endpoint, error = %e, "Connection lost"),
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break 'session,
                _ = tokio::time::sleep(config.reconnect_interval) => {}
            }
            match connect_once(&endpoint, &config).await {
                Ok(fresh) => {
                    info!(endpoint = %endpoint, "Reconnected");
                    stream = fresh;
                    continue 'session;
                }
                Err(e) => debug!(endpoint = %endpoint, error = %e, "Reconnect failed"),
            }
        }
    }
    inbox.close();
    debug!(endpoint = %endpoint, "Reader loop stopped");
}

/// Read messages into the inbox until EOF (`Ok`) or a fatal error
async fn read_until_error(
    stream: &mut TcpStream,
    inbox: &Inbox,
    max_body: usize,
) -> Result<(), EnvelopeError> {
    let mut reader = BufReader::new(stream);
    loop {
        match envelope::read_message(&mut reader, max_body).await {
            Ok(Some(message)) => {
                inbox.push(message);
            }
            Ok(None) => return Ok(()),
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "Discarding message");
            }
            Err(e) => return Err(e),
        }
    }
}
