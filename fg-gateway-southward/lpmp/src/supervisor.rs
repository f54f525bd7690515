use crate::{
    protocol::error::ProtocolError,
    transport::DrxLineCodec,
    types::{LpmpChannel, LpmpConnection},
};
use backoff::backoff::Backoff;
use bytes::Bytes;
use fg_gateway_sdk::{
    build_exponential_backoff, DriverError, DriverResult, SouthwardConnectionState,
};
use futures::{SinkExt, StreamExt};
use std::{sync::Arc, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
    sync::{mpsc, watch},
};
use tokio_serial::SerialPortBuilderExt;
use tokio_util::{codec::Framed, sync::CancellationToken};

impl From<ProtocolError> for DriverError {
    /// Map protocol-level errors into the gateway's `DriverError` domain.
    ///
    /// - Structural frame/line issues become `CodecError`.
    /// - Batch and value validation failures become `ValidationError`.
    /// - Resolution failures become `InvalidEntity`.
    /// - IO failures become `SessionError` so the supervisor treats them as
    ///   fatal for the underlying link.
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::FrameTooShort { .. }
            | ProtocolError::ChecksumMismatch { .. }
            | ProtocolError::OutOfBounds { .. }
            | ProtocolError::MalformedLine(_) => DriverError::CodecError(err.to_string()),
            ProtocolError::TypeMismatch { .. } | ProtocolError::InvalidBatch(_) => {
                DriverError::ValidationError(err.to_string())
            }
            ProtocolError::UnknownParameter(_) | ProtocolError::UnknownSensor(_) => {
                DriverError::InvalidEntity(err.to_string())
            }
            ProtocolError::Io(e) => DriverError::SessionError(e.to_string()),
        }
    }
}

/// Why the transport pump stopped.
enum PumpExit {
    /// Driver-level cancellation requested.
    Shutdown,
    /// Read or write failure on the line; reconnect.
    TransportLost,
    /// Decode stage went away; nothing left to feed.
    IngestClosed,
}

enum TransportStream {
    Serial(tokio_serial::SerialStream),
    Tcp(TcpStream),
}

/// Connection supervisor for a single LPMP modem line.
///
/// Owns the transport lifecycle: connects with exponential backoff, pumps
/// inbound frames into the decode stage's bounded queue and drains the
/// outbound control-frame queue onto the line, reconnecting on transport
/// failure until cancelled.
pub struct LpmpSupervisor {
    cancel: CancellationToken,
    state_tx: watch::Sender<SouthwardConnectionState>,
}

impl LpmpSupervisor {
    pub fn new(cancel: CancellationToken, state_tx: watch::Sender<SouthwardConnectionState>) -> Self {
        Self { cancel, state_tx }
    }

    async fn connect_once(channel: &LpmpChannel) -> DriverResult<TransportStream> {
        match &channel.config.connection {
            LpmpConnection::Serial {
                port,
                baud_rate,
                data_bits,
                stop_bits,
                parity,
            } => {
                let serial = tokio_serial::new(port, *baud_rate)
                    .data_bits((*data_bits).into())
                    .stop_bits((*stop_bits).into())
                    .parity((*parity).into())
                    .open_native_async()
                    .map_err(|e| DriverError::SessionError(e.to_string()))?;
                Ok(TransportStream::Serial(serial))
            }
            LpmpConnection::Tcp { host, port } => {
                let connect_timeout =
                    Duration::from_millis(channel.connection_policy.connect_timeout_ms.max(1));
                let stream = tokio::time::timeout(
                    connect_timeout,
                    TcpStream::connect((host.as_str(), *port)),
                )
                .await
                .map_err(|_| DriverError::Timeout(connect_timeout))?
                .map_err(|e| DriverError::SessionError(format!("TCP connect failed: {e}")))?;
                stream.set_nodelay(true).ok();
                Ok(TransportStream::Tcp(stream))
            }
        }
    }

    /// Run the supervisor loop: maintain one healthy transport and
    /// reconnect on demand. Returns immediately; the loop runs in a
    /// background task until cancelled.
    pub async fn run(
        self,
        channel: Arc<LpmpChannel>,
        ingest_tx: mpsc::Sender<Bytes>,
        mut outbound_rx: mpsc::Receiver<Bytes>,
    ) -> DriverResult<()> {
        let cancel = self.cancel.clone();
        let state_tx = self.state_tx.clone();

        tokio::spawn(async move {
            let mut outbound_open = true;

            loop {
                let _ = state_tx.send(SouthwardConnectionState::Connecting);

                let mut backoff = build_exponential_backoff(&channel.connection_policy.backoff);
                let mut attempt: u64 = 0;

                let stream = loop {
                    if cancel.is_cancelled() {
                        let _ =
                            state_tx.send(SouthwardConnectionState::Failed("cancelled".to_string()));
                        return;
                    }
                    match Self::connect_once(&channel).await {
                        Ok(stream) => break stream,
                        Err(e) => {
                            let _ = state_tx.send(SouthwardConnectionState::Failed(e.to_string()));
                            attempt = attempt.saturating_add(1);
                            let delay = backoff.next_backoff().unwrap_or_else(|| {
                                Duration::from_millis(
                                    channel.connection_policy.backoff.max_interval_ms,
                                )
                            });
                            tracing::warn!(
                                channel = %channel.name,
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                error = %e,
                                "LPMP connect retry"
                            );
                            tokio::select! {
                                _ = cancel.cancelled() => {
                                    let _ = state_tx.send(SouthwardConnectionState::Failed("cancelled".to_string()));
                                    return;
                                }
                                _ = tokio::time::sleep(delay) => {}
                            }
                        }
                    }
                };

                let _ = state_tx.send(SouthwardConnectionState::Connected);
                tracing::info!(channel = %channel.name, "LPMP transport connected");

                let exit = match stream {
                    TransportStream::Serial(s) => {
                        pump(
                            Framed::new(s, DrxLineCodec),
                            &ingest_tx,
                            &mut outbound_rx,
                            &mut outbound_open,
                            &cancel,
                        )
                        .await
                    }
                    TransportStream::Tcp(s) => {
                        pump(
                            Framed::new(s, DrxLineCodec),
                            &ingest_tx,
                            &mut outbound_rx,
                            &mut outbound_open,
                            &cancel,
                        )
                        .await
                    }
                };

                match exit {
                    PumpExit::Shutdown => {
                        let _ =
                            state_tx.send(SouthwardConnectionState::Failed("cancelled".to_string()));
                        return;
                    }
                    PumpExit::IngestClosed => {
                        tracing::debug!(channel = %channel.name, "decode stage closed, supervisor exiting");
                        return;
                    }
                    PumpExit::TransportLost => {
                        let _ = state_tx.send(SouthwardConnectionState::Reconnecting);
                    }
                }
            }
        });
        Ok(())
    }
}

/// Pump one live transport until it fails, the driver is cancelled, or the
/// decode stage disappears.
async fn pump<T>(
    mut framed: Framed<T, DrxLineCodec>,
    ingest_tx: &mpsc::Sender<Bytes>,
    outbound_rx: &mut mpsc::Receiver<Bytes>,
    outbound_open: &mut bool,
    cancel: &CancellationToken,
) -> PumpExit
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return PumpExit::Shutdown,
            inbound = framed.next() => match inbound {
                Some(Ok(frame)) => {
                    // Bounded send: when the decode stage lags, the reader
                    // blocks here instead of dropping frames.
                    if ingest_tx.send(frame).await.is_err() {
                        return PumpExit::IngestClosed;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "transport read error");
                    return PumpExit::TransportLost;
                }
                None => {
                    tracing::warn!("transport closed by peer");
                    return PumpExit::TransportLost;
                }
            },
            outbound = outbound_rx.recv(), if *outbound_open => match outbound {
                Some(frame) => {
                    if let Err(e) = framed.send(frame).await {
                        tracing::warn!(error = %e, "transport write error");
                        return PumpExit::TransportLost;
                    }
                }
                None => {
                    *outbound_open = false;
                }
            },
        }
    }
}
