//! # Initiator Driver
//!
//! Sends one request and reads its responses on an outbound connection.
//!
//! | request       | responses read                                  |
//! |---------------|-------------------------------------------------|
//! | `PING`        | `PONG`                                          |
//! | `HEADER_SYNC` | `HEADER_SYNC`                                   |
//! | `TRANSFER`    | `HEADER_SYNC` (stored), then `RECEIPT`/`REJECT` |
//! | other         | one frame                                       |
//!
//! No pipelining: the next request is only written once the previous
//! exchange has finished.

use crate::application::ProtocolHandlers;
use crate::codec::{decode_envelope, encode_envelope, read_frame, write_frame, Envelope};
use crate::domain::{CrossTransfer, ExchangeState, MessageKind, RelayError};
use crate::ports::ResponseEvent;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Initiator side of one connection.
pub struct Initiator<S = TcpStream> {
    stream: S,
    handlers: ProtocolHandlers,
    state: ExchangeState,
    max_frame_bytes: usize,
    request_timeout: Duration,
    write_timeout: Duration,
}

impl Initiator<TcpStream> {
    /// Dial `addr` (`host:port`).
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Transport` if the dial fails.
    pub async fn connect(addr: &str, handlers: ProtocolHandlers) -> Result<Self, RelayError> {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("Failed to set TCP_NODELAY: {}", e);
                }
                debug!(peer = addr, "Connected");
                Ok(Self::from_stream(stream, handlers))
            }
            Err(e) => {
                warn!(peer = addr, "Dial failed: {}", e);
                Err(RelayError::Transport(format!("dial {}: {}", addr, e)))
            }
        }
    }
}

impl<S> Initiator<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Initiator over an established stream.
    pub fn from_stream(stream: S, handlers: ProtocolHandlers) -> Self {
        let config = &handlers.context().config;
        let max_frame_bytes = config.max_frame_bytes;
        let request_timeout = config.request_timeout();
        let write_timeout = config.write_timeout();
        Self {
            stream,
            handlers,
            state: ExchangeState::Idle,
            max_frame_bytes,
            request_timeout,
            write_timeout,
        }
    }

    /// Current exchange state.
    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Liveness check.
    pub async fn ping(&mut self) -> Result<(), RelayError> {
        match self.exchange(&Envelope::ping()).await?.pop() {
            Some(ResponseEvent::Pong) => Ok(()),
            other => Err(unexpected("PONG", other)),
        }
    }

    /// Send local headers and store the peer's reply.
    pub async fn sync_headers(&mut self) -> Result<ResponseEvent, RelayError> {
        let local = self.handlers.context().coordinator.local_headers()?;
        let request = Envelope::header_sync(&local)?;
        self.exchange(&request)
            .await?
            .pop()
            .ok_or_else(|| unexpected("HEADER_SYNC", None))
    }

    /// Send a transfer and return the final `Receipt` or `Rejected` event.
    ///
    /// A peer that drops the transfer silently surfaces as `Timeout`.
    pub async fn send_transfer(
        &mut self,
        transfer: &CrossTransfer,
    ) -> Result<ResponseEvent, RelayError> {
        let request = Envelope::transfer(transfer)?;
        self.exchange(&request)
            .await?
            .pop()
            .ok_or_else(|| unexpected("RECEIPT", None))
    }

    /// Write `request` and read the responses its kind calls for.
    ///
    /// Returns the events in arrival order. A failed exchange puts the
    /// driver back to `Idle`.
    pub async fn exchange(&mut self, request: &Envelope) -> Result<Vec<ResponseEvent>, RelayError> {
        let result = self.run_exchange(request).await;
        if result.is_err() && !self.state.is_terminal() {
            self.state = ExchangeState::Idle;
        }
        result
    }

    async fn run_exchange(&mut self, request: &Envelope) -> Result<Vec<ResponseEvent>, RelayError> {
        match request.kind() {
            Some(MessageKind::HeaderSync) => {
                self.transition(ExchangeState::HeaderSyncPending)?;
                self.send(request).await?;
                let event = self.read_event().await?;
                if !matches!(event, ResponseEvent::HeadersSynced { .. }) {
                    return Err(unexpected("HEADER_SYNC", Some(event)));
                }
                self.transition(ExchangeState::Synced)?;
                Ok(vec![event])
            }
            Some(MessageKind::Transfer) => {
                self.transition(ExchangeState::TransferPending)?;
                self.send(request).await?;
                let mut events = Vec::new();
                loop {
                    let event = self.read_event().await?;
                    if !matches!(
                        event,
                        ResponseEvent::HeadersSynced { .. }
                            | ResponseEvent::Receipt { .. }
                            | ResponseEvent::Rejected(_)
                    ) {
                        return Err(unexpected("RECEIPT", Some(event)));
                    }
                    let next = match &event {
                        ResponseEvent::Receipt { verified: true, .. } => {
                            Some(ExchangeState::Settled)
                        }
                        ResponseEvent::Receipt {
                            verified: false, ..
                        }
                        | ResponseEvent::Rejected(_) => Some(ExchangeState::Rejected),
                        _ => None,
                    };
                    events.push(event);
                    if let Some(next) = next {
                        self.transition(next)?;
                        return Ok(events);
                    }
                }
            }
            _ => {
                self.send(request).await?;
                Ok(vec![self.read_event().await?])
            }
        }
    }

    fn transition(&mut self, next: ExchangeState) -> Result<(), RelayError> {
        if !self.state.can_transition_to(next) {
            return Err(RelayError::InvalidTransition {
                from: format!("{:?}", self.state),
                to: format!("{:?}", next),
            });
        }
        self.state = next;
        Ok(())
    }

    async fn send(&mut self, envelope: &Envelope) -> Result<(), RelayError> {
        let bytes = encode_envelope(envelope)?;
        tokio::time::timeout(self.write_timeout, write_frame(&mut self.stream, &bytes))
            .await
            .map_err(|_| RelayError::Timeout {
                waiting_for: "request write",
                secs: self.write_timeout.as_secs(),
            })?
    }

    async fn read_event(&mut self) -> Result<ResponseEvent, RelayError> {
        let frame = tokio::time::timeout(
            self.request_timeout,
            read_frame(&mut self.stream, self.max_frame_bytes),
        )
        .await
        .map_err(|_| RelayError::Timeout {
            waiting_for: "response",
            secs: self.request_timeout.as_secs(),
        })??
        .ok_or_else(|| RelayError::Transport("connection closed by peer".to_string()))?;

        let envelope = decode_envelope(&frame)?;
        self.handlers.handle_response(&envelope)
    }
}

fn unexpected(expected: &str, got: Option<ResponseEvent>) -> RelayError {
    RelayError::MalformedEnvelope(format!("expected {}, got {:?}", expected, got))
}
