//! # Responder Session
//!
//! One loop per accepted connection. Frames are processed strictly in order:
//! every reply to frame `k` is written before frame `k + 1` is read.
//!
//! The loop ends on end of stream, a transport error, an oversized frame or
//! an idle timeout. Malformed envelopes are logged and skipped.

use crate::application::ProtocolHandlers;
use crate::codec::{decode_envelope, encode_envelope, read_frame, write_frame, Envelope};
use crate::domain::{MessageKind, RelayError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

/// Counters reported when a session ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames read.
    pub frames: u64,
    /// Frames skipped as malformed.
    pub malformed: u64,
    /// Envelopes written.
    pub replies: u64,
}

/// Responder side of one connection.
pub struct ResponderSession<S> {
    stream: S,
    handlers: ProtocolHandlers,
    peer: String,
    max_frame_bytes: usize,
    idle_timeout: Option<Duration>,
    write_timeout: Duration,
}

impl<S> ResponderSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Session over `stream`, with limits taken from the context config.
    pub fn new(stream: S, handlers: ProtocolHandlers, peer: impl Into<String>) -> Self {
        let config = &handlers.context().config;
        let max_frame_bytes = config.max_frame_bytes;
        let idle_timeout = config.idle_timeout();
        let write_timeout = config.write_timeout();
        Self {
            stream,
            handlers,
            peer: peer.into(),
            max_frame_bytes,
            idle_timeout,
            write_timeout,
        }
    }

    /// Serve until the connection ends.
    pub async fn run(mut self) -> SessionStats {
        let mut stats = SessionStats::default();

        loop {
            let frame = match self.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    debug!(peer = %self.peer, "Connection closed by peer");
                    break;
                }
                Err(e) => {
                    warn!(peer = %self.peer, "Ending session: {}", e);
                    break;
                }
            };
            stats.frames += 1;

            let envelope = match decode_envelope(&frame) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(peer = %self.peer, "Skipping frame: {}", e);
                    stats.malformed += 1;
                    continue;
                }
            };

            let replies = match self.dispatch(envelope).await {
                Ok(replies) => replies,
                Err(e) => {
                    warn!(peer = %self.peer, "Ending session: {}", e);
                    break;
                }
            };
            if let Err(e) = self.send_all(&replies, &mut stats).await {
                warn!(peer = %self.peer, "Ending session: {}", e);
                break;
            }
        }

        debug!(
            peer = %self.peer,
            frames = stats.frames,
            malformed = stats.malformed,
            replies = stats.replies,
            "Session finished"
        );
        stats
    }

    /// Transfers settle on the blocking pool: the ledger lock is held across
    /// store writes.
    async fn dispatch(&self, envelope: Envelope) -> Result<Vec<Envelope>, RelayError> {
        if envelope.kind() != Some(MessageKind::Transfer) {
            return Ok(self.handlers.handle_inbound(&envelope));
        }
        let handlers = self.handlers.clone();
        tokio::task::spawn_blocking(move || handlers.handle_inbound(&envelope))
            .await
            .map_err(|e| RelayError::SettlementFailed(format!("settlement task failed: {}", e)))
    }

    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, RelayError> {
        let read = read_frame(&mut self.stream, self.max_frame_bytes);
        match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, read).await.map_err(|_| RelayError::Timeout {
                waiting_for: "next frame",
                secs: limit.as_secs(),
            })?,
            None => read.await,
        }
    }

    async fn send_all(
        &mut self,
        replies: &[Envelope],
        stats: &mut SessionStats,
    ) -> Result<(), RelayError> {
        for reply in replies {
            let bytes = encode_envelope(reply)?;
            tokio::time::timeout(self.write_timeout, write_frame(&mut self.stream, &bytes))
                .await
                .map_err(|_| RelayError::Timeout {
                    waiting_for: "frame write",
                    secs: self.write_timeout.as_secs(),
                })??;
            stats.replies += 1;
        }
        Ok(())
    }
}
