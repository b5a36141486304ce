//! # Relay Listener
//!
//! Accepts TCP connections and runs one responder session per connection.
//! Admission is bounded by `max_connections`; once the limit is reached the
//! listener stops accepting until a session ends.

use crate::application::{ProtocolHandlers, RelayContext};
use crate::domain::RelayError;
use crate::session::ResponderSession;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// TCP listener for relay peers.
pub struct RelayServer {
    listener: TcpListener,
    handlers: ProtocolHandlers,
    permits: Arc<Semaphore>,
}

impl RelayServer {
    /// Bind `listen_host:(available_port + 1)` from the context config.
    pub async fn bind(ctx: Arc<RelayContext>) -> Result<Self, RelayError> {
        let addr = ctx.config.listen_addr();
        Self::bind_addr(&addr, ctx).await
    }

    /// Bind an explicit address.
    pub async fn bind_addr(addr: &str, ctx: Arc<RelayContext>) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| RelayError::Transport(format!("bind {}: {}", addr, e)))?;
        let permits = Arc::new(Semaphore::new(ctx.config.max_connections));
        Ok(Self {
            listener,
            handlers: ProtocolHandlers::new(ctx),
            permits,
        })
    }

    /// Bound address.
    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    /// Handlers shared by every session of this listener.
    pub fn handlers(&self) -> &ProtocolHandlers {
        &self.handlers
    }

    /// Accept until the process exits.
    pub async fn serve(self) -> Result<(), RelayError> {
        let (_keep_open, shutdown) = watch::channel(false);
        self.serve_with_shutdown(shutdown).await
    }

    /// Accept until `shutdown` turns `true` or its sender is dropped.
    ///
    /// Sessions already running are left to finish on their own.
    pub async fn serve_with_shutdown(
        self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), RelayError> {
        info!(addr = %self.local_addr()?, "Relay listening");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let permit = tokio::select! {
                permit = Arc::clone(&self.permits).acquire_owned() => permit
                    .map_err(|_| RelayError::Transport("connection limiter closed".to_string()))?,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };

            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_session(stream, peer, permit),
                    Err(e) => {
                        error!("Accept failed: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Relay listener stopped");
        Ok(())
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr, permit: OwnedSemaphorePermit) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY: {}", e);
        }
        debug!(%peer, "Accepted connection");

        let handlers = self.handlers.clone();
        tokio::spawn(async move {
            let _permit = permit;
            ResponderSession::new(stream, handlers, peer.to_string()).run().await;
        });
    }
}
