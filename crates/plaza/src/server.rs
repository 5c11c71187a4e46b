//! `PlazaServer` builder and accept loop.
//!
//! This is the entry point for running a Plaza gateway. It ties together
//! all the layers: transport → protocol → session → room.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use plaza_protocol::{Codec, JsonCodec};
use plaza_room::{RoomConfig, RoomRegistry};
use plaza_session::{IdentityVerifier, SpaceDirectory};
use plaza_transport::{Transport, WebSocketTransport};
use tokio::sync::Notify;

use crate::PlazaError;
use crate::handler::handle_connection;

/// Shared server state passed to each connection task.
///
/// Immutable after startup; everything that changes lives in the
/// registry's room actors.
pub(crate) struct ServerState<V, D, C> {
    pub(crate) registry: RoomRegistry,
    pub(crate) verifier: V,
    pub(crate) spaces: D,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Option<Duration>,
}

/// Builder for configuring and starting a Plaza server.
///
/// # Example
///
/// ```rust,no_run
/// use plaza::prelude::*;
///
/// # async fn start() -> Result<(), PlazaError> {
/// let verifier = JwtVerifier::new("shared-secret");
/// let spaces = StaticSpaces::new().with_space("lobby", SpaceBounds::new(100, 200));
///
/// let server = PlazaServer::<JwtVerifier, StaticSpaces, _>::builder()
///     .bind("0.0.0.0:3001")
///     .build(verifier, spaces)
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct PlazaServerBuilder {
    bind_addr: String,
    idle_timeout: Option<Duration>,
    handshake_timeout: Duration,
    room_config: RoomConfig,
    registry: Option<RoomRegistry>,
}

impl PlazaServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:3001".to_string(),
            idle_timeout: None,
            handshake_timeout: Duration::from_secs(5),
            room_config: RoomConfig::default(),
            registry: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Closes connections that send nothing for `timeout`. A zero
    /// duration disables the check (the default).
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Drops clients that don't finish the WebSocket upgrade in time.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Configures the registry the server creates for itself. Ignored
    /// when a registry is supplied with [`registry`](Self::registry).
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Serves the rooms of an existing registry instead of creating one.
    /// The caller keeps its clone and sees every join and leave.
    pub fn registry(mut self, registry: RoomRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Binds the listener and returns a server ready to [`run`](PlazaServer::run).
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<V, D>(
        self,
        verifier: V,
        spaces: D,
    ) -> Result<PlazaServer<V, D, JsonCodec>, PlazaError>
    where
        V: IdentityVerifier,
        D: SpaceDirectory,
    {
        let transport =
            WebSocketTransport::bind_with_timeout(&self.bind_addr, self.handshake_timeout)
                .await?;

        let state = Arc::new(ServerState {
            registry: self
                .registry
                .unwrap_or_else(|| RoomRegistry::with_config(self.room_config)),
            verifier,
            spaces,
            codec: JsonCodec,
            idle_timeout: self.idle_timeout,
        });

        Ok(PlazaServer {
            transport,
            state,
            shutdown: Arc::new(Notify::new()),
        })
    }
}

impl Default for PlazaServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Stops a running server's accept loop from another task.
#[derive(Clone, Debug)]
pub struct ServerHandle {
    shutdown: Arc<Notify>,
}

impl ServerHandle {
    /// Asks the server to stop accepting connections. Connections already
    /// established keep running until their clients leave.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

/// A bound Plaza server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct PlazaServer<V, D, C> {
    transport: WebSocketTransport,
    state: Arc<ServerState<V, D, C>>,
    shutdown: Arc<Notify>,
}

impl<V, D> PlazaServer<V, D, JsonCodec>
where
    V: IdentityVerifier,
    D: SpaceDirectory,
{
    /// Creates a new builder.
    pub fn builder() -> PlazaServerBuilder {
        PlazaServerBuilder::new()
    }
}

impl<V, D, C> PlazaServer<V, D, C>
where
    V: IdentityVerifier,
    D: SpaceDirectory,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// The live room registry. Useful for diagnostics.
    pub fn registry(&self) -> RoomRegistry {
        self.state.registry.clone()
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shutdown: Arc::clone(&self.shutdown),
        }
    }

    /// Runs the accept loop until [`ServerHandle::shutdown`] is called.
    pub async fn run(self) -> Result<(), PlazaError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `signal` completes or a
    /// [`ServerHandle`] asks it to stop.
    ///
    /// Each accepted connection is handled in its own task.
    pub async fn run_until<F>(mut self, signal: F) -> Result<(), PlazaError>
    where
        F: Future<Output = ()> + Send,
    {
        tracing::info!(local_addr = %self.local_addr(), "Plaza server running");
        tokio::pin!(signal);

        loop {
            tokio::select! {
                _ = &mut signal => break,
                _ = self.shutdown.notified() => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                        break;
                    }
                },
            }
        }

        self.transport.shutdown().await?;
        tracing::info!(rooms = self.state.registry.room_count(), "Plaza server stopped");
        Ok(())
    }
}
