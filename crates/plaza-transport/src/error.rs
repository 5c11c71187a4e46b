use crate::ConnectionId;

/// Errors raised by the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listening socket could not be set up.
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The peer already closed the connection.
    #[error("{0} is closed")]
    Closed(ConnectionId),

    /// The WebSocket stream failed mid-conversation.
    #[cfg(feature = "websocket")]
    #[error("{id}: {source}")]
    WebSocket {
        id: ConnectionId,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    /// The transport was shut down and will not yield more connections.
    #[error("transport shut down")]
    Shutdown,
}
