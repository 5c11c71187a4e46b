//! Error types for the protocol layer.
//!
//! Each crate in Plaza defines its own error enum. When you see a
//! `ProtocolError`, the problem is in turning frames into messages (or
//! back), not in networking or room membership.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, an unknown `type` tag, or missing
    /// payload fields.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A `WIDTHxHEIGHT` dimension string could not be parsed.
    #[error("invalid dimensions {0:?}: expected WIDTHxHEIGHT with positive sides")]
    InvalidDimensions(String),
}
