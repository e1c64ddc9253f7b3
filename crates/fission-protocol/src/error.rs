//! Error types for the protocol layer.
//!
//! Decoding failures here are rarely fatal: [`Inbound::decode`](crate::Inbound::decode)
//! swallows them and hands the raw bytes up as opaque data. They surface
//! as errors only when a caller asks for a specific type.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields, or a
    /// payload that was never meant for this type.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The message decoded but breaks a protocol rule.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
