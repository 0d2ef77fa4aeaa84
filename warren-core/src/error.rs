//! Error types for the AMQP client.
//!
//! All fallible operations return `Result<T, AmqpError>`. Broker-initiated
//! closes are reported as distinct variants so callers can tell a lost
//! channel (recoverable) from a lost connection (not recoverable).

use std::time::Duration;
use thiserror::Error;

/// Shorthand used throughout the crate.
pub type Result<T> = std::result::Result<T, AmqpError>;

/// The canonical error type for the client.
#[derive(Debug, Error)]
pub enum AmqpError {
    // ── Codec Errors ─────────────────────────────────────────────
    /// A read ran past the bytes available in the buffer.
    #[error("buffer overflow: needed {needed} bytes, {available} available")]
    BufferOverflow { needed: usize, available: usize },

    /// A value does not match its declared type, or a type tag is unknown.
    #[error("invalid type: {0}")]
    InvalidType(String),

    // ── Frame Errors ─────────────────────────────────────────────
    /// The frame type octet is not one this client understands.
    #[error("unknown frame type {0}")]
    UnknownFrameType(u8),

    /// The frame did not end with the frame-end octet.
    #[error("frame end marker mismatch: got {0:#04x}")]
    FrameEndMismatch(u8),

    /// The frame exceeds the negotiated frame-max.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    // ── Protocol Errors ──────────────────────────────────────────
    /// The broker answered with something other than what was expected.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The active protocol revision has no such method.
    #[error("method {0} is not defined by this protocol revision")]
    UnsupportedMethod(String),

    /// The broker closed the connection instead of replying.
    #[error("connection closed by broker: {reply_code} {reply_text}")]
    ForcedConnectionClose { reply_code: u16, reply_text: String },

    /// The broker closed a channel instead of replying.
    #[error("channel {channel} closed by broker: {reply_code} {reply_text}")]
    ForcedChannelClose {
        channel: u16,
        reply_code: u16,
        reply_text: String,
    },

    // ── Transport Errors ─────────────────────────────────────────
    /// The broker could not be reached or the stream broke.
    #[error("server down: {0}")]
    ServerDown(String),

    /// Connecting did not finish within the connect timeout.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// The socket layer reported an error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// An operation needed a socket but none is open.
    #[error("not connected")]
    NotConnected,

    // ── Local Errors ─────────────────────────────────────────────
    /// No frame arrived within the caller's window.
    #[error("no frame received within {0:?}")]
    ClientTimeout(Duration),

    /// The channel number was never allocated.
    #[error("invalid channel number {0}")]
    InvalidChannel(u16),

    /// A required method argument was not supplied.
    #[error("{method}: missing required argument `{argument}`")]
    MissingArgument {
        method: &'static str,
        argument: String,
    },

    /// An argument name is not part of the method's schema.
    #[error("{method}: unexpected argument `{argument}`")]
    UnexpectedArgument {
        method: &'static str,
        argument: String,
    },

    /// The API was used in a way that cannot work.
    #[error("usage error: {0}")]
    Usage(String),

    /// A short string was not valid UTF-8.
    #[error("invalid utf-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

impl AmqpError {
    /// `true` for the client-side receive timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ClientTimeout(_))
    }

    /// `true` when the connection can no longer be used.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Self::ForcedConnectionClose { .. }
                | Self::ServerDown(_)
                | Self::ConnectTimeout(_)
                | Self::Io(_)
                | Self::NotConnected
        )
    }

    /// `true` when only the active channel was lost.
    pub fn is_channel_fatal(&self) -> bool {
        matches!(self, Self::ForcedChannelClose { .. })
    }
}

impl From<String> for AmqpError {
    fn from(s: String) -> Self {
        AmqpError::Protocol(s)
    }
}

impl From<&str> for AmqpError {
    fn from(s: &str) -> Self {
        AmqpError::Protocol(s.to_string())
    }
}
