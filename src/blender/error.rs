//! Error types for the Blender gateway.

use std::io;

use thiserror::Error;

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors that can occur while talking to the Blender addon.
///
/// These render directly into tool failure text, so the messages are
/// written for the person reading the assistant transcript.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The TCP connection could not be established.
    #[error("Could not connect to Blender at {host}:{port}. Make sure the addon is running")]
    ConnectionUnavailable {
        /// Host the connection was attempted against.
        host: String,
        /// Port the connection was attempted against.
        port: u16,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// The connection closed before a complete response arrived.
    #[error("Incomplete response from Blender")]
    TruncatedResponse,

    /// No complete response arrived within the receive deadline.
    #[error("Timeout waiting for Blender response ({secs} s)")]
    Timeout {
        /// The deadline that expired, in seconds.
        secs: u64,
    },

    /// Blender executed the command and reported a failure.
    ///
    /// The connection stays usable after this: the exchange itself
    /// completed normally.
    #[error("{message}")]
    CommandFailed {
        /// Error message reported by the addon.
        message: String,
    },

    /// The socket failed mid-exchange.
    #[error("Socket error while talking to Blender")]
    Transport(#[source] io::Error),

    /// The outgoing command could not be serialised.
    #[error("Failed to encode command for Blender")]
    Encode(#[from] serde_json::Error),
}

impl GatewayError {
    /// Creates a command failure from the addon's reported message.
    pub fn command_failed(message: impl Into<String>) -> Self {
        Self::CommandFailed {
            message: message.into(),
        }
    }
}
