//! TCP gateway to the Blender addon.
//!
//! The addon inside Blender listens on a plain TCP socket and speaks
//! single-shot JSON: the server sends one `{"type": ..., "params": ...}`
//! document, the addon replies with one `{"status": ..., "result": ...}`
//! document. Neither side length-prefixes anything, so the response is
//! accumulated chunk by chunk until the buffer parses as JSON.
//!
//! The connection is lazy and owned by whoever holds the
//! [`BlenderConnection`] value. Nothing is dialled until the first
//! command, and a transport failure tears the socket down so the next
//! command starts fresh. A `status: "error"` reply is not a transport
//! failure: the socket stays up and the error is surfaced to the caller.

use std::io;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::blender::error::{GatewayError, GatewayResult};
use crate::config::BlenderConfig;

/// Default host the Blender addon listens on.
pub const DEFAULT_HOST: &str = "localhost";

/// Default port the Blender addon listens on.
pub const DEFAULT_PORT: u16 = 9876;

/// Default receive deadline for a single command, in seconds.
///
/// Model imports and renders can legitimately take minutes.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 180;

/// Receive buffer chunk size in bytes.
const RECV_CHUNK_SIZE: usize = 8192;

/// A lazily established TCP connection to the Blender addon.
pub struct BlenderConnection {
    host: String,
    port: u16,
    command_timeout: Duration,
    stream: Option<TcpStream>,
}

impl BlenderConnection {
    /// Creates a gateway for the configured endpoint.
    ///
    /// No connection is made until the first command is sent.
    #[must_use]
    pub fn new(config: &BlenderConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            command_timeout: Duration::from_secs(config.command_timeout_secs),
            stream: None,
        }
    }

    /// Whether a socket to the addon is currently held.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Drops the socket if one is held. The next command reconnects.
    pub fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            debug!("closed connection to Blender");
        }
    }

    /// Sends one command to the addon and returns the `result` field of
    /// its reply (an empty object when the field is absent).
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ConnectionUnavailable`] if the addon
    /// cannot be reached, [`GatewayError::Timeout`] if no complete reply
    /// arrives within the deadline, [`GatewayError::TruncatedResponse`]
    /// or [`GatewayError::Transport`] if the socket fails mid-exchange,
    /// and [`GatewayError::CommandFailed`] if the addon reports an error
    /// for the command itself.
    pub async fn send_command(
        &mut self,
        command_type: &str,
        params: Value,
    ) -> GatewayResult<Value> {
        let payload = serde_json::to_vec(&json!({
            "type": command_type,
            "params": params,
        }))?;

        let mut stream = match self.stream.take() {
            Some(existing) if Self::is_reusable(&existing) => existing,
            Some(_) => {
                debug!("connection to Blender went stale, reconnecting");
                self.open().await?
            }
            None => self.open().await?,
        };

        debug!(command = command_type, "sending command to Blender");
        let response = match Self::exchange(&mut stream, &payload, self.command_timeout).await {
            Ok(response) => {
                // The exchange completed, so the socket is kept for the
                // next command even if the addon reported an error.
                self.stream = Some(stream);
                response
            }
            Err(e) => {
                warn!(command = command_type, error = %e, "dropping connection to Blender");
                return Err(e);
            }
        };

        if response.get("status").and_then(Value::as_str) == Some("error") {
            let message = response
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error from Blender");
            return Err(GatewayError::command_failed(message));
        }

        Ok(response.get("result").cloned().unwrap_or_else(|| json!({})))
    }

    async fn open(&self) -> GatewayResult<TcpStream> {
        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|source| GatewayError::ConnectionUnavailable {
                host: self.host.clone(),
                port: self.port,
                source,
            })?;
        info!(host = %self.host, port = self.port, "connected to Blender addon");
        Ok(stream)
    }

    /// Checks whether an idle socket is still usable. The addon sends
    /// nothing between commands, so any readable byte (or EOF) means the
    /// connection state is gone.
    fn is_reusable(stream: &TcpStream) -> bool {
        let mut probe = [0u8; 1];
        match stream.try_read(&mut probe) {
            Ok(_) => false,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => true,
            Err(_) => false,
        }
    }

    async fn exchange(
        stream: &mut TcpStream,
        payload: &[u8],
        deadline: Duration,
    ) -> GatewayResult<Value> {
        stream
            .write_all(payload)
            .await
            .map_err(GatewayError::Transport)?;

        match tokio::time::timeout(deadline, Self::read_response(stream)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout {
                secs: deadline.as_secs(),
            }),
        }
    }

    async fn read_response(stream: &mut TcpStream) -> GatewayResult<Value> {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; RECV_CHUNK_SIZE];

        loop {
            let received = stream
                .read(&mut chunk)
                .await
                .map_err(GatewayError::Transport)?;
            if received == 0 {
                return Err(GatewayError::TruncatedResponse);
            }
            buffer.extend_from_slice(&chunk[..received]);

            // No length prefix on the wire: a parse failure just means
            // the document is not complete yet.
            if let Ok(value) = serde_json::from_slice::<Value>(&buffer) {
                return Ok(value);
            }
            debug!(
                bytes = buffer.len(),
                "partial response from Blender, waiting for more"
            );
        }
    }
}
