//! MCP session lifecycle over stdio.
//!
//! This module implements the session in three phases:
//!
//! 1. **Handshake**: one `initialize` request, answered with the server
//!    identity; then one message expected to be the `initialized`
//!    notification (anything else is logged and tolerated).
//! 2. **Main loop**: answer `tools/list`, `tools/call`, `prompts/list`
//!    and `prompts/get`; drop every other method without replying.
//! 3. **Shutdown**: end of input closes the Blender connection and
//!    returns control to the caller.
//!
//! # Architecture
//!
//! The session is the single thread of control. One message is read,
//! handled to completion (including the full downstream round trip of a
//! tool call), and answered before the next is read. Tool failures are
//! rendered as text results; the only protocol-level error ever written
//! is for an unknown `prompts/get` name.

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::{stdin, stdout, AsyncRead, AsyncWrite, Stdin, Stdout};
use tracing::{debug, info, warn};

use crate::mcp::framing::{FrameReader, FrameWriter, Framing, FramingError};
use crate::mcp::protocol::{
    parse_message, IncomingMessage, JsonRpcError, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, MCP_PROTOCOL_VERSION, SERVER_NAME,
};
use crate::telemetry::Telemetry;
use crate::tools::{registry, ToolDispatcher};

/// Server state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for the initialize request.
    AwaitingInitialize,
    /// Initialize answered, waiting for the initialized notification.
    AwaitingInitialized,
    /// Ready for normal operation.
    Running,
    /// The session has ended.
    Terminated,
}

/// Reasons a session ended abnormally.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The client broke the handshake contract.
    #[error("handshake failed: {reason}")]
    Handshake {
        /// What the client sent instead.
        reason: String,
    },

    /// The stdio transport failed.
    #[error(transparent)]
    Framing(#[from] FramingError),
}

/// Methods the session answers after the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Initialize,
    ToolsList,
    ToolsCall,
    PromptsList,
    PromptsGet,
}

impl Method {
    fn resolve(name: &str) -> Option<Self> {
        match name {
            "initialize" => Some(Self::Initialize),
            "tools/list" => Some(Self::ToolsList),
            "tools/call" => Some(Self::ToolsCall),
            "prompts/list" => Some(Self::PromptsList),
            "prompts/get" => Some(Self::PromptsGet),
            _ => None,
        }
    }
}

/// Parameters of a `tools/call` request.
///
/// Deliberately lenient: a missing or malformed params object dispatches
/// as an unknown tool, which comes back as failure text rather than a
/// protocol error.
#[derive(Debug, Clone, Default, Deserialize)]
struct ToolCallParams {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// The MCP session over a pair of byte streams.
pub struct McpServer<R, W> {
    state: ServerState,
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    dispatcher: ToolDispatcher,
    telemetry: Telemetry,
}

impl McpServer<Stdin, Stdout> {
    /// Creates a session over the process stdio streams.
    #[must_use]
    pub fn stdio(framing: Framing, dispatcher: ToolDispatcher, telemetry: Telemetry) -> Self {
        Self::new(framing, stdin(), stdout(), dispatcher, telemetry)
    }
}

impl<R: AsyncRead + Unpin, W: AsyncWrite + Unpin> McpServer<R, W> {
    /// Creates a session over arbitrary streams.
    #[must_use]
    pub fn new(
        framing: Framing,
        reader: R,
        writer: W,
        dispatcher: ToolDispatcher,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            state: ServerState::AwaitingInitialize,
            reader: FrameReader::new(framing, reader),
            writer: FrameWriter::new(framing, writer),
            dispatcher,
            telemetry,
        }
    }

    /// Returns the current server state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Runs the session to completion.
    ///
    /// Returns `Ok(())` when the client closes its end of the stream. The
    /// Blender connection is closed on the way out regardless of outcome.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Handshake`] when the first message is not
    /// an `initialize` request, and [`SessionError::Framing`] when the
    /// stdio transport fails or delivers malformed bytes.
    pub async fn run(&mut self) -> Result<(), SessionError> {
        let outcome = self.session().await;
        self.dispatcher.shutdown();
        self.state = ServerState::Terminated;
        outcome
    }

    async fn session(&mut self) -> Result<(), SessionError> {
        self.handshake().await?;
        self.main_loop().await
    }

    /// Performs the three-step handshake.
    ///
    /// The first message must be an `initialize` request; nothing is
    /// written otherwise. The follow-up read is expected to be the
    /// `initialized` notification, but any readable message (or end of
    /// input) is tolerated there.
    async fn handshake(&mut self) -> Result<(), SessionError> {
        let Some(first) = self.reader.read_message().await? else {
            return Err(SessionError::Handshake {
                reason: "expected initialize, got end of input".to_string(),
            });
        };

        let request = match parse_message(&first) {
            Ok(IncomingMessage::Request(req)) if req.method == "initialize" => req,
            Ok(msg) => {
                return Err(SessionError::Handshake {
                    reason: format!("expected initialize, got {}", msg.method()),
                });
            }
            Err(e) => {
                return Err(SessionError::Handshake {
                    reason: format!("first message is not a request: {e}"),
                });
            }
        };
        debug!(id = %request.id, "initialize received");

        let result = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {"tools": {}},
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            },
        });
        self.writer
            .write_message(&JsonRpcResponse::success(request.id, result))
            .await?;
        self.state = ServerState::AwaitingInitialized;

        match self.reader.read_message().await {
            Ok(Some(message)) => match parse_message(&message) {
                Ok(IncomingMessage::Notification(n))
                    if n.method == "notifications/initialized" =>
                {
                    debug!("client confirmed initialisation");
                }
                Ok(msg) => {
                    warn!(method = msg.method(), "expected initialized notification");
                }
                Err(e) => warn!(error = %e, "unreadable message in place of initialized"),
            },
            Ok(None) => debug!("end of input before initialized notification"),
            Err(e) if e.is_truncation() => {
                debug!("stream truncated before initialized notification");
            }
            Err(e) => return Err(e.into()),
        }

        self.state = ServerState::Running;
        Ok(())
    }

    async fn main_loop(&mut self) -> Result<(), SessionError> {
        info!("entering main loop");
        loop {
            let value = match self.reader.read_message().await {
                Ok(Some(value)) => value,
                Ok(None) => {
                    debug!("end of input");
                    return Ok(());
                }
                Err(e) if e.is_truncation() => {
                    debug!(error = %e, "input truncated, ending session");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };

            match parse_message(&value) {
                Ok(IncomingMessage::Request(request)) => self.handle_request(request).await?,
                Ok(IncomingMessage::Notification(notification)) => {
                    Self::handle_notification(&notification);
                }
                Err(e) => debug!(error = %e, "ignoring unclassifiable message"),
            }
        }
    }

    /// Handles one request. Unknown methods are dropped without a reply;
    /// the client's own timeout covers that case.
    async fn handle_request(&mut self, request: JsonRpcRequest) -> Result<(), SessionError> {
        let Some(method) = Method::resolve(&request.method) else {
            debug!(method = %request.method, "dropping request for unknown method");
            return Ok(());
        };

        match method {
            Method::Initialize => {
                // The handshake runs once; repeats are dropped like any
                // unknown method.
                warn!("dropping repeated initialize request");
                Ok(())
            }
            Method::ToolsList => self.handle_tools_list(request).await,
            Method::ToolsCall => self.handle_tools_call(request).await,
            Method::PromptsList => self.handle_prompts_list(request).await,
            Method::PromptsGet => self.handle_prompts_get(request).await,
        }
    }

    fn handle_notification(notification: &JsonRpcNotification) {
        debug!(method = %notification.method, "notification ignored");
    }

    async fn handle_tools_list(&mut self, request: JsonRpcRequest) -> Result<(), SessionError> {
        let result = json!({"tools": registry::tool_definitions()});
        self.writer
            .write_message(&JsonRpcResponse::success(request.id, result))
            .await?;
        Ok(())
    }

    async fn handle_tools_call(&mut self, request: JsonRpcRequest) -> Result<(), SessionError> {
        let params: ToolCallParams = request
            .params
            .as_ref()
            .and_then(|p| serde_json::from_value(p.clone()).ok())
            .unwrap_or_default();

        info!(tool = %params.name, "tool call");
        let text = self
            .dispatcher
            .dispatch(&params.name, &params.arguments)
            .await;

        let result = json!({"content": [{"type": "text", "text": text}]});
        self.writer
            .write_message(&JsonRpcResponse::success(request.id, result))
            .await?;
        Ok(())
    }

    async fn handle_prompts_list(&mut self, request: JsonRpcRequest) -> Result<(), SessionError> {
        let result = json!({
            "prompts": [{
                "name": registry::PROMPT_NAME,
                "description": registry::PROMPT_DESCRIPTION,
            }],
        });
        self.writer
            .write_message(&JsonRpcResponse::success(request.id, result))
            .await?;
        Ok(())
    }

    async fn handle_prompts_get(&mut self, request: JsonRpcRequest) -> Result<(), SessionError> {
        let name = request
            .params
            .as_ref()
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        if name == registry::PROMPT_NAME {
            self.telemetry.record_prompt_sent(name);
            let result = json!({
                "messages": [{
                    "role": "assistant",
                    "content": {"type": "text", "text": registry::ASSET_CREATION_STRATEGY},
                }],
            });
            self.writer
                .write_message(&JsonRpcResponse::success(request.id, result))
                .await?;
        } else {
            let error = JsonRpcError::invalid_params(request.id, format!("Unknown prompt: {name}"));
            self.writer.write_message(&error).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_resolution_covers_the_protocol_surface() {
        assert_eq!(Method::resolve("initialize"), Some(Method::Initialize));
        assert_eq!(Method::resolve("tools/list"), Some(Method::ToolsList));
        assert_eq!(Method::resolve("tools/call"), Some(Method::ToolsCall));
        assert_eq!(Method::resolve("prompts/list"), Some(Method::PromptsList));
        assert_eq!(Method::resolve("prompts/get"), Some(Method::PromptsGet));
    }

    #[test]
    fn unlisted_methods_do_not_resolve() {
        assert_eq!(Method::resolve("ping"), None);
        assert_eq!(Method::resolve("resources/list"), None);
        assert_eq!(Method::resolve(""), None);
        assert_eq!(Method::resolve("Tools/List"), None);
    }

    #[test]
    fn tool_call_params_tolerate_missing_fields() {
        let params: ToolCallParams = serde_json::from_value(json!({})).unwrap();
        assert_eq!(params.name, "");
        assert_eq!(params.arguments, Value::Null);

        let params: ToolCallParams =
            serde_json::from_value(json!({"name": "get_scene_info"})).unwrap();
        assert_eq!(params.name, "get_scene_info");
    }

    #[test]
    fn tool_call_params_reject_non_objects() {
        assert!(serde_json::from_value::<ToolCallParams>(json!("nope")).is_err());
        assert!(serde_json::from_value::<ToolCallParams>(json!([1, 2])).is_err());
    }
}
