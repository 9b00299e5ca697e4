//! Model Context Protocol (MCP) server implementation.
//!
//! This module implements the MCP side of the bridge: JSON-RPC 2.0
//! messages over stdio, framed under either of two disciplines, with the
//! session lifecycle on top.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         MCP Session                         │
//! │                                                             │
//! │   ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    │
//! │   │   Framing   │───▶│   Server    │───▶│  Dispatch   │    │
//! │   │   (stdio)   │    │  (lifecycle)│    │  (tools)    │    │
//! │   └─────────────┘    └─────────────┘    └─────────────┘    │
//! │          │                  │                  │            │
//! │          ▼                  ▼                  ▼            │
//! │   ┌─────────────────────────────────────────────────┐      │
//! │   │              JSON-RPC Messages                  │      │
//! │   └─────────────────────────────────────────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Protocol Version
//!
//! This implementation targets MCP protocol version 2024-11-05.

pub mod framing;
pub mod protocol;
pub mod server;

pub use framing::{FrameReader, FrameWriter, Framing, FramingError};
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_PROTOCOL_VERSION};
pub use server::{McpServer, ServerState, SessionError};
