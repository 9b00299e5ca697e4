//! blender-mcp: MCP server bridging AI assistants to a running Blender
//!
//! This library speaks JSON-RPC 2.0 over stdio to an MCP client and
//! relays tool calls as JSON commands over TCP to the Blender addon.
//!
//! # Architecture
//!
//! The bridge contains no 3D logic of its own. Blender executes the
//! commands; the assistant decides what to build:
//!
//! - **Scene access**: inspect the scene and objects, run Python inside
//!   Blender, capture viewport screenshots
//! - **Asset integrations**: PolyHaven, Sketchfab, Hyper3D Rodin and
//!   Hunyuan3D lookups, downloads and generation jobs
//! - **Prompting**: a fixed asset creation strategy prompt for clients
//!   that support `prompts/get`
//!
//! # Modules
//!
//! - [`blender`] — TCP gateway to the Blender addon
//! - [`config`] — Configuration loading and validation
//! - [`error`] — Configuration error types
//! - [`mcp`] — MCP protocol implementation (framing, session)
//! - [`telemetry`] — Anonymous usage telemetry
//! - [`tools`] — Tool catalogue and dispatch

pub mod blender;
pub mod config;
pub mod error;
pub mod mcp;
pub mod telemetry;
pub mod tools;
