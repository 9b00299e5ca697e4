//! The tool surface exposed to MCP clients.
//!
//! [`registry`] owns the static catalogue (names, descriptions, input
//! schemas, the asset creation prompt); [`ToolDispatcher`] executes
//! calls against the Blender gateway.

mod dispatch;
pub mod registry;

pub use dispatch::{DispatchError, ToolDispatcher};
pub use registry::{
    tool_definitions, ToolDefinition, ToolKind, ASSET_CREATION_STRATEGY, PROMPT_DESCRIPTION,
    PROMPT_NAME,
};
