//! Gateway to a running Blender instance.
//!
//! Blender side of the bridge: a lazily connected TCP client that sends
//! JSON commands to the addon socket and returns the result payloads the
//! addon replies with.

mod connection;
mod error;

pub use connection::{
    BlenderConnection, DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_HOST, DEFAULT_PORT,
};
pub use error::{GatewayError, GatewayResult};
