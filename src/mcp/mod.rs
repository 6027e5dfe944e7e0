//! Model Context Protocol server handling and JSON-RPC implementations
//!
//! Decodes JSON-RPC messages, routes MCP methods and shapes JSON-RPC responses.

pub mod rpc;
pub mod server;
