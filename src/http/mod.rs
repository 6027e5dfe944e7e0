//! HTTP transport for the Model Context Protocol
//!
//! Serves the bearer-protected `/mcp` endpoint plus public health and discovery routes.

pub mod handlers;
