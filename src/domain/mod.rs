//! SendGrid operations and the MCP tools built on them
//!
//! Template and statistics operations talk to the provider; `tools` turns them into
//! MCP tool calls.

pub mod stats;
pub mod templates;
pub mod tools;

#[cfg(test)]
pub(crate) mod test_support;
