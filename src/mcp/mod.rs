// JSON-RPC protocol types, tool registry and MCP dispatch
pub mod handler;
pub mod protocol;
pub mod registry;
