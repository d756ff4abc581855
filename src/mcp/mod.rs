//! Model Context Protocol (MCP) server handling and JSON-RPC implementations
//!
//! Request validation, protocol negotiation, response formatting and routing
//! for JSON-RPC messages.

pub mod rpc;
pub mod server;
pub mod stdio;
