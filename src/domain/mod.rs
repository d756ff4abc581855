//! Remote operations and resources of the browserslist protocol server
//!
//! Provides the tool handlers and static documents exposed over MCP.

pub mod resources;
pub mod tools;
