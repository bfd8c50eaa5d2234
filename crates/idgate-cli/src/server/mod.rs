//! MCP server: tool catalog, HTTP routing and the rmcp handler.

pub mod catalog;
pub mod mcp_server;
pub mod router;

pub use catalog::{CatalogEntry, CATALOG};
pub use mcp_server::McpServer;
pub use router::ToolRouter;
