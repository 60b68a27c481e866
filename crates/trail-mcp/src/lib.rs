//! Model Context Protocol front end for the CloudTrail tools.

pub mod error;
pub mod protocol;
pub mod server;
pub mod transport;

pub use error::{McpError, Result};
pub use protocol::*;
pub use server::McpServer;
pub use transport::{serve, serve_stdio};
