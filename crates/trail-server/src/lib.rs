//! Process wiring for the CloudTrail MCP server: configuration, logging and
//! the stdio and HTTP transports.

pub mod app;
pub mod config;
pub mod http;
pub mod logging;

pub use app::{aws_cli_provider, build_server};
pub use config::{Cli, ConfigError, ServerConfig, Transport};
pub use logging::init_logging;
