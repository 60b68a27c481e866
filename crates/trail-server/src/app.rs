use std::sync::Arc;

use trail_core::{AwsCliProvider, ClientProvider};
use trail_mcp::McpServer;
use trail_tools::{register_cloudtrail_tools, RegistryError, ToolContext, ToolRegistry};

use crate::config::ServerConfig;

/// Wire the tool registry and MCP server on top of a client provider.
pub fn build_server(
    config: &ServerConfig,
    provider: Arc<dyn ClientProvider>,
) -> Result<Arc<McpServer>, RegistryError> {
    let context = ToolContext::new(provider)
        .with_max_tokens(config.max_tokens)
        .with_poll_settings(config.poll_settings());

    let registry = ToolRegistry::new();
    register_cloudtrail_tools(&registry, Arc::new(context))?;

    Ok(Arc::new(McpServer::new(Arc::new(registry))))
}

pub fn aws_cli_provider(config: &ServerConfig) -> Arc<dyn ClientProvider> {
    Arc::new(AwsCliProvider::new(
        config.aws_cli_settings(),
        config.region.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use trail_core::mock::MockCloudTrail;
    use trail_core::StaticClientProvider;
    use trail_tools::CLOUDTRAIL_TOOL_NAMES;

    #[test]
    fn registers_every_tool() {
        let provider = Arc::new(StaticClientProvider::new(
            Arc::new(MockCloudTrail::new()),
            "us-east-1",
        ));
        let server = build_server(&ServerConfig::default(), provider).unwrap();

        let mut expected: Vec<String> = CLOUDTRAIL_TOOL_NAMES.iter().map(|n| n.to_string()).collect();
        expected.sort();
        assert_eq!(server.registry().list_tool_names(), expected);
    }

    #[test]
    fn aws_provider_uses_configured_region() {
        let config = ServerConfig {
            region: "eu-west-3".to_string(),
            ..Default::default()
        };
        assert_eq!(aws_cli_provider(&config).default_region(), "eu-west-3");
    }
}
