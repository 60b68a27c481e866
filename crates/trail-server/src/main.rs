use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use trail_server::{aws_cli_provider, build_server, http, init_logging, Cli, ServerConfig, Transport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref(), cli.debug);

    let config = ServerConfig::from(&cli);
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(e).context("invalid configuration");
    }

    info!(
        region = %config.region,
        max_tokens = config.max_tokens,
        poll_interval_ms = config.poll_interval_ms,
        max_wait_ms = config.max_wait_ms,
        "Starting cloudtrail-mcp"
    );

    let server = build_server(&config, aws_cli_provider(&config))
        .context("failed to register CloudTrail tools")?;

    match config.transport {
        Transport::Stdio => {
            info!("Serving MCP on stdio");
            trail_mcp::serve_stdio(server)
                .await
                .context("stdio transport failed")?;
        }
        Transport::Http => {
            http::serve_http(server, &config.host, config.port)
                .await
                .with_context(|| format!("HTTP transport on {}:{} failed", config.host, config.port))?;
        }
    }

    info!("cloudtrail-mcp stopped");
    Ok(())
}
