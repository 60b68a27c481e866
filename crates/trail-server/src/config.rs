use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use trail_core::lifecycle::{DEFAULT_MAX_WAIT_MS, DEFAULT_POLL_INTERVAL_MS};
use trail_core::{AwsCliSettings, PollSettings, DEFAULT_MAX_TOKENS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Newline-delimited JSON-RPC on stdin/stdout
    Stdio,
    /// JSON-RPC over HTTP POST
    Http,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "cloudtrail-mcp")]
#[command(about = "MCP server for AWS CloudTrail event lookup and CloudTrail Lake queries")]
#[command(version)]
pub struct Cli {
    /// Default AWS region for CloudTrail calls
    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    pub region: String,

    /// AWS CLI profile to use
    #[arg(long, env = "AWS_PROFILE")]
    pub profile: Option<String>,

    /// Path to the AWS CLI executable
    #[arg(long = "aws-cli", env = "AWS_CLI_PATH", default_value = "aws")]
    pub aws_cli: String,

    /// Token ceiling for a single tool response
    #[arg(long, env = "CLOUDTRAIL_MCP_MAX_TOKENS", default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,

    /// Interval between Lake query status polls, in milliseconds
    #[arg(long, env = "CLOUDTRAIL_MCP_POLL_INTERVAL_MS", default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,

    /// Longest time to wait for a Lake query, in milliseconds
    #[arg(long, env = "CLOUDTRAIL_MCP_MAX_WAIT_MS", default_value_t = DEFAULT_MAX_WAIT_MS)]
    pub max_wait_ms: u64,

    /// Transport to serve MCP on
    #[arg(long, value_enum, default_value = "stdio")]
    pub transport: Transport,

    /// Bind address for the HTTP transport
    #[arg(long, env = "CLOUDTRAIL_MCP_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port for the HTTP transport
    #[arg(long, env = "CLOUDTRAIL_MCP_PORT", default_value = "8000")]
    pub port: u16,

    /// Enable debug logging
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,

    /// Log filter (overrides the debug flag)
    #[arg(long, env = "RUST_LOG")]
    pub log_level: Option<String>,
}

/// Effective server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default = "default_aws_cli")]
    pub aws_cli: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_wait")]
    pub max_wait_ms: u64,
    #[serde(default = "default_transport")]
    pub transport: Transport,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_aws_cli() -> String {
    "aws".to_string()
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_max_wait() -> u64 {
    DEFAULT_MAX_WAIT_MS
}

fn default_transport() -> Transport {
    Transport::Stdio
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            profile: None,
            aws_cli: default_aws_cli(),
            max_tokens: default_max_tokens(),
            poll_interval_ms: default_poll_interval(),
            max_wait_ms: default_max_wait(),
            transport: default_transport(),
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("region must not be empty")]
    EmptyRegion,

    #[error("max tokens must be greater than zero")]
    ZeroMaxTokens,

    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("max wait ({max_wait_ms} ms) must be at least the poll interval ({poll_interval_ms} ms)")]
    WaitShorterThanInterval {
        max_wait_ms: u64,
        poll_interval_ms: u64,
    },
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.region.trim().is_empty() {
            return Err(ConfigError::EmptyRegion);
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::ZeroMaxTokens);
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.max_wait_ms < self.poll_interval_ms {
            return Err(ConfigError::WaitShorterThanInterval {
                max_wait_ms: self.max_wait_ms,
                poll_interval_ms: self.poll_interval_ms,
            });
        }
        Ok(())
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings::from_millis(self.poll_interval_ms, self.max_wait_ms)
    }

    pub fn aws_cli_settings(&self) -> AwsCliSettings {
        AwsCliSettings {
            cli_path: self.aws_cli.clone(),
            profile: self.profile.clone().filter(|p| !p.trim().is_empty()),
        }
    }
}

impl From<&Cli> for ServerConfig {
    fn from(cli: &Cli) -> Self {
        Self {
            region: cli.region.trim().to_string(),
            profile: cli.profile.clone(),
            aws_cli: cli.aws_cli.clone(),
            max_tokens: cli.max_tokens,
            poll_interval_ms: cli.poll_interval_ms,
            max_wait_ms: cli.max_wait_ms,
            transport: cli.transport,
            host: cli.host.clone(),
            port: cli.port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_settings(), PollSettings::default());
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn cli_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "cloudtrail-mcp",
            "--region",
            "eu-central-1",
            "--profile",
            "audit",
            "--max-tokens",
            "5000",
            "--poll-interval-ms",
            "500",
            "--max-wait-ms",
            "10000",
            "--transport",
            "http",
            "--port",
            "9000",
        ])
        .unwrap();
        let config = ServerConfig::from(&cli);

        assert_eq!(config.region, "eu-central-1");
        assert_eq!(config.aws_cli_settings().profile.as_deref(), Some("audit"));
        assert_eq!(config.max_tokens, 5000);
        assert_eq!(config.poll_settings(), PollSettings::from_millis(500, 10_000));
        assert_eq!(config.transport, Transport::Http);
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn rejects_inconsistent_polling() {
        let config = ServerConfig {
            poll_interval_ms: 5_000,
            max_wait_ms: 1_000,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::WaitShorterThanInterval { .. })
        ));

        let config = ServerConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroPollInterval));
    }

    #[test]
    fn rejects_zero_budget_and_blank_region() {
        let config = ServerConfig {
            max_tokens: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroMaxTokens));

        let config = ServerConfig {
            region: " ".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyRegion));
    }

    #[test]
    fn deserializes_partial_config() {
        let config: ServerConfig =
            serde_json::from_str(r#"{"region":"ap-south-1","transport":"http"}"#).unwrap();
        assert_eq!(config.region, "ap-south-1");
        assert_eq!(config.transport, Transport::Http);
        assert_eq!(config.max_wait_ms, DEFAULT_MAX_WAIT_MS);
    }
}
