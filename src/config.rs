use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::auth::{self, ConfigError, Credential, TokenSettings};

/// Must stay below the default token lifetime of one hour
const MAX_SAFETY_MARGIN_SECS: u64 = 3599;

/// Upper bound the platform accepts for assertion `exp`
const MAX_ASSERTION_LIFETIME_SECS: u64 = 300;

const MAX_TIMEOUT_SECS: u64 = 600;

/// Data Cloud Gateway
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Server host address
    #[arg(short = 'H', long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "SERVER_PORT", default_value = "8000")]
    pub port: u16,

    /// Proxy API key for client authentication
    #[arg(short = 'k', long, env = "PROXY_API_KEY")]
    pub api_key: Option<String>,

    /// Connected app consumer key
    #[arg(long, env = "SF_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Integration user the connected app acts as
    #[arg(long, env = "SF_USERNAME")]
    pub username: Option<String>,

    /// Path to the RSA private key registered with the connected app
    #[arg(long, env = "SF_PRIVATE_KEY_PATH")]
    pub private_key_path: Option<String>,

    /// Login endpoint (use https://test.salesforce.com for sandboxes)
    #[arg(long, env = "SF_LOGIN_URL", default_value = "https://login.salesforce.com")]
    pub login_url: String,

    /// Data Cloud dataspace sent with the token exchange
    #[arg(long, env = "DATA_CLOUD_DATASPACE")]
    pub dataspace: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Seconds before expiry at which a cached token is treated as stale
    #[arg(
        long,
        env = "TOKEN_SAFETY_MARGIN",
        default_value = "60",
        value_parser = clap::value_parser!(u64).range(0..=MAX_SAFETY_MARGIN_SECS)
    )]
    pub token_safety_margin: u64,

    /// Lifetime of the signed JWT assertion in seconds
    #[arg(
        long,
        env = "JWT_EXPIRATION_SECONDS",
        default_value = "180",
        value_parser = clap::value_parser!(u64).range(1..=MAX_ASSERTION_LIFETIME_SECS)
    )]
    pub jwt_expiration_seconds: u64,

    /// HTTP connect timeout in seconds
    #[arg(
        long,
        env = "HTTP_CONNECT_TIMEOUT",
        default_value = "10",
        value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT_SECS)
    )]
    pub http_connect_timeout: u64,

    /// HTTP request timeout in seconds
    #[arg(
        long,
        env = "HTTP_REQUEST_TIMEOUT",
        default_value = "30",
        value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT_SECS)
    )]
    pub http_timeout: u64,

    /// HTTP max retries
    #[arg(long, env = "HTTP_MAX_RETRIES", default_value = "3")]
    pub http_retries: u32,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub server_host: String,
    pub server_port: u16,

    // Authentication
    pub proxy_api_key: String,

    // Platform credentials
    pub sf_client_id: String,
    pub sf_username: String,
    pub sf_private_key_path: PathBuf,
    pub sf_login_url: String,
    pub data_cloud_dataspace: Option<String>,

    // Token lifetimes
    pub token_safety_margin: u64,
    pub jwt_expiration_seconds: u64,

    // HTTP client
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,
    pub http_max_retries: u32,

    // Logging
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();
        Self::from_args(args)
    }

    /// Build configuration from parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Config {
            server_host: args.host,
            server_port: args.port,

            proxy_api_key: args
                .api_key
                .filter(|s| !s.is_empty())
                .context("PROXY_API_KEY is required (use -k or set PROXY_API_KEY env var)")?,

            sf_client_id: args
                .client_id
                .filter(|s| !s.is_empty())
                .context("SF_CLIENT_ID is required (use --client-id or set SF_CLIENT_ID env var)")?,

            sf_username: args
                .username
                .filter(|s| !s.is_empty())
                .context("SF_USERNAME is required (use --username or set SF_USERNAME env var)")?,

            sf_private_key_path: args
                .private_key_path
                .filter(|s| !s.is_empty())
                .map(|s| expand_tilde(&s))
                .context(
                    "SF_PRIVATE_KEY_PATH is required (use --private-key-path or set SF_PRIVATE_KEY_PATH env var)",
                )?,

            sf_login_url: args.login_url,

            data_cloud_dataspace: args.dataspace.filter(|s| !s.trim().is_empty()),

            token_safety_margin: args.token_safety_margin,

            jwt_expiration_seconds: args.jwt_expiration_seconds,

            http_connect_timeout: args.http_connect_timeout,

            http_request_timeout: args.http_timeout,

            http_max_retries: args.http_retries,

            log_level: args.log_level,

            log_format: parse_log_format(&args.log_format),
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.sf_private_key_path.is_file() {
            anyhow::bail!(
                "SF_PRIVATE_KEY_PATH does not exist or is not a file: {}",
                self.sf_private_key_path.display()
            );
        }

        if self.token_safety_margin > MAX_SAFETY_MARGIN_SECS {
            anyhow::bail!(
                "TOKEN_SAFETY_MARGIN must be below 3600 seconds, got {}",
                self.token_safety_margin
            );
        }

        if !(1..=MAX_ASSERTION_LIFETIME_SECS).contains(&self.jwt_expiration_seconds) {
            anyhow::bail!(
                "JWT_EXPIRATION_SECONDS must be between 1 and {}, got {}",
                MAX_ASSERTION_LIFETIME_SECS,
                self.jwt_expiration_seconds
            );
        }

        if !(1..=MAX_TIMEOUT_SECS).contains(&self.http_connect_timeout)
            || !(1..=MAX_TIMEOUT_SECS).contains(&self.http_request_timeout)
        {
            anyhow::bail!("HTTP timeouts must be between 1 and {} seconds", MAX_TIMEOUT_SECS);
        }

        Ok(())
    }

    /// Load the credential used by the token manager
    pub fn credential(&self) -> Result<Credential, ConfigError> {
        auth::load_credential(
            &self.sf_client_id,
            &self.sf_username,
            &self.sf_login_url,
            &self.sf_private_key_path,
        )
    }

    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings {
            safety_margin: chrono::Duration::seconds(self.token_safety_margin as i64),
            assertion_lifetime: chrono::Duration::seconds(self.jwt_expiration_seconds as i64),
            dataspace: self.data_cloud_dataspace.clone(),
        }
    }
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Parse log format from string
fn parse_log_format(s: &str) -> LogFormat {
    match s.to_lowercase().as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    }
}
