//! Configuration
//!
//! Deployment settings read from CLI flags or the environment (a `.env`
//! file is honoured when present).

use std::{path::PathBuf, time::Duration};

use clap::Args;
use reqwest::Url;

use crate::{address::AddressEndpoints, checkout::CheckoutEndpoints};

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Clone, Debug, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

/// Backend and webhook endpoints.
#[derive(Clone, Debug, Args)]
pub struct EndpointConfig {
    /// Session and order API base URL
    #[arg(
        long,
        env = "API_URL",
        default_value = "https://whatsapp-worker.elrazand.workers.dev"
    )]
    pub api_url: Url,

    /// Public site URL, used for the promo-day endpoint and error redirects
    #[arg(long, env = "FRONTEND_URL", default_value = "http://localhost:3000")]
    pub frontend_url: Url,

    /// Webhook receiving menu checkouts
    #[arg(long, env = "MENU_WEBHOOK_URL")]
    pub menu_webhook_url: Option<Url>,

    /// Webhook receiving confirmed addresses
    #[arg(long, env = "ADDRESS_WEBHOOK_URL")]
    pub address_webhook_url: Option<Url>,

    /// Maps API key used by the address pages
    #[arg(long, env = "GOOGLE_MAPS_API_KEY", hide_env_values = true)]
    pub google_maps_api_key: Option<String>,

    /// Per-request HTTP timeout in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECONDS", default_value_t = 10u64)]
    pub http_timeout_seconds: u64,
}

impl EndpointConfig {
    /// HTTP request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    /// Where menu checkouts may go.
    pub fn checkout_endpoints(&self) -> CheckoutEndpoints {
        CheckoutEndpoints {
            api_url: Some(self.api_url.clone()),
            webhook_url: self.menu_webhook_url.clone(),
        }
    }

    /// Where confirmed addresses may go.
    pub fn address_endpoints(&self) -> AddressEndpoints {
        AddressEndpoints {
            api_url: Some(self.api_url.clone()),
            webhook_url: self.address_webhook_url.clone(),
        }
    }
}

/// Menu source.
#[derive(Clone, Debug, Args)]
pub struct CatalogConfig {
    /// YAML menu to use instead of the built-in one
    #[arg(long, env = "CATALOG_PATH")]
    pub catalog_path: Option<PathBuf>,
}

/// Full application configuration.
#[derive(Clone, Debug, Args)]
pub struct Config {
    /// Endpoint settings.
    #[command(flatten)]
    pub endpoints: EndpointConfig,

    /// Menu settings.
    #[command(flatten)]
    pub catalog: CatalogConfig,

    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use testresult::TestResult;

    use super::*;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(flatten)]
        config: Config,
    }

    #[test]
    fn flags_override_defaults() -> TestResult {
        let cli = TestCli::try_parse_from([
            "luigis",
            "--api-url",
            "https://api.example.com",
            "--menu-webhook-url",
            "https://hooks.example.com/menu",
            "--http-timeout-seconds",
            "3",
            "--log-format",
            "json",
        ])?;

        let endpoints = cli.config.endpoints.checkout_endpoints();

        assert_eq!(
            endpoints.api_url.as_ref().map(Url::as_str),
            Some("https://api.example.com/")
        );
        assert_eq!(
            endpoints.webhook_url.as_ref().map(Url::as_str),
            Some("https://hooks.example.com/menu")
        );
        assert_eq!(cli.config.endpoints.timeout(), Duration::from_secs(3));
        assert_eq!(cli.config.logging.log_format, LogFormat::Json);

        Ok(())
    }

    #[test]
    fn invalid_urls_are_rejected() {
        let result = TestCli::try_parse_from(["luigis", "--api-url", "not a url"]);

        assert!(result.is_err());
    }
}
