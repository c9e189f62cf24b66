//! IntelligenceBank OAuth command-line client
//!
//! Single-binary front end over `ib-client` that:
//! 1. Starts the authorization flow and prints the URL to open
//! 2. Completes it from the callback `code`
//! 3. Sends authenticated requests through the bridge's `/proxy` passthrough
//! 4. Shows, discovers and clears local credentials

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ib_client::{OAuthClient, RequestOptions};
use reqwest::Method;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[derive(Debug, Parser)]
#[command(name = "ib-oauth")]
#[command(about = "OAuth 2.0 + PKCE client for the IntelligenceBank OAuth bridge")]
#[command(version)]
struct Cli {
    /// Path to configuration file (falls back to CONFIG_PATH, then ib-oauth.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, PartialEq, Subcommand)]
enum Command {
    /// Print an authorization URL to open in a browser
    Authorize {
        /// IntelligenceBank instance to pre-select on the login page
        #[arg(long)]
        platform_url: Option<String>,

        /// Omit the PKCE challenge
        #[arg(long)]
        no_pkce: bool,
    },

    /// Complete the flow with the `code` from the callback
    Exchange { code: String },

    /// Send an authenticated request through the proxy
    Request {
        /// Path under the proxy, e.g. `/assets/search`
        path: String,

        #[arg(long, default_value = "GET", value_parser = parse_method)]
        method: Method,

        /// JSON request body
        #[arg(long, value_parser = parse_json)]
        data: Option<serde_json::Value>,

        /// Extra header as NAME:VALUE, may be repeated
        #[arg(long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
    },

    /// Show stored token metadata
    Tokens,

    /// Fetch authorization server metadata
    Discover,

    /// Clear stored credentials
    Logout,
}

fn parse_method(raw: &str) -> Result<Method, String> {
    Method::from_bytes(raw.to_ascii_uppercase().as_bytes())
        .map_err(|_| format!("invalid HTTP method: {raw}"))
}

fn parse_json(raw: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("must be valid JSON: {e}"))
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("header must be NAME:VALUE, got {raw:?}"))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support.
    // Logs go to stderr so command output on stdout stays clean.
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config_path = Config::resolve_path(cli.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let oauth = config.oauth_config()?;
    info!(
        client_id = oauth.client_id(),
        base_url = oauth.base_url(),
        storage = ?config.storage,
        "configuration loaded"
    );

    let storage = config.open_storage().context("failed to open token storage")?;
    let http = reqwest::Client::builder()
        .timeout(config.timeout())
        .build()
        .context("failed to build HTTP client")?;
    let mut options = config.client_options();
    if let Command::Authorize { no_pkce: true, .. } = cli.command {
        options.use_pkce = false;
    }
    let client = OAuthClient::with_options(oauth, storage, options).with_http_client(http);

    run(client, cli.command).await
}

async fn run(client: OAuthClient, command: Command) -> Result<()> {
    match command {
        Command::Authorize { platform_url, .. } => {
            let auth = client
                .authorization_url(platform_url.as_deref())
                .await
                .context("failed to build authorization URL")?;
            println!("{}", auth.url);
            println!("state: {}", auth.state);
        }
        Command::Exchange { code } => {
            let tokens = client
                .handle_callback(&code)
                .await
                .context("authorization code exchange failed")?;
            println!(
                "authenticated (token_type={}, expires_in={})",
                tokens.token_type,
                tokens
                    .expires_in
                    .map_or_else(|| "unknown".to_string(), |s| format!("{s}s"))
            );
        }
        Command::Request {
            path,
            method,
            data,
            headers,
        } => {
            let mut options = RequestOptions::new();
            for (name, value) in headers {
                options = options.header(name, value);
            }
            if let Some(body) = data {
                options = options.json(body);
            }

            let response = client
                .request(&path, method, &options)
                .await
                .with_context(|| format!("request to {path} failed"))?;
            let status = response.status();
            let body = response.text().await.context("failed to read response body")?;
            info!(status = status.as_u16(), "request complete");
            println!("{body}");
        }
        Command::Tokens => match client.tokens().await? {
            Some(tokens) => {
                let summary = serde_json::json!({
                    "token_type": tokens.token_type,
                    "has_refresh_token": tokens.refresh_token.is_some(),
                    "expires_in": tokens.expires_in,
                    "stored_at": tokens.stored_at,
                    "expires_at": tokens.expires_at(),
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            None => println!("not authenticated"),
        },
        Command::Discover => {
            let metadata = client
                .discover()
                .await
                .context("authorization server discovery failed")?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
            if !metadata.supports_s256() {
                warn!("server does not advertise S256 PKCE support");
            }
        }
        Command::Logout => {
            client.logout().await.context("logout failed")?;
            println!("logged out");
        }
    }
    Ok(())
}
