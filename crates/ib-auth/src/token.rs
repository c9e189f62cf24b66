//! OAuth token exchange and refresh
//!
//! Handles the two token endpoint interactions:
//! 1. Authorization code exchange (completes the authorization flow)
//! 2. Token refresh (driven by the dispatcher after a 401)
//!
//! Both POST to `{base_url}/token` with different grant types. Neither
//! persists the returned token set; that is the caller's job.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{OAuthConfig, TokenRequestFormat};
use crate::constants::DEFAULT_TOKEN_TYPE;
use crate::error::{Error, Result};
use crate::storage::TokenStorage;

/// Tokens issued by the token endpoint, as held in storage.
///
/// `expires_in` is a delta in seconds from issuance. `stored_at` is a unix
/// timestamp in milliseconds assigned by the storage backend, never by the
/// server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored_at: Option<u64>,
}

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_string()
}

impl TokenSet {
    /// Bearer token set with no expiry information.
    pub fn bearer(access_token: impl Into<String>, refresh_token: Option<&str>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.map(str::to_string),
            token_type: default_token_type(),
            expires_in: None,
            stored_at: None,
        }
    }

    /// Absolute expiry as unix milliseconds. Needs both `stored_at` and
    /// `expires_in`. Saturates at `u64::MAX` for lifetimes too large to
    /// represent.
    pub fn expires_at(&self) -> Option<u64> {
        let lifetime = self.expires_in?.saturating_mul(1000);
        Some(self.stored_at?.saturating_add(lifetime))
    }

    /// Whether the access token expires within `window_millis` of `now_millis`.
    /// Sets without expiry information never report as expiring.
    pub fn expires_within(&self, window_millis: u64, now_millis: u64) -> bool {
        self.expires_at()
            .is_some_and(|at| at <= now_millis.saturating_add(window_millis))
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("stored_at", &self.stored_at)
            .finish()
    }
}

/// OAuth 2.0 error body: `{"error": "...", "error_description": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl OAuthErrorResponse {
    /// Parse an error body, or `None` if it is not an OAuth error object.
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }
}

/// Exchange an authorization code for tokens.
///
/// If storage holds a pending PKCE verifier it is sent as `code_verifier`.
/// The verifier slot is cleared before the request goes out, whatever the
/// outcome, so a failed exchange never leaves a reusable verifier behind;
/// retrying the flow means building a new authorization URL.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &OAuthConfig,
    storage: &dyn TokenStorage,
    code: &str,
) -> Result<TokenSet> {
    let verifier = storage.get_code_verifier().await?;
    storage.clear_code_verifier().await?;

    let mut params = vec![
        ("grant_type", "authorization_code".to_string()),
        ("code", code.to_string()),
        ("redirect_uri", config.redirect_uri().to_string()),
        ("client_id", config.client_id().to_string()),
    ];
    let pkce = verifier.is_some();
    if let Some(verifier) = verifier {
        params.push(("code_verifier", verifier));
    }
    debug!(pkce, "exchanging authorization code");

    let response = send_token_request(client, config, &params)
        .await
        .map_err(|e| Error::TokenExchange {
            message: format!("token exchange request failed: {e}"),
            status: None,
            oauth_error: None,
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        warn!(status = status.as_u16(), "token endpoint rejected authorization code");
        return Err(Error::TokenExchange {
            message: format!("token endpoint returned {status}: {body}"),
            status: Some(status.as_u16()),
            oauth_error: OAuthErrorResponse::parse(&body),
        });
    }

    let tokens = response
        .json::<TokenSet>()
        .await
        .map_err(|e| Error::TokenExchange {
            message: format!("invalid token response: {e}"),
            status: Some(status.as_u16()),
            oauth_error: None,
        })?;
    info!("authorization code exchanged for tokens");
    Ok(tokens)
}

/// Obtain a new token set using a refresh token.
///
/// Does not touch storage. Any transport failure or non-2xx response is a
/// `TokenRefresh` error carrying the underlying cause.
pub async fn refresh_tokens(
    client: &reqwest::Client,
    config: &OAuthConfig,
    refresh_token: &str,
) -> Result<TokenSet> {
    let params = [
        ("grant_type", "refresh_token".to_string()),
        ("refresh_token", refresh_token.to_string()),
        ("client_id", config.client_id().to_string()),
    ];

    let response = send_token_request(client, config, &params)
        .await
        .map_err(|e| Error::TokenRefresh {
            message: "could not reach token endpoint".into(),
            status: None,
            source: Some(e),
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::refresh(
            format!("token endpoint returned {status}: {body}"),
            Some(status.as_u16()),
        ));
    }

    response
        .json::<TokenSet>()
        .await
        .map_err(|e| Error::TokenRefresh {
            message: "invalid refresh response".into(),
            status: Some(status.as_u16()),
            source: Some(e),
        })
}

/// POST grant parameters to the token endpoint in the configured encoding.
async fn send_token_request(
    client: &reqwest::Client,
    config: &OAuthConfig,
    params: &[(&str, String)],
) -> reqwest::Result<reqwest::Response> {
    let request = client.post(config.token_endpoint());
    let request = match config.token_request_format() {
        TokenRequestFormat::Json => {
            let body: BTreeMap<&str, &str> =
                params.iter().map(|(k, v)| (*k, v.as_str())).collect();
            request.json(&body)
        }
        TokenRequestFormat::Form => request.form(params),
    };
    request.send().await
}
