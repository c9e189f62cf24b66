//! Authorization server metadata (RFC 8414)
//!
//! Fetches `{base_url}/.well-known/oauth-authorization-server` so a client can
//! confirm endpoints and PKCE support before starting a flow.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::OAuthConfig;
use crate::constants::CODE_CHALLENGE_METHOD;
use crate::error::{Error, Result};

/// Server metadata document. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub code_challenge_methods_supported: Vec<String>,
    #[serde(default)]
    pub grant_types_supported: Vec<String>,
    #[serde(default)]
    pub response_types_supported: Vec<String>,
    #[serde(default)]
    pub token_endpoint_auth_methods_supported: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introspection_endpoint: Option<String>,
}

impl AuthorizationServerMetadata {
    pub fn supports_s256(&self) -> bool {
        self.code_challenge_methods_supported
            .iter()
            .any(|m| m == CODE_CHALLENGE_METHOD)
    }

    pub fn supports_grant(&self, grant_type: &str) -> bool {
        self.grant_types_supported.iter().any(|g| g == grant_type)
    }
}

/// Fetch the metadata document for the configured server.
pub async fn discover(
    client: &reqwest::Client,
    config: &OAuthConfig,
) -> Result<AuthorizationServerMetadata> {
    let url = config.metadata_endpoint();
    debug!(%url, "fetching authorization server metadata");

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| Error::Discovery(format!("request to {url} failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        warn!(status = status.as_u16(), "metadata endpoint returned error");
        return Err(Error::Discovery(format!("{url} returned {status}")));
    }

    response
        .json::<AuthorizationServerMetadata>()
        .await
        .map_err(|e| Error::Discovery(format!("invalid metadata document: {e}")))
}
