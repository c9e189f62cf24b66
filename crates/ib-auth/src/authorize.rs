//! Authorization URL construction
//!
//! Builds the `{base_url}/authorize` redirect for the first leg of the
//! authorization code flow. The only side effect is persisting the PKCE
//! verifier when PKCE is requested; no network call is made.

use reqwest::Url;
use tracing::debug;

use crate::config::OAuthConfig;
use crate::constants::{CODE_CHALLENGE_METHOD, PLATFORM_URL_PARAM};
use crate::error::{Error, Result};
use crate::pkce::{PkcePair, generate_state};
use crate::storage::TokenStorage;

/// Per-call options for `build_auth_url`.
#[derive(Debug, Clone)]
pub struct AuthUrlOptions {
    /// Forwarded verbatim as the `platform_url` query parameter.
    pub platform_url: Option<String>,
    pub use_pkce: bool,
}

impl Default for AuthUrlOptions {
    fn default() -> Self {
        Self {
            platform_url: None,
            use_pkce: true,
        }
    }
}

/// An authorization redirect and the `state` it carries.
///
/// The caller must compare `state` against the value returned on the callback;
/// this crate does not keep it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationUrl {
    pub url: Url,
    pub state: String,
}

/// Build an authorization URL with a fresh `state`.
///
/// With `use_pkce`, a new verifier is generated and written to storage,
/// replacing any pending one. A flow started earlier against the same storage
/// can no longer be completed after that.
pub async fn build_auth_url(
    config: &OAuthConfig,
    storage: &dyn TokenStorage,
    options: &AuthUrlOptions,
) -> Result<AuthorizationUrl> {
    let state = generate_state();

    let challenge = if options.use_pkce {
        let pair = PkcePair::generate();
        storage.store_code_verifier(pair.verifier.expose()).await?;
        debug!("stored pending PKCE verifier");
        Some(pair.challenge)
    } else {
        None
    };

    let url = authorization_url(
        config,
        &state,
        challenge.as_deref(),
        options.platform_url.as_deref(),
    )?;
    Ok(AuthorizationUrl { url, state })
}

/// Compose the authorization URL from already-generated values.
///
/// Pure: performs no storage access.
pub fn authorization_url(
    config: &OAuthConfig,
    state: &str,
    challenge: Option<&str>,
    platform_url: Option<&str>,
) -> Result<Url> {
    let mut url = Url::parse(&config.authorize_endpoint())
        .map_err(|e| Error::InvalidConfig(format!("authorize endpoint: {e}")))?;

    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("response_type", "code")
            .append_pair("client_id", config.client_id())
            .append_pair("redirect_uri", config.redirect_uri())
            .append_pair("scope", config.scope())
            .append_pair("state", state);
        if let Some(challenge) = challenge {
            query
                .append_pair("code_challenge", challenge)
                .append_pair("code_challenge_method", CODE_CHALLENGE_METHOD);
        }
        if let Some(platform_url) = platform_url {
            query.append_pair(PLATFORM_URL_PARAM, platform_url);
        }
    }

    Ok(url)
}
