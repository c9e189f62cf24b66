//! Authenticated client for the OAuth bridge
//!
//! `OAuthClient` drives the whole client side: it starts the authorization
//! flow, completes it from the callback code, and dispatches bearer-token
//! requests to `{base_url}/proxy/{path}`.
//!
//! Per request, the dispatcher reads the token set from storage (never from a
//! cache), sends the call, and on a 401 either ends the session or refreshes
//! and retries exactly once:
//!
//! ```text
//! Authenticated --401 invalid_token + expiry phrase--> clear tokens, SessionExpired
//! Authenticated --401 other--> Refreshing --ok--> persist, retry once
//!                              Refreshing --err--> TokenRefresh (tokens untouched)
//! ```

use std::sync::Arc;
use std::time::Duration;

use ib_auth::{
    AuthUrlOptions, AuthorizationServerMetadata, AuthorizationUrl, OAuthConfig,
    SESSION_EXPIRED_PHRASE, TokenSet, TokenStorage, now_millis,
};
use reqwest::{Method, Response, StatusCode};
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::metrics::{self, RefreshOutcome};
use crate::request::RequestOptions;
use crate::session::{Unauthorized, classify_unauthorized};

/// Behaviour knobs for `OAuthClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Generate and send a PKCE challenge when building authorization URLs.
    pub use_pkce: bool,
    /// Substring of the 401 `error_description` that marks a dead session.
    pub session_expired_phrase: String,
    /// Refresh before sending when the stored token expires within this
    /// window. `None` leaves refresh entirely to the 401 path.
    pub refresh_skew: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            use_pkce: true,
            session_expired_phrase: SESSION_EXPIRED_PHRASE.to_string(),
            refresh_skew: None,
        }
    }
}

/// OAuth client bound to one server configuration and one storage backend.
pub struct OAuthClient {
    config: OAuthConfig,
    storage: Arc<dyn TokenStorage>,
    http: reqwest::Client,
    options: ClientOptions,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig, storage: Arc<dyn TokenStorage>) -> Self {
        Self::with_options(config, storage, ClientOptions::default())
    }

    pub fn with_options(
        config: OAuthConfig,
        storage: Arc<dyn TokenStorage>,
        options: ClientOptions,
    ) -> Self {
        Self {
            config,
            storage,
            http: reqwest::Client::new(),
            options,
        }
    }

    /// Replace the HTTP client, e.g. to set timeouts or a proxy.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Start the authorization flow.
    ///
    /// Stores a fresh PKCE verifier when `use_pkce` is set, replacing any
    /// pending one. The returned `state` must be checked on the callback.
    pub async fn authorization_url(&self, platform_url: Option<&str>) -> Result<AuthorizationUrl> {
        let options = AuthUrlOptions {
            platform_url: platform_url.map(str::to_string),
            use_pkce: self.options.use_pkce,
        };
        Ok(ib_auth::build_auth_url(&self.config, self.storage.as_ref(), &options).await?)
    }

    /// Complete the authorization flow: exchange `code` and persist the tokens.
    pub async fn handle_callback(&self, code: &str) -> Result<TokenSet> {
        let tokens =
            ib_auth::exchange_code(&self.http, &self.config, self.storage.as_ref(), code).await?;
        self.storage.store_tokens(&tokens).await?;
        info!("authorization complete, tokens stored");
        Ok(tokens)
    }

    /// Currently stored tokens, if any.
    pub async fn tokens(&self) -> Result<Option<TokenSet>> {
        Ok(self.storage.get_tokens().await?)
    }

    pub async fn discover(&self) -> Result<AuthorizationServerMetadata> {
        Ok(ib_auth::discover(&self.http, &self.config).await?)
    }

    /// Send an authenticated request to `{base_url}/proxy/{path}`.
    ///
    /// Returns the response unchanged on 2xx. A 401 is either terminal
    /// (`SessionExpired`, tokens cleared) or triggers one refresh and one
    /// retry; the retry's outcome is returned as-is, so a second 401 comes
    /// back as `Error::Http`. Any other non-2xx is `Error::Http` with the
    /// status and body.
    #[instrument(skip_all, fields(method = %method, path = %path))]
    pub async fn request(
        &self,
        path: &str,
        method: Method,
        options: &RequestOptions,
    ) -> Result<Response> {
        let mut tokens = self.storage.get_tokens().await?.ok_or(Error::NoTokens)?;

        if let Some(skew) = self.options.refresh_skew {
            let window = u64::try_from(skew.as_millis()).unwrap_or(u64::MAX);
            if tokens.refresh_token.is_some() && tokens.expires_within(window, now_millis()) {
                debug!("access token near expiry, refreshing before dispatch");
                tokens = self.refresh(&tokens).await?;
            }
        }

        let url = self.config.proxy_url(path);
        let response = self
            .send(&url, &method, options, &tokens.access_token)
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return ensure_success(response).await;
        }

        let body = response.text().await.unwrap_or_default();
        if let Unauthorized::SessionExpired { description } =
            classify_unauthorized(&body, &self.options.session_expired_phrase)
        {
            warn!(%description, "session expired, clearing stored tokens");
            metrics::record_session_expired();
            self.storage.clear_tokens().await?;
            return Err(Error::SessionExpired { description });
        }

        info!("access token rejected, refreshing and retrying once");
        let refreshed = self.refresh(&tokens).await?;
        let response = self
            .send(&url, &method, options, &refreshed.access_token)
            .await?;
        ensure_success(response).await
    }

    pub async fn get(&self, path: &str) -> Result<Response> {
        self.request(path, Method::GET, &RequestOptions::default())
            .await
    }

    pub async fn post_json(&self, path: &str, body: serde_json::Value) -> Result<Response> {
        self.request(path, Method::POST, &RequestOptions::new().json(body))
            .await
    }

    /// Forget all credentials and release the HTTP connection pool.
    ///
    /// Clears both storage slots. The pool is dropped before storage is
    /// touched, so it is released even when clearing fails. Clearing empty
    /// slots is not an error.
    pub async fn logout(self) -> Result<()> {
        let Self { storage, http, .. } = self;
        drop(http);

        let tokens = storage.clear_tokens().await;
        let verifier = storage.clear_code_verifier().await;
        tokens?;
        verifier?;
        info!("logged out, stored credentials cleared");
        Ok(())
    }

    async fn send(
        &self,
        url: &str,
        method: &Method,
        options: &RequestOptions,
        access_token: &str,
    ) -> Result<Response> {
        let builder = options.apply(self.http.request(method.clone(), url), access_token)?;
        let response = builder.send().await?;
        let status = response.status().as_u16();
        metrics::record_request(status, method.as_str());
        debug!(status, "proxy responded");
        Ok(response)
    }

    /// Refresh with the refresh token in `current` and persist the result.
    ///
    /// When the server omits a new refresh token the old one is carried
    /// over. Storage is only written on success.
    async fn refresh(&self, current: &TokenSet) -> Result<TokenSet> {
        let Some(refresh_token) = current.refresh_token.as_deref() else {
            warn!("access token rejected but no refresh token is stored");
            metrics::record_refresh(RefreshOutcome::NoRefreshToken);
            return Err(Error::Auth(ib_auth::Error::TokenRefresh {
                message: "no refresh token stored".into(),
                status: None,
                source: None,
            }));
        };

        let mut tokens =
            match ib_auth::refresh_tokens(&self.http, &self.config, refresh_token).await {
                Ok(tokens) => tokens,
                Err(e) => {
                    warn!(error = %e, "token refresh failed, stored tokens left in place");
                    metrics::record_refresh(RefreshOutcome::Failure);
                    return Err(e.into());
                }
            };
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token.to_string());
        }

        self.storage.store_tokens(&tokens).await?;
        metrics::record_refresh(RefreshOutcome::Success);
        info!("access token refreshed");
        Ok(tokens)
    }
}

/// Pass 2xx responses through; turn anything else into `Error::Http`.
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Http {
        status: status.as_u16(),
        body,
    })
}
