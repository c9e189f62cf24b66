//! Client configuration for the authorization server
//!
//! `OAuthConfig` is validated once at construction and is read-only afterwards.
//! All endpoint URLs are derived from `base_url`, the server root.

use reqwest::Url;
use serde::Deserialize;

use crate::constants::{AUTHORIZE_PATH, DEFAULT_SCOPE, METADATA_PATH, PROXY_PATH, TOKEN_PATH};
use crate::error::{Error, Result};

/// Body encoding for token endpoint requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenRequestFormat {
    /// `application/json` object body (what the server parses)
    #[default]
    Json,
    /// `application/x-www-form-urlencoded` body
    Form,
}

/// OAuth client registration and server location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    client_id: String,
    redirect_uri: String,
    base_url: String,
    scope: String,
    token_request_format: TokenRequestFormat,
}

impl OAuthConfig {
    /// Create a configuration with the default scope and JSON token requests.
    ///
    /// Fails if `client_id` is empty or if `redirect_uri` / `base_url` are not
    /// absolute URLs. A trailing slash on `base_url` is dropped.
    pub fn new(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let client_id = client_id.into();
        let redirect_uri = redirect_uri.into();
        let base_url = base_url.into();

        if client_id.trim().is_empty() {
            return Err(Error::InvalidConfig("client_id must not be empty".into()));
        }
        Url::parse(&redirect_uri)
            .map_err(|e| Error::InvalidConfig(format!("redirect_uri {redirect_uri:?}: {e}")))?;
        let parsed = Url::parse(&base_url)
            .map_err(|e| Error::InvalidConfig(format!("base_url {base_url:?}: {e}")))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(Error::InvalidConfig(format!(
                "base_url must use http or https, got: {base_url}"
            )));
        }

        Ok(Self {
            client_id,
            redirect_uri,
            base_url: base_url.trim_end_matches('/').to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            token_request_format: TokenRequestFormat::default(),
        })
    }

    /// Replace the requested scope. Fails on an empty scope.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Result<Self> {
        let scope = scope.into();
        if scope.trim().is_empty() {
            return Err(Error::InvalidConfig("scope must not be empty".into()));
        }
        self.scope = scope;
        Ok(self)
    }

    pub fn with_token_request_format(mut self, format: TokenRequestFormat) -> Self {
        self.token_request_format = format;
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn token_request_format(&self) -> TokenRequestFormat {
        self.token_request_format
    }

    pub fn authorize_endpoint(&self) -> String {
        format!("{}{AUTHORIZE_PATH}", self.base_url)
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}{TOKEN_PATH}", self.base_url)
    }

    pub fn metadata_endpoint(&self) -> String {
        format!("{}{METADATA_PATH}", self.base_url)
    }

    /// URL of an API call routed through the authenticated passthrough.
    ///
    /// `path` is appended after `/proxy/` as given; a leading slash is ignored.
    pub fn proxy_url(&self, path: &str) -> String {
        format!(
            "{}{PROXY_PATH}/{}",
            self.base_url,
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OAuthConfig {
        OAuthConfig::new("abc", "https://app/cb", "https://auth.test").unwrap()
    }

    #[test]
    fn defaults_scope_and_format() {
        let config = config();
        assert_eq!(config.scope(), "profile");
        assert_eq!(config.token_request_format(), TokenRequestFormat::Json);
    }

    #[test]
    fn endpoints_derive_from_base_url() {
        let config = OAuthConfig::new("abc", "https://app/cb", "https://auth.test/dev/").unwrap();
        assert_eq!(config.base_url(), "https://auth.test/dev");
        assert_eq!(config.authorize_endpoint(), "https://auth.test/dev/authorize");
        assert_eq!(config.token_endpoint(), "https://auth.test/dev/token");
        assert_eq!(
            config.metadata_endpoint(),
            "https://auth.test/dev/.well-known/oauth-authorization-server"
        );
    }

    #[test]
    fn proxy_url_appends_path_verbatim() {
        let config = config();
        assert_eq!(
            config.proxy_url("company.intelligencebank.com/api/3.0.0/users"),
            "https://auth.test/proxy/company.intelligencebank.com/api/3.0.0/users"
        );
        assert_eq!(
            config.proxy_url("/v1/items"),
            "https://auth.test/proxy/v1/items"
        );
    }

    #[test]
    fn rejects_empty_client_id() {
        let err = OAuthConfig::new("  ", "https://app/cb", "https://auth.test").unwrap_err();
        assert!(err.to_string().contains("client_id"), "got: {err}");
    }

    #[test]
    fn rejects_relative_redirect_uri() {
        assert!(OAuthConfig::new("abc", "/callback", "https://auth.test").is_err());
    }

    #[test]
    fn rejects_non_http_base_url() {
        let err = OAuthConfig::new("abc", "https://app/cb", "ftp://auth.test").unwrap_err();
        assert!(err.to_string().contains("http or https"), "got: {err}");
    }

    #[test]
    fn with_scope_rejects_empty() {
        assert!(config().with_scope("").is_err());
        assert_eq!(
            config().with_scope("profile email").unwrap().scope(),
            "profile email"
        );
    }

    #[test]
    fn token_request_format_deserializes_lowercase() {
        let format: TokenRequestFormat = serde_json::from_str("\"form\"").unwrap();
        assert_eq!(format, TokenRequestFormat::Form);
    }
}
