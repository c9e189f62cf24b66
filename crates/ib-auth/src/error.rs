//! Error types for OAuth authentication operations

use crate::token::OAuthErrorResponse;

/// Errors from OAuth authentication operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Authorization code exchange failed. `status` is absent when the request
    /// never produced a response; `oauth_error` carries the server's
    /// `{error, error_description}` body when it sent one.
    #[error("token exchange failed: {message}")]
    TokenExchange {
        message: String,
        status: Option<u16>,
        oauth_error: Option<OAuthErrorResponse>,
    },

    /// Refresh-token exchange failed. `source` holds the transport error when
    /// the token endpoint could not be reached.
    #[error("token refresh failed: {message}")]
    TokenRefresh {
        message: String,
        status: Option<u16>,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("metadata discovery failed: {0}")]
    Discovery(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Build a refresh error that has no underlying transport cause.
    pub(crate) fn refresh(message: impl Into<String>, status: Option<u16>) -> Self {
        Error::TokenRefresh {
            message: message.into(),
            status,
            source: None,
        }
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_exchange_display_uses_message() {
        let err = Error::TokenExchange {
            message: "token endpoint returned 400 Bad Request".into(),
            status: Some(400),
            oauth_error: None,
        };
        assert_eq!(
            err.to_string(),
            "token exchange failed: token endpoint returned 400 Bad Request"
        );
    }

    #[test]
    fn refresh_without_cause_has_no_source() {
        use std::error::Error as _;
        let err = Error::refresh("no refresh token stored", None);
        assert!(err.source().is_none());
        assert!(err.to_string().contains("no refresh token stored"));
    }
}
