//! Error types for the authenticated client

/// Errors from `OAuthClient` operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Storage holds no token set. The authorization flow must be completed
    /// before calling authenticated endpoints.
    #[error("not authenticated: no tokens in storage")]
    NoTokens,

    /// The server reported that the session behind the refresh token is gone.
    /// Stored tokens have already been cleared.
    #[error("session expired: {description}")]
    SessionExpired { description: String },

    /// Code exchange, refresh, discovery or storage failure.
    #[error(transparent)]
    Auth(#[from] ib_auth::Error),

    #[error("request failed with status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            Error::Auth(ib_auth::Error::TokenExchange { status, .. })
            | Error::Auth(ib_auth::Error::TokenRefresh { status, .. }) => *status,
            Error::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the caller has to run the authorization flow again.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(self, Error::NoTokens | Error::SessionExpired { .. })
    }

    pub fn is_refresh_failure(&self) -> bool {
        matches!(self, Error::Auth(ib_auth::Error::TokenRefresh { .. }))
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_exposes_status() {
        let err = Error::Http {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.to_string(), "request failed with status 500: boom");
        assert!(!err.requires_reauthentication());
    }

    #[test]
    fn refresh_failure_is_classified() {
        let err = Error::from(ib_auth::Error::TokenRefresh {
            message: "token endpoint returned 400".into(),
            status: Some(400),
            source: None,
        });
        assert!(err.is_refresh_failure());
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.to_string(), "token refresh failed: token endpoint returned 400");
    }

    #[test]
    fn reauthentication_errors() {
        assert!(Error::NoTokens.requires_reauthentication());
        assert!(
            Error::SessionExpired {
                description: "Session has expired".into()
            }
            .requires_reauthentication()
        );
        assert!(!Error::InvalidRequest("bad header".into()).requires_reauthentication());
    }
}
