//! Classification of 401 responses from the proxy
//!
//! A 401 means one of two things. Either the access token expired and a
//! refresh will fix it, or the server ended the session and the refresh token
//! is useless too. The server signals the second case with
//! `error == "invalid_token"` and a description containing a fixed phrase.

use ib_auth::{INVALID_TOKEN_ERROR, OAuthErrorResponse};

/// What to do about a 401.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unauthorized {
    /// Terminal: clear tokens and make the caller re-authenticate.
    SessionExpired { description: String },
    /// Refresh the access token and retry once.
    Refreshable,
}

/// Classify a 401 response body.
///
/// The phrase match is a case-sensitive substring check. An empty phrase
/// never matches, so every 401 takes the refresh path. Bodies that are not
/// OAuth error objects are refreshable.
pub fn classify_unauthorized(body: &str, expired_phrase: &str) -> Unauthorized {
    let Some(error) = OAuthErrorResponse::parse(body) else {
        return Unauthorized::Refreshable;
    };
    if error.error != INVALID_TOKEN_ERROR || expired_phrase.is_empty() {
        return Unauthorized::Refreshable;
    }
    match error.error_description {
        Some(description) if description.contains(expired_phrase) => {
            Unauthorized::SessionExpired { description }
        }
        _ => Unauthorized::Refreshable,
    }
}
