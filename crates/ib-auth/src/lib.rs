//! OAuth 2.0 authorization code + PKCE client library
//!
//! Provides PKCE generation, authorization URL construction, token
//! exchange/refresh, metadata discovery, and pluggable token storage for
//! clients of the IntelligenceBank OAuth bridge. The crate does no request
//! dispatch of its own; `ib-client` builds the authenticated dispatcher on
//! top of it.
//!
//! Authorization flow:
//! 1. Caller builds an `OAuthConfig` (client id, redirect URI, server base URL)
//! 2. `authorize::build_auth_url()` generates `state` and a PKCE pair, stores
//!    the verifier, and returns the URL to send the user to
//! 3. The server redirects back with `code` and `state`; the caller checks `state`
//! 4. `token::exchange_code()` trades the code (plus stored verifier) for tokens
//! 5. Tokens are persisted through a `storage::TokenStorage` backend
//! 6. `token::refresh_tokens()` replaces them when the access token is rejected

pub mod authorize;
pub mod config;
pub mod constants;
pub mod discovery;
pub mod error;
pub mod pkce;
pub mod storage;
pub mod token;

pub use authorize::{AuthUrlOptions, AuthorizationUrl, authorization_url, build_auth_url};
pub use config::{OAuthConfig, TokenRequestFormat};
pub use constants::*;
pub use discovery::{AuthorizationServerMetadata, discover};
pub use error::{Error, Result};
pub use pkce::{PkcePair, compute_challenge, generate_state, generate_verifier, is_valid_verifier};
pub use storage::{FileStorage, MemoryStorage, SqliteStorage, TokenStorage, now_millis};
pub use token::{OAuthErrorResponse, TokenSet, exchange_code, refresh_tokens};
