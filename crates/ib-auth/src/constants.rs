//! IntelligenceBank OAuth constants
//!
//! Wire-level names and defaults shared by the authorization URL builder,
//! the token exchanger, and the request dispatcher.

/// Public client ID pre-registered on the authorization server.
/// Clients without their own registration can use it with any of the
/// server's allowed redirect URIs.
pub const WELL_KNOWN_CLIENT_ID: &str = "mcp-public-client";

/// Scope requested when the configuration does not name one.
pub const DEFAULT_SCOPE: &str = "profile";

/// Path of the authorization endpoint, relative to the server root.
pub const AUTHORIZE_PATH: &str = "/authorize";

/// Path of the token endpoint (code exchange and refresh).
pub const TOKEN_PATH: &str = "/token";

/// Path prefix of the authenticated API passthrough.
pub const PROXY_PATH: &str = "/proxy";

/// RFC 8414 authorization server metadata document.
pub const METADATA_PATH: &str = "/.well-known/oauth-authorization-server";

/// The only PKCE challenge method supported. `plain` is never sent.
pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// Extra authorization parameter naming the IntelligenceBank platform to sign in to.
pub const PLATFORM_URL_PARAM: &str = "platform_url";

/// `error` value the proxy returns on 401 responses.
pub const INVALID_TOKEN_ERROR: &str = "invalid_token";

/// `error_description` fragment the server uses when the refresh window itself
/// has closed. Matched as a substring; override through the client options if
/// the server wording changes.
pub const SESSION_EXPIRED_PHRASE: &str = "Session has expired";

/// Token type assumed when the server omits `token_type`.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";
