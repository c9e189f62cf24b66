//! Authenticated request dispatcher for the IntelligenceBank OAuth bridge
//!
//! Wraps `ib-auth` in a single `OAuthClient` that owns the configuration, a
//! storage backend and an HTTP client.
//!
//! Request lifecycle:
//! 1. Caller completes the flow via `authorization_url()` + `handle_callback()`
//! 2. `request()` reads the stored token set and sends `Authorization: Bearer`
//! 3. A 401 carrying the session-expired phrase clears tokens (`SessionExpired`)
//! 4. Any other 401 refreshes, persists the new token set, and retries once
//! 5. Other non-2xx statuses come back as `Error::Http` with status and body
//! 6. `logout()` clears storage and releases the connection pool

pub mod client;
pub mod error;
pub mod metrics;
pub mod request;
pub mod session;

pub use client::{ClientOptions, OAuthClient};
pub use error::{Error, Result};
pub use request::{RequestBody, RequestOptions};
pub use session::{Unauthorized, classify_unauthorized};
