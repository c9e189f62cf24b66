//! Token storage contract
//!
//! Storage holds two slots: the current `TokenSet` and the pending PKCE
//! verifier. It is the single source of truth for both; callers never cache a
//! token set between requests. Three backends ship with the crate:
//! `MemoryStorage`, `FileStorage`, and `SqliteStorage`.
//!
//! Writes are full replacements. No backend offers read-modify-write
//! transactions, so concurrent refreshes against one storage race (last
//! writer wins). Callers running several requests in flight against the same
//! storage must serialize refreshes themselves.

mod file;
mod memory;
mod sqlite;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::token::TokenSet;

/// Boxed future returned by storage operations.
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Durable persistence for token sets and the ephemeral PKCE verifier.
///
/// Uses `Pin<Box<dyn Future>>` return types so clients can hold an
/// `Arc<dyn TokenStorage>` and pick the backend at runtime.
pub trait TokenStorage: Send + Sync {
    /// Replace the stored token set. Implementations stamp `stored_at`.
    fn store_tokens<'a>(&'a self, tokens: &'a TokenSet) -> StorageFuture<'a, ()>;

    /// Current token set, or `None` if the client is unauthenticated.
    fn get_tokens(&self) -> StorageFuture<'_, Option<TokenSet>>;

    /// Remove the token set. Clearing an empty slot is not an error.
    fn clear_tokens(&self) -> StorageFuture<'_, ()>;

    /// Replace the pending verifier. At most one verifier is held at a time.
    fn store_code_verifier<'a>(&'a self, verifier: &'a str) -> StorageFuture<'a, ()>;

    fn get_code_verifier(&self) -> StorageFuture<'_, Option<String>>;

    /// Remove the pending verifier. Clearing an empty slot is not an error.
    fn clear_code_verifier(&self) -> StorageFuture<'_, ()>;
}

/// Copy of `tokens` stamped with the current time.
pub(crate) fn stamped(tokens: &TokenSet) -> TokenSet {
    TokenSet {
        stored_at: Some(now_millis()),
        ..tokens.clone()
    }
}

/// Current unix time in milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamped_sets_stored_at_and_keeps_tokens() {
        let tokens = TokenSet::bearer("at1", Some("rt1"));
        let before = now_millis();
        let stamped = stamped(&tokens);
        assert_eq!(stamped.access_token, "at1");
        assert_eq!(stamped.refresh_token.as_deref(), Some("rt1"));
        assert!(stamped.stored_at.unwrap() >= before);
        assert!(tokens.stored_at.is_none());
    }

    #[tokio::test]
    async fn backends_are_interchangeable_behind_dyn() {
        let dir = tempfile::tempdir().unwrap();
        let backends: Vec<Box<dyn TokenStorage>> = vec![
            Box::new(MemoryStorage::new()),
            Box::new(FileStorage::new(dir.path().join("tokens.json"))),
            Box::new(SqliteStorage::open_in_memory("default").unwrap()),
        ];

        for storage in backends {
            storage
                .store_tokens(&TokenSet::bearer("at1", Some("rt1")))
                .await
                .unwrap();
            storage.store_code_verifier("v1").await.unwrap();

            let tokens = storage.get_tokens().await.unwrap().unwrap();
            assert_eq!(tokens.access_token, "at1");
            assert!(tokens.stored_at.is_some());
            assert_eq!(storage.get_code_verifier().await.unwrap().as_deref(), Some("v1"));

            storage.clear_tokens().await.unwrap();
            storage.clear_code_verifier().await.unwrap();
            storage.clear_tokens().await.unwrap();
            storage.clear_code_verifier().await.unwrap();
            assert!(storage.get_tokens().await.unwrap().is_none());
            assert!(storage.get_code_verifier().await.unwrap().is_none());
        }
    }
}
