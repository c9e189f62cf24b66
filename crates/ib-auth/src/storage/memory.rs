//! In-memory token storage

use tokio::sync::Mutex;
use tracing::debug;

use super::{StorageFuture, TokenStorage, stamped};
use crate::token::TokenSet;

/// Process-local storage. Contents are lost when the value is dropped.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tokens: Mutex<Option<TokenSet>>,
    verifier: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStorage for MemoryStorage {
    fn store_tokens<'a>(&'a self, tokens: &'a TokenSet) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            *self.tokens.lock().await = Some(stamped(tokens));
            debug!("stored token set in memory");
            Ok(())
        })
    }

    fn get_tokens(&self) -> StorageFuture<'_, Option<TokenSet>> {
        Box::pin(async move { Ok(self.tokens.lock().await.clone()) })
    }

    fn clear_tokens(&self) -> StorageFuture<'_, ()> {
        Box::pin(async move {
            self.tokens.lock().await.take();
            Ok(())
        })
    }

    fn store_code_verifier<'a>(&'a self, verifier: &'a str) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            *self.verifier.lock().await = Some(verifier.to_string());
            Ok(())
        })
    }

    fn get_code_verifier(&self) -> StorageFuture<'_, Option<String>> {
        Box::pin(async move { Ok(self.verifier.lock().await.clone()) })
    }

    fn clear_code_verifier(&self) -> StorageFuture<'_, ()> {
        Box::pin(async move {
            self.verifier.lock().await.take();
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_empty() {
        let storage = MemoryStorage::new();
        assert!(storage.get_tokens().await.unwrap().is_none());
        assert!(storage.get_code_verifier().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn store_replaces_previous_set() {
        let storage = MemoryStorage::new();
        storage
            .store_tokens(&TokenSet::bearer("at1", Some("rt1")))
            .await
            .unwrap();
        storage
            .store_tokens(&TokenSet::bearer("at2", None))
            .await
            .unwrap();

        let tokens = storage.get_tokens().await.unwrap().unwrap();
        assert_eq!(tokens.access_token, "at2");
        assert!(tokens.refresh_token.is_none(), "no field survives a replacement");
    }

    #[tokio::test]
    async fn verifier_is_overwritten_not_accumulated() {
        let storage = MemoryStorage::new();
        storage.store_code_verifier("first").await.unwrap();
        storage.store_code_verifier("second").await.unwrap();
        assert_eq!(
            storage.get_code_verifier().await.unwrap().as_deref(),
            Some("second")
        );
    }

    #[tokio::test]
    async fn slots_are_independent() {
        let storage = MemoryStorage::new();
        storage
            .store_tokens(&TokenSet::bearer("at1", None))
            .await
            .unwrap();
        storage.store_code_verifier("v").await.unwrap();

        storage.clear_code_verifier().await.unwrap();
        assert!(storage.get_tokens().await.unwrap().is_some());
        assert!(storage.get_code_verifier().await.unwrap().is_none());
    }
}
