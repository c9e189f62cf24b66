//! File-backed token storage
//!
//! The token set lives in a JSON file at the configured path. The pending PKCE
//! verifier lives next to it in `<path>.pkce` so clearing one slot never
//! touches the other. All writes use atomic temp-file + rename and set 0600
//! permissions, since both files hold credentials.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{StorageFuture, TokenStorage, stamped};
use crate::error::{Error, Result};
use crate::token::TokenSet;

/// On-disk shape of the verifier file.
#[derive(Debug, Serialize, Deserialize)]
struct VerifierFile {
    code_verifier: String,
}

/// Token storage backed by two JSON files.
///
/// The Mutex serializes writers within this process; reads go straight to disk.
pub struct FileStorage {
    tokens_path: PathBuf,
    verifier_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Store tokens at `path` and the verifier at `path` + `.pkce`.
    ///
    /// Nothing is created until the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let tokens_path = path.into();
        let mut verifier_path = tokens_path.clone().into_os_string();
        verifier_path.push(".pkce");
        Self {
            tokens_path,
            verifier_path: PathBuf::from(verifier_path),
            write_lock: Mutex::new(()),
        }
    }

    pub fn tokens_path(&self) -> &Path {
        &self.tokens_path
    }

    pub fn verifier_path(&self) -> &Path {
        &self.verifier_path
    }
}

impl TokenStorage for FileStorage {
    fn store_tokens<'a>(&'a self, tokens: &'a TokenSet) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            write_atomic(&self.tokens_path, &stamped(tokens)).await
        })
    }

    fn get_tokens(&self) -> StorageFuture<'_, Option<TokenSet>> {
        Box::pin(async move { read_json::<TokenSet>(&self.tokens_path).await })
    }

    fn clear_tokens(&self) -> StorageFuture<'_, ()> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            remove_if_exists(&self.tokens_path).await
        })
    }

    fn store_code_verifier<'a>(&'a self, verifier: &'a str) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            let file = VerifierFile {
                code_verifier: verifier.to_string(),
            };
            write_atomic(&self.verifier_path, &file).await
        })
    }

    fn get_code_verifier(&self) -> StorageFuture<'_, Option<String>> {
        Box::pin(async move {
            Ok(read_json::<VerifierFile>(&self.verifier_path)
                .await?
                .map(|f| f.code_verifier))
        })
    }

    fn clear_code_verifier(&self) -> StorageFuture<'_, ()> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            remove_if_exists(&self.verifier_path).await
        })
    }
}

/// Read and parse a JSON file.
///
/// A missing file is an empty slot. A file that exists but does not parse is
/// also treated as empty (with a warning) so a corrupt file forces
/// re-authentication instead of wedging every request.
async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Error::Io(format!(
                "reading {}: {e}",
                path.display()
            )));
        }
    };

    match serde_json::from_str(&contents) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unparseable storage file");
            Ok(None)
        }
    }
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "removed storage file");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(format!("removing {}: {e}", path.display()))),
    }
}

/// Write a value to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target, so a crash mid-write leaves the previous contents intact.
/// Sets file permissions to 0600 (owner read/write only).
async fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| Error::Serialization(format!("serializing {}: {e}", path.display())))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("storage path has no parent directory".into()))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Io("storage path has no file name".into()))?
        .to_string_lossy();

    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp storage file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting storage file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp storage file: {e}")))?;

    debug!(path = %path.display(), "persisted storage file");
    Ok(())
}
