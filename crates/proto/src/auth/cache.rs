use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A cached Xbox Live user token, stored as one JSON file per profile.
///
/// The contents are opaque to the session pipeline; only the identity
/// provider interprets them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CachedUserToken {
    #[serde(rename = "userToken")]
    pub user_token: String,
    #[serde(rename = "userHash")]
    pub user_hash: String,
    #[serde(rename = "notAfter")]
    pub not_after: String,
    #[serde(rename = "obtainedOn")]
    pub obtained_on: u64,
}

/// On-disk cache for Xbox Live user tokens.
///
/// Multiple sessions may share a profile folder; writes are serialised
/// through an in-process guard.
pub struct TokenCache {
    directory: PathBuf,
    write_guard: Mutex<()>,
}

impl TokenCache {
    /// Opens a cache in the given tokens directory, creating it if needed.
    pub fn new(directory: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;

        Ok(Self { directory, write_guard: Mutex::new(()) })
    }

    fn file_for(&self, email: &str) -> PathBuf {
        let digest = Sha256::digest(email.as_bytes());
        let mut name = String::with_capacity(digest.len() * 2 + 20);
        for byte in digest {
            name.push_str(&format!("{byte:02x}"));
        }
        name.push_str("_xbl-user-cache.json");

        self.directory.join(name)
    }

    /// The path of the cache file for an account, mainly for diagnostics.
    pub fn path_for(&self, email: &str) -> PathBuf {
        self.file_for(email)
    }

    /// Loads the cached token for an account, if one exists.
    pub fn load(&self, email: &str) -> anyhow::Result<Option<CachedUserToken>> {
        let path = self.file_for(email);
        if !Path::exists(&path) {
            return Ok(None);
        }

        let contents = std::fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&contents)?))
    }

    /// Stores the token for an account, replacing any previous one.
    pub fn store(&self, email: &str, token: &CachedUserToken) -> anyhow::Result<()> {
        let _guard = self.write_guard.lock();

        let path = self.file_for(email);
        let contents = serde_json::to_vec_pretty(token)?;
        std::fs::write(&path, contents)?;

        Ok(())
    }

    /// Removes the token for an account.
    pub fn evict(&self, email: &str) -> anyhow::Result<()> {
        let _guard = self.write_guard.lock();

        let path = self.file_for(email);
        if Path::exists(&path) {
            std::fs::remove_file(&path)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("basalt-token-cache-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn store_and_load() {
        let cache = TokenCache::new(temp_dir("store")).unwrap();
        let token = CachedUserToken {
            user_token: "token".to_owned(),
            user_hash: "hash".to_owned(),
            not_after: "2030-01-01T00:00:00Z".to_owned(),
            obtained_on: 1_700_000_000,
        };

        assert_eq!(cache.load("steve@example.com").unwrap(), None);

        cache.store("steve@example.com", &token).unwrap();
        assert_eq!(cache.load("steve@example.com").unwrap(), Some(token));
    }

    #[test]
    fn file_name_hashes_the_email() {
        let cache = TokenCache::new(temp_dir("name")).unwrap();
        let path = cache.path_for("steve@example.com");
        let name = path.file_name().unwrap().to_str().unwrap();

        assert!(name.ends_with("_xbl-user-cache.json"));
        assert!(!name.contains("steve"));
        // 32 bytes of SHA-256 as hex.
        assert_eq!(name.len(), 64 + "_xbl-user-cache.json".len());
    }

    #[test]
    fn evict_removes_the_file() {
        let cache = TokenCache::new(temp_dir("evict")).unwrap();
        let token = CachedUserToken {
            user_token: "token".to_owned(),
            user_hash: "hash".to_owned(),
            not_after: "2030-01-01T00:00:00Z".to_owned(),
            obtained_on: 0,
        };

        cache.store("alex@example.com", &token).unwrap();
        cache.evict("alex@example.com").unwrap();
        assert_eq!(cache.load("alex@example.com").unwrap(), None);
    }
}
