//! Object store access for the track library
//!
//! The library is a flat key-value blob store: audio objects plus one
//! JSON metadata sidecar per track, organized by genre prefix. The
//! pipeline only needs list/get/put/exists; everything richer (the
//! content index, usage bookkeeping) is layered on top.

use async_trait::async_trait;
use longplay_common::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Minimal blob-store contract shared by the remote gateway and the
/// local directory backend. Keys are `/`-separated paths.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// List all keys under a prefix, in ascending key order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Fetch an object's bytes. `NotFound` if the key does not exist.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Store an object, replacing any previous value.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Cheap existence probe.
    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Fetch and deserialize a JSON object.
pub async fn get_json<T: DeserializeOwned>(store: &dyn BlobStore, key: &str) -> Result<T> {
    let bytes = store.get(key).await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::Transport(format!("malformed JSON at {}: {}", key, e)))
}

/// Serialize and store a JSON object.
pub async fn put_json<T: Serialize>(store: &dyn BlobStore, key: &str, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| Error::Transport(format!("failed to encode JSON for {}: {}", key, e)))?;
    store.put(key, &bytes).await
}

/// Directory-backed store for offline runs and tests.
///
/// Keys map directly to paths under the root; listing walks the tree
/// and returns sorted relative paths so query results are stable for
/// a fixed catalogue snapshot.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl BlobStore for FsStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                // A store with no objects yet is an empty catalogue
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let rel = path
                    .strip_prefix(&self.root)
                    .expect("entry under store root");
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!(key, size = bytes.len(), "stored object");
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.path_for(key)).await?)
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    keys: Vec<String>,
}

/// Client for the remote library gateway.
///
/// The gateway exposes the store as plain HTTP: `GET /list?prefix=`,
/// `GET`/`PUT`/`HEAD` on `/o/{key}`, bearer-token auth.
pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl HttpStore {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_token: api_token.into(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/o/{}", self.base_url.trim_end_matches('/'), key)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_token.is_empty() {
            req
        } else {
            req.bearer_auth(&self.api_token)
        }
    }
}

#[async_trait]
impl BlobStore for HttpStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let url = format!("{}/list", self.base_url.trim_end_matches('/'));
        let response = self
            .authorize(self.client.get(&url).query(&[("prefix", prefix)]))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("list {}: {}", prefix, e)))?;

        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "list {} returned {}",
                prefix,
                response.status()
            )));
        }

        let mut body: ListResponse = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("list {}: {}", prefix, e)))?;
        body.keys.sort();
        Ok(body.keys)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .authorize(self.client.get(self.object_url(key)))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("get {}: {}", key, e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound(key.to_string()));
        }
        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "get {} returned {}",
                key,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("get {}: {}", key, e)))?;
        Ok(bytes.to_vec())
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let response = self
            .authorize(self.client.put(self.object_url(key)).body(bytes.to_vec()))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("put {}: {}", key, e)))?;

        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "put {} returned {}",
                key,
                response.status()
            )));
        }
        debug!(key, size = bytes.len(), "uploaded object");
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let response = self
            .authorize(self.client.head(self.object_url(key)))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("head {}: {}", key, e)))?;

        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(Error::Transport(format!(
                "head {} returned {}",
                key, status
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fs_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());

        store
            .put("library/tracks/techno/abc.json", b"{\"x\":1}")
            .await
            .unwrap();
        assert!(store.exists("library/tracks/techno/abc.json").await.unwrap());
        let bytes = store.get("library/tracks/techno/abc.json").await.unwrap();
        assert_eq!(bytes, b"{\"x\":1}");
    }

    #[tokio::test]
    async fn fs_store_get_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());

        let err = store.get("nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(!store.exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn fs_store_list_filters_by_prefix_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());

        store.put("library/tracks/house/b.json", b"{}").await.unwrap();
        store.put("library/tracks/house/a.json", b"{}").await.unwrap();
        store.put("library/tracks/techno/c.json", b"{}").await.unwrap();
        store.put("sessions/s1/plan.json", b"{}").await.unwrap();

        let keys = store.list("library/tracks/").await.unwrap();
        assert_eq!(
            keys,
            vec![
                "library/tracks/house/a.json",
                "library/tracks/house/b.json",
                "library/tracks/techno/c.json",
            ]
        );

        let empty = store.list("missing/").await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn json_helpers_round_trip() {
        #[derive(Debug, PartialEq, Serialize, serde::Deserialize)]
        struct Doc {
            n: u32,
        }

        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());

        put_json(&store, "doc.json", &Doc { n: 7 }).await.unwrap();
        let doc: Doc = get_json(&store, "doc.json").await.unwrap();
        assert_eq!(doc, Doc { n: 7 });
    }
}
