use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::fs;
use tracing::trace;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("malformed stored document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no document under key {0}")]
    UnknownKey(String),
}

/// Durable key to document map holding opaque serialized records,
/// queryable by indexed field.
///
/// The store is schema-agnostic; callers own the document layout and
/// its (de)serialization.
#[async_trait]
pub trait Store: Send + Sync {
    /// All documents whose `field` equals `value`, keyed by store key.
    async fn query(&self, field: &str, value: &str)
        -> Result<HashMap<String, Vec<u8>>, StoreError>;

    /// Inserts a document, returning the store-assigned key.
    async fn insert(&self, document: &[u8]) -> Result<String, StoreError>;

    /// Replaces the document under an existing key.
    async fn update(&self, key: &str, document: &[u8]) -> Result<(), StoreError>;
}

/// A filesystem backed store keeping one JSON document per key.
///
/// Writes go through a staging file so a crashed write never leaves a
/// half-written document behind. Concurrent use of two stores over the
/// same root is not supported.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn document_path(&self, key: &str) -> PathBuf {
        self.root.join(key).with_extension("json")
    }
}

#[async_trait]
impl Store for FsStore {
    async fn query(
        &self,
        field: &str,
        value: &str,
    ) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(err) => return Err(err.into()),
        };

        let mut matches = HashMap::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let bytes = fs::read(&path).await?;
            // A document that does not parse must surface as an error,
            // not silently vanish from query results.
            let document: Value = serde_json::from_slice(&bytes)?;
            if document.get(field).and_then(Value::as_str) == Some(value) {
                matches.insert(key.to_owned(), bytes);
            }
        }

        Ok(matches)
    }

    async fn insert(&self, document: &[u8]) -> Result<String, StoreError> {
        fs::create_dir_all(&self.root).await?;
        let key = Uuid::new_v4().simple().to_string();
        safe_write(&self.document_path(&key), document).await?;
        trace!(key = %key, "inserted document");
        Ok(key)
    }

    async fn update(&self, key: &str, document: &[u8]) -> Result<(), StoreError> {
        let path = self.document_path(key);
        match fs::metadata(&path).await {
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::UnknownKey(key.to_owned()))
            }
            Err(err) => return Err(err.into()),
        }
        safe_write(&path, document).await?;
        trace!(key = %key, "updated document");
        Ok(())
    }
}

/// Writes through a staging file and renames into place.
pub(crate) async fn safe_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let staged = path.with_extension("tmp");
    fs::write(&staged, bytes).await?;
    fs::rename(&staged, path).await
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;

    fn document(application: &str, local: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "applicationUUID": application,
            "localUUID": local,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn query_returns_only_matching_documents() {
        let root = tempdir().unwrap();
        let store = FsStore::new(root.path());

        let key_a = store.insert(&document("app-1", "AA:BB")).await.unwrap();
        let _key_b = store.insert(&document("app-2", "CC:DD")).await.unwrap();

        let matches = store.query("applicationUUID", "app-1").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[&key_a], document("app-1", "AA:BB"));
    }

    #[tokio::test]
    async fn query_on_missing_root_is_empty() {
        let root = tempdir().unwrap();
        let store = FsStore::new(root.path().join("never-created"));

        let matches = store.query("applicationUUID", "app-1").await.unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn update_replaces_the_stored_document() {
        let root = tempdir().unwrap();
        let store = FsStore::new(root.path());

        let key = store.insert(&document("app-1", "AA:BB")).await.unwrap();
        store.update(&key, &document("app-1", "EE:FF")).await.unwrap();

        let matches = store.query("applicationUUID", "app-1").await.unwrap();
        assert_eq!(matches[&key], document("app-1", "EE:FF"));
    }

    #[tokio::test]
    async fn update_of_unknown_key_fails() {
        let root = tempdir().unwrap();
        let store = FsStore::new(root.path());

        let err = store.update("missing", &document("app-1", "AA:BB")).await;
        assert!(matches!(err, Err(StoreError::UnknownKey(key)) if key == "missing"));
    }

    #[tokio::test]
    async fn corrupt_document_surfaces_as_an_error() {
        let root = tempdir().unwrap();
        let store = FsStore::new(root.path());
        store.insert(&document("app-1", "AA:BB")).await.unwrap();

        std::fs::write(root.path().join("broken.json"), b"not json").unwrap();

        let err = store.query("applicationUUID", "app-1").await;
        assert!(matches!(err, Err(StoreError::Serialization(_))));
    }

    #[tokio::test]
    async fn generated_keys_are_unique() {
        let root = tempdir().unwrap();
        let store = FsStore::new(root.path());

        let one = store.insert(&document("app-1", "AA:BB")).await.unwrap();
        let two = store.insert(&document("app-1", "CC:DD")).await.unwrap();
        assert_ne!(one, two);
    }
}
