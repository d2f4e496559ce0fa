//! Storage abstraction over `object_store`.
//!
//! Sources are read and failure logs are written through a
//! [`StorageProvider`]. Local paths, `file://` URIs and `memory://` stores are
//! supported.

mod local;
mod memory;

use bytes::Bytes;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use regex::Regex;
use snafu::prelude::*;
use std::borrow::Cow;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use crate::emit;
use crate::error::{InvalidUrlSnafu, ObjectStoreSnafu, StorageError};
use crate::metrics::events::{
    RequestStatus, StorageOperation, StorageRequest, StorageRequestDuration,
};

pub use local::LocalConfig;
pub use memory::MemoryConfig;

/// A reference-counted storage provider.
pub type StorageProviderRef = Arc<StorageProvider>;

/// Storage provider that abstracts over the supported backends.
#[derive(Clone)]
pub struct StorageProvider {
    pub(crate) config: BackendConfig,
    pub(crate) object_store: Arc<dyn ObjectStore>,
    pub(crate) canonical_url: String,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

// URL patterns for the supported backends
const FILE_URI: &str = r"^file://(?P<path>.*)$";
const FILE_URL: &str = r"^file:(?P<path>.*)$";
const FILE_PATH: &str = r"^/(?P<path>.*)$";

const MEMORY_URL: &str = r"^memory://(?P<key>.*)$";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Local,
    Memory,
}

fn matchers() -> &'static [(Backend, Vec<Regex>)] {
    static MATCHERS: OnceLock<Vec<(Backend, Vec<Regex>)>> = OnceLock::new();
    MATCHERS.get_or_init(|| {
        vec![
            (Backend::Memory, vec![Regex::new(MEMORY_URL).unwrap()]),
            (
                Backend::Local,
                vec![
                    Regex::new(FILE_URI).unwrap(),
                    Regex::new(FILE_URL).unwrap(),
                    Regex::new(FILE_PATH).unwrap(),
                ],
            ),
        ]
    })
}

/// Backend configuration enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Local(LocalConfig),
    Memory(MemoryConfig),
}

impl BackendConfig {
    /// Parse a URL into a backend configuration.
    ///
    /// With `with_key`, the last path segment is split off as the object key
    /// and the store is rooted at its parent. Relative paths are resolved
    /// against the working directory.
    pub fn parse_url(url: &str, with_key: bool) -> Result<Self, StorageError> {
        for (backend, regexes) in matchers() {
            if let Some(matches) = regexes.iter().find_map(|r| r.captures(url)) {
                return match backend {
                    Backend::Local => Self::parse_local(matches, with_key),
                    Backend::Memory => Ok(Self::parse_memory(matches)),
                };
            }
        }

        if !url.is_empty()
            && !url.contains("://")
            && let Ok(absolute) = std::path::absolute(url)
            && absolute.is_absolute()
        {
            return Self::parse_url(&absolute.to_string_lossy(), with_key);
        }

        InvalidUrlSnafu {
            url: url.to_string(),
        }
        .fail()
    }

    fn parse_local(matches: regex::Captures, with_key: bool) -> Result<Self, StorageError> {
        let path = matches.name("path").map_or("", |m| m.as_str());

        let mut path = if !path.starts_with('/') {
            std::path::PathBuf::from(format!("/{path}"))
        } else {
            std::path::PathBuf::from(path)
        };

        let key = if with_key {
            let key = path
                .file_name()
                .map(|k| Path::from(k.to_string_lossy().as_ref()));
            path.pop();
            key
        } else {
            None
        };

        Ok(BackendConfig::Local(LocalConfig {
            path: path.to_string_lossy().into_owned(),
            key,
        }))
    }

    fn parse_memory(matches: regex::Captures) -> Self {
        let key = matches
            .name("key")
            .map(|m| m.as_str())
            .filter(|k| !k.is_empty())
            .map(Path::from);
        BackendConfig::Memory(MemoryConfig { key })
    }

    pub(crate) fn key(&self) -> Option<&Path> {
        match self {
            BackendConfig::Local(local) => local.key.as_ref(),
            BackendConfig::Memory(memory) => memory.key.as_ref(),
        }
    }
}

impl StorageProvider {
    /// Create a storage provider rooted at `url`.
    pub async fn for_url(url: &str) -> Result<Self, StorageError> {
        Self::construct(BackendConfig::parse_url(url, false)?).await
    }

    /// Create a storage provider for the single object at `url`.
    ///
    /// The object is addressed by [`get_object`](Self::get_object).
    pub async fn for_object(url: &str) -> Result<Self, StorageError> {
        Self::construct(BackendConfig::parse_url(url, true)?).await
    }

    async fn construct(config: BackendConfig) -> Result<Self, StorageError> {
        match config {
            BackendConfig::Local(config) => Self::construct_local(config).await,
            BackendConfig::Memory(config) => Ok(Self::construct_memory(config)),
        }
    }

    /// Get the contents of a file.
    pub async fn get(&self, path: impl Into<Path>) -> Result<Bytes, StorageError> {
        let path = path.into();
        let start = Instant::now();
        let result = match self.object_store.get(&self.qualify_path(&path)).await {
            Ok(response) => response.bytes().await,
            Err(e) => Err(e),
        };

        emit!(StorageRequest {
            operation: StorageOperation::Get,
            status: RequestStatus::of(&result),
        });
        emit!(StorageRequestDuration {
            operation: StorageOperation::Get,
            duration: start.elapsed(),
        });

        result.context(ObjectStoreSnafu)
    }

    /// Get the contents of the object this provider was opened on.
    pub async fn get_object(&self) -> Result<Bytes, StorageError> {
        self.get(Path::default()).await
    }

    /// Put bytes to a path.
    pub async fn put(&self, path: impl Into<Path>, bytes: Vec<u8>) -> Result<(), StorageError> {
        let path = path.into();
        self.put_payload(&path, PutPayload::from(Bytes::from(bytes)))
            .await
    }

    /// Put a payload to a path, replacing any existing object.
    pub async fn put_payload(&self, path: &Path, payload: PutPayload) -> Result<(), StorageError> {
        let path = self.qualify_path(path);
        let start = Instant::now();
        let result = self.object_store.put(&path, payload).await;

        emit!(StorageRequest {
            operation: StorageOperation::Put,
            status: RequestStatus::of(&result),
        });
        emit!(StorageRequestDuration {
            operation: StorageOperation::Put,
            duration: start.elapsed(),
        });

        result.context(ObjectStoreSnafu)?;
        Ok(())
    }

    /// Qualify a path with the configured key prefix.
    pub fn qualify_path<'a>(&self, path: &'a Path) -> Cow<'a, Path> {
        match self.config.key() {
            Some(prefix) => Cow::Owned(prefix.parts().chain(path.parts()).collect()),
            None => Cow::Borrowed(path),
        }
    }

    /// Get the backend configuration.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_local_url_parsing() {
        let config = BackendConfig::parse_url("/local/path/to/data", false).unwrap();
        match config {
            BackendConfig::Local(local) => {
                assert_eq!(local.path, "/local/path/to/data");
                assert_eq!(local.key, None);
            }
            _ => panic!("Expected Local config"),
        }
    }

    #[test]
    fn test_file_uri_parsing_with_key() {
        let config = BackendConfig::parse_url("file:///data/in/countries.csv", true).unwrap();
        match config {
            BackendConfig::Local(local) => {
                assert_eq!(local.path, "/data/in");
                assert_eq!(local.key, Some(Path::from("countries.csv")));
            }
            _ => panic!("Expected Local config"),
        }
    }

    #[test]
    fn test_relative_path_is_resolved() {
        let config = BackendConfig::parse_url("data/countries.csv", true).unwrap();
        match config {
            BackendConfig::Local(local) => {
                assert!(local.path.starts_with('/'));
                assert!(local.path.ends_with("data"));
                assert_eq!(local.key, Some(Path::from("countries.csv")));
            }
            _ => panic!("Expected Local config"),
        }
    }

    #[test]
    fn test_memory_url_parsing() {
        let config = BackendConfig::parse_url("memory://", false).unwrap();
        assert_eq!(config, BackendConfig::Memory(MemoryConfig { key: None }));
    }

    #[test]
    fn test_unsupported_url_is_rejected() {
        let err = BackendConfig::parse_url("s3://bucket/key.csv", false).unwrap_err();
        assert!(matches!(err, StorageError::InvalidUrl { .. }));
        assert!(BackendConfig::parse_url("", false).is_err());
    }

    #[tokio::test]
    async fn test_memory_put_get_roundtrip() {
        let storage = StorageProvider::for_url("memory://").await.unwrap();
        storage.put("roundtrip/b.csv", b"x,y\n".to_vec()).await.unwrap();
        let bytes = storage.get("roundtrip/b.csv").await.unwrap();
        assert_eq!(bytes.as_ref(), b"x,y\n");
    }

    #[tokio::test]
    async fn test_memory_providers_share_one_store() {
        let fixtures = StorageProvider::for_url("memory://shared-fixtures")
            .await
            .unwrap();
        fixtures.put("in.csv", b"a\n1\n".to_vec()).await.unwrap();

        let object = StorageProvider::for_object("memory://shared-fixtures/in.csv")
            .await
            .unwrap();
        assert_eq!(object.get_object().await.unwrap().as_ref(), b"a\n1\n");

        let missing = StorageProvider::for_object("memory://shared-fixtures/other.csv")
            .await
            .unwrap();
        assert!(missing.get_object().await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_get_object_reads_the_named_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("countries.csv");
        std::fs::write(&file, b"Code,Country\nGER,Germany\n").unwrap();

        let storage = StorageProvider::for_object(file.to_str().unwrap())
            .await
            .unwrap();
        let bytes = storage.get_object().await.unwrap();
        assert_eq!(bytes.as_ref(), b"Code,Country\nGER,Germany\n");
        assert!(storage.canonical_url().ends_with("/countries.csv"));
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("missing.csv");

        let storage = StorageProvider::for_object(file.to_str().unwrap())
            .await
            .unwrap();
        let err = storage.get_object().await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_for_url_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("nested/dlq");

        let storage = StorageProvider::for_url(dir.to_str().unwrap()).await.unwrap();
        let payload = PutPayload::from(Bytes::from_static(b"{}\n"));
        storage
            .put_payload(&Path::from("f.ndjson"), payload)
            .await
            .unwrap();
        assert_eq!(std::fs::read(dir.join("f.ndjson")).unwrap(), b"{}\n");
    }
}
