//! Remote object-store backends for reference targets.
//!
//! Reference targets are URLs (`gs://bucket/object`, `s3://...`,
//! `https://...`) or plain paths resolved against a base directory. Backends
//! are built lazily per bucket/authority and cached for the lifetime of the
//! store, so a manifest spanning many objects in one bucket shares a single
//! client.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use object_store::aws::AmazonS3Builder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::http::HttpBuilder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use url::Url;

use crate::error::{KerchunkError, Result};

/// Protocol applied to reference targets that carry no scheme of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteProtocol {
    /// Google Cloud Storage.
    Gcs,
    /// Amazon S3 (or an S3-compatible endpoint).
    S3,
    /// Plain HTTP(S).
    Http,
    /// The local filesystem.
    Local,
}

impl RemoteProtocol {
    /// Get the protocol name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gcs => "gcs",
            Self::S3 => "s3",
            Self::Http => "http",
            Self::Local => "local",
        }
    }
}

impl std::str::FromStr for RemoteProtocol {
    type Err = KerchunkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gcs" | "gs" => Ok(Self::Gcs),
            "s3" => Ok(Self::S3),
            "http" | "https" => Ok(Self::Http),
            "local" | "file" => Ok(Self::Local),
            other => Err(KerchunkError::UnsupportedTarget(format!(
                "unknown remote protocol: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for RemoteProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration for resolving reference targets.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Protocol assumed for scheme-less targets.
    pub protocol: RemoteProtocol,
    /// Base directory for relative local targets, typically the directory
    /// holding the manifest.
    pub base_dir: PathBuf,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            protocol: RemoteProtocol::Gcs,
            base_dir: PathBuf::from("."),
        }
    }
}

impl RemoteConfig {
    pub fn new(protocol: RemoteProtocol, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            protocol,
            base_dir: base_dir.into(),
        }
    }
}

/// Maps reference targets to object-store backends, caching one backend per
/// bucket or authority.
pub(crate) struct RemoteRouter {
    config: RemoteConfig,
    stores: Mutex<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl RemoteRouter {
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            config,
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a target to a backend and the object path within it.
    pub fn resolve(&self, target: &str) -> Result<(Arc<dyn ObjectStore>, ObjectPath)> {
        if target.contains("://") {
            let url = Url::parse(target)
                .map_err(|e| KerchunkError::UnsupportedTarget(format!("{target}: {e}")))?;
            return self.resolve_url(&url);
        }

        // Scheme-less target: interpret per the configured default protocol.
        match self.config.protocol {
            RemoteProtocol::Local => {
                let root = format!("file://{}", self.config.base_dir.display());
                let store = self.store_for(&root, || {
                    Ok(Arc::new(LocalFileSystem::new_with_prefix(
                        &self.config.base_dir,
                    )?))
                })?;
                Ok((store, ObjectPath::from(target)))
            }
            RemoteProtocol::Gcs => self.resolve(&format!("gs://{target}")),
            RemoteProtocol::S3 => self.resolve(&format!("s3://{target}")),
            RemoteProtocol::Http => Err(KerchunkError::UnsupportedTarget(format!(
                "http targets must be absolute URLs: {target}"
            ))),
        }
    }

    fn resolve_url(&self, url: &Url) -> Result<(Arc<dyn ObjectStore>, ObjectPath)> {
        let target = url.as_str();
        let bucket = url.host_str().unwrap_or_default().to_string();
        let key = url.path().trim_start_matches('/').to_string();

        match url.scheme() {
            "gs" => {
                let root = format!("gs://{bucket}");
                let store = self.store_for(&root, || {
                    Ok(Arc::new(
                        GoogleCloudStorageBuilder::from_env()
                            .with_bucket_name(&bucket)
                            .build()?,
                    ))
                })?;
                Ok((store, ObjectPath::from(key.as_str())))
            }
            "s3" => {
                let root = format!("s3://{bucket}");
                let store = self.store_for(&root, || {
                    Ok(Arc::new(
                        AmazonS3Builder::from_env()
                            .with_bucket_name(&bucket)
                            .build()?,
                    ))
                })?;
                Ok((store, ObjectPath::from(key.as_str())))
            }
            "http" | "https" => {
                let root = target[..target.len() - url.path().len()].to_string();
                let store = self.store_for(&root, || {
                    Ok(Arc::new(HttpBuilder::new().with_url(&root).build()?))
                })?;
                Ok((store, ObjectPath::from(key.as_str())))
            }
            "file" => {
                let path = url.to_file_path().map_err(|()| {
                    KerchunkError::UnsupportedTarget(format!("invalid file URL: {target}"))
                })?;
                let store = self.store_for("file://", || Ok(Arc::new(LocalFileSystem::new())))?;
                let object_path = ObjectPath::from_absolute_path(&path).map_err(|e| {
                    KerchunkError::UnsupportedTarget(format!("{}: {e}", path.display()))
                })?;
                Ok((store, object_path))
            }
            other => Err(KerchunkError::UnsupportedTarget(format!(
                "unsupported scheme {other}: {target}"
            ))),
        }
    }

    /// Fetch or build the cached backend for a root.
    fn store_for<F>(&self, root: &str, build: F) -> Result<Arc<dyn ObjectStore>>
    where
        F: FnOnce() -> std::result::Result<Arc<dyn ObjectStore>, object_store::Error>,
    {
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(store) = stores.get(root) {
            return Ok(store.clone());
        }

        tracing::debug!(root, "Building object store backend");
        let store = build().map_err(|e| KerchunkError::remote(root, e))?;
        stores.insert(root.to_string(), store.clone());
        Ok(store)
    }
}

impl std::fmt::Debug for RemoteRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteRouter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_protocol_from_str() {
        assert_eq!(RemoteProtocol::from_str("gcs").unwrap(), RemoteProtocol::Gcs);
        assert_eq!(RemoteProtocol::from_str("gs").unwrap(), RemoteProtocol::Gcs);
        assert_eq!(RemoteProtocol::from_str("S3").unwrap(), RemoteProtocol::S3);
        assert_eq!(
            RemoteProtocol::from_str("file").unwrap(),
            RemoteProtocol::Local
        );
        assert!(RemoteProtocol::from_str("ftp").is_err());
    }

    #[test]
    fn test_resolve_local_relative_target() {
        let dir = tempfile::tempdir().unwrap();
        let router = RemoteRouter::new(RemoteConfig::new(RemoteProtocol::Local, dir.path()));

        let (_store, path) = router.resolve("blobs/data.bin").unwrap();
        assert_eq!(path.as_ref(), "blobs/data.bin");
    }

    #[test]
    fn test_resolve_rejects_unknown_scheme() {
        let router = RemoteRouter::new(RemoteConfig::default());
        assert!(router.resolve("ftp://host/file").is_err());
    }

    #[test]
    fn test_backend_cached_per_root() {
        let dir = tempfile::tempdir().unwrap();
        let router = RemoteRouter::new(RemoteConfig::new(RemoteProtocol::Local, dir.path()));

        let (a, _) = router.resolve("one.bin").unwrap();
        let (b, _) = router.resolve("two.bin").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
