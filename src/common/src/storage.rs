use anyhow::{Context, Result};
use object_store::{ObjectStore, aws::AmazonS3Builder, local::LocalFileSystem, memory::InMemory};
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

use crate::config::StorageConfig;

/// Where a storage DSN points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    /// Local directory, relative paths are resolved against the working directory.
    Filesystem(PathBuf),
    /// Process-local in-memory store, mostly useful for tests and dry runs.
    Memory,
    /// S3 or an S3-compatible service such as MinIO.
    S3(Url),
}

impl StorageLocation {
    /// Parse a storage DSN.
    ///
    /// `file:///.data/tsdb` is treated as the relative path `.data/tsdb`,
    /// `file:///var/lib/tsdb` stays absolute.
    pub fn parse(dsn: &str) -> Result<Self> {
        let url =
            Url::parse(dsn).map_err(|e| anyhow::anyhow!("Invalid storage DSN '{dsn}': {e}"))?;

        match url.scheme() {
            "file" => {
                let path = url.path();
                if path.is_empty() || path == "/" {
                    anyhow::bail!("File DSN must specify a path: file:///path/to/storage");
                }
                let path = path.strip_prefix('/').filter(|p| p.starts_with('.')).unwrap_or(path);
                Ok(Self::Filesystem(PathBuf::from(path)))
            }
            "memory" => Ok(Self::Memory),
            "s3" => Ok(Self::S3(url)),
            scheme => anyhow::bail!(
                "Unsupported storage scheme: {scheme}. Supported: file, memory, s3"
            ),
        }
    }
}

/// Create an object store from storage configuration
pub fn create_object_store(storage_config: &StorageConfig) -> Result<Arc<dyn ObjectStore>> {
    create_object_store_from_dsn(&storage_config.dsn)
}

/// Create an object store from a DSN string
pub fn create_object_store_from_dsn(dsn: &str) -> Result<Arc<dyn ObjectStore>> {
    match StorageLocation::parse(dsn)? {
        StorageLocation::Filesystem(root) => {
            // LocalFileSystem canonicalizes its prefix, so the directory has to exist
            std::fs::create_dir_all(&root)
                .with_context(|| format!("Failed to create storage directory {}", root.display()))?;
            let store = LocalFileSystem::new_with_prefix(&root).with_context(|| {
                format!("Failed to open filesystem store at {}", root.display())
            })?;
            Ok(Arc::new(store))
        }
        StorageLocation::Memory => Ok(Arc::new(InMemory::new())),
        StorageLocation::S3(url) => {
            let builder = create_s3_builder_from_dsn(&url)?;
            Ok(Arc::new(builder.build().context("Failed to build S3 client")?))
        }
    }
}

/// Create an S3 builder from a DSN
/// DSN format: s3://[access_key:secret_key@]host[:port]/bucket
pub fn create_s3_builder_from_dsn(dsn: &Url) -> Result<AmazonS3Builder> {
    let host = dsn
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("Missing S3 host in DSN"))?;
    let bucket = dsn.path().trim_start_matches('/');

    if bucket.is_empty() {
        anyhow::bail!("S3 DSN must specify a bucket: s3://host/bucket");
    }

    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(bucket)
        .with_region("us-east-1");

    let access_key = dsn.username();
    if access_key.is_empty() {
        if let Ok(env_key) = std::env::var("AWS_ACCESS_KEY_ID") {
            builder = builder.with_access_key_id(env_key);
        }
        if let Ok(env_secret) = std::env::var("AWS_SECRET_ACCESS_KEY") {
            builder = builder.with_secret_access_key(env_secret);
        }
        if let Ok(env_region) = std::env::var("AWS_DEFAULT_REGION") {
            builder = builder.with_region(env_region);
        }
    } else {
        builder = builder
            .with_access_key_id(access_key)
            .with_secret_access_key(dsn.password().unwrap_or(""));
    }

    // Anything that is not AWS proper is an S3-compatible service on a custom endpoint
    if !host.contains("amazonaws.com") {
        let port = dsn.port();
        let scheme = if port == Some(443) { "https" } else { "http" };
        let endpoint = match port {
            Some(p) => format!("{scheme}://{host}:{p}"),
            None => format!("{scheme}://{host}"),
        };
        builder = builder
            .with_endpoint(endpoint)
            .with_allow_http(true)
            .with_virtual_hosted_style_request(false);
    }

    Ok(builder)
}
