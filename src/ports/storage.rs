use crate::error::PortError;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoragePort: Send + Sync {
    /// Verify the bucket is reachable before doing any work
    async fn check(&self, bucket: &str) -> Result<(), PortError>;

    /// Read a whole object into memory
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, PortError>;

    /// Write a whole object from memory
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), PortError>;

    /// Download a file from storage to a local path
    async fn download(&self, bucket: &str, key: &str, local_path: &Path)
        -> Result<(), PortError>;

    /// Upload a file from a local path to storage
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), PortError>;

    /// Keys under `prefix`, in ascending order
    async fn list_by_prefix(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, PortError>;
}
