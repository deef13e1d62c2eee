//! Object store on the local filesystem: one directory per bucket under a root.

use crate::error::PortError;
use crate::ports::storage::StoragePort;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};

#[derive(Clone, Debug)]
pub struct FsAdapter {
    root: PathBuf,
}

impl FsAdapter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `bucket/key` under the root, refusing anything that escapes it.
    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, PortError> {
        let mut path = self.bucket_path(bucket)?;
        let relative = Path::new(key);
        if key.is_empty() || !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(format!("invalid object key: {:?}", key).into());
        }
        path.push(relative);
        Ok(path)
    }

    fn bucket_path(&self, bucket: &str) -> Result<PathBuf, PortError> {
        let valid = !bucket.is_empty()
            && matches!(
                Path::new(bucket).components().collect::<Vec<_>>().as_slice(),
                [Component::Normal(_)]
            );
        if !valid {
            return Err(format!("invalid bucket name: {:?}", bucket).into());
        }
        Ok(self.root.join(bucket))
    }
}

async fn ensure_parent(path: &Path) -> Result<(), PortError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

#[async_trait]
impl StoragePort for FsAdapter {
    async fn check(&self, bucket: &str) -> Result<(), PortError> {
        let path = self.bucket_path(bucket)?;
        tokio::fs::create_dir_all(&path).await?;
        let meta = tokio::fs::metadata(&path).await?;
        if meta.permissions().readonly() {
            return Err(format!("bucket directory {} is read-only", path.display()).into());
        }
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, PortError> {
        let path = self.object_path(bucket, key)?;
        Ok(Bytes::from(tokio::fs::read(path).await?))
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        _content_type: &str,
    ) -> Result<(), PortError> {
        let path = self.object_path(bucket, key)?;
        ensure_parent(&path).await?;
        tokio::fs::write(path, &body).await?;
        Ok(())
    }

    async fn download(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), PortError> {
        let path = self.object_path(bucket, key)?;
        if path != local_path {
            ensure_parent(local_path).await?;
            tokio::fs::copy(&path, local_path).await?;
        }
        Ok(())
    }

    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), PortError> {
        let path = self.object_path(bucket, key)?;
        if path != local_path {
            ensure_parent(&path).await?;
            tokio::fs::copy(local_path, &path).await?;
        }
        Ok(())
    }

    async fn list_by_prefix(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, PortError> {
        let bucket_root = self.bucket_path(bucket)?;
        let mut keys = Vec::new();
        let mut pending = vec![bucket_root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&bucket_root) else {
                    continue;
                };
                let key = relative
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_put_get_and_list() {
        let root = tempdir().unwrap();
        let fs = FsAdapter::new(root.path());
        fs.check("videos").await.unwrap();

        for key in ["segments/talk.mp4/talk_001.mp4", "segments/talk.mp4/talk_000.mp4", "talk.mp4"] {
            fs.put("videos", key, Bytes::from_static(b"x"), "video/mp4")
                .await
                .unwrap();
        }

        assert_eq!(fs.get("videos", "talk.mp4").await.unwrap(), Bytes::from_static(b"x"));
        assert_eq!(
            fs.list_by_prefix("videos", "segments/talk.mp4/").await.unwrap(),
            vec![
                "segments/talk.mp4/talk_000.mp4".to_string(),
                "segments/talk.mp4/talk_001.mp4".to_string(),
            ]
        );
        assert!(fs.list_by_prefix("other", "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_download_and_upload_copy_files() {
        let root = tempdir().unwrap();
        let work = tempdir().unwrap();
        let fs = FsAdapter::new(root.path());

        let local = work.path().join("in.mp4");
        tokio::fs::write(&local, b"video").await.unwrap();
        fs.upload(&local, "videos", "uploads/in.mp4").await.unwrap();

        let copy = work.path().join("nested/out.mp4");
        fs.download("videos", "uploads/in.mp4", &copy).await.unwrap();
        assert_eq!(tokio::fs::read(copy).await.unwrap(), b"video");
    }

    #[tokio::test]
    async fn test_keys_cannot_escape_the_root() {
        let root = tempdir().unwrap();
        let fs = FsAdapter::new(root.path());
        assert!(fs.get("videos", "../secret").await.is_err());
        assert!(fs.get("..", "secret").await.is_err());
        assert!(fs.get("videos", "/etc/passwd").await.is_err());
    }
}
