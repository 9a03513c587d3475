use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{validate_key, StorageBackend, StorageError, StoredObject};

/// Filesystem storage backend.
///
/// Layout under `root`:
/// - `objects/{key}` raw bytes
/// - `types/{key}` declared content type
pub struct FilesystemBackend {
    root: PathBuf,
    public_base_url: String,
}

impl FilesystemBackend {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join("objects").join(key)
    }

    fn type_path(&self, key: &str) -> PathBuf {
        self.root.join("types").join(key)
    }

    /// Write, read back, and delete a probe object so misconfigured
    /// storage fails at startup instead of on the first upload.
    pub async fn validate(&self) -> Result<(), StorageError> {
        let key = format!("health-check/{}", Uuid::new_v4().simple());
        let data = b"storage-health-check";
        self.put(&key, data, "text/plain").await?;
        let read_back = self.get(&key).await?;
        self.delete(&key).await?;
        if read_back.bytes != data {
            return Err(StorageError::Io(std::io::Error::other("read-back mismatch")));
        }
        Ok(())
    }
}

async fn ensure_parent(path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(|e| {
            warn!(parent = %parent.display(), error = %e, "file_storage: create_dir_all failed");
            e
        })?;
    }
    Ok(())
}

/// Write `data` to a fresh temp file next to `path` and return the temp path.
/// The temp file is removed again if the write fails.
async fn stage(path: &Path, data: &[u8]) -> Result<PathBuf, StorageError> {
    ensure_parent(path).await?;
    let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
    let written = async {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await?;
        file.write_all(data).await?;
        file.sync_all().await
    }
    .await;
    if let Err(e) = written {
        discard(&temp_path).await;
        return Err(e.into());
    }
    Ok(temp_path)
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "file_storage: cleanup failed");
        }
    }
}

/// Temp file + rename. Replaces whatever is at `path`.
async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let temp_path = stage(path, data).await?;
    if let Err(e) = fs::rename(&temp_path, path).await {
        warn!(to = %path.display(), error = %e, "file_storage: rename failed");
        discard(&temp_path).await;
        return Err(e.into());
    }
    Ok(())
}

/// Temp file + hard link. The link fails if `path` already exists, so two
/// writers racing on one key cannot both succeed.
async fn write_new(path: &Path, data: &[u8], key: &str) -> Result<(), StorageError> {
    let temp_path = stage(path, data).await?;
    let linked = fs::hard_link(&temp_path, path).await;
    discard(&temp_path).await;
    match linked {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            Err(StorageError::AlreadyExists(key.to_string()))
        }
        Err(e) => {
            warn!(to = %path.display(), error = %e, "file_storage: link failed");
            Err(e.into())
        }
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        let object_path = self.object_path(key);

        debug!(key, size = data.len(), content_type, "file_storage: put");
        write_new(&object_path, data, key).await?;
        if let Err(e) = write_atomic(&self.type_path(key), content_type.as_bytes()).await {
            discard(&object_path).await;
            return Err(e);
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
        validate_key(key)?;
        let bytes = match fs::read(self.object_path(key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let content_type = match fs::read_to_string(self.type_path(key)).await {
            Ok(declared) => declared,
            Err(_) => mime_guess::from_path(key).first_or_octet_stream().to_string(),
        };
        Ok(StoredObject {
            bytes,
            content_type,
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        for path in [self.object_path(key), self.type_path(key)] {
            if fs::try_exists(&path).await? {
                fs::remove_file(path).await?;
            }
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key)?;
        Ok(fs::try_exists(self.object_path(key)).await?)
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}
