//! Object storage for uploaded documents.
//!
//! [`ObjectStoreGateway`] wraps any [`ObjectStore`] and owns key generation:
//! every upload is stored under `{uuid}-{sanitized original name}`, so keys
//! never collide and never carry path separators.
//!
//! [`FilesystemObjectStore`] is the local backend. Objects live under
//! `{base_path}/objects/` and presigned URLs are HMAC-signed links served by
//! the API's `/files/` route.
//!
//! ## Example
//!
//! ```rust,ignore
//! use docreq_db::file_storage::{FilesystemObjectStore, ObjectStoreGateway};
//! use docreq_db::url_signing::UrlSigner;
//!
//! let signer = UrlSigner::new(secret, "https://docs.example.com")?;
//! let store = FilesystemObjectStore::new("/var/docreq/objects", signer);
//! let gateway = ObjectStoreGateway::new(Arc::new(store));
//!
//! let key = gateway.upload(&data, "application/pdf", "report.pdf").await?;
//! let link = gateway.presign_download(&key, Duration::from_secs(3600)).await?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use docreq_core::{sanitize_filename, Error, ObjectStore, PresignMethod, PresignedUrl, Result};

use crate::url_signing::UrlSigner;

/// Directory under the base path that holds stored objects.
const OBJECTS_DIR: &str = "objects";

/// Build the storage key for an uploaded file.
pub fn object_key(id: Uuid, original_filename: &str) -> String {
    format!("{}-{}", id, sanitize_filename(original_filename))
}

// =============================================================================
// GATEWAY
// =============================================================================

/// Upload, download, and presign facade over an [`ObjectStore`].
#[derive(Clone)]
pub struct ObjectStoreGateway {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreGateway {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Store `data` under a freshly generated key and return the key.
    pub async fn upload(
        &self,
        data: &[u8],
        content_type: &str,
        original_filename: &str,
    ) -> Result<String> {
        let start = Instant::now();
        let key = object_key(Uuid::new_v4(), original_filename);
        self.store.put(&key, data, content_type).await?;
        info!(
            subsystem = "storage",
            component = "gateway",
            op = "upload",
            file_key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Stored object"
        );
        Ok(key)
    }

    pub async fn download(&self, key: &str) -> Result<Vec<u8>> {
        let data = self.store.get(key).await?;
        debug!(
            subsystem = "storage",
            component = "gateway",
            op = "download",
            file_key = %key,
            size_bytes = data.len(),
            "Fetched object"
        );
        Ok(data)
    }

    /// Presign `key` for `method`, valid for `expires_in`.
    pub async fn presign(
        &self,
        key: &str,
        expires_in: Duration,
        method: PresignMethod,
    ) -> Result<PresignedUrl> {
        let url = self.store.presign(key, expires_in, method).await?;
        Ok(PresignedUrl {
            url,
            method,
            expires_at: UrlSigner::expires_at(expires_in),
        })
    }

    pub async fn presign_download(&self, key: &str, expires_in: Duration) -> Result<PresignedUrl> {
        self.presign(key, expires_in, PresignMethod::Get).await
    }

    pub async fn presign_upload(&self, key: &str, expires_in: Duration) -> Result<PresignedUrl> {
        self.presign(key, expires_in, PresignMethod::Put).await
    }
}

// =============================================================================
// FILESYSTEM BACKEND
// =============================================================================

/// Local-disk object store.
pub struct FilesystemObjectStore {
    base_path: PathBuf,
    signer: UrlSigner,
}

impl FilesystemObjectStore {
    pub fn new(base_path: impl Into<PathBuf>, signer: UrlSigner) -> Self {
        Self {
            base_path: base_path.into(),
            signer,
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn signer(&self) -> &UrlSigner {
        &self.signer
    }

    /// Keys are single path components; dot runs inside a name are allowed.
    fn object_path(&self, key: &str) -> Result<PathBuf> {
        if matches!(key, "" | "." | "..") || key.contains('/') || key.contains('\\') {
            return Err(Error::InvalidInput(format!("Invalid object key: {}", key)));
        }
        Ok(self.base_path.join(OBJECTS_DIR).join(key))
    }

    /// Write, read back, and delete a probe file.
    ///
    /// Run at startup so permission or mount problems surface before the
    /// first client upload.
    pub async fn validate(&self) -> std::result::Result<(), String> {
        let probe_dir = self.base_path.join(OBJECTS_DIR).join(".health-check");
        let probe = probe_dir.join("probe.bin");
        let data = b"docreq-storage-health-check";

        fs::create_dir_all(&probe_dir)
            .await
            .map_err(|e| format!("create_dir_all({:?}): {}", probe_dir, e))?;
        fs::write(&probe, data)
            .await
            .map_err(|e| format!("write({:?}): {}", probe, e))?;
        let read_back = fs::read(&probe)
            .await
            .map_err(|e| format!("read({:?}): {}", probe, e))?;
        if read_back != data {
            return Err("read-back mismatch".to_string());
        }
        fs::remove_file(&probe)
            .await
            .map_err(|e| format!("remove_file({:?}): {}", probe, e))?;
        let _ = fs::remove_dir(&probe_dir).await;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn put(&self, key: &str, data: &[u8], content_type: &str) -> Result<()> {
        let full_path = self.object_path(key)?;
        debug!(
            subsystem = "storage",
            component = "filesystem",
            op = "put",
            file_key = %key,
            content_type,
            size_bytes = data.len(),
            "Writing object"
        );

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "create_dir_all failed");
                e
            })?;
        }

        // temp file + rename so readers never observe a partial object
        let temp_path = full_path.with_file_name(format!(".{}.tmp", key));
        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            warn!(temp_path = %temp_path.display(), error = %e, "File::create failed");
            e
        })?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &full_path).await.map_err(|e| {
            warn!(
                from = %temp_path.display(),
                to = %full_path.display(),
                error = %e,
                "rename failed"
            );
            e
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&full_path, std::fs::Permissions::from_mode(0o644)).await?;
        }

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let full_path = self.object_path(key)?;
        match fs::read(&full_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("Object not found: {}", key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn presign(
        &self,
        key: &str,
        expires_in: Duration,
        method: PresignMethod,
    ) -> Result<String> {
        self.object_path(key)?;
        self.signer.sign(key, method, expires_in)
    }
}
