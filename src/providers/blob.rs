use crate::music_store::{MusicError, MusicResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Stores the bytes under a folder derived from `folder_hint` and returns the public location.
    async fn store(&self, bytes: &[u8], folder_hint: &str) -> MusicResult<String>;

    /// Deletes a blob previously returned by `store`. Deleting a missing blob succeeds.
    async fn delete(&self, location: &str) -> MusicResult<()>;
}

fn storage_error(context: &str, err: impl std::fmt::Display) -> MusicError {
    MusicError::ExternalServiceError(format!("{}: {}", context, err))
}

fn sanitize_folder(hint: &str) -> String {
    let folder: String = hint
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if folder.is_empty() {
        "misc".to_string()
    } else {
        folder
    }
}

/// Blob storage on the local filesystem. Files are written under `root_dir` and
/// published under `public_base_url`, which the server maps back onto `root_dir`.
pub struct LocalBlobStorage {
    root_dir: PathBuf,
    public_base_url: String,
}

impl LocalBlobStorage {
    pub fn new<P: AsRef<Path>>(root_dir: P, public_base_url: &str) -> Self {
        LocalBlobStorage {
            root_dir: root_dir.as_ref().to_path_buf(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn path_for_location(&self, location: &str) -> MusicResult<PathBuf> {
        let relative = location
            .strip_prefix(&self.public_base_url)
            .map(|rest| rest.trim_start_matches('/'))
            .ok_or_else(|| storage_error("Blob is not managed by this storage", location))?;

        let mut path = self.root_dir.clone();
        for segment in relative.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(storage_error("Invalid blob location", location));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

#[async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn store(&self, bytes: &[u8], folder_hint: &str) -> MusicResult<String> {
        let folder = sanitize_folder(folder_hint);
        let extension = infer::get(bytes)
            .map(|kind| kind.extension())
            .unwrap_or("bin");
        let file_name = format!("{}.{}", Uuid::new_v4(), extension);

        let dir = self.root_dir.join(&folder);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| storage_error("Failed to create blob folder", e))?;
        tokio::fs::write(dir.join(&file_name), bytes)
            .await
            .map_err(|e| storage_error("Failed to write blob", e))?;

        let location = format!("{}/{}/{}", self.public_base_url, folder, file_name);
        info!("Stored blob of {} bytes at {}", bytes.len(), location);
        Ok(location)
    }

    async fn delete(&self, location: &str) -> MusicResult<()> {
        let path = self.path_for_location(location)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted blob {}", location);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Blob {} was already gone", location);
                Ok(())
            }
            Err(e) => Err(storage_error("Failed to delete blob", e)),
        }
    }
}
