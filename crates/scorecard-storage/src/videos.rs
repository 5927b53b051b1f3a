//! Pitching videos kept under the `videos/` prefix of the bucket.

use std::path::{Path, PathBuf};

use chrono::Utc;
use scorecard_models::{
    content_type_for, extension_of, is_supported_video, sanitize_video_name, VideoNameError, VideoObject,
};
use tracing::{info, warn};

use crate::client::{GcsClient, ObjectMetadata};
use crate::error::{StorageError, StorageResult};
use crate::uri::GcsUri;

/// Object name prefix for stored videos.
pub const VIDEO_PREFIX: &str = "videos/";

/// Video CRUD on top of [`GcsClient`].
///
/// Names passed in and returned are file names relative to the prefix,
/// e.g. `20240301_123000_bullpen.mp4`.
#[derive(Clone)]
pub struct VideoLibrary {
    client: GcsClient,
}

impl VideoLibrary {
    pub fn new(client: GcsClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &GcsClient {
        &self.client
    }

    fn object_name(name: &str) -> String {
        format!("{}{}", VIDEO_PREFIX, name.trim_start_matches(VIDEO_PREFIX))
    }

    fn to_video(&self, meta: &ObjectMetadata) -> VideoObject {
        let uri = meta.uri();
        VideoObject {
            name: meta.name.trim_start_matches(VIDEO_PREFIX).to_string(),
            gcs_uri: uri.to_string(),
            public_url: uri.public_url(),
            size_bytes: meta.size,
            uploaded_at: meta.time_created.or(meta.updated),
        }
    }

    /// Upload a local clip as `videos/<YYYYmmdd_HHMMSS>_<file_name>`.
    pub async fn upload(&self, local_path: impl AsRef<Path>, file_name: &str) -> StorageResult<VideoObject> {
        let name = sanitize_video_name(file_name)?;
        if !is_supported_video(&name) {
            return Err(VideoNameError::UnsupportedFormat(name).into());
        }

        let object = format!(
            "{}{}_{}",
            VIDEO_PREFIX,
            Utc::now().format("%Y%m%d_%H%M%S"),
            name
        );

        let meta = self
            .client
            .upload_file(local_path, &object, content_type_for(&name))
            .await?;

        let video = self.to_video(&meta);
        info!(video = %video.name, uri = %video.gcs_uri, "Uploaded video");
        Ok(video)
    }

    /// All stored videos with a supported extension.
    pub async fn list(&self) -> StorageResult<Vec<VideoObject>> {
        let objects = self.client.list_objects(VIDEO_PREFIX).await?;
        Ok(objects
            .iter()
            .filter(|o| is_supported_video(&o.name))
            .map(|o| self.to_video(o))
            .collect())
    }

    /// First stored video whose object name contains `needle`.
    pub async fn find(&self, needle: &str) -> StorageResult<Option<VideoObject>> {
        let needle = needle.trim();
        if needle.is_empty() {
            return Ok(None);
        }
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|v| Self::object_name(&v.name).contains(needle)))
    }

    /// A previous upload of the same original file name, if any.
    pub async fn find_upload(&self, file_name: &str) -> StorageResult<Option<VideoObject>> {
        let name = sanitize_video_name(file_name)?;
        let suffix = format!("_{}", name);
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|v| v.name == name || v.name.ends_with(&suffix)))
    }

    /// Metadata for one video.
    pub async fn info(&self, name: &str) -> StorageResult<VideoObject> {
        let meta = self
            .client
            .object_metadata(&Self::object_name(name))
            .await
            .map_err(|e| Self::not_found_as(e, name))?;
        Ok(self.to_video(&meta))
    }

    /// Download a video by name or by `gs://` / public URL into `dest_dir`.
    pub async fn download(&self, name_or_uri: &str, dest_dir: impl AsRef<Path>) -> StorageResult<PathBuf> {
        let object = if GcsUri::is_uri(name_or_uri) {
            let uri = GcsUri::parse(name_or_uri)?;
            if uri.bucket != self.client.bucket() {
                return Err(StorageError::invalid_uri(format!(
                    "{} is not in bucket {}",
                    name_or_uri,
                    self.client.bucket()
                )));
            }
            uri.object
        } else {
            Self::object_name(name_or_uri)
        };

        let file_name = sanitize_video_name(&object)?;
        let dest = dest_dir.as_ref().join(file_name);
        self.client
            .download_to_file(&object, &dest)
            .await
            .map_err(|e| Self::not_found_as(e, name_or_uri))?;
        Ok(dest)
    }

    /// Raw bytes of a video.
    pub async fn content(&self, name: &str) -> StorageResult<Vec<u8>> {
        self.client
            .download_bytes(&Self::object_name(name))
            .await
            .map_err(|e| Self::not_found_as(e, name))
    }

    /// Rename by copy-then-delete. The old extension is kept when `new_name` has none.
    pub async fn rename(&self, old_name: &str, new_name: &str) -> StorageResult<VideoObject> {
        let old_name = sanitize_video_name(old_name)?;
        let mut new_name = sanitize_video_name(new_name)?;

        if extension_of(&new_name).is_none() {
            if let Some(ext) = extension_of(&old_name) {
                new_name = format!("{}.{}", new_name, ext);
            }
        }
        if !is_supported_video(&new_name) {
            return Err(VideoNameError::UnsupportedFormat(new_name).into());
        }

        let source = Self::object_name(&old_name);
        let destination = Self::object_name(&new_name);

        if source == destination {
            return self.info(&old_name).await;
        }
        if !self.client.object_exists(&source).await? {
            return Err(StorageError::not_found(old_name));
        }
        if self.client.object_exists(&destination).await? {
            return Err(StorageError::AlreadyExists(new_name));
        }

        let meta = self.client.copy_object(&source, &destination).await?;
        self.client.delete_object(&source).await?;

        info!(from = %old_name, to = %new_name, "Renamed video");
        Ok(self.to_video(&meta))
    }

    pub async fn delete(&self, name: &str) -> StorageResult<()> {
        let name = sanitize_video_name(name)?;
        self.client
            .delete_object(&Self::object_name(&name))
            .await
            .map_err(|e| Self::not_found_as(e, &name))?;
        info!(video = %name, "Deleted video");
        Ok(())
    }

    /// Delete every object under the prefix. Returns the number deleted.
    pub async fn delete_all(&self) -> StorageResult<usize> {
        let objects = self.client.list_objects(VIDEO_PREFIX).await?;
        let mut deleted = 0;
        for object in &objects {
            match self.client.delete_object(&object.name).await {
                Ok(()) => deleted += 1,
                // Already gone.
                Err(StorageError::NotFound(_)) => {}
                Err(e) => {
                    warn!(object = %object.name, error = %e, "Failed to delete video");
                    return Err(e);
                }
            }
        }
        info!(deleted, "Deleted all videos");
        Ok(deleted)
    }

    fn not_found_as(err: StorageError, name: &str) -> StorageError {
        match err {
            StorageError::NotFound(_) => StorageError::not_found(name.to_string()),
            other => other,
        }
    }
}
