use std::path::{Path, PathBuf};

use anyhow::Context;
use bytes::Bytes;
use tracing::{debug, warn};
use uuid::Uuid;

/// Placeholder shown for accounts that never uploaded a picture.
pub const DEFAULT_PROFILE_PICTURE: &str = "/images/default.jpg";

/// URL prefix the upload directory is served under.
pub const PUBLIC_PREFIX: &str = "/images";

const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// An image file received in a multipart request.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl UploadedImage {
    /// Accepts only JPEG: either the declared content type says so or the
    /// bytes start with the JPEG magic number.
    pub fn is_jpeg(&self) -> bool {
        let declared = matches!(
            self.content_type.as_deref(),
            Some("image/jpeg") | Some("image/jpg")
        );
        declared || self.body.starts_with(&JPEG_MAGIC)
    }
}

/// Strips directory components and anything a filesystem could choke on,
/// leaving a name safe to join under the upload directory.
pub fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim()
        .trim_start_matches('.');
    let safe: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if safe.is_empty() {
        "upload.jpg".to_string()
    } else {
        safe
    }
}

/// Writes and deletes profile pictures on the local disk, handing out
/// public-relative URLs under [`PUBLIC_PREFIX`].
#[derive(Debug, Clone)]
pub struct PictureStore {
    upload_dir: PathBuf,
}

impl PictureStore {
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub async fn ensure_dir(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .with_context(|| format!("create upload dir {}", self.upload_dir.display()))
    }

    /// Persists the image under a collision-tolerant name and returns its
    /// public URL path.
    pub async fn store(&self, image: &UploadedImage) -> anyhow::Result<String> {
        let name = format!("{}-{}", Uuid::new_v4(), sanitize_filename(&image.filename));
        let path = self.upload_dir.join(&name);
        tokio::fs::write(&path, &image.body)
            .await
            .with_context(|| format!("write upload {}", path.display()))?;
        debug!(file = %name, bytes = image.body.len(), "profile picture stored");
        Ok(format!("{}/{}", PUBLIC_PREFIX, name))
    }

    /// Deletes the file behind `old_url` (if it is ours and still exists),
    /// then stores the replacement. An already-missing old file is fine.
    pub async fn replace(
        &self,
        old_url: &str,
        image: &UploadedImage,
    ) -> anyhow::Result<String> {
        self.delete_by_url(old_url).await;
        self.store(image).await
    }

    async fn delete_by_url(&self, url: &str) {
        if url == DEFAULT_PROFILE_PICTURE {
            return;
        }
        // Only names we handed out ourselves are deletable; anything that
        // does not resolve to a plain file name inside the upload dir is
        // ignored rather than chased.
        let Some(name) = url.strip_prefix(&format!("{}/", PUBLIC_PREFIX)) else {
            warn!(%url, "refusing to delete picture outside the upload prefix");
            return;
        };
        let name = sanitize_filename(name);
        let path = self.upload_dir.join(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!(file = %path.display(), "old profile picture removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, file = %path.display(), "could not remove old picture"),
        }
    }
}
