//! Previewable handles for staged image files
//!
//! A staged image is shown in the composer through a `preview://` URI issued
//! by the [`PreviewRegistry`]. Each [`PreviewHandle`] releases its URI exactly
//! once, when it is dropped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use image::ImageFormat;
use thiserror::Error;
use tracing::{debug, warn};

use crate::gemini::ImageAttachment;
use crate::state::ImageRef;

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: u64,
    live: HashMap<String, PathBuf>,
    issued: usize,
    released: usize,
}

/// Issues and reclaims preview URIs for local image files
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Issue a new preview URI for `path`
    pub fn acquire(&self, path: &Path) -> PreviewHandle {
        let mut inner = self.lock();
        inner.next_id += 1;
        inner.issued += 1;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let uri = format!("preview://{}/{}", inner.next_id, name);
        inner.live.insert(uri.clone(), path.to_path_buf());
        debug!(%uri, "preview acquired");

        PreviewHandle {
            uri,
            registry: self.clone(),
        }
    }

    fn release(&self, uri: &str) {
        let mut inner = self.lock();
        if let Some(path) = inner.live.remove(uri) {
            inner.released += 1;
            debug!(%uri, path = %path.display(), "preview released");
        } else {
            warn!(%uri, "preview released twice");
        }
    }

    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    pub fn issued_count(&self) -> usize {
        self.lock().issued
    }

    pub fn released_count(&self) -> usize {
        self.lock().released
    }
}

/// Owned preview URI; dropping it releases the URI
#[derive(Debug)]
pub struct PreviewHandle {
    uri: String,
    registry: PreviewRegistry,
}

impl PreviewHandle {
    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.release(&self.uri);
    }
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is not a file")]
    NotAFile(PathBuf),
    #[error("{0} is not a supported image type")]
    UnsupportedType(PathBuf),
}

/// A user-selected local image together with its preview
#[derive(Debug)]
pub struct StagedImage {
    path: PathBuf,
    file_name: String,
    media_type: String,
    size_bytes: u64,
    preview: PreviewHandle,
}

impl StagedImage {
    /// Validate `path` as an image file and acquire a preview for it.
    ///
    /// A leading `~/` is expanded to the home directory. The media type is
    /// taken from the file extension.
    pub fn open(path: impl AsRef<Path>, registry: &PreviewRegistry) -> Result<Self, StageError> {
        let path = expand_home(path.as_ref());

        let metadata = std::fs::metadata(&path).map_err(|source| StageError::Unreadable {
            path: path.clone(),
            source,
        })?;
        if !metadata.is_file() {
            return Err(StageError::NotAFile(path));
        }

        let media_type = ImageFormat::from_path(&path)
            .map(|format| format.to_mime_type())
            .map_err(|_| StageError::UnsupportedType(path.clone()))?;
        if !media_type.starts_with("image/") {
            return Err(StageError::UnsupportedType(path));
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let preview = registry.acquire(&path);

        Ok(Self {
            path,
            file_name,
            media_type: media_type.to_string(),
            size_bytes: metadata.len(),
            preview,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn preview_uri(&self) -> &str {
        self.preview.uri()
    }

    pub fn image_ref(&self) -> ImageRef {
        ImageRef {
            file_name: self.file_name.clone(),
            uri: self.preview.uri().to_string(),
        }
    }

    pub fn attachment(&self) -> ImageAttachment {
        ImageAttachment {
            path: self.path.clone(),
            media_type: self.media_type.clone(),
        }
    }
}

fn expand_home(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
