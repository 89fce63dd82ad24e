// Thumbnail generation with an on-disk cache under the library root.
use photonest_core::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailSize {
    Small,
    Medium,
    Large,
}

impl ThumbnailSize {
    #[must_use]
    pub fn max_px(self) -> u32 {
        match self {
            ThumbnailSize::Small => 300,
            ThumbnailSize::Medium => 800,
            ThumbnailSize::Large => 1600,
        }
    }

    #[must_use]
    pub fn dir_name(self) -> &'static str {
        match self {
            ThumbnailSize::Small => "small",
            ThumbnailSize::Medium => "medium",
            ThumbnailSize::Large => "large",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "small" => Ok(ThumbnailSize::Small),
            "medium" => Ok(ThumbnailSize::Medium),
            "large" => Ok(ThumbnailSize::Large),
            other => Err(Error::InvalidArgument(format!(
                "unknown thumbnail size: {other}"
            ))),
        }
    }
}

pub struct ThumbnailCache {
    image_root: PathBuf,
    cache_root: PathBuf,
}

impl ThumbnailCache {
    #[must_use]
    pub fn new(image_root: PathBuf) -> Self {
        let cache_root = image_root.join(".thumbnails");
        Self {
            image_root,
            cache_root,
        }
    }

    #[must_use]
    pub fn thumbnail_path(&self, relative_path: &str, size: ThumbnailSize) -> PathBuf {
        self.cache_root.join(size.dir_name()).join(relative_path)
    }

    /// Return the cached thumbnail for an image, rendering it if the cache
    /// entry is missing or older than the source file.
    pub fn get_or_create(&self, relative_path: &str, size: ThumbnailSize) -> Result<PathBuf> {
        let source = self.image_root.join(relative_path);
        if !source.exists() {
            return Err(Error::ImageNotFound(relative_path.to_string()));
        }

        let target = self.thumbnail_path(relative_path, size);
        if is_fresh(&target, &source)? {
            return Ok(target);
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let decoded = image::open(&source)
            .map_err(|e| Error::InvalidArgument(format!("cannot decode {relative_path}: {e}")))?;
        let scaled = decoded.thumbnail(size.max_px(), size.max_px());
        scaled
            .save(&target)
            .map_err(|e| Error::Storage(format!("cannot write thumbnail: {e}")))?;

        debug!(image = relative_path, size = size.dir_name(), "thumbnail rendered");
        Ok(target)
    }
}

fn is_fresh(target: &Path, source: &Path) -> Result<bool> {
    if !target.exists() {
        return Ok(false);
    }
    let target_mtime = std::fs::metadata(target)?.modified()?;
    let source_mtime = std::fs::metadata(source)?.modified()?;
    Ok(target_mtime >= source_mtime)
}
