//! Filesystem indexing: reconcile the media directory with the image table.

use chrono::{DateTime, Utc};
use photonest_core::{ImageRecord, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::store::LibraryStore;

const CHECKSUM_CHUNK: usize = 1 << 20;

/// Outcome of one sync pass.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SyncReport {
    pub scanned: usize,
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
}

pub struct MediaIndexer {
    store: Arc<LibraryStore>,
    root: PathBuf,
    allowed_extensions: Vec<String>,
}

impl MediaIndexer {
    #[must_use]
    pub fn new(store: Arc<LibraryStore>, root: PathBuf, allowed_extensions: Vec<String>) -> Self {
        Self {
            store,
            root,
            allowed_extensions,
        }
    }

    /// Walk the library root and reconcile it with the image table: insert
    /// new files, refresh changed ones, remove records whose files vanished
    /// (cascading their faces). A content change resets nothing by itself;
    /// the bumped `modified_at` simply makes the image eligible for the
    /// next face scan.
    pub fn sync(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let existing = self.store.list_images()?;
        let mut seen: Vec<String> = Vec::new();

        for path in self.image_files()? {
            report.scanned += 1;
            let relative = path
                .strip_prefix(&self.root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            seen.push(relative.clone());

            let checksum = compute_checksum(&path)?;
            let metadata = std::fs::metadata(&path)?;
            let size_bytes = metadata.len();
            let modified_at: DateTime<Utc> = metadata.modified()?.into();

            match existing.iter().find(|i| i.relative_path == relative) {
                None => {
                    let record = ImageRecord::new(
                        &image_identifier(&relative),
                        &relative,
                        &checksum,
                        size_bytes,
                        modified_at,
                    );
                    self.store.put_image(&record)?;
                    report.inserted += 1;
                }
                Some(record)
                    if record.checksum != checksum
                        || record.size_bytes != size_bytes
                        || record.modified_at != modified_at =>
                {
                    let mut updated = record.clone();
                    updated.checksum = checksum;
                    updated.size_bytes = size_bytes;
                    updated.modified_at = modified_at;
                    self.store.put_image(&updated)?;
                    report.updated += 1;
                }
                Some(_) => {}
            }
        }

        for record in &existing {
            if !seen.contains(&record.relative_path) {
                self.store.delete_image(&record.id)?;
                report.removed += 1;
            }
        }

        info!(
            scanned = report.scanned,
            inserted = report.inserted,
            updated = report.updated,
            removed = report.removed,
            "media sync complete"
        );
        Ok(report)
    }

    /// All media files under the root, sorted for a stable visit order.
    /// Hidden bookkeeping directories are skipped.
    fn image_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut stack = vec![self.root.clone()];
        while let Some(dir) = stack.pop() {
            if !dir.is_dir() {
                continue;
            }
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().to_string();
                if path.is_dir() {
                    if name == ".trash" || name == ".thumbnails" || name.starts_with('.') {
                        continue;
                    }
                    stack.push(path);
                } else if self.is_allowed(&path) {
                    files.push(path);
                }
            }
        }
        files.sort();
        Ok(files)
    }

    fn is_allowed(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .is_some_and(|e| self.allowed_extensions.iter().any(|a| a == &e))
    }
}

/// Streaming sha256 of a file's content.
pub fn compute_checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHECKSUM_CHUNK];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Stable image id derived from the relative path.
pub fn image_identifier(relative_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(relative_path.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, tempfile::TempDir, MediaIndexer, Arc<LibraryStore>) {
        let media = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let store = Arc::new(LibraryStore::open(data.path()).unwrap());
        let indexer = MediaIndexer::new(
            store.clone(),
            media.path().to_path_buf(),
            vec!["jpg".to_string(), "png".to_string()],
        );
        (media, data, indexer, store)
    }

    #[test]
    fn test_sync_inserts_updates_and_removes() {
        let (media, _data, indexer, store) = setup();
        std::fs::write(media.path().join("a.jpg"), b"aaa").unwrap();
        std::fs::write(media.path().join("b.png"), b"bbb").unwrap();
        std::fs::write(media.path().join("notes.txt"), b"skip me").unwrap();

        let report = indexer.sync().unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.removed, 0);
        assert_eq!(store.list_images().unwrap().len(), 2);

        // Unchanged files are neither inserted nor updated.
        let report = indexer.sync().unwrap();
        assert_eq!(report.inserted, 0);
        assert_eq!(report.updated, 0);

        // A content change is picked up.
        std::fs::write(media.path().join("a.jpg"), b"aaaa").unwrap();
        let report = indexer.sync().unwrap();
        assert_eq!(report.updated, 1);

        // A vanished file removes its record.
        std::fs::remove_file(media.path().join("b.png")).unwrap();
        let report = indexer.sync().unwrap();
        assert_eq!(report.removed, 1);
        assert_eq!(store.list_images().unwrap().len(), 1);
    }

    #[test]
    fn test_removed_image_cascades_faces() {
        let (media, _data, indexer, store) = setup();
        std::fs::write(media.path().join("a.jpg"), b"aaa").unwrap();
        indexer.sync().unwrap();

        let image = store.image_by_path("a.jpg").unwrap().unwrap();
        let face = photonest_core::Face::new(
            &image.id,
            photonest_core::BoundingBox::default(),
            photonest_core::Embedding::new(vec![1.0, 0.0]),
            0.9,
        );
        store.put_face(&face).unwrap();

        std::fs::remove_file(media.path().join("a.jpg")).unwrap();
        indexer.sync().unwrap();
        assert!(store.faces_snapshot(false).unwrap().is_empty());
    }

    #[test]
    fn test_hidden_directories_skipped() {
        let (media, _data, indexer, _store) = setup();
        std::fs::create_dir(media.path().join(".thumbnails")).unwrap();
        std::fs::write(media.path().join(".thumbnails/a.jpg"), b"cached").unwrap();
        std::fs::write(media.path().join("real.jpg"), b"real").unwrap();

        let report = indexer.sync().unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.inserted, 1);
    }

    #[test]
    fn test_image_identifier_is_stable() {
        assert_eq!(image_identifier("x/y.jpg"), image_identifier("x/y.jpg"));
        assert_ne!(image_identifier("x/y.jpg"), image_identifier("x/z.jpg"));
    }
}
