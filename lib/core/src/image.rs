use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One indexed media file. `id` is derived from the relative path so that
/// re-indexing the same file is stable across runs. `last_scanned` is the
/// face-detection watermark: `None` means never scanned, and a scan stamp
/// older than `modified_at` makes the image eligible again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    pub relative_path: String,
    pub checksum: String,
    pub size_bytes: u64,
    pub modified_at: DateTime<Utc>,
    pub first_seen: DateTime<Utc>,
    pub last_scanned: Option<DateTime<Utc>>,
}

impl ImageRecord {
    #[must_use]
    pub fn new(
        id: &str,
        relative_path: &str,
        checksum: &str,
        size_bytes: u64,
        modified_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.to_string(),
            relative_path: relative_path.to_string(),
            checksum: checksum.to_string(),
            size_bytes,
            modified_at,
            first_seen: Utc::now(),
            last_scanned: None,
        }
    }

    /// An image needs scanning when it has never been scanned or has been
    /// modified since the last scan.
    #[inline]
    #[must_use]
    pub fn needs_scan(&self) -> bool {
        match self.last_scanned {
            None => true,
            Some(scanned) => self.modified_at > scanned,
        }
    }
}
