//! Background face scanning over the indexed library.
//!
//! One cooperative task at a time: the scanner owns an explicit status
//! record behind a lock, exposed through a thread-safe accessor, with an
//! atomic running guard and a stop flag checked once per image. Stopping is
//! cooperative, so the image in flight is completed before the task exits.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use photonest_core::{Detection, Embedding, Error, Face, FaceDetector, ImageRecord, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{info, warn};

use crate::store::LibraryStore;

/// Externally visible scan progress.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStatus {
    pub is_running: bool,
    pub total_images: usize,
    pub processed_images: usize,
    pub failed_images: usize,
    pub current_image: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub progress_percent: f32,
}

struct ScanShared {
    status: RwLock<ScanStatus>,
    running: AtomicBool,
    stop: AtomicBool,
}

pub struct FaceScanner {
    store: Arc<LibraryStore>,
    detector: Arc<dyn FaceDetector>,
    image_root: PathBuf,
    shared: Arc<ScanShared>,
}

impl FaceScanner {
    #[must_use]
    pub fn new(store: Arc<LibraryStore>, detector: Arc<dyn FaceDetector>, image_root: PathBuf) -> Self {
        Self {
            store,
            detector,
            image_root,
            shared: Arc::new(ScanShared {
                status: RwLock::new(ScanStatus::default()),
                running: AtomicBool::new(false),
                stop: AtomicBool::new(false),
            }),
        }
    }

    /// Thread-safe snapshot of the current scan progress.
    pub fn status(&self) -> ScanStatus {
        self.shared.status.read().clone()
    }

    /// Start a background scan. Fails with `ScanInProgress` if one is
    /// already running and with a detection error if no detector is ready.
    pub fn start(&self) -> Result<()> {
        if !self.detector.is_ready() {
            return Err(Error::Detection(
                "no face detector configured".to_string(),
            ));
        }
        if self
            .shared
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::ScanInProgress);
        }
        self.shared.stop.store(false, Ordering::Release);

        let store = self.store.clone();
        let detector = self.detector.clone();
        let root = self.image_root.clone();
        let shared = self.shared.clone();

        thread::Builder::new()
            .name("face-scan".to_string())
            .spawn(move || {
                if let Err(e) = run_scan(&store, detector.as_ref(), &root, &shared) {
                    warn!("face scan aborted: {e}");
                }
                let mut status = shared.status.write();
                status.is_running = false;
                status.current_image = None;
                drop(status);
                shared.stop.store(false, Ordering::Release);
                shared.running.store(false, Ordering::Release);
            })
            .map_err(|e| Error::Storage(e.to_string()))?;

        Ok(())
    }

    /// Request a cooperative stop. The image in flight is completed first.
    pub fn request_stop(&self) -> Result<()> {
        if !self.shared.running.load(Ordering::Acquire) {
            return Err(Error::InvalidArgument("no scan is running".to_string()));
        }
        self.shared.stop.store(true, Ordering::Release);
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }
}

/// The scan loop proper. Per-image failures are non-fatal: the error is
/// logged and counted, and the image's scan watermark is stamped either way
/// so it is not retried on every scan.
fn run_scan(
    store: &LibraryStore,
    detector: &dyn FaceDetector,
    root: &std::path::Path,
    shared: &ScanShared,
) -> Result<()> {
    let images = store.images_needing_scan()?;

    {
        let mut status = shared.status.write();
        *status = ScanStatus {
            is_running: true,
            total_images: images.len(),
            started_at: Some(Utc::now()),
            ..ScanStatus::default()
        };
    }
    info!(total = images.len(), "face scan started");

    for image in &images {
        if shared.stop.load(Ordering::Acquire) {
            info!("face scan stopped by request");
            break;
        }

        shared.status.write().current_image = Some(image.relative_path.clone());

        if let Err(e) = scan_one(store, detector, root, image) {
            warn!(image = %image.relative_path, "detection failed: {e}");
            shared.status.write().failed_images += 1;
            // Stamp the watermark anyway: a broken image should not be
            // retried forever without an explicit re-index.
            store.mark_image_scanned(&image.id)?;
        }

        let mut status = shared.status.write();
        status.processed_images += 1;
        status.progress_percent = if status.total_images > 0 {
            (status.processed_images as f32 / status.total_images as f32) * 100.0
        } else {
            0.0
        };
    }

    let processed = shared.status.read().processed_images;
    info!(processed, "face scan finished");
    Ok(())
}

fn scan_one(
    store: &LibraryStore,
    detector: &dyn FaceDetector,
    root: &std::path::Path,
    image: &ImageRecord,
) -> Result<()> {
    let path = root.join(&image.relative_path);
    if !path.exists() {
        warn!(image = %image.relative_path, "file missing, marking scanned");
        return store.mark_image_scanned(&image.id);
    }

    let detections = detector.detect(&path)?;
    let faces = detections_to_faces(&image.id, detections);
    let created = store.replace_faces_for_image(&image.id, &faces)?;
    info!(image = %image.relative_path, faces = created, "image scanned");
    Ok(())
}

/// Convert raw detections to face records, dropping zero-norm embeddings at
/// ingest so they can never reach the similarity matrix.
fn detections_to_faces(image_id: &str, detections: Vec<Detection>) -> Vec<Face> {
    detections
        .into_iter()
        .filter_map(|d| {
            let embedding = Embedding::new(d.embedding);
            if embedding.is_zero_norm() {
                warn!(image_id, "dropping zero-norm embedding from detector");
                return None;
            }
            Some(Face::new(image_id, d.bbox, embedding, d.confidence))
        })
        .collect()
}
