use std::path::Path;

use crate::error::Result;
use crate::face::BoundingBox;

/// One raw detection from a face detector: a bounding box, the embedding
/// vector, and the detector's confidence in [0, 1].
#[derive(Debug, Clone)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub embedding: Vec<f32>,
    pub confidence: f32,
}

/// The face detection boundary. photonest never detects faces itself; a
/// detector maps an image file to bounding boxes plus embedding vectors,
/// whether computed in-process or by a remote accelerator.
pub trait FaceDetector: Send + Sync {
    /// Detect faces in the image at `path`.
    fn detect(&self, path: &Path) -> Result<Vec<Detection>>;

    /// Whether the detector can service requests at all. A scan is refused
    /// up front when this returns false.
    fn is_ready(&self) -> bool {
        true
    }
}
