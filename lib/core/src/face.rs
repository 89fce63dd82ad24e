use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::embedding::Embedding;

/// Face bounding box in source-image pixel space.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub top: f32,
    pub left: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    #[inline]
    #[must_use]
    pub fn new(top: f32, left: f32, width: f32, height: f32) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }
}

/// One detected face. Owned exclusively by its image: faces are cascade
/// deleted with the image and replaced wholesale when the image is
/// re-scanned. `person_id` is the many-faces-to-one-person edge of the
/// identity graph; a freshly detected face is always unassigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Face {
    pub id: String,
    pub image_id: String,
    pub bbox: BoundingBox,
    pub embedding: Embedding,
    pub confidence: f32,
    pub person_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Face {
    #[must_use]
    pub fn new(image_id: &str, bbox: BoundingBox, embedding: Embedding, confidence: f32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            image_id: image_id.to_string(),
            bbox,
            embedding,
            confidence,
            person_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[inline]
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    #[inline]
    #[must_use]
    pub fn is_assigned(&self) -> bool {
        self.person_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_face_is_unassigned() {
        let face = Face::new(
            "img-1",
            BoundingBox::new(10.0, 20.0, 64.0, 64.0),
            Embedding::new(vec![1.0, 0.0]),
            0.9,
        );
        assert!(!face.is_assigned());
        assert_eq!(face.image_id, "img-1");
        assert_eq!(face.created_at, face.updated_at);
    }
}
