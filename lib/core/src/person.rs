use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named identity aggregating zero or more faces. The person does not own
/// face lifetimes; faces merely point back at it. `cover_face_id`, when set,
/// must reference a face currently assigned to this person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub label: String,
    pub cover_face_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Person {
    #[must_use]
    pub fn new(label: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            label: label.to_string(),
            cover_face_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[inline]
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A person together with its current face count, as returned by listings
/// and by `merge_persons`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonSummary {
    pub person: Person,
    pub face_count: usize,
}
