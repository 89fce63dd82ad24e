// LMDB-backed library store: faces, persons and images as bincode records.
// Every public read collects its snapshot under a single read transaction;
// mutations commit one write transaction each.
use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use photonest_core::{Error, Face, ImageRecord, Person, PersonSummary, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

const DB_FACES: &str = "faces";
const DB_PERSONS: &str = "persons";
const DB_IMAGES: &str = "images";

const MAP_SIZE: usize = 10 * 1024 * 1024 * 1024; // 10GB

/// Assignment filter for face listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaceStatus {
    #[default]
    Any,
    Assigned,
    Unassigned,
}

pub struct LibraryStore {
    pub(crate) env: Arc<Env>,
    pub(crate) faces_db: Database<Str, Bytes>,
    pub(crate) persons_db: Database<Str, Bytes>,
    pub(crate) images_db: Database<Str, Bytes>,
}

#[inline]
pub(crate) fn storage_err(e: heed::Error) -> Error {
    Error::Storage(e.to_string())
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| Error::Serialization(e.to_string()))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| Error::Serialization(e.to_string()))
}

impl LibraryStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        std::fs::create_dir_all(&path)?;

        let env = Arc::new(
            unsafe {
                EnvOpenOptions::new()
                    .map_size(MAP_SIZE)
                    .max_dbs(8)
                    .open(path)
            }
            .map_err(storage_err)?,
        );

        let mut wtxn = env.write_txn().map_err(storage_err)?;
        let faces_db = env
            .create_database(&mut wtxn, Some(DB_FACES))
            .map_err(storage_err)?;
        let persons_db = env
            .create_database(&mut wtxn, Some(DB_PERSONS))
            .map_err(storage_err)?;
        let images_db = env
            .create_database(&mut wtxn, Some(DB_IMAGES))
            .map_err(storage_err)?;
        wtxn.commit().map_err(storage_err)?;

        Ok(Self {
            env,
            faces_db,
            persons_db,
            images_db,
        })
    }

    // ==================== transaction-scoped helpers ====================

    pub(crate) fn get_face_txn(&self, txn: &RoTxn, id: &str) -> Result<Option<Face>> {
        match self.faces_db.get(txn, id).map_err(storage_err)? {
            Some(bytes) => Ok(Some(decode(bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn put_face_txn(&self, txn: &mut RwTxn, face: &Face) -> Result<()> {
        let bytes = encode(face)?;
        self.faces_db
            .put(txn, &face.id, &bytes)
            .map_err(storage_err)
    }

    pub(crate) fn delete_face_txn(&self, txn: &mut RwTxn, id: &str) -> Result<bool> {
        self.faces_db.delete(txn, id).map_err(storage_err)
    }

    pub(crate) fn faces_txn(&self, txn: &RoTxn) -> Result<Vec<Face>> {
        let mut faces = Vec::new();
        for entry in self.faces_db.iter(txn).map_err(storage_err)? {
            let (_, bytes) = entry.map_err(storage_err)?;
            faces.push(decode(bytes)?);
        }
        Ok(faces)
    }

    pub(crate) fn get_person_txn(&self, txn: &RoTxn, id: &str) -> Result<Option<Person>> {
        match self.persons_db.get(txn, id).map_err(storage_err)? {
            Some(bytes) => Ok(Some(decode(bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn put_person_txn(&self, txn: &mut RwTxn, person: &Person) -> Result<()> {
        let bytes = encode(person)?;
        self.persons_db
            .put(txn, &person.id, &bytes)
            .map_err(storage_err)
    }

    pub(crate) fn delete_person_txn(&self, txn: &mut RwTxn, id: &str) -> Result<bool> {
        self.persons_db.delete(txn, id).map_err(storage_err)
    }

    pub(crate) fn persons_txn(&self, txn: &RoTxn) -> Result<Vec<Person>> {
        let mut persons = Vec::new();
        for entry in self.persons_db.iter(txn).map_err(storage_err)? {
            let (_, bytes) = entry.map_err(storage_err)?;
            persons.push(decode(bytes)?);
        }
        Ok(persons)
    }

    pub(crate) fn get_image_txn(&self, txn: &RoTxn, id: &str) -> Result<Option<ImageRecord>> {
        match self.images_db.get(txn, id).map_err(storage_err)? {
            Some(bytes) => Ok(Some(decode(bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn put_image_txn(&self, txn: &mut RwTxn, image: &ImageRecord) -> Result<()> {
        let bytes = encode(image)?;
        self.images_db
            .put(txn, &image.id, &bytes)
            .map_err(storage_err)
    }

    pub(crate) fn images_txn(&self, txn: &RoTxn) -> Result<Vec<ImageRecord>> {
        let mut images = Vec::new();
        for entry in self.images_db.iter(txn).map_err(storage_err)? {
            let (_, bytes) = entry.map_err(storage_err)?;
            images.push(decode(bytes)?);
        }
        Ok(images)
    }

    // ==================== faces ====================

    pub fn get_face(&self, id: &str) -> Result<Option<Face>> {
        let rtxn = self.env.read_txn().map_err(storage_err)?;
        self.get_face_txn(&rtxn, id)
    }

    pub fn put_face(&self, face: &Face) -> Result<()> {
        let mut wtxn = self.env.write_txn().map_err(storage_err)?;
        self.put_face_txn(&mut wtxn, face)?;
        wtxn.commit().map_err(storage_err)
    }

    /// All faces, optionally restricted to unassigned ones, read under one
    /// transaction. This is the self-consistent snapshot a clustering
    /// invocation works from.
    pub fn faces_snapshot(&self, unassigned_only: bool) -> Result<Vec<Face>> {
        let rtxn = self.env.read_txn().map_err(storage_err)?;
        let mut faces = self.faces_txn(&rtxn)?;
        if unassigned_only {
            faces.retain(|f| f.person_id.is_none());
        }
        faces.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(faces)
    }

    /// Filtered face listing, newest first, with pagination.
    pub fn list_faces(
        &self,
        status: FaceStatus,
        person_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<(usize, Vec<Face>)> {
        let rtxn = self.env.read_txn().map_err(storage_err)?;
        let mut faces = self.faces_txn(&rtxn)?;
        drop(rtxn);

        faces.retain(|f| match status {
            FaceStatus::Any => true,
            FaceStatus::Assigned => f.person_id.is_some(),
            FaceStatus::Unassigned => f.person_id.is_none(),
        });
        if let Some(pid) = person_id {
            faces.retain(|f| f.person_id.as_deref() == Some(pid));
        }

        faces.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        let total = faces.len();
        let page = faces.into_iter().skip(offset).take(limit).collect();
        Ok((total, page))
    }

    pub fn faces_for_person(&self, person_id: &str) -> Result<Vec<Face>> {
        let rtxn = self.env.read_txn().map_err(storage_err)?;
        let mut faces = self.faces_txn(&rtxn)?;
        faces.retain(|f| f.person_id.as_deref() == Some(person_id));
        faces.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(faces)
    }

    pub fn faces_for_image(&self, image_id: &str) -> Result<Vec<Face>> {
        let rtxn = self.env.read_txn().map_err(storage_err)?;
        let mut faces = self.faces_txn(&rtxn)?;
        faces.retain(|f| f.image_id == image_id);
        faces.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(faces)
    }

    /// Replace the faces of an image wholesale (re-scan semantics) and stamp
    /// its scan watermark, all in one transaction.
    pub fn replace_faces_for_image(&self, image_id: &str, faces: &[Face]) -> Result<usize> {
        let mut wtxn = self.env.write_txn().map_err(storage_err)?;

        let mut image = self
            .get_image_txn(&wtxn, image_id)?
            .ok_or_else(|| Error::ImageNotFound(image_id.to_string()))?;

        let existing = self.faces_txn(&wtxn)?;
        for face in existing.iter().filter(|f| f.image_id == image_id) {
            self.delete_face_txn(&mut wtxn, &face.id)?;
        }
        for face in faces {
            self.put_face_txn(&mut wtxn, face)?;
        }

        image.last_scanned = Some(chrono::Utc::now());
        self.put_image_txn(&mut wtxn, &image)?;

        wtxn.commit().map_err(storage_err)?;
        Ok(faces.len())
    }

    // ==================== persons ====================

    pub fn get_person(&self, id: &str) -> Result<Option<Person>> {
        let rtxn = self.env.read_txn().map_err(storage_err)?;
        self.get_person_txn(&rtxn, id)
    }

    /// All persons with their face counts, newest first.
    pub fn list_persons(&self) -> Result<Vec<PersonSummary>> {
        let rtxn = self.env.read_txn().map_err(storage_err)?;
        let persons = self.persons_txn(&rtxn)?;
        let faces = self.faces_txn(&rtxn)?;
        drop(rtxn);

        let mut counts: HashMap<String, usize> = HashMap::new();
        for face in &faces {
            if let Some(pid) = &face.person_id {
                *counts.entry(pid.clone()).or_default() += 1;
            }
        }

        let mut summaries: Vec<PersonSummary> = persons
            .into_iter()
            .map(|person| {
                let face_count = counts.get(&person.id).copied().unwrap_or(0);
                PersonSummary { person, face_count }
            })
            .collect();
        summaries.sort_by(|a, b| {
            b.person
                .created_at
                .cmp(&a.person.created_at)
                .then_with(|| a.person.id.cmp(&b.person.id))
        });
        Ok(summaries)
    }

    // ==================== images ====================

    pub fn get_image(&self, id: &str) -> Result<Option<ImageRecord>> {
        let rtxn = self.env.read_txn().map_err(storage_err)?;
        self.get_image_txn(&rtxn, id)
    }

    pub fn image_by_path(&self, relative_path: &str) -> Result<Option<ImageRecord>> {
        let rtxn = self.env.read_txn().map_err(storage_err)?;
        let images = self.images_txn(&rtxn)?;
        Ok(images.into_iter().find(|i| i.relative_path == relative_path))
    }

    pub fn put_image(&self, image: &ImageRecord) -> Result<()> {
        let mut wtxn = self.env.write_txn().map_err(storage_err)?;
        self.put_image_txn(&mut wtxn, image)?;
        wtxn.commit().map_err(storage_err)
    }

    pub fn list_images(&self) -> Result<Vec<ImageRecord>> {
        let rtxn = self.env.read_txn().map_err(storage_err)?;
        let mut images = self.images_txn(&rtxn)?;
        images.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(images)
    }

    /// Images that have never been scanned or changed since their last scan.
    pub fn images_needing_scan(&self) -> Result<Vec<ImageRecord>> {
        let mut images = self.list_images()?;
        images.retain(ImageRecord::needs_scan);
        Ok(images)
    }

    /// Stamp an image's scan watermark without touching its faces. Used when
    /// an image fails detection or has vanished, so it is not retried on
    /// every scan.
    pub fn mark_image_scanned(&self, image_id: &str) -> Result<()> {
        let mut wtxn = self.env.write_txn().map_err(storage_err)?;
        let mut image = self
            .get_image_txn(&wtxn, image_id)?
            .ok_or_else(|| Error::ImageNotFound(image_id.to_string()))?;
        image.last_scanned = Some(chrono::Utc::now());
        self.put_image_txn(&mut wtxn, &image)?;
        wtxn.commit().map_err(storage_err)
    }

    /// Delete an image record and cascade-delete its faces in one
    /// transaction. Faces cannot outlive their image.
    pub fn delete_image(&self, image_id: &str) -> Result<bool> {
        let mut wtxn = self.env.write_txn().map_err(storage_err)?;
        let existed = self.images_db.delete(&mut wtxn, image_id).map_err(storage_err)?;
        if existed {
            let faces = self.faces_txn(&wtxn)?;
            for face in faces.iter().filter(|f| f.image_id == image_id) {
                self.delete_face_txn(&mut wtxn, &face.id)?;
            }
        }
        wtxn.commit().map_err(storage_err)?;
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use photonest_core::{BoundingBox, Embedding};

    fn store() -> (tempfile::TempDir, LibraryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LibraryStore::open(dir.path()).unwrap();
        (dir, store)
    }

    fn image(id: &str, path: &str) -> ImageRecord {
        ImageRecord::new(id, path, "checksum", 1024, Utc::now())
    }

    fn face(id: &str, image_id: &str) -> Face {
        let mut f = Face::new(
            image_id,
            BoundingBox::default(),
            Embedding::new(vec![1.0, 0.0]),
            0.9,
        );
        f.id = id.to_string();
        f
    }

    #[test]
    fn test_face_roundtrip() {
        let (_dir, store) = store();
        let f = face("f1", "img-1");
        store.put_face(&f).unwrap();

        let loaded = store.get_face("f1").unwrap().unwrap();
        assert_eq!(loaded.id, "f1");
        assert_eq!(loaded.image_id, "img-1");
        assert!(loaded.person_id.is_none());
        assert_eq!(loaded.embedding.dim(), 2);
    }

    #[test]
    fn test_replace_faces_for_image_stamps_watermark() {
        let (_dir, store) = store();
        store.put_image(&image("img-1", "a.jpg")).unwrap();
        store.put_face(&face("old-1", "img-1")).unwrap();
        store.put_face(&face("old-2", "img-1")).unwrap();

        let replaced = store
            .replace_faces_for_image("img-1", &[face("new-1", "img-1")])
            .unwrap();
        assert_eq!(replaced, 1);

        assert!(store.get_face("old-1").unwrap().is_none());
        assert!(store.get_face("new-1").unwrap().is_some());
        assert!(store.get_image("img-1").unwrap().unwrap().last_scanned.is_some());
    }

    #[test]
    fn test_replace_faces_unknown_image() {
        let (_dir, store) = store();
        let result = store.replace_faces_for_image("missing", &[]);
        assert!(matches!(result, Err(Error::ImageNotFound(_))));
    }

    #[test]
    fn test_delete_image_cascades_faces() {
        let (_dir, store) = store();
        store.put_image(&image("img-1", "a.jpg")).unwrap();
        store.put_face(&face("f1", "img-1")).unwrap();
        store.put_face(&face("f2", "img-2")).unwrap();

        assert!(store.delete_image("img-1").unwrap());
        assert!(store.get_face("f1").unwrap().is_none());
        // Faces of other images are untouched.
        assert!(store.get_face("f2").unwrap().is_some());
    }

    #[test]
    fn test_list_faces_filters_and_pagination() {
        let (_dir, store) = store();
        for i in 0..5 {
            let mut f = face(&format!("f{i}"), "img-1");
            if i < 2 {
                f.person_id = Some("p1".to_string());
            }
            store.put_face(&f).unwrap();
        }

        let (total, page) = store.list_faces(FaceStatus::Unassigned, None, 10, 0).unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 3);

        let (total, page) = store.list_faces(FaceStatus::Any, Some("p1"), 1, 1).unwrap();
        assert_eq!(total, 2);
        assert_eq!(page.len(), 1);
    }

    #[test]
    fn test_images_needing_scan() {
        let (_dir, store) = store();
        store.put_image(&image("img-1", "a.jpg")).unwrap();
        let mut scanned = image("img-2", "b.jpg");
        scanned.last_scanned = Some(Utc::now());
        store.put_image(&scanned).unwrap();

        let pending = store.images_needing_scan().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "img-1");
    }

    #[test]
    fn test_faces_snapshot_unassigned_only() {
        let (_dir, store) = store();
        let mut assigned = face("f1", "img-1");
        assigned.person_id = Some("p1".to_string());
        store.put_face(&assigned).unwrap();
        store.put_face(&face("f2", "img-1")).unwrap();

        let all = store.faces_snapshot(false).unwrap();
        assert_eq!(all.len(), 2);
        let unassigned = store.faces_snapshot(true).unwrap();
        assert_eq!(unassigned.len(), 1);
        assert_eq!(unassigned[0].id, "f2");
    }
}
