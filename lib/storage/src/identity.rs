//! The identity graph: the many-faces-to-one-person association and the
//! operations that mutate it.
//!
//! Every operation runs inside exactly one LMDB write transaction. Any error
//! drops the transaction uncommitted, so each call is all-or-nothing and the
//! referential invariants hold at every commit point:
//!
//! - an assigned face always references an existing person,
//! - a cover face always references a face currently assigned to its person,
//! - a face belongs to at most one person.

use heed::RwTxn;
use photonest_core::{Error, Face, Person, PersonSummary, Result};
use std::sync::Arc;
use tracing::debug;

use crate::store::LibraryStore;

pub struct IdentityGraph {
    store: Arc<LibraryStore>,
}

impl IdentityGraph {
    #[must_use]
    pub fn new(store: Arc<LibraryStore>) -> Self {
        Self { store }
    }

    /// Create a person with zero faces and no cover face.
    pub fn create_person(&self, label: &str) -> Result<Person> {
        let person = Person::new(label);
        let mut wtxn = self.write_txn()?;
        self.store.put_person_txn(&mut wtxn, &person)?;
        wtxn.commit().map_err(crate::store::storage_err)?;
        debug!(person_id = %person.id, label, "created person");
        Ok(person)
    }

    /// Rename a person. Fails with `PersonNotFound` if absent.
    pub fn rename_person(&self, person_id: &str, label: &str) -> Result<Person> {
        let mut wtxn = self.write_txn()?;
        let mut person = self.require_person(&wtxn, person_id)?;
        person.label = label.to_string();
        person.touch();
        self.store.put_person_txn(&mut wtxn, &person)?;
        wtxn.commit().map_err(crate::store::storage_err)?;
        Ok(person)
    }

    /// Assign faces to a person. Every face id is existence-checked: an
    /// unknown id aborts the whole call with `FaceNotFound` and nothing is
    /// committed. Re-assigning an already-assigned face silently moves it
    /// (assign always wins); if the move steals another person's cover face,
    /// that cover is repaired. The first id in the list becomes the cover
    /// when the target person has none.
    pub fn assign_faces(&self, person_id: &str, face_ids: &[String]) -> Result<usize> {
        if face_ids.is_empty() {
            return Err(Error::InvalidArgument("no face_ids provided".to_string()));
        }

        let mut wtxn = self.write_txn()?;
        let mut person = self.require_person(&wtxn, person_id)?;

        for face_id in face_ids {
            let mut face = self
                .store
                .get_face_txn(&wtxn, face_id)?
                .ok_or_else(|| Error::FaceNotFound(face_id.clone()))?;

            let previous_owner = face.person_id.take();
            face.person_id = Some(person_id.to_string());
            face.touch();
            self.store.put_face_txn(&mut wtxn, &face)?;

            if let Some(prev_id) = previous_owner {
                if prev_id != person_id {
                    self.repair_cover(&mut wtxn, &prev_id, face_id)?;
                }
            }
        }

        if person.cover_face_id.is_none() {
            person.cover_face_id = Some(face_ids[0].clone());
        }
        person.touch();
        self.store.put_person_txn(&mut wtxn, &person)?;

        wtxn.commit().map_err(crate::store::storage_err)?;
        debug!(person_id, count = face_ids.len(), "assigned faces");
        Ok(face_ids.len())
    }

    /// Detach faces from a person. Face ids not currently owned by this
    /// person are silently ignored; the returned count covers only real
    /// detaches. A detached cover face is replaced from the remaining faces
    /// or cleared.
    pub fn detach_faces(&self, person_id: &str, face_ids: &[String]) -> Result<usize> {
        let mut wtxn = self.write_txn()?;
        let mut person = self.require_person(&wtxn, person_id)?;

        let mut detached = 0usize;
        let mut cover_detached = false;
        for face_id in face_ids {
            let Some(mut face) = self.store.get_face_txn(&wtxn, face_id)? else {
                continue;
            };
            if face.person_id.as_deref() != Some(person_id) {
                continue;
            }
            face.person_id = None;
            face.touch();
            self.store.put_face_txn(&mut wtxn, &face)?;
            detached += 1;
            if person.cover_face_id.as_deref() == Some(face_id) {
                cover_detached = true;
            }
        }

        if cover_detached {
            person.cover_face_id = self.next_cover(&wtxn, person_id)?;
        }
        if detached > 0 {
            person.touch();
            self.store.put_person_txn(&mut wtxn, &person)?;
        }

        wtxn.commit().map_err(crate::store::storage_err)?;
        debug!(person_id, detached, "detached faces");
        Ok(detached)
    }

    /// Delete a person, detaching all of its faces in the same transaction
    /// so no face is ever left referencing a missing person.
    pub fn delete_person(&self, person_id: &str) -> Result<()> {
        let mut wtxn = self.write_txn()?;
        self.require_person(&wtxn, person_id)?;

        let faces = self.store.faces_txn(&wtxn)?;
        for mut face in faces {
            if face.person_id.as_deref() == Some(person_id) {
                face.person_id = None;
                face.touch();
                self.store.put_face_txn(&mut wtxn, &face)?;
            }
        }

        self.store.delete_person_txn(&mut wtxn, person_id)?;
        wtxn.commit().map_err(crate::store::storage_err)?;
        debug!(person_id, "deleted person");
        Ok(())
    }

    /// Merge source persons into a target: each existing source's faces move
    /// to the target and the source is deleted. Unknown sources and a source
    /// equal to the target are skipped. If the target ends up with faces but
    /// no cover, the first moved face becomes the cover.
    pub fn merge_persons(&self, target_id: &str, source_ids: &[String]) -> Result<PersonSummary> {
        if source_ids.is_empty() {
            return Err(Error::InvalidArgument(
                "no source_person_ids provided".to_string(),
            ));
        }

        let mut wtxn = self.write_txn()?;
        let mut target = self.require_person(&wtxn, target_id)?;

        let mut first_moved: Option<String> = None;
        let mut moved = 0usize;
        for source_id in source_ids {
            if source_id == target_id {
                continue;
            }
            if self.store.get_person_txn(&wtxn, source_id)?.is_none() {
                continue;
            }

            let mut source_faces: Vec<Face> = self
                .store
                .faces_txn(&wtxn)?
                .into_iter()
                .filter(|f| f.person_id.as_deref() == Some(source_id.as_str()))
                .collect();
            source_faces.sort_by(|a, b| a.id.cmp(&b.id));

            for mut face in source_faces {
                face.person_id = Some(target_id.to_string());
                face.touch();
                self.store.put_face_txn(&mut wtxn, &face)?;
                if first_moved.is_none() {
                    first_moved = Some(face.id.clone());
                }
                moved += 1;
            }

            self.store.delete_person_txn(&mut wtxn, source_id)?;
        }

        if target.cover_face_id.is_none() {
            target.cover_face_id = first_moved;
        }
        target.touch();
        self.store.put_person_txn(&mut wtxn, &target)?;

        let face_count = self
            .store
            .faces_txn(&wtxn)?
            .iter()
            .filter(|f| f.person_id.as_deref() == Some(target_id))
            .count();

        wtxn.commit().map_err(crate::store::storage_err)?;
        debug!(target_id, moved, face_count, "merged persons");
        Ok(PersonSummary {
            person: target,
            face_count,
        })
    }

    /// Enumerate invariant violations: faces referencing missing persons,
    /// covers referencing missing faces, covers not assigned to their
    /// person. Diagnostic only; an empty result means the graph is sound.
    pub fn integrity_report(&self) -> Result<Vec<String>> {
        let rtxn = self.store.env.read_txn().map_err(crate::store::storage_err)?;
        let faces = self.store.faces_txn(&rtxn)?;
        let persons = self.store.persons_txn(&rtxn)?;
        drop(rtxn);

        let mut violations = Vec::new();
        for face in &faces {
            if let Some(pid) = &face.person_id {
                if !persons.iter().any(|p| &p.id == pid) {
                    violations.push(format!("face {} references missing person {pid}", face.id));
                }
            }
        }
        for person in &persons {
            if let Some(cover) = &person.cover_face_id {
                match faces.iter().find(|f| &f.id == cover) {
                    None => violations.push(format!(
                        "person {} cover references missing face {cover}",
                        person.id
                    )),
                    Some(face) if face.person_id.as_deref() != Some(person.id.as_str()) => {
                        violations.push(format!(
                            "person {} cover face {cover} is not assigned to them",
                            person.id
                        ))
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(violations)
    }

    fn write_txn(&self) -> Result<RwTxn<'_>> {
        self.store.env.write_txn().map_err(crate::store::storage_err)
    }

    fn require_person(&self, txn: &heed::RoTxn, person_id: &str) -> Result<Person> {
        self.store
            .get_person_txn(txn, person_id)?
            .ok_or_else(|| Error::PersonNotFound(person_id.to_string()))
    }

    /// Pick a replacement cover for a person whose cover face just left:
    /// the remaining assigned face with the lowest id, or none.
    fn next_cover(&self, txn: &heed::RoTxn, person_id: &str) -> Result<Option<String>> {
        let faces = self.store.faces_txn(txn)?;
        Ok(faces
            .into_iter()
            .filter(|f| f.person_id.as_deref() == Some(person_id))
            .map(|f| f.id)
            .min())
    }

    /// Repair a person's cover after one of their faces moved elsewhere.
    /// No-op when the moved face was not the cover or the person is gone.
    fn repair_cover(&self, wtxn: &mut RwTxn, person_id: &str, moved_face_id: &str) -> Result<()> {
        let Some(mut person) = self.store.get_person_txn(wtxn, person_id)? else {
            return Ok(());
        };
        if person.cover_face_id.as_deref() != Some(moved_face_id) {
            return Ok(());
        }
        person.cover_face_id = self.next_cover(wtxn, person_id)?;
        person.touch();
        self.store.put_person_txn(wtxn, &person)
    }
}
