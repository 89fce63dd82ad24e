// Integration tests for photonest
use photonest::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn open_store() -> (tempfile::TempDir, Arc<LibraryStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(LibraryStore::open(dir.path()).unwrap());
    (dir, store)
}

fn seeded_face(store: &LibraryStore, id: &str, image_id: &str, embedding: Vec<f32>, confidence: f32) {
    let mut face = Face::new(
        image_id,
        BoundingBox::default(),
        Embedding::new(embedding),
        confidence,
    );
    face.id = id.to_string();
    store.put_face(&face).unwrap();
}

/// Detector stub: one face per image, embedding keyed off the file size so
/// different fixture files land in different clusters.
struct StubDetector;

impl FaceDetector for StubDetector {
    fn detect(&self, path: &Path) -> Result<Vec<Detection>> {
        let size = std::fs::metadata(path)?.len() as f32;
        let group = if size < 10.0 { 1.0 } else { -1.0 };
        Ok(vec![Detection {
            bbox: BoundingBox::new(1.0, 2.0, 32.0, 32.0),
            embedding: vec![group, 0.1, 0.0],
            confidence: 0.75,
        }])
    }
}

#[test]
fn test_cluster_then_commit_identities() {
    let (_dir, store) = open_store();
    let graph = IdentityGraph::new(store.clone());

    // Two well-separated identity groups.
    seeded_face(&store, "f1", "img-1", vec![1.0, 0.0, 0.0], 0.9);
    seeded_face(&store, "f2", "img-2", vec![0.98, 0.2, 0.0], 0.95);
    seeded_face(&store, "f3", "img-3", vec![0.0, 0.0, 1.0], 0.8);
    seeded_face(&store, "f4", "img-4", vec![0.0, 0.1, 0.99], 0.7);

    let faces = store.faces_snapshot(true).unwrap();
    let clusterer = FaceClusterer::new(ClusterParams {
        threshold: 0.6,
        min_cluster_size: 1,
    });
    let clusters = clusterer.cluster(&faces).unwrap();
    assert_eq!(clusters.len(), 2);

    // Commit each proposed cluster as a person.
    for cluster in &clusters {
        let person = graph.create_person("Unnamed person").unwrap();
        let count = graph.assign_faces(&person.id, &cluster.face_ids).unwrap();
        assert_eq!(count, cluster.face_ids.len());
    }

    assert!(store.faces_snapshot(true).unwrap().is_empty());
    assert!(graph.integrity_report().unwrap().is_empty());

    // Clustering the remaining unassigned set yields nothing.
    let leftover = clusterer.cluster(&store.faces_snapshot(true).unwrap()).unwrap();
    assert!(leftover.is_empty());
}

#[test]
fn test_merge_after_clustering_conserves_faces() {
    let (_dir, store) = open_store();
    let graph = IdentityGraph::new(store.clone());

    for (id, image) in [("a1", "img-1"), ("a2", "img-2"), ("b1", "img-3")] {
        seeded_face(&store, id, image, vec![1.0, 0.0], 0.9);
    }

    let alice = graph.create_person("Alice").unwrap();
    let also_alice = graph.create_person("Alice?").unwrap();
    graph
        .assign_faces(&alice.id, &["a1".to_string(), "a2".to_string()])
        .unwrap();
    graph
        .assign_faces(&also_alice.id, &["b1".to_string()])
        .unwrap();

    let merged = graph
        .merge_persons(&alice.id, &[also_alice.id.clone()])
        .unwrap();
    assert_eq!(merged.face_count, 3);
    assert!(store.get_person(&also_alice.id).unwrap().is_none());

    let total: usize = store
        .list_persons()
        .unwrap()
        .iter()
        .map(|s| s.face_count)
        .sum();
    assert_eq!(total, 3);
    assert!(graph.integrity_report().unwrap().is_empty());
}

#[test]
fn test_delete_person_leaves_no_dangling_faces() {
    let (_dir, store) = open_store();
    let graph = IdentityGraph::new(store.clone());
    seeded_face(&store, "f1", "img-1", vec![1.0, 0.0], 0.9);
    seeded_face(&store, "f2", "img-2", vec![1.0, 0.1], 0.9);

    let person = graph.create_person("Temp").unwrap();
    graph
        .assign_faces(&person.id, &["f1".to_string(), "f2".to_string()])
        .unwrap();

    graph.delete_person(&person.id).unwrap();

    for id in ["f1", "f2"] {
        assert!(store.get_face(id).unwrap().unwrap().person_id.is_none());
    }
    assert!(graph.integrity_report().unwrap().is_empty());
}

#[test]
fn test_index_scan_cluster_pipeline() {
    let media = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let store = Arc::new(LibraryStore::open(data.path()).unwrap());

    // Two tiny fixtures and one large: the stub detector groups by size.
    std::fs::write(media.path().join("a.jpg"), b"tiny").unwrap();
    std::fs::write(media.path().join("b.jpg"), b"wee").unwrap();
    std::fs::write(media.path().join("c.jpg"), vec![0u8; 64]).unwrap();

    let indexer = MediaIndexer::new(
        store.clone(),
        media.path().to_path_buf(),
        vec!["jpg".to_string()],
    );
    let report = indexer.sync().unwrap();
    assert_eq!(report.inserted, 3);

    let scanner = FaceScanner::new(
        store.clone(),
        Arc::new(StubDetector),
        media.path().to_path_buf(),
    );
    scanner.start().unwrap();

    // The scan is cooperative and quick; wait for it to drain.
    let deadline = Instant::now() + Duration::from_secs(10);
    while scanner.is_running() {
        assert!(Instant::now() < deadline, "scan did not finish in time");
        std::thread::sleep(Duration::from_millis(20));
    }

    let status = scanner.status();
    assert_eq!(status.total_images, 3);
    assert_eq!(status.processed_images, 3);
    assert_eq!(status.failed_images, 0);

    // A second start is allowed once the first finished; with nothing left
    // to scan it terminates immediately.
    assert!(store.images_needing_scan().unwrap().is_empty());

    let faces = store.faces_snapshot(true).unwrap();
    assert_eq!(faces.len(), 3);

    let clusters = FaceClusterer::with_defaults().cluster(&faces).unwrap();
    assert_eq!(clusters.len(), 2);
    let mut sizes: Vec<usize> = clusters.iter().map(|c| c.face_ids.len()).collect();
    sizes.sort();
    assert_eq!(sizes, vec![1, 2]);
}

#[test]
fn test_rescan_replaces_faces_wholesale() {
    let media = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let store = Arc::new(LibraryStore::open(data.path()).unwrap());

    std::fs::write(media.path().join("a.jpg"), b"tiny").unwrap();
    let indexer = MediaIndexer::new(
        store.clone(),
        media.path().to_path_buf(),
        vec!["jpg".to_string()],
    );
    indexer.sync().unwrap();

    let image = store.image_by_path("a.jpg").unwrap().unwrap();
    // Pretend an earlier scan left stale faces behind.
    seeded_face(&store, "stale", &image.id, vec![1.0, 0.0, 0.0], 0.5);

    let fresh = vec![Face::new(
        &image.id,
        BoundingBox::default(),
        Embedding::new(vec![0.0, 1.0, 0.0]),
        0.9,
    )];
    store.replace_faces_for_image(&image.id, &fresh).unwrap();

    let faces = store.faces_for_image(&image.id).unwrap();
    assert_eq!(faces.len(), 1);
    assert_ne!(faces[0].id, "stale");
    assert!(store.get_image(&image.id).unwrap().unwrap().last_scanned.is_some());
}
