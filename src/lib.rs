//! # photonest
//!
//! A personal photo library service with face identity resolution.
//!
//! photonest indexes your image files, asks an external detector for face
//! bounding boxes and embeddings, groups similar faces into candidate
//! identities, and maintains the durable many-faces-to-one-person graph.
//!
//! ## Quick Start
//!
//! ### As a Server
//!
//! ```bash
//! cargo install photonest
//! photonest --library-root ~/Pictures --http-port 8080
//! ```
//!
//! ### As a Library
//!
//! ```rust
//! use photonest::prelude::*;
//!
//! // Build some faces (normally produced by a detector during a scan).
//! let faces = vec![
//!     Face::new("img-1", BoundingBox::default(), Embedding::new(vec![1.0, 0.0]), 0.9),
//!     Face::new("img-2", BoundingBox::default(), Embedding::new(vec![0.99, 0.1]), 0.8),
//! ];
//!
//! // Propose candidate identities.
//! let clusterer = FaceClusterer::new(ClusterParams { threshold: 0.6, min_cluster_size: 1 });
//! let clusters = clusterer.cluster(&faces).unwrap();
//! assert_eq!(clusters.len(), 1);
//! ```
//!
//! ## Crate Structure
//!
//! photonest is composed of several crates:
//!
//! - [`photonest-core`](https://docs.rs/photonest-core) - Data model, embedding math, clustering
//! - [`photonest-storage`](https://docs.rs/photonest-storage) - LMDB store, identity graph, scan pipeline
//! - [`photonest-api`](https://docs.rs/photonest-api) - REST API
//!
//! ## Features
//!
//! - **Similarity Clustering**: Average-linkage grouping of face embeddings
//! - **Identity Graph**: Transactional assign/detach/merge/delete with strict invariants
//! - **Background Scanning**: One cooperative scan task with live progress
//! - **Media Indexing**: Checksummed filesystem reconciliation
//! - **Thumbnails**: Cached multi-size rendering

// Re-export core types
pub use photonest_core::{
    BoundingBox, ClusterParams, Detection, Embedding, Error, Face, FaceCluster, FaceClusterer,
    FaceDetector, ImageRecord, Person, PersonSummary, Result,
};

// Re-export storage
pub use photonest_storage::{
    FaceScanner, FaceStatus, IdentityGraph, LibraryStore, MediaIndexer, RemoteDetector,
    ScanStatus, SyncReport, ThumbnailCache, ThumbnailSize, UnconfiguredDetector,
};

// Re-export API
pub use photonest_api::{ApiContext, RestApi};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ApiContext, BoundingBox, ClusterParams, Detection, Embedding, Error, Face, FaceCluster,
        FaceClusterer, FaceDetector, FaceScanner, FaceStatus, IdentityGraph, ImageRecord,
        LibraryStore, MediaIndexer, Person, PersonSummary, RemoteDetector, RestApi, Result,
        ScanStatus, SyncReport, ThumbnailCache, ThumbnailSize,
    };
}
