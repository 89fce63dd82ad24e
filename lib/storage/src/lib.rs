//! # photonest Storage
//!
//! Storage layer for the photonest photo service:
//!
//! - [`LibraryStore`] - LMDB-backed store for faces, persons and images
//! - [`IdentityGraph`] - Transactional Face/Person association manager
//! - [`FaceScanner`] - Cooperative background face detection task
//! - [`MediaIndexer`] - Filesystem/image-table reconciliation
//! - [`ThumbnailCache`] - On-disk thumbnail rendering cache
//! - [`RemoteDetector`] - HTTP client for a remote detection accelerator

pub mod detector;
pub mod identity;
pub mod indexer;
pub mod scanner;
pub mod store;
pub mod thumbs;

pub use detector::{RemoteDetector, UnconfiguredDetector};
pub use identity::IdentityGraph;
pub use indexer::{MediaIndexer, SyncReport};
pub use scanner::{FaceScanner, ScanStatus};
pub use store::{FaceStatus, LibraryStore};
pub use thumbs::{ThumbnailCache, ThumbnailSize};
