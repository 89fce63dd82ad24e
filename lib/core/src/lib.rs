//! # photonest Core
//!
//! Core library for the photonest photo service.
//!
//! This crate provides the data model and the algorithmic heart of the
//! face identity resolution engine:
//!
//! - [`Embedding`] - Fixed-dimension face embedding with a precomputed L2 norm
//! - [`Face`] / [`Person`] / [`ImageRecord`] - The library data model
//! - [`FaceClusterer`] - Average-linkage clustering of faces into candidate identities
//! - [`FaceDetector`] - The boundary trait for the external detection collaborator
//!
//! ## Example
//!
//! ```rust
//! use photonest_core::{BoundingBox, ClusterParams, Embedding, Face, FaceClusterer};
//!
//! let faces = vec![
//!     Face::new("img-1", BoundingBox::default(), Embedding::new(vec![1.0, 0.0]), 0.9),
//!     Face::new("img-2", BoundingBox::default(), Embedding::new(vec![0.99, 0.1]), 0.8),
//! ];
//!
//! let clusterer = FaceClusterer::new(ClusterParams { threshold: 0.6, min_cluster_size: 1 });
//! let clusters = clusterer.cluster(&faces).unwrap();
//! assert_eq!(clusters.len(), 1);
//! ```

pub mod cluster;
pub mod detector;
pub mod embedding;
pub mod error;
pub mod face;
pub mod image;
pub mod person;

pub use cluster::{ClusterParams, FaceCluster, FaceClusterer};
pub use detector::{Detection, FaceDetector};
pub use embedding::Embedding;
pub use error::{Error, Result};
pub use face::{BoundingBox, Face};
pub use image::ImageRecord;
pub use person::{Person, PersonSummary};
