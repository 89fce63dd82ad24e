//! Embedding-similarity clustering of face detections.
//!
//! A pure function from a set of faces to a partition into candidate
//! identities: unit-normalize the embeddings, build the pairwise cosine
//! distance matrix, run average-linkage agglomerative clustering, and cut
//! the merge tree at `1 - threshold`. Nothing here mutates faces or touches
//! storage; callers commit the proposed grouping through the identity graph.

use ordered_float::OrderedFloat;
use rayon::prelude::*;
use std::cmp::Reverse;

use crate::error::{Error, Result};
use crate::face::Face;

/// Clustering parameters.
///
/// A higher `threshold` is stricter: more, smaller clusters. `threshold = 0`
/// tends toward one giant cluster, `threshold = 1` toward singletons unless
/// faces are exact duplicates.
#[derive(Debug, Clone, Copy)]
pub struct ClusterParams {
    /// Cosine similarity threshold in [0, 1].
    pub threshold: f32,
    /// Minimum member count for a cluster to be reported.
    pub min_cluster_size: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            min_cluster_size: 1,
        }
    }
}

/// One proposed identity: a non-empty set of face ids plus the member that
/// best represents the cluster (highest detector confidence, ties broken by
/// lowest face id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceCluster {
    pub cluster_id: u32,
    pub face_ids: Vec<String>,
    pub representative_face_id: String,
}

/// Average-linkage agglomerative clusterer over face embeddings.
pub struct FaceClusterer {
    params: ClusterParams,
}

impl FaceClusterer {
    #[inline]
    #[must_use]
    pub fn new(params: ClusterParams) -> Self {
        Self { params }
    }

    #[inline]
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(ClusterParams::default())
    }

    /// Cluster `faces` into candidate identities.
    ///
    /// Output ordering is fully deterministic: member ids are sorted
    /// ascending, clusters are sorted by descending size with ties broken by
    /// ascending lowest member id, and `cluster_id` is assigned 1..k in that
    /// final order.
    pub fn cluster(&self, faces: &[Face]) -> Result<Vec<FaceCluster>> {
        let threshold = self.params.threshold;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(Error::InvalidThreshold(threshold));
        }
        if self.params.min_cluster_size == 0 {
            return Err(Error::InvalidArgument(
                "min_cluster_size must be at least 1".to_string(),
            ));
        }

        if faces.is_empty() {
            return Ok(Vec::new());
        }
        if faces.len() == 1 {
            let face = &faces[0];
            if face.embedding.is_zero_norm() {
                return Err(Error::ZeroNormEmbedding(face.id.clone()));
            }
            let cluster = FaceCluster {
                cluster_id: 1,
                face_ids: vec![face.id.clone()],
                representative_face_id: face.id.clone(),
            };
            return Ok(if self.params.min_cluster_size <= 1 {
                vec![cluster]
            } else {
                Vec::new()
            });
        }

        let units = unit_embeddings(faces)?;
        let dist = distance_matrix(&units);
        let labels = average_linkage_cut(dist, 1.0 - threshold);
        Ok(self.build_clusters(faces, &labels))
    }

    /// Group faces by partition label, filter by size, pick representatives
    /// and impose the documented deterministic ordering.
    fn build_clusters(&self, faces: &[Face], labels: &[usize]) -> Vec<FaceCluster> {
        let group_count = labels.iter().copied().max().map_or(0, |m| m + 1);
        let mut groups: Vec<Vec<&Face>> = vec![Vec::new(); group_count];
        for (idx, &label) in labels.iter().enumerate() {
            groups[label].push(&faces[idx]);
        }

        let mut clusters: Vec<(Vec<String>, String)> = groups
            .into_iter()
            .filter(|members| !members.is_empty() && members.len() >= self.params.min_cluster_size)
            .map(|members| {
                let representative = members
                    .iter()
                    .max_by_key(|f| (OrderedFloat(f.confidence), Reverse(f.id.clone())))
                    .map(|f| f.id.clone())
                    .unwrap_or_default();
                let mut ids: Vec<String> = members.iter().map(|f| f.id.clone()).collect();
                ids.sort();
                (ids, representative)
            })
            .collect();

        clusters.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a[0].cmp(&b[0])));

        clusters
            .into_iter()
            .enumerate()
            .map(|(idx, (face_ids, representative_face_id))| FaceCluster {
                cluster_id: (idx + 1) as u32,
                face_ids,
                representative_face_id,
            })
            .collect()
    }
}

/// Unit-normalize every embedding, rejecting dimension mismatches and
/// zero-norm vectors before any matrix work.
fn unit_embeddings(faces: &[Face]) -> Result<Vec<Vec<f32>>> {
    let dim = faces[0].embedding.dim();
    faces
        .iter()
        .map(|face| {
            if face.embedding.dim() != dim {
                return Err(Error::InvalidDimension {
                    expected: dim,
                    actual: face.embedding.dim(),
                });
            }
            face.embedding
                .unit()
                .ok_or_else(|| Error::ZeroNormEmbedding(face.id.clone()))
        })
        .collect()
}

/// Full pairwise cosine-distance matrix over unit vectors: `d = 1 - a·b`,
/// clamped at zero against float drift. O(n^2) memory by design.
fn distance_matrix(units: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let n = units.len();
    (0..n)
        .into_par_iter()
        .map(|i| {
            (0..n)
                .map(|j| {
                    if i == j {
                        return 0.0;
                    }
                    let dot: f32 = units[i]
                        .iter()
                        .zip(units[j].iter())
                        .map(|(a, b)| a * b)
                        .sum();
                    (1.0 - dot).max(0.0)
                })
                .collect()
        })
        .collect()
}

/// Average-linkage agglomerative clustering with a distance cut.
///
/// Greedily merges the two closest clusters while the minimum inter-cluster
/// distance stays within `cut`, updating distances with the Lance-Williams
/// average rule. Average linkage is monotone, so stopping at `cut` yields
/// the same flat partition as cutting the full dendrogram there.
///
/// Returns a partition label per input row; labels are contiguous and
/// numbered by lowest member index.
fn average_linkage_cut(mut dist: Vec<Vec<f32>>, cut: f32) -> Vec<usize> {
    let n = dist.len();
    let mut active: Vec<bool> = vec![true; n];
    let mut members: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();

    loop {
        let mut best: Option<(usize, usize, f32)> = None;
        for i in 0..n {
            if !active[i] {
                continue;
            }
            for j in (i + 1)..n {
                if !active[j] {
                    continue;
                }
                let d = dist[i][j];
                if best.map_or(true, |(_, _, bd)| d < bd) {
                    best = Some((i, j, d));
                }
            }
        }

        let Some((i, j, d)) = best else { break };
        if d > cut {
            break;
        }

        let ni = members[i].len() as f32;
        let nj = members[j].len() as f32;
        for k in 0..n {
            if !active[k] || k == i || k == j {
                continue;
            }
            let merged = (ni * dist[i][k] + nj * dist[j][k]) / (ni + nj);
            dist[i][k] = merged;
            dist[k][i] = merged;
        }

        let moved = std::mem::take(&mut members[j]);
        members[i].extend(moved);
        active[j] = false;
    }

    let mut labels = vec![0usize; n];
    let mut next = 0usize;
    for i in 0..n {
        if !active[i] {
            continue;
        }
        for &m in &members[i] {
            labels[m] = next;
        }
        next += 1;
    }
    labels
}
