//! Reference plugin implementations.
//!
//! Clustering, association, and shower-profile plugins are external
//! collaborators supplied by the enclosing framework's plugin loader.
//! `pflow-cli` has no such loader (it is a thin exerciser, not the real
//! framework), so it needs *some* concrete implementation of each
//! trait to run a pipeline end to end, and the test suite needs the same
//! to drive reclustering and photon-reconstruction operators without a
//! mock for every scenario. These are deliberately simple — nearest-hit
//! agglomeration, distance-based association, radial-bin profiling —
//! the kind of baseline algorithm a real clustering/profile plugin would
//! be benchmarked against, not a competitor to one.

use crate::manager::CaloHitStore;
use crate::model::{Cluster, ClusterId, HitId, ShowerPeak, ShowerPeakList, Track};
use rustc_hash::FxHashMap;

use super::{AssociationPlugin, ClusteringPlugin, ShowerProfilePlugin};

/// Greedy single-linkage clustering: repeatedly pick an unclustered hit,
/// grow its group by absorbing every unclustered hit within
/// `link_distance` of any hit already in the group, until no more join.
#[derive(Clone, Debug)]
pub struct NearestNeighbourClustering {
    /// Maximum distance (mm) between two hits for them to join the same
    /// group.
    pub link_distance: f64,
}

impl Default for NearestNeighbourClustering {
    fn default() -> Self {
        Self { link_distance: 50.0 }
    }
}

impl ClusteringPlugin for NearestNeighbourClustering {
    fn run(&self, store: &CaloHitStore, available_hits: &[HitId]) -> Vec<Vec<HitId>> {
        let mut remaining: Vec<HitId> = available_hits.to_vec();
        let mut groups = Vec::new();
        while let Some(seed) = remaining.pop() {
            let mut group = vec![seed];
            loop {
                let mut grew = false;
                let mut i = 0;
                while i < remaining.len() {
                    let hit = remaining[i];
                    let close = group
                        .iter()
                        .any(|&g| store.get(g).position.distance(store.get(hit).position) <= self.link_distance);
                    if close {
                        group.push(hit);
                        remaining.swap_remove(i);
                        grew = true;
                    } else {
                        i += 1;
                    }
                }
                if !grew {
                    break;
                }
            }
            groups.push(group);
        }
        groups
    }
}

/// Associates each unassociated track to the cluster whose nearest hit
/// (to the track's calorimeter-face position) is within
/// `max_association_distance`, picking the closest such cluster.
#[derive(Clone, Debug)]
pub struct DistanceAssociation {
    /// Maximum distance (mm) from a track's calorimeter-face position to
    /// a cluster's nearest hit for association to be made.
    pub max_association_distance: f64,
}

impl Default for DistanceAssociation {
    fn default() -> Self {
        Self { max_association_distance: 100.0 }
    }
}

impl AssociationPlugin for DistanceAssociation {
    fn run(&self, clusters: &mut FxHashMap<ClusterId, Cluster>, tracks: &[Track]) {
        // No access to a CaloHitStore here; fall back to layer centroids, which every
        // cluster already carries after `recompute_derived`.
        for (track_index, track) in tracks.iter().enumerate() {
            if track.associated_cluster.is_some() {
                continue;
            }
            let target = track.state_at_calorimeter.position;
            let mut best: Option<(ClusterId, f64)> = None;
            for (&id, cluster) in clusters.iter() {
                let Some(layer) = cluster.hits().inner_layer() else { continue };
                let Some(centroid) = cluster.layer_centroid(layer) else { continue };
                let d = centroid.distance(target);
                if best.is_none_or(|(_, best_d)| d < best_d) {
                    best = Some((id, d));
                }
            }
            if let Some((id, d)) = best {
                if d <= self.max_association_distance {
                    if let Some(cluster) = clusters.get_mut(&id) {
                        let track_id = crate::model::TrackId::from_index(track_index as u32);
                        if !cluster.tracks().contains(&track_id) {
                            cluster.tracks_mut().push(track_id);
                        }
                    }
                }
            }
        }
    }
}

/// Bins a cluster's hits radially about its centroid in the first
/// occupied layer and reports each non-empty ring as one shower peak,
/// ordered by descending summed energy.
#[derive(Clone, Debug)]
pub struct ConeProfilePlugin {
    /// Width of each radial ring (mm).
    pub ring_width: f64,
}

impl Default for ConeProfilePlugin {
    fn default() -> Self {
        Self { ring_width: 10.0 }
    }
}

impl ShowerProfilePlugin for ConeProfilePlugin {
    fn calculate_transverse_profile(&self, cluster: &Cluster, store: &CaloHitStore, max_layer: u32) -> ShowerPeakList {
        let Some(inner) = cluster.hits().inner_layer() else { return Vec::new() };
        let Some(centre) = cluster.layer_centroid(inner) else { return Vec::new() };

        let mut rings: Vec<(f64, f64, Vec<HitId>)> = Vec::new(); // (energy, sum_r2, hits)
        for (layer, hit_ids) in cluster.hits().layers() {
            if layer > max_layer {
                break;
            }
            for &id in hit_ids {
                let hit = store.get(id);
                let r = hit.position.distance(centre);
                let ring_index = (r / self.ring_width).floor() as usize;
                while rings.len() <= ring_index {
                    rings.push((0.0, 0.0, Vec::new()));
                }
                let entry = &mut rings[ring_index];
                entry.0 += hit.energy();
                entry.1 += r * r;
                entry.2.push(id);
            }
        }

        let mut peaks: Vec<ShowerPeak> = rings
            .into_iter()
            .filter(|(_, _, hits)| !hits.is_empty())
            .map(|(energy, sum_r2, hits)| {
                let n = hits.len() as f64;
                let rms = (sum_r2 / n).sqrt();
                ShowerPeak { energy, rms, hits }
            })
            .collect();
        peaks.sort_by(|a, b| b.energy.partial_cmp(&a.energy).unwrap_or(std::cmp::Ordering::Equal));
        peaks
    }
}
