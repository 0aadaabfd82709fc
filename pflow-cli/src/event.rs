//! On-disk event format: the calo hits, tracks, and preliminary cluster
//! grouping a real input-ingestion collaborator would hand the core
//! pipeline before any operator runs.

use anyhow::{bail, Result};
use pflow_core::manager::{CaloHitStore, ClusterManager, TrackStore};
use pflow_core::model::{CaloHit, Cluster, HitId, OrderedCaloHitList, Track};
use serde::Deserialize;

/// One event: a flat hit list, a flat track list, and the preliminary
/// clustering (each entry a list of indices into `hits`) that the
/// upstream clustering plugin already produced.
#[derive(Clone, Debug, Deserialize)]
pub struct EventFile {
    /// Calo hits, in arbitrary order; referenced by index below.
    pub hits: Vec<CaloHit>,
    /// Extrapolated tracks, in arbitrary order.
    #[serde(default)]
    pub tracks: Vec<Track>,
    /// Preliminary clusters, each a list of indices into `hits`.
    pub seed_clusters: Vec<Vec<usize>>,
}

impl EventFile {
    /// Build a [`ClusterManager`] from this event, validating that every
    /// seed-cluster hit index is in range and that no hit is claimed by
    /// more than one seed cluster.
    ///
    /// # Errors
    /// Returns an error if a hit index is out of range or claimed twice.
    pub fn into_manager(self) -> Result<ClusterManager> {
        let n_hits = self.hits.len();
        let mut claimed = vec![false; n_hits];
        let mut clusters = Vec::with_capacity(self.seed_clusters.len());
        for group in &self.seed_clusters {
            if group.is_empty() {
                continue;
            }
            let mut ordered = OrderedCaloHitList::new();
            for &index in group {
                if index >= n_hits {
                    bail!("seed cluster references out-of-range hit index {index}");
                }
                if std::mem::replace(&mut claimed[index], true) {
                    bail!("hit index {index} appears in more than one seed cluster");
                }
                ordered.insert(self.hits[index].pseudo_layer, HitId::from_index(index as u32));
            }
            clusters.push(Cluster::from_hits(ordered));
        }
        let hit_store = CaloHitStore::new(self.hits);
        let track_store = TrackStore::new(self.tracks);
        Ok(ClusterManager::new(hit_store, track_store, clusters))
    }
}
