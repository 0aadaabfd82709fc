//! The cluster manager: the single mutator of hits, clusters, and track
//! associations.
//!
//! Every operator receives a `&mut ClusterManager` and never constructs a
//! `Cluster`/`CaloHit`/`Track` mutation any other way. This is the
//! package-private "mutable view" the design notes call for: read-only
//! code gets `&ClusterManager` and calls the `get_*` accessors; mutators
//! go through the methods below, which keep the availability bitmap and
//! the symmetric track/cluster association in lock-step.

use crate::error::{Error, Result};
use crate::fitting;
use crate::model::cluster::ClusterDerivedConfig;
use crate::model::ordered_hit_list::OrderedCaloHitList;
use crate::model::{CaloHit, Cluster, ClusterId, HitId, Track, TrackId};
use rustc_hash::FxHashMap;

/// Recompute a cluster's derived geometric fields and its cached
/// fit-to-all-hits result. A fit failure (too few points, degenerate layout) simply
/// leaves the cache empty rather than aborting the mutation.
fn refresh_derived(cluster: &mut Cluster, hits: &CaloHitStore, config: &ClusterDerivedConfig) {
    cluster.recompute_derived(hits.as_slice(), config);
    match fitting::fit_all(cluster, hits) {
        Ok(fit) => cluster.set_cached_fit_all(fit),
        Err(_) => cluster.invalidate_cache(),
    }
}

/// Arena of calo hits plus the per-hit availability bitmap.
#[derive(Clone, Debug, Default)]
pub struct CaloHitStore {
    hits: Vec<CaloHit>,
    available: Vec<bool>,
}

impl CaloHitStore {
    /// Build a store from a flat vector of hits, all initially
    /// available.
    #[must_use]
    pub fn new(hits: Vec<CaloHit>) -> Self {
        let available = vec![true; hits.len()];
        Self { hits, available }
    }

    /// Read-only access to a hit.
    #[must_use]
    pub fn get(&self, id: HitId) -> &CaloHit {
        &self.hits[id.index()]
    }

    /// Mutable access to a hit (for [`crate::hit_properties`] to fill in
    /// the `Option` fields it computes).
    pub fn get_mut(&mut self, id: HitId) -> &mut CaloHit {
        &mut self.hits[id.index()]
    }

    /// All hit ids, in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = HitId> {
        (0..self.hits.len()).map(|i| HitId::from_index(i as u32))
    }

    /// Whether a hit is currently unassigned to any cluster.
    #[must_use]
    pub fn is_available(&self, id: HitId) -> bool {
        self.available[id.index()]
    }

    fn set_available(&mut self, id: HitId, value: bool) {
        self.available[id.index()] = value;
    }

    /// The underlying slice, for bulk read-only computations (e.g.
    /// [`Cluster::recompute_derived`]).
    #[must_use]
    pub fn as_slice(&self) -> &[CaloHit] {
        &self.hits
    }
}

/// Arena of tracks.
#[derive(Clone, Debug, Default)]
pub struct TrackStore {
    tracks: Vec<Track>,
}

impl TrackStore {
    /// Build a store from a flat vector of tracks.
    #[must_use]
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    /// Read-only access to a track.
    #[must_use]
    pub fn get(&self, id: TrackId) -> &Track {
        &self.tracks[id.index()]
    }

    /// All track ids, in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = TrackId> {
        (0..self.tracks.len()).map(|i| TrackId::from_index(i as u32))
    }

    /// The underlying slice, for bulk read-only computations.
    #[must_use]
    pub fn as_slice(&self) -> &[Track] {
        &self.tracks
    }
}

/// A named cluster list: the unit reclustering/fragmentation transactions
/// snapshot and swap.
#[derive(Clone, Debug, Default)]
struct ClusterArena {
    clusters: FxHashMap<ClusterId, Cluster>,
    next_id: u32,
}

impl ClusterArena {
    fn insert(&mut self, cluster: Cluster) -> ClusterId {
        let id = ClusterId::from_index(self.next_id);
        self.next_id += 1;
        self.clusters.insert(id, cluster);
        id
    }
}

/// Owns the current cluster population, the calo-hit store, the track
/// store, and mediates every mutation.
pub struct ClusterManager {
    hits: CaloHitStore,
    tracks: TrackStore,
    current: ClusterArena,
    saved_lists: FxHashMap<String, FxHashMap<ClusterId, Cluster>>,
    derived_config: ClusterDerivedConfig,
    transactions: FxHashMap<u32, TransactionState>,
    next_txn_id: u32,
}

/// A scoped reclustering or fragmentation transaction.
///
/// Opened by [`ClusterManager::initialize_transaction`]; every candidate
/// grouping tried inside it is kept off the live `current` population
/// until [`ClusterManager::end_transaction`] commits exactly one (or the
/// original seed, restoring the pre-transaction state bit-for-bit).
pub struct TransactionHandle(u32);

/// A candidate cluster grouping registered inside a transaction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CandidateId(u32);

struct TransactionState {
    /// The clusters in `current` that are *not* part of the seed, stashed
    /// here because `preview_candidate` must make a candidate list look
    /// like the entire "current list" to association algorithms, exactly
    /// as running a clustering algorithm does in the source framework.
    rest_of_event: FxHashMap<ClusterId, Cluster>,
    seed_clusters: FxHashMap<ClusterId, Cluster>,
    /// Every hit released from the seed clusters, available to whatever
    /// candidate groupings are tried.
    pool: Vec<HitId>,
    candidates: FxHashMap<u32, FxHashMap<ClusterId, Cluster>>,
    next_candidate_id: u32,
}

impl ClusterManager {
    /// Build a manager from an event's hits, tracks, and seed clusters.
    #[must_use]
    pub fn new(mut hits: CaloHitStore, tracks: TrackStore, seed_clusters: Vec<Cluster>) -> Self {
        let mut current = ClusterArena::default();
        for mut cluster in seed_clusters {
            for hit in cluster.all_hit_ids() {
                hits.set_available(hit, false);
            }
            refresh_derived(&mut cluster, &hits, &ClusterDerivedConfig::default());
            current.insert(cluster);
        }
        Self {
            hits,
            tracks,
            current,
            saved_lists: FxHashMap::default(),
            derived_config: ClusterDerivedConfig::default(),
            transactions: FxHashMap::default(),
            next_txn_id: 0,
        }
    }

    fn build_cluster_from_hits(&mut self, hit_ids: &[HitId]) -> Result<Cluster> {
        if hit_ids.is_empty() {
            return Err(Error::InvalidParameter("cannot create cluster from empty hit set".into()));
        }
        let mut ordered = OrderedCaloHitList::new();
        for &id in hit_ids {
            ordered.insert(self.hits.get(id).pseudo_layer, id);
        }
        let mut cluster = Cluster::from_hits(ordered);
        refresh_derived(&mut cluster, &self.hits, &self.derived_config);
        Ok(cluster)
    }

    /// `initialize_reclustering` / `initialize_fragmentation`: snapshot
    /// `seed` out of the current list, freeing their hits for clustering
    /// candidates within the transaction.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if any id in `seed` is not live.
    pub fn initialize_transaction(&mut self, seed: &[ClusterId]) -> Result<TransactionHandle> {
        let mut seed_clusters = FxHashMap::default();
        let mut pool = Vec::new();
        for &id in seed {
            let cluster =
                self.current.clusters.remove(&id).ok_or_else(|| Error::NotFound(format!("cluster {id}")))?;
            for hit in cluster.all_hit_ids() {
                self.hits.set_available(hit, true);
                pool.push(hit);
            }
            seed_clusters.insert(id, cluster);
        }
        let rest_of_event = self.current.clusters.clone();
        let txn_id = self.next_txn_id;
        self.next_txn_id += 1;
        self.transactions.insert(
            txn_id,
            TransactionState { rest_of_event, seed_clusters, pool, candidates: FxHashMap::default(), next_candidate_id: 0 },
        );
        Ok(TransactionHandle(txn_id))
    }

    /// The fixed pool of hits released for this transaction, for a
    /// `ClusteringPlugin` to consume.
    #[must_use]
    pub fn transaction_pool(&self, handle: &TransactionHandle) -> &[HitId] {
        self.transactions.get(&handle.0).map_or(&[], |t| t.pool.as_slice())
    }

    /// `run_clustering`: register a candidate grouping of (a subset of)
    /// the transaction's pool as one named list.
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameter`] if `groups` is empty; callers
    /// that treat "no clusters could be formed" as a non-fatal skip
    /// rather than an error should check `groups.is_empty()` themselves
    /// before calling this.
    pub fn add_candidate(&mut self, handle: &TransactionHandle, groups: Vec<Vec<HitId>>) -> Result<CandidateId> {
        let mut snapshot = FxHashMap::default();
        for group in groups {
            if group.is_empty() {
                continue;
            }
            let cluster = self.build_cluster_from_hits(&group)?;
            let id = ClusterId::from_index(self.current.next_id);
            self.current.next_id += 1;
            snapshot.insert(id, cluster);
        }
        let txn =
            self.transactions.get_mut(&handle.0).ok_or_else(|| Error::NotFound(format!("transaction {}", handle.0)))?;
        let candidate_id = txn.next_candidate_id;
        txn.next_candidate_id += 1;
        txn.candidates.insert(candidate_id, snapshot);
        Ok(CandidateId(candidate_id))
    }

    /// `temporarily_replace_current`: make one candidate's cluster list
    /// "the current list", exactly as a freshly run clustering algorithm's
    /// output becomes the current list. The rest of the event is restored
    /// by [`Self::end_transaction`], not visible while a candidate is
    /// previewed.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if `handle` or `candidate` is unknown.
    pub fn preview_candidate(&mut self, handle: &TransactionHandle, candidate: CandidateId) -> Result<()> {
        let txn = self.transactions.get(&handle.0).ok_or_else(|| Error::NotFound(format!("transaction {}", handle.0)))?;
        let snapshot = txn
            .candidates
            .get(&candidate.0)
            .ok_or_else(|| Error::NotFound(format!("candidate {}", candidate.0)))?
            .clone();
        self.current.clusters = snapshot;
        Ok(())
    }

    /// The cluster ids belonging to one registered candidate, without
    /// previewing it.
    #[must_use]
    pub fn candidate_cluster_ids(&self, handle: &TransactionHandle, candidate: CandidateId) -> Vec<ClusterId> {
        self.transactions
            .get(&handle.0)
            .and_then(|t| t.candidates.get(&candidate.0))
            .map(|c| c.keys().copied().collect())
            .unwrap_or_default()
    }

    /// `end_reclustering` / `end_fragmentation`: commit exactly one
    /// outcome and destroy every other candidate. `winner = None` means
    /// "keep the original seed", restoring the cluster list to what it
    /// was bit-for-bit before [`Self::initialize_transaction`].
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if `handle` (or `winner`, if given) is
    /// unknown.
    pub fn end_transaction(&mut self, handle: TransactionHandle, winner: Option<CandidateId>) -> Result<()> {
        let mut txn = self
            .transactions
            .remove(&handle.0)
            .ok_or_else(|| Error::NotFound(format!("transaction {}", handle.0)))?;

        let mut final_list = std::mem::take(&mut txn.rest_of_event);
        match winner {
            None => {
                for (id, cluster) in txn.seed_clusters {
                    for hit in cluster.all_hit_ids() {
                        self.hits.set_available(hit, false);
                    }
                    final_list.insert(id, cluster);
                }
            }
            Some(candidate) => {
                let snapshot = txn
                    .candidates
                    .remove(&candidate.0)
                    .ok_or_else(|| Error::NotFound(format!("candidate {}", candidate.0)))?;
                for cluster in snapshot.values() {
                    for hit in cluster.all_hit_ids() {
                        self.hits.set_available(hit, false);
                    }
                }
                final_list.extend(snapshot);
            }
        }
        self.current.clusters = final_list;
        Ok(())
    }

    /// Read-only access to the calo-hit store.
    #[must_use]
    pub fn hits(&self) -> &CaloHitStore {
        &self.hits
    }

    /// Mutable access to the calo-hit store, for [`crate::hit_properties`].
    pub fn hits_mut(&mut self) -> &mut CaloHitStore {
        &mut self.hits
    }

    /// Read-only access to the track store.
    #[must_use]
    pub fn tracks(&self) -> &TrackStore {
        &self.tracks
    }

    /// `get_current_list`: every cluster id currently live, sorted by
    /// ascending inner pseudo-layer then by id.
    #[must_use]
    pub fn current_list(&self) -> Vec<ClusterId> {
        let mut ids: Vec<ClusterId> = self.current.clusters.keys().copied().collect();
        ids.sort_by_key(|&id| (self.current.clusters[&id].inner_pseudo_layer(), id));
        ids
    }

    /// Read-only access to a cluster.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if `id` is not in the current list.
    pub fn cluster(&self, id: ClusterId) -> Result<&Cluster> {
        self.current
            .clusters
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("cluster {id}")))
    }

    /// Set or clear a cluster's fixed-photon flag.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if `id` is not in the current list.
    pub fn set_fixed_photon(&mut self, id: ClusterId, value: bool) -> Result<()> {
        self.current
            .clusters
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("cluster {id}")))?
            .set_fixed_photon(value);
        Ok(())
    }

    /// Create a new cluster from a set of (currently available) hits,
    /// marking them unavailable.
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameter`] if `hit_ids` is empty or any
    /// hit is already assigned.
    pub fn create(&mut self, hit_ids: &[HitId]) -> Result<ClusterId> {
        if hit_ids.is_empty() {
            return Err(Error::InvalidParameter("cannot create cluster from empty hit set".into()));
        }
        for &id in hit_ids {
            if !self.hits.is_available(id) {
                return Err(Error::AlreadyPresent(format!("hit {id} already assigned")));
            }
        }
        let mut ordered = crate::model::OrderedCaloHitList::new();
        for &id in hit_ids {
            let layer = self.hits.get(id).pseudo_layer;
            ordered.insert(layer, id);
            self.hits.set_available(id, false);
        }
        let mut cluster = Cluster::from_hits(ordered);
        refresh_derived(&mut cluster, &self.hits, &self.derived_config);
        Ok(self.current.insert(cluster))
    }

    /// `merge_and_delete`: merge `daughter`'s hits, isolated hits, and
    /// track associations into `parent`, then remove `daughter`.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if either id is absent, or
    /// [`Error::Failure`] if `parent == daughter`.
    pub fn merge_and_delete(&mut self, parent: ClusterId, daughter: ClusterId) -> Result<()> {
        if parent == daughter {
            return Err(Error::Failure("cannot merge a cluster into itself".into()));
        }
        let daughter_cluster = self
            .current
            .clusters
            .remove(&daughter)
            .ok_or_else(|| Error::NotFound(format!("cluster {daughter}")))?;
        {
            let parent_cluster = self
                .current
                .clusters
                .get_mut(&parent)
                .ok_or_else(|| Error::NotFound(format!("cluster {parent}")))?;
            let (daughter_hits, daughter_isolated, daughter_tracks) = (
                daughter_cluster.hits().clone(),
                daughter_cluster.isolated_hits().to_vec(),
                daughter_cluster.tracks().to_vec(),
            );
            parent_cluster.hits_mut().merge(daughter_hits);
            for hit in daughter_isolated {
                parent_cluster.add_isolated_hit(hit);
            }
            for track in &daughter_tracks {
                parent_cluster.tracks_mut().push(*track);
            }
            parent_cluster.invalidate_cache();
            for track in daughter_tracks {
                self.tracks.tracks[track.index()].associated_cluster = Some(parent);
            }
        }
        let parent_cluster = self.current.clusters.get_mut(&parent).expect("checked above");
        refresh_derived(parent_cluster, &self.hits, &self.derived_config);
        Ok(())
    }

    /// `delete`: remove a cluster, returning its hits to the available
    /// pool (isolated hits included).
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if `id` is absent.
    pub fn delete(&mut self, id: ClusterId) -> Result<()> {
        let cluster = self
            .current
            .clusters
            .remove(&id)
            .ok_or_else(|| Error::NotFound(format!("cluster {id}")))?;
        for hit in cluster.all_hit_ids() {
            self.hits.set_available(hit, true);
        }
        Ok(())
    }

    /// `add_isolated_to_cluster`: attach `hit` to `cluster` as isolated
    /// (excluded from geometric measures, but still counted toward its
    /// energy).
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if `cluster` is absent, or
    /// [`Error::AlreadyPresent`] if `hit` is already assigned elsewhere.
    pub fn add_isolated_to_cluster(&mut self, cluster: ClusterId, hit: HitId) -> Result<()> {
        if !self.hits.is_available(hit) {
            return Err(Error::AlreadyPresent(format!("hit {hit} already assigned")));
        }
        let c = self
            .current
            .clusters
            .get_mut(&cluster)
            .ok_or_else(|| Error::NotFound(format!("cluster {cluster}")))?;
        c.add_isolated_hit(hit);
        self.hits.set_available(hit, false);
        Ok(())
    }

    /// `add_track_cluster_association`: make `track` and `cluster`
    /// reference each other symmetrically.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if `cluster` is absent, or
    /// [`Error::Failure`] if the track index is out of range.
    pub fn add_track_cluster_association(&mut self, track: TrackId, cluster: ClusterId) -> Result<()> {
        if track.index() >= self.tracks.tracks.len() {
            return Err(Error::Failure(format!("track {track} out of range")));
        }
        let c = self
            .current
            .clusters
            .get_mut(&cluster)
            .ok_or_else(|| Error::NotFound(format!("cluster {cluster}")))?;
        if !c.tracks().contains(&track) {
            c.tracks_mut().push(track);
        }
        self.tracks.tracks[track.index()].associated_cluster = Some(cluster);
        Ok(())
    }

    /// `save_list`: snapshot the current population (or a subset) under
    /// `name`.
    pub fn save_list(&mut self, name: &str, subset: Option<&[ClusterId]>) {
        let snapshot: FxHashMap<ClusterId, Cluster> = match subset {
            Some(ids) => ids
                .iter()
                .filter_map(|id| self.current.clusters.get(id).map(|c| (*id, c.clone())))
                .collect(),
            None => self.current.clusters.clone(),
        };
        self.saved_lists.insert(name.to_owned(), snapshot);
    }

    /// `replace_current_list`: discard the current population and
    /// install a previously saved one.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if `name` was never saved.
    pub fn replace_current_list(&mut self, name: &str) -> Result<()> {
        let list = self
            .saved_lists
            .remove(name)
            .ok_or_else(|| Error::NotFound(format!("list {name}")))?;
        self.current.clusters = list;
        Ok(())
    }

    /// `temporarily_replace_current_list`: like
    /// [`Self::replace_current_list`] but keeps `name` available to be
    /// restored again (used by reclustering to preview a candidate).
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if `name` was never saved.
    pub fn temporarily_replace_current_list(&mut self, name: &str) -> Result<()> {
        let list = self
            .saved_lists
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("list {name}")))?
            .clone();
        self.current.clusters = list;
        Ok(())
    }

    /// Recompute derived fields for every cluster in the current list.
    /// Operators call this after a batch of mutations if they bypassed
    /// [`Self::merge_and_delete`]/[`Self::create`] (which already keep it
    /// current) — e.g. after directly mutating hit properties.
    pub fn recompute_all_derived(&mut self) {
        for cluster in self.current.clusters.values_mut() {
            refresh_derived(cluster, &self.hits, &self.derived_config);
        }
    }

    /// Run an association plugin over just `cluster_ids` (typically a
    /// reclustering candidate's own clusters, previewed as "the current
    /// list") and keep the symmetric track/cluster back-pointers in sync
    /// for the tracks it touches.
    pub fn apply_association_plugin(
        &mut self,
        plugin: &(dyn crate::plugins::AssociationPlugin + Send + Sync),
        cluster_ids: &[ClusterId],
    ) {
        let mut subset: FxHashMap<ClusterId, Cluster> = cluster_ids
            .iter()
            .filter_map(|id| self.current.clusters.get(id).map(|c| (*id, c.clone())))
            .collect();
        plugin.run(&mut subset, &self.tracks.tracks);
        for (id, cluster) in subset {
            for &track in cluster.tracks() {
                self.tracks.tracks[track.index()].associated_cluster = Some(id);
            }
            self.current.clusters.insert(id, cluster);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CellGeometry, HitType, Region, Vec3};

    fn hit(layer: u32) -> CaloHit {
        CaloHit {
            position: Vec3::new(0.0, 0.0, f64::from(layer) * 10.0),
            expected_direction: Vec3::new(0.0, 0.0, 1.0),
            hit_type: HitType::Ecal,
            region: Region::Barrel,
            electromagnetic_energy: 1.0,
            hadronic_energy: 0.0,
            mip_energy: 0.1,
            pseudo_layer: layer,
            cell_geometry: CellGeometry::Rectangular { width: 10.0, length: 10.0 },
            is_isolated: None,
            is_possible_mip: None,
            density_weight: None,
            surrounding_energy: None,
            mc_particle_weights: std::collections::HashMap::new(),
        }
    }

    #[test]
    fn merge_and_delete_combines_energy_and_removes_daughter() {
        let store = CaloHitStore::new(vec![hit(1), hit(2), hit(3)]);
        let mut manager = ClusterManager::new(store, TrackStore::new(vec![]), vec![]);
        let parent = manager.create(&[HitId::from_index(0)]).unwrap();
        let daughter = manager.create(&[HitId::from_index(1)]).unwrap();
        let parent_e_before = manager.cluster(parent).unwrap().energy(manager.hits().as_slice());
        let daughter_e = manager.cluster(daughter).unwrap().energy(manager.hits().as_slice());

        manager.merge_and_delete(parent, daughter).unwrap();

        assert!(manager.cluster(daughter).is_err());
        let parent_e_after = manager.cluster(parent).unwrap().energy(manager.hits().as_slice());
        assert!((parent_e_after - (parent_e_before + daughter_e)).abs() < 1e-9);
    }

    #[test]
    fn hit_belongs_to_at_most_one_cluster() {
        let store = CaloHitStore::new(vec![hit(1)]);
        let mut manager = ClusterManager::new(store, TrackStore::new(vec![]), vec![]);
        let _c1 = manager.create(&[HitId::from_index(0)]).unwrap();
        assert!(manager.create(&[HitId::from_index(0)]).is_err());
    }

    #[test]
    fn aborted_transaction_restores_original_bit_for_bit() {
        let store = CaloHitStore::new(vec![hit(1), hit(2), hit(3)]);
        let mut manager = ClusterManager::new(store, TrackStore::new(vec![]), vec![]);
        let seed = manager.create(&[HitId::from_index(0), HitId::from_index(1)]).unwrap();
        let untouched = manager.create(&[HitId::from_index(2)]).unwrap();
        let before = manager.current_list();

        let handle = manager.initialize_transaction(&[seed]).unwrap();
        let pool = manager.transaction_pool(&handle).to_vec();
        let candidate = manager.add_candidate(&handle, vec![vec![pool[0]], vec![pool[1]]]).unwrap();
        manager.preview_candidate(&handle, candidate).unwrap();
        assert_eq!(manager.current_list().len(), 2);
        manager.end_transaction(handle, None).unwrap();

        let after = manager.current_list();
        assert_eq!(before, after);
        assert!(manager.cluster(untouched).is_ok());
        assert!(manager.cluster(seed).is_ok());
    }

    #[test]
    fn committed_candidate_replaces_seed() {
        let store = CaloHitStore::new(vec![hit(1), hit(2)]);
        let mut manager = ClusterManager::new(store, TrackStore::new(vec![]), vec![]);
        let seed = manager.create(&[HitId::from_index(0), HitId::from_index(1)]).unwrap();

        let handle = manager.initialize_transaction(&[seed]).unwrap();
        let pool = manager.transaction_pool(&handle).to_vec();
        let candidate = manager.add_candidate(&handle, vec![vec![pool[0]], vec![pool[1]]]).unwrap();
        manager.end_transaction(handle, Some(candidate)).unwrap();

        assert!(manager.cluster(seed).is_err());
        assert_eq!(manager.current_list().len(), 2);
    }
}
