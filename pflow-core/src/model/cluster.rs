//! [`Cluster`]: an ordered collection of calo hits treated as one shower
//! candidate.

use super::fit::FitResult;
use super::hit::CaloHit;
use super::ids::{HitId, TrackId};
use super::ordered_hit_list::OrderedCaloHitList;
use super::vec3::Vec3;
use std::collections::BTreeMap;

/// Configuration needed to recompute a cluster's derived fields.
#[derive(Clone, Copy, Debug)]
pub struct ClusterDerivedConfig {
    /// Number of innermost occupied layers used for the initial
    /// direction fit.
    pub n_layers_for_initial_direction: usize,
    /// Mip-fraction threshold below which shower development is
    /// considered to have started.
    pub mip_fraction_threshold: f64,
}

impl Default for ClusterDerivedConfig {
    fn default() -> Self {
        Self {
            n_layers_for_initial_direction: 3,
            mip_fraction_threshold: 0.8,
        }
    }
}

/// An ordered collection of calo hits, the unit the refinement pipeline
/// merges, splits, and re-associates.
///
/// Invariants: the ordered list is always consistent with the
/// flat hit set; `inner_pseudo_layer <= outer_pseudo_layer`; isolated
/// hits are a disjoint subset and never contribute to fits.
#[derive(Clone, Debug, Default)]
pub struct Cluster {
    hits: OrderedCaloHitList,
    isolated_hits: Vec<HitId>,
    tracks: Vec<TrackId>,
    initial_direction: Vec3,
    layer_centroids: BTreeMap<u32, Vec3>,
    shower_start_layer: Option<u32>,
    shower_max_layer: Option<u32>,
    is_fixed_photon: bool,
    cached_fit_all: Option<FitResult>,
}

impl Cluster {
    /// Build a cluster from an already-populated ordered hit list.
    #[must_use]
    pub fn from_hits(hits: OrderedCaloHitList) -> Self {
        Self { hits, ..Self::default() }
    }

    /// The non-isolated, ordered hit list.
    #[must_use]
    pub fn hits(&self) -> &OrderedCaloHitList {
        &self.hits
    }

    /// Mutable access, for the manager only (see [`crate::manager`]).
    pub(crate) fn hits_mut(&mut self) -> &mut OrderedCaloHitList {
        &mut self.hits
    }

    /// Hits excluded from geometric measures but still associated
    /// with the cluster for bookkeeping.
    #[must_use]
    pub fn isolated_hits(&self) -> &[HitId] {
        &self.isolated_hits
    }

    pub(crate) fn add_isolated_hit(&mut self, hit: HitId) {
        if !self.isolated_hits.contains(&hit) {
            self.isolated_hits.push(hit);
        }
    }

    /// Tracks associated to this cluster.
    #[must_use]
    pub fn tracks(&self) -> &[TrackId] {
        &self.tracks
    }

    pub(crate) fn tracks_mut(&mut self) -> &mut Vec<TrackId> {
        &mut self.tracks
    }

    /// Direction fit from the first few occupied layers.
    #[must_use]
    pub fn initial_direction(&self) -> Vec3 {
        self.initial_direction
    }

    /// Lowest occupied pseudo-layer.
    #[must_use]
    pub fn inner_pseudo_layer(&self) -> u32 {
        self.hits.inner_layer().unwrap_or(0)
    }

    /// Highest occupied pseudo-layer.
    #[must_use]
    pub fn outer_pseudo_layer(&self) -> u32 {
        self.hits.outer_layer().unwrap_or(0)
    }

    /// First pseudo-layer where mip-fraction drops below the configured
    /// threshold: the start of shower development.
    #[must_use]
    pub fn shower_start_layer(&self) -> Option<u32> {
        self.shower_start_layer
    }

    /// Pseudo-layer of maximum electromagnetic energy deposit.
    #[must_use]
    pub fn shower_max_layer(&self) -> Option<u32> {
        self.shower_max_layer
    }

    /// Centroid of the hits in `layer`, if occupied.
    #[must_use]
    pub fn layer_centroid(&self, layer: u32) -> Option<Vec3> {
        self.layer_centroids.get(&layer).copied()
    }

    /// Whether this cluster has been tagged as a photon and its
    /// fragments locked against further mip/mixed merging.
    #[must_use]
    pub fn is_fixed_photon(&self) -> bool {
        self.is_fixed_photon
    }

    /// Set or clear the fixed-photon flag.
    pub fn set_fixed_photon(&mut self, value: bool) {
        self.is_fixed_photon = value;
    }

    /// Cached fit-to-all-hits result, if [`Self::recompute_derived`] has
    /// been called since the last mutation.
    #[must_use]
    pub fn cached_fit_all(&self) -> Option<&FitResult> {
        self.cached_fit_all.as_ref()
    }

    pub(crate) fn set_cached_fit_all(&mut self, fit: FitResult) {
        self.cached_fit_all = Some(fit);
    }

    pub(crate) fn invalidate_cache(&mut self) {
        self.cached_fit_all = None;
    }

    /// Total electromagnetic-scale energy.
    #[must_use]
    pub fn em_energy(&self, resolve: impl Fn(HitId) -> f64) -> f64 {
        self.all_hit_ids().map(resolve).sum()
    }

    /// Total hadronic-scale energy, summed over both ordinary and
    /// isolated hits.
    #[must_use]
    pub fn hadronic_energy(&self, resolve: impl Fn(HitId) -> f64) -> f64 {
        self.all_hit_ids().map(resolve).sum()
    }

    /// All hit ids, non-isolated then isolated.
    pub fn all_hit_ids(&self) -> impl Iterator<Item = HitId> + '_ {
        self.hits.iter_all().chain(self.isolated_hits.iter().copied())
    }

    /// Total calorimetric energy (EM + hadronic), summed over both
    /// ordinary and isolated hits.
    #[must_use]
    pub fn energy(&self, store: &[CaloHit]) -> f64 {
        self.all_hit_ids().map(|id| store[id.index()].energy()).sum()
    }

    /// Recompute initial direction, per-layer centroids, shower-start and
    /// shower-max layers from the current hit set. Must be called by the
    /// manager after any mutation before cached derived fields are read.
    pub fn recompute_derived(&mut self, store: &[CaloHit], config: &ClusterDerivedConfig) {
        self.layer_centroids.clear();
        let mut mip_by_layer: BTreeMap<u32, (f64, f64)> = BTreeMap::new(); // (mip, em)
        for (layer, hit_ids) in self.hits.layers() {
            let mut sum = Vec3::zero();
            let mut n = 0.0;
            let mut mip = 0.0;
            let mut em = 0.0;
            for &id in hit_ids {
                let hit = &store[id.index()];
                sum = sum + hit.position;
                n += 1.0;
                mip += hit.mip_energy;
                em += hit.electromagnetic_energy;
            }
            if n > 0.0 {
                self.layer_centroids.insert(layer, sum * (1.0 / n));
            }
            mip_by_layer.insert(layer, (mip, em));
        }

        self.shower_start_layer = mip_by_layer
            .iter()
            .find(|(_, (mip, em))| {
                let total = mip + em;
                total > 0.0 && mip / total < config.mip_fraction_threshold
            })
            .map(|(&layer, _)| layer);

        self.shower_max_layer = mip_by_layer
            .iter()
            .max_by(|a, b| a.1 .1.partial_cmp(&b.1 .1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(&layer, _)| layer);

        let n_first = config.n_layers_for_initial_direction;
        let first_layers: Vec<u32> = self.hits.layers().map(|(l, _)| l).take(n_first).collect();
        if let (Some(&first), Some(&last)) = (first_layers.first(), first_layers.last()) {
            if first != last {
                if let (Some(a), Some(b)) =
                    (self.layer_centroids.get(&first), self.layer_centroids.get(&last))
                {
                    self.initial_direction = (*b - *a).normalized();
                }
            }
        }
    }
}
