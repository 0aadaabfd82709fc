//! Plugin traits consumed from the enclosing framework: object
//! safe so the host can register an open set of them by name, unlike the
//! closed `#[enum_dispatch]` operator set in [`crate::pipeline`].

pub mod reference;

use crate::manager::CaloHitStore;
use crate::model::{Cluster, HitId, ShowerPeakList, Track};
use rustc_hash::FxHashMap;

/// Runs a clustering algorithm over the currently available hits and
/// returns the clusters it formed.
pub trait ClusteringPlugin {
    /// Cluster `available_hits` (already filtered to the hits the
    /// reclustering/fragmentation transaction exposed) into zero or more
    /// groups. An empty return means "no clusters could be formed".
    fn run(&self, store: &CaloHitStore, available_hits: &[HitId]) -> Vec<Vec<HitId>>;
}

/// Refreshes track-cluster associations over a cluster list, used only
/// for its side effect.
pub trait AssociationPlugin {
    /// Recompute and apply track-cluster associations in place.
    fn run(&self, clusters: &mut FxHashMap<crate::model::ClusterId, Cluster>, tracks: &[Track]);
}

/// Decomposes a cluster's transverse shower profile into peaks.
pub trait ShowerProfilePlugin {
    /// Compute peaks up to `max_layer`, ordered by decreasing peak energy
    /// (largest first,`ShowerPeak`).
    fn calculate_transverse_profile(&self, cluster: &Cluster, store: &CaloHitStore, max_layer: u32) -> ShowerPeakList;
}

/// A named registry of plugin implementations, resolved by the operators
/// that invoke them by configured name.
#[derive(Default)]
pub struct PluginRegistry {
    clustering: FxHashMap<String, Box<dyn ClusteringPlugin + Send + Sync>>,
    association: FxHashMap<String, Box<dyn AssociationPlugin + Send + Sync>>,
    shower_profile: Option<Box<dyn ShowerProfilePlugin + Send + Sync>>,
}

impl PluginRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a clustering plugin under `name`.
    pub fn register_clustering(&mut self, name: impl Into<String>, plugin: Box<dyn ClusteringPlugin + Send + Sync>) {
        self.clustering.insert(name.into(), plugin);
    }

    /// Register an association plugin under `name`.
    pub fn register_association(&mut self, name: impl Into<String>, plugin: Box<dyn AssociationPlugin + Send + Sync>) {
        self.association.insert(name.into(), plugin);
    }

    /// Register the (single) shower-profile plugin.
    pub fn set_shower_profile(&mut self, plugin: Box<dyn ShowerProfilePlugin + Send + Sync>) {
        self.shower_profile = Some(plugin);
    }

    /// Look up a registered clustering plugin.
    #[must_use]
    pub fn clustering(&self, name: &str) -> Option<&(dyn ClusteringPlugin + Send + Sync)> {
        self.clustering.get(name).map(std::convert::AsRef::as_ref)
    }

    /// Look up a registered association plugin.
    #[must_use]
    pub fn association(&self, name: &str) -> Option<&(dyn AssociationPlugin + Send + Sync)> {
        self.association.get(name).map(std::convert::AsRef::as_ref)
    }

    /// The registered shower-profile plugin, if any.
    #[must_use]
    pub fn shower_profile(&self) -> Option<&(dyn ShowerProfilePlugin + Send + Sync)> {
        self.shower_profile.as_deref()
    }

    /// A registry pre-populated with the reference plugins in
    /// [`reference`]: clustering under `"nearest_neighbour"`,
    /// association under `"distance_association"`, and the single
    /// shower-profile slot filled with [`reference::ConeProfilePlugin`].
    /// Intended for tests and `pflow-cli`, which otherwise have no
    /// plugin-discovery mechanism of their own (the real plugin loader
    /// is an external collaborator, not modelled here).
    #[must_use]
    pub fn with_reference_plugins() -> Self {
        let mut registry = Self::new();
        registry.register_clustering("nearest_neighbour", Box::new(reference::NearestNeighbourClustering::default()));
        registry.register_association("distance_association", Box::new(reference::DistanceAssociation::default()));
        registry.set_shower_profile(Box::new(reference::ConeProfilePlugin::default()));
        registry
    }
}
