//! The driver: runs a configured, ordered sequence of operators once per
//! event.

use crate::error::Result;
use crate::geometry::GeometryContext;
use crate::manager::ClusterManager;
use crate::merging::backscattered::BackscatteredTracks;
use crate::merging::fragment_removal::FragmentRemoval;
use crate::merging::isolated_hit::IsolatedHitMerging;
use crate::merging::merge_split_photons::MergeSplitPhotons;
use crate::merging::muon_association::MuonClusterAssociation;
use crate::merging::proximity::ProximityBasedMerging;
use crate::merging::shower_mip::ShowerMipMerging;
use crate::photon::PhotonReconstruction;
use crate::plugins::PluginRegistry;
use crate::reclustering::resolve_track_associations::ResolveTrackAssociations;
use crate::reclustering::split_track_associations::SplitTrackAssociations;
use crate::reclustering::track_driven_association::TrackDrivenAssociation;
use crate::reclustering::track_driven_merging::TrackDrivenMerging;
use crate::track_recovery::helix::TrackRecoveryHelix;
use crate::track_recovery::straight::TrackRecovery;
use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

/// Settings read from the enclosing framework's global configuration.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PipelineSettings {
    /// Hadronic-energy resolution constant used to scale every chi
    /// computation.
    pub hadronic_energy_resolution: f64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self { hadronic_energy_resolution: 0.6 }
    }
}

/// Everything an operator needs to run: the manager (the only mutator),
/// read-only geometry, the plugin registry, and global settings.
pub struct OperatorContext<'a> {
    /// The single mutator of hits, clusters, and track associations.
    pub manager: &'a mut ClusterManager,
    /// Sub-detector envelopes, gaps, and granularity mapping.
    pub geometry: &'a GeometryContext,
    /// Clustering/association/shower-profile plugins registered by name.
    pub plugins: &'a PluginRegistry,
    /// Global pipeline settings.
    pub settings: &'a PipelineSettings,
}

/// A replaceable operator over the current cluster/track population.
#[enum_dispatch(OperatorEnum)]
pub trait Operator {
    /// A short name for logging.
    fn name(&self) -> &'static str;

    /// Run once over the current population.
    ///
    /// # Errors
    /// Propagates any fatal [`crate::error::Error`] from the manager or
    /// the operator's own invariant checks.
    fn run(&self, ctx: &mut OperatorContext) -> Result<()>;
}

/// The closed set of operators a pipeline may be configured with.
#[enum_dispatch]
pub enum OperatorEnum {
    /// Merges touching/well-fit clusters within contact and fit gates.
    ProximityBasedMerging,
    /// Absorbs mip-like stub fragments into a nearby shower (four
    /// parameterised variants).
    ShowerMipMerging,
    /// Reattaches backscattered fragments to their parent (two
    /// parameterised variants).
    BackscatteredTracks,
    /// Removes photon or neutral-hadron fragments into their daughter
    /// shower (parameterised).
    FragmentRemoval,
    /// Merges adjacent photon-tagged fragments that still look like one
    /// shower.
    MergeSplitPhotons,
    /// Dissolves sparse clusters and sweeps stray hits onto a host.
    IsolatedHitMerging,
    /// Associates plausible leaked muon clusters to a parent track.
    MuonClusterAssociation,
    /// Splits an over-energetic track-associated cluster.
    SplitTrackAssociations,
    /// Re-derives the track association for an under-energetic cluster.
    ResolveTrackAssociations,
    /// Rescues a cluster with no acceptable split via forced clustering.
    TrackDrivenAssociation,
    /// Merges clusters driven by their associated track's energy.
    TrackDrivenMerging,
    /// Decomposes and tags photon shower fragments.
    PhotonReconstruction,
    /// Recovers an unassociated track via a straight-line projection.
    TrackRecovery,
    /// Recovers an unassociated track via a curved helix projection.
    TrackRecoveryHelix,
}

/// An ordered sequence of operators, run once per event.
pub struct Pipeline {
    operators: Vec<OperatorEnum>,
}

impl Pipeline {
    /// Build a pipeline from a configured, ordered operator sequence.
    #[must_use]
    pub fn new(operators: Vec<OperatorEnum>) -> Self {
        Self { operators }
    }

    /// Run every configured operator once, in order. A fatal error from
    /// one operator is logged and the pipeline continues with the next.
    pub fn run_event(&self, ctx: &mut OperatorContext) {
        for operator in &self.operators {
            let span = tracing::debug_span!("operator", name = operator.name());
            let _enter = span.enter();
            match operator.run(ctx) {
                Ok(()) => tracing::debug!("completed"),
                Err(err) if err.is_recoverable() => {
                    tracing::warn!(error = %err, "operator reported a recoverable condition, continuing");
                }
                Err(err) => {
                    tracing::error!(error = %err, "operator failed, continuing with next operator");
                }
            }
        }
    }
}
