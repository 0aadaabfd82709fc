//! `TrackRecoveryHelix`, grounded on
//! `TrackRecoveryHelixAlgorithm.cc`: projects the track's true
//! calorimeter helix rather than a straight-line approximation, and
//! resolves the whole event's candidate pairs globally instead of one
//! track at a time (compare [`super::straight::TrackRecovery`]).

use super::{find_candidates, nearest_pairs_globally};
use crate::compatibility::chi;
use crate::error::Result;
use crate::pipeline::{Operator, OperatorContext};
use serde::{Deserialize, Serialize};

/// Configuration for [`TrackRecoveryHelix`].
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrackRecoveryHelixConfig {
    /// Minimum track energy at the distance of closest approach.
    pub min_track_energy: f64,
    /// Pseudo-layers past a candidate cluster's inner layer examined.
    pub n_examination_layers: u32,
    /// Maximum occupied layers examined.
    pub max_examined_layers: usize,
    /// Maximum mean track-to-cluster distance (mm) accepted.
    pub max_mean_distance: f64,
    /// Maximum `|chi|` between the cluster's energy and the track's.
    pub max_chi: f64,
}

impl Default for TrackRecoveryHelixConfig {
    fn default() -> Self {
        Self {
            min_track_energy: 0.0,
            n_examination_layers: 30,
            max_examined_layers: 15,
            max_mean_distance: 75.0,
            max_chi: 2.5,
        }
    }
}

/// Associates unassociated, `can_form_pfo` tracks with nearby track-free
/// clusters by following the track's true curved trajectory, resolving
/// every candidate pair in the event globally by ascending distance.
pub struct TrackRecoveryHelix {
    /// Operator configuration.
    pub config: TrackRecoveryHelixConfig,
}

impl Operator for TrackRecoveryHelix {
    fn name(&self) -> &'static str {
        "TrackRecoveryHelix"
    }

    fn run(&self, ctx: &mut OperatorContext) -> Result<()> {
        let config = self.config;
        let candidates = find_candidates(
            ctx.manager,
            config.min_track_energy,
            config.n_examination_layers,
            config.max_examined_layers,
            config.max_mean_distance,
            |track| track.helix_at_calorimeter,
        );

        for (track, cluster) in nearest_pairs_globally(candidates) {
            let track_energy = ctx.manager.tracks().get(track).energy_at_dca;
            let Ok(cluster_ref) = ctx.manager.cluster(cluster) else { continue };
            let cluster_energy = cluster_ref.energy(ctx.manager.hits().as_slice());
            if chi(cluster_energy, track_energy, ctx.settings.hadronic_energy_resolution).abs() > config.max_chi {
                continue;
            }
            ctx.manager.add_track_cluster_association(track, cluster)?;
        }
        Ok(())
    }
}
