//! `TrackRecovery`, grounded on
//! `TrackRecoveryAlgorithm.cc`: a cheap fallback that treats the track as
//! continuing in a straight line past the calorimeter face, resolved
//! one track at a time rather than globally (compare
//! [`super::helix::TrackRecoveryHelix`]).

use super::{find_candidates, nearest_per_track_in_order};
use crate::compatibility::chi;
use crate::error::Result;
use crate::model::{Helix, Track};
use crate::pipeline::{Operator, OperatorContext};
use serde::{Deserialize, Serialize};

/// Configuration for [`TrackRecovery`].
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrackRecoveryConfig {
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

impl Default for TrackRecoveryConfig {
    fn default() -> Self {
        Self {
            min_track_energy: 0.0,
            n_examination_layers: 20,
            max_examined_layers: 10,
            max_mean_distance: 50.0,
            max_chi: 2.5,
        }
    }
}

fn straight_line(track: &Track) -> Helix {
    Helix {
        reference_point: track.state_at_calorimeter.position,
        momentum: track.state_at_calorimeter.direction,
        curvature: 0.0,
    }
}

/// Associates unassociated, `can_form_pfo` tracks with the nearest
/// track-free cluster a straight-line projection from the calorimeter
/// face passes close to.
pub struct TrackRecovery {
    /// Operator configuration.
    pub config: TrackRecoveryConfig,
}

impl Operator for TrackRecovery {
    fn name(&self) -> &'static str {
        "TrackRecovery"
    }

    fn run(&self, ctx: &mut OperatorContext) -> Result<()> {
        let config = self.config;
        let candidates = find_candidates(
            ctx.manager,
            config.min_track_energy,
            config.n_examination_layers,
            config.max_examined_layers,
            config.max_mean_distance,
            straight_line,
        );

        for (track, cluster) in nearest_per_track_in_order(&candidates) {
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
