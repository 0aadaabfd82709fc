//! `TrackDrivenMerging`, grounded on
//! `TrackDrivenMergeAlg.cc`: unlike the reclustering operators in this
//! module, this one never re-derives a cluster's hit membership —
//! it only merges whole track-free clusters onto an under-energetic,
//! track-associated one, cheapest first, stopping as soon as the chi is
//! back in range or no more daughters help.

use crate::compatibility::chi;
use crate::error::Result;
use crate::fragment_geometry::fraction_of_hits_in_cone_from_cluster;
use crate::model::ClusterId;
use crate::pipeline::{Operator, OperatorContext};
use serde::{Deserialize, Serialize};

/// Configuration for [`TrackDrivenMerging`].
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrackDrivenMergingConfig {
    /// A track-associated cluster with chi below
    /// `-chi_to_attempt_merging` is eligible for daughter merges.
    pub chi_to_attempt_merging: f64,
    /// Cone half-angle cosine used to find candidate daughters.
    pub cone_cosine_half_angle: f64,
    /// Minimum cone fraction for a track-free cluster to be considered a
    /// daughter at all.
    pub min_cone_fraction: f64,
    /// Maximum number of daughters merged onto one seed.
    pub max_merges: usize,
}

impl Default for TrackDrivenMergingConfig {
    fn default() -> Self {
        Self {
            chi_to_attempt_merging: 3.0,
            cone_cosine_half_angle: 0.95,
            min_cone_fraction: 0.5,
            max_merges: 3,
        }
    }
}

fn cluster_chi(ctx: &OperatorContext, cluster: ClusterId, resolution: f64) -> Option<f64> {
    let cluster = ctx.manager.cluster(cluster).ok()?;
    if cluster.tracks().is_empty() {
        return None;
    }
    let track_energy_sum: f64 =
        cluster.tracks().iter().map(|&t| ctx.manager.tracks().get(t).energy_at_dca).sum();
    let cluster_energy = cluster.energy(ctx.manager.hits().as_slice());
    Some(chi(cluster_energy, track_energy_sum, resolution))
}

/// Finds the best-matching track-free daughter for `seed` by cone
/// fraction, among clusters whose fraction exceeds `min_cone_fraction`.
fn best_daughter(ctx: &OperatorContext, seed: ClusterId, config: &TrackDrivenMergingConfig) -> Option<ClusterId> {
    let store = ctx.manager.hits();
    let tracks = ctx.manager.tracks().as_slice();
    let parent = ctx.manager.cluster(seed).ok()?;

    let mut best: Option<(ClusterId, f64)> = None;
    for other in ctx.manager.current_list() {
        if other == seed {
            continue;
        }
        let Ok(candidate) = ctx.manager.cluster(other) else { continue };
        if !candidate.tracks().is_empty() {
            continue;
        }
        let fraction =
            fraction_of_hits_in_cone_from_cluster(candidate, store, parent, tracks, config.cone_cosine_half_angle);
        if fraction < config.min_cone_fraction {
            continue;
        }
        let better = match best {
            Some((_, best_fraction)) => fraction > best_fraction,
            None => true,
        };
        if better {
            best = Some((other, fraction));
        }
    }
    best.map(|(id, _)| id)
}

/// Merges whole track-free clusters, best-cone-fraction-first, onto an
/// under-energetic track-associated cluster until the energy balance is
/// restored or no more candidates help. This never splits a
/// daughter cluster's hits between two parents — a daughter is merged in
/// full or not at all.
pub struct TrackDrivenMerging {
    /// Operator configuration.
    pub config: TrackDrivenMergingConfig,
}

impl Operator for TrackDrivenMerging {
    fn name(&self) -> &'static str {
        "TrackDrivenMerging"
    }

    fn run(&self, ctx: &mut OperatorContext) -> Result<()> {
        let config = self.config;
        let resolution = ctx.settings.hadronic_energy_resolution;

        let seeds: Vec<ClusterId> = ctx
            .manager
            .current_list()
            .into_iter()
            .filter(|&id| cluster_chi(ctx, id, resolution).is_some_and(|c| c < -config.chi_to_attempt_merging))
            .collect();

        for seed in seeds {
            for _ in 0..config.max_merges {
                match cluster_chi(ctx, seed, resolution) {
                    Some(c) if c < -config.chi_to_attempt_merging => {}
                    _ => break,
                }
                let Some(daughter) = best_daughter(ctx, seed, &config) else { break };
                ctx.manager.merge_and_delete(seed, daughter)?;
            }
        }
        Ok(())
    }
}
