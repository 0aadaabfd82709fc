//! `IsolatedHitMerging`, grounded on
//! `IsolatedHitMergingAlgorithm.cc`.

use crate::error::Result;
use crate::manager::CaloHitStore;
use crate::model::{CaloHit, Cluster, ClusterId, HitId};
use crate::pipeline::{Operator, OperatorContext};
use serde::{Deserialize, Serialize};

/// Configuration for [`IsolatedHitMerging`].
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IsolatedHitMergingConfig {
    /// Clusters with at most this many calo hits are dissolved and their
    /// hits redistributed.
    pub min_hits_in_cluster: usize,
    /// Maximum hit-to-layer-centroid distance for a host to qualify.
    pub max_recombination_distance: f64,
    /// Minimum cosine opening angle between a hit's expected direction
    /// and a candidate host's initial direction.
    pub min_cos_opening_angle: f64,
}

impl Default for IsolatedHitMergingConfig {
    fn default() -> Self {
        Self {
            min_hits_in_cluster: 4,
            max_recombination_distance: 250.0,
            min_cos_opening_angle: 0.0,
        }
    }
}

/// Dissolves sparse clusters into their neighbours, then sweeps
/// remaining isolated hits onto the best-fit cluster.
pub struct IsolatedHitMerging {
    /// Operator configuration.
    pub config: IsolatedHitMergingConfig,
}

impl Operator for IsolatedHitMerging {
    fn name(&self) -> &'static str {
        "IsolatedHitMerging"
    }

    fn run(&self, ctx: &mut OperatorContext) -> Result<()> {
        run_phase_one(ctx, &self.config)?;
        run_phase_two(ctx, &self.config)?;
        Ok(())
    }
}

/// Mirrors `GetDistanceToHit`: `f64::MAX` if the opening-angle gate
/// fails or the cluster has no occupied layers, else the minimum
/// distance from `hit` to any of the cluster's layer centroids.
fn distance_to_hit(cluster: &Cluster, hit: &CaloHit, min_cos_opening_angle: f64) -> f64 {
    let cos_angle = hit.expected_direction.normalized().dot(cluster.initial_direction());
    if cos_angle < min_cos_opening_angle {
        return f64::MAX;
    }
    cluster
        .hits()
        .layers()
        .filter_map(|(layer, _)| cluster.layer_centroid(layer))
        .map(|centroid| centroid.distance(hit.position))
        .fold(f64::MAX, f64::min)
}

fn run_phase_one(ctx: &mut OperatorContext, config: &IsolatedHitMergingConfig) -> Result<()> {
    let dissolve: Vec<(ClusterId, Vec<HitId>, usize)> = ctx
        .manager
        .current_list()
        .into_iter()
        .filter_map(|id| {
            let cluster = ctx.manager.cluster(id).ok()?;
            let hit_ids: Vec<HitId> = cluster.all_hit_ids().collect();
            (hit_ids.len() <= config.min_hits_in_cluster).then(|| (id, hit_ids.clone(), hit_ids.len()))
        })
        .collect();

    for (dissolved_id, hit_ids, original_count) in dissolve {
        ctx.manager.delete(dissolved_id)?;
        for hit_id in hit_ids {
            if !ctx.manager.hits().is_available(hit_id) {
                continue;
            }
            let Some(host) = best_host(ctx.manager.current_list(), ctx, config, hit_id, Some(original_count)) else {
                continue;
            };
            ctx.manager.add_isolated_to_cluster(host, hit_id)?;
        }
    }
    Ok(())
}

fn run_phase_two(ctx: &mut OperatorContext, config: &IsolatedHitMergingConfig) -> Result<()> {
    let isolated_hits: Vec<HitId> = ctx
        .manager
        .hits()
        .ids()
        .filter(|&id| ctx.manager.hits().is_available(id) && ctx.manager.hits().get(id).is_isolated == Some(true))
        .collect();

    for hit_id in isolated_hits {
        if !ctx.manager.hits().is_available(hit_id) {
            continue;
        }
        let Some(host) = best_host(ctx.manager.current_list(), ctx, config, hit_id, None) else { continue };
        ctx.manager.add_isolated_to_cluster(host, hit_id)?;
    }
    Ok(())
}

fn best_host(
    candidates: Vec<ClusterId>,
    ctx: &OperatorContext,
    config: &IsolatedHitMergingConfig,
    hit_id: HitId,
    min_hits: Option<usize>,
) -> Option<ClusterId> {
    let store: &CaloHitStore = ctx.manager.hits();
    let hit = store.get(hit_id);

    let mut best = None;
    let mut min_distance = config.max_recombination_distance;
    let mut best_energy = f64::MIN;
    for id in candidates {
        let Ok(cluster) = ctx.manager.cluster(id) else { continue };
        if let Some(min_hits) = min_hits {
            if cluster.all_hit_ids().count() < min_hits {
                continue;
            }
        }
        let distance = distance_to_hit(cluster, hit, config.min_cos_opening_angle);
        if distance > config.max_recombination_distance {
            continue;
        }
        let hadronic_energy = cluster.hadronic_energy(|id| store.get(id).hadronic_energy);
        if distance < min_distance || ((distance - min_distance).abs() < f64::EPSILON && hadronic_energy > best_energy) {
            min_distance = distance;
            best = Some(id);
            best_energy = hadronic_energy;
        }
    }
    best
}
