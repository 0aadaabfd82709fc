//! `ProximityBasedMerging`, grounded on
//! `ProximityBasedMergingAlgorithm.cc`.

use super::can_merge_cluster;
use crate::error::{Error, Result};
use crate::fragment_geometry;
use crate::model::{ClusterId, Vec3};
use crate::pipeline::{Operator, OperatorContext};
use serde::{Deserialize, Serialize};

/// Configuration for [`ProximityBasedMerging`].
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProximityBasedMergingConfig {
    /// Minimum mip-fraction for the merge-eligibility gate.
    pub can_merge_min_mip_fraction: f64,
    /// Maximum fit-to-all-hits RMS for the merge-eligibility gate.
    pub can_merge_max_rms: f64,
    /// Below this inner layer, both clusters being this shallow is not
    /// itself disqualifying.
    pub min_cluster_inner_layer: u32,
    /// Minimum allowed layer-overlap span.
    pub min_layer_span: i64,
    /// Minimum allowed (daughter-inner − parent-shower-start) span.
    pub min_shower_layer_span: i64,
    /// Maximum `chi` for the combined parent+daughter cluster.
    pub max_track_cluster_chi: f64,
    /// Maximum `chi^2 - chi0^2` for the combined vs. parent-only energy.
    pub max_track_cluster_dchi2: f64,
    /// Number of layers past the daughter's inner layer searched for the
    /// generic distance.
    pub n_generic_distance_layers: u32,
    /// Generic-distance ceiling; also the initial "no candidate found"
    /// sentinel.
    pub max_generic_distance: f64,
    /// +/- layers around each parent layer examined for a daughter hit.
    pub n_adjacent_layers_to_examine: u32,
    /// Maximum parallel-component distance for a generic-distance pair
    /// to be considered.
    pub max_parallel_distance: f64,
    /// Maximum inner-layer centroid separation (mm).
    pub max_inner_layer_separation: f64,
    /// Contact-layer distance threshold (cell widths).
    pub cluster_contact_threshold: f64,
    /// Minimum contact fraction accepted as fragment evidence.
    pub min_contact_fraction: f64,
    /// Close-hit distance threshold (mm).
    pub close_hit_threshold: f64,
    /// Minimum close-hit fraction accepted as fragment evidence.
    pub min_close_hit_fraction: f64,
    /// Maximum helix pathlength from the calorimeter to the daughter
    /// before its track is not even sanity-checked.
    pub max_helix_pathlength_to_daughter: f64,
    /// Number of layers past the daughter's inner layer examined for the
    /// helix-distance fragment check.
    pub helix_distance_n_layers: u32,
    /// Maximum occupied layers examined for the helix-distance check.
    pub helix_distance_max_occupied_layers: usize,
    /// Maximum mean helix-to-daughter distance accepted as fragment
    /// evidence.
    pub max_cluster_helix_distance: f64,
}

impl Default for ProximityBasedMergingConfig {
    fn default() -> Self {
        Self {
            can_merge_min_mip_fraction: 0.7,
            can_merge_max_rms: 5.0,
            min_cluster_inner_layer: 6,
            min_layer_span: -2,
            min_shower_layer_span: -4,
            max_track_cluster_chi: 2.5,
            max_track_cluster_dchi2: 1.0,
            n_generic_distance_layers: 5,
            max_generic_distance: 50.0,
            n_adjacent_layers_to_examine: 2,
            max_parallel_distance: 1000.0,
            max_inner_layer_separation: 500.0,
            cluster_contact_threshold: 2.0,
            min_contact_fraction: 0.3,
            close_hit_threshold: 50.0,
            min_close_hit_fraction: 0.2,
            max_helix_pathlength_to_daughter: 300.0,
            helix_distance_n_layers: 20,
            helix_distance_max_occupied_layers: 10,
            max_cluster_helix_distance: 50.0,
        }
    }
}

/// Merges a daughter fragment into a proximate, track-consistent parent.
pub struct ProximityBasedMerging {
    /// Operator configuration.
    pub config: ProximityBasedMergingConfig,
}

impl Operator for ProximityBasedMerging {
    fn name(&self) -> &'static str {
        "ProximityBasedMerging"
    }

    fn run(&self, ctx: &mut OperatorContext) -> Result<()> {
        let config = self.config;
        let mut candidates: Vec<Option<ClusterId>> = ctx
            .manager
            .current_list()
            .into_iter()
            .filter(|&id| {
                ctx.manager.cluster(id).is_ok_and(|c| {
                    can_merge_cluster(c, ctx.manager.hits(), config.can_merge_min_mip_fraction, config.can_merge_max_rms)
                })
            })
            .map(Some)
            .collect();

        // Highest inner layer first, matching the reverse-iteration order
        // of the source (it begins comparing the highest layers against
        // the lowest).
        for i in (0..candidates.len()).rev() {
            let Some(daughter_id) = candidates[i] else { continue };
            let (daughter_inner, daughter_outer, has_tracks) = {
                let daughter = ctx.manager.cluster(daughter_id)?;
                (daughter.inner_pseudo_layer(), daughter.outer_pseudo_layer(), !daughter.tracks().is_empty())
            };
            if has_tracks {
                continue;
            }

            let mut best_parent: Option<ClusterId> = None;
            let mut best_parent_energy = 0.0_f64;
            let mut min_generic_distance = config.max_generic_distance;

            for &maybe_parent in &candidates {
                let Some(parent_id) = maybe_parent else { continue };
                if parent_id == daughter_id {
                    continue;
                }
                let parent = ctx.manager.cluster(parent_id)?;
                let parent_inner = parent.inner_pseudo_layer();
                let parent_outer = parent.outer_pseudo_layer();

                if daughter_inner < config.min_cluster_inner_layer && parent_inner < config.min_cluster_inner_layer {
                    continue;
                }

                let layer_span_1 = i64::from(parent_outer) - i64::from(daughter_inner);
                let layer_span_2 = i64::from(daughter_outer) - i64::from(parent_inner);
                let shower_layer_span =
                    i64::from(daughter_inner) - i64::from(parent.shower_start_layer().unwrap_or(parent_outer));
                let layer_span = layer_span_1.min(layer_span_2);

                if layer_span < config.min_layer_span || shower_layer_span < config.min_shower_layer_span {
                    continue;
                }

                let track_energy_sum: f64 =
                    parent.tracks().iter().map(|&t| ctx.manager.tracks().get(t).energy_at_dca).sum();
                let parent_hadronic_energy = parent.energy(ctx.manager.hits().as_slice());

                if track_energy_sum > 0.0 {
                    let sigma_e = ctx.settings.hadronic_energy_resolution * track_energy_sum.sqrt();
                    if sigma_e <= f64::EPSILON {
                        return Err(Error::Failure("zero track energy sigma in proximity merging".into()));
                    }
                    let daughter_hadronic_energy = ctx.manager.cluster(daughter_id)?.energy(ctx.manager.hits().as_slice());
                    let combined_chi = (daughter_hadronic_energy + parent_hadronic_energy - track_energy_sum) / sigma_e;
                    let parent_chi = (parent_hadronic_energy - track_energy_sum) / sigma_e;
                    if combined_chi > config.max_track_cluster_chi
                        || (combined_chi * combined_chi - parent_chi * parent_chi) > config.max_track_cluster_dchi2
                    {
                        continue;
                    }
                }

                let start_layer = daughter_inner;
                let end_layer = daughter_inner + config.n_generic_distance_layers;
                let Some(generic_distance) = generic_distance(
                    ctx,
                    parent_id,
                    daughter_id,
                    start_layer,
                    end_layer,
                    config.n_adjacent_layers_to_examine,
                    config.max_parallel_distance,
                )?
                else {
                    continue;
                };

                if generic_distance < min_generic_distance
                    || ((generic_distance - min_generic_distance).abs() < f64::EPSILON
                        && parent_hadronic_energy > best_parent_energy)
                {
                    min_generic_distance = generic_distance;
                    best_parent = Some(parent_id);
                    best_parent_energy = parent_hadronic_energy;
                }
            }

            let Some(parent_id) = best_parent else { continue };
            let parent_inner_centroid = {
                let parent = ctx.manager.cluster(parent_id)?;
                parent.layer_centroid(parent.inner_pseudo_layer()).unwrap_or(Vec3::zero())
            };
            let daughter_inner_centroid =
                ctx.manager.cluster(daughter_id)?.layer_centroid(daughter_inner).unwrap_or(Vec3::zero());
            if parent_inner_centroid.distance(daughter_inner_centroid) > config.max_inner_layer_separation {
                continue;
            }

            if is_cluster_fragment(ctx, parent_id, daughter_id, &config)? {
                ctx.manager.merge_and_delete(parent_id, daughter_id)?;
                candidates[i] = None;
            }
        }
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn generic_distance(
    ctx: &OperatorContext,
    parent_id: ClusterId,
    daughter_id: ClusterId,
    start_layer: u32,
    end_layer: u32,
    n_adjacent_layers: u32,
    max_parallel_distance: f64,
) -> Result<Option<f64>> {
    let parent = ctx.manager.cluster(parent_id)?;
    let daughter = ctx.manager.cluster(daughter_id)?;
    let store = ctx.manager.hits();
    let mut min_distance = f64::MAX;
    let mut found = false;
    for (layer, parent_hits) in parent.hits().layers() {
        if layer < start_layer || layer > end_layer {
            continue;
        }
        let first_exam = layer.saturating_sub(n_adjacent_layers);
        let last_exam = layer + n_adjacent_layers;
        for &ph in parent_hits {
            let p_hit = store.get(ph);
            for exam_layer in first_exam..=last_exam {
                for &dh in daughter.hits().layer(exam_layer) {
                    let delta = p_hit.position - store.get(dh).position;
                    let perpendicular = p_hit.expected_direction.cross(delta).norm();
                    let parallel = p_hit.expected_direction.dot(delta).abs();
                    if perpendicular < min_distance && parallel < max_parallel_distance {
                        min_distance = perpendicular;
                        found = true;
                    }
                }
            }
        }
    }
    Ok(if found { Some(min_distance) } else { None })
}

fn is_cluster_fragment(
    ctx: &OperatorContext,
    parent_id: ClusterId,
    daughter_id: ClusterId,
    config: &ProximityBasedMergingConfig,
) -> Result<bool> {
    let parent = ctx.manager.cluster(parent_id)?;
    let daughter = ctx.manager.cluster(daughter_id)?;
    let store = ctx.manager.hits();

    let close_hit_fraction = fragment_geometry::fraction_of_close_hits(daughter, parent, store, config.close_hit_threshold);
    if close_hit_fraction - config.min_close_hit_fraction > f64::EPSILON {
        return Ok(true);
    }

    let (_, contact_fraction) = fragment_geometry::cluster_contact_details(parent, daughter, store, config.cluster_contact_threshold);
    if contact_fraction - config.min_contact_fraction > f64::EPSILON {
        return Ok(true);
    }

    let daughter_inner = daughter.inner_pseudo_layer();
    let daughter_z = daughter.layer_centroid(daughter_inner).map_or(0.0, |c| c.z);
    let parent_tracks = parent.tracks().to_vec();
    for track_id in parent_tracks {
        let track = ctx.manager.tracks().get(track_id);
        let helix = track.helix_at_calorimeter;
        let delta_z = (helix.reference_point.z - daughter_z).abs();
        if helix.momentum.z.abs() <= f64::EPSILON
            || (helix.momentum.norm() / helix.momentum.z) * delta_z > config.max_helix_pathlength_to_daughter
        {
            continue;
        }
        let daughter = ctx.manager.cluster(daughter_id)?;
        let Some((_, mean_distance)) = fragment_geometry::cluster_helix_distance(
            daughter,
            store,
            &helix,
            daughter_inner,
            daughter_inner + config.helix_distance_n_layers,
            config.helix_distance_max_occupied_layers,
        ) else {
            continue;
        };
        if mean_distance < config.max_cluster_helix_distance {
            return Ok(true);
        }
    }
    Ok(false)
}
