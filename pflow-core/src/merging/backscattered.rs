//! `BackscatteredTracks`, two parameterised variants,
//! grounded on `BackscatteredTrack[s|s2]Algorithm.cc`.

use super::can_merge_cluster;
use crate::error::Result;
use crate::fitting;
use crate::fragment_geometry;
use crate::model::ClusterId;
use crate::pipeline::{Operator, OperatorContext};
use serde::{Deserialize, Serialize};

/// Which backscattered-tracks variant to run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum BackscatteredVariant {
    /// `BackscatteredTracksAlgorithm`: fit the daughter (minus its
    /// outermost layers), seek an embedding parent.
    FitDaughter,
    /// `BackscatteredTracks2Algorithm`: fit the parent's mip section
    /// (inner layer to shower start), seek an embedded daughter.
    FitParentMipSection,
}

/// Configuration shared by both variants.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BackscatteredTracksConfig {
    /// Which variant to run.
    pub variant: BackscatteredVariant,
    /// Merge-eligibility gate: minimum mip-fraction.
    pub can_merge_min_mip_fraction: f64,
    /// Merge-eligibility gate: maximum fit-to-all-hits RMS.
    pub can_merge_max_rms: f64,
    /// Minimum hits in the cluster being fitted.
    pub min_calo_hits_per_cluster: f64,
    /// Variant 1: maximum fit-to-all-hits RMS on the daughter candidate.
    pub fit_to_all_hits_rms_cut: f64,
    /// Variant 1: layers excluded from the daughter's outer end before
    /// fitting.
    pub n_outer_fit_exclusion_layers: u32,
    /// Variant 2: maximum RMS of the parent's mip-section fit.
    pub max_fit_rms: f64,
    /// Number of layers the fit is projected past the relevant boundary.
    pub n_fit_projection_layers: u32,
    /// Maximum projected-fit-to-hit distance (also the "no candidate"
    /// sentinel).
    pub max_fit_distance_to_closest_hit: f64,
    /// Maximum layer-centroid separation between the two clusters.
    pub max_centroid_distance: f64,
}

impl Default for BackscatteredTracksConfig {
    fn default() -> Self {
        Self {
            variant: BackscatteredVariant::FitDaughter,
            can_merge_min_mip_fraction: 0.7,
            can_merge_max_rms: 5.0,
            min_calo_hits_per_cluster: 6.0,
            fit_to_all_hits_rms_cut: 10.0,
            n_outer_fit_exclusion_layers: 2,
            max_fit_rms: 15.0,
            n_fit_projection_layers: 2,
            max_fit_distance_to_closest_hit: 30.0,
            max_centroid_distance: 100.0,
        }
    }
}

/// Re-attaches a daughter shower embedded inside another cluster's
/// outer/mip section to that cluster.
pub struct BackscatteredTracks {
    /// Operator configuration, including the variant to run.
    pub config: BackscatteredTracksConfig,
}

impl Operator for BackscatteredTracks {
    fn name(&self) -> &'static str {
        "BackscatteredTracks"
    }

    fn run(&self, ctx: &mut OperatorContext) -> Result<()> {
        match self.config.variant {
            BackscatteredVariant::FitDaughter => run_fit_daughter(ctx, &self.config),
            BackscatteredVariant::FitParentMipSection => run_fit_parent_mip_section(ctx, &self.config),
        }
    }
}

fn eligible_candidates(ctx: &OperatorContext, config: &BackscatteredTracksConfig) -> Vec<Option<ClusterId>> {
    ctx.manager
        .current_list()
        .into_iter()
        .filter(|&id| {
            ctx.manager.cluster(id).is_ok_and(|c| {
                can_merge_cluster(c, ctx.manager.hits(), config.can_merge_min_mip_fraction, config.can_merge_max_rms)
            })
        })
        .map(Some)
        .collect()
}

fn run_fit_daughter(ctx: &mut OperatorContext, config: &BackscatteredTracksConfig) -> Result<()> {
    let mut candidates = eligible_candidates(ctx, config);
    for i in 0..candidates.len() {
        let Some(daughter_id) = candidates[i] else { continue };
        let daughter = ctx.manager.cluster(daughter_id)?;
        if (daughter.all_hit_ids().count() as f64) < config.min_calo_hits_per_cluster {
            continue;
        }
        let Some(fit_all) = daughter.cached_fit_all() else { continue };
        if fit_all.rms > config.fit_to_all_hits_rms_cut {
            continue;
        }
        let daughter_inner = daughter.inner_pseudo_layer();
        let daughter_outer = daughter.outer_pseudo_layer();
        let daughter_fit_end = daughter_outer.saturating_sub(config.n_outer_fit_exclusion_layers);
        let Ok(fit) = fitting::fit_layers(daughter, ctx.manager.hits(), daughter_inner, daughter_fit_end) else { continue };

        let mut best_parent = None;
        let mut min_distance = config.max_fit_distance_to_closest_hit;
        let mut best_energy = 0.0_f64;
        for &maybe_parent in &candidates {
            let Some(parent_id) = maybe_parent else { continue };
            if parent_id == daughter_id {
                continue;
            }
            let parent = ctx.manager.cluster(parent_id)?;
            if !can_merge_cluster(parent, ctx.manager.hits(), config.can_merge_min_mip_fraction, config.can_merge_max_rms) {
                continue;
            }
            if parent.outer_pseudo_layer() <= daughter_outer || parent.inner_pseudo_layer() >= daughter_outer {
                continue;
            }
            let Some(centroid_distance) = fragment_geometry::distance_to_closest_centroid(parent, daughter) else { continue };
            if centroid_distance > config.max_centroid_distance {
                continue;
            }
            let projection_start = daughter_outer.saturating_sub(config.n_fit_projection_layers);
            let projection_end = daughter_outer + config.n_fit_projection_layers;
            let Some(distance) =
                fragment_geometry::distance_to_closest_hit_from_fit(&fit, parent, ctx.manager.hits(), projection_start, projection_end)
            else {
                continue;
            };
            let parent_energy = parent.energy(ctx.manager.hits().as_slice());
            if distance < min_distance || ((distance - min_distance).abs() < f64::EPSILON && parent_energy > best_energy) {
                min_distance = distance;
                best_parent = Some(parent_id);
                best_energy = parent_energy;
            }
        }

        if let Some(parent_id) = best_parent {
            ctx.manager.merge_and_delete(parent_id, daughter_id)?;
            candidates[i] = None;
        }
    }
    Ok(())
}

fn run_fit_parent_mip_section(ctx: &mut OperatorContext, config: &BackscatteredTracksConfig) -> Result<()> {
    let mut candidates = eligible_candidates(ctx, config);
    for i in 0..candidates.len() {
        let Some(parent_id) = candidates[i] else { continue };
        let parent = ctx.manager.cluster(parent_id)?;
        if (parent.all_hit_ids().count() as f64) < config.min_calo_hits_per_cluster {
            continue;
        }
        let parent_inner = parent.inner_pseudo_layer();
        let parent_shower_start = parent.shower_start_layer().unwrap_or(parent.outer_pseudo_layer());
        let Ok(fit) = fitting::fit_layers(parent, ctx.manager.hits(), parent_inner, parent_shower_start) else { continue };
        if fit.rms > config.max_fit_rms {
            continue;
        }

        let mut best_daughter = None;
        let mut min_distance = config.max_fit_distance_to_closest_hit;
        let mut best_energy = f64::MAX;
        for &maybe_daughter in &candidates {
            let Some(daughter_id) = maybe_daughter else { continue };
            if daughter_id == parent_id {
                continue;
            }
            let daughter = ctx.manager.cluster(daughter_id)?;
            let daughter_outer = daughter.outer_pseudo_layer();
            if parent_shower_start <= daughter_outer || parent_inner >= daughter_outer {
                continue;
            }
            let Some(centroid_distance) = fragment_geometry::distance_to_closest_centroid(parent, daughter) else { continue };
            if centroid_distance > config.max_centroid_distance {
                continue;
            }
            let daughter_inner = daughter.inner_pseudo_layer();
            let fit_projection_outer = daughter_outer.saturating_sub(config.n_fit_projection_layers);
            if daughter_inner > fit_projection_outer {
                continue;
            }
            let Some(distance) = fragment_geometry::distance_to_closest_hit_from_fit(
                &fit,
                daughter,
                ctx.manager.hits(),
                daughter_inner,
                fit_projection_outer,
            ) else {
                continue;
            };
            let daughter_energy = daughter.energy(ctx.manager.hits().as_slice());
            if distance < min_distance || ((distance - min_distance).abs() < f64::EPSILON && daughter_energy < best_energy) {
                min_distance = distance;
                best_daughter = Some(daughter_id);
                best_energy = daughter_energy;
            }
        }

        if let Some(daughter_id) = best_daughter {
            ctx.manager.merge_and_delete(parent_id, daughter_id)?;
            candidates[candidates.iter().position(|&c| c == Some(daughter_id)).unwrap()] = None;
        }
    }
    Ok(())
}
