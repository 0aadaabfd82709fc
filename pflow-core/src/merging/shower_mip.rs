//! `ShowerMipMerging`, four parameterised variants, grounded
//! on `ShowerMipMerging[2|3|4]Algorithm.cc`.

use super::can_merge_cluster;
use crate::error::Result;
use crate::fitting;
use crate::fragment_geometry;
use crate::model::ClusterId;
use crate::pipeline::{Operator, OperatorContext};
use serde::{Deserialize, Serialize};

/// Which of the four tuned shower-mip-merging variants to run. Each
/// shares the overall shape (fit one cluster's mip-like end, search for
/// a plausible opposite endpoint) but differs in its cuts, grounded on a
/// distinct original algorithm class.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum ShowerMipVariant {
    /// `ShowerMipMergingAlgorithm`: fit the parent's end, project forward,
    /// require a close projected hit AND a close centroid.
    DistanceToClosestHit,
    /// `ShowerMipMerging2Algorithm`: fit the parent's end, require the
    /// daughter to lie roughly along the fit direction (dot-product gate)
    /// within a granularity-dependent perpendicular-distance cut.
    FitDirectionPointing,
    /// `ShowerMipMerging3Algorithm`: fit the daughter's start, project
    /// forward, seek a parent whose outer layer precedes the daughter.
    DaughterStubProjection,
    /// `ShowerMipMerging4Algorithm`: no fit; project the parent's initial
    /// direction from its inner centroid and require a close centroid.
    InitialDirectionProjection,
}

/// Configuration shared by all four variants; unused fields for a given
/// `variant` are simply ignored.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShowerMipMergingConfig {
    /// Which tuned variant to run.
    pub variant: ShowerMipVariant,
    /// Merge-eligibility gate: minimum mip-fraction.
    pub can_merge_min_mip_fraction: f64,
    /// Merge-eligibility gate: maximum fit-to-all-hits RMS.
    pub can_merge_max_rms: f64,
    /// Minimum hits in the cluster supplying the fitted endpoint.
    pub min_hits_in_fitted_cluster: usize,
    /// Minimum occupied layers in the cluster supplying the fitted
    /// endpoint.
    pub min_occupied_layers_in_fitted_cluster: usize,
    /// Minimum hits in the other (non-fitted) cluster.
    pub min_hits_in_other_cluster: usize,
    /// Points used for `fit_end`/`fit_start`.
    pub n_points_to_fit: usize,
    /// Variant 1: minimum mip-fraction and chi2-free RMS cut on the fit.
    pub fit_to_all_hits_rms_cut: f64,
    /// Variant 2: maximum fit chi2.
    pub fit_to_all_hits_chi2_cut: f64,
    /// Variant 3: maximum fit chi2.
    pub max_fit_chi2: f64,
    /// Maximum layer gap between the two clusters (variants 2/4).
    pub max_layer_difference: i64,
    /// Maximum centroid separation.
    pub max_centroid_difference: f64,
    /// Number of layers past the fitted cluster's boundary examined for a
    /// projected hit/centroid (variants 1/3).
    pub n_fit_projection_layers: u32,
    /// Variant 1: maximum projected-fit-to-hit distance.
    pub max_distance_to_closest_hit: f64,
    /// Variant 1: maximum projected-fit-to-centroid distance.
    pub max_distance_to_closest_centroid: f64,
    /// Variant 2: maximum `direction . unit(Δcentroid)` (negative —
    /// clusters must point at one another).
    pub max_fit_direction_dot_product: f64,
    /// Variant 2: perpendicular-distance cut for fine-granularity
    /// daughters.
    pub perpendicular_distance_cut_fine: f64,
    /// Variant 2: perpendicular-distance cut for coarse-granularity
    /// daughters.
    pub perpendicular_distance_cut_coarse: f64,
    /// Variant 3: maximum hit-to-hit cluster approach distance.
    pub max_cluster_approach: f64,
    /// Variant 4: number of layers past the daughter's inner layer
    /// examined for the initial-direction projection.
    pub n_projection_examination_layers: u32,
    /// Variant 4: maximum perpendicular/parallel ratio for a candidate
    /// hit to count.
    pub max_projection_distance_ratio: f64,
    /// Variant 4: maximum projection distance (also the initial "no
    /// candidate" sentinel).
    pub max_projection_distance: f64,
}

impl Default for ShowerMipMergingConfig {
    fn default() -> Self {
        Self {
            variant: ShowerMipVariant::DistanceToClosestHit,
            can_merge_min_mip_fraction: 0.7,
            can_merge_max_rms: 5.0,
            min_hits_in_fitted_cluster: 6,
            min_occupied_layers_in_fitted_cluster: 2,
            min_hits_in_other_cluster: 4,
            n_points_to_fit: 10,
            fit_to_all_hits_rms_cut: 10.0,
            fit_to_all_hits_chi2_cut: 5.0,
            max_fit_chi2: 10.0,
            max_layer_difference: 6,
            max_centroid_difference: 1000.0,
            n_fit_projection_layers: 5,
            max_distance_to_closest_hit: 100.0,
            max_distance_to_closest_centroid: 25.0,
            max_fit_direction_dot_product: -0.8,
            perpendicular_distance_cut_fine: 50.0,
            perpendicular_distance_cut_coarse: 75.0,
            max_cluster_approach: 250.0,
            n_projection_examination_layers: 4,
            max_projection_distance_ratio: 0.9,
            max_projection_distance: 50.0,
        }
    }
}

/// Merges a mip-stub cluster into (or out of) an adjacent shower-like
/// cluster by one of four tuned geometric criteria.
pub struct ShowerMipMerging {
    /// Operator configuration, including the variant to run.
    pub config: ShowerMipMergingConfig,
}

impl Operator for ShowerMipMerging {
    fn name(&self) -> &'static str {
        "ShowerMipMerging"
    }

    fn run(&self, ctx: &mut OperatorContext) -> Result<()> {
        match self.config.variant {
            ShowerMipVariant::DistanceToClosestHit => run_distance_to_closest_hit(ctx, &self.config),
            ShowerMipVariant::FitDirectionPointing => run_fit_direction_pointing(ctx, &self.config),
            ShowerMipVariant::DaughterStubProjection => run_daughter_stub_projection(ctx, &self.config),
            ShowerMipVariant::InitialDirectionProjection => run_initial_direction_projection(ctx, &self.config),
        }
    }
}

fn eligible_candidates(ctx: &OperatorContext, config: &ShowerMipMergingConfig) -> Vec<Option<ClusterId>> {
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

fn run_distance_to_closest_hit(ctx: &mut OperatorContext, config: &ShowerMipMergingConfig) -> Result<()> {
    let mut candidates = eligible_candidates(ctx, config);
    for i in 0..candidates.len() {
        let Some(parent_id) = candidates[i] else { continue };
        let parent = ctx.manager.cluster(parent_id)?;
        if parent.all_hit_ids().count() < config.min_hits_in_fitted_cluster
            || parent.hits().n_layers() < config.min_occupied_layers_in_fitted_cluster
        {
            continue;
        }
        let Ok(fit) = fitting::fit_end(parent, ctx.manager.hits(), config.n_points_to_fit) else { continue };
        if fit.rms > config.fit_to_all_hits_rms_cut {
            continue;
        }
        let parent_inner = parent.inner_pseudo_layer();
        let parent_outer = parent.outer_pseudo_layer();
        let parent_outer_centroid = parent.layer_centroid(parent_outer);

        let mut best_daughter = None;
        let mut min_distance = config.max_distance_to_closest_centroid;
        let mut best_energy = f64::MAX;
        for &maybe_daughter in &candidates {
            let Some(daughter_id) = maybe_daughter else { continue };
            if daughter_id == parent_id {
                continue;
            }
            let daughter = ctx.manager.cluster(daughter_id)?;
            if daughter.inner_pseudo_layer() < parent_inner {
                continue;
            }
            let Some(parent_centroid) = parent_outer_centroid else { continue };
            let Some(daughter_centroid) = daughter.layer_centroid(daughter.inner_pseudo_layer()) else { continue };
            if parent_centroid.distance(daughter_centroid) > config.max_centroid_difference {
                continue;
            }
            let end_layer = parent_outer + config.n_fit_projection_layers;
            let Some(distance_to_hit) =
                fragment_geometry::distance_to_closest_hit_from_fit(&fit, daughter, ctx.manager.hits(), parent_outer, end_layer)
            else {
                continue;
            };
            if distance_to_hit > config.max_distance_to_closest_hit {
                continue;
            }
            let Some(distance_to_centroid) =
                fragment_geometry::distance_to_closest_centroid_from_fit(&fit, daughter, parent_outer, end_layer)
            else {
                continue;
            };
            let daughter_energy = daughter.energy(ctx.manager.hits().as_slice());
            if distance_to_centroid < min_distance
                || ((distance_to_centroid - min_distance).abs() < f64::EPSILON && daughter_energy < best_energy)
            {
                min_distance = distance_to_centroid;
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

fn run_fit_direction_pointing(ctx: &mut OperatorContext, config: &ShowerMipMergingConfig) -> Result<()> {
    let mut candidates = eligible_candidates(ctx, config);
    for i in 0..candidates.len() {
        let Some(parent_id) = candidates[i] else { continue };
        let parent = ctx.manager.cluster(parent_id)?;
        if parent.all_hit_ids().count() < config.min_hits_in_fitted_cluster
            || parent.hits().n_layers() < config.min_occupied_layers_in_fitted_cluster
        {
            continue;
        }
        let Ok(fit) = fitting::fit_end(parent, ctx.manager.hits(), config.n_points_to_fit) else { continue };
        if fit.chi2_per_dof > config.fit_to_all_hits_chi2_cut {
            continue;
        }
        let parent_outer = parent.outer_pseudo_layer();
        let Some(parent_outer_centroid) = parent.layer_centroid(parent_outer) else { continue };

        let mut best_daughter = None;
        let mut min_perpendicular = f64::MAX;
        let mut best_energy = f64::MAX;
        for &maybe_daughter in &candidates {
            let Some(daughter_id) = maybe_daughter else { continue };
            if daughter_id == parent_id {
                continue;
            }
            let daughter = ctx.manager.cluster(daughter_id)?;
            let daughter_inner = daughter.inner_pseudo_layer();
            let layer_gap = i64::from(daughter_inner) - i64::from(parent_outer);
            if daughter_inner <= parent_outer || layer_gap > config.max_layer_difference {
                continue;
            }
            let Some(daughter_centroid) = daughter.layer_centroid(daughter_inner) else { continue };
            let centroid_diff = parent_outer_centroid - daughter_centroid;
            if centroid_diff.norm() > config.max_centroid_difference {
                continue;
            }
            if centroid_diff.normalized().dot(fit.direction) > config.max_fit_direction_dot_product {
                continue;
            }
            let perpendicular = fit.direction.cross(centroid_diff).norm();
            let inner_layer_hit_type = daughter
                .hits()
                .layer(daughter_inner)
                .first()
                .map_or(crate::model::HitType::Ecal, |&h| ctx.manager.hits().get(h).hit_type);
            let granularity = ctx.geometry.granularity(inner_layer_hit_type);
            let cut =
                if granularity.is_fine() { config.perpendicular_distance_cut_fine } else { config.perpendicular_distance_cut_coarse };
            if perpendicular > cut {
                continue;
            }
            let daughter_energy = daughter.energy(ctx.manager.hits().as_slice());
            if perpendicular < min_perpendicular
                || ((perpendicular - min_perpendicular).abs() < f64::EPSILON && daughter_energy < best_energy)
            {
                min_perpendicular = perpendicular;
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

fn run_daughter_stub_projection(ctx: &mut OperatorContext, config: &ShowerMipMergingConfig) -> Result<()> {
    let mut candidates: Vec<Option<ClusterId>> = ctx.manager.current_list().into_iter().map(Some).collect();
    for i in 0..candidates.len() {
        let Some(daughter_id) = candidates[i] else { continue };
        let daughter = ctx.manager.cluster(daughter_id)?;
        if daughter.all_hit_ids().count() < config.min_hits_in_fitted_cluster
            || daughter.hits().n_layers() < config.min_occupied_layers_in_fitted_cluster
            || !can_merge_cluster(daughter, ctx.manager.hits(), config.can_merge_min_mip_fraction, config.can_merge_max_rms)
        {
            continue;
        }
        let Ok(fit) = fitting::fit_start(daughter, ctx.manager.hits(), config.n_points_to_fit) else { continue };
        if fit.chi2_per_dof > config.max_fit_chi2 {
            continue;
        }
        let daughter_inner = daughter.inner_pseudo_layer();

        let mut best_parent = None;
        let mut min_distance = config.max_distance_to_closest_hit;
        let mut best_energy = 0.0_f64;
        for &maybe_parent in &candidates {
            let Some(parent_id) = maybe_parent else { continue };
            if parent_id == daughter_id {
                continue;
            }
            let parent = ctx.manager.cluster(parent_id)?;
            if parent.all_hit_ids().count() < config.min_hits_in_other_cluster {
                continue;
            }
            let parent_outer = parent.outer_pseudo_layer();
            if daughter_inner < parent_outer {
                continue;
            }
            let Some(approach) = fragment_geometry::distance_to_closest_hit(daughter, parent, ctx.manager.hits()) else { continue };
            if approach > config.max_cluster_approach {
                continue;
            }
            let start_layer = parent_outer.saturating_sub(config.n_fit_projection_layers);
            let Some(distance) =
                fragment_geometry::distance_to_closest_hit_from_fit(&fit, parent, ctx.manager.hits(), start_layer, parent_outer)
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

fn run_initial_direction_projection(ctx: &mut OperatorContext, config: &ShowerMipMergingConfig) -> Result<()> {
    let mut candidates: Vec<Option<ClusterId>> = ctx.manager.current_list().into_iter().map(Some).collect();
    for i in 0..candidates.len() {
        let Some(daughter_id) = candidates[i] else { continue };
        let daughter = ctx.manager.cluster(daughter_id)?;
        if daughter.all_hit_ids().count() < config.min_hits_in_fitted_cluster
            || !can_merge_cluster(daughter, ctx.manager.hits(), config.can_merge_min_mip_fraction, config.can_merge_max_rms)
        {
            continue;
        }
        let daughter_inner = daughter.inner_pseudo_layer();

        let mut best_parent = None;
        let mut min_projection = config.max_projection_distance;
        let mut best_energy = 0.0_f64;
        for &maybe_parent in &candidates {
            let Some(parent_id) = maybe_parent else { continue };
            if parent_id == daughter_id {
                continue;
            }
            let parent = ctx.manager.cluster(parent_id)?;
            if parent.all_hit_ids().count() < config.min_hits_in_other_cluster {
                continue;
            }
            let parent_outer = parent.outer_pseudo_layer();
            let min_daughter_inner = parent_outer.saturating_sub(config.max_layer_difference.max(0) as u32);
            if daughter_inner < min_daughter_inner {
                continue;
            }
            let projection = fragment_geometry::distance_from_initial_projection(
                parent,
                daughter,
                ctx.manager.hits(),
                config.n_projection_examination_layers,
                config.max_projection_distance_ratio,
            );
            let parent_energy = parent.energy(ctx.manager.hits().as_slice());
            if projection < min_projection
                || ((projection - min_projection).abs() < f64::EPSILON && parent_energy > best_energy)
            {
                min_projection = projection;
                best_parent = Some(parent_id);
                best_energy = parent_energy;
            }
        }

        let Some(parent_id) = best_parent else { continue };
        let parent = ctx.manager.cluster(parent_id)?;
        let daughter = ctx.manager.cluster(daughter_id)?;
        let Some(centroid_distance) = fragment_geometry::distance_to_closest_centroid(parent, daughter) else { continue };
        if centroid_distance < config.max_centroid_difference {
            ctx.manager.merge_and_delete(parent_id, daughter_id)?;
            candidates[i] = None;
        }
    }
    Ok(())
}
