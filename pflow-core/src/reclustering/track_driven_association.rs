//! `TrackDrivenAssociation`, grounded on
//! `TrackDrivenAssociationAlg.cc`. Like
//! [`super::resolve_track_associations::ResolveTrackAssociations`] for an
//! under-energetic cluster, but pulls in neighbouring track-free clusters
//! identified either by cone overlap *or* by contact layers, and falls
//! back to directly merging a neighbour ("rescuing" the shortfall) when
//! no clustering algorithm produces an acceptable reclustering.

use super::{commit_winner, try_clustering_algorithms, Candidate};
use crate::compatibility::{chi, extract_recluster_results};
use crate::error::Result;
use crate::fragment_geometry::{cluster_contact_details, fraction_of_hits_in_cone_from_cluster};
use crate::model::ClusterId;
use crate::pipeline::{Operator, OperatorContext};
use serde::{Deserialize, Serialize};

/// Configuration for [`TrackDrivenAssociation`].
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrackDrivenAssociationConfig {
    /// A track-associated cluster with chi below
    /// `-chi_to_attempt_reclustering` is "under-energetic" and eligible.
    pub chi_to_attempt_reclustering: f64,
    /// Cone half-angle cosine used to pull in nearby track-free clusters
    /// as extra seed material.
    pub cone_cosine_half_angle: f64,
    /// Contact-layer distance threshold (cell widths) used as an
    /// alternative neighbour-inclusion test to the cone fraction.
    pub contact_distance_threshold: f64,
    /// Minimum contact-layer count for the contact-based neighbour test.
    pub min_contact_layers: u32,
    /// Clustering algorithms tried, in order.
    pub clustering_algorithms: Vec<String>,
    /// Association algorithm used to assign tracks to each candidate's
    /// clusters, if any.
    pub association_algorithm: Option<String>,
    /// Minimum chi²-per-dof improvement required.
    pub min_chi2_improvement: f64,
    /// Minimum energy the least-energetic track-associated candidate
    /// cluster must have.
    pub min_track_associated_cluster_energy: f64,
    /// A candidate with chi²-per-dof below this is accepted immediately.
    pub chi2_for_automatic_cluster_selection: f64,
    /// Minimum fraction of a rescue neighbour's energy that must be
    /// "needed" to close the energy shortfall for the direct-merge
    /// rescue to fire.
    pub min_rescue_alpha: f64,
}

impl Default for TrackDrivenAssociationConfig {
    fn default() -> Self {
        Self {
            chi_to_attempt_reclustering: 3.0,
            cone_cosine_half_angle: 0.9,
            contact_distance_threshold: 2.0,
            min_contact_layers: 2,
            clustering_algorithms: Vec::new(),
            association_algorithm: None,
            min_chi2_improvement: 1.0,
            min_track_associated_cluster_energy: 0.1,
            chi2_for_automatic_cluster_selection: 1.0,
            min_rescue_alpha: 0.5,
        }
    }
}

fn acceptable(candidate: &Candidate, original_chi2: f64, config: &TrackDrivenAssociationConfig) -> bool {
    original_chi2 - candidate.result.chi2_per_dof >= config.min_chi2_improvement
        && candidate.result.min_track_association_energy > config.min_track_associated_cluster_energy
        && candidate.result.n_excess_track_associations == 0
}

/// Resolves an under-energetic track-associated cluster, pulling in
/// neighbours by cone overlap or contact layers before reclustering, and
/// directly merging the best neighbour as a last-resort rescue when
/// reclustering finds nothing acceptable.
pub struct TrackDrivenAssociation {
    /// Operator configuration.
    pub config: TrackDrivenAssociationConfig,
}

impl Operator for TrackDrivenAssociation {
    fn name(&self) -> &'static str {
        "TrackDrivenAssociation"
    }

    fn run(&self, ctx: &mut OperatorContext) -> Result<()> {
        let config = &self.config;
        let resolution = ctx.settings.hadronic_energy_resolution;

        let seeds: Vec<ClusterId> = ctx
            .manager
            .current_list()
            .into_iter()
            .filter(|&id| {
                let Ok(cluster) = ctx.manager.cluster(id) else { return false };
                if cluster.tracks().is_empty() {
                    return false;
                }
                let store = ctx.manager.hits().as_slice();
                let track_energy_sum: f64 =
                    cluster.tracks().iter().map(|&t| ctx.manager.tracks().get(t).energy_at_dca).sum();
                chi(cluster.energy(store), track_energy_sum, resolution) < -config.chi_to_attempt_reclustering
            })
            .collect();

        for seed in seeds {
            self.resolve_one(ctx, seed, config, resolution)?;
        }
        Ok(())
    }
}

impl TrackDrivenAssociation {
    fn neighbours(&self, ctx: &OperatorContext, seed: ClusterId, config: &TrackDrivenAssociationConfig) -> Vec<ClusterId> {
        let mut out = Vec::new();
        let store = ctx.manager.hits();
        let tracks = ctx.manager.tracks().as_slice();
        let Ok(parent) = ctx.manager.cluster(seed) else { return out };
        for other in ctx.manager.current_list() {
            if other == seed {
                continue;
            }
            let Ok(candidate) = ctx.manager.cluster(other) else { continue };
            if !candidate.tracks().is_empty() {
                continue;
            }
            let cone_fraction =
                fraction_of_hits_in_cone_from_cluster(candidate, store, parent, tracks, config.cone_cosine_half_angle);
            let (n_contact_layers, _) = cluster_contact_details(parent, candidate, store, config.contact_distance_threshold);
            if cone_fraction > 0.0 || n_contact_layers >= config.min_contact_layers {
                out.push(other);
            }
        }
        out
    }

    fn resolve_one(
        &self,
        ctx: &mut OperatorContext,
        seed: ClusterId,
        config: &TrackDrivenAssociationConfig,
        resolution: f64,
    ) -> Result<()> {
        let original = extract_recluster_results(ctx.manager, &[seed], resolution);
        let original_chi2 = original.chi2_per_dof;
        let neighbour_ids = self.neighbours(ctx, seed, config);

        let mut seed_ids = vec![seed];
        seed_ids.extend(neighbour_ids.iter().copied());

        let Ok(handle) = ctx.manager.initialize_transaction(&seed_ids) else { return Ok(()) };
        let candidates = try_clustering_algorithms(
            ctx,
            &handle,
            &config.clustering_algorithms,
            config.association_algorithm.as_deref(),
            resolution,
        );

        let mut winner: Option<Candidate> = None;
        let mut winner_chi2 = f64::MAX;
        let mut best_guess: Option<Candidate> = None;
        let mut best_guess_chi2 = f64::MAX;
        for candidate in candidates {
            if acceptable(&candidate, original_chi2, config) {
                if candidate.result.chi2_per_dof < winner_chi2 {
                    winner_chi2 = candidate.result.chi2_per_dof;
                    let accept_now = candidate.result.chi2_per_dof < config.chi2_for_automatic_cluster_selection;
                    winner = Some(candidate);
                    if accept_now {
                        break;
                    }
                }
            } else if candidate.result.chi_per_dof > 0.0 && candidate.result.chi2_per_dof < best_guess_chi2 {
                best_guess_chi2 = candidate.result.chi2_per_dof;
                best_guess = Some(candidate);
            }
        }

        let found_winner = winner.is_some();
        let winner = winner.or(best_guess);
        commit_winner(ctx, handle, winner.as_ref(), config.association_algorithm.as_deref())?;

        if found_winner {
            return Ok(());
        }
        self.rescue(ctx, seed, &neighbour_ids, config)
    }

    /// Directly merge the single neighbour whose energy would most
    /// plausibly close the seed's energy shortfall, when no clustering
    /// algorithm produced an acceptable reclustering.
    fn rescue(
        &self,
        ctx: &mut OperatorContext,
        seed: ClusterId,
        neighbour_ids: &[ClusterId],
        config: &TrackDrivenAssociationConfig,
    ) -> Result<()> {
        let (cluster_energy, track_energy_sum) = {
            let Ok(cluster) = ctx.manager.cluster(seed) else { return Ok(()) };
            let store = ctx.manager.hits().as_slice();
            let track_energy_sum: f64 = cluster.tracks().iter().map(|&t| ctx.manager.tracks().get(t).energy_at_dca).sum();
            (cluster.energy(store), track_energy_sum)
        };
        let excess = track_energy_sum - cluster_energy;
        if excess <= 0.0 {
            return Ok(());
        }

        let mut best: Option<(ClusterId, f64)> = None;
        for &neighbour in neighbour_ids {
            let Ok(cluster) = ctx.manager.cluster(neighbour) else { continue };
            let neighbour_energy = cluster.energy(ctx.manager.hits().as_slice());
            if neighbour_energy <= f64::EPSILON {
                continue;
            }
            let alpha = (excess / neighbour_energy).clamp(0.0, 1.0);
            if alpha < config.min_rescue_alpha {
                continue;
            }
            let distance_to_ideal = (neighbour_energy - excess).abs();
            let better = match best {
                Some((_, best_distance)) => distance_to_ideal < best_distance,
                None => true,
            };
            if better {
                best = Some((neighbour, distance_to_ideal));
            }
        }

        if let Some((neighbour, _)) = best {
            ctx.manager.merge_and_delete(seed, neighbour)?;
        }
        Ok(())
    }
}
