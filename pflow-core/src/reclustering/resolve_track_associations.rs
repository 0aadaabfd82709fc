//! `ResolveTrackAssociations`, grounded on
//! `ResolveTrackAssociationsAlg.cc`. Mirror of
//! [`super::split_track_associations::SplitTrackAssociations`] for
//! under-energetic clusters.

use super::{commit_winner, try_clustering_algorithms, Candidate};
use crate::compatibility::{chi, extract_recluster_results};
use crate::error::Result;
use crate::fragment_geometry::fraction_of_hits_in_cone_from_cluster;
use crate::model::ClusterId;
use crate::pipeline::{Operator, OperatorContext};
use serde::{Deserialize, Serialize};

/// Configuration for [`ResolveTrackAssociations`].
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResolveTrackAssociationsConfig {
    /// A track-associated cluster with chi below `-chi_to_attempt_reclustering`
    /// is "under-energetic" and eligible.
    pub chi_to_attempt_reclustering: f64,
    /// Cone half-angle cosine used to pull in nearby track-free clusters
    /// as extra seed material.
    pub cone_cosine_half_angle: f64,
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
    /// Clustering algorithm tried as a last resort.
    pub forced_clustering_algorithm: Option<String>,
    /// Minimum chi²-per-dof improvement required to accept the forced
    /// candidate.
    pub min_forced_chi2_improvement: f64,
    /// Maximum chi²-per-dof the forced candidate may still have.
    pub max_forced_chi2: f64,
}

impl Default for ResolveTrackAssociationsConfig {
    fn default() -> Self {
        Self {
            chi_to_attempt_reclustering: 3.0,
            cone_cosine_half_angle: 0.9,
            clustering_algorithms: Vec::new(),
            association_algorithm: None,
            min_chi2_improvement: 1.0,
            min_track_associated_cluster_energy: 0.1,
            chi2_for_automatic_cluster_selection: 1.0,
            forced_clustering_algorithm: None,
            min_forced_chi2_improvement: 0.5,
            max_forced_chi2: 9.0,
        }
    }
}

fn acceptable(candidate: &Candidate, original_chi2: f64, config: &ResolveTrackAssociationsConfig) -> bool {
    original_chi2 - candidate.result.chi2_per_dof >= config.min_chi2_improvement
        && candidate.result.min_track_association_energy > config.min_track_associated_cluster_energy
        && candidate.result.n_excess_track_associations == 0
}

/// Resolves an under-energetic track-associated cluster, extending the
/// seed with nearby cone-overlapping track-free clusters before trying to
/// recluster.
pub struct ResolveTrackAssociations {
    /// Operator configuration.
    pub config: ResolveTrackAssociationsConfig,
}

impl Operator for ResolveTrackAssociations {
    fn name(&self) -> &'static str {
        "ResolveTrackAssociations"
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
            let original = extract_recluster_results(ctx.manager, &[seed], resolution);
            let original_chi2 = original.chi2_per_dof;

            let mut seed_ids = vec![seed];
            {
                let store = ctx.manager.hits();
                let tracks = ctx.manager.tracks().as_slice();
                let Ok(parent) = ctx.manager.cluster(seed) else { continue };
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
                    if fraction > 0.0 {
                        seed_ids.push(other);
                    }
                }
            }

            let Ok(handle) = ctx.manager.initialize_transaction(&seed_ids) else { continue };
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

            if winner.is_none() {
                if let Some(forced_name) = &config.forced_clustering_algorithm {
                    let forced = try_clustering_algorithms(
                        ctx,
                        &handle,
                        std::slice::from_ref(forced_name),
                        config.association_algorithm.as_deref(),
                        resolution,
                    );
                    if let Some(candidate) = forced.into_iter().next() {
                        let improvement = original_chi2 - candidate.result.chi2_per_dof;
                        if improvement > config.min_forced_chi2_improvement
                            && candidate.result.chi2_per_dof < config.max_forced_chi2
                        {
                            winner = Some(candidate);
                        }
                    }
                }
            }

            let winner = winner.or(best_guess);
            commit_winner(ctx, handle, winner.as_ref(), config.association_algorithm.as_deref())?;
        }
        Ok(())
    }
}
