//! `SplitTrackAssociations`, grounded on
//! `SplitTrackAssociationsAlg.cc`.

use super::{commit_winner, try_clustering_algorithms, Candidate};
use crate::compatibility::{chi, extract_recluster_results};
use crate::error::Result;
use crate::model::ClusterId;
use crate::pipeline::{Operator, OperatorContext};
use serde::{Deserialize, Serialize};

/// Configuration for [`SplitTrackAssociations`].
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SplitTrackAssociationsConfig {
    /// A track-associated cluster with chi above this is "over-energetic"
    /// and eligible for splitting.
    pub chi_to_attempt_reclustering: f64,
    /// Clustering algorithms tried, in order.
    pub clustering_algorithms: Vec<String>,
    /// Association algorithm used to assign tracks to each candidate's
    /// clusters, if any.
    pub association_algorithm: Option<String>,
    /// Minimum chi²-per-dof improvement (original − candidate) required.
    pub min_chi2_improvement: f64,
    /// Minimum energy the least-energetic track-associated candidate
    /// cluster must have.
    pub min_track_associated_cluster_energy: f64,
    /// A candidate with chi²-per-dof below this is accepted immediately,
    /// without trying later algorithms in the ordered list.
    pub chi2_for_automatic_cluster_selection: f64,
    /// Clustering algorithm tried as a last resort if no ordered
    /// algorithm produced an acceptable candidate.
    pub forced_clustering_algorithm: Option<String>,
    /// Minimum chi²-per-dof improvement required to accept the forced
    /// candidate.
    pub min_forced_chi2_improvement: f64,
    /// Maximum chi²-per-dof the forced candidate may still have.
    pub max_forced_chi2: f64,
}

impl Default for SplitTrackAssociationsConfig {
    fn default() -> Self {
        Self {
            chi_to_attempt_reclustering: 3.0,
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

fn acceptable(candidate: &Candidate, original_chi2: f64, config: &SplitTrackAssociationsConfig) -> bool {
    original_chi2 - candidate.result.chi2_per_dof >= config.min_chi2_improvement
        && candidate.result.min_track_association_energy > config.min_track_associated_cluster_energy
        && candidate.result.n_excess_track_associations == 0
}

/// Splits an over-energetic track-associated cluster by trying clustering
/// algorithms until one yields an acceptably improved chi².
pub struct SplitTrackAssociations {
    /// Operator configuration.
    pub config: SplitTrackAssociationsConfig,
}

impl Operator for SplitTrackAssociations {
    fn name(&self) -> &'static str {
        "SplitTrackAssociations"
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
                chi(cluster.energy(store), track_energy_sum, resolution) > config.chi_to_attempt_reclustering
            })
            .collect();

        for seed in seeds {
            let original = extract_recluster_results(ctx.manager, &[seed], resolution);
            let original_chi2 = original.chi2_per_dof;

            let Ok(handle) = ctx.manager.initialize_transaction(&[seed]) else { continue };
            let candidates = try_clustering_algorithms(
                ctx,
                &handle,
                &config.clustering_algorithms,
                config.association_algorithm.as_deref(),
                resolution,
            );

            let mut winner: Option<Candidate> = None;
            let mut winner_chi2 = f64::MAX;
            let mut stop_early = false;
            for candidate in candidates {
                if !acceptable(&candidate, original_chi2, config) {
                    continue;
                }
                let better = candidate.result.chi2_per_dof < winner_chi2;
                if better {
                    winner_chi2 = candidate.result.chi2_per_dof;
                    let accept_now = candidate.result.chi2_per_dof < config.chi2_for_automatic_cluster_selection;
                    winner = Some(candidate);
                    if accept_now {
                        stop_early = true;
                    }
                }
                if stop_early {
                    break;
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

            commit_winner(ctx, handle, winner.as_ref(), config.association_algorithm.as_deref())?;
        }
        Ok(())
    }
}
