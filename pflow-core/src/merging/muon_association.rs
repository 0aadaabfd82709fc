//! `MuonClusterAssociation`, grounded on
//! `MuonClusterAssociationAlgorithm.cc`.

use crate::compatibility::chi;
use crate::error::Result;
use crate::model::{ClusterId, HitType};
use crate::pipeline::{Operator, OperatorContext};
use serde::{Deserialize, Serialize};

/// Configuration for [`MuonClusterAssociation`].
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MuonClusterAssociationConfig {
    /// Minimum hit count for a cluster to be treated as a muon-sub-detector
    /// cluster.
    pub min_hits_in_muon_cluster: usize,
    /// Outer pseudo-layer at or beyond which a candidate is considered
    /// "leaving" the main calorimeter (i.e. plausibly the source of the
    /// muon-system activity).
    pub min_outer_layer_to_be_leaving: u32,
    /// Coil energy loss correction added to the candidate's calorimetric
    /// energy before the "new chi" is recomputed.
    pub coil_energy_loss_correction: f64,
    /// Symmetric bound the post-merge chi must fall within to accept a
    /// leaving or non-leaving track-associated candidate.
    pub chi_bound: f64,
}

impl Default for MuonClusterAssociationConfig {
    fn default() -> Self {
        Self {
            min_hits_in_muon_cluster: 20,
            min_outer_layer_to_be_leaving: 30,
            coil_energy_loss_correction: 0.25,
            chi_bound: 2.5,
        }
    }
}

/// Associates a cluster left behind in the muon sub-detector with the
/// calorimeter cluster it most plausibly leaked from.
pub struct MuonClusterAssociation {
    /// Operator configuration.
    pub config: MuonClusterAssociationConfig,
}

struct Candidate {
    id: ClusterId,
    hadronic_energy: f64,
}

impl Operator for MuonClusterAssociation {
    fn name(&self) -> &'static str {
        "MuonClusterAssociation"
    }

    fn run(&self, ctx: &mut OperatorContext) -> Result<()> {
        let config = self.config;
        let resolution = ctx.settings.hadronic_energy_resolution;

        let muon_clusters: Vec<ClusterId> = ctx
            .manager
            .current_list()
            .into_iter()
            .filter(|&id| {
                let Ok(cluster) = ctx.manager.cluster(id) else { return false };
                let store = ctx.manager.hits();
                let n_hits = cluster.all_hit_ids().count();
                if n_hits < config.min_hits_in_muon_cluster {
                    return false;
                }
                cluster.hits().layer(cluster.outer_pseudo_layer()).first().is_some_and(|&hit| {
                    store.get(hit).hit_type == HitType::Muon
                })
            })
            .collect();

        for muon_id in muon_clusters {
            let muon_energy = {
                let store = ctx.manager.hits().as_slice();
                let Ok(cluster) = ctx.manager.cluster(muon_id) else { continue };
                cluster.energy(store)
            };

            let mut best: Option<Candidate> = None;
            let mut best_rank = 4_u8;
            for id in ctx.manager.current_list() {
                if id == muon_id {
                    continue;
                }
                let Ok(cluster) = ctx.manager.cluster(id) else { continue };
                let store = ctx.manager.hits().as_slice();
                if cluster.hits().layer(cluster.outer_pseudo_layer()).first().is_some_and(|&hit| {
                    ctx.manager.hits().get(hit).hit_type == HitType::Muon
                }) {
                    continue;
                }
                let leaving = cluster.outer_pseudo_layer() >= config.min_outer_layer_to_be_leaving;
                let track_associated = !cluster.tracks().is_empty();
                let cluster_energy = cluster.energy(store);
                let track_energy_sum: f64 =
                    cluster.tracks().iter().map(|&t| ctx.manager.tracks().get(t).energy_at_dca).sum();
                let old_chi = chi(cluster_energy, track_energy_sum, resolution);
                let new_chi = chi(
                    cluster_energy + muon_energy + config.coil_energy_loss_correction,
                    track_energy_sum,
                    resolution,
                );
                let hadronic_energy = cluster.hadronic_energy(|h| ctx.manager.hits().get(h).hadronic_energy);

                let rank = match (leaving, track_associated) {
                    (true, true) if new_chi.abs() <= config.chi_bound => 0,
                    (true, false) => 1,
                    (false, true) if old_chi < -config.chi_bound && new_chi.abs() <= config.chi_bound => 2,
                    _ => continue,
                };

                let candidate = Candidate { id, hadronic_energy };
                let replace = rank < best_rank
                    || (rank == best_rank
                        && best.as_ref().is_some_and(|b| {
                            hadronic_energy > b.hadronic_energy
                                || ((hadronic_energy - b.hadronic_energy).abs() < f64::EPSILON && id < b.id)
                        }));
                if replace {
                    best_rank = rank;
                    best = Some(candidate);
                }
            }

            if let Some(target) = best {
                ctx.manager.merge_and_delete(target.id, muon_id)?;
            }
            // Else: no acceptable target, the muon-sub-detector cluster is
            // preserved standalone.
        }
        Ok(())
    }
}
