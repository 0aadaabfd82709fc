//! Reclustering operators: transactional re-derivation of the
//! track-cluster association for a single over- or under-energetic
//! cluster, using the manager's scoped transaction primitives
//! ([`crate::manager::ClusterManager::initialize_transaction`] and
//! friends).

pub mod resolve_track_associations;
pub mod split_track_associations;
pub mod track_driven_association;
pub mod track_driven_merging;

use crate::compatibility::{extract_recluster_results, ReclusterResult};
use crate::manager::TransactionHandle;
use crate::model::ClusterId;
use crate::pipeline::OperatorContext;

/// One candidate clustering tried inside a transaction, evaluated while it
/// was the previewed "current list".
pub(crate) struct Candidate {
    pub id: crate::manager::CandidateId,
    pub cluster_ids: Vec<ClusterId>,
    pub result: ReclusterResult,
}

/// Try every named clustering algorithm over the transaction's hit pool,
/// in order, skipping any that is unregistered or produces no clusters.
/// Each surviving candidate has the configured association algorithm
/// applied (if any) while previewed, and its [`ReclusterResult`] computed
/// on the spot — both of which only persist in `self.current`, not the
/// stored candidate snapshot, so a winner must re-apply the association
/// after [`crate::manager::ClusterManager::end_transaction`] (see
/// [`commit_winner`]).
pub(crate) fn try_clustering_algorithms(
    ctx: &mut OperatorContext,
    handle: &TransactionHandle,
    algorithms: &[String],
    association_algorithm: Option<&str>,
    hadronic_energy_resolution: f64,
) -> Vec<Candidate> {
    let mut out = Vec::new();
    for name in algorithms {
        let Some(plugin) = ctx.plugins.clustering(name) else { continue };
        let pool = ctx.manager.transaction_pool(handle).to_vec();
        let groups = plugin.run(ctx.manager.hits(), &pool);
        if groups.is_empty() {
            continue;
        }
        let Ok(id) = ctx.manager.add_candidate(handle, groups) else { continue };
        if ctx.manager.preview_candidate(handle, id).is_err() {
            continue;
        }
        let cluster_ids = ctx.manager.candidate_cluster_ids(handle, id);
        if let Some(assoc_name) = association_algorithm {
            if let Some(assoc_plugin) = ctx.plugins.association(assoc_name) {
                ctx.manager.apply_association_plugin(assoc_plugin, &cluster_ids);
            }
        }
        let result = extract_recluster_results(ctx.manager, &cluster_ids, hadronic_energy_resolution);
        out.push(Candidate { id, cluster_ids, result });
    }
    out
}

/// Commit `winner` (or abort to the original seed if `None`), re-applying
/// the association algorithm over the winner's clusters since committing
/// replaces them with their pristine, association-free snapshot.
pub(crate) fn commit_winner(
    ctx: &mut OperatorContext,
    handle: TransactionHandle,
    winner: Option<&Candidate>,
    association_algorithm: Option<&str>,
) -> crate::error::Result<()> {
    match winner {
        Some(candidate) => {
            ctx.manager.end_transaction(handle, Some(candidate.id))?;
            if let Some(assoc_name) = association_algorithm {
                if let Some(assoc_plugin) = ctx.plugins.association(assoc_name) {
                    ctx.manager.apply_association_plugin(assoc_plugin, &candidate.cluster_ids);
                }
            }
        }
        None => ctx.manager.end_transaction(handle, None)?,
    }
    Ok(())
}
