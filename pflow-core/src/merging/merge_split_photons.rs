//! `MergeSplitPhotons`, grounded on
//! `MergeSplitPhotonsAlgorithm.cc`.

use crate::error::{Error, Result};
use crate::fragment_geometry;
use crate::model::ClusterId;
use crate::pipeline::{Operator, OperatorContext};
use serde::{Deserialize, Serialize};

/// Configuration for [`MergeSplitPhotons`].
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MergeSplitPhotonsConfig {
    /// Minimum cosine opening angle between the two clusters'
    /// shower-max centroids for the pair to be considered.
    pub min_shower_max_cos_angle: f64,
    /// Contact-layer distance threshold (cell widths).
    pub contact_distance_threshold: f64,
    /// Minimum contact-layer count.
    pub min_contact_layers: u32,
    /// Minimum contact fraction.
    pub min_contact_fraction: f64,
    /// Layer up to which the main transverse-profile check is run.
    pub trans_profile_max_layer: u32,
    /// Below this EM energy, the smaller fragment is always merged.
    pub accept_max_small_fragment_energy: f64,
    /// Subsidiary-peak energy ceiling for the ratio-based acceptance
    /// branch.
    pub accept_max_subsidiary_peak_energy: f64,
    /// Small/large EM energy ratio ceiling for acceptance.
    pub accept_fragment_energy_ratio: f64,
    /// Subsidiary-peak/small-fragment energy ratio ceiling for
    /// acceptance.
    pub accept_subsidiary_peak_energy_ratio: f64,
    /// Layer up to which the early-peak veto profile is run, for pairs
    /// above `accept_max_small_fragment_energy`.
    pub early_trans_profile_max_layer: u32,
}

impl Default for MergeSplitPhotonsConfig {
    fn default() -> Self {
        Self {
            min_shower_max_cos_angle: 0.98,
            contact_distance_threshold: 2.0,
            min_contact_layers: 3,
            min_contact_fraction: 0.5,
            trans_profile_max_layer: 30,
            accept_max_small_fragment_energy: 0.2,
            accept_max_subsidiary_peak_energy: 0.5,
            accept_fragment_energy_ratio: 0.05,
            accept_subsidiary_peak_energy_ratio: 0.1,
            early_trans_profile_max_layer: 20,
        }
    }
}

/// Tentatively merges nearby photon-tagged cluster pairs and keeps the
/// merge only if the combined transverse shower profile still looks
/// like one photon.
pub struct MergeSplitPhotons {
    /// Operator configuration.
    pub config: MergeSplitPhotonsConfig,
}

impl Operator for MergeSplitPhotons {
    fn name(&self) -> &'static str {
        "MergeSplitPhotons"
    }

    fn run(&self, ctx: &mut OperatorContext) -> Result<()> {
        let config = self.config;
        let Some(profile_plugin) = ctx.plugins.shower_profile() else {
            return Err(Error::NotInitialised("no shower-profile plugin registered".into()));
        };

        let mut candidates: Vec<Option<ClusterId>> = ctx.manager.current_list().into_iter().map(Some).collect();

        for i in 0..candidates.len() {
            let Some(parent_id) = candidates[i] else { continue };
            let (parent_outer_hit_type, parent_tracks_empty, is_parent_photon, parent_max_centroid) = {
                let parent = ctx.manager.cluster(parent_id)?;
                let Some(outer_hit) = parent.hits().layer(parent.outer_pseudo_layer()).first().copied() else { continue };
                let max_centroid = parent.shower_max_layer().and_then(|l| parent.layer_centroid(l));
                (ctx.manager.hits().get(outer_hit).hit_type, parent.tracks().is_empty(), parent.is_fixed_photon(), max_centroid)
            };
            if !parent_tracks_empty || !ctx.geometry.granularity(parent_outer_hit_type).is_fine() {
                continue;
            }
            let Some(parent_max_centroid) = parent_max_centroid else { continue };

            for j in (i + 1)..candidates.len() {
                let Some(daughter_id) = candidates[j] else { continue };
                let (daughter_outer_hit_type, daughter_tracks_empty, is_daughter_photon, daughter_max_centroid) = {
                    let daughter = ctx.manager.cluster(daughter_id)?;
                    let Some(outer_hit) = daughter.hits().layer(daughter.outer_pseudo_layer()).first().copied() else { continue };
                    let max_centroid = daughter.shower_max_layer().and_then(|l| daughter.layer_centroid(l));
                    (ctx.manager.hits().get(outer_hit).hit_type, daughter.tracks().is_empty(), daughter.is_fixed_photon(), max_centroid)
                };
                if !daughter_tracks_empty || !ctx.geometry.granularity(daughter_outer_hit_type).is_fine() {
                    continue;
                }
                let Some(daughter_max_centroid) = daughter_max_centroid else { continue };

                if !is_parent_photon && !is_daughter_photon {
                    continue;
                }
                let cos_angle = parent_max_centroid.normalized().dot(daughter_max_centroid.normalized());
                if cos_angle <= config.min_shower_max_cos_angle {
                    continue;
                }

                let (n_contact_layers, contact_fraction) = {
                    let parent = ctx.manager.cluster(parent_id)?;
                    let daughter = ctx.manager.cluster(daughter_id)?;
                    fragment_geometry::cluster_contact_details(parent, daughter, ctx.manager.hits(), config.contact_distance_threshold)
                };
                if n_contact_layers < config.min_contact_layers || contact_fraction <= config.min_contact_fraction {
                    continue;
                }

                let accepted = evaluate_merge(ctx, parent_id, daughter_id, &config, profile_plugin)?;
                if accepted {
                    candidates[i] = None;
                    candidates[j] = None;
                    break;
                }
            }
        }
        Ok(())
    }
}

fn evaluate_merge(
    ctx: &mut OperatorContext,
    parent_id: ClusterId,
    daughter_id: ClusterId,
    config: &MergeSplitPhotonsConfig,
    profile_plugin: &(dyn crate::plugins::ShowerProfilePlugin + Send + Sync),
) -> Result<bool> {
    let (small_fragment_energy, large_fragment_energy) = {
        let parent = ctx.manager.cluster(parent_id)?;
        let daughter = ctx.manager.cluster(daughter_id)?;
        let store = ctx.manager.hits().as_slice();
        let parent_em = parent.em_energy(|id| store[id.index()].electromagnetic_energy);
        let daughter_em = daughter.em_energy(|id| store[id.index()].electromagnetic_energy);
        (parent_em.min(daughter_em), parent_em.max(daughter_em))
    };

    let handle = ctx.manager.initialize_transaction(&[parent_id, daughter_id])?;
    let pool = ctx.manager.transaction_pool(&handle).to_vec();
    let candidate = ctx.manager.add_candidate(&handle, vec![pool])?;
    ctx.manager.preview_candidate(&handle, candidate)?;

    let merged_id = ctx.manager.candidate_cluster_ids(&handle, candidate).first().copied();
    let mut accepted = false;
    if let Some(merged_id) = merged_id {
        let merged = ctx.manager.cluster(merged_id)?;
        let peaks = profile_plugin.calculate_transverse_profile(merged, ctx.manager.hits(), config.trans_profile_max_layer);
        let subsidiary_peak_energy = peaks.get(1).map_or(0.0, |p| p.energy);

        if small_fragment_energy < config.accept_max_small_fragment_energy {
            accepted = true;
        } else if subsidiary_peak_energy < config.accept_max_subsidiary_peak_energy {
            if small_fragment_energy < config.accept_fragment_energy_ratio * large_fragment_energy {
                accepted = true;
            } else if subsidiary_peak_energy < config.accept_subsidiary_peak_energy_ratio * small_fragment_energy {
                accepted = true;
            }
        }

        if accepted && small_fragment_energy > config.accept_max_small_fragment_energy {
            let merged = ctx.manager.cluster(merged_id)?;
            let early_peaks = profile_plugin.calculate_transverse_profile(merged, ctx.manager.hits(), config.early_trans_profile_max_layer);
            let early_subsidiary_peak_energy = early_peaks.get(1).map_or(0.0, |p| p.energy);
            if early_subsidiary_peak_energy > config.accept_max_subsidiary_peak_energy {
                accepted = false;
            }
        }
    }

    let winner = accepted.then_some(candidate);
    ctx.manager.end_transaction(handle, winner)?;
    Ok(accepted)
}
