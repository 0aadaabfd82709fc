//! `FragmentRemoval`, photon and neutral variants, grounded
//! on `PhotonFragmentRemovalAlgorithm.cc` / `NeutralFragmentRemovalAlgorithm.cc`.

use crate::contact::{ClusterContact, ContactParameters};
use crate::error::Result;
use crate::model::{Cluster, ClusterId};
use crate::pipeline::{Operator, OperatorContext};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Which fragment-removal variant to run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum FragmentRemovalVariant {
    /// `PhotonFragmentRemovalAlgorithm`: daughters optionally restricted
    /// to photon-like clusters, parent must already be photon-tagged,
    /// one cone angle.
    Photon,
    /// `NeutralFragmentRemovalAlgorithm`: daughters and parents must both
    /// be track-less and non-photon, three cone angles of increasing
    /// tightness.
    Neutral,
}

/// Configuration shared by both variants; fields unused by the selected
/// variant are simply ignored (see each `run_*` function for which).
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct FragmentRemovalConfig {
    /// Which variant to run.
    pub variant: FragmentRemovalVariant,
    /// Cap on fixed-point iterations.
    pub n_max_passes: u32,
    /// Minimum calo hits for a daughter candidate.
    pub min_daughter_calo_hits: usize,
    /// Minimum hadronic energy for a daughter candidate.
    pub min_daughter_hadronic_energy: f64,
    /// Contact-geometry parameters (cone angles, close-hit distances,
    /// opening-angle gate, contact-layer threshold).
    pub contact_parameters: ContactParameters,
    /// Photon variant: restrict daughters to photon-like clusters.
    pub use_only_photon_like_daughters: bool,
    /// Photon variant: parent inner layer may be at most this many layers
    /// below the daughter's before the pair is rejected.
    pub inner_layer_tolerance: u32,
    /// Photon/neutral "photon-like" gate: maximum inner pseudo-layer.
    pub photon_like_max_inner_layer: u32,
    /// Photon/neutral "photon-like" gate: minimum fit radial-direction
    /// cosine.
    pub photon_like_min_radial_direction_cosine: f64,
    /// Cluster contact cut: maximum distance to closest hit.
    pub contact_cut_max_distance: f64,
    /// Cluster contact cut: maximum contact-layer count (above which the
    /// "maybe" branch below is taken regardless of cone/close-hit).
    pub contact_cut_n_layers: u32,
    /// Cluster contact cut: cone-fraction\[0\] ceiling.
    pub contact_cut_cone_fraction_1: f64,
    /// Cluster contact cut: close-hit-fraction\[0\] ceiling.
    pub contact_cut_close_hit_fraction_1: f64,
    /// Cluster contact cut: close-hit-fraction\[1\] ceiling.
    pub contact_cut_close_hit_fraction_2: f64,
    /// Neutral variant: nearby-daughter distance below which the
    /// close-hit-fraction\[1\] alone can still admit the contact.
    pub contact_cut_nearby_distance: f64,
    /// Neutral variant: close-hit-fraction\[1\] floor for the nearby
    /// branch above.
    pub contact_cut_nearby_close_hit_fraction_2: f64,
    /// Neutral variant: contact-layer threshold for full contact
    /// evidence.
    pub contact_evidence_n_layers_1: u32,
    /// Neutral variant: contact-layer threshold for medium evidence.
    pub contact_evidence_n_layers_2: u32,
    /// Neutral variant: contact-layer threshold for low evidence.
    pub contact_evidence_n_layers_3: u32,
    /// Neutral variant: full contact-evidence value.
    pub contact_evidence_1: f64,
    /// Neutral variant: medium contact-evidence value.
    pub contact_evidence_2: f64,
    /// Neutral variant: low contact-evidence value.
    pub contact_evidence_3: f64,
    /// Photon variant: contact-layer threshold for contact evidence.
    pub photon_contact_evidence_n_layers: u32,
    /// Photon variant: contact-fraction floor for contact evidence.
    pub photon_contact_evidence_fraction: f64,
    /// Cone-fraction\[0\] floor before cone evidence is counted at all.
    pub cone_evidence_fraction_1: f64,
    /// Neutral variant: fine-granularity multiplier applied to cone
    /// evidence.
    pub cone_evidence_fine_granularity_multiplier: f64,
    /// Distance scale: contacts beyond this contribute no distance
    /// evidence.
    pub distance_evidence_1: f64,
    /// Distance-evidence normalisation divisor.
    pub distance_evidence_1d: f64,
    /// Close-hit-fraction\[0\] multiplier in the distance-evidence term.
    pub distance_evidence_close_fraction_1_multiplier: f64,
    /// Close-hit-fraction\[1\] multiplier in the distance-evidence term.
    pub distance_evidence_close_fraction_2_multiplier: f64,
    /// Weight applied to contact evidence.
    pub contact_weight: f64,
    /// Weight applied to cone evidence.
    pub cone_weight: f64,
    /// Weight applied to distance evidence.
    pub distance_weight: f64,
    /// Minimum total evidence required to accept a merge.
    pub min_evidence: f64,
}

impl Default for FragmentRemovalConfig {
    fn default() -> Self {
        Self {
            variant: FragmentRemovalVariant::Neutral,
            n_max_passes: 200,
            min_daughter_calo_hits: 5,
            min_daughter_hadronic_energy: 0.025,
            contact_parameters: ContactParameters {
                cone_cosine_half_angles: vec![0.9, 0.95, 0.985],
                close_hit_distances: vec![100.0, 50.0],
                min_cos_opening_angle: 0.5,
                distance_threshold: 2.0,
            },
            use_only_photon_like_daughters: true,
            inner_layer_tolerance: 5,
            photon_like_max_inner_layer: 10,
            photon_like_min_radial_direction_cosine: 0.5,
            contact_cut_max_distance: 500.0,
            contact_cut_n_layers: 2,
            contact_cut_cone_fraction_1: 0.5,
            contact_cut_close_hit_fraction_1: 0.5,
            contact_cut_close_hit_fraction_2: 0.5,
            contact_cut_nearby_distance: 100.0,
            contact_cut_nearby_close_hit_fraction_2: 0.25,
            contact_evidence_n_layers_1: 10,
            contact_evidence_n_layers_2: 4,
            contact_evidence_n_layers_3: 1,
            contact_evidence_1: 2.0,
            contact_evidence_2: 1.0,
            contact_evidence_3: 0.5,
            photon_contact_evidence_n_layers: 2,
            photon_contact_evidence_fraction: 0.5,
            cone_evidence_fraction_1: 0.5,
            cone_evidence_fine_granularity_multiplier: 0.5,
            distance_evidence_1: 100.0,
            distance_evidence_1d: 100.0,
            distance_evidence_close_fraction_1_multiplier: 1.0,
            distance_evidence_close_fraction_2_multiplier: 2.0,
            contact_weight: 1.0,
            cone_weight: 1.0,
            distance_weight: 1.0,
            min_evidence: 2.0,
        }
    }
}

/// The photon variant's defaults (tighter distance/cone gates, single
/// cone angle, parent must already be photon-tagged).
#[must_use]
pub fn photon_defaults() -> FragmentRemovalConfig {
    FragmentRemovalConfig {
        variant: FragmentRemovalVariant::Photon,
        contact_parameters: ContactParameters {
            cone_cosine_half_angles: vec![0.95],
            close_hit_distances: vec![40.0, 20.0],
            min_cos_opening_angle: 0.95,
            distance_threshold: 2.0,
        },
        contact_cut_max_distance: 20.0,
        contact_cut_close_hit_fraction_2: 0.2,
        ..FragmentRemovalConfig::default()
    }
}

/// Merges a daughter fragment of a nearby, contact-consistent parent.
pub struct FragmentRemoval {
    /// Operator configuration, including the variant to run.
    pub config: FragmentRemovalConfig,
}

impl Operator for FragmentRemoval {
    fn name(&self) -> &'static str {
        "FragmentRemoval"
    }

    fn run(&self, ctx: &mut OperatorContext) -> Result<()> {
        match self.config.variant {
            FragmentRemovalVariant::Photon => run(ctx, &self.config, true),
            FragmentRemovalVariant::Neutral => run(ctx, &self.config, false),
        }
    }
}

fn is_photon_like(cluster: &Cluster, ctx: &OperatorContext, config: &FragmentRemovalConfig) -> bool {
    if cluster.is_fixed_photon() {
        return true;
    }
    let Some(inner_hit) = cluster.hits().layer(cluster.inner_pseudo_layer()).first() else {
        return false;
    };
    let granularity = ctx.geometry.granularity(ctx.manager.hits().get(*inner_hit).hit_type);
    let Some(fit) = cluster.cached_fit_all() else { return false };
    granularity.is_fine()
        && cluster.inner_pseudo_layer() < config.photon_like_max_inner_layer
        && fit.radial_direction_cosine > config.photon_like_min_radial_direction_cosine
}

/// One entry of a contact map: a daughter and its contacts against every
/// eligible parent, rebuilt only for daughters marked *affected*.
struct ContactEntry {
    parent: ClusterId,
    contact: ClusterContact,
}

#[allow(clippy::too_many_lines)]
fn run(ctx: &mut OperatorContext, config: &FragmentRemovalConfig, photon_variant: bool) -> Result<()> {
    let mut contact_map: FxHashMap<ClusterId, Vec<ContactEntry>> = FxHashMap::default();
    let mut affected: Option<Vec<ClusterId>> = None;
    let mut n_passes = 0_u32;

    loop {
        if n_passes >= config.n_max_passes {
            break;
        }
        n_passes += 1;

        rebuild_contact_map(ctx, config, photon_variant, affected.as_deref(), &mut contact_map)?;

        let mut best: Option<(ClusterId, ClusterId, f64, f64)> = None;
        for (&daughter_id, entries) in &contact_map {
            let daughter_is_fine = {
                let daughter = ctx.manager.cluster(daughter_id)?;
                daughter
                    .hits()
                    .layer(daughter.inner_pseudo_layer())
                    .first()
                    .is_some_and(|&h| ctx.geometry.granularity(ctx.manager.hits().get(h).hit_type).is_fine())
            };
            for entry in entries {
                let evidence = evidence_for_merge(&entry.contact, config, photon_variant, daughter_is_fine);
                let parent = ctx.manager.cluster(entry.parent)?;
                let parent_energy = parent.energy(ctx.manager.hits().as_slice());
                let better = match best {
                    None => evidence > config.min_evidence,
                    Some((_, _, best_evidence, best_energy)) => {
                        evidence > best_evidence || ((evidence - best_evidence).abs() < f64::EPSILON && parent_energy > best_energy)
                    }
                };
                if better && evidence > config.min_evidence {
                    best = Some((entry.parent, daughter_id, evidence, parent_energy));
                }
            }
        }

        let Some((parent_id, daughter_id, _, _)) = best else { break };

        let mut next_affected = std::collections::HashSet::new();
        if let Some(entries) = contact_map.get(&daughter_id) {
            for entry in entries {
                next_affected.insert(entry.parent);
            }
        }
        for (&other_daughter, entries) in &contact_map {
            if other_daughter == daughter_id {
                continue;
            }
            if entries.iter().any(|e| e.parent == parent_id || e.parent == daughter_id) {
                next_affected.insert(other_daughter);
            }
        }
        contact_map.remove(&daughter_id);
        affected = Some(next_affected.into_iter().collect());

        ctx.manager.merge_and_delete(parent_id, daughter_id)?;
        if photon_variant {
            ctx.manager.set_fixed_photon(parent_id, true)?;
        }
    }
    Ok(())
}

fn rebuild_contact_map(
    ctx: &OperatorContext,
    config: &FragmentRemovalConfig,
    photon_variant: bool,
    affected: Option<&[ClusterId]>,
    contact_map: &mut FxHashMap<ClusterId, Vec<ContactEntry>>,
) -> Result<()> {
    let current = ctx.manager.current_list();
    for &daughter_id in &current {
        if let Some(affected) = affected {
            if !affected.contains(&daughter_id) {
                continue;
            }
            contact_map.remove(&daughter_id);
        }

        let daughter = ctx.manager.cluster(daughter_id)?;
        if !daughter.tracks().is_empty() {
            continue;
        }
        if daughter.all_hit_ids().count() < config.min_daughter_calo_hits
            || daughter.energy(ctx.manager.hits().as_slice()) < config.min_daughter_hadronic_energy
        {
            continue;
        }
        if photon_variant {
            if config.use_only_photon_like_daughters && !is_photon_like(daughter, ctx, config) {
                continue;
            }
        } else if is_photon_like(daughter, ctx, config) {
            continue;
        }

        let daughter_inner = daughter.inner_pseudo_layer();
        let mut entries = Vec::new();
        for &parent_id in &current {
            if parent_id == daughter_id {
                continue;
            }
            let parent = ctx.manager.cluster(parent_id)?;
            if !parent.tracks().is_empty() {
                continue;
            }
            if photon_variant {
                if parent.inner_pseudo_layer() > daughter_inner + config.inner_layer_tolerance {
                    continue;
                }
                if daughter.initial_direction().dot(parent.initial_direction()) < config.contact_parameters.min_cos_opening_angle {
                    continue;
                }
                if !parent.is_fixed_photon() {
                    continue;
                }
            } else if is_photon_like(parent, ctx, config) {
                continue;
            }

            let contact = ClusterContact::new(daughter, parent, ctx.manager.hits(), &config.contact_parameters);
            if passes_contact_cuts(&contact, config, photon_variant) {
                entries.push(ContactEntry { parent: parent_id, contact });
            }
        }
        if !entries.is_empty() {
            contact_map.insert(daughter_id, entries);
        }
    }
    Ok(())
}

fn passes_contact_cuts(contact: &ClusterContact, config: &FragmentRemovalConfig, photon_variant: bool) -> bool {
    if contact.distance_to_closest_hit > config.contact_cut_max_distance {
        return false;
    }
    let cone_1 = contact.cone_fractions.first().copied().unwrap_or(0.0);
    let close_1 = contact.close_hit_fractions.first().copied().unwrap_or(0.0);
    let close_2 = contact.close_hit_fractions.get(1).copied().unwrap_or(0.0);

    if contact.n_contact_layers > config.contact_cut_n_layers
        || cone_1 > config.contact_cut_cone_fraction_1
        || close_1 > config.contact_cut_close_hit_fraction_1
        || close_2 > config.contact_cut_close_hit_fraction_2
    {
        return true;
    }
    if photon_variant {
        return false;
    }
    contact.distance_to_closest_hit < config.contact_cut_nearby_distance && close_2 > config.contact_cut_nearby_close_hit_fraction_2
}

fn evidence_for_merge(
    contact: &ClusterContact,
    config: &FragmentRemovalConfig,
    photon_variant: bool,
    daughter_is_fine: bool,
) -> f64 {
    let cone_1 = contact.cone_fractions.first().copied().unwrap_or(0.0);
    let close_1 = contact.close_hit_fractions.first().copied().unwrap_or(0.0);
    let close_2 = contact.close_hit_fractions.get(1).copied().unwrap_or(0.0);

    let contact_evidence = if photon_variant {
        if contact.n_contact_layers > config.photon_contact_evidence_n_layers
            && contact.contact_fraction > config.photon_contact_evidence_fraction
        {
            contact.contact_fraction
        } else {
            0.0
        }
    } else if contact.n_contact_layers > config.contact_evidence_n_layers_1 {
        config.contact_evidence_1 * (1.0 + contact.contact_fraction)
    } else if contact.n_contact_layers > config.contact_evidence_n_layers_2 {
        config.contact_evidence_2 * (1.0 + contact.contact_fraction)
    } else if contact.n_contact_layers > config.contact_evidence_n_layers_3 {
        config.contact_evidence_3 * (1.0 + contact.contact_fraction)
    } else {
        0.0
    };

    let cone_evidence = if cone_1 > config.cone_evidence_fraction_1 {
        if photon_variant {
            cone_1
        } else {
            let sum: f64 = contact.cone_fractions.iter().sum();
            if daughter_is_fine {
                sum * config.cone_evidence_fine_granularity_multiplier
            } else {
                sum
            }
        }
    } else {
        0.0
    };

    let mut distance_evidence = 0.0;
    if contact.distance_to_closest_hit < config.distance_evidence_1 {
        distance_evidence = (config.distance_evidence_1 - contact.distance_to_closest_hit) / config.distance_evidence_1d;
        distance_evidence += config.distance_evidence_close_fraction_1_multiplier * close_1;
        distance_evidence += config.distance_evidence_close_fraction_2_multiplier * close_2;
    }

    config.contact_weight * contact_evidence + config.cone_weight * cone_evidence + config.distance_weight * distance_evidence
}
