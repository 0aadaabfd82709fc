//! Per-hit property calculators: density weight, isolation, surrounding
//! energy, possible-mip flag.

use crate::geometry::GeometryContext;
use crate::manager::CaloHitStore;
use crate::model::{HitId, HitType};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for [`compute_all`].
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HitPropertiesConfig {
    /// Maximum separation (mm) considered when searching for neighbours
    /// at all, a coarse pre-filter before the per-measure cuts below.
    pub calo_hit_max_separation: f64,
    /// Number of adjacent pseudo-layers searched for density-weight
    /// neighbours.
    pub density_weight_n_layers: u32,
    /// Numerator of the density-weight contribution.
    pub density_weight_contribution: f64,
    /// Power of `(distance / cell_size)` in the density-weight
    /// denominator.
    pub density_weight_power: f64,
    /// Isolation search distance for fine-granularity hits (mm).
    pub isolation_cut_distance_fine: f64,
    /// Isolation search distance for coarse-granularity hits (mm).
    pub isolation_cut_distance_coarse: f64,
    /// Number of adjacent layers searched for isolation neighbours.
    pub isolation_n_layers: u32,
    /// A hit is isolated when its nearby-hit count is at most this.
    pub isolation_max_nearby_hits: u32,
    /// Cell-width multiple used for the mip-like nearby-hit search.
    pub mip_n_cells_for_nearby_hit: f64,
    /// A hit is possible-mip when its nearby-hit count is at most this.
    pub mip_max_nearby_hits: u32,
    /// Minimum mip-equivalent energy for the possible-mip flag to apply.
    pub mip_energy_cut: f64,
}

impl Default for HitPropertiesConfig {
    fn default() -> Self {
        Self {
            calo_hit_max_separation: 100.0,
            density_weight_n_layers: 2,
            density_weight_contribution: 1.0,
            density_weight_power: 2.0,
            isolation_cut_distance_fine: 50.0,
            isolation_cut_distance_coarse: 200.0,
            isolation_n_layers: 2,
            isolation_max_nearby_hits: 1,
            mip_n_cells_for_nearby_hit: 2.5,
            mip_max_nearby_hits: 1,
            mip_energy_cut: 0.0,
        }
    }
}

fn neighbours_within<'a>(
    store: &'a CaloHitStore,
    hit: HitId,
    n_layers: u32,
) -> impl Iterator<Item = HitId> + 'a {
    let this = store.get(hit);
    let layer = this.pseudo_layer;
    let hit_type = this.hit_type;
    store.ids().filter(move |&other| {
        other != hit
            && store.get(other).hit_type == hit_type
            && store.get(other).pseudo_layer.abs_diff(layer) <= n_layers
    })
}

/// Sum of `contribution / (distance/cell_size)^power` over same-hit-type
/// neighbours within `density_weight_n_layers`.
#[must_use]
pub fn density_weight(store: &CaloHitStore, hit: HitId, config: &HitPropertiesConfig) -> f64 {
    let this = store.get(hit);
    let cell_size = this.cell_geometry.cell_size().max(f64::EPSILON);
    neighbours_within(store, hit, config.density_weight_n_layers)
        .map(|other| {
            let d = this.position.distance(store.get(other).position);
            if d > config.calo_hit_max_separation || d <= f64::EPSILON {
                return 0.0;
            }
            config.density_weight_contribution / (d / cell_size).powf(config.density_weight_power)
        })
        .sum()
}

/// Sum of energies of hits in the same layer and immediate neighbouring
/// layers within one cell-size radius.
#[must_use]
pub fn surrounding_energy(store: &CaloHitStore, hit: HitId, _config: &HitPropertiesConfig) -> f64 {
    let this = store.get(hit);
    let cell_size = this.cell_geometry.cell_size();
    neighbours_within(store, hit, 1)
        .filter(|&other| this.position.distance(store.get(other).position) <= cell_size)
        .map(|other| store.get(other).energy())
        .sum()
}

/// Number of hits within the granularity-appropriate isolation distance
/// across `isolation_n_layers` adjacent layers.
#[must_use]
pub fn isolation_count(
    store: &CaloHitStore,
    hit: HitId,
    geometry: &GeometryContext,
    config: &HitPropertiesConfig,
) -> u32 {
    let this = store.get(hit);
    let distance = if geometry.granularity(this.hit_type).is_fine() {
        config.isolation_cut_distance_fine
    } else {
        config.isolation_cut_distance_coarse
    };
    neighbours_within(store, hit, config.isolation_n_layers)
        .filter(|&other| this.position.distance(store.get(other).position) <= distance)
        .count() as u32
}

/// Number of hits within `mip_n_cells_for_nearby_hit` cell-widths in
/// immediately adjacent layers.
#[must_use]
pub fn mip_nearby_count(store: &CaloHitStore, hit: HitId, config: &HitPropertiesConfig) -> u32 {
    let this = store.get(hit);
    let cell_size = this.cell_geometry.cell_size();
    let distance = config.mip_n_cells_for_nearby_hit * cell_size;
    neighbours_within(store, hit, 1)
        .filter(|&other| this.position.distance(store.get(other).position) <= distance)
        .count() as u32
}

/// Compute and fill every derived per-hit property for all hits in
/// `store`. Order-independent per hit: the read pass runs across
/// `rayon`'s global pool, and results are written back sequentially
/// since every write lands on a distinct hit.
pub fn compute_all(store: &mut CaloHitStore, geometry: &GeometryContext, config: &HitPropertiesConfig) {
    let ids: Vec<HitId> = store.ids().collect();
    let results: Vec<(HitId, f64, f64, bool, bool)> = ids
        .par_iter()
        .map(|&id| {
            let dw = density_weight(store, id, config);
            let se = surrounding_energy(store, id, config);
            let isolated = isolation_count(store, id, geometry, config) <= config.isolation_max_nearby_hits;
            let mip_energy = store.get(id).mip_energy;
            let possible_mip = mip_nearby_count(store, id, config) <= config.mip_max_nearby_hits
                && mip_energy > config.mip_energy_cut;
            (id, dw, se, isolated, possible_mip)
        })
        .collect();
    for (id, dw, se, isolated, possible_mip) in results {
        let h = store.get_mut(id);
        h.density_weight = Some(dw);
        h.surrounding_energy = Some(se);
        h.is_isolated = Some(isolated);
        h.is_possible_mip = Some(possible_mip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CaloHit, CellGeometry, Region, Vec3};
    use std::collections::HashMap;

    fn hit(x: f64, layer: u32, mip: f64) -> CaloHit {
        CaloHit {
            position: Vec3::new(x, 0.0, f64::from(layer) * 10.0),
            expected_direction: Vec3::new(0.0, 0.0, 1.0),
            hit_type: HitType::Ecal,
            region: crate::model::Region::Barrel,
            electromagnetic_energy: 1.0,
            hadronic_energy: 0.0,
            mip_energy: mip,
            pseudo_layer: layer,
            cell_geometry: CellGeometry::Rectangular { width: 10.0, length: 10.0 },
            is_isolated: None,
            is_possible_mip: None,
            density_weight: None,
            surrounding_energy: None,
            mc_particle_weights: HashMap::new(),
        }
    }

    #[test]
    fn isolated_hit_has_no_close_neighbours() {
        let store = CaloHitStore::new(vec![hit(0.0, 1, 0.0)]);
        let geometry = GeometryContext::new();
        let config = HitPropertiesConfig::default();
        assert_eq!(isolation_count(&store, HitId::from_index(0), &geometry, &config), 0);
    }

    #[test]
    fn dense_hits_are_not_isolated() {
        let store = CaloHitStore::new(vec![hit(0.0, 1, 0.0), hit(5.0, 1, 0.0), hit(10.0, 1, 0.0)]);
        let geometry = GeometryContext::new();
        let mut config = HitPropertiesConfig::default();
        config.isolation_max_nearby_hits = 0;
        assert!(isolation_count(&store, HitId::from_index(0), &geometry, &config) > 0);
    }
}
