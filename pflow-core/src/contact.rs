//! [`ClusterContact`]: pairwise parent/daughter geometric summary, grounded on `ClusterContact` in `FragmentRemovalHelper.h`.

use crate::fragment_geometry;
use crate::manager::CaloHitStore;
use crate::model::Cluster;
use serde::{Deserialize, Serialize};

/// Parameters controlling a [`ClusterContact`] computation.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContactParameters {
    /// Cosine half angle(s) for cone-fraction comparisons, e.g.
    /// `ConeCosineHalfAngle1` in the host framework's configuration.
    pub cone_cosine_half_angles: Vec<f64>,
    /// Distance(s) used to identify close hits, e.g. `CloseHitDistance1`,
    /// `CloseHitDistance2`.
    pub close_hit_distances: Vec<f64>,
    /// Minimum opening angle (cosine) between the daughter and parent
    /// initial directions below which cone fractions are skipped
    /// (reported as 0) rather than computed.
    pub min_cos_opening_angle: f64,
    /// Number of calorimeter cell-widths used to identify contact layers.
    pub distance_threshold: f64,
}

impl Default for ContactParameters {
    fn default() -> Self {
        Self {
            cone_cosine_half_angles: vec![0.9],
            close_hit_distances: vec![50.0, 100.0],
            min_cos_opening_angle: 0.0,
            distance_threshold: 2.0,
        }
    }
}

/// Pairwise geometric summary of a candidate (daughter, parent) merge,
/// computed in one pass over the daughter's hits.
#[derive(Clone, Debug)]
pub struct ClusterContact {
    /// Distance (mm) to the closest parent hit.
    pub distance_to_closest_hit: f64,
    /// Cone fraction(s) of daughter hits along the parent's direction,
    /// one per `cone_cosine_half_angles` entry; all 0 if the opening
    /// angle gate was not passed.
    pub cone_fractions: Vec<f64>,
    /// Close-hit fraction(s) of daughter hits, one per
    /// `close_hit_distances` entry.
    pub close_hit_fractions: Vec<f64>,
    /// Number of pseudo-layers in contact.
    pub n_contact_layers: u32,
    /// Ratio of contact layers to overlap layers.
    pub contact_fraction: f64,
}

impl ClusterContact {
    /// Build a `ClusterContact` from a candidate (daughter, parent) pair.
    #[must_use]
    pub fn new(
        daughter: &Cluster,
        parent: &Cluster,
        store: &CaloHitStore,
        parameters: &ContactParameters,
    ) -> Self {
        let distance_to_closest_hit = daughter
            .all_hit_ids()
            .flat_map(|d| {
                let dp = store.get(d).position;
                parent.all_hit_ids().map(move |p| dp.distance(store.get(p).position))
            })
            .fold(f64::MAX, f64::min);

        let opening_angle_cos = daughter.initial_direction().dot(parent.initial_direction());
        let cone_fractions = if opening_angle_cos < parameters.min_cos_opening_angle {
            vec![0.0; parameters.cone_cosine_half_angles.len()]
        } else {
            parameters
                .cone_cosine_half_angles
                .iter()
                .map(|&cos_half_angle| {
                    let apex = parent
                        .shower_start_layer()
                        .and_then(|l| parent.layer_centroid(l))
                        .unwrap_or_else(|| parent.layer_centroid(parent.inner_pseudo_layer()).unwrap_or_default());
                    fragment_geometry::fraction_of_hits_in_cone(
                        daughter,
                        store,
                        apex,
                        parent.initial_direction(),
                        cos_half_angle,
                    )
                })
                .collect()
        };

        let close_hit_fractions = parameters
            .close_hit_distances
            .iter()
            .map(|&d| fragment_geometry::fraction_of_close_hits(daughter, parent, store, d))
            .collect();

        let (n_contact_layers, contact_fraction) =
            fragment_geometry::cluster_contact_details(parent, daughter, store, parameters.distance_threshold);

        Self {
            distance_to_closest_hit,
            cone_fractions,
            close_hit_fractions,
            n_contact_layers,
            contact_fraction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CaloHit, CellGeometry, HitId, HitType, OrderedCaloHitList, Region, Vec3};
    use std::collections::HashMap;

    fn hit(x: f64, z: f64, layer: u32) -> CaloHit {
        CaloHit {
            position: Vec3::new(x, 0.0, z),
            expected_direction: Vec3::new(0.0, 0.0, 1.0),
            hit_type: HitType::Ecal,
            region: Region::Barrel,
            electromagnetic_energy: 1.0,
            hadronic_energy: 0.0,
            mip_energy: 0.0,
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
    fn opening_angle_gate_zeroes_cone_fractions() {
        let store = CaloHitStore::new(vec![hit(0.0, 10.0, 1), hit(0.0, 20.0, 2)]);
        let mut daughter_hits = OrderedCaloHitList::new();
        daughter_hits.insert(1, HitId::from_index(0));
        let mut parent_hits = OrderedCaloHitList::new();
        parent_hits.insert(2, HitId::from_index(1));
        let mut daughter = Cluster::from_hits(daughter_hits);
        let mut parent = Cluster::from_hits(parent_hits);
        daughter.recompute_derived(store.as_slice(), &crate::model::cluster::ClusterDerivedConfig::default());
        parent.recompute_derived(store.as_slice(), &crate::model::cluster::ClusterDerivedConfig::default());

        let params = ContactParameters { min_cos_opening_angle: 2.0, ..ContactParameters::default() };
        let contact = ClusterContact::new(&daughter, &parent, &store, &params);
        assert!(contact.cone_fractions.iter().all(|&f| f == 0.0));
    }
}
