//! Geometric queries shared by the merging and reclustering operators
//!: cone fractions, close-hit fractions, cluster contact,
//! helix layer-crossings, and cluster-helix distance.

use crate::manager::CaloHitStore;
use crate::model::{Cluster, FitResult, Helix, Track, Vec3};

/// Fraction of `cluster`'s hits whose `(hit - apex) . axis / |hit - apex|`
/// is at least `cos_half_angle`. An empty cluster returns 0.
#[must_use]
pub fn fraction_of_hits_in_cone(
    cluster: &Cluster,
    store: &CaloHitStore,
    cone_apex: Vec3,
    cone_axis: Vec3,
    cos_half_angle: f64,
) -> f64 {
    let hits: Vec<_> = cluster.all_hit_ids().collect();
    if hits.is_empty() {
        return 0.0;
    }
    let axis = cone_axis.normalized();
    let n_in_cone = hits
        .iter()
        .filter(|&&id| {
            let delta = store.get(id).position - cone_apex;
            let norm = delta.norm();
            norm > f64::EPSILON && delta.dot(axis) / norm >= cos_half_angle
        })
        .count();
    n_in_cone as f64 / hits.len() as f64
}

/// Cone derived from `reference`'s shower-start centroid and initial
/// direction, falling back to its associated track's calorimeter
/// projection and direction when it has exactly one associated track.
#[must_use]
pub fn fraction_of_hits_in_cone_from_cluster(
    cluster: &Cluster,
    store: &CaloHitStore,
    reference: &Cluster,
    tracks: &[Track],
    cos_half_angle: f64,
) -> f64 {
    if let Some(&track_id) = reference.tracks().first() {
        if reference.tracks().len() == 1 {
            let track = &tracks[track_id.index()];
            return fraction_of_hits_in_cone(
                cluster,
                store,
                track.state_at_calorimeter.position,
                track.state_at_calorimeter.direction,
                cos_half_angle,
            );
        }
    }
    let apex = reference
        .shower_start_layer()
        .and_then(|layer| reference.layer_centroid(layer))
        .unwrap_or_else(|| reference.layer_centroid(reference.inner_pseudo_layer()).unwrap_or(Vec3::zero()));
    fraction_of_hits_in_cone(cluster, store, apex, reference.initial_direction(), cos_half_angle)
}

/// Cone derived from a track's helix intersection with the calorimeter
/// face and its direction there.
#[must_use]
pub fn fraction_of_hits_in_cone_from_track(
    cluster: &Cluster,
    store: &CaloHitStore,
    track: &Track,
    cos_half_angle: f64,
) -> f64 {
    fraction_of_hits_in_cone(
        cluster,
        store,
        track.state_at_calorimeter.position,
        track.state_at_calorimeter.direction,
        cos_half_angle,
    )
}

/// Fraction of `a`'s hits within `distance_threshold` mm of some hit in
/// `b`. An empty `a` returns 0.
#[must_use]
pub fn fraction_of_close_hits(a: &Cluster, b: &Cluster, store: &CaloHitStore, distance_threshold: f64) -> f64 {
    let a_hits: Vec<_> = a.all_hit_ids().collect();
    if a_hits.is_empty() {
        return 0.0;
    }
    let b_hits: Vec<_> = b.all_hit_ids().collect();
    let n_close = a_hits
        .iter()
        .filter(|&&ha| {
            let pa = store.get(ha).position;
            b_hits.iter().any(|&hb| pa.distance(store.get(hb).position) <= distance_threshold)
        })
        .count();
    n_close as f64 / a_hits.len() as f64
}

/// Average cell size (mm) of a hit's cell geometry, used to scale the
/// contact-layer distance threshold.
fn cell_size_mm(store: &CaloHitStore, hits: &[crate::model::HitId]) -> f64 {
    if hits.is_empty() {
        return 1.0;
    }
    let sum: f64 = hits.iter().map(|&h| store.get(h).cell_geometry.cell_size()).sum();
    (sum / hits.len() as f64).max(f64::EPSILON)
}

/// `(n_contact_layers, contact_fraction)`: for each pseudo-layer present
/// in both clusters, the closest hit-to-hit separation is scaled by the
/// average cell size of the two layers; a layer is "in contact" if the
/// scaled separation is below `distance_threshold`.
#[must_use]
pub fn cluster_contact_details(
    parent: &Cluster,
    daughter: &Cluster,
    store: &CaloHitStore,
    distance_threshold: f64,
) -> (u32, f64) {
    let mut n_overlap = 0_u32;
    let mut n_contact = 0_u32;
    for (layer, parent_hits) in parent.hits().layers() {
        let daughter_hits = daughter.hits().layer(layer);
        if daughter_hits.is_empty() {
            continue;
        }
        n_overlap += 1;
        let mut closest = f64::MAX;
        for &ph in parent_hits {
            let pp = store.get(ph).position;
            for &dh in daughter_hits {
                let d = pp.distance(store.get(dh).position);
                if d < closest {
                    closest = d;
                }
            }
        }
        let scale = (cell_size_mm(store, parent_hits) + cell_size_mm(store, daughter_hits)) / 2.0;
        if closest / scale < distance_threshold {
            n_contact += 1;
        }
    }
    let fraction = if n_overlap > 0 { f64::from(n_contact) / f64::from(n_overlap) } else { 0.0 };
    (n_contact, fraction)
}

/// Number of distinct pseudo-layers the cluster would assign to points
/// sampled along `helix` between `z_start` and `z_end`,
/// approximated from pseudo-layer boundaries implied by `layer_pitch_mm`
/// (the target language does not expose the geometry plugin's pseudo-layer
/// lookup to this free function, so the caller supplies the pitch it was
/// built with).
#[must_use]
pub fn n_layers_crossed(helix: &Helix, z_start: f64, z_end: f64, n_samples: u32, layer_pitch_mm: f64) -> u32 {
    if n_samples == 0 || layer_pitch_mm <= f64::EPSILON {
        return 0;
    }
    let mut seen = std::collections::BTreeSet::new();
    for i in 0..=n_samples {
        let z = z_start + (z_end - z_start) * f64::from(i) / f64::from(n_samples);
        let p = helix.position_at_z(z);
        let radius = p.x.hypot(p.y);
        seen.insert((radius / layer_pitch_mm) as u32);
    }
    seen.len() as u32
}

/// `(closest, mean)` distance from hits in `layer_min..=layer_max` (inclusive of
/// only the first `max_occupied` populated layers examined) to `helix`.
#[must_use]
pub fn cluster_helix_distance(
    cluster: &Cluster,
    store: &CaloHitStore,
    helix: &Helix,
    layer_min: u32,
    layer_max: u32,
    max_occupied: usize,
) -> Option<(f64, f64)> {
    let mut distances = Vec::new();
    let mut n_occupied = 0_usize;
    for (layer, hits) in cluster.hits().layers() {
        if layer < layer_min || layer > layer_max {
            continue;
        }
        if n_occupied >= max_occupied {
            break;
        }
        n_occupied += 1;
        for &h in hits {
            let pos = store.get(h).position;
            distances.push(helix.distance_to_point(pos, 500.0));
        }
    }
    if distances.is_empty() {
        return None;
    }
    let closest = distances.iter().cloned().fold(f64::MAX, f64::min);
    let mean = distances.iter().sum::<f64>() / distances.len() as f64;
    Some((closest, mean))
}

/// Perpendicular distance from `fit`'s line to the nearest hit of
/// `cluster` in `layer_min..=layer_max`, or `None` if no hit falls in
/// that range.
#[must_use]
pub fn distance_to_closest_hit_from_fit(
    fit: &FitResult,
    cluster: &Cluster,
    store: &CaloHitStore,
    layer_min: u32,
    layer_max: u32,
) -> Option<f64> {
    let mut best = f64::MAX;
    let mut found = false;
    for (layer, hits) in cluster.hits().layers() {
        if layer < layer_min || layer > layer_max {
            continue;
        }
        for &h in hits {
            let delta = store.get(h).position - fit.intercept;
            let perpendicular = fit.direction.cross(delta).norm();
            if perpendicular < best {
                best = perpendicular;
                found = true;
            }
        }
    }
    found.then_some(best)
}

/// Perpendicular distance from `fit`'s line to the nearest layer
/// centroid of `cluster` in `layer_min..=layer_max`.
#[must_use]
pub fn distance_to_closest_centroid_from_fit(
    fit: &FitResult,
    cluster: &Cluster,
    layer_min: u32,
    layer_max: u32,
) -> Option<f64> {
    let mut best = f64::MAX;
    let mut found = false;
    for layer in layer_min..=layer_max {
        if let Some(centroid) = cluster.layer_centroid(layer) {
            let perpendicular = fit.direction.cross(centroid - fit.intercept).norm();
            if perpendicular < best {
                best = perpendicular;
                found = true;
            }
        }
    }
    found.then_some(best)
}

/// Smallest hit-to-hit separation between `a` and `b`, or `None` if
/// either is empty.
#[must_use]
pub fn distance_to_closest_hit(a: &Cluster, b: &Cluster, store: &CaloHitStore) -> Option<f64> {
    let a_hits: Vec<_> = a.all_hit_ids().collect();
    let b_hits: Vec<_> = b.all_hit_ids().collect();
    if a_hits.is_empty() || b_hits.is_empty() {
        return None;
    }
    let mut best = f64::MAX;
    for &ha in &a_hits {
        let pa = store.get(ha).position;
        for &hb in &b_hits {
            let d = pa.distance(store.get(hb).position);
            if d < best {
                best = d;
            }
        }
    }
    Some(best)
}

/// Smallest layer-centroid separation between `a` and `b`, or `None` if
/// either has no occupied layers.
#[must_use]
pub fn distance_to_closest_centroid(a: &Cluster, b: &Cluster) -> Option<f64> {
    let mut best = f64::MAX;
    let mut found = false;
    for (layer_a, _) in a.hits().layers() {
        let Some(ca) = a.layer_centroid(layer_a) else { continue };
        for (layer_b, _) in b.hits().layers() {
            let Some(cb) = b.layer_centroid(layer_b) else { continue };
            let d = ca.distance(cb);
            if d < best {
                best = d;
                found = true;
            }
        }
    }
    found.then_some(best)
}

/// Smallest perpendicular distance from a hit of `examined` (within its
/// first `n_examination_layers` occupied layers) to the line through
/// `projecting`'s inner centroid along its initial direction, among hits
/// whose perpendicular/parallel ratio does not exceed
/// `max_projection_distance_ratio`.
#[must_use]
pub fn distance_from_initial_projection(
    projecting: &Cluster,
    examined: &Cluster,
    store: &CaloHitStore,
    n_examination_layers: u32,
    max_projection_distance_ratio: f64,
) -> f64 {
    let Some(origin) = projecting.layer_centroid(projecting.inner_pseudo_layer()) else {
        return f64::MAX;
    };
    let direction = projecting.initial_direction();
    let last_layer = examined.inner_pseudo_layer() + n_examination_layers;
    let mut best = f64::MAX;
    for (layer, hits) in examined.hits().layers() {
        if layer > last_layer {
            break;
        }
        for &h in hits {
            let separation = store.get(h).position - origin;
            let perpendicular = direction.cross(separation).norm();
            let parallel = direction.dot(separation).abs();
            if parallel <= f64::EPSILON || (perpendicular / parallel) > max_projection_distance_ratio {
                continue;
            }
            if perpendicular < best {
                best = perpendicular;
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CaloHit, CellGeometry, HitId, HitType, OrderedCaloHitList, Region};
    use std::collections::HashMap;

    fn hit(x: f64, y: f64, z: f64, layer: u32) -> CaloHit {
        CaloHit {
            position: Vec3::new(x, y, z),
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
    fn empty_cluster_cone_fraction_is_zero() {
        let store = CaloHitStore::new(vec![]);
        let cluster = Cluster::from_hits(OrderedCaloHitList::new());
        assert_eq!(
            fraction_of_hits_in_cone(&cluster, &store, Vec3::zero(), Vec3::new(0.0, 0.0, 1.0), 0.9),
            0.0
        );
    }

    #[test]
    fn all_hits_on_axis_are_in_cone() {
        let store = CaloHitStore::new(vec![hit(0.0, 0.0, 10.0, 1), hit(0.0, 0.0, 20.0, 2)]);
        let mut ordered = OrderedCaloHitList::new();
        ordered.insert(1, HitId::from_index(0));
        ordered.insert(2, HitId::from_index(1));
        let cluster = Cluster::from_hits(ordered);
        let fraction =
            fraction_of_hits_in_cone(&cluster, &store, Vec3::zero(), Vec3::new(0.0, 0.0, 1.0), 0.99);
        assert!((fraction - 1.0).abs() < 1e-9);
    }

    #[test]
    fn contact_details_counts_overlap_layers_only() {
        let store = CaloHitStore::new(vec![hit(0.0, 0.0, 10.0, 1), hit(1.0, 0.0, 10.0, 1), hit(0.0, 0.0, 20.0, 2)]);
        let mut parent_hits = OrderedCaloHitList::new();
        parent_hits.insert(1, HitId::from_index(0));
        parent_hits.insert(2, HitId::from_index(2));
        let mut daughter_hits = OrderedCaloHitList::new();
        daughter_hits.insert(1, HitId::from_index(1));
        let parent = Cluster::from_hits(parent_hits);
        let daughter = Cluster::from_hits(daughter_hits);
        let (n_contact, fraction) = cluster_contact_details(&parent, &daughter, &store, 5.0);
        assert_eq!(n_contact, 1);
        assert!((fraction - 1.0).abs() < 1e-9);
    }
}
