//! Linear fits over cluster hit positions.

use crate::manager::CaloHitStore;
use crate::model::{Cluster, FitFailure, FitResult, Vec3};

fn positions_in_layers(cluster: &Cluster, store: &CaloHitStore, layer_min: u32, layer_max: u32) -> Vec<Vec3> {
    cluster
        .hits()
        .layers()
        .filter(|(layer, _)| *layer >= layer_min && *layer <= layer_max)
        .flat_map(|(_, hits)| hits.iter().map(|&h| store.get(h).position))
        .collect()
}

/// Fit a straight line through `points` by principal-axis regression
/// (the direction is the eigenvector of the covariance matrix with the
/// largest eigenvalue, found via a power iteration since only 3x3
/// symmetric matrices are involved here).
fn fit_points(points: &[Vec3]) -> Result<FitResult, FitFailure> {
    if points.len() < 2 {
        return Err(FitFailure::TooFewPoints);
    }
    let n = points.len() as f64;
    let mean = points.iter().fold(Vec3::zero(), |acc, &p| acc + p) * (1.0 / n);

    // Covariance matrix (symmetric 3x3), flattened row-major.
    let mut cov = [0.0_f64; 9];
    for &p in points {
        let d = p - mean;
        let terms = [d.x * d.x, d.x * d.y, d.x * d.z, d.y * d.x, d.y * d.y, d.y * d.z, d.z * d.x, d.z * d.y, d.z * d.z];
        for (c, t) in cov.iter_mut().zip(terms.iter()) {
            *c += t / n;
        }
    }

    let mut v = Vec3::new(1.0, 1.0, 1.0);
    for _ in 0..50 {
        let nv = Vec3::new(
            cov[0] * v.x + cov[1] * v.y + cov[2] * v.z,
            cov[3] * v.x + cov[4] * v.y + cov[5] * v.z,
            cov[6] * v.x + cov[7] * v.y + cov[8] * v.z,
        );
        if nv.norm() <= f64::EPSILON {
            return Err(FitFailure::Degenerate);
        }
        v = nv.normalized();
    }

    let direction = v;
    let mut sum_perp2 = 0.0;
    for &p in points {
        let d = p - mean;
        let along = d.dot(direction);
        let perp2 = d.dot(d) - along * along;
        sum_perp2 += perp2.max(0.0);
    }
    let rms = (sum_perp2 / n).sqrt();
    let dof = (points.len() as f64 - 2.0).max(1.0);
    let chi2_per_dof = sum_perp2 / dof;

    FitResult::success(direction, mean, rms, chi2_per_dof)
}

/// Fit over every hit in the cluster.
///
/// # Errors
/// [`FitFailure::TooFewPoints`] if fewer than two layers are occupied;
/// [`FitFailure::Degenerate`] if the hit positions carry no stable axis.
pub fn fit_all(cluster: &Cluster, store: &CaloHitStore) -> Result<FitResult, FitFailure> {
    let points: Vec<Vec3> = cluster.all_hit_ids().map(|h| store.get(h).position).collect();
    fit_points(&points)
}

/// Fit over the first `n_layers` occupied layers.
///
/// # Errors
/// See [`fit_all`].
pub fn fit_start(cluster: &Cluster, store: &CaloHitStore, n_layers: usize) -> Result<FitResult, FitFailure> {
    let layers: Vec<u32> = cluster.hits().layers().map(|(l, _)| l).take(n_layers).collect();
    let (Some(&min), Some(&max)) = (layers.first(), layers.last()) else {
        return Err(FitFailure::TooFewPoints);
    };
    fit_points(&positions_in_layers(cluster, store, min, max))
}

/// Fit over the last `n_layers` occupied layers.
///
/// # Errors
/// See [`fit_all`].
pub fn fit_end(cluster: &Cluster, store: &CaloHitStore, n_layers: usize) -> Result<FitResult, FitFailure> {
    let layers: Vec<u32> = cluster.hits().layers().map(|(l, _)| l).collect();
    let tail: Vec<u32> = layers.iter().rev().take(n_layers).copied().collect();
    let (Some(&min), Some(&max)) = (tail.last(), tail.first()) else {
        return Err(FitFailure::TooFewPoints);
    };
    fit_points(&positions_in_layers(cluster, store, min, max))
}

/// Fit over an explicit pseudo-layer range (inclusive).
///
/// # Errors
/// See [`fit_all`].
pub fn fit_layers(
    cluster: &Cluster,
    store: &CaloHitStore,
    layer_min: u32,
    layer_max: u32,
) -> Result<FitResult, FitFailure> {
    fit_points(&positions_in_layers(cluster, store, layer_min, layer_max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CaloHit, CellGeometry, HitId, HitType, OrderedCaloHitList, Region};
    use float_cmp::assert_approx_eq;
    use std::collections::HashMap;

    fn straight_line_store() -> CaloHitStore {
        let mut hits = vec![];
        for layer in 0..5 {
            hits.push(CaloHit {
                position: Vec3::new(0.0, 0.0, f64::from(layer) * 10.0),
                expected_direction: Vec3::new(0.0, 0.0, 1.0),
                hit_type: HitType::Ecal,
                region: Region::Barrel,
                electromagnetic_energy: 1.0,
                hadronic_energy: 0.0,
                mip_energy: 1.0,
                pseudo_layer: layer,
                cell_geometry: CellGeometry::Rectangular { width: 10.0, length: 10.0 },
                is_isolated: None,
                is_possible_mip: None,
                density_weight: None,
                surrounding_energy: None,
                mc_particle_weights: HashMap::new(),
            });
        }
        CaloHitStore::new(hits)
    }

    #[test]
    fn fit_all_recovers_straight_line_direction() {
        let store = straight_line_store();
        let mut ordered = OrderedCaloHitList::new();
        for i in 0..5 {
            ordered.insert(i, HitId::from_index(i));
        }
        let cluster = Cluster::from_hits(ordered);
        let fit = fit_all(&cluster, &store).unwrap();
        assert_approx_eq!(f64, fit.direction.z.abs(), 1.0, epsilon = 1e-6);
        assert_approx_eq!(f64, fit.rms, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn fit_fails_with_one_point() {
        let store = straight_line_store();
        let mut ordered = OrderedCaloHitList::new();
        ordered.insert(0, HitId::from_index(0));
        let cluster = Cluster::from_hits(ordered);
        assert!(matches!(fit_all(&cluster, &store), Err(FitFailure::TooFewPoints)));
    }
}
