//! [`Helix`]: a parameterised charged-particle trajectory.

use super::vec3::Vec3;
use serde::{Deserialize, Serialize};

/// A helix parameterised by a reference point, momentum at that point,
/// and signed curvature (1/mm, sign = charge × field direction).
///
/// Used to project a track into the calorimeter and to count pseudo-layer
/// crossings (`n_layers_crossed`).
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Helix {
    /// Reference point the momentum is defined at (mm).
    pub reference_point: Vec3,
    /// Momentum vector at the reference point (GeV).
    pub momentum: Vec3,
    /// Signed curvature (1/mm).
    pub curvature: f64,
}

impl Helix {
    /// Position on the helix at longitudinal distance `z` from the
    /// reference point's z coordinate, by uniformly rotating the
    /// transverse momentum direction about the curvature.
    #[must_use]
    pub fn position_at_z(&self, z: f64) -> Vec3 {
        let dz = z - self.reference_point.z;
        let pt = self.momentum.x.hypot(self.momentum.y);
        if pt <= f64::EPSILON || self.momentum.z.abs() <= f64::EPSILON {
            // No transverse momentum or purely transverse: degrade to a
            // straight line along the momentum direction.
            let dir = self.momentum.normalized();
            return self.reference_point + dir * dz;
        }
        let omega = self.curvature * pt / self.momentum.z.abs() * self.momentum.z.signum();
        let phi0 = self.momentum.y.atan2(self.momentum.x);
        let path_xy = dz * pt / self.momentum.z;
        let dphi = omega * path_xy;
        let radius = if omega.abs() > f64::EPSILON { 1.0 / omega } else { f64::INFINITY };
        if !radius.is_finite() {
            let dir = self.momentum.normalized();
            return self.reference_point + dir * dz;
        }
        let cx = self.reference_point.x - radius * phi0.sin();
        let cy = self.reference_point.y + radius * phi0.cos();
        Vec3::new(
            cx + radius * (phi0 + dphi).sin(),
            cy - radius * (phi0 + dphi).cos(),
            z,
        )
    }

    /// The point on the helix closest to `point`, found by a bounded
    /// ternary-search refinement over z (the helix is monotonic in z by
    /// construction, so distance-to-point is unimodal in a reasonably
    /// small bracket around `point.z`).
    #[must_use]
    pub fn closest_point(&self, point: Vec3, z_search_half_width: f64) -> Vec3 {
        let mut lo = point.z - z_search_half_width;
        let mut hi = point.z + z_search_half_width;
        for _ in 0..60 {
            let m1 = lo + (hi - lo) / 3.0;
            let m2 = hi - (hi - lo) / 3.0;
            let d1 = self.position_at_z(m1).distance_squared(point);
            let d2 = self.position_at_z(m2).distance_squared(point);
            if d1 < d2 {
                hi = m2;
            } else {
                lo = m1;
            }
        }
        self.position_at_z((lo + hi) / 2.0)
    }

    /// Closest distance from `point` to the helix.
    #[must_use]
    pub fn distance_to_point(&self, point: Vec3, z_search_half_width: f64) -> f64 {
        self.closest_point(point, z_search_half_width).distance(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_track_position_at_z() {
        let helix = Helix {
            reference_point: Vec3::new(0.0, 0.0, 0.0),
            momentum: Vec3::new(0.0, 0.0, 10.0),
            curvature: 0.0,
        };
        let p = helix.position_at_z(500.0);
        assert_eq!(p, Vec3::new(0.0, 0.0, 500.0));
    }

    #[test]
    fn closest_point_on_straight_line() {
        let helix = Helix {
            reference_point: Vec3::new(0.0, 0.0, 0.0),
            momentum: Vec3::new(0.0, 0.0, 10.0),
            curvature: 0.0,
        };
        let d = helix.distance_to_point(Vec3::new(5.0, 0.0, 300.0), 50.0);
        assert!((d - 5.0).abs() < 1e-6);
    }
}
