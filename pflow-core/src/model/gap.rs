//! [`DetectorGap`]: inactive-material regions.

use super::hit::HitType;
use super::vec3::Vec3;
use serde::{Deserialize, Serialize};

/// A polygon built from (radius, phi0, symmetry_order), used as the inner
/// or outer boundary of a concentric gap.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ConcentricPolygon {
    /// Polygon vertices in the transverse (x, y) plane, in order.
    pub vertices: Vec<(f64, f64)>,
}

impl ConcentricPolygon {
    /// Build a regular polygon of `symmetry_order` sides circumscribing a
    /// circle of `radius`, with the first vertex at angle `phi0`.
    #[must_use]
    pub fn regular(radius: f64, phi0: f64, symmetry_order: u32) -> Self {
        let n = symmetry_order.max(3);
        let vertices = (0..n)
            .map(|i| {
                let phi = phi0 + 2.0 * std::f64::consts::PI * f64::from(i) / f64::from(n);
                (radius * phi.cos(), radius * phi.sin())
            })
            .collect();
        Self { vertices }
    }

    /// Winding-number point-in-polygon test. A point exactly on an edge
    /// is treated as inside (lower-edge-inclusive convention).
    #[must_use]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let n = self.vertices.len();
        if n < 3 {
            return false;
        }
        let mut winding = 0_i32;
        for i in 0..n {
            let (x1, y1) = self.vertices[i];
            let (x2, y2) = self.vertices[(i + 1) % n];
            if y1 <= y {
                if y2 > y && is_left(x1, y1, x2, y2, x, y) > 0.0 {
                    winding += 1;
                }
            } else if y2 <= y && is_left(x1, y1, x2, y2, x, y) < 0.0 {
                winding -= 1;
            }
        }
        winding != 0 || self.on_boundary(x, y)
    }

    fn on_boundary(&self, x: f64, y: f64) -> bool {
        let n = self.vertices.len();
        (0..n).any(|i| {
            let (x1, y1) = self.vertices[i];
            let (x2, y2) = self.vertices[(i + 1) % n];
            is_left(x1, y1, x2, y2, x, y).abs() < 1e-9
                && (x - x1) * (x2 - x1) + (y - y1) * (y2 - y1) >= 0.0
                && (x - x2) * (x1 - x2) + (y - y2) * (y1 - y2) >= 0.0
        })
    }
}

fn is_left(x1: f64, y1: f64, x2: f64, y2: f64, px: f64, py: f64) -> f64 {
    (x2 - x1) * (py - y1) - (px - x1) * (y2 - y1)
}

/// A gap bounded by two concentric polygons and a z range.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ConcentricGap {
    /// Inner boundary polygon.
    pub inner: ConcentricPolygon,
    /// Outer boundary polygon.
    pub outer: ConcentricPolygon,
    /// Minimum z of the gap (mm).
    pub z_min: f64,
    /// Maximum z of the gap (mm).
    pub z_max: f64,
}

/// A gap defined by a box: a vertex plus three orthogonal side vectors.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct BoxGap {
    /// One corner of the box.
    pub vertex: Vec3,
    /// Three side vectors from `vertex`.
    pub sides: [Vec3; 3],
}

impl BoxGap {
    fn contains(&self, point: Vec3, tolerance: f64) -> bool {
        let rel = point - self.vertex;
        self.sides.iter().all(|side| {
            let len = side.norm();
            if len <= f64::EPSILON {
                return true;
            }
            let projection = rel.dot(*side) / len;
            projection >= -tolerance && projection <= len + tolerance
        })
    }
}

/// A gap defined by a single coordinate interval, applicable only to a
/// specific hit type (e.g. a stave gap visible only to ECAL hits).
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct LineGap {
    /// The hit type this line gap applies to.
    pub hit_type: HitType,
    /// Lower bound of the affected coordinate (mm).
    pub min: f64,
    /// Upper bound of the affected coordinate (mm).
    pub max: f64,
    /// Which coordinate of the point is checked.
    pub axis: Axis,
}

/// A coordinate axis.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub enum Axis {
    /// x coordinate.
    X,
    /// y coordinate.
    Y,
    /// z coordinate.
    Z,
}

impl Axis {
    const fn value(self, point: Vec3) -> f64 {
        match self {
            Self::X => point.x,
            Self::Y => point.y,
            Self::Z => point.z,
        }
    }
}

/// A region of inactive detector material.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum DetectorGap {
    /// Concentric-polygon gap (e.g. a stave boundary), winding-number
    /// tested.
    Concentric(ConcentricGap),
    /// Axis-aligned box gap.
    Box(BoxGap),
    /// Single-coordinate line gap, restricted to one hit type.
    Line(LineGap),
}

impl DetectorGap {
    /// Whether `position` lies within this gap (with `tolerance` mm of
    /// slack), for a hit of the given type.
    #[must_use]
    pub fn contains(&self, position: Vec3, hit_type: HitType, tolerance: f64) -> bool {
        match self {
            Self::Concentric(gap) => {
                position.z >= gap.z_min - tolerance
                    && position.z <= gap.z_max + tolerance
                    && gap.outer.contains(position.x, position.y)
                    && !gap.inner.contains(position.x, position.y)
            }
            Self::Box(gap) => gap.contains(position, tolerance),
            Self::Line(gap) => {
                gap.hit_type == hit_type
                    && gap.axis.value(position) >= gap.min - tolerance
                    && gap.axis.value(position) <= gap.max + tolerance
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn octagon_gap_boundary_cases() {
        let gap = ConcentricGap {
            inner: ConcentricPolygon::regular(1000.0, 0.0, 8),
            outer: ConcentricPolygon::regular(2000.0, 0.0, 8),
            z_min: 0.0,
            z_max: 100.0,
        };
        let tol = 1.0;
        assert!(DetectorGap::Concentric(gap.clone()).contains(
            Vec3::new(1500.0, 0.0, 50.0),
            HitType::Ecal,
            tol
        ));
        assert!(!DetectorGap::Concentric(gap.clone()).contains(
            Vec3::new(500.0, 0.0, 50.0),
            HitType::Ecal,
            tol
        ));
        assert!(DetectorGap::Concentric(gap.clone()).contains(
            Vec3::new(1500.0, 0.0, 101.5),
            HitType::Ecal,
            tol
        ));
        assert!(!DetectorGap::Concentric(gap).contains(
            Vec3::new(1500.0, 0.0, 102.0),
            HitType::Ecal,
            tol
        ));
    }
}
