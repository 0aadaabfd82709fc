//! [`CaloHit`]: a single calorimeter energy deposit.

use super::vec3::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Calorimeter region a hit was read out from.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum HitType {
    /// Silicon tracker hit (used only for extrapolation bookkeeping).
    Tracker,
    /// Electromagnetic calorimeter hit.
    Ecal,
    /// Hadronic calorimeter hit.
    Hcal,
    /// Muon-system hit.
    Muon,
    /// Time-projection-chamber view.
    Tpc,
}

/// Barrel/endcap region of a hit.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum Region {
    /// Central barrel.
    Barrel,
    /// Forward/backward endcap.
    Endcap,
}

/// Cell geometry kind, carrying the metadata [`crate::geometry`] and
/// [`crate::hit_properties`] need to scale distances.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub enum CellGeometry {
    /// Rectangular cell, side lengths in mm.
    Rectangular {
        /// Cell width (mm).
        width: f64,
        /// Cell length (mm).
        length: f64,
    },
    /// Pointing (projective) cell, angular size in radians at the given
    /// radial distance.
    Pointing {
        /// Angular size of the cell (radians).
        angular_size: f64,
        /// Radial distance the angular size was evaluated at (mm).
        radius: f64,
    },
}

impl CellGeometry {
    /// A representative linear cell size in mm, used by density-weight
    /// and isolation distance scaling.
    #[must_use]
    pub fn cell_size(&self) -> f64 {
        match *self {
            Self::Rectangular { width, length } => width.hypot(length) / 2.0_f64.sqrt(),
            Self::Pointing { angular_size, radius } => angular_size * radius,
        }
    }
}

/// A single calorimeter energy deposit.
///
/// Created once from external input and never destroyed by the core; the
/// owning [`crate::manager::CaloHitStore`] outlives every operator.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CaloHit {
    /// Position in detector space (mm).
    pub position: Vec3,
    /// Expected direction of the shower at this hit (unit vector).
    pub expected_direction: Vec3,
    /// Hit type / sub-detector.
    pub hit_type: HitType,
    /// Barrel or endcap.
    pub region: Region,
    /// Electromagnetic-scale energy (GeV).
    pub electromagnetic_energy: f64,
    /// Hadronic-scale energy (GeV).
    pub hadronic_energy: f64,
    /// Mip-equivalent energy.
    pub mip_energy: f64,
    /// Pseudo-layer: depth index, 0 = innermost.
    pub pseudo_layer: u32,
    /// Cell geometry and size metadata.
    pub cell_geometry: CellGeometry,
    /// Set by [`crate::hit_properties`]; `None` until computed.
    pub is_isolated: Option<bool>,
    /// Set by [`crate::hit_properties`]; `None` until computed.
    pub is_possible_mip: Option<bool>,
    /// Set by [`crate::hit_properties`]; `None` until computed.
    pub density_weight: Option<f64>,
    /// Set by [`crate::hit_properties`]; `None` until computed.
    pub surrounding_energy: Option<f64>,
    /// Truth-only: fractional energy contribution per Monte-Carlo
    /// particle id. Never read by any operator; present only so truth
    /// studies (including photon-PDF training) can look up the
    /// dominant contributor.
    pub mc_particle_weights: HashMap<u64, f64>,
}

impl CaloHit {
    /// Total calorimetric energy (EM + hadronic scale), the quantity
    /// summed into cluster/track compatibility.
    #[must_use]
    pub fn energy(&self) -> f64 {
        self.electromagnetic_energy + self.hadronic_energy
    }

    /// The dominant Monte-Carlo contributor, if any truth weights were
    /// attached. Used only by photon-PDF training.
    #[must_use]
    pub fn dominant_mc_particle(&self) -> Option<u64> {
        self.mc_particle_weights
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(pid, _)| *pid)
    }
}
