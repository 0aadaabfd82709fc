//! [`GeometryContext`]: sub-detector envelopes, gaps, and the hit-type →
//! granularity mapping.

use crate::model::{DetectorGap, HitType, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Calorimeter readout granularity class.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum Granularity {
    /// Finest available (e.g. silicon-tungsten ECAL).
    VeryFine,
    /// Fine (e.g. scintillator ECAL).
    Fine,
    /// Coarse (e.g. scintillator HCAL).
    Coarse,
    /// Very coarse (e.g. muon chambers).
    VeryCoarse,
}

impl Granularity {
    /// True for [`Self::VeryFine`] or [`Self::Fine`], the split used
    /// throughout the merging operators to pick a fine/coarse constant.
    #[must_use]
    pub const fn is_fine(self) -> bool {
        matches!(self, Self::VeryFine | Self::Fine)
    }
}

/// Sub-detector envelopes, inactive-material gaps, and the mapping from
/// hit type to readout granularity. Answers "is point in gap?" and "what
/// granularity?".
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct GeometryContext {
    granularity_by_hit_type: HashMap<String, Granularity>,
    gaps: Vec<DetectorGap>,
}

fn hit_type_key(hit_type: HitType) -> &'static str {
    match hit_type {
        HitType::Tracker => "tracker",
        HitType::Ecal => "ecal",
        HitType::Hcal => "hcal",
        HitType::Muon => "muon",
        HitType::Tpc => "tpc",
    }
}

impl GeometryContext {
    /// Build an empty context (no gaps, default granularities).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the granularity for a hit type.
    pub fn set_granularity(&mut self, hit_type: HitType, granularity: Granularity) {
        self.granularity_by_hit_type.insert(hit_type_key(hit_type).to_owned(), granularity);
    }

    /// Register a gap.
    pub fn add_gap(&mut self, gap: DetectorGap) {
        self.gaps.push(gap);
    }

    /// Granularity for a hit type; [`Granularity::Fine`] if never
    /// configured (a conservative default: fine-granularity cuts are the
    /// tighter ones).
    #[must_use]
    pub fn granularity(&self, hit_type: HitType) -> Granularity {
        self.granularity_by_hit_type
            .get(hit_type_key(hit_type))
            .copied()
            .unwrap_or(Granularity::Fine)
    }

    /// Whether `position` lies in any registered gap for `hit_type`.
    #[must_use]
    pub fn is_in_gap(&self, position: Vec3, hit_type: HitType, tolerance: f64) -> bool {
        self.gaps.iter().any(|gap| gap.contains(position, hit_type, tolerance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::gap::{ConcentricGap, ConcentricPolygon};

    #[test]
    fn granularity_defaults_and_overrides() {
        let mut ctx = GeometryContext::new();
        assert_eq!(ctx.granularity(HitType::Hcal), Granularity::Fine);
        ctx.set_granularity(HitType::Hcal, Granularity::Coarse);
        assert_eq!(ctx.granularity(HitType::Hcal), Granularity::Coarse);
    }

    #[test]
    fn gap_lookup_matches_model_gap_test() {
        let mut ctx = GeometryContext::new();
        ctx.add_gap(DetectorGap::Concentric(ConcentricGap {
            inner: ConcentricPolygon::regular(1000.0, 0.0, 8),
            outer: ConcentricPolygon::regular(2000.0, 0.0, 8),
            z_min: 0.0,
            z_max: 100.0,
        }));
        assert!(ctx.is_in_gap(Vec3::new(1500.0, 0.0, 50.0), HitType::Ecal, 1.0));
        assert!(!ctx.is_in_gap(Vec3::new(500.0, 0.0, 50.0), HitType::Ecal, 1.0));
    }
}
