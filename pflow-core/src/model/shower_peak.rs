//! [`ShowerPeak`]: one peak of a transverse shower-profile decomposition.

use super::ids::HitId;

/// A cluster of hits extracted from a single peak of a transverse
/// shower-profile. Produced by the `ShowerProfilePlugin`.
#[derive(Clone, Debug)]
pub struct ShowerPeak {
    /// Energy of the peak (GeV).
    pub energy: f64,
    /// Transverse RMS of the peak (mm).
    pub rms: f64,
    /// Hits assigned to this peak.
    pub hits: Vec<HitId>,
}

impl ShowerPeak {
    /// Number of hits in the peak.
    #[must_use]
    pub fn n_hits(&self) -> usize {
        self.hits.len()
    }
}

/// An ordered sequence of shower peaks, largest energy first.
pub type ShowerPeakList = Vec<ShowerPeak>;
