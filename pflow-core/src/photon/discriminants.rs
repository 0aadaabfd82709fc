//! The five photon/background discriminants computed per shower peak
//!, looked up against the per-energy-bin PDF pair in
//! [`super::pdf::PdfStore`].

use crate::fitting;
use crate::manager::CaloHitStore;
use crate::model::{Cluster, ShowerPeak, Track};

/// One discriminant axis. `ALL` fixes the order histograms are stored
/// and read back in.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Discriminant {
    /// Transverse RMS of the peak.
    PeakRms,
    /// Depth (pseudo-layer) at which the peak's shower starts.
    LongitudinalProfileStart,
    /// How poorly the peak's hits fit a single shower axis, used as a
    /// proxy for longitudinal-profile discrepancy (see `DESIGN.md`).
    LongitudinalProfileDiscrepancy,
    /// Peak energy as a fraction of the whole (unfragmented) cluster's
    /// energy.
    PeakEnergyFraction,
    /// Minimum distance from any peak hit to any track's helix.
    MinDistanceToTrack,
}

impl Discriminant {
    /// Every discriminant, in persisted-state column order.
    pub const ALL: [Self; 5] = [
        Self::PeakRms,
        Self::LongitudinalProfileStart,
        Self::LongitudinalProfileDiscrepancy,
        Self::PeakEnergyFraction,
        Self::MinDistanceToTrack,
    ];

    /// Stable index into a `[_; 5]`-shaped store.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::PeakRms => 0,
            Self::LongitudinalProfileStart => 1,
            Self::LongitudinalProfileDiscrepancy => 2,
            Self::PeakEnergyFraction => 3,
            Self::MinDistanceToTrack => 4,
        }
    }

    /// The persisted-state key fragment, e.g. `PhotonSigPeakRms_3`.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::PeakRms => "PeakRms",
            Self::LongitudinalProfileStart => "LongitudinalProfileStart",
            Self::LongitudinalProfileDiscrepancy => "LongitudinalProfileDiscrepancy",
            Self::PeakEnergyFraction => "PeakEnergyFraction",
            Self::MinDistanceToTrack => "MinDistanceToTrack",
        }
    }
}

/// The five discriminant values computed for one peak.
#[derive(Clone, Copy, Debug)]
pub struct DiscriminantValues {
    /// See [`Discriminant::PeakRms`].
    pub peak_rms: f64,
    /// See [`Discriminant::LongitudinalProfileStart`].
    pub longitudinal_profile_start: f64,
    /// See [`Discriminant::LongitudinalProfileDiscrepancy`].
    pub longitudinal_profile_discrepancy: f64,
    /// See [`Discriminant::PeakEnergyFraction`].
    pub peak_energy_fraction: f64,
    /// See [`Discriminant::MinDistanceToTrack`].
    pub min_distance_to_track: f64,
}

impl DiscriminantValues {
    /// Read one discriminant's value.
    #[must_use]
    pub const fn get(&self, discriminant: Discriminant) -> f64 {
        match discriminant {
            Discriminant::PeakRms => self.peak_rms,
            Discriminant::LongitudinalProfileStart => self.longitudinal_profile_start,
            Discriminant::LongitudinalProfileDiscrepancy => self.longitudinal_profile_discrepancy,
            Discriminant::PeakEnergyFraction => self.peak_energy_fraction,
            Discriminant::MinDistanceToTrack => self.min_distance_to_track,
        }
    }
}

/// Compute all five discriminants for `peak`/`peak_cluster`. `whole_cluster_energy` is the energy of the unfragmented
/// cluster the peak was extracted from, used for the energy-fraction
/// discriminant.
#[must_use]
pub fn compute(
    peak: &ShowerPeak,
    peak_cluster: &Cluster,
    whole_cluster_energy: f64,
    store: &CaloHitStore,
    tracks: &[Track],
) -> DiscriminantValues {
    let longitudinal_profile_discrepancy =
        fitting::fit_all(peak_cluster, store).map_or(f64::MAX, |fit| fit.chi2_per_dof);

    let peak_energy_fraction =
        if whole_cluster_energy > f64::EPSILON { peak.energy / whole_cluster_energy } else { 0.0 };

    let min_distance_to_track = tracks
        .iter()
        .flat_map(|track| {
            peak_cluster
                .all_hit_ids()
                .map(move |hit| track.helix_at_calorimeter.distance_to_point(store.get(hit).position, 500.0))
        })
        .fold(f64::MAX, f64::min);

    DiscriminantValues {
        peak_rms: peak.rms,
        longitudinal_profile_start: f64::from(peak_cluster.inner_pseudo_layer()),
        longitudinal_profile_discrepancy,
        peak_energy_fraction,
        min_distance_to_track,
    }
}
