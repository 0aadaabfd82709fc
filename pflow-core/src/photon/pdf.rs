//! Persisted photon/background discriminant PDFs: one
//! histogram pair per (discriminant, energy bin), normalised to unit
//! integral before inference and filled from truth labels during
//! training.

use super::discriminants::{Discriminant, DiscriminantValues};
use crate::error::{Error, Result};
use std::io::{self, BufRead, Write};

/// A fixed-range, fixed-width histogram over one discriminant in one
/// energy bin.
#[derive(Clone, Debug)]
pub struct Histogram {
    low: f64,
    high: f64,
    counts: Vec<f64>,
}

impl Histogram {
    /// An empty histogram over `[low, high)` with `n_bins` equal-width
    /// bins.
    #[must_use]
    pub fn new(low: f64, high: f64, n_bins: usize) -> Self {
        Self { low, high, counts: vec![0.0; n_bins.max(1)] }
    }

    fn bin_index(&self, value: f64) -> usize {
        let n = self.counts.len();
        if n == 0 {
            return 0;
        }
        let width = (self.high - self.low) / n as f64;
        if width <= 0.0 {
            return 0;
        }
        let idx = (value - self.low) / width;
        if idx < 0.0 {
            0
        } else {
            (idx as usize).min(n - 1)
        }
    }

    /// Add one entry at `value`, clamped into range.
    pub fn fill(&mut self, value: f64) {
        let idx = self.bin_index(value);
        self.counts[idx] += 1.0;
    }

    /// Bin content at `value` (the discrete "density" used by the
    /// likelihood-ratio product).
    #[must_use]
    pub fn density_at(&self, value: f64) -> f64 {
        self.counts[self.bin_index(value)]
    }

    /// Rescale so the bin contents sum to one.
    pub fn normalize(&mut self) {
        let total: f64 = self.counts.iter().sum();
        if total > f64::EPSILON {
            for c in &mut self.counts {
                *c /= total;
            }
        }
    }

    fn write(&self, key: &str, w: &mut impl Write) -> io::Result<()> {
        write!(w, "{key} {} {} {}", self.counts.len(), self.low, self.high)?;
        for c in &self.counts {
            write!(w, " {c}")?;
        }
        writeln!(w)
    }

    fn parse(fields: &[&str]) -> io::Result<Self> {
        let bad = || io::Error::new(io::ErrorKind::InvalidData, "malformed histogram line");
        let n_bins: usize = fields.first().ok_or_else(bad)?.parse().map_err(|_| bad())?;
        let low: f64 = fields.get(1).ok_or_else(bad)?.parse().map_err(|_| bad())?;
        let high: f64 = fields.get(2).ok_or_else(bad)?.parse().map_err(|_| bad())?;
        let counts: Vec<f64> =
            fields[3..].iter().map(|s| s.parse().map_err(|_| bad())).collect::<io::Result<_>>()?;
        if counts.len() != n_bins {
            return Err(bad());
        }
        Ok(Self { low, high, counts })
    }
}

/// Per-discriminant, per-energy-bin low/high range and bin count used to
/// build a fresh (untrained) store.
#[derive(Clone, Copy, Debug)]
pub struct HistogramRange {
    /// Lower edge of the histogram's domain.
    pub low: f64,
    /// Upper edge of the histogram's domain.
    pub high: f64,
    /// Number of equal-width bins.
    pub n_bins: usize,
}

/// The persisted signal/background PDF pair for every (discriminant,
/// energy-bin) cell.
#[derive(Clone, Debug)]
pub struct PdfStore {
    energy_bin_edges: Vec<f64>,
    signal: [Vec<Histogram>; 5],
    background: [Vec<Histogram>; 5],
}

impl PdfStore {
    /// Build a fresh, all-zero store with `energy_bin_edges.len()` bins
    /// per discriminant, each ranged by `ranges[discriminant.index()]`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameter`] if `energy_bin_edges` is
    /// empty or not strictly increasing.
    pub fn new(energy_bin_edges: Vec<f64>, ranges: [HistogramRange; 5]) -> Result<Self> {
        if energy_bin_edges.is_empty() || energy_bin_edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::InvalidParameter("energy bin edges must be non-empty and strictly increasing".into()));
        }
        let n_bins = energy_bin_edges.len();
        let signal = ranges.map(|r| vec![Histogram::new(r.low, r.high, r.n_bins); n_bins]);
        let background = ranges.map(|r| vec![Histogram::new(r.low, r.high, r.n_bins); n_bins]);
        Ok(Self { energy_bin_edges, signal, background })
    }

    /// A reasonable default store, covering the typical photon-energy
    /// range with a default bin shape per discriminant.
    #[must_use]
    pub fn default_untrained() -> Self {
        let ranges = [
            HistogramRange { low: 0.0, high: 50.0, n_bins: 50 },   // PeakRms
            HistogramRange { low: 0.0, high: 40.0, n_bins: 40 },   // LongitudinalProfileStart
            HistogramRange { low: 0.0, high: 20.0, n_bins: 40 },   // LongitudinalProfileDiscrepancy
            HistogramRange { low: 0.0, high: 1.0, n_bins: 50 },    // PeakEnergyFraction
            HistogramRange { low: 0.0, high: 2000.0, n_bins: 50 }, // MinDistanceToTrack
        ];
        Self::new(vec![0.1, 1.0, 2.0, 5.0, 10.0, 50.0], ranges).expect("fixed edges are valid")
    }

    /// Locate the energy bin an energy value falls in. Exactly on an
    /// edge belongs to the higher bin; below the first edge is an error.
    ///
    /// # Errors
    /// Returns [`Error::InvalidParameter`] if `energy` is below the
    /// first bin edge.
    pub fn energy_bin(&self, energy: f64) -> Result<usize> {
        if energy < self.energy_bin_edges[0] {
            return Err(Error::InvalidParameter(format!("energy {energy} below first PDF bin edge")));
        }
        let mut bin = 0;
        for (i, &edge) in self.energy_bin_edges.iter().enumerate() {
            if edge <= energy {
                bin = i;
            } else {
                break;
            }
        }
        Ok(bin)
    }

    /// Fill every discriminant's histogram at `bin` from one peak's
    /// computed values, into the signal or background side.
    pub fn fill_all(&mut self, bin: usize, values: &DiscriminantValues, is_signal: bool) {
        let side = if is_signal { &mut self.signal } else { &mut self.background };
        for discriminant in Discriminant::ALL {
            side[discriminant.index()][bin].fill(values.get(discriminant));
        }
    }

    /// Normalise every histogram to unit integral.
    pub fn normalize(&mut self) {
        for side in [&mut self.signal, &mut self.background] {
            for per_bin in side.iter_mut() {
                for hist in per_bin {
                    hist.normalize();
                }
            }
        }
    }

    /// Product-of-histograms likelihood ratio `signal / (signal +
    /// background)` for one peak's discriminant values at `bin`.
    #[must_use]
    pub fn likelihood_ratio(&self, bin: usize, values: &DiscriminantValues) -> f64 {
        let mut signal_product = 1.0;
        let mut background_product = 1.0;
        for discriminant in Discriminant::ALL {
            let v = values.get(discriminant);
            let idx = discriminant.index();
            signal_product *= self.signal[idx][bin].density_at(v).max(1e-6);
            background_product *= self.background[idx][bin].density_at(v).max(1e-6);
        }
        signal_product / (signal_product + background_product)
    }

    /// Serialise the full store as a small fixed-width text table.
    ///
    /// # Errors
    /// Propagates any underlying I/O error.
    pub fn write(&self, w: &mut impl Write) -> io::Result<()> {
        write!(w, "EnergyBinLowerEdges")?;
        for e in &self.energy_bin_edges {
            write!(w, " {e}")?;
        }
        writeln!(w)?;
        for discriminant in Discriminant::ALL {
            let idx = discriminant.index();
            for bin in 0..self.energy_bin_edges.len() {
                self.signal[idx][bin].write(&format!("PhotonSig{}_{bin}", discriminant.key()), w)?;
                self.background[idx][bin].write(&format!("PhotonBkg{}_{bin}", discriminant.key()), w)?;
            }
        }
        Ok(())
    }

    /// Parse a store previously written by [`Self::write`].
    ///
    /// # Errors
    /// Returns an [`io::Error`] of kind [`io::ErrorKind::InvalidData`] if
    /// the header or any histogram line is malformed, or a propagated
    /// read error.
    pub fn read(r: &mut impl BufRead) -> io::Result<Self> {
        let bad = || io::Error::new(io::ErrorKind::InvalidData, "malformed PDF store");
        let mut lines = r.lines();
        let header = lines.next().ok_or_else(bad)??;
        let mut header_fields = header.split_whitespace();
        if header_fields.next() != Some("EnergyBinLowerEdges") {
            return Err(bad());
        }
        let energy_bin_edges: Vec<f64> =
            header_fields.map(|s| s.parse().map_err(|_| bad())).collect::<io::Result<_>>()?;
        if energy_bin_edges.is_empty() {
            return Err(bad());
        }
        let n_bins = energy_bin_edges.len();

        let mut signal: [Vec<Histogram>; 5] = Default::default();
        let mut background: [Vec<Histogram>; 5] = Default::default();
        for discriminant in Discriminant::ALL {
            let idx = discriminant.index();
            signal[idx] = Vec::with_capacity(n_bins);
            background[idx] = Vec::with_capacity(n_bins);
            for _ in 0..n_bins {
                let sig_line = lines.next().ok_or_else(bad)??;
                let sig_fields: Vec<&str> = sig_line.split_whitespace().collect();
                signal[idx].push(Histogram::parse(&sig_fields[1..]).map_err(|_| bad())?);
                let bkg_line = lines.next().ok_or_else(bad)??;
                let bkg_fields: Vec<&str> = bkg_line.split_whitespace().collect();
                background[idx].push(Histogram::parse(&bkg_fields[1..]).map_err(|_| bad())?);
            }
        }
        Ok(Self { energy_bin_edges, signal, background })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(x: f64) -> DiscriminantValues {
        DiscriminantValues {
            peak_rms: x,
            longitudinal_profile_start: x,
            longitudinal_profile_discrepancy: x,
            peak_energy_fraction: x,
            min_distance_to_track: x,
        }
    }

    #[test]
    fn energy_bin_boundary_belongs_to_higher_bin() {
        let store = PdfStore::default_untrained();
        assert!(store.energy_bin(0.05).is_err());
        assert_eq!(store.energy_bin(1.0).unwrap(), 1);
        assert_eq!(store.energy_bin(0.5).unwrap(), 0);
        assert_eq!(store.energy_bin(100.0).unwrap(), 5);
    }

    #[test]
    fn round_trip_preserves_filled_histograms() {
        let mut store = PdfStore::default_untrained();
        let bin = store.energy_bin(1.5).unwrap();
        store.fill_all(bin, &values(0.5), true);
        store.fill_all(bin, &values(5.0), false);
        store.normalize();

        let mut buf = Vec::new();
        store.write(&mut buf).unwrap();
        let restored = PdfStore::read(&mut buf.as_slice()).unwrap();

        let p_original = store.likelihood_ratio(bin, &values(0.5));
        let p_restored = restored.likelihood_ratio(bin, &values(0.5));
        assert!((p_original - p_restored).abs() < 1e-12);
    }
}
