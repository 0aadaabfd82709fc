//! `PhotonReconstruction`, grounded on
//! `PhotonReconstructionAlgorithm.cc`: decomposes sufficiently
//! electromagnetic, fine-granularity clusters into transverse
//! shower-profile peaks and accepts or rejects each peak as a photon
//! using a per-energy-bin likelihood ratio built from five discriminants
//! (`discriminants`) read from a persisted PDF pair (`pdf`).
//!
//! Training mode reuses exactly the same peak extraction and
//! discriminant computation, filling the PDF's histograms from each
//! peak's dominant Monte-Carlo contributor instead of scoring it.

pub mod discriminants;
pub mod pdf;

use crate::error::{Error, Result};
use crate::manager::CandidateId;
use crate::model::{ClusterId, HitId};
use crate::pipeline::{Operator, OperatorContext};
use discriminants::compute;
use pdf::PdfStore;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

/// PDG code of the photon, the truth label training mode checks a
/// peak's dominant Monte-Carlo contributor against.
pub const PHOTON_PDG_CODE: u64 = 22;

/// Whether a run scores peaks against the persisted PDF or instead fills
/// it from truth labels.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub enum Mode {
    /// Score peaks against the PDF and tag/keep accepted ones as
    /// photons.
    Infer,
    /// Fill the PDF's histograms from truth labels; never mutates the
    /// cluster list.
    Train,
}

/// Configuration for [`PhotonReconstruction`].
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PhotonReconstructionConfig {
    /// Inference or training.
    pub mode: Mode,
    /// Minimum electromagnetic energy for a cluster to be considered at
    /// all.
    pub min_cluster_em_energy: f64,
    /// Minimum energy for a peak to be considered.
    pub min_peak_energy: f64,
    /// Maximum transverse RMS for a peak to be considered.
    pub max_peak_rms: f64,
    /// Minimum hit count for a peak to be considered.
    pub min_peak_hits: usize,
    /// Pseudo-layer depth over which the transverse profile is computed.
    pub profile_max_layer: u32,
    /// Acceptance threshold on the likelihood ratio, one per energy bin;
    /// the last entry is reused for any bin beyond the configured list.
    pub pid_cut_per_bin: Vec<f64>,
    /// For the first (largest) peak only: if its energy fraction of the
    /// whole cluster exceeds this, revert to tagging the original,
    /// unfragmented cluster as a photon instead of replacing it with the
    /// peak fragment.
    pub revert_min_peak_energy_fraction: f64,
    /// For the first peak only: if the energy difference between the
    /// whole cluster and the peak is below this, revert as above.
    pub revert_max_fragment_energy_difference: f64,
}

impl Default for PhotonReconstructionConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Infer,
            min_cluster_em_energy: 0.2,
            min_peak_energy: 0.1,
            max_peak_rms: 25.0,
            min_peak_hits: 4,
            profile_max_layer: 30,
            pid_cut_per_bin: vec![0.5],
            revert_min_peak_energy_fraction: 0.95,
            revert_max_fragment_energy_difference: 0.05,
        }
    }
}

/// Decomposes candidate clusters into shower-profile peaks and
/// tags/replaces them with accepted photon fragments, or (in training
/// mode) accumulates the PDF's histograms.
pub struct PhotonReconstruction {
    /// Operator configuration.
    pub config: PhotonReconstructionConfig,
    /// The persisted discriminant PDFs, mutated in place by training and
    /// read (never mutated) by inference.
    pub pdf: RefCell<PdfStore>,
}

impl PhotonReconstruction {
    /// Build an operator around an already-loaded or freshly-initialised
    /// PDF store.
    #[must_use]
    pub fn new(config: PhotonReconstructionConfig, pdf: PdfStore) -> Self {
        Self { config, pdf: RefCell::new(pdf) }
    }

    /// Normalise the accumulated histograms to unit integral and hand
    /// back the trained store for serialisation. There is no implicit destructor hook — callers invoke
    /// this explicitly once every training event has run.
    #[must_use]
    pub fn finish_training(&self) -> PdfStore {
        let mut pdf = self.pdf.borrow().clone();
        pdf.normalize();
        pdf
    }

    fn candidate_clusters(&self, ctx: &OperatorContext) -> Result<Vec<ClusterId>> {
        let mut out = Vec::new();
        for id in ctx.manager.current_list() {
            let cluster = ctx.manager.cluster(id)?;
            let Some(&inner_hit) = cluster.hits().layer(cluster.inner_pseudo_layer()).first() else { continue };
            if !ctx.geometry.granularity(ctx.manager.hits().get(inner_hit).hit_type).is_fine() {
                continue;
            }
            let store = ctx.manager.hits().as_slice();
            let em = cluster.em_energy(|h| store[h.index()].electromagnetic_energy);
            if em < self.config.min_cluster_em_energy {
                continue;
            }
            out.push(id);
        }
        Ok(out)
    }

    fn pid_cut(&self, bin: usize) -> f64 {
        self.config
            .pid_cut_per_bin
            .get(bin)
            .or_else(|| self.config.pid_cut_per_bin.last())
            .copied()
            .unwrap_or(0.5)
    }

    #[allow(clippy::too_many_lines)]
    fn process_cluster(&self, ctx: &mut OperatorContext, cluster_id: ClusterId, training: bool) -> Result<()> {
        let Some(profile_plugin) = ctx.plugins.shower_profile() else {
            return Err(Error::NotInitialised("no shower-profile plugin registered".into()));
        };

        let (whole_energy, peaks) = {
            let cluster = ctx.manager.cluster(cluster_id)?;
            let store = ctx.manager.hits();
            let whole_energy = cluster.energy(store.as_slice());
            let peaks = profile_plugin.calculate_transverse_profile(cluster, store, self.config.profile_max_layer);
            (whole_energy, peaks)
        };
        if peaks.is_empty() {
            return Ok(());
        }

        let handle = ctx.manager.initialize_transaction(&[cluster_id])?;
        let mut accepted_hits: Vec<Vec<HitId>> = Vec::new();
        let mut revert = false;

        for (i, peak) in peaks.iter().enumerate() {
            if peak.energy < self.config.min_peak_energy
                || peak.rms > self.config.max_peak_rms
                || peak.n_hits() < self.config.min_peak_hits
            {
                continue;
            }
            let Ok(eval_candidate) = ctx.manager.add_candidate(&handle, vec![peak.hits.clone()]) else { continue };
            ctx.manager.preview_candidate(&handle, eval_candidate)?;
            let Some(peak_cluster_id) = ctx.manager.candidate_cluster_ids(&handle, eval_candidate).first().copied()
            else {
                continue;
            };
            let peak_cluster = ctx.manager.cluster(peak_cluster_id)?.clone();
            let (values, peak_em_energy) = {
                let store = ctx.manager.hits();
                let tracks = ctx.manager.tracks().as_slice();
                let values = compute(peak, &peak_cluster, whole_energy, store, tracks);
                let peak_em_energy = peak_cluster.em_energy(|h| store.as_slice()[h.index()].electromagnetic_energy);
                (values, peak_em_energy)
            };

            if training {
                self.accumulate_training(ctx, &peak_cluster, peak_em_energy, &values);
                continue;
            }

            let Ok(bin) = self.pdf.borrow().energy_bin(peak_em_energy) else { continue };
            let p = self.pdf.borrow().likelihood_ratio(bin, &values);
            if p <= self.pid_cut(bin) {
                continue;
            }

            accepted_hits.push(peak.hits.clone());
            if i == 0 {
                let fragment_energy_diff = (whole_energy - peak.energy).abs();
                if values.peak_energy_fraction > self.config.revert_min_peak_energy_fraction
                    || fragment_energy_diff < self.config.revert_max_fragment_energy_difference
                {
                    revert = true;
                }
            }
        }

        if training {
            ctx.manager.end_transaction(handle, None)?;
            return Ok(());
        }

        if revert || accepted_hits.is_empty() {
            ctx.manager.end_transaction(handle, None)?;
            if revert {
                ctx.manager.set_fixed_photon(cluster_id, true)?;
            }
            return Ok(());
        }

        let final_candidate: CandidateId = ctx.manager.add_candidate(&handle, accepted_hits)?;
        let final_ids = ctx.manager.candidate_cluster_ids(&handle, final_candidate);
        ctx.manager.end_transaction(handle, Some(final_candidate))?;
        for id in final_ids {
            ctx.manager.set_fixed_photon(id, true)?;
        }
        Ok(())
    }

    /// Fill the signal/background histograms from one peak's dominant
    /// Monte-Carlo contributor (training mode only,"truth
    /// labels").
    fn accumulate_training(
        &self,
        ctx: &OperatorContext,
        peak_cluster: &crate::model::Cluster,
        peak_em_energy: f64,
        values: &discriminants::DiscriminantValues,
    ) {
        let store = ctx.manager.hits();
        let hit_ids: Vec<HitId> = peak_cluster.all_hit_ids().collect();
        if hit_ids.is_empty() {
            return;
        }
        let n_photon =
            hit_ids.iter().filter(|&&h| store.get(h).dominant_mc_particle() == Some(PHOTON_PDG_CODE)).count();
        let is_signal = n_photon * 2 >= hit_ids.len();
        if let Ok(bin) = self.pdf.borrow().energy_bin(peak_em_energy) {
            self.pdf.borrow_mut().fill_all(bin, values, is_signal);
        }
    }
}

impl Operator for PhotonReconstruction {
    fn name(&self) -> &'static str {
        "PhotonReconstruction"
    }

    fn run(&self, ctx: &mut OperatorContext) -> Result<()> {
        let training = self.config.mode == Mode::Train;
        for cluster_id in self.candidate_clusters(ctx)? {
            self.process_cluster(ctx, cluster_id, training)?;
        }
        Ok(())
    }
}
