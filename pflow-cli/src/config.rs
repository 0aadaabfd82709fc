//! The pipeline configuration document: an ordered list of operators and
//! the global pipeline settings.

use anyhow::{bail, Context, Result};
use pflow_core::geometry::GeometryContext;
use pflow_core::hit_properties::HitPropertiesConfig;
use pflow_core::merging::backscattered::{BackscatteredTracks, BackscatteredTracksConfig};
use pflow_core::merging::fragment_removal::{FragmentRemoval, FragmentRemovalConfig};
use pflow_core::merging::isolated_hit::{IsolatedHitMerging, IsolatedHitMergingConfig};
use pflow_core::merging::merge_split_photons::{MergeSplitPhotons, MergeSplitPhotonsConfig};
use pflow_core::merging::muon_association::{MuonClusterAssociation, MuonClusterAssociationConfig};
use pflow_core::merging::proximity::{ProximityBasedMerging, ProximityBasedMergingConfig};
use pflow_core::merging::shower_mip::{ShowerMipMerging, ShowerMipMergingConfig};
use pflow_core::photon::pdf::PdfStore;
use pflow_core::photon::{PhotonReconstruction, PhotonReconstructionConfig};
use pflow_core::pipeline::{OperatorEnum, Pipeline, PipelineSettings};
use pflow_core::reclustering::resolve_track_associations::{
    ResolveTrackAssociations, ResolveTrackAssociationsConfig,
};
use pflow_core::reclustering::split_track_associations::{SplitTrackAssociations, SplitTrackAssociationsConfig};
use pflow_core::reclustering::track_driven_association::{TrackDrivenAssociation, TrackDrivenAssociationConfig};
use pflow_core::reclustering::track_driven_merging::{TrackDrivenMerging, TrackDrivenMergingConfig};
use pflow_core::track_recovery::helix::{TrackRecoveryHelix, TrackRecoveryHelixConfig};
use pflow_core::track_recovery::straight::{TrackRecovery, TrackRecoveryConfig};
use serde::Deserialize;
use serde_yaml::Value;

/// Top-level configuration document: ambient settings plus the ordered
/// operator sequence the host pipeline runs.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PipelineConfig {
    /// Global pipeline settings.
    #[serde(default)]
    pub settings: PipelineSettings,
    /// Geometry context (sub-detector gaps, granularity mapping).
    /// Defaults to an empty context (no gaps, no granularity
    /// overrides) if omitted.
    #[serde(default)]
    pub geometry: GeometryContext,
    /// Per-hit property computation configuration.
    #[serde(default)]
    pub hit_properties: HitPropertiesConfig,
    /// The ordered operator sequence.
    pub operators: Vec<OperatorSpec>,
}

/// One entry in the configured operator sequence: a discriminant naming
/// which operator to build, plus that operator's own configuration
/// (deserialized lazily, since each variant has a distinct config type).
#[derive(Clone, Debug, Deserialize)]
pub struct OperatorSpec {
    /// The operator name, matching one of [`OperatorEnum`]'s variants.
    #[serde(rename = "type")]
    pub kind: String,
    /// The operator's own configuration document. Defaults to an empty
    /// mapping so operators whose config implements [`Default`] may be
    /// omitted entirely.
    #[serde(default = "empty_mapping")]
    pub config: Value,
}

fn empty_mapping() -> Value {
    Value::Mapping(serde_yaml::Mapping::new())
}

fn parse_config<T: Default + for<'de> Deserialize<'de>>(value: &Value) -> Result<T> {
    if matches!(value, Value::Mapping(m) if m.is_empty()) || matches!(value, Value::Null) {
        return Ok(T::default());
    }
    serde_yaml::from_value(value.clone()).context("failed to parse operator configuration")
}

impl PipelineConfig {
    /// Build the runnable [`Pipeline`] this document describes. `pdf`
    /// supplies the (already loaded) photon-reconstruction PDF store for
    /// any `PhotonReconstruction` entry; required only if such an entry
    /// is present.
    pub fn build_pipeline(&self, pdf: Option<PdfStore>) -> Result<Pipeline> {
        let mut operators = Vec::with_capacity(self.operators.len());
        for spec in &self.operators {
            let operator = match spec.kind.as_str() {
                "ProximityBasedMerging" => {
                    OperatorEnum::from(ProximityBasedMerging { config: parse_config::<ProximityBasedMergingConfig>(&spec.config)? })
                }
                "ShowerMipMerging" => {
                    OperatorEnum::from(ShowerMipMerging { config: parse_config::<ShowerMipMergingConfig>(&spec.config)? })
                }
                "BackscatteredTracks" => {
                    OperatorEnum::from(BackscatteredTracks { config: parse_config::<BackscatteredTracksConfig>(&spec.config)? })
                }
                "FragmentRemoval" => {
                    OperatorEnum::from(FragmentRemoval { config: parse_config::<FragmentRemovalConfig>(&spec.config)? })
                }
                "MergeSplitPhotons" => {
                    OperatorEnum::from(MergeSplitPhotons { config: parse_config::<MergeSplitPhotonsConfig>(&spec.config)? })
                }
                "IsolatedHitMerging" => {
                    OperatorEnum::from(IsolatedHitMerging { config: parse_config::<IsolatedHitMergingConfig>(&spec.config)? })
                }
                "MuonClusterAssociation" => OperatorEnum::from(MuonClusterAssociation {
                    config: parse_config::<MuonClusterAssociationConfig>(&spec.config)?,
                }),
                "SplitTrackAssociations" => OperatorEnum::from(SplitTrackAssociations {
                    config: parse_config::<SplitTrackAssociationsConfig>(&spec.config)?,
                }),
                "ResolveTrackAssociations" => OperatorEnum::from(ResolveTrackAssociations {
                    config: parse_config::<ResolveTrackAssociationsConfig>(&spec.config)?,
                }),
                "TrackDrivenAssociation" => OperatorEnum::from(TrackDrivenAssociation {
                    config: parse_config::<TrackDrivenAssociationConfig>(&spec.config)?,
                }),
                "TrackDrivenMerging" => OperatorEnum::from(TrackDrivenMerging {
                    config: parse_config::<TrackDrivenMergingConfig>(&spec.config)?,
                }),
                "PhotonReconstruction" => {
                    let config = parse_config::<PhotonReconstructionConfig>(&spec.config)?;
                    let store = pdf.clone().unwrap_or_else(PdfStore::default_untrained);
                    OperatorEnum::from(PhotonReconstruction::new(config, store))
                }
                "TrackRecovery" => {
                    OperatorEnum::from(TrackRecovery { config: parse_config::<TrackRecoveryConfig>(&spec.config)? })
                }
                "TrackRecoveryHelix" => OperatorEnum::from(TrackRecoveryHelix {
                    config: parse_config::<TrackRecoveryHelixConfig>(&spec.config)?,
                }),
                other => bail!("unknown operator type `{other}`"),
            };
            operators.push(operator);
        }
        Ok(Pipeline::new(operators))
    }
}
