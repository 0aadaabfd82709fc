#![allow(missing_docs)]

//! End-to-end coverage of the six concrete scenarios the refinement
//! operators are specified against, exercised through the public
//! `pflow_core` API exactly as `pflow-cli` or a host framework would
//! drive it (no internal/`pub(crate)` access).

use float_cmp::assert_approx_eq;
use pflow_core::compatibility::chi;
use pflow_core::geometry::{Granularity, GeometryContext};
use pflow_core::manager::{CaloHitStore, ClusterManager, TrackStore};
use pflow_core::merging::isolated_hit::{IsolatedHitMerging, IsolatedHitMergingConfig};
use pflow_core::merging::merge_split_photons::{MergeSplitPhotons, MergeSplitPhotonsConfig};
use pflow_core::model::gap::{Axis, ConcentricGap, ConcentricPolygon};
use pflow_core::model::{
    CaloHit, CellGeometry, Cluster, DetectorGap, HitId, HitType, OrderedCaloHitList, Region, Track, TrackState,
    Vec3,
};
use pflow_core::photon::pdf::PdfStore;
use pflow_core::photon::{Mode, PhotonReconstruction, PhotonReconstructionConfig};
use pflow_core::pipeline::{Operator, OperatorContext, PipelineSettings};
use pflow_core::plugins::PluginRegistry;
use pflow_core::reclustering::split_track_associations::{SplitTrackAssociations, SplitTrackAssociationsConfig};

fn cell() -> CellGeometry {
    CellGeometry::Rectangular { width: 10.0, length: 10.0 }
}

fn ecal_hit(position: Vec3, layer: u32, em: f64) -> CaloHit {
    CaloHit {
        position,
        expected_direction: Vec3::new(0.0, 0.0, 1.0),
        hit_type: HitType::Ecal,
        region: Region::Barrel,
        electromagnetic_energy: em,
        hadronic_energy: 0.0,
        mip_energy: 0.0,
        pseudo_layer: layer,
        cell_geometry: cell(),
        is_isolated: None,
        is_possible_mip: None,
        density_weight: None,
        surrounding_energy: None,
        mc_particle_weights: std::collections::HashMap::new(),
    }
}

fn cluster_of(hits: &[CaloHit], start_id: u32) -> (Cluster, OrderedCaloHitList) {
    let mut ordered = OrderedCaloHitList::new();
    for (i, hit) in hits.iter().enumerate() {
        ordered.insert(hit.pseudo_layer, HitId::from_index(start_id + i as u32));
    }
    (Cluster::from_hits(ordered.clone()), ordered)
}

fn dummy_track(energy_at_dca: f64, calorimeter_position: Vec3) -> Track {
    use pflow_core::model::Helix;
    let state = TrackState { position: calorimeter_position, direction: Vec3::new(0.0, 0.0, 1.0) };
    Track {
        state_at_start: state,
        state_at_end: state,
        state_at_calorimeter: state,
        energy_at_dca,
        helix_at_calorimeter: Helix { reference_point: Vec3::zero(), momentum: Vec3::new(0.0, 0.0, 1.0), curvature: 0.0 },
        can_form_pfo: true,
        reaches_endcap: false,
        parent: None,
        daughters: Vec::new(),
        siblings: Vec::new(),
        associated_cluster: None,
    }
}

/// Two back-to-back photon-tagged fragments in tight contact: the
/// smaller one is well below the immediate-accept threshold, so
/// `MergeSplitPhotons` merges them without even consulting the
/// transverse-profile veto.
#[test]
fn merge_split_photons_accepts_a_small_tight_contact_fragment() {
    let parent_hits = vec![
        ecal_hit(Vec3::new(0.0, 0.0, 100.0), 0, 1.0),
        ecal_hit(Vec3::new(0.0, 0.0, 200.0), 1, 1.0),
        ecal_hit(Vec3::new(0.0, 0.0, 300.0), 2, 1.0),
    ];
    let daughter_hits = vec![
        ecal_hit(Vec3::new(5.0, 0.0, 100.0), 0, 0.05),
        ecal_hit(Vec3::new(5.0, 0.0, 200.0), 1, 0.05),
        ecal_hit(Vec3::new(5.0, 0.0, 300.0), 2, 0.05),
    ];
    let mut all_hits = parent_hits.clone();
    all_hits.extend(daughter_hits.clone());
    let (parent, _) = cluster_of(&parent_hits, 0);
    let (daughter, _) = cluster_of(&daughter_hits, parent_hits.len() as u32);

    let hit_store = CaloHitStore::new(all_hits);
    let track_store = TrackStore::new(Vec::new());
    let mut manager = ClusterManager::new(hit_store, track_store, vec![parent, daughter]);
    let parent_id = manager.current_list()[0];
    manager.set_fixed_photon(parent_id, true).unwrap();

    let geometry = GeometryContext::new();
    let settings = PipelineSettings::default();
    let plugins = PluginRegistry::with_reference_plugins();
    let operator = MergeSplitPhotons { config: MergeSplitPhotonsConfig::default() };

    {
        let mut ctx = OperatorContext { manager: &mut manager, geometry: &geometry, plugins: &plugins, settings: &settings };
        operator.run(&mut ctx).unwrap();
    }

    let list = manager.current_list();
    assert_eq!(list.len(), 1, "the small fragment must be absorbed into a single surviving cluster");
    let merged = manager.cluster(list[0]).unwrap();
    assert_eq!(merged.all_hit_ids().count(), 6);
    assert_approx_eq!(f64, merged.energy(manager.hits().as_slice()), 3.15, epsilon = 1e-9);
}

/// A 4 GeV track-associated cluster with a 1 GeV track is badly
/// over-energetic (chi well above the reclustering threshold); nearest-
/// neighbour clustering naturally separates it into a close sub-cluster
/// the track reassociates with and a distant one it does not, and the
/// split is accepted because chi improves far past the configured
/// minimum.
#[test]
fn split_track_associations_splits_an_over_energetic_cluster() {
    let hits = vec![
        ecal_hit(Vec3::new(0.0, 0.0, 10.0), 0, 1.0),
        ecal_hit(Vec3::new(10.0, 0.0, 20.0), 1, 1.0),
        ecal_hit(Vec3::new(300.0, 0.0, 10.0), 0, 1.0),
        ecal_hit(Vec3::new(310.0, 0.0, 20.0), 1, 1.0),
    ];
    let (seed, _) = cluster_of(&hits, 0);

    let track = dummy_track(1.0, Vec3::new(0.0, 0.0, 10.0));
    let hit_store = CaloHitStore::new(hits);
    let track_store = TrackStore::new(vec![track]);
    let mut manager = ClusterManager::new(hit_store, track_store, vec![seed]);
    let seed_id = manager.current_list()[0];
    manager.add_track_cluster_association(pflow_core::model::TrackId::from_index(0), seed_id).unwrap();

    let original_energy = manager.cluster(seed_id).unwrap().energy(manager.hits().as_slice());
    let resolution = PipelineSettings::default().hadronic_energy_resolution;
    let original_chi = chi(original_energy, 1.0, resolution);
    assert!(original_chi > 3.0, "fixture must actually be over the reclustering threshold");

    let geometry = GeometryContext::new();
    let settings = PipelineSettings::default();
    let plugins = PluginRegistry::with_reference_plugins();
    let operator = SplitTrackAssociations {
        config: SplitTrackAssociationsConfig {
            clustering_algorithms: vec!["nearest_neighbour".to_owned()],
            association_algorithm: Some("distance_association".to_owned()),
            ..SplitTrackAssociationsConfig::default()
        },
    };

    {
        let mut ctx = OperatorContext { manager: &mut manager, geometry: &geometry, plugins: &plugins, settings: &settings };
        operator.run(&mut ctx).unwrap();
    }

    let list = manager.current_list();
    assert_eq!(list.len(), 2, "the seed must be replaced by its two spatially separated pieces");
    let total_energy: f64 = list.iter().map(|&id| manager.cluster(id).unwrap().energy(manager.hits().as_slice())).sum();
    assert_approx_eq!(f64, total_energy, original_energy, epsilon = 1e-9);

    let with_track: Vec<_> = list.iter().filter(|&&id| !manager.cluster(id).unwrap().tracks().is_empty()).collect();
    assert_eq!(with_track.len(), 1, "exactly one piece keeps the track association");
    let track_cluster = manager.cluster(*with_track[0]).unwrap();
    assert_approx_eq!(f64, track_cluster.energy(manager.hits().as_slice()), 2.0, epsilon = 1e-9);
}

/// A sparse isolated hit well within the recombination distance of a
/// healthy host cluster is swept onto it.
#[test]
fn isolated_hit_merging_attaches_a_nearby_stray_hit() {
    let mut hits: Vec<CaloHit> = (0..5)
        .map(|i| ecal_hit(Vec3::new(0.0, 0.0, f64::from(i) * 10.0), i, 1.0))
        .collect();
    let mut isolated = ecal_hit(Vec3::new(50.0, 0.0, 20.0), 10, 0.05);
    isolated.is_isolated = Some(true);
    let isolated_index = hits.len() as u32;
    hits.push(isolated);

    let (host, _) = cluster_of(&hits[0..5], 0);
    let hit_store = CaloHitStore::new(hits);
    let track_store = TrackStore::new(Vec::new());
    let mut manager = ClusterManager::new(hit_store, track_store, vec![host]);
    let host_id = manager.current_list()[0];

    let geometry = GeometryContext::new();
    let settings = PipelineSettings::default();
    let plugins = PluginRegistry::with_reference_plugins();
    let operator = IsolatedHitMerging { config: IsolatedHitMergingConfig::default() };

    {
        let mut ctx = OperatorContext { manager: &mut manager, geometry: &geometry, plugins: &plugins, settings: &settings };
        operator.run(&mut ctx).unwrap();
    }

    let isolated_id = HitId::from_index(isolated_index);
    assert!(!manager.hits().is_available(isolated_id));
    let host = manager.cluster(host_id).unwrap();
    assert!(host.isolated_hits().contains(&isolated_id));
    assert_approx_eq!(f64, host.energy(manager.hits().as_slice()), 5.05, epsilon = 1e-9);
}

/// An octagonal concentric gap, the 1 mm z/radial tolerance applied at
/// its boundary, and a line gap restricted to a single hit type.
#[test]
fn detector_gaps_apply_their_documented_boundary_convention() {
    let mut geometry = GeometryContext::new();
    geometry.add_gap(DetectorGap::Concentric(ConcentricGap {
        inner: ConcentricPolygon::regular(1000.0, 0.0, 8),
        outer: ConcentricPolygon::regular(2000.0, 0.0, 8),
        z_min: 0.0,
        z_max: 100.0,
    }));
    geometry.add_gap(DetectorGap::Line(pflow_core::model::gap::LineGap {
        hit_type: HitType::Hcal,
        min: -5.0,
        max: 5.0,
        axis: Axis::X,
    }));

    let tol = 1.0;
    assert!(geometry.is_in_gap(Vec3::new(1500.0, 0.0, 50.0), HitType::Ecal, tol), "mid-gap point");
    assert!(!geometry.is_in_gap(Vec3::new(500.0, 0.0, 50.0), HitType::Ecal, tol), "inside the inner polygon");
    assert!(geometry.is_in_gap(Vec3::new(1500.0, 0.0, 100.9), HitType::Ecal, tol), "just within the z tolerance");
    assert!(!geometry.is_in_gap(Vec3::new(1500.0, 0.0, 102.0), HitType::Ecal, tol), "past the z tolerance");
    assert!(geometry.is_in_gap(Vec3::new(2.0, 0.0, 0.0), HitType::Hcal, tol), "inside the Hcal-only line gap");
    assert!(!geometry.is_in_gap(Vec3::new(2.0, 0.0, 0.0), HitType::Ecal, tol), "line gap does not apply to Ecal");
}

/// A single, tightly-packed electromagnetic shower produces exactly one
/// transverse-profile peak that covers the whole cluster; scored
/// against an untrained (all-zero) PDF the likelihood ratio sits at the
/// floor value of 0.5, which clears a 0.4 acceptance cut, but the peak's
/// energy fraction is 1.0 so `PhotonReconstruction` reverts to tagging
/// the original cluster as a photon rather than replacing it with the
/// fragment.
#[test]
fn photon_reconstruction_single_peak_reverts_to_the_original_cluster() {
    let hits: Vec<CaloHit> = (0..6)
        .map(|i| ecal_hit(Vec3::new(0.0, 0.0, f64::from(i) * 10.0), i, 10.0 / 6.0))
        .collect();
    let (seed, _) = cluster_of(&hits, 0);

    let hit_store = CaloHitStore::new(hits);
    let track_store = TrackStore::new(Vec::new());
    let mut manager = ClusterManager::new(hit_store, track_store, vec![seed]);
    let seed_id = manager.current_list()[0];

    let geometry = GeometryContext::new();
    let settings = PipelineSettings::default();
    let plugins = PluginRegistry::with_reference_plugins();
    let operator = PhotonReconstruction::new(
        PhotonReconstructionConfig {
            mode: Mode::Infer,
            pid_cut_per_bin: vec![0.4],
            min_peak_hits: 4,
            ..PhotonReconstructionConfig::default()
        },
        PdfStore::default_untrained(),
    );

    {
        let mut ctx = OperatorContext { manager: &mut manager, geometry: &geometry, plugins: &plugins, settings: &settings };
        operator.run(&mut ctx).unwrap();
    }

    let list = manager.current_list();
    assert_eq!(list, vec![seed_id], "reverting must not replace the original cluster");
    assert!(manager.cluster(seed_id).unwrap().is_fixed_photon());
}

/// With no clustering algorithm registered, every reclustering attempt
/// finds no candidate to commit; `end_transaction(None)` must restore
/// the pre-transaction state bit-for-bit.
#[test]
fn reclustering_transaction_with_no_viable_candidate_leaves_state_unchanged() {
    let hits = vec![
        ecal_hit(Vec3::new(0.0, 0.0, 10.0), 0, 1.0),
        ecal_hit(Vec3::new(10.0, 0.0, 20.0), 1, 1.0),
        ecal_hit(Vec3::new(300.0, 0.0, 10.0), 0, 1.0),
        ecal_hit(Vec3::new(310.0, 0.0, 20.0), 1, 1.0),
    ];
    let (seed, _) = cluster_of(&hits, 0);

    let track = dummy_track(1.0, Vec3::new(0.0, 0.0, 10.0));
    let hit_store = CaloHitStore::new(hits);
    let track_store = TrackStore::new(vec![track]);
    let mut manager = ClusterManager::new(hit_store, track_store, vec![seed]);
    let seed_id = manager.current_list()[0];
    manager.add_track_cluster_association(pflow_core::model::TrackId::from_index(0), seed_id).unwrap();

    let before_hits: Vec<bool> = manager.hits().ids().map(|id| manager.hits().is_available(id)).collect();
    let before_hit_ids: Vec<HitId> = manager.cluster(seed_id).unwrap().all_hit_ids().collect();

    let geometry = GeometryContext::new();
    let settings = PipelineSettings::default();
    let plugins = PluginRegistry::new(); // no clustering algorithm registered under any name
    let operator = SplitTrackAssociations {
        config: SplitTrackAssociationsConfig { clustering_algorithms: vec!["nearest_neighbour".to_owned()], ..SplitTrackAssociationsConfig::default() },
    };

    {
        let mut ctx = OperatorContext { manager: &mut manager, geometry: &geometry, plugins: &plugins, settings: &settings };
        operator.run(&mut ctx).unwrap();
    }

    let list = manager.current_list();
    assert_eq!(list, vec![seed_id], "an aborted transaction must not change which clusters are live");
    let after_hit_ids: Vec<HitId> = manager.cluster(seed_id).unwrap().all_hit_ids().collect();
    assert_eq!(before_hit_ids, after_hit_ids);
    let after_hits: Vec<bool> = manager.hits().ids().map(|id| manager.hits().is_available(id)).collect();
    assert_eq!(before_hits, after_hits);
    assert!(!manager.cluster(seed_id).unwrap().tracks().is_empty());
}

/// A zero track-energy sum skips the compatibility check entirely
/// (merge paths that have no associated track must never divide by
/// zero or report a spurious incompatibility).
#[test]
fn chi_skips_the_track_check_for_an_unassociated_cluster() {
    assert_eq!(chi(12.5, 0.0, 0.6), 0.0);
}

/// Cluster granularity defaults to `Fine` when a hit type was never
/// registered, which is the conservative choice every fine/coarse-gated
/// operator relies on.
#[test]
fn unregistered_hit_type_defaults_to_fine_granularity() {
    let geometry = GeometryContext::new();
    assert_eq!(geometry.granularity(HitType::Ecal), Granularity::Fine);
    assert!(geometry.granularity(HitType::Ecal).is_fine());
}
