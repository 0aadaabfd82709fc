//! Track recovery operators: associate a still-unassociated
//! track with a nearby track-free cluster by projecting it into the
//! calorimeter, either as a straight line (`straight`) or along its true
//! curved helix (`helix`).

pub mod helix;
pub mod straight;

use crate::fragment_geometry::cluster_helix_distance;
use crate::manager::ClusterManager;
use crate::model::{ClusterId, Helix, Track, TrackId};
use std::collections::HashSet;

/// One candidate (track, cluster) pairing and its mean helix-to-cluster
/// distance over the examined layers.
pub(crate) struct Candidate {
    pub track: TrackId,
    pub cluster: ClusterId,
    pub mean_distance: f64,
}

/// Every (unassociated, `can_form_pfo`, sufficiently energetic) track
/// paired with every currently track-free cluster whose mean helix
/// distance is below `max_mean_distance`. `project` turns a track into
/// the [`Helix`] examined — a straight line continuation or the track's
/// true calorimeter helix.
pub(crate) fn find_candidates(
    manager: &ClusterManager,
    min_track_energy: f64,
    n_examination_layers: u32,
    max_examined_layers: usize,
    max_mean_distance: f64,
    project: impl Fn(&Track) -> Helix,
) -> Vec<Candidate> {
    let mut out = Vec::new();
    for track_id in manager.tracks().ids() {
        let track = manager.tracks().get(track_id);
        if !track.is_unassociated() || !track.can_form_pfo || track.energy_at_dca < min_track_energy {
            continue;
        }
        let helix = project(track);
        for cluster_id in manager.current_list() {
            let Ok(cluster) = manager.cluster(cluster_id) else { continue };
            if !cluster.tracks().is_empty() {
                continue;
            }
            let inner = cluster.inner_pseudo_layer();
            let Some((_, mean_distance)) = cluster_helix_distance(
                cluster,
                manager.hits(),
                &helix,
                inner,
                inner + n_examination_layers,
                max_examined_layers,
            ) else {
                continue;
            };
            if mean_distance < max_mean_distance {
                out.push(Candidate { track: track_id, cluster: cluster_id, mean_distance });
            }
        }
    }
    out
}

/// Resolve candidates in track order: each track (in allocation order)
/// claims its nearest still-unclaimed cluster. Earlier tracks get first
/// pick.
pub(crate) fn nearest_per_track_in_order(candidates: &[Candidate]) -> Vec<(TrackId, ClusterId)> {
    let mut by_track: Vec<(TrackId, Vec<&Candidate>)> = Vec::new();
    for candidate in candidates {
        if let Some(entry) = by_track.iter_mut().find(|(t, _)| *t == candidate.track) {
            entry.1.push(candidate);
        } else {
            by_track.push((candidate.track, vec![candidate]));
        }
    }
    by_track.sort_by_key(|(t, _)| *t);

    let mut used_clusters = HashSet::new();
    let mut out = Vec::new();
    for (track, mut options) in by_track {
        options.sort_by(|a, b| a.mean_distance.partial_cmp(&b.mean_distance).unwrap_or(std::cmp::Ordering::Equal));
        if let Some(chosen) = options.into_iter().find(|c| !used_clusters.contains(&c.cluster)) {
            used_clusters.insert(chosen.cluster);
            out.push((track, chosen.cluster));
        }
    }
    out
}

/// Resolve candidates globally: repeatedly take the closest remaining
/// (track, cluster) pair across the whole event, each track and cluster
/// used at most once.
pub(crate) fn nearest_pairs_globally(mut candidates: Vec<Candidate>) -> Vec<(TrackId, ClusterId)> {
    candidates.sort_by(|a, b| a.mean_distance.partial_cmp(&b.mean_distance).unwrap_or(std::cmp::Ordering::Equal));
    let mut used_tracks = HashSet::new();
    let mut used_clusters = HashSet::new();
    let mut out = Vec::new();
    for candidate in candidates {
        if used_tracks.contains(&candidate.track) || used_clusters.contains(&candidate.cluster) {
            continue;
        }
        used_tracks.insert(candidate.track);
        used_clusters.insert(candidate.cluster);
        out.push((candidate.track, candidate.cluster));
    }
    out
}
