//! [`Track`]: an extrapolated charged-particle path.

use super::helix::Helix;
use super::ids::{ClusterId, TrackId};
use super::vec3::Vec3;
use serde::{Deserialize, Serialize};

/// A track's state (position + direction) at a given reference surface.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct TrackState {
    /// Position (mm).
    pub position: Vec3,
    /// Direction (unit vector).
    pub direction: Vec3,
}

/// A charged-particle track, extrapolated from the tracker into the
/// calorimeter.
///
/// Created from external input with immutable geometry; association with
/// a cluster is the only mutable state, and is always updated
/// symmetrically with [`super::cluster::Cluster::tracks`] by the manager.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Track {
    /// State at the start of the track.
    pub state_at_start: TrackState,
    /// State at the end of the track.
    pub state_at_end: TrackState,
    /// State at the calorimeter face.
    pub state_at_calorimeter: TrackState,
    /// Energy at the distance of closest approach (GeV).
    pub energy_at_dca: f64,
    /// Helix parameters evaluated at the calorimeter.
    pub helix_at_calorimeter: Helix,
    /// Whether this track alone is allowed to seed a particle-flow
    /// object (e.g. not a low-momentum curler).
    pub can_form_pfo: bool,
    /// True if the track reaches the endcap rather than the barrel.
    pub reaches_endcap: bool,
    /// Parent track, if this is a daughter of a decay/interaction.
    pub parent: Option<TrackId>,
    /// Daughter tracks.
    pub daughters: Vec<TrackId>,
    /// Sibling tracks (shared parent).
    pub siblings: Vec<TrackId>,
    /// The single cluster this track is currently associated with, if
    /// any. Mutated only by the manager, symmetrically with the
    /// cluster's track list.
    pub associated_cluster: Option<ClusterId>,
}

impl Track {
    /// True if this track has no associated cluster.
    #[must_use]
    pub fn is_unassociated(&self) -> bool {
        self.associated_cluster.is_none()
    }
}
